// This file is part of refabric, an engine for run-time coarse- and fine-grain reconfiguration of FPGA fabric.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// refabric is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// refabric is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Configuration packet words of the series-7 configuration logic.
//!
//! [`PacketWriter`] assembles the command streams sent to the bulk configuration port.
//! [`decode_header`] is the inverse for headers and is used by the simulated fabric.

use crate::fabric::FarBlock;

/// Padding word sent before synchronisation.
pub const DUMMY: u32 = 0xFFFF_FFFF;
/// Bus width auto detection pattern.
pub const BUS_WIDTH_SYNC: u32 = 0x0000_00BB;
pub const BUS_WIDTH_DETECT: u32 = 0x1122_0044;
/// Start of configuration commands.
pub const SYNC_WORD: u32 = 0xAA99_5566;
/// Type 1 NOOP.
pub const NOOP: u32 = 0x2000_0000;
/// Largest word count sent with a single type 1 data header.
pub const TYPE1_MAX_WORDS: usize = 2046;

const TYPE1_COUNT_MASK: u32 = 0x0000_07FF;
const TYPE2_COUNT_MASK: u32 = 0x07FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Crc = 0x00,
    Far = 0x01,
    Fdri = 0x02,
    Fdro = 0x03,
    Cmd = 0x04,
    Idcode = 0x0C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Write configuration data.
    Wcfg = 0x01,
    /// Read configuration data.
    Rcfg = 0x04,
    /// Reset CRC.
    Rcrc = 0x07,
    /// End configuration.
    Desync = 0x0D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop = 0,
    Read = 1,
    Write = 2,
}

impl Opcode {
    fn from_bits(bits: u32) -> Opcode {
        match bits & 3 {
            1 => Opcode::Read,
            2 => Opcode::Write,
            _ => Opcode::Nop,
        }
    }
}

/// Type 1 packet header.
pub fn type1(op: Opcode, reg: Register, word_count: usize) -> u32 {
    (1 << 29) | ((op as u32) << 27) | ((reg as u32) << 13) | (word_count as u32 & TYPE1_COUNT_MASK)
}

/// Type 2 packet header. Continues the register of the preceding type 1 header.
pub fn type2(op: Opcode, word_count: usize) -> u32 {
    (2 << 29) | ((op as u32) << 27) | (word_count as u32 & TYPE2_COUNT_MASK)
}

/// Frame Address Register value.
pub fn encode_far(block: FarBlock, top: u32, row: u32, column: u32, minor: u32) -> u32 {
    ((block as u32) << 23)
        | ((top & 0x1) << 22)
        | ((row & 0x1F) << 17)
        | ((column & 0x3FF) << 7)
        | (minor & 0x7F)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAddress {
    pub block: u32,
    pub top: u32,
    pub row: u32,
    pub column: u32,
    pub minor: u32,
}

pub fn decode_far(far: u32) -> FrameAddress {
    FrameAddress {
        block: (far >> 23) & 0x7,
        top: (far >> 22) & 0x1,
        row: (far >> 17) & 0x1F,
        column: (far >> 7) & 0x3FF,
        minor: far & 0x7F,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Type1 { op: Opcode, reg: u32, count: usize },
    Type2 { op: Opcode, count: usize },
    /// Anything that is not a packet header (dummy, sync and bus width words).
    Other,
}

pub fn decode_header(word: u32) -> Header {
    match word >> 29 {
        1 => Header::Type1 {
            op: Opcode::from_bits(word >> 27),
            reg: (word >> 13) & 0x3FFF,
            count: (word & TYPE1_COUNT_MASK) as usize,
        },
        2 => Header::Type2 {
            op: Opcode::from_bits(word >> 27),
            count: (word & TYPE2_COUNT_MASK) as usize,
        },
        _ => Header::Other,
    }
}

/// Builder for a command stream.
#[derive(Debug, Default)]
pub struct PacketWriter {
    words: Vec<u32>,
}

impl PacketWriter {
    pub fn new() -> PacketWriter {
        PacketWriter::default()
    }

    /// Dummy, bus width detection and sync words followed by two NOOPs.
    pub fn preamble(mut self) -> Self {
        self.words.extend_from_slice(&[
            DUMMY,
            BUS_WIDTH_SYNC,
            BUS_WIDTH_DETECT,
            DUMMY,
            SYNC_WORD,
            NOOP,
            NOOP,
        ]);
        self
    }

    pub fn noop(mut self, count: usize) -> Self {
        self.words.extend(std::iter::repeat_n(NOOP, count));
        self
    }

    pub fn dummy(mut self, count: usize) -> Self {
        self.words.extend(std::iter::repeat_n(DUMMY, count));
        self
    }

    pub fn write_register(mut self, reg: Register, value: u32) -> Self {
        self.words.push(type1(Opcode::Write, reg, 1));
        self.words.push(value);
        self
    }

    pub fn command(self, command: Command) -> Self {
        self.write_register(Register::Cmd, command as u32)
    }

    /// Header of a data packet of `word_count` words. Counts that do not fit a type 1
    /// header get an empty type 1 header followed by a type 2 header.
    pub fn data_header(mut self, op: Opcode, reg: Register, word_count: usize) -> Self {
        if word_count <= TYPE1_MAX_WORDS {
            self.words.push(type1(op, reg, word_count));
        } else {
            self.words.push(type1(op, reg, 0));
            self.words.push(type2(op, word_count));
        }
        self
    }

    /// End of configuration: DESYNC followed by two dummy words.
    pub fn desync(self) -> Self {
        self.command(Command::Desync).dummy(2)
    }

    pub fn finish(self) -> Vec<u32> {
        self.words
    }
}
