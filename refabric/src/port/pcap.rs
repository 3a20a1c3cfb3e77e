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

//! Bulk partial-configuration protocol.
//!
//! Each request is one clock-region row of a column span. A request is sent as a command
//! stream (preamble, CRC reset, command and frame address setup, data packet header)
//! followed by the frame data as a second transfer. Both transfers wait for the DMA and
//! the port completion flags before the next one is issued.
//!
//! The configuration logic pipelines one frame: writes carry a trailing pad frame that is
//! never committed, and readback starts with a pad frame that carries no data.

use crate::error::RefabricError;
use crate::fabric::{FRAME_WORDS, Fabric, FarBlock, RAM_CONTENT_FRAMES};
use crate::port::packet::{Command, Opcode, PacketWriter, Register, encode_far};
use crate::port::{ConfigTransport, Poller, Transfer};
use log::{debug, trace};

pub struct BulkDriver<'a, T: ConfigTransport> {
    transport: &'a mut T,
    poller: &'a Poller,
}

impl<'a, T: ConfigTransport> BulkDriver<'a, T> {
    pub fn new(transport: &'a mut T, poller: &'a Poller) -> BulkDriver<'a, T> {
        BulkDriver { transport, poller }
    }

    /// Check that the transport is up and clear stale completion flags.
    ///
    /// # Returns: `Result<(), RefabricError>`
    /// * `Ok(())` - The port accepts transfers
    /// * `Err(RefabricError::Init)` - The transport reports it is not ready
    pub fn init(&mut self) -> Result<(), RefabricError> {
        if !self.transport.ready() {
            return Err(RefabricError::Init(
                "transport did not report ready".to_string(),
            ));
        }
        self.transport.clear_status();
        debug!("Configuration port ready");
        Ok(())
    }

    fn transfer(&mut self, transfer: Transfer<'_>) -> Result<(), RefabricError> {
        self.transport.submit(transfer)?;
        let transport = &mut *self.transport;
        self.poller
            .wait_until("DMA completion", || transport.status().dma_done)?;
        self.poller
            .wait_until("configuration port completion", || {
                transport.status().port_done
            })?;
        self.transport.clear_status();
        Ok(())
    }

    /// Read back the frames of columns `first..=last` in clock-region row `row`.
    ///
    /// `dest` must have room for the frames plus the leading pad frame. On success the
    /// pad frame has been dropped and `dest` starts with the first real frame.
    ///
    /// # Returns: `Result<usize, RefabricError>`
    /// * `Ok(usize)` - Number of frame words now at the start of `dest`
    /// * `Err(RefabricError::ScratchOverflow)` - `dest` is too small
    /// * `Err(RefabricError::Transport)` / `Err(RefabricError::HardwareTimeout)` - The transfer failed
    pub fn read_row(
        &mut self,
        fabric: &Fabric,
        row: u32,
        first: u32,
        last: u32,
        dest: &mut [u32],
    ) -> Result<usize, RefabricError> {
        let words = fabric.words_in_span(row, first, last)?;
        let total = words + FRAME_WORDS;
        if dest.len() < total {
            return Err(RefabricError::ScratchOverflow {
                needed: total,
                available: dest.len(),
            });
        }
        let commands = PacketWriter::new()
            .preamble()
            .command(Command::Rcrc)
            .noop(2)
            .command(Command::Rcfg)
            .noop(1)
            .write_register(Register::Far, fabric.column_address(row, first)?)
            .noop(1)
            .data_header(Opcode::Read, Register::Fdro, total)
            .noop(2)
            .desync()
            .finish();
        trace!("Readback of row {row}, columns {first}..={last}: {total} words");
        self.transfer(Transfer::Write(&commands))?;
        self.transfer(Transfer::Read(&mut dest[..total]))?;
        dest.copy_within(FRAME_WORDS..total, 0);
        Ok(words)
    }

    /// Write the frames of columns `first..=last` in clock-region row `row`.
    ///
    /// `frames` must hold exactly the frames of the span; the pad frame is appended here.
    /// When `erase_ram` is set the content frames of every RAM column in the span are
    /// zero-filled after the frame write.
    pub fn write_row(
        &mut self,
        fabric: &Fabric,
        row: u32,
        first: u32,
        last: u32,
        frames: &[u32],
        erase_ram: bool,
    ) -> Result<(), RefabricError> {
        let words = fabric.words_in_span(row, first, last)?;
        if frames.len() != words {
            return Err(RefabricError::Argument(format!(
                "Row {row} columns {first}..={last} need {words} frame words, got {}",
                frames.len()
            )));
        }
        let total = words + FRAME_WORDS;
        let commands = PacketWriter::new()
            .preamble()
            .command(Command::Rcrc)
            .noop(2)
            .write_register(Register::Idcode, fabric.idcode())
            .command(Command::Wcfg)
            .noop(1)
            .write_register(Register::Far, fabric.column_address(row, first)?)
            .noop(1)
            .data_header(Opcode::Write, Register::Fdri, total)
            .finish();
        let mut payload = Vec::with_capacity(total);
        payload.extend_from_slice(frames);
        payload.resize(total, 0);
        trace!("Write of row {row}, columns {first}..={last}: {total} words");
        self.transfer(Transfer::Write(&commands))?;
        self.transfer(Transfer::Write(&payload))?;

        if erase_ram {
            self.erase_ram(fabric, row, first, last)?;
        }

        let trailer = PacketWriter::new()
            .command(Command::Rcrc)
            .noop(2)
            .desync()
            .finish();
        self.transfer(Transfer::Write(&trailer))?;
        debug!("Wrote {words} frame words to row {row}, columns {first}..={last}");
        Ok(())
    }

    fn erase_ram(
        &mut self,
        fabric: &Fabric,
        row: u32,
        first: u32,
        last: u32,
    ) -> Result<(), RefabricError> {
        let zeros = vec![0; RAM_CONTENT_FRAMES * FRAME_WORDS];
        for column in first..=last {
            let info = fabric.column(row, column)?;
            let Some(ram_column) = info.ram_column else {
                continue;
            };
            let far = encode_far(FarBlock::RamContent, info.top, info.major_row, ram_column, 0);
            let commands = PacketWriter::new()
                .command(Command::Wcfg)
                .noop(1)
                .write_register(Register::Far, far)
                .noop(1)
                .data_header(Opcode::Write, Register::Fdri, zeros.len())
                .finish();
            trace!("Erasing RAM column {ram_column} of row {row}");
            self.transfer(Transfer::Write(&commands))?;
            self.transfer(Transfer::Write(&zeros))?;
        }
        Ok(())
    }
}
