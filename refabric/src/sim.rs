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

//! In-memory stand-in for the configuration ports of a device.
//!
//! [`SimulatedFabric`] keeps the configuration memory of a [`Fabric`] as one flat word
//! array per clock-region row and interprets the packet streams the bulk driver emits:
//! synchronisation, command and frame address writes, FDRI/FDRO data packets with type 1
//! or type 2 headers and DESYNC. Frame data is committed with the same one-frame pipeline
//! as the device, readback starts with a pad frame. It also implements the fast patch port
//! and records every patch, which makes it usable both by the command-line tool and as a
//! fake register file in tests.

use crate::error::RefabricError;
use crate::fabric::{FRAME_WORDS, Fabric, FarBlock};
#[cfg(feature = "fine-grain")]
use crate::port::PatchPort;
use crate::port::packet::{
    Command, Header, Opcode, Register, SYNC_WORD, decode_far, decode_header,
};
use crate::port::{ConfigTransport, Transfer, TransportStatus};
use log::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub kind: u32,
    pub frames: u32,
    pub far: u32,
    pub payload: Vec<u32>,
}

#[derive(Debug, Default)]
struct PacketState {
    synced: bool,
    far: u32,
    last_reg: u32,
    pending_write: usize,
    pending_read: usize,
    incoming: Vec<u32>,
    read_cursor: Option<(u32, usize)>,
}

#[derive(Debug)]
pub struct SimulatedFabric {
    fabric: Fabric,
    /// Configuration words of each clock-region row.
    memory: Vec<Vec<u32>>,
    /// First frame of each column, per clock-region row.
    column_frames: Vec<Vec<usize>>,
    state: PacketState,
    ready: bool,
    hung: bool,
    done: bool,
    fail_after: Option<usize>,
    submitted: usize,
    transfers: Vec<Vec<u32>>,
    frame_writes: usize,
    ram_erases: Vec<(u32, u32)>,
    control: u32,
    payload: Vec<u32>,
    templates: Vec<u32>,
    patches: Vec<PatchRecord>,
}

impl SimulatedFabric {
    /// A simulated device with all configuration memory cleared.
    pub fn new(fabric: &Fabric) -> SimulatedFabric {
        let mut memory = Vec::new();
        let mut column_frames = Vec::new();
        for row in 0..fabric.clock_rows() {
            let mut starts = Vec::new();
            let mut frames = 0;
            for column in 0..fabric.columns(row) {
                starts.push(frames);
                frames += fabric
                    .column(row, column as u32)
                    .map_or(0, |info| info.frames);
            }
            starts.push(frames);
            memory.push(vec![0; frames * FRAME_WORDS]);
            column_frames.push(starts);
        }
        SimulatedFabric {
            fabric: fabric.clone(),
            memory,
            column_frames,
            state: PacketState::default(),
            ready: true,
            hung: false,
            done: false,
            fail_after: None,
            submitted: 0,
            transfers: Vec::new(),
            frame_writes: 0,
            ram_erases: Vec::new(),
            control: 0,
            payload: vec![0; 16],
            templates: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// A hung device never raises completion flags and never clears the patch descriptor.
    pub fn set_hung(&mut self, hung: bool) {
        self.hung = hung;
    }

    /// Reject every transfer after the first `transfers` ones.
    pub fn fail_after(&mut self, transfers: usize) {
        self.fail_after = Some(transfers);
    }

    /// Fill the configuration memory with a deterministic pseudo-random pattern.
    pub fn fill_pattern(&mut self, seed: u32) {
        let mut x = seed.max(1);
        for row in &mut self.memory {
            for word in row.iter_mut() {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                *word = x;
            }
        }
    }

    /// Configuration words of columns `first..=last` in a clock-region row.
    pub fn row_words(&self, row: u32, first: u32, last: u32) -> Result<Vec<u32>, RefabricError> {
        let (start, end) = self.span(row, first, last)?;
        Ok(self.memory[row as usize][start..end].to_vec())
    }

    /// Overwrite the configuration words of columns `first..=last` in a clock-region row.
    pub fn set_row_words(
        &mut self,
        row: u32,
        first: u32,
        last: u32,
        words: &[u32],
    ) -> Result<(), RefabricError> {
        let (start, end) = self.span(row, first, last)?;
        if words.len() != end - start {
            return Err(RefabricError::Argument(format!(
                "Span holds {} words, got {}",
                end - start,
                words.len()
            )));
        }
        self.memory[row as usize][start..end].copy_from_slice(words);
        Ok(())
    }

    /// Every write transfer received, command streams and frame data alike.
    pub fn transfers(&self) -> &[Vec<u32>] {
        &self.transfers
    }

    /// Number of committed frame data packets, RAM erases excluded.
    pub fn frame_writes(&self) -> usize {
        self.frame_writes
    }

    /// (clock-region row, RAM major column) of every RAM erase.
    pub fn ram_erases(&self) -> &[(u32, u32)] {
        &self.ram_erases
    }

    pub fn patches(&self) -> &[PatchRecord] {
        &self.patches
    }

    pub fn templates(&self) -> &[u32] {
        &self.templates
    }

    fn span(&self, row: u32, first: u32, last: u32) -> Result<(usize, usize), RefabricError> {
        let starts = self.column_frames.get(row as usize).ok_or_else(|| {
            RefabricError::Argument(format!("No clock-region row {row}"))
        })?;
        if first > last || last as usize + 1 >= starts.len() {
            return Err(RefabricError::Argument(format!(
                "No columns {first}..={last} in row {row}"
            )));
        }
        Ok((
            starts[first as usize] * FRAME_WORDS,
            starts[last as usize + 1] * FRAME_WORDS,
        ))
    }

    /// Clock-region row and linear frame index of an interconnect frame address.
    fn locate(&self, far: u32) -> Result<(u32, usize), RefabricError> {
        let address = decode_far(far);
        for row in 0..self.fabric.clock_rows() {
            let Ok(info) = self.fabric.column(row, address.column) else {
                continue;
            };
            if info.top == address.top && info.major_row == address.row {
                return Ok((
                    row,
                    self.column_frames[row as usize][address.column as usize]
                        + address.minor as usize,
                ));
            }
        }
        Err(RefabricError::Transport(format!(
            "Frame address {far:#010x} does not exist"
        )))
    }

    fn clock_row_of(&self, far: u32) -> Option<u32> {
        let address = decode_far(far);
        (0..self.fabric.clock_rows()).find(|&row| {
            self.fabric
                .column(row, 0)
                .is_ok_and(|info| info.top == address.top && info.major_row == address.row)
        })
    }

    fn commit_write(&mut self) -> Result<(), RefabricError> {
        let data = std::mem::take(&mut self.state.incoming);
        let far = self.state.far;
        if decode_far(far).block == FarBlock::RamContent as u32 {
            let row = self.clock_row_of(far).unwrap_or(u32::MAX);
            trace!("RAM content write of {} words at {far:#010x}", data.len());
            self.ram_erases.push((row, decode_far(far).column));
            return Ok(());
        }
        let (row, frame) = self.locate(far)?;
        // the last frame only flushes the pipeline
        let committed = (data.len() / FRAME_WORDS).saturating_sub(1) * FRAME_WORDS;
        let start = frame * FRAME_WORDS;
        let memory = &mut self.memory[row as usize];
        if start + committed > memory.len() {
            return Err(RefabricError::Transport(format!(
                "Write of {committed} words at {far:#010x} runs past row {row}"
            )));
        }
        memory[start..start + committed].copy_from_slice(&data[..committed]);
        self.frame_writes += 1;
        debug!("Committed {} frames at {far:#010x}", committed / FRAME_WORDS);
        Ok(())
    }

    fn register_write(&mut self, reg: u32, value: u32) -> Result<(), RefabricError> {
        match reg {
            r if r == Register::Far as u32 => self.state.far = value,
            r if r == Register::Cmd as u32 => {
                if value == Command::Desync as u32 {
                    self.state.synced = false;
                }
                if value == Command::Rcfg as u32 {
                    self.state.read_cursor = None;
                }
            }
            r if r == Register::Idcode as u32 && value != self.fabric.idcode() => {
                return Err(RefabricError::Transport(format!(
                    "IDCODE {value:#010x} does not match device {:#010x}",
                    self.fabric.idcode()
                )));
            }
            _ => {}
        }
        Ok(())
    }

    fn data_packet(&mut self, op: Opcode, reg: u32, count: usize) {
        if count == 0 {
            return;
        }
        if op == Opcode::Write && reg == Register::Fdri as u32 {
            self.state.pending_write = count;
        } else if op == Opcode::Read && reg == Register::Fdro as u32 {
            self.state.pending_read = count;
            self.state.read_cursor = None;
        }
    }

    fn parse(&mut self, words: &[u32]) -> Result<(), RefabricError> {
        let mut i = 0;
        while i < words.len() {
            if self.state.pending_write > 0 {
                let n = self.state.pending_write.min(words.len() - i);
                self.state.incoming.extend_from_slice(&words[i..i + n]);
                self.state.pending_write -= n;
                i += n;
                if self.state.pending_write == 0 {
                    self.commit_write()?;
                }
                continue;
            }
            let word = words[i];
            i += 1;
            if !self.state.synced {
                self.state.synced = word == SYNC_WORD;
                continue;
            }
            match decode_header(word) {
                Header::Type1 { op, reg, count } => {
                    self.state.last_reg = reg;
                    if op == Opcode::Write && reg != Register::Fdri as u32 && count > 0 {
                        let value = *words.get(i).ok_or_else(|| {
                            RefabricError::Transport("Truncated register write".to_string())
                        })?;
                        i += count;
                        self.register_write(reg, value)?;
                    } else {
                        self.data_packet(op, reg, count);
                    }
                }
                Header::Type2 { op, count } => self.data_packet(op, self.state.last_reg, count),
                Header::Other => {}
            }
        }
        Ok(())
    }

    fn readback(&mut self, dest: &mut [u32]) -> Result<(), RefabricError> {
        if dest.len() > self.state.pending_read {
            return Err(RefabricError::Transport(format!(
                "Readback of {} words but only {} were requested",
                dest.len(),
                self.state.pending_read
            )));
        }
        let mut pad = 0;
        let (row, mut frame_word) = match self.state.read_cursor {
            Some(cursor) => cursor,
            None => {
                pad = FRAME_WORDS.min(dest.len());
                let (row, frame) = self.locate(self.state.far)?;
                (row, frame * FRAME_WORDS)
            }
        };
        dest[..pad].fill(0);
        let memory = &self.memory[row as usize];
        let wanted = dest.len() - pad;
        if frame_word + wanted > memory.len() {
            return Err(RefabricError::Transport(format!(
                "Readback of {wanted} words runs past row {row}"
            )));
        }
        dest[pad..].copy_from_slice(&memory[frame_word..frame_word + wanted]);
        frame_word += wanted;
        self.state.pending_read -= dest.len();
        self.state.read_cursor = Some((row, frame_word));
        Ok(())
    }
}

impl ConfigTransport for SimulatedFabric {
    fn ready(&mut self) -> bool {
        self.ready
    }

    fn submit(&mut self, transfer: Transfer<'_>) -> Result<(), RefabricError> {
        if self.fail_after.is_some_and(|limit| self.submitted >= limit) {
            warn!("Simulated DMA failure on transfer {}", self.submitted);
            return Err(RefabricError::Transport(
                "simulated DMA failure".to_string(),
            ));
        }
        self.submitted += 1;
        match transfer {
            Transfer::Write(words) => {
                self.transfers.push(words.to_vec());
                self.parse(words)?;
            }
            Transfer::Read(dest) => self.readback(dest)?,
        }
        self.done = !self.hung;
        Ok(())
    }

    fn status(&mut self) -> TransportStatus {
        TransportStatus {
            dma_done: self.done,
            port_done: self.done,
        }
    }

    fn clear_status(&mut self) {
        self.done = false;
    }
}

#[cfg(feature = "fine-grain")]
impl PatchPort for SimulatedFabric {
    fn read_control(&mut self) -> u32 {
        self.control
    }

    fn write_control(&mut self, word: u32) {
        if self.hung {
            self.control = word | 1;
            return;
        }
        let kind = word >> 30;
        let frames = (word >> 26) & 0x7;
        let far = word & 0x03FF_FFFF;
        let words = if kind == 2 { 5 } else { 13 };
        trace!("Patch kind {kind} with {frames} frames at {far:#010x}");
        self.patches.push(PatchRecord {
            kind,
            frames,
            far,
            payload: self.payload[..words].to_vec(),
        });
        self.control = 0;
    }

    fn write_payload(&mut self, index: usize, word: u32) {
        if index >= self.payload.len() {
            self.payload.resize(index + 1, 0);
        }
        self.payload[index] = word;
    }

    fn write_template(&mut self, index: usize, word: u32) {
        if index >= self.templates.len() {
            self.templates.resize(index + 1, 0);
        }
        self.templates[index] = word;
    }
}
