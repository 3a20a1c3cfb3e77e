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

//! Static description of the configuration memory of a device.
//!
//! A [`Fabric`] maps every (clock-region row, device column) pair to the kind of block
//! found there, the number of configuration frames that column owns in that row and the
//! fields needed to build its Frame Address Register value. The description is built once
//! and only read afterwards.
//!
//! Fabric templates are looked up by device name through a small registry, the same way
//! platforms are matched against compatible strings: [`register_fabric`] adds a constructor
//! and [`fabric_for_device`] builds the description on demand. The `xc7z020` template is
//! always available.

mod xc7z020;

use crate::error::RefabricError;
use crate::port::packet::encode_far;
use log::trace;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Words in one configuration frame.
pub const FRAME_WORDS: usize = 101;
/// Logic-cell rows in one clock region.
pub const ROWS_PER_CLOCK_REGION: u32 = 50;
/// Frame words used by one logic-cell row.
pub const WORDS_PER_ROW: usize = 2;
/// Clock words in the middle of every frame.
pub const CLOCK_WORDS: usize = 1;
/// Words on each side of the clock word.
pub const HALF_FRAME_WORDS: usize = (FRAME_WORDS - CLOCK_WORDS) / 2;
/// Frames of a clock column that carry routing and are rewritten by partial images.
pub const FRAMES_CLK_INTERCONNECT: usize = 26;
/// LUTs in one logic cell.
pub const LUTS_PER_CLB: usize = 4;
/// Constant bits stored per LUT.
pub const BITS_PER_LUT: usize = 2;
/// Content frames of one RAM block column.
pub const RAM_CONTENT_FRAMES: usize = 128;

/// Block type field of the Frame Address Register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarBlock {
    Interconnect = 0,
    RamContent = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    ClbL,
    ClbM,
    Dsp,
    Bram,
    IobA,
    IobB,
    Clk,
    Cfg,
    Gt,
}

impl BlockKind {
    /// Configuration frames a column of this kind owns in one clock-region row.
    pub const fn frames(self) -> usize {
        match self {
            BlockKind::ClbL | BlockKind::ClbM => 36,
            BlockKind::Dsp => 28,
            BlockKind::Bram => 28,
            BlockKind::IobA => 42,
            BlockKind::IobB => 30,
            BlockKind::Clk => 30,
            BlockKind::Cfg => 30,
            BlockKind::Gt => 32,
        }
    }

    pub const fn is_logic_cell(self) -> bool {
        matches!(self, BlockKind::ClbL | BlockKind::ClbM)
    }

    /// Minor address of the LUT frame of one slice of a logic-cell column.
    pub const fn lut_minor(self, slice: u32) -> Option<u32> {
        match (self, slice) {
            (BlockKind::ClbL, 0) => Some(32),
            (BlockKind::ClbM, 0) => Some(34),
            (BlockKind::ClbL | BlockKind::ClbM, 1) => Some(26),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub kind: BlockKind,
    pub frames: usize,
    /// Half bit of the Frame Address Register (1 for the bottom half).
    pub top: u32,
    pub major_row: u32,
    /// Major column of the RAM content frames, for columns that hold RAM.
    pub ram_column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fabric {
    name: String,
    idcode: u32,
    rows: Vec<Vec<ColumnInfo>>,
}

impl Fabric {
    /// Build a fabric from explicit per-row column descriptions.
    pub fn new(name: impl Into<String>, idcode: u32, rows: Vec<Vec<ColumnInfo>>) -> Fabric {
        Fabric {
            name: name.into(),
            idcode,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn idcode(&self) -> u32 {
        self.idcode
    }

    pub fn clock_rows(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn columns(&self, row: u32) -> usize {
        self.rows.get(row as usize).map_or(0, Vec::len)
    }

    pub fn column(&self, row: u32, column: u32) -> Result<&ColumnInfo, RefabricError> {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(column as usize))
            .ok_or_else(|| {
                RefabricError::AddressLookup(format!(
                    "No column {column} in clock-region row {row} of {}",
                    self.name
                ))
            })
    }

    /// Frames owned by columns `first..=last` of a clock-region row.
    pub fn frames_in_span(&self, row: u32, first: u32, last: u32) -> Result<usize, RefabricError> {
        (first..=last).try_fold(0, |acc, column| Ok(acc + self.column(row, column)?.frames))
    }

    /// Words read back from (or written to) columns `first..=last` of a row, without the
    /// pipeline pad frame.
    pub fn words_in_span(&self, row: u32, first: u32, last: u32) -> Result<usize, RefabricError> {
        Ok(self.frames_in_span(row, first, last)? * FRAME_WORDS)
    }

    /// Frame address of the first frame of a column, used as the start of bulk transfers.
    pub fn column_address(&self, row: u32, column: u32) -> Result<u32, RefabricError> {
        let info = self.column(row, column)?;
        Ok(encode_far(
            FarBlock::Interconnect,
            info.top,
            info.major_row,
            column,
            0,
        ))
    }

    /// Frame address of the LUT frame holding the `slice_column`-th logic slice counted
    /// from the left edge of the span `first..=last` in clock-region row `row`.
    ///
    /// Each logic-cell column provides two slices, so slice columns `2k` and `2k + 1`
    /// both live in the `k`-th logic-cell column of the span. Columns of any other kind
    /// are skipped while counting.
    pub fn logic_slice_address(
        &self,
        row: u32,
        first: u32,
        last: u32,
        slice_column: usize,
    ) -> Result<u32, RefabricError> {
        let wanted = slice_column / 2;
        let slice = (slice_column % 2) as u32;
        let mut seen = 0;
        for column in first..=last {
            let info = self.column(row, column)?;
            if !info.kind.is_logic_cell() {
                continue;
            }
            if seen == wanted {
                let minor = info.kind.lut_minor(slice).ok_or_else(|| {
                    RefabricError::Internal(format!("No LUT frame for slice {slice}"))
                })?;
                let far = encode_far(
                    FarBlock::Interconnect,
                    info.top,
                    info.major_row,
                    column,
                    minor,
                );
                trace!("Slice column {slice_column} of row {row} resolves to frame {far:#010x}");
                return Ok(far);
            }
            seen += 1;
        }
        Err(RefabricError::AddressLookup(format!(
            "Slice column {slice_column} is not a logic-cell column of columns {first}..={last} in row {row}"
        )))
    }
}

type FabricConstructor = fn() -> Fabric;

static FABRIC_REGISTRY: OnceLock<Mutex<HashMap<&'static str, FabricConstructor>>> =
    OnceLock::new();

fn registry() -> &'static Mutex<HashMap<&'static str, FabricConstructor>> {
    FABRIC_REGISTRY.get_or_init(|| {
        let mut builtin: HashMap<&'static str, FabricConstructor> = HashMap::new();
        builtin.insert(xc7z020::DEVICE, xc7z020::fabric);
        Mutex::new(builtin)
    })
}

/// Register a fabric template under a device name, replacing any previous one.
pub fn register_fabric(device: &'static str, constructor: FabricConstructor) {
    trace!("Registering fabric template for {device}");
    match registry().lock() {
        Ok(mut registry) => {
            registry.insert(device, constructor);
        }
        Err(poisoned) => {
            poisoned.into_inner().insert(device, constructor);
        }
    }
}

/// Build the fabric description registered for `device`.
pub fn fabric_for_device(device: &str) -> Result<Fabric, RefabricError> {
    let registry = registry().lock().map_err(|e| {
        RefabricError::Internal(format!("Failed when locking fabric registry: {e}"))
    })?;
    match registry.get(device) {
        Some(constructor) => Ok(constructor()),
        None => Err(RefabricError::Argument(format!(
            "No fabric template registered for device {device:?}"
        ))),
    }
}
