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

//! Physical layout of fine-grain units.
//!
//! For a placed element this computes, for every constant, selector and operation unit,
//! the list of (frame slot, first, last) ranges that hold its payload. Positions are bits
//! for constants, LUTs for selectors and 4-bit blocks for operation units, counted from
//! the bottom of the clock-region row inside the LUT frame of one logic slice column.
//!
//! Units are packed group by group. Inside a group constants come first, then selectors,
//! then operation units; every kind starts in a fresh slice column at the lowest row of
//! the partition. A unit fills the partition's rows of the current clock-region row,
//! continues in the next clock-region row and wraps to the next slice column after the
//! last one. Once a kind is placed, the column cursor skips the columns the group
//! reserves for it.

use crate::catalog::ElementDescriptor;
use crate::error::RefabricError;
use crate::fabric::{BITS_PER_LUT, Fabric, LUTS_PER_CLB, ROWS_PER_CLOCK_REGION};
use crate::fine_grain::pool::{FramePool, FramePools};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub slot: usize,
    pub first: usize,
    pub last: usize,
}

impl FrameRange {
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Selector range plus the cascade level of its first LUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorRange {
    pub range: FrameRange,
    pub level: usize,
}

/// Ranges of every unit of one placed element, indexed like the element's unit lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineGrainLayout {
    pub constants: Vec<Vec<FrameRange>>,
    pub selectors: Vec<Vec<SelectorRange>>,
    pub operations: Vec<Vec<FrameRange>>,
}

/// Usable positions of one kind inside the clock-region rows a partition spans.
#[derive(Debug, Clone, Copy)]
struct Band {
    first_clock_row: u32,
    last_clock_row: u32,
    /// First position in the first clock-region row.
    first: usize,
    /// One past the last position in the last clock-region row.
    end: usize,
    /// Positions in a full clock-region row.
    full: usize,
}

impl Band {
    fn new(row: u32, height: u32, per_row: impl Fn(usize) -> usize) -> Band {
        let last = row + height - 1;
        let first_row = (row % ROWS_PER_CLOCK_REGION) as usize;
        let last_row = (last % ROWS_PER_CLOCK_REGION) as usize;
        Band {
            first_clock_row: row / ROWS_PER_CLOCK_REGION,
            last_clock_row: last / ROWS_PER_CLOCK_REGION,
            first: per_row(first_row),
            end: per_row(last_row + 1),
            full: per_row(ROWS_PER_CLOCK_REGION as usize),
        }
    }

    fn constants(row: u32, height: u32) -> Band {
        Band::new(row, height, |r| r * LUTS_PER_CLB * BITS_PER_LUT)
    }

    fn selectors(row: u32, height: u32) -> Band {
        Band::new(row, height, |r| r * LUTS_PER_CLB)
    }

    /// Blocks span two logic-cell rows and start on an even row, so the first row is
    /// rounded up and the row past the end is rounded down to an even row.
    fn operations(row: u32, height: u32) -> Band {
        let mut band = Band::new(row, height, |r| r / 2);
        let first_row = (row % ROWS_PER_CLOCK_REGION) as usize;
        band.first = first_row.div_ceil(2);
        band
    }

    fn range(&self, clock_row: u32) -> (usize, usize) {
        let first = if clock_row == self.first_clock_row {
            self.first
        } else {
            0
        };
        let end = if clock_row == self.last_clock_row {
            self.end
        } else {
            self.full
        };
        (first, end)
    }

    fn is_empty(&self) -> bool {
        self.first_clock_row == self.last_clock_row && self.first >= self.end
    }
}

struct Cursor {
    band: Band,
    clock_row: u32,
    column: usize,
    first: usize,
    end: usize,
}

impl Cursor {
    fn new(band: Band, column: usize) -> Cursor {
        let (first, end) = band.range(band.first_clock_row);
        Cursor {
            band,
            clock_row: band.first_clock_row,
            column,
            first,
            end,
        }
    }

    fn next_row(&mut self) {
        self.clock_row += 1;
        if self.clock_row > self.band.last_clock_row {
            self.clock_row = self.band.first_clock_row;
            self.column += 1;
        }
        (self.first, self.end) = self.band.range(self.clock_row);
    }

    fn next_column(&mut self) {
        self.column += 1;
        self.clock_row = self.band.first_clock_row;
        (self.first, self.end) = self.band.range(self.clock_row);
    }
}

/// Placement of the partition being mapped.
struct Placement<'a> {
    fabric: &'a Fabric,
    first_column: u32,
    last_column: u32,
}

impl Placement<'_> {
    /// Pack units of one kind of one group. Returns one range list per unit.
    fn pack(
        &self,
        band: Band,
        pool: &mut FramePool,
        column: &mut usize,
        units: &[(usize, usize)],
        pad_even: bool,
    ) -> Result<Vec<Vec<FrameRange>>, RefabricError> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        if band.is_empty() {
            return Err(RefabricError::Argument(format!(
                "No room for {} units inside the partition rows",
                pool.kind().name()
            )));
        }
        let initial = *column;
        let mut cursor = Cursor::new(band, *column);
        let mut placed = Vec::with_capacity(units.len());
        for (n, &(payload, reserved)) in units.iter().enumerate() {
            let mut remaining = payload;
            let mut ranges = Vec::new();
            while remaining > 0 {
                if cursor.first >= cursor.end {
                    cursor.next_row();
                }
                let far = self.fabric.logic_slice_address(
                    cursor.clock_row,
                    self.first_column,
                    self.last_column,
                    cursor.column,
                )?;
                let take = remaining.min(cursor.end.saturating_sub(cursor.first));
                if take == 0 {
                    continue;
                }
                let slot = pool.bind(far)?;
                ranges.push(FrameRange {
                    slot,
                    first: cursor.first,
                    last: cursor.first + take - 1,
                });
                cursor.first += take;
                remaining -= take;
            }
            if n + 1 == units.len() {
                cursor.next_column();
                if cursor.column - initial < reserved {
                    cursor.column = initial + reserved;
                }
            }
            if pad_even && cursor.first % 2 == 1 {
                cursor.first += 1;
            }
            placed.push(ranges);
        }
        *column = cursor.column;
        Ok(placed)
    }
}

/// Compute the fine-grain layout of `element` placed with its lower-left corner at device
/// column `column`, device row `row`.
///
/// Frame slots are bound in `pools` as addresses are resolved; a failure part way leaves
/// the slots bound so far in place.
///
/// # Returns: `Result<FineGrainLayout, RefabricError>`
/// * `Ok(FineGrainLayout)` - Ranges of every unit
/// * `Err(RefabricError::AddressLookup)` - A unit would land outside the partition's logic-cell columns
/// * `Err(RefabricError::PoolExhausted)` - A pool has no slot left for a new frame address
pub fn compute_layout(
    fabric: &Fabric,
    pools: &mut FramePools,
    element: &ElementDescriptor,
    column: u32,
    row: u32,
) -> Result<FineGrainLayout, RefabricError> {
    let placement = Placement {
        fabric,
        first_column: column,
        last_column: column + element.width - 1,
    };
    let mut layout = FineGrainLayout {
        constants: vec![Vec::new(); element.constants.len()],
        selectors: vec![Vec::new(); element.selectors.len()],
        operations: vec![Vec::new(); element.operations.len()],
    };

    for group in element.groups() {
        let mut cursor = group;

        let (index, units): (Vec<usize>, Vec<(usize, usize)>) = element
            .constants
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group == group)
            .map(|(i, c)| (i, (c.bits, c.columns)))
            .unzip();
        let ranges = placement.pack(
            Band::constants(row, element.height),
            &mut pools.constants,
            &mut cursor,
            &units,
            true,
        )?;
        for (i, r) in index.into_iter().zip(ranges) {
            layout.constants[i] = r;
        }

        let (index, units): (Vec<usize>, Vec<(usize, usize)>) = element
            .selectors
            .iter()
            .enumerate()
            .filter(|(_, s)| s.group == group)
            .map(|(i, s)| (i, (s.luts(), s.columns)))
            .unzip();
        let ranges = placement.pack(
            Band::selectors(row, element.height),
            &mut pools.selectors,
            &mut cursor,
            &units,
            false,
        )?;
        for (i, r) in index.into_iter().zip(ranges) {
            let levels = element.selectors[i].levels();
            let mut offset = 0;
            layout.selectors[i] = r
                .into_iter()
                .map(|range| {
                    let level = offset % levels;
                    offset += range.len();
                    SelectorRange { range, level }
                })
                .collect();
        }

        let (index, units): (Vec<usize>, Vec<(usize, usize)>) = element
            .operations
            .iter()
            .enumerate()
            .filter(|(_, o)| o.group == group)
            .map(|(i, o)| (i, (o.blocks, o.columns)))
            .unzip();
        let ranges = placement.pack(
            Band::operations(row, element.height),
            &mut pools.operations,
            &mut cursor,
            &units,
            false,
        )?;
        for (i, r) in index.into_iter().zip(ranges) {
            layout.operations[i] = r;
        }
        debug!(
            "{}: group {group} packed into slice columns {group}..{cursor}",
            element.name
        );
    }
    Ok(layout)
}
