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

//! Zynq-7020 column map.
//!
//! All three clock-region rows share the same column sequence. Row 0 is the bottom half
//! row of the device, rows 1 and 2 are the two top half rows.

use super::{BlockKind, ColumnInfo, Fabric};

pub(super) const DEVICE: &str = "xc7z020";
const IDCODE: u32 = 0x0372_7093;

/// Placeholder for a logic-cell column. Resolved to `ClbM`/`ClbL` while building rows.
const CLB: Option<BlockKind> = None;

const COLUMNS: &[(Option<BlockKind>, usize)] = &[
    (Some(BlockKind::IobA), 1),
    (Some(BlockKind::IobB), 1),
    (CLB, 4),
    (Some(BlockKind::Bram), 1),
    (CLB, 2),
    (Some(BlockKind::Dsp), 1),
    (CLB, 4),
    (Some(BlockKind::Dsp), 1),
    (CLB, 2),
    (Some(BlockKind::Bram), 1),
    (CLB, 4),
    (Some(BlockKind::Bram), 1),
    (CLB, 2),
    (Some(BlockKind::Dsp), 1),
    (CLB, 7),
    (Some(BlockKind::Clk), 1),
    (CLB, 2),
    (Some(BlockKind::Bram), 1),
    (CLB, 13),
    (Some(BlockKind::Cfg), 1),
    (CLB, 5),
    (Some(BlockKind::Bram), 1),
    (CLB, 2),
    (Some(BlockKind::Dsp), 1),
    (CLB, 4),
    (Some(BlockKind::Dsp), 1),
    (CLB, 2),
    (Some(BlockKind::Bram), 1),
    (CLB, 4),
    (Some(BlockKind::IobB), 1),
    (Some(BlockKind::IobA), 1),
];

/// (half bit, major row) of each clock-region row.
const ROWS: [(u32, u32); 3] = [(1, 0), (0, 0), (0, 1)];

fn row(top: u32, major_row: u32) -> Vec<ColumnInfo> {
    let mut columns = Vec::new();
    let mut ram_columns = 0;
    for &(kind, count) in COLUMNS {
        for n in 0..count {
            // logic-cell runs start with an M column and alternate
            let kind = kind.unwrap_or(if n % 2 == 0 {
                BlockKind::ClbM
            } else {
                BlockKind::ClbL
            });
            let ram_column = if kind == BlockKind::Bram {
                ram_columns += 1;
                Some(ram_columns - 1)
            } else {
                None
            };
            columns.push(ColumnInfo {
                kind,
                frames: kind.frames(),
                top,
                major_row,
                ram_column,
            });
        }
    }
    columns
}

pub(super) fn fabric() -> Fabric {
    Fabric::new(
        DEVICE,
        IDCODE,
        ROWS.iter().map(|&(top, major)| row(top, major)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_map() {
        let fabric = fabric();
        assert_eq!(fabric.columns(0), 74);
        assert_eq!(fabric.column(1, 33).unwrap().kind, BlockKind::Clk);
        assert_eq!(fabric.column(2, 50).unwrap().kind, BlockKind::Cfg);
        assert!((37..=49).all(|c| fabric.column(0, c).unwrap().kind.is_logic_cell()));
        assert_eq!(fabric.column(0, 36).unwrap().ram_column, Some(3));
        assert_eq!(fabric.column(0, 0).unwrap().top, 1);
        assert_eq!(fabric.column(2, 0).unwrap().major_row, 1);
    }
}
