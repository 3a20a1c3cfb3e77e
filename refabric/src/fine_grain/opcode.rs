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

//! Operation-unit functions and the template memory of the fast patch engine.
//!
//! The patch engine expands compact per-LUT values into full LUT frames using templates
//! loaded once at start-up: constant encodings, selector input masks and the truth
//! tables of every operation-unit function.

use serde::Deserialize;

/// Template word of the first selector template.
pub const SELECTOR_TEMPLATE_OFFSET: usize = 16;
/// Template word of the first operation truth table (byte offset 1024).
pub const OPERATION_TEMPLATE_OFFSET: usize = 256;
/// Template words per operation truth table.
pub const OPERATION_TEMPLATE_WORDS: usize = 8;

/// LUT-input masks feeding the 4:1 selector LUT-halves.
const SELECTOR_MASKS: [u32; 4] = [0x5555, 0x3333, 0x0F0F, 0x00FF];

/// Function programmed into a 4-bit compute block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    AddSat,
    Subtract,
    SubtractSat,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Not,
    ShiftRight1,
    ShiftLeft1,
    Max,
    Min,
    Average,
    GreaterOrEqual,
    LessOrEqual,
}

impl Operation {
    pub const ALL: [Operation; 18] = [
        Operation::Add,
        Operation::AddSat,
        Operation::Subtract,
        Operation::SubtractSat,
        Operation::And,
        Operation::Or,
        Operation::Xor,
        Operation::Nand,
        Operation::Nor,
        Operation::Xnor,
        Operation::Not,
        Operation::ShiftRight1,
        Operation::ShiftLeft1,
        Operation::Max,
        Operation::Min,
        Operation::Average,
        Operation::GreaterOrEqual,
        Operation::LessOrEqual,
    ];

    /// 5-bit code stored per compute block.
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

/// (stage 1, stage 2) LUT truth tables, indexed by opcode. The high half of each word is
/// the first LUT function, the low half the second.
const TRUTH_TABLES: [[u32; 2]; 18] = [
    [0x033C_033C, 0x3333_3333],
    [0x033C_033C, 0x33FF_33FF],
    [0x30C3_30C3, 0xCC00_CC00],
    [0x30C3_30C3, 0xCC00_CC00],
    [0x0000_0000, 0x0000_5555],
    [0x0000_0000, 0x5555_FFFF],
    [0x0000_0000, 0x5555_AAAA],
    [0x0000_0000, 0xFFFF_AAAA],
    [0x0000_0000, 0xAAAA_0000],
    [0x0000_0000, 0xAAAA_5555],
    [0x0000_0000, 0xAAAA_AAAA],
    [0x000F_000F, 0x0F0F_0F0F],
    [0x0F00_0F00, 0x3333_3333],
    [0x0CC3_0CC3, 0x5500_55FF],
    [0x0CC3_0CC3, 0x5500_55FF],
    [0x033C_033C, 0x0F0F_0F0F],
    [0x30C3_30C3, 0xFF00_FF00],
    [0x0CC3_0CC3, 0xFF00_FF00],
];

/// 16-bit LUT-half pattern of a 2-bit constant.
fn constant_half(bits: u32) -> u32 {
    match bits & 0x3 {
        0 => 0x0000,
        1 => 0xFF00,
        2 => 0x00FF,
        _ => 0xFFFF,
    }
}

fn duplicated(half: u32) -> u32 {
    (half << 16) | half
}

/// Every (template index, word) pair of the patch engine's template memory.
pub fn templates() -> Vec<(usize, u32)> {
    let mut words = Vec::new();
    for c in 0..16u32 {
        words.push((c as usize, constant_half(c) | (constant_half(c >> 2) << 16)));
    }
    for (i, high) in SELECTOR_MASKS.iter().enumerate() {
        for (j, low) in SELECTOR_MASKS.iter().enumerate() {
            words.push((SELECTOR_TEMPLATE_OFFSET + 4 * i + j, (high << 16) | low));
        }
    }
    for (n, [stage1, stage2]) in TRUTH_TABLES.iter().enumerate() {
        let base = OPERATION_TEMPLATE_OFFSET + n * OPERATION_TEMPLATE_WORDS;
        let table = [
            duplicated(stage1 >> 16),
            duplicated(stage1 >> 16),
            duplicated(stage2 >> 16),
            duplicated(stage2 >> 16),
            duplicated(stage1 & 0xFFFF),
            duplicated(stage1 & 0xFFFF),
            duplicated(stage2 & 0xFFFF),
            duplicated(stage2 & 0xFFFF),
        ];
        words.extend(table.iter().enumerate().map(|(k, &w)| (base + k, w)));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_follow_declaration_order() {
        for (n, op) in Operation::ALL.iter().enumerate() {
            assert_eq!(op.opcode(), n as u32);
        }
        assert_eq!(Operation::LessOrEqual.opcode(), 17);
    }

    #[test]
    fn test_constant_templates() {
        let words = templates();
        assert_eq!(words[0], (0, 0x0000_0000));
        assert_eq!(words[1], (1, 0x0000_FF00));
        assert_eq!(words[10], (10, 0x00FF_00FF));
        assert_eq!(words[15], (15, 0xFFFF_FFFF));
    }

    #[test]
    fn test_selector_templates() {
        let words = templates();
        assert_eq!(words[16], (16, 0x5555_5555));
        assert_eq!(words[17], (17, 0x5555_3333));
        assert_eq!(words[31], (31, 0x00FF_00FF));
    }

    #[test]
    fn test_add_truth_table_layout() {
        let words = templates();
        let add: Vec<u32> = words[32..40].iter().map(|&(_, w)| w).collect();
        assert_eq!(words[32].0, 256);
        assert_eq!(
            add,
            vec![
                0x033C_033C,
                0x033C_033C,
                0x3333_3333,
                0x3333_3333,
                0x033C_033C,
                0x033C_033C,
                0x3333_3333,
                0x3333_3333
            ]
        );
        assert_eq!(words.len(), 32 + 18 * 8);
    }
}
