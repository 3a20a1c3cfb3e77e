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

//! Value edits of cached frame-slot buffers.
//!
//! Patches only touch the in-memory slot buffers and mark the slots dirty; nothing reaches
//! the device before the dirty slots are committed through the patch port.

use crate::error::RefabricError;
use crate::fine_grain::mapper::{FrameRange, SelectorRange};
use crate::fine_grain::pool::FramePool;
use log::trace;

/// Code of a LUT-half below the level that selects the input.
pub const SELECTOR_PASS_THROUGH: u32 = 0b00;
/// Code of a LUT-half above the level that selects the input.
pub const SELECTOR_OVERRIDE: u32 = 0b11;

const LUTS_PER_WORD: usize = 16;
const OPERATION_CODE_BITS: usize = 5;
const BLOCKS_PER_WORD: usize = 32 / OPERATION_CODE_BITS;
const OPERATION_CODE_MASK: u32 = 0x1F;

/// `len` bits of `value` starting at bit `offset`, least significant word first.
fn value_bits(value: &[u32], offset: usize, len: usize) -> u32 {
    let lo = value.get(offset / 32).copied().unwrap_or(0) as u64;
    let hi = value.get(offset / 32 + 1).copied().unwrap_or(0) as u64;
    let bits = ((hi << 32) | lo) >> (offset % 32);
    (bits & ((1u64 << len) - 1)) as u32
}

fn merge(word: &mut u32, mask: u32, bits: u32) {
    *word = (*word & !mask) | (bits & mask);
}

/// Write `value` (least significant word first) into the bit ranges of a constant.
pub fn patch_constant(
    pool: &mut FramePool,
    ranges: &[FrameRange],
    value: &[u32],
) -> Result<(), RefabricError> {
    let mut sent = 0;
    for range in ranges {
        let slot = pool.slot_mut(range.slot)?;
        let len = range.len();
        if len == 32 && range.first % 32 == 0 {
            slot.words[range.first / 32] = value_bits(value, sent, 32);
        } else if len == 16 && range.first % 16 == 0 {
            let shift = range.first % 32;
            let word = &mut slot.words[range.first / 32];
            merge(word, 0xFFFF << shift, value_bits(value, sent, 16) << shift);
        } else {
            for n in 0..len {
                let bit = range.first + n;
                let word = &mut slot.words[bit / 32];
                merge(word, 1 << (bit % 32), value_bits(value, sent + n, 1) << (bit % 32));
            }
        }
        trace!(
            "Constant bits {}..={} of slot {} updated",
            range.first, range.last, range.slot
        );
        slot.dirty = true;
        sent += len;
    }
    Ok(())
}

/// Read a constant back out of its bit ranges, least significant word first.
pub fn read_constant(pool: &FramePool, ranges: &[FrameRange]) -> Result<Vec<u32>, RefabricError> {
    let total: usize = ranges.iter().map(FrameRange::len).sum();
    let mut value = vec![0; total.div_ceil(32)];
    let mut sent = 0;
    for range in ranges {
        let slot = pool.slot(range.slot)?;
        for bit in range.first..=range.last {
            if (slot.words[bit / 32] >> (bit % 32)) & 1 == 1 {
                value[sent / 32] |= 1 << (sent % 32);
            }
            sent += 1;
        }
    }
    Ok(value)
}

/// 2-bit code of the LUT-half at cascade `level` for selector input `value`.
///
/// Every level of the cascade is a 4:1 multiplexer; level 0 selects among inputs 0..=3,
/// every further level adds three inputs and forwards the previous level on its code 3.
pub fn selector_code(value: usize, level: usize) -> u32 {
    let target = value.saturating_sub(1) / 3;
    if target > level {
        SELECTOR_PASS_THROUGH
    } else if target < level {
        SELECTOR_OVERRIDE
    } else if value <= 3 {
        value as u32
    } else {
        ((value - 4) % 3) as u32
    }
}

/// Program every LUT-half of a selector for input `value`.
pub fn patch_selector(
    pool: &mut FramePool,
    ranges: &[SelectorRange],
    levels: usize,
    value: usize,
) -> Result<(), RefabricError> {
    for selector in ranges {
        let range = selector.range;
        let slot = pool.slot_mut(range.slot)?;
        let mut level = selector.level;
        for lut in range.first..=range.last {
            let shift = 2 * (lut % LUTS_PER_WORD);
            let word = &mut slot.words[lut / LUTS_PER_WORD];
            merge(word, 0x3 << shift, selector_code(value, level) << shift);
            level = (level + 1) % levels;
        }
        slot.dirty = true;
    }
    Ok(())
}

/// Code programmed into the LUT-half `lut` of a selector slot.
pub fn read_selector_code(pool: &FramePool, slot: usize, lut: usize) -> Result<u32, RefabricError> {
    let word = pool.slot(slot)?.words[lut / LUTS_PER_WORD];
    Ok((word >> (2 * (lut % LUTS_PER_WORD))) & 0x3)
}

/// Give every 4-bit block of an operation unit the same opcode.
pub fn patch_operation(
    pool: &mut FramePool,
    ranges: &[FrameRange],
    opcode: u32,
) -> Result<(), RefabricError> {
    for range in ranges {
        let slot = pool.slot_mut(range.slot)?;
        for block in range.first..=range.last {
            let shift = OPERATION_CODE_BITS * (block % BLOCKS_PER_WORD);
            let word = &mut slot.words[block / BLOCKS_PER_WORD];
            merge(word, OPERATION_CODE_MASK << shift, opcode << shift);
        }
        slot.dirty = true;
    }
    Ok(())
}

/// Opcode stored for block `block` of an operation slot.
pub fn read_operation_code(pool: &FramePool, slot: usize, block: usize) -> Result<u32, RefabricError> {
    let word = pool.slot(slot)?.words[block / BLOCKS_PER_WORD];
    Ok((word >> (OPERATION_CODE_BITS * (block % BLOCKS_PER_WORD))) & OPERATION_CODE_MASK)
}
