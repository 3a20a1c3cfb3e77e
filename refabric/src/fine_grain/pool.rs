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

//! Frame-slot pools.
//!
//! Each fine-grain kind owns a fixed number of frame slots. A slot is bound to a frame
//! address the first time a layout references that address and is reused by every later
//! reference to the same address, so units of different partitions that share a LUT
//! frame edit the same buffer. Slots are only released by [`FramePool::reset`].

use crate::error::RefabricError;
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Constant,
    Selector,
    Operation,
}

impl SlotKind {
    /// Compact words the patch engine expands into the slot's frames.
    pub const fn words(self) -> usize {
        match self {
            SlotKind::Constant | SlotKind::Selector => 13,
            SlotKind::Operation => 5,
        }
    }

    /// Frames rewritten per patch.
    pub const fn frames(self) -> u32 {
        match self {
            SlotKind::Constant | SlotKind::Selector => 1,
            SlotKind::Operation => 2,
        }
    }

    /// Kind field of the patch descriptor.
    pub const fn descriptor_kind(self) -> u32 {
        match self {
            SlotKind::Constant => 0,
            SlotKind::Selector => 1,
            SlotKind::Operation => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SlotKind::Constant => "constant",
            SlotKind::Selector => "selector",
            SlotKind::Operation => "operation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    pub address: Option<u32>,
    pub words: Vec<u32>,
    pub dirty: bool,
}

#[derive(Debug, Clone)]
pub struct FramePool {
    kind: SlotKind,
    slots: Vec<FrameSlot>,
}

impl FramePool {
    pub fn new(kind: SlotKind, capacity: usize) -> FramePool {
        let slot = FrameSlot {
            address: None,
            words: vec![0; kind.words()],
            dirty: false,
        };
        FramePool {
            kind,
            slots: vec![slot; capacity],
        }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn bound(&self) -> usize {
        self.slots.iter().filter(|s| s.address.is_some()).count()
    }

    /// Unbind every slot and clear its buffer.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.address = None;
            slot.words.fill(0);
            slot.dirty = false;
        }
    }

    /// Index of the slot bound to `far`, binding a free slot if none is.
    ///
    /// # Returns: `Result<usize, RefabricError>`
    /// * `Ok(usize)` - Slot index, stable for the lifetime of the pool
    /// * `Err(RefabricError::PoolExhausted)` - Every slot is bound to another address
    pub fn bind(&mut self, far: u32) -> Result<usize, RefabricError> {
        if let Some(index) = self.slots.iter().position(|s| s.address == Some(far)) {
            return Ok(index);
        }
        match self.slots.iter().position(|s| s.address.is_none()) {
            Some(index) => {
                trace!("Binding {} slot {index} to {far:#010x}", self.kind.name());
                self.slots[index].address = Some(far);
                Ok(index)
            }
            None => Err(RefabricError::PoolExhausted {
                kind: self.kind.name(),
                far,
            }),
        }
    }

    pub fn slot(&self, index: usize) -> Result<&FrameSlot, RefabricError> {
        self.slots.get(index).ok_or_else(|| {
            RefabricError::Internal(format!("No {} slot {index}", self.kind.name()))
        })
    }

    pub fn slot_mut(&mut self, index: usize) -> Result<&mut FrameSlot, RefabricError> {
        let kind = self.kind;
        self.slots.get_mut(index).ok_or_else(|| {
            RefabricError::Internal(format!("No {} slot {index}", kind.name()))
        })
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut FrameSlot> {
        self.slots.iter_mut()
    }

    pub fn dirty(&self) -> usize {
        self.slots.iter().filter(|s| s.dirty).count()
    }
}

/// The three pools of the fine-grain subsystem.
#[derive(Debug, Clone)]
pub struct FramePools {
    pub constants: FramePool,
    pub selectors: FramePool,
    pub operations: FramePool,
}

impl FramePools {
    pub fn new(constant_slots: usize, selector_slots: usize, operation_slots: usize) -> FramePools {
        FramePools {
            constants: FramePool::new(SlotKind::Constant, constant_slots),
            selectors: FramePool::new(SlotKind::Selector, selector_slots),
            operations: FramePool::new(SlotKind::Operation, operation_slots),
        }
    }

    pub fn reset(&mut self) {
        self.constants.reset();
        self.selectors.reset();
        self.operations.reset();
    }
}
