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

//! Fast patch protocol of the fine-grain engine.
//!
//! A patch rewrites the LUT frames at one frame address from a compact payload. The
//! driver writes the payload window, then the descriptor word; the engine sets bit 0 of
//! the control register while it works and clears the register when it is done.
//!
//! Descriptor layout: kind in bits 31..30, frame count in bits 28..26, frame address in
//! bits 25..0.

use crate::error::RefabricError;
use crate::fine_grain::opcode;
use crate::fine_grain::pool::FramePool;
use crate::port::{PatchPort, Poller};
use log::{debug, trace};

const BUSY: u32 = 1;
const FAR_MASK: u32 = 0x03FF_FFFF;

/// Descriptor word that starts a patch.
pub fn descriptor(kind: u32, frames: u32, far: u32) -> u32 {
    ((kind & 0x3) << 30) | ((frames & 0x7) << 26) | (far & FAR_MASK)
}

pub struct PatchDriver<'a, P: PatchPort> {
    port: &'a mut P,
    poller: &'a Poller,
}

impl<'a, P: PatchPort> PatchDriver<'a, P> {
    pub fn new(port: &'a mut P, poller: &'a Poller) -> PatchDriver<'a, P> {
        PatchDriver { port, poller }
    }

    /// Fill the template memory. Must run once before the first patch.
    pub fn load_templates(&mut self) {
        let templates = opcode::templates();
        for &(index, word) in &templates {
            self.port.write_template(index, word);
        }
        debug!("Loaded {} patch templates", templates.len());
    }

    /// Push every dirty slot of `pool` to the fabric and mark it clean.
    ///
    /// # Returns: `Result<usize, RefabricError>`
    /// * `Ok(usize)` - Number of patches issued
    /// * `Err(RefabricError::HardwareTimeout)` - The engine never went idle
    pub fn commit(&mut self, pool: &mut FramePool) -> Result<usize, RefabricError> {
        let kind = pool.kind();
        let mut issued = 0;
        for slot in pool.slots_mut().filter(|s| s.dirty) {
            let Some(far) = slot.address else {
                slot.dirty = false;
                continue;
            };
            let port = &mut *self.port;
            self.poller
                .wait_until("patch engine idle", || port.read_control() & BUSY == 0)?;
            for (index, &word) in slot.words.iter().enumerate() {
                self.port.write_payload(index, word);
            }
            trace!("Patching {} frame {far:#010x}", kind.name());
            self.port
                .write_control(descriptor(kind.descriptor_kind(), kind.frames(), far));
            slot.dirty = false;
            issued += 1;
        }
        let port = &mut *self.port;
        self.poller
            .wait_until("patch engine done", || port.read_control() == 0)?;
        if issued > 0 {
            debug!("Issued {issued} {} patches", kind.name());
        }
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::fabric_for_device;
    use crate::fine_grain::pool::SlotKind;
    use crate::sim::SimulatedFabric;
    use googletest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_descriptor_layout() {
        assert_eq!(descriptor(2, 2, 0x0040_1422), 0x8840_1422);
        assert_eq!(descriptor(1, 1, 0xFFFF_FFFF), 0x47FF_FFFF);
    }

    #[test]
    fn test_commit_only_dirty_slots() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let poller = Poller::new(Duration::from_millis(20));
        let mut pool = FramePool::new(SlotKind::Operation, 3);
        pool.bind(0x0040_1422).unwrap();
        pool.bind(0x0040_14A2).unwrap();
        let slot = pool.slot_mut(1).unwrap();
        slot.words = vec![1, 2, 3, 4, 5];
        slot.dirty = true;

        let issued = PatchDriver::new(&mut hw, &poller).commit(&mut pool).unwrap();
        assert_eq!(issued, 1);
        assert_eq!(pool.dirty(), 0);
        let patch = &hw.patches()[0];
        assert_eq!((patch.kind, patch.frames, patch.far), (2, 2, 0x0040_14A2));
        assert_eq!(patch.payload, vec![1, 2, 3, 4, 5]);

        let again = PatchDriver::new(&mut hw, &poller).commit(&mut pool).unwrap();
        assert_eq!(again, 0);
        assert_eq!(hw.patches().len(), 1);
    }

    #[test]
    fn test_templates_loaded() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let poller = Poller::new(Duration::from_millis(20));
        PatchDriver::new(&mut hw, &poller).load_templates();
        let templates = hw.templates();
        assert_eq!(templates[15], 0xFFFF_FFFF);
        assert_eq!(templates[opcode::OPERATION_TEMPLATE_OFFSET], 0x033C_033C);
    }

    #[gtest]
    fn test_busy_engine_times_out() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        hw.set_hung(true);
        let poller = Poller::new(Duration::from_millis(5));
        let mut pool = FramePool::new(SlotKind::Constant, 2);
        for far in [0x10, 0x20] {
            let index = pool.bind(far).unwrap();
            pool.slot_mut(index).unwrap().dirty = true;
        }
        let result = PatchDriver::new(&mut hw, &poller).commit(&mut pool);
        expect_that!(
            result,
            err(displays_as(contains_substring(
                "RefabricError::HardwareTimeout: Timed out after 5 ms waiting for patch engine idle"
            )))
        );
    }
}
