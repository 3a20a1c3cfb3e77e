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

//! Fine-grain reconfiguration.
//!
//! Constants, selectors and operation units of a placed element live in the LUTs of its
//! logic slices. Changing one of them edits a few bits of a LUT frame, so instead of a
//! readback/combine/write cycle the engine keeps a cached copy of every LUT frame it
//! touches ([`pool`]), edits those copies ([`patcher`]) at the positions computed at
//! placement time ([`mapper`]) and pushes the dirty ones through the fast patch port.

pub mod mapper;
pub mod opcode;
pub mod patcher;
pub mod pool;

pub use mapper::{FineGrainLayout, FrameRange, SelectorRange, compute_layout};
pub use opcode::Operation;
pub use pool::{FramePool, FramePools, SlotKind};
