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

//! Run-time coarse- and fine-grain reconfiguration of FPGA fabric.
//!
//! `refabric` places reconfigurable elements into a grid of partitions on a running device
//! and changes them in place:
//!
//! - **Coarse grain**: [`architecture::VirtualArchitecture::bind_element`] swaps the
//!   module held by a partition. The partial image of the element is merged with the
//!   frames read back from the device by the [`composer`] so logic sharing the clock-region
//!   rows of the partition is preserved, and the result is written through the bulk
//!   configuration path ([`port::pcap`]).
//! - **Fine grain** (feature `fine-grain`, on by default): constants, selectors and
//!   operation units inside a placed element are patched by editing cached LUT frames
//!   ([`fine_grain`]) and committing them through the fast patch path.
//!
//! The device is reached through the [`port::ConfigTransport`] and [`port::PatchPort`]
//! traits; [`sim::SimulatedFabric`] implements both in memory.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use refabric::architecture::VirtualArchitecture;
//! # use refabric::config::EngineConfig;
//! # use refabric::fabric::fabric_for_device;
//! # use refabric::image_store::DirectoryImageStore;
//! # use refabric::sim::SimulatedFabric;
//! # fn example() -> Result<(), refabric::error::RefabricError> {
//! let config = EngineConfig::load_system();
//! let fabric = fabric_for_device(&config.device)?;
//! let store = DirectoryImageStore::new(&config.image_dir);
//! let mut arch = VirtualArchitecture::new(&config, SimulatedFabric::new(&fabric), store)?;
//! arch.init()?;
//! arch.set_position(0, 0, 40, 9)?;
//! arch.bind_element(0, 0, Some(arch.catalog().id_of("group2_bottom_module")?))?;
//! # Ok(())
//! # }
//! ```

pub mod architecture;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod fabric;
#[cfg(feature = "fine-grain")]
pub mod fine_grain;
pub mod image_store;
pub mod port;
pub mod sim;
pub mod system_io;
