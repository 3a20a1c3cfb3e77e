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

//! Configuration port abstraction.
//!
//! The engine talks to the device through two narrow hardware interfaces:
//!
//! - [`ConfigTransport`] - the bulk partial-configuration path. Command streams and frame
//!   data are pushed (or pulled) as DMA-style transfers whose completion is signalled by
//!   two independent status flags.
//! - [`PatchPort`] - the fast patch path of the fine-grain engine: a small payload window,
//!   a template memory and a descriptor register that self-clears when a patch is done.
//!
//! [`pcap::BulkDriver`] and [`icap::PatchDriver`] frame requests into these protocols.
//! Every busy-wait goes through a [`Poller`] so a hung device surfaces as
//! `RefabricError::HardwareTimeout` instead of blocking forever.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use refabric::port::{ConfigTransport, Poller};
//! # use refabric::port::pcap::BulkDriver;
//! # use refabric::sim::SimulatedFabric;
//! # use refabric::fabric::fabric_for_device;
//! # use std::time::Duration;
//! # fn example() -> Result<(), refabric::error::RefabricError> {
//! let fabric = fabric_for_device("xc7z020")?;
//! let mut hw = SimulatedFabric::new(&fabric);
//! let poller = Poller::new(Duration::from_millis(100));
//! let mut driver = BulkDriver::new(&mut hw, &poller);
//! driver.init()?;
//! let mut frames = vec![0; fabric.words_in_span(0, 40, 45)? + 101];
//! let words = driver.read_row(&fabric, 0, 40, 45, &mut frames)?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "fine-grain")]
pub mod icap;
pub mod packet;
pub mod pcap;

use crate::error::RefabricError;
use log::trace;
use std::time::{Duration, Instant};

/// One transfer over the bulk configuration path.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Push words into the configuration port.
    Write(&'a [u32]),
    /// Pull words out of the configuration port into the buffer.
    Read(&'a mut [u32]),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatus {
    pub dma_done: bool,
    pub port_done: bool,
}

/// Bulk partial-configuration transport.
pub trait ConfigTransport {
    /// `true` once the transport has been brought up and can accept transfers.
    fn ready(&mut self) -> bool;
    /// Queue a transfer. An error means the transport rejected it.
    fn submit(&mut self, transfer: Transfer<'_>) -> Result<(), RefabricError>;
    fn status(&mut self) -> TransportStatus;
    fn clear_status(&mut self);
}

/// Fast patch path of the fine-grain engine.
pub trait PatchPort {
    /// Descriptor/control register. Bit 0 is set while a patch is in flight.
    fn read_control(&mut self) -> u32;
    fn write_control(&mut self, word: u32);
    /// Word `index` of the patch payload window.
    fn write_payload(&mut self, index: usize, word: u32);
    /// Word `index` of the template memory.
    fn write_template(&mut self, index: usize, word: u32);
}

/// Bounded busy-wait.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    timeout: Duration,
}

impl Poller {
    pub fn new(timeout: Duration) -> Poller {
        Poller { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Spin until `done` returns `true` or the timeout elapses.
    pub fn wait_until(
        &self,
        what: &'static str,
        mut done: impl FnMut() -> bool,
    ) -> Result<(), RefabricError> {
        let start = Instant::now();
        loop {
            if done() {
                return Ok(());
            }
            if start.elapsed() >= self.timeout {
                trace!("Gave up waiting for {what}");
                return Err(RefabricError::HardwareTimeout {
                    what,
                    timeout_ms: self.timeout.as_millis(),
                });
            }
            std::hint::spin_loop();
        }
    }
}
