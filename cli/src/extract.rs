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

use crate::session::store_words;
use refabric::composer::{Region, extract_region_image};
use refabric::config::EngineConfig;
use refabric::error::RefabricError;
use refabric::fabric::{FRAME_WORDS, fabric_for_device};
use refabric::port::Poller;
use refabric::port::pcap::BulkDriver;
use refabric::sim::SimulatedFabric;
use std::path::Path;

/// reads back the rows under `element` placed at `at` and stores the words its image carries
pub fn extract_element(
    config: &EngineConfig,
    element: &str,
    at: (u32, u32),
    out: &Path,
) -> Result<String, RefabricError> {
    let catalog = config.catalog()?;
    let descriptor = catalog.get(catalog.id_of(element)?)?;
    let region = Region::new(at.0, at.1, descriptor.width, descriptor.height);
    let fabric = fabric_for_device(&config.device)?;
    let mut hw = SimulatedFabric::new(&fabric);
    let poller = Poller::new(config.poll_timeout);
    let mut driver = BulkDriver::new(&mut hw, &poller);
    driver.init()?;

    let mut readback = Vec::new();
    for row in region.clock_rows() {
        let words = fabric.words_in_span(row, region.first_column, region.last_column)?;
        let mut dest = vec![0; words + FRAME_WORDS];
        let read = driver.read_row(&fabric, row, region.first_column, region.last_column, &mut dest)?;
        readback.extend_from_slice(&dest[..read]);
    }
    let image = extract_region_image(&readback, &fabric, &[region])?;
    store_words(out, &image)?;
    Ok(format!("{} words of {element} stored in {out:?}\n", image.len()))
}
