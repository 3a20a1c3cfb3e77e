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

use refabric::architecture::VirtualArchitecture;
use refabric::config::EngineConfig;
use refabric::error::RefabricError;
use refabric::fabric::fabric_for_device;
use refabric::image_store::{DirectoryImageStore, ImageStore};
use refabric::sim::SimulatedFabric;
use std::path::Path;

pub type Session = VirtualArchitecture<SimulatedFabric, DirectoryImageStore>;

/// Builds an initialised engine over a zeroed simulated fabric with images from `image_dir`
pub fn open_session(config: &EngineConfig) -> Result<Session, RefabricError> {
    let fabric = fabric_for_device(&config.device)?;
    let store = DirectoryImageStore::new(&config.image_dir);
    let mut session = VirtualArchitecture::new(config, SimulatedFabric::new(&fabric), store)?;
    session.init()?;
    Ok(session)
}

/// Stores `words` as a big-endian image at `out`
pub fn store_words(out: &Path, words: &[u32]) -> Result<(), RefabricError> {
    let name = out
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RefabricError::Argument(format!("{out:?} does not name a file")))?;
    let dir = match out.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    DirectoryImageStore::new(dir).store(name, words)
}
