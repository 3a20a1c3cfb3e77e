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

//! Engine configuration.
//!
//! Settings come from TOML files: the vendor file under `/usr/lib/refabric/` provides
//! the defaults of a board, the user file under `/etc/refabric/` overrides them key by
//! key, and every key missing from both falls back to a hard-coded value. The `[[element]]`
//! tables form the element catalog.
//!
//! ```toml
//! [engine]
//! device = "xc7z020"
//! grid_width = 1
//! grid_height = 2
//! image_dir = "/var/lib/refabric/images"
//!
//! [fine_grain]
//! constant_slots = 16
//!
//! [[element]]
//! name = "group1_top_module"
//! image = "group1_top_module.pbs"
//! width = 6
//! height = 16
//! constant = [{ bits = 8 }, { bits = 8 }]
//! selector = [{ data_width = 8, inputs = 2 }]
//! operation = [{ blocks = 2 }]
//! ```

pub(crate) mod config_files;

use crate::catalog::{ElementCatalog, ElementDescriptor};
use crate::config::config_files::{TomlConfig, config_from_file, toml_str_to_config};
use crate::error::RefabricError;
use log::{trace, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

// These are hardcoded backups used when neither config file sets a key
pub static DEVICE: &str = "xc7z020";
pub static IMAGE_DIR: &str = "/var/lib/refabric/images";
pub static VENDOR_CONFIG: &str = "/usr/lib/refabric/config.toml";
pub static USER_CONFIG: &str = "/etc/refabric/config.toml";
pub const GRID_WIDTH: usize = 1;
pub const GRID_HEIGHT: usize = 1;
pub const SCRATCH_WORDS: usize = 1 << 20;
pub const POLL_TIMEOUT_MS: u64 = 1000;
pub const CONSTANT_SLOTS: usize = 16;
pub const SELECTOR_SLOTS: usize = 16;
pub const OPERATION_SLOTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name of the fabric template.
    pub device: String,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Size of the composer scratch buffer in words.
    pub scratch_words: usize,
    pub poll_timeout: Duration,
    pub image_dir: PathBuf,
    pub constant_slots: usize,
    pub selector_slots: usize,
    pub operation_slots: usize,
    pub elements: Vec<ElementDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        TomlConfig::default().into()
    }
}

impl From<TomlConfig> for EngineConfig {
    fn from(value: TomlConfig) -> Self {
        trace!("Creating EngineConfig from {value:?}");
        let engine = value.engine.unwrap_or_default();
        let fine_grain = value.fine_grain.unwrap_or_default();
        EngineConfig {
            device: engine.device.unwrap_or_else(|| {
                trace!("No device provided. Using hardcoded value.");
                DEVICE.to_string()
            }),
            grid_width: engine.grid_width.unwrap_or(GRID_WIDTH),
            grid_height: engine.grid_height.unwrap_or(GRID_HEIGHT),
            scratch_words: engine.scratch_words.unwrap_or_else(|| {
                trace!("No scratch_words provided. Using hardcoded value.");
                SCRATCH_WORDS
            }),
            poll_timeout: Duration::from_millis(engine.poll_timeout_ms.unwrap_or_else(|| {
                trace!("No poll_timeout_ms provided. Using hardcoded value.");
                POLL_TIMEOUT_MS
            })),
            image_dir: PathBuf::from(engine.image_dir.unwrap_or_else(|| {
                trace!("No image_dir provided. Using hardcoded value.");
                IMAGE_DIR.to_string()
            })),
            constant_slots: fine_grain.constant_slots.unwrap_or(CONSTANT_SLOTS),
            selector_slots: fine_grain.selector_slots.unwrap_or(SELECTOR_SLOTS),
            operation_slots: fine_grain.operation_slots.unwrap_or(OPERATION_SLOTS),
            elements: value.element.unwrap_or_else(|| {
                trace!("No elements provided. Starting with an empty catalog.");
                Vec::new()
            }),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(toml_string: &str) -> Result<EngineConfig, RefabricError> {
        Ok(toml_str_to_config(toml_string)?.into())
    }

    pub fn from_file(file_path: &Path) -> Result<EngineConfig, RefabricError> {
        Ok(config_from_file(file_path)?.into())
    }

    /// User config overrides vendor config and vendor config overrides hardcoded defaults
    pub fn load(user_path: &Path, vendor_path: &Path) -> EngineConfig {
        let vendor_config = config_from_file(vendor_path).unwrap_or_else(|e| {
            warn!("Using hardcoded values for vendor config because loading config failed: {e}");
            TomlConfig::default()
        });
        let user_config = config_from_file(user_path).unwrap_or_else(|e| {
            warn!("Using hardcoded values for user config because loading config failed: {e}");
            TomlConfig::default()
        });
        trace!("Merging user_config: {user_config:?} with vendor_config {vendor_config:?}");
        user_config.merge(vendor_config).into()
    }

    /// Load the system-wide vendor and user files.
    pub fn load_system() -> EngineConfig {
        EngineConfig::load(Path::new(USER_CONFIG), Path::new(VENDOR_CONFIG))
    }

    /// Finalize the configured elements into a catalog.
    pub fn catalog(&self) -> Result<ElementCatalog, RefabricError> {
        ElementCatalog::new(self.elements.clone())
    }
}
