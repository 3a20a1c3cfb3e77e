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

use crate::catalog::ElementDescriptor;
use crate::error::RefabricError;
use crate::system_io::fs_read;
use serde::Deserialize;
use std::path::Path;

/// This is the top level struct which holds all sections
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TomlConfig {
    pub(crate) engine: Option<EngineToml>,
    pub(crate) fine_grain: Option<FineGrainToml>,
    pub(crate) element: Option<Vec<ElementDescriptor>>,
}

/// This is the "engine" section struct
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineToml {
    pub(crate) device: Option<String>,
    pub(crate) grid_width: Option<usize>,
    pub(crate) grid_height: Option<usize>,
    pub(crate) scratch_words: Option<usize>,
    pub(crate) poll_timeout_ms: Option<u64>,
    pub(crate) image_dir: Option<String>,
}

/// This is the "fine_grain" section struct
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FineGrainToml {
    pub(crate) constant_slots: Option<usize>,
    pub(crate) selector_slots: Option<usize>,
    pub(crate) operation_slots: Option<usize>,
}

impl EngineToml {
    pub(crate) fn merge(self, fallback: EngineToml) -> EngineToml {
        EngineToml {
            device: self.device.or(fallback.device),
            grid_width: self.grid_width.or(fallback.grid_width),
            grid_height: self.grid_height.or(fallback.grid_height),
            scratch_words: self.scratch_words.or(fallback.scratch_words),
            poll_timeout_ms: self.poll_timeout_ms.or(fallback.poll_timeout_ms),
            image_dir: self.image_dir.or(fallback.image_dir),
        }
    }
}

impl FineGrainToml {
    pub(crate) fn merge(self, fallback: FineGrainToml) -> FineGrainToml {
        FineGrainToml {
            constant_slots: self.constant_slots.or(fallback.constant_slots),
            selector_slots: self.selector_slots.or(fallback.selector_slots),
            operation_slots: self.operation_slots.or(fallback.operation_slots),
        }
    }
}

impl TomlConfig {
    /// Section-wise merge. The element catalog is taken whole from whichever file has one.
    pub(crate) fn merge(self, fallback: TomlConfig) -> TomlConfig {
        TomlConfig {
            engine: Some(
                self.engine
                    .unwrap_or_default()
                    .merge(fallback.engine.unwrap_or_default()),
            ),
            fine_grain: Some(
                self.fine_grain
                    .unwrap_or_default()
                    .merge(fallback.fine_grain.unwrap_or_default()),
            ),
            element: self.element.or(fallback.element),
        }
    }
}

pub(crate) fn toml_str_to_config(toml_string: &str) -> Result<TomlConfig, RefabricError> {
    let config: TomlConfig = match toml::from_str(toml_string) {
        Ok(config) => config,
        Err(e) => {
            return Err(RefabricError::TomlDe {
                toml_string: toml_string.into(),
                e,
            });
        }
    };
    Ok(config)
}

pub(crate) fn config_from_file(file_path: &Path) -> Result<TomlConfig, RefabricError> {
    if !file_path.is_file() {
        return Err(RefabricError::Internal(format!(
            "Config file not found in {file_path:?}"
        )));
    }
    toml_str_to_config(&fs_read(file_path)?)
}
