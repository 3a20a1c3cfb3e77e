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

use crate::session::{open_session, store_words};
use log::info;
use refabric::composer::StackMode;
use refabric::config::EngineConfig;
use refabric::error::RefabricError;
use std::path::Path;

/// composes `element` at `at` over the simulated fabric and stores the composed rows
pub fn compose_element(
    config: &EngineConfig,
    element: &str,
    at: (u32, u32),
    out: &Path,
) -> Result<String, RefabricError> {
    let mut session = open_session(config)?;
    let id = session.catalog().id_of(element)?;
    session.set_position(0, 0, at.0, at.1)?;
    session.bind_element_stacked(0, 0, Some(id), StackMode::First)?;
    let composer = session.composer();
    store_words(out, composer.composed())?;
    info!("Composed {element} into {out:?}");
    Ok(format!(
        "{} clock-region rows ({} words) of {element} stored in {out:?}\n",
        composer.segments().len(),
        composer.composed().len()
    ))
}
