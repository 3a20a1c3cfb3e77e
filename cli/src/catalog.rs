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

use refabric::config::EngineConfig;
use refabric::error::RefabricError;

/// lists every element with its footprint and the column count of each fine-grain unit
pub fn catalog_message(config: &EngineConfig) -> Result<String, RefabricError> {
    let catalog = config.catalog()?;
    let mut ret_string = String::from(
        "---- ELEMENTS ----\n\
        | id | name | image | width x height |\n",
    );
    for (id, element) in catalog.iter().enumerate() {
        ret_string.push_str(&format!(
            "{id} | {} | {} | {} x {}\n",
            element.name, element.image, element.width, element.height
        ));
        for (n, c) in element.constants.iter().enumerate() {
            ret_string.push_str(&format!(
                "    constant {n}: {} bits, group {}, {} columns\n",
                c.bits, c.group, c.columns
            ));
        }
        for (n, s) in element.selectors.iter().enumerate() {
            ret_string.push_str(&format!(
                "    selector {n}: {} x {}:1 ({} levels), group {}, {} columns\n",
                s.data_width,
                s.inputs,
                s.levels(),
                s.group,
                s.columns
            ));
        }
        for (n, o) in element.operations.iter().enumerate() {
            ret_string.push_str(&format!(
                "    operation {n}: {} blocks, group {}, {} columns\n",
                o.blocks, o.group, o.columns
            ));
        }
    }
    Ok(ret_string)
}
