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

use crate::session::open_session;
use refabric::config::EngineConfig;
use refabric::error::RefabricError;
use refabric::fine_grain::FrameRange;

fn ranges_line(unit: &str, ranges: impl Iterator<Item = FrameRange>) -> String {
    ranges
        .map(|r| format!("slot {} {unit} {}..={}", r.slot, r.first, r.last))
        .collect::<Vec<_>>()
        .join(", ")
}

/// computes the fine-grain layout of `element` at `at` without writing anything
pub fn layout_message(
    config: &EngineConfig,
    element: &str,
    at: (u32, u32),
) -> Result<String, RefabricError> {
    let mut session = open_session(config)?;
    let id = session.catalog().id_of(element)?;
    session.set_position(0, 0, at.0, at.1)?;
    session.add_static_region(0, 0, id)?;
    let partition = session.partition(0, 0)?;
    let location = partition.location();
    let mut ret_string = format!(
        "{element} at column {}, row {}: clock-region rows {}..={}, columns {}..={}\n",
        at.0, at.1, location.first_row, location.last_row, location.first_column, location.last_column
    );
    let layout = session.layout(0, 0)?;
    for (n, ranges) in layout.constants.iter().enumerate() {
        ret_string.push_str(&format!(
            "constant {n}: {}\n",
            ranges_line("bits", ranges.iter().copied())
        ));
    }
    for (n, ranges) in layout.selectors.iter().enumerate() {
        ret_string.push_str(&format!(
            "selector {n}: {}\n",
            ranges_line("luts", ranges.iter().map(|s| s.range))
        ));
    }
    for (n, ranges) in layout.operations.iter().enumerate() {
        ret_string.push_str(&format!(
            "operation {n}: {}\n",
            ranges_line("blocks", ranges.iter().copied())
        ));
    }
    Ok(ret_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_of_constant() {
        let config = EngineConfig::from_toml_str(
            r#"
            [engine]
            poll_timeout_ms = 20
            scratch_words = 65536
            [[element]]
            name = "group1_top_module"
            image = "group1_top_module.pbs"
            width = 6
            height = 16
            constant = [{ bits = 8 }]
            "#,
        )
        .unwrap();
        let message = layout_message(&config, "group1_top_module", (40, 25)).unwrap();
        assert!(message.contains("clock-region rows 0..=0, columns 40..=45"));
        assert!(message.contains("constant 0: slot 0 bits 200..=207"));
    }
}
