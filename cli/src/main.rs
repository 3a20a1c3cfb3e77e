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

mod catalog;
mod compose;
mod extract;
mod layout;
mod session;

use clap::{Parser, Subcommand, arg, command};
use log::debug;
use refabric::config::{EngineConfig, USER_CONFIG, VENDOR_CONFIG};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "refabric")]
#[command(bin_name = "refabric")]
struct Cli {
    #[arg(
        long = "config",
        default_value = USER_CONFIG,
        help = r#"engine configuration file.
Keys missing from this file are taken from the vendor configuration
(/usr/lib/refabric/config.toml) and then from built-in defaults.
        "#
    )]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the elements of the catalog with their derived column counts
    Catalog,
    /// Print the fine-grain frame layout of an element placed at a device position
    Layout {
        #[arg(long)]
        element: String,
        #[arg(long, value_parser = parse_position, help = "device position as <column>,<row>")]
        at: (u32, u32),
    },
    /// Compose an element over the simulated fabric and store the composed rows
    Compose {
        #[arg(long)]
        element: String,
        #[arg(long, value_parser = parse_position, help = "device position as <column>,<row>")]
        at: (u32, u32),
        #[arg(long)]
        out: PathBuf,
    },
    /// Cut the region of an element out of the simulated fabric readback
    Extract {
        #[arg(long)]
        element: String,
        #[arg(long, value_parser = parse_position, help = "device position as <column>,<row>")]
        at: (u32, u32),
        #[arg(long)]
        out: PathBuf,
    },
}

/// parses `<column>,<row>`
fn parse_position(s: &str) -> Result<(u32, u32), String> {
    let (column, row) = s
        .split_once(',')
        .ok_or_else(|| format!("expected <column>,<row>, got {s:?}"))?;
    let column = column
        .trim()
        .parse()
        .map_err(|e| format!("bad column {column:?}: {e}"))?;
    let row = row
        .trim()
        .parse()
        .map_err(|e| format!("bad row {row:?}: {e}"))?;
    Ok((column, row))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    let config = EngineConfig::load(&cli.config, Path::new(VENDOR_CONFIG));
    let result = match cli.command {
        Commands::Catalog => catalog::catalog_message(&config),
        Commands::Layout { element, at } => layout::layout_message(&config, &element, at),
        Commands::Compose { element, at, out } => {
            compose::compose_element(&config, &element, at, &out)
        }
        Commands::Extract { element, at, out } => {
            extract::extract_element(&config, &element, at, &out)
        }
    }?;
    print!("{result}");
    Ok(())
}
