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

//! Failure kinds of the reconfiguration engine.
//!
//! Every fallible operation in the crate returns [`RefabricError`]. Everything except
//! [`RefabricError::PartialWrite`] is raised before the configuration port is written,
//! so the fabric is untouched and the caller may simply retry with corrected input.
//! A partial write means some frames may already be on the fabric; the caller has to
//! re-place the affected region from a known-good state.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RefabricError {
    #[error("RefabricError::PoolExhausted: No free {kind} frame slot for frame address {far:#010x}")]
    PoolExhausted { kind: &'static str, far: u32 },
    #[error("RefabricError::AddressLookup: {0}")]
    AddressLookup(String),
    #[error("RefabricError::SegmentOverflow: More than {max} clock-region segments requested")]
    SegmentOverflow { max: usize },
    #[error(
        "RefabricError::CursorMismatch: {cursor} cursor ended at word {actual}, expected word {expected}"
    )]
    CursorMismatch {
        cursor: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("RefabricError::Transport: {0}")]
    Transport(String),
    #[error("RefabricError::Init: Configuration port is not ready: {0}")]
    Init(String),
    #[error("RefabricError::HardwareTimeout: Timed out after {timeout_ms} ms waiting for {what}")]
    HardwareTimeout { what: &'static str, timeout_ms: u128 },
    #[error("RefabricError::ScratchOverflow: Need {needed} scratch words but only {available} are available")]
    ScratchOverflow { needed: usize, available: usize },
    #[error("RefabricError::PartialWrite: Write of clock-region row {row} failed after the port was written: {source}")]
    PartialWrite {
        row: u32,
        #[source]
        source: Box<RefabricError>,
    },
    #[error("RefabricError::Argument: {0}")]
    Argument(String),
    #[error("RefabricError::ImageLoad: Failed to load image {name:?}: {reason}")]
    ImageLoad { name: String, reason: String },
    #[error("RefabricError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("RefabricError::IOWrite: An IO error occurred when writing to {file:?}: {e}")]
    IOWrite { file: PathBuf, e: std::io::Error },
    #[error("RefabricError::IOCreate: An IO error occurred when creating {file:?}: {e}")]
    IOCreate { file: PathBuf, e: std::io::Error },
    #[error("RefabricError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
    #[error("RefabricError::TomlDe: Failed to parse config {toml_string:?}: {e}")]
    TomlDe {
        toml_string: String,
        e: toml::de::Error,
    },
    #[error("RefabricError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl RefabricError {
    /// `true` when the configuration port had already been written when the failure
    /// happened. The fabric state of the affected region is then unknown.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RefabricError::PartialWrite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_only_partial_write_is_fatal() {
        let write = RefabricError::PartialWrite {
            row: 1,
            source: Box::new(RefabricError::Transport("DMA error".into())),
        };
        assert!(write.is_fatal());
        assert!(!RefabricError::Transport("DMA error".into()).is_fatal());
        assert!(!RefabricError::SegmentOverflow { max: 15 }.is_fatal());
        expect_that!(
            write.to_string(),
            contains_substring("RefabricError::PartialWrite: Write of clock-region row 1")
        );
    }
}
