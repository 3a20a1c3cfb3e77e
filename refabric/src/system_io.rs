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

//! Error Wrapping File System I/O Helpers
//!
//! Thin wrappers around the standard file system calls used by the configuration loader
//! and the image store. Every helper logs at `trace` level and converts failures into the
//! matching `RefabricError` I/O variant with the offending path attached.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use refabric::system_io::{fs_read_bytes, fs_write_bytes};
//! # use std::path::Path;
//!
//! # fn example() -> Result<(), refabric::error::RefabricError> {
//! let image = fs_read_bytes(Path::new("/var/lib/refabric/images/top.pbs"))?;
//! fs_write_bytes(Path::new("/tmp/top_copy.pbs"), true, &image)?;
//! # Ok(())
//! # }
//! ```

use crate::error::RefabricError;
use log::trace;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read the contents of a file to a String.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<String, RefabricError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(RefabricError::IORead)` - If the file cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read(file_path: &Path) -> Result<String, RefabricError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(RefabricError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Read the raw bytes of a file, typically a partial configuration image.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<Vec<u8>, RefabricError>`
/// * `Ok(Vec<u8>)` - The bytes of the file
/// * `Err(RefabricError::IORead)` - If the file cannot be read
pub fn fs_read_bytes(file_path: &Path) -> Result<Vec<u8>, RefabricError> {
    trace!("Attempting to read bytes from {file_path:?}");
    let mut buf: Vec<u8> = Vec::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_end(&mut buf));

    match result {
        Ok(n) => {
            trace!("Read {n} bytes");
            Ok(buf)
        }
        Err(e) => Err(RefabricError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write raw bytes to a file, truncating any previous content.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `create` - If `true`, create the file if it doesn't exist; if `false`, file must already exist
/// * `data` - The bytes to write
///
/// # Returns: `Result<(), RefabricError>`
/// * `Ok(())` - Write succeeded
/// * `Err(RefabricError::IOWrite)` - If the write fails
pub fn fs_write_bytes(file_path: &Path, create: bool, data: &[u8]) -> Result<(), RefabricError> {
    trace!("Attempting to write {} bytes to {:?}", data.len(), file_path);
    let result = OpenOptions::new()
        .create(create)
        .write(true)
        .truncate(true)
        .open(file_path)
        .and_then(|mut f| f.write_all(data));
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(RefabricError::IOWrite {
            file: file_path.into(),
            e,
        }),
    }
}

/// Create a directory and all missing parents.
///
/// # Returns: `Result<(), RefabricError>`
/// * `Ok(())` - The directory exists afterwards
/// * `Err(RefabricError::IOCreate)` - If it could not be created
pub fn fs_create_dir(path: &Path) -> Result<(), RefabricError> {
    trace!("Attempting to create directory {path:?}");
    let result = create_dir_all(path);
    match result {
        Ok(_) => {
            trace!("Directory created at {path:?}");
            Ok(())
        }
        Err(e) => Err(RefabricError::IOCreate {
            file: path.into(),
            e,
        }),
    }
}

/// List the entries of a directory.
///
/// # Returns: `Result<Vec<PathBuf>, RefabricError>`
/// * `Ok(Vec<PathBuf>)` - Paths of all entries, sorted
/// * `Err(RefabricError::IOReadDir)` - If the directory cannot be read
pub fn fs_read_dir(dir: &Path) -> Result<Vec<PathBuf>, RefabricError> {
    trace!("Attempting to read directory {dir:?}");
    let entries = std::fs::read_dir(dir).map_err(|e| RefabricError::IOReadDir {
        dir: dir.into(),
        e,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RefabricError::IOReadDir {
            dir: dir.into(),
            e,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    trace!("Found {} entries in {dir:?}", paths.len());
    Ok(paths)
}
