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

//! Partial configuration image storage.
//!
//! Images are flat arrays of configuration words. On disk they are kept big-endian, the
//! byte order the configuration port consumes, and converted to native words on load.

use crate::error::RefabricError;
use crate::system_io::{fs_create_dir, fs_read_bytes, fs_read_dir, fs_write_bytes};
use log::{debug, trace};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub trait ImageStore {
    /// Load the named image into the start of `dest`.
    ///
    /// # Returns: `Result<usize, RefabricError>`
    /// * `Ok(usize)` - Number of words loaded
    /// * `Err(RefabricError::ScratchOverflow)` - The image does not fit `dest`
    /// * `Err(RefabricError::ImageLoad)` - The image is missing or malformed
    fn load(&mut self, name: &str, dest: &mut [u32]) -> Result<usize, RefabricError>;

    /// Save `words` under `name`, replacing any previous image.
    fn store(&mut self, name: &str, words: &[u32]) -> Result<(), RefabricError>;
}

fn copy_into(name: &str, words: &[u32], dest: &mut [u32]) -> Result<usize, RefabricError> {
    if words.len() > dest.len() {
        return Err(RefabricError::ScratchOverflow {
            needed: words.len(),
            available: dest.len(),
        });
    }
    dest[..words.len()].copy_from_slice(words);
    trace!("Loaded {} words of {name:?}", words.len());
    Ok(words.len())
}

/// Images stored as files named after the image under one directory.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    dir: PathBuf,
}

impl DirectoryImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> DirectoryImageStore {
        DirectoryImageStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of every image in the directory.
    pub fn list(&self) -> Result<Vec<String>, RefabricError> {
        Ok(fs_read_dir(&self.dir)?
            .iter()
            .filter(|p| p.is_file())
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }
}

impl ImageStore for DirectoryImageStore {
    fn load(&mut self, name: &str, dest: &mut [u32]) -> Result<usize, RefabricError> {
        let path = self.dir.join(name);
        let bytes = fs_read_bytes(&path).map_err(|e| RefabricError::ImageLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() % 4 != 0 {
            return Err(RefabricError::ImageLoad {
                name: name.to_string(),
                reason: format!("{} bytes is not a whole number of words", bytes.len()),
            });
        }
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        copy_into(name, &words, dest)
    }

    fn store(&mut self, name: &str, words: &[u32]) -> Result<(), RefabricError> {
        fs_create_dir(&self.dir)?;
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        fs_write_bytes(&self.dir.join(name), true, &bytes)?;
        debug!("Stored {} words as {:?}", words.len(), self.dir.join(name));
        Ok(())
    }
}

/// Images kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageStore {
    images: HashMap<String, Vec<u32>>,
}

impl MemoryImageStore {
    pub fn new() -> MemoryImageStore {
        MemoryImageStore::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, words: Vec<u32>) {
        self.images.insert(name.into(), words);
    }

    pub fn get(&self, name: &str) -> Option<&[u32]> {
        self.images.get(name).map(Vec::as_slice)
    }
}

impl ImageStore for MemoryImageStore {
    fn load(&mut self, name: &str, dest: &mut [u32]) -> Result<usize, RefabricError> {
        let words = self.images.get(name).ok_or_else(|| RefabricError::ImageLoad {
            name: name.to_string(),
            reason: "no such image".to_string(),
        })?;
        copy_into(name, words, dest)
    }

    fn store(&mut self, name: &str, words: &[u32]) -> Result<(), RefabricError> {
        self.images.insert(name.to_string(), words.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_directory_store_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryImageStore::new(dir.path().join("images"));
        store.store("top.pbs", &[0xAA99_5566, 1, 2]).unwrap();

        let bytes = std::fs::read(dir.path().join("images/top.pbs")).unwrap();
        assert_eq!(&bytes[..4], &[0xAA, 0x99, 0x55, 0x66]);

        let mut dest = [0; 4];
        assert_eq!(store.load("top.pbs", &mut dest).unwrap(), 3);
        assert_eq!(dest, [0xAA99_5566, 1, 2, 0]);
        assert_eq!(store.list().unwrap(), vec!["top.pbs".to_string()]);
    }

    #[gtest]
    fn test_directory_store_rejects_partial_words() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("odd.pbs"), [1, 2, 3, 4, 5]).unwrap();
        let mut store = DirectoryImageStore::new(dir.path());
        let mut dest = [0; 4];
        expect_that!(
            store.load("odd.pbs", &mut dest),
            err(displays_as(contains_substring("is not a whole number of words")))
        );
        expect_that!(
            store.load("missing.pbs", &mut dest),
            err(displays_as(contains_substring("RefabricError::ImageLoad:")))
        );
    }

    #[gtest]
    fn test_image_larger_than_buffer() {
        let mut store = MemoryImageStore::new();
        store.insert("big", vec![0; 10]);
        let mut dest = [0; 8];
        expect_that!(
            store.load("big", &mut dest),
            err(displays_as(contains_substring(
                "RefabricError::ScratchOverflow: Need 10 scratch words but only 8 are available"
            )))
        );
    }
}
