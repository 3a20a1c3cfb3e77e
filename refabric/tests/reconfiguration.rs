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

use googletest::prelude::*;
use refabric::architecture::{LocationInfo, VirtualArchitecture};
use refabric::config::EngineConfig;
use refabric::fabric::{FRAME_WORDS, fabric_for_device};
use refabric::image_store::MemoryImageStore;
use refabric::sim::SimulatedFabric;
use rstest::*;
use std::path::Path;

const TOP: usize = 0;
const BOTTOM: usize = 1;
const TOP_WORD: u32 = 0x7070_7070;
const BOTTOM_WORD: u32 = 0x0B0B_0B0B;
/// 216 frames of 32 words: six logic-cell columns, 16 rows each
const IMAGE_WORDS: usize = 216 * 32;

type Arch = VirtualArchitecture<SimulatedFabric, MemoryImageStore>;

#[fixture]
fn arch() -> Arch {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/test_data/config.toml");
    let config = EngineConfig::from_file(&path).expect("test config should parse");
    let fabric = fabric_for_device(&config.device).expect("xc7z020 is builtin");
    let mut hw = SimulatedFabric::new(&fabric);
    hw.fill_pattern(0x5EED);
    let mut store = MemoryImageStore::new();
    store.insert("group1_top_module.pbs", vec![TOP_WORD; IMAGE_WORDS]);
    store.insert("group2_bottom_module.pbs", vec![BOTTOM_WORD; IMAGE_WORDS]);
    let mut arch = Arch::new(&config, hw, store).expect("engine should build");
    arch.init().expect("simulated port is ready");
    arch.set_position(0, 0, 40, 25).unwrap();
    arch.set_position(0, 1, 40, 9).unwrap();
    arch
}

#[rstest]
fn test_bottom_module_placement(mut arch: Arch) {
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    assert_eq!(
        arch.partition(0, 1).unwrap().location(),
        LocationInfo {
            first_row: 0,
            last_row: 0,
            first_column: 40,
            last_column: 45
        }
    );
    assert_eq!(arch.hw().frame_writes(), 1);
}

#[rstest]
fn test_stacked_partitions_share_clock_region_row(mut arch: Arch) {
    let before = arch.hw().row_words(0, 40, 45).unwrap();
    arch.bind_element(0, 0, Some(TOP)).unwrap();
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    assert_eq!(arch.hw().frame_writes(), 2);

    let after = arch.hw().row_words(0, 40, 45).unwrap();
    for (new, old) in after.chunks(FRAME_WORDS).zip(before.chunks(FRAME_WORDS)) {
        // rows 0..=8 and 41..=49 belong to neither partition
        assert_eq!(&new[..18], &old[..18]);
        assert!(new[18..50].iter().all(|&w| w == BOTTOM_WORD));
        assert_eq!(new[50], old[50]);
        assert!(new[51..83].iter().all(|&w| w == TOP_WORD));
        assert_eq!(&new[83..], &old[83..]);
    }
}

#[rstest]
fn test_invalidated_partition_is_not_written(mut arch: Arch) {
    arch.bind_element(0, 0, Some(TOP)).unwrap();
    let transfers = arch.hw().transfers().len();
    arch.bind_element(0, 0, None).unwrap();
    assert_eq!(arch.partition(0, 0).unwrap().element(), None);
    assert_eq!(arch.hw().transfers().len(), transfers);
}

#[cfg(feature = "fine-grain")]
#[rstest]
fn test_constants_of_both_partitions_share_one_frame(mut arch: Arch) {
    arch.bind_element(0, 0, Some(TOP)).unwrap();
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    arch.set_constant(0, 0, 0, &[0xAB]).unwrap();
    arch.set_constant(0, 0, 1, &[0xCD]).unwrap();
    arch.set_constant(0, 1, 0, &[0xDEAD_BEEF]).unwrap();

    assert_eq!(arch.commit().unwrap(), 1);
    let patch = &arch.hw().patches()[0];
    assert_eq!(patch.kind, 0);
    // bits 200..=215 of the top module, bits 72..=103 of the bottom one
    assert_eq!(patch.payload[6], 0x00CD_AB00);
    assert_eq!(patch.payload[2], 0xADBE_EF00);
    assert_eq!(patch.payload[3], 0x0000_00DE);

    assert_eq!(arch.constant(0, 0, 0).unwrap(), vec![0xAB]);
    assert_eq!(arch.constant(0, 1, 0).unwrap(), vec![0xDEAD_BEEF]);
}

#[cfg(feature = "fine-grain")]
#[rstest]
fn test_selectors_and_operations_commit(mut arch: Arch) {
    use refabric::fine_grain::Operation;

    arch.bind_element(0, 0, Some(TOP)).unwrap();
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    arch.set_selector(0, 0, 0, 1).unwrap();
    arch.set_operation(0, 0, 0, Operation::Add).unwrap();
    arch.set_operation(0, 1, 0, Operation::Max).unwrap();

    assert_eq!(arch.commit().unwrap(), 3);
    let kinds: Vec<u32> = arch.hw().patches().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![1, 2, 2]);
    let frames: Vec<u32> = arch.hw().patches().iter().map(|p| p.frames).collect();
    assert_eq!(frames, vec![1, 2, 2]);

    // nothing changed since the last commit
    arch.set_operation(0, 1, 0, Operation::Max).unwrap();
    assert_eq!(arch.commit().unwrap(), 0);
}

#[cfg(feature = "fine-grain")]
#[rstest]
fn test_rebinding_resets_values(mut arch: Arch) {
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    arch.set_constant(0, 1, 0, &[5]).unwrap();
    arch.commit().unwrap();
    arch.bind_element(0, 1, None).unwrap();
    arch.bind_element(0, 1, Some(BOTTOM)).unwrap();
    // the value cache was reset, so the same value is patched again
    arch.set_constant(0, 1, 0, &[5]).unwrap();
    assert_eq!(arch.commit().unwrap(), 1);
}

#[cfg(feature = "fine-grain")]
#[rstest]
#[gtest]
fn test_unit_errors(mut arch: Arch) {
    expect_that!(
        arch.set_constant(0, 1, 0, &[1]),
        err(displays_as(contains_substring("No element bound to partition (0, 1)")))
    );
    arch.bind_element(0, 0, Some(TOP)).unwrap();
    expect_that!(
        arch.set_constant(0, 0, 0, &[0x100]),
        err(displays_as(contains_substring("does not fit constant 0 of 8 bits")))
    );
    expect_that!(
        arch.set_selector(0, 0, 1, 0),
        err(displays_as(contains_substring("has no selector 1")))
    );
}
