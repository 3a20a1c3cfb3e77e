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

//! Partition grid and the reconfiguration entry points.
//!
//! A [`VirtualArchitecture`] is the single long-lived context of the engine. It owns the
//! hardware handle, the fabric description, the element catalog, the composer with its
//! scratch buffer and, with the `fine-grain` feature, the frame-slot pools and the cached
//! per-partition layouts. Calls are synchronous and must be serialized by the caller.
//!
//! Partitions are addressed by their (x, y) grid coordinate. Placing an element is a two
//! step affair: [`VirtualArchitecture::set_position`] anchors the partition on the device
//! and [`VirtualArchitecture::bind_element`] loads an element into it.

use crate::catalog::ElementCatalog;
#[cfg(feature = "fine-grain")]
use crate::catalog::ElementDescriptor;
use crate::composer::{BitstreamComposer, Region, StackMode};
use crate::config::EngineConfig;
use crate::error::RefabricError;
use crate::fabric::{Fabric, ROWS_PER_CLOCK_REGION, fabric_for_device};
#[cfg(feature = "fine-grain")]
use crate::fine_grain::mapper::{FineGrainLayout, compute_layout};
#[cfg(feature = "fine-grain")]
use crate::fine_grain::opcode::Operation;
#[cfg(feature = "fine-grain")]
use crate::fine_grain::patcher;
#[cfg(feature = "fine-grain")]
use crate::fine_grain::pool::FramePools;
use crate::image_store::ImageStore;
#[cfg(feature = "fine-grain")]
use crate::port::PatchPort;
#[cfg(feature = "fine-grain")]
use crate::port::icap::PatchDriver;
use crate::port::pcap::BulkDriver;
use crate::port::{ConfigTransport, Poller};
use log::{debug, info, trace};

/// Everything the engine needs from the device.
#[cfg(feature = "fine-grain")]
pub trait Hardware: ConfigTransport + PatchPort {}
#[cfg(feature = "fine-grain")]
impl<T: ConfigTransport + PatchPort> Hardware for T {}

/// Everything the engine needs from the device.
#[cfg(not(feature = "fine-grain"))]
pub trait Hardware: ConfigTransport {}
#[cfg(not(feature = "fine-grain"))]
impl<T: ConfigTransport> Hardware for T {}

/// Clock-region rows and device columns covered by a partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationInfo {
    pub first_row: u32,
    pub last_row: u32,
    pub first_column: u32,
    pub last_column: u32,
}

impl LocationInfo {
    pub fn new(column: u32, row: u32, width: u32, height: u32) -> LocationInfo {
        LocationInfo {
            first_row: row / ROWS_PER_CLOCK_REGION,
            last_row: (row + height.max(1) - 1) / ROWS_PER_CLOCK_REGION,
            first_column: column,
            last_column: column + width.max(1) - 1,
        }
    }
}

/// Live values of the fine-grain units of a bound element. `None` until first set.
#[cfg(feature = "fine-grain")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UnitValues {
    constants: Vec<Option<Vec<u32>>>,
    selectors: Vec<Option<usize>>,
    operations: Vec<Option<Operation>>,
}

#[cfg(feature = "fine-grain")]
impl UnitValues {
    fn for_element(element: &ElementDescriptor) -> UnitValues {
        UnitValues {
            constants: vec![None; element.constants.len()],
            selectors: vec![None; element.selectors.len()],
            operations: vec![None; element.operations.len()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    column: u32,
    row: u32,
    element: Option<usize>,
    is_static: bool,
    location: LocationInfo,
    #[cfg(feature = "fine-grain")]
    layout: Option<FineGrainLayout>,
    #[cfg(feature = "fine-grain")]
    values: UnitValues,
}

impl Partition {
    /// Device (column, row) the partition is anchored at.
    pub fn position(&self) -> (u32, u32) {
        (self.column, self.row)
    }

    pub fn element(&self) -> Option<usize> {
        self.element
    }

    /// Clock-region rows and device columns covered by the partition.
    ///
    /// Only the bound element gives the partition its extent: until `bind_element` or
    /// `add_static_region` succeeds this is the single cell at the partition's position.
    pub fn location(&self) -> LocationInfo {
        self.location
    }

    /// `true` for partitions declared with `add_static_region`.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[cfg(feature = "fine-grain")]
    pub fn layout(&self) -> Option<&FineGrainLayout> {
        self.layout.as_ref()
    }

    fn unbind(&mut self) {
        self.element = None;
        self.is_static = false;
        #[cfg(feature = "fine-grain")]
        {
            self.layout = None;
            self.values = UnitValues::default();
        }
    }
}

fn cell(grid: &mut [Vec<Partition>], x: usize, y: usize) -> Result<&mut Partition, RefabricError> {
    grid.get_mut(y)
        .and_then(|row| row.get_mut(x))
        .ok_or_else(|| RefabricError::Argument(format!("No partition at ({x}, {y})")))
}

#[cfg(feature = "fine-grain")]
fn bound<'a>(
    catalog: &'a ElementCatalog,
    partition: &Partition,
    x: usize,
    y: usize,
) -> Result<&'a ElementDescriptor, RefabricError> {
    match partition.element {
        Some(id) => catalog.get(id),
        None => Err(RefabricError::Argument(format!(
            "No element bound to partition ({x}, {y})"
        ))),
    }
}

#[cfg(feature = "fine-grain")]
fn unit_missing(kind: &str, index: usize, element: &ElementDescriptor) -> RefabricError {
    RefabricError::Argument(format!("Element {:?} has no {kind} {index}", element.name))
}

/// `true` if no bit at or above `bits` is set.
#[cfg(feature = "fine-grain")]
fn fits(bits: usize, value: &[u32]) -> bool {
    value.iter().enumerate().all(|(n, &word)| {
        let start = n * 32;
        match bits.saturating_sub(start) {
            0 => word == 0,
            left if left >= 32 => true,
            left => word >> left == 0,
        }
    })
}

pub struct VirtualArchitecture<H: Hardware, S: ImageStore> {
    hw: H,
    store: S,
    fabric: Fabric,
    catalog: ElementCatalog,
    grid: Vec<Vec<Partition>>,
    composer: BitstreamComposer,
    poller: Poller,
    #[cfg(feature = "fine-grain")]
    pools: FramePools,
}

impl<H: Hardware, S: ImageStore> VirtualArchitecture<H, S> {
    /// Build the engine context described by `config`. No hardware access happens
    /// before [`VirtualArchitecture::init`].
    pub fn new(config: &EngineConfig, hw: H, store: S) -> Result<VirtualArchitecture<H, S>, RefabricError> {
        if config.grid_width == 0 || config.grid_height == 0 {
            return Err(RefabricError::Argument(format!(
                "Grid of {}x{} partitions is empty",
                config.grid_width, config.grid_height
            )));
        }
        let fabric = fabric_for_device(&config.device)?;
        let catalog = config.catalog()?;
        debug!(
            "Virtual architecture on {} with a {}x{} grid",
            fabric.name(),
            config.grid_width,
            config.grid_height
        );
        Ok(VirtualArchitecture {
            hw,
            store,
            fabric,
            catalog,
            grid: vec![vec![Partition::default(); config.grid_width]; config.grid_height],
            composer: BitstreamComposer::new(config.scratch_words),
            poller: Poller::new(config.poll_timeout),
            #[cfg(feature = "fine-grain")]
            pools: FramePools::new(
                config.constant_slots,
                config.selector_slots,
                config.operation_slots,
            ),
        })
    }

    /// Bring up the configuration port and, with fine-grain support, reset the frame-slot
    /// pools and load the patch engine templates.
    pub fn init(&mut self) -> Result<(), RefabricError> {
        BulkDriver::new(&mut self.hw, &self.poller).init()?;
        #[cfg(feature = "fine-grain")]
        {
            self.pools.reset();
            PatchDriver::new(&mut self.hw, &self.poller).load_templates();
        }
        info!("Reconfiguration engine ready on {}", self.fabric.name());
        Ok(())
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    pub fn catalog(&self) -> &ElementCatalog {
        &self.catalog
    }

    pub fn composer(&self) -> &BitstreamComposer {
        &self.composer
    }

    pub fn partition(&self, x: usize, y: usize) -> Result<&Partition, RefabricError> {
        self.grid
            .get(y)
            .and_then(|row| row.get(x))
            .ok_or_else(|| RefabricError::Argument(format!("No partition at ({x}, {y})")))
    }

    /// Anchor partition (x, y) at device column `column`, device row `row`.
    ///
    /// Any bound element is dropped without touching the fabric. Until an element is bound
    /// the location covers a single device row and column.
    pub fn set_position(&mut self, x: usize, y: usize, column: u32, row: u32) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        partition.unbind();
        partition.column = column;
        partition.row = row;
        partition.location = LocationInfo::new(column, row, 1, 1);
        trace!("Partition ({x}, {y}) anchored at column {column}, row {row}");
        Ok(())
    }

    /// Load `element` into partition (x, y) with a full readback/combine/write cycle.
    ///
    /// `None` unbinds without writing, for partitions whose area another write has just
    /// overwritten. Binding the element that is already bound does nothing.
    pub fn bind_element(&mut self, x: usize, y: usize, element: Option<usize>) -> Result<(), RefabricError> {
        self.bind_element_stacked(x, y, element, StackMode::Full)
    }

    /// [`VirtualArchitecture::bind_element`] as one layer of a module stack.
    ///
    /// # Returns: `Result<(), RefabricError>`
    /// * `Ok(())` - Element bound and the requested composer steps done
    /// * `Err(RefabricError::PartialWrite)` - The fabric content of the partition is unknown
    /// * `Err(_)` - Nothing was written
    ///
    /// On any error the partition is left unbound.
    pub fn bind_element_stacked(
        &mut self,
        x: usize,
        y: usize,
        element: Option<usize>,
        mode: StackMode,
    ) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        if partition.element == element {
            trace!("Partition ({x}, {y}) already holds {element:?}");
            return Ok(());
        }
        partition.unbind();
        let Some(id) = element else {
            debug!("Partition ({x}, {y}) invalidated");
            return Ok(());
        };
        let descriptor = self.catalog.get(id)?;
        let (column, row) = partition.position();
        let region = Region::new(column, row, descriptor.width, descriptor.height);
        partition.location = LocationInfo::new(column, row, descriptor.width, descriptor.height);

        #[cfg(feature = "fine-grain")]
        let layout = if descriptor.has_fine_grain() {
            Some(compute_layout(
                &self.fabric,
                &mut self.pools,
                descriptor,
                column,
                row,
            )?)
        } else {
            None
        };

        self.composer.write_regions(
            &mut self.hw,
            &self.poller,
            &self.fabric,
            &mut self.store,
            &descriptor.image,
            &[region],
            mode,
        )?;

        partition.element = Some(id);
        #[cfg(feature = "fine-grain")]
        {
            partition.layout = layout;
            partition.values = UnitValues::for_element(descriptor);
        }
        info!(
            "Bound {} to partition ({x}, {y}) at column {column}, row {row}",
            descriptor.name
        );
        Ok(())
    }

    /// Declare partition (x, y) as a static region holding `element`.
    ///
    /// The element is assumed to be part of the loaded static design, so only its fine-grain
    /// layout is computed and nothing is written.
    #[cfg(feature = "fine-grain")]
    pub fn add_static_region(&mut self, x: usize, y: usize, element: usize) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        partition.unbind();
        let descriptor = self.catalog.get(element)?;
        let (column, row) = partition.position();
        partition.location = LocationInfo::new(column, row, descriptor.width, descriptor.height);
        let layout = compute_layout(&self.fabric, &mut self.pools, descriptor, column, row)?;
        partition.element = Some(element);
        partition.is_static = true;
        partition.layout = Some(layout);
        partition.values = UnitValues::for_element(descriptor);
        debug!("Static region {} at partition ({x}, {y})", descriptor.name);
        Ok(())
    }

    /// Fine-grain layout of the element bound to partition (x, y).
    #[cfg(feature = "fine-grain")]
    pub fn layout(&self, x: usize, y: usize) -> Result<&FineGrainLayout, RefabricError> {
        self.partition(x, y)?.layout.as_ref().ok_or_else(|| {
            RefabricError::Argument(format!("Partition ({x}, {y}) has no fine-grain units"))
        })
    }

    /// Set constant `index` of the element in partition (x, y). `value` is least
    /// significant word first.
    #[cfg(feature = "fine-grain")]
    pub fn set_constant(&mut self, x: usize, y: usize, index: usize, value: &[u32]) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        let element = bound(&self.catalog, partition, x, y)?;
        let spec = element
            .constants
            .get(index)
            .ok_or_else(|| unit_missing("constant", index, element))?;
        if !fits(spec.bits, value) {
            return Err(RefabricError::Argument(format!(
                "Value {value:x?} does not fit constant {index} of {} bits",
                spec.bits
            )));
        }
        if partition.values.constants[index].as_deref() == Some(value) {
            trace!("Constant {index} of ({x}, {y}) unchanged");
            return Ok(());
        }
        let ranges = partition
            .layout
            .as_ref()
            .map(|l| &l.constants[index])
            .ok_or_else(|| unit_missing("constant layout", index, element))?;
        patcher::patch_constant(&mut self.pools.constants, ranges, value)?;
        partition.values.constants[index] = Some(value.to_vec());
        Ok(())
    }

    /// Current value of constant `index`, read from the cached frames.
    #[cfg(feature = "fine-grain")]
    pub fn constant(&self, x: usize, y: usize, index: usize) -> Result<Vec<u32>, RefabricError> {
        let ranges = self
            .layout(x, y)?
            .constants
            .get(index)
            .ok_or_else(|| RefabricError::Argument(format!("No constant {index} at ({x}, {y})")))?;
        patcher::read_constant(&self.pools.constants, ranges)
    }

    /// Route input `value` through selector `index`.
    #[cfg(feature = "fine-grain")]
    pub fn set_selector(&mut self, x: usize, y: usize, index: usize, value: usize) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        let element = bound(&self.catalog, partition, x, y)?;
        let spec = element
            .selectors
            .get(index)
            .ok_or_else(|| unit_missing("selector", index, element))?;
        let levels = spec.levels();
        if value >= 3 * levels + 3 {
            return Err(RefabricError::Argument(format!(
                "Selector {index} with {levels} levels has no input {value}"
            )));
        }
        if partition.values.selectors[index] == Some(value) {
            trace!("Selector {index} of ({x}, {y}) unchanged");
            return Ok(());
        }
        let ranges = partition
            .layout
            .as_ref()
            .map(|l| &l.selectors[index])
            .ok_or_else(|| unit_missing("selector layout", index, element))?;
        patcher::patch_selector(&mut self.pools.selectors, ranges, levels, value)?;
        partition.values.selectors[index] = Some(value);
        Ok(())
    }

    #[cfg(feature = "fine-grain")]
    pub fn set_operation(&mut self, x: usize, y: usize, index: usize, operation: Operation) -> Result<(), RefabricError> {
        let partition = cell(&mut self.grid, x, y)?;
        let element = bound(&self.catalog, partition, x, y)?;
        if index >= element.operations.len() {
            return Err(unit_missing("operation unit", index, element));
        }
        if partition.values.operations[index] == Some(operation) {
            trace!("Operation unit {index} of ({x}, {y}) unchanged");
            return Ok(());
        }
        let ranges = partition
            .layout
            .as_ref()
            .map(|l| &l.operations[index])
            .ok_or_else(|| unit_missing("operation layout", index, element))?;
        patcher::patch_operation(&mut self.pools.operations, ranges, operation.opcode())?;
        partition.values.operations[index] = Some(operation);
        Ok(())
    }

    /// Push every edited frame to the fabric.
    ///
    /// # Returns: `Result<usize, RefabricError>`
    /// * `Ok(usize)` - Number of patches issued
    /// * `Err(RefabricError::HardwareTimeout)` - The patch engine stopped responding
    #[cfg(feature = "fine-grain")]
    pub fn commit(&mut self) -> Result<usize, RefabricError> {
        let mut driver = PatchDriver::new(&mut self.hw, &self.poller);
        let issued = driver.commit(&mut self.pools.constants)?
            + driver.commit(&mut self.pools.selectors)?
            + driver.commit(&mut self.pools.operations)?;
        info!("Committed {issued} frame patches");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ElementDescriptor;
    use crate::image_store::MemoryImageStore;
    use crate::sim::SimulatedFabric;
    use googletest::prelude::*;
    use std::time::Duration;

    const IMAGE_WORDS: usize = 216 * 32;

    fn element() -> ElementDescriptor {
        ElementDescriptor {
            name: "group2_bottom_module".into(),
            image: "group2_bottom_module.pbs".into(),
            width: 6,
            height: 16,
            constants: vec![],
            selectors: vec![],
            operations: vec![],
        }
    }

    fn architecture(elements: Vec<ElementDescriptor>) -> VirtualArchitecture<SimulatedFabric, MemoryImageStore> {
        let config = EngineConfig {
            scratch_words: 1 << 16,
            poll_timeout: Duration::from_millis(20),
            elements,
            ..EngineConfig::default()
        };
        let fabric = fabric_for_device(&config.device).unwrap();
        let mut store = MemoryImageStore::new();
        store.insert("group2_bottom_module.pbs", vec![0x1234_5678; IMAGE_WORDS]);
        let mut arch = VirtualArchitecture::new(&config, SimulatedFabric::new(&fabric), store).unwrap();
        arch.init().unwrap();
        arch
    }

    #[test]
    fn test_location_info() {
        assert_eq!(
            LocationInfo::new(40, 9, 6, 16),
            LocationInfo { first_row: 0, last_row: 0, first_column: 40, last_column: 45 }
        );
        assert_eq!(LocationInfo::new(40, 45, 6, 16).last_row, 1);
    }

    #[gtest]
    fn test_bind_writes_once() {
        let mut arch = architecture(vec![element()]);
        arch.set_position(0, 0, 40, 9).unwrap();
        arch.bind_element(0, 0, Some(0)).unwrap();

        let partition = arch.partition(0, 0).unwrap();
        assert_eq!(partition.element(), Some(0));
        assert_eq!(
            partition.location(),
            LocationInfo { first_row: 0, last_row: 0, first_column: 40, last_column: 45 }
        );
        assert_eq!(arch.hw().frame_writes(), 1);
        let segments = arch.composer().segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].row, 0);
        assert_eq!((segments[0].region.first_column, segments[0].region.last_column), (40, 45));
        assert_eq!((segments[0].region.first_row, segments[0].region.last_row), (9, 24));

        arch.bind_element(0, 0, Some(0)).unwrap();
        assert_eq!(arch.hw().frame_writes(), 1);
    }

    #[test]
    fn test_location_before_bind_is_single_cell() {
        let mut arch = architecture(vec![element()]);
        arch.set_position(0, 0, 40, 9).unwrap();
        assert_eq!(
            arch.partition(0, 0).unwrap().location(),
            LocationInfo { first_row: 0, last_row: 0, first_column: 40, last_column: 40 }
        );
        arch.bind_element(0, 0, Some(0)).unwrap();
        assert_eq!(arch.partition(0, 0).unwrap().location().last_column, 45);
    }

    #[gtest]
    fn test_unbind_does_not_write() {
        let mut arch = architecture(vec![element()]);
        arch.set_position(0, 0, 40, 9).unwrap();
        arch.bind_element(0, 0, Some(0)).unwrap();
        let transfers = arch.hw().transfers().len();
        arch.bind_element(0, 0, None).unwrap();
        assert_eq!(arch.partition(0, 0).unwrap().element(), None);
        assert_eq!(arch.hw().transfers().len(), transfers);
    }

    #[gtest]
    fn test_failed_bind_leaves_partition_unbound() {
        let mut other = element();
        other.image = "missing.pbs".into();
        let mut arch = architecture(vec![element(), other]);
        arch.set_position(0, 0, 40, 9).unwrap();
        arch.bind_element(0, 0, Some(0)).unwrap();
        expect_that!(
            arch.bind_element(0, 0, Some(1)),
            err(displays_as(contains_substring("RefabricError::ImageLoad:")))
        );
        assert_eq!(arch.partition(0, 0).unwrap().element(), None);
    }

    #[gtest]
    fn test_bad_coordinates_and_ids() {
        let mut arch = architecture(vec![element()]);
        expect_that!(
            arch.set_position(1, 0, 40, 9),
            err(displays_as(contains_substring("No partition at (1, 0)")))
        );
        expect_that!(
            arch.bind_element(0, 0, Some(4)),
            err(displays_as(contains_substring("No element with id 4")))
        );
    }

    #[cfg(feature = "fine-grain")]
    mod fine_grain {
        use super::*;
        use crate::catalog::{ConstantSpec, OperationSpec, SelectorSpec};

        fn tunable() -> ElementDescriptor {
            ElementDescriptor {
                constants: vec![ConstantSpec { bits: 8, group: 0, columns: 0 }],
                selectors: vec![SelectorSpec { data_width: 8, inputs: 5, group: 0, columns: 0 }],
                operations: vec![OperationSpec { blocks: 2, group: 0, columns: 0 }],
                ..element()
            }
        }

        #[test]
        fn test_fits() {
            assert!(fits(8, &[0xFF]));
            assert!(!fits(8, &[0x100]));
            assert!(fits(40, &[0xFFFF_FFFF, 0xFF]));
            assert!(!fits(32, &[0, 1]));
        }

        #[gtest]
        fn test_patch_and_commit() {
            let mut arch = architecture(vec![tunable()]);
            arch.set_position(0, 0, 40, 9).unwrap();
            arch.bind_element(0, 0, Some(0)).unwrap();

            arch.set_constant(0, 0, 0, &[0xA5]).unwrap();
            arch.set_selector(0, 0, 0, 4).unwrap();
            arch.set_operation(0, 0, 0, Operation::Xor).unwrap();
            assert_eq!(arch.constant(0, 0, 0).unwrap(), vec![0xA5]);
            assert_eq!(arch.commit().unwrap(), 3);

            let kinds: Vec<u32> = arch.hw().patches().iter().map(|p| p.kind).collect();
            assert_eq!(kinds, vec![0, 1, 2]);
        }

        #[gtest]
        fn test_unchanged_value_is_not_patched() {
            let mut arch = architecture(vec![tunable()]);
            arch.set_position(0, 0, 40, 9).unwrap();
            arch.bind_element(0, 0, Some(0)).unwrap();
            arch.set_constant(0, 0, 0, &[7]).unwrap();
            assert_eq!(arch.commit().unwrap(), 1);
            arch.set_constant(0, 0, 0, &[7]).unwrap();
            assert_eq!(arch.commit().unwrap(), 0);
        }

        #[gtest]
        fn test_value_domains() {
            let mut arch = architecture(vec![tunable()]);
            arch.set_position(0, 0, 40, 9).unwrap();
            arch.bind_element(0, 0, Some(0)).unwrap();
            // two levels accept inputs 0..9
            expect_that!(
                arch.set_selector(0, 0, 0, 9),
                err(displays_as(contains_substring("has no input 9")))
            );
            expect_that!(
                arch.set_constant(0, 0, 0, &[0x1FF]),
                err(displays_as(contains_substring("does not fit constant 0 of 8 bits")))
            );
            expect_that!(
                arch.set_operation(0, 0, 1, Operation::Add),
                err(displays_as(contains_substring("has no operation unit 1")))
            );
        }

        #[gtest]
        fn test_patch_needs_bound_element() {
            let mut arch = architecture(vec![tunable()]);
            expect_that!(
                arch.set_constant(0, 0, 0, &[1]),
                err(displays_as(contains_substring("No element bound to partition (0, 0)")))
            );
        }

        #[gtest]
        fn test_static_region_writes_nothing() {
            let mut arch = architecture(vec![tunable()]);
            arch.set_position(0, 0, 40, 25).unwrap();
            arch.add_static_region(0, 0, 0).unwrap();
            assert!(arch.partition(0, 0).unwrap().is_static());
            assert_eq!(arch.hw().frame_writes(), 0);
            arch.set_operation(0, 0, 0, Operation::Min).unwrap();
            assert_eq!(arch.commit().unwrap(), 1);
        }

        #[test]
        fn test_templates_loaded_at_init() {
            let arch = architecture(vec![]);
            assert_eq!(arch.hw().templates()[15], 0xFFFF_FFFF);
        }
    }
}
