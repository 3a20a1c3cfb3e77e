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

//! Reconfigurable element descriptors.
//!
//! An element is a module that can be placed in a partition: a partial configuration
//! image plus its footprint. Elements with fine-grain components also list the constants,
//! selectors and operation units that can be patched after placement. Each fine-grain
//! unit belongs to a column-offset group; the units of a group are packed into
//! consecutive logic slice columns starting at the group offset.

use crate::error::RefabricError;
use crate::fabric::{BITS_PER_LUT, LUTS_PER_CLB};
use log::{debug, trace};
use serde::Deserialize;

/// LUTs of one 4-bit operation-unit block.
pub const LUTS_PER_OPERATION_BLOCK: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConstantSpec {
    pub bits: usize,
    #[serde(default)]
    pub group: usize,
    /// Slice columns reserved for the group. `0` derives the count from the payload.
    #[serde(default)]
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorSpec {
    pub data_width: usize,
    pub inputs: usize,
    #[serde(default)]
    pub group: usize,
    #[serde(default)]
    pub columns: usize,
}

impl SelectorSpec {
    /// Cascaded 4:1 LUT-halves needed per data bit.
    pub fn levels(&self) -> usize {
        (self.inputs.saturating_sub(2)) / 3 + 1
    }

    pub fn luts(&self) -> usize {
        self.levels() * self.data_width
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationSpec {
    /// 4-bit compute blocks.
    pub blocks: usize,
    #[serde(default)]
    pub group: usize,
    #[serde(default)]
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementDescriptor {
    pub name: String,
    /// Name of the partial configuration image.
    pub image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, rename = "constant")]
    pub constants: Vec<ConstantSpec>,
    #[serde(default, rename = "selector")]
    pub selectors: Vec<SelectorSpec>,
    #[serde(default, rename = "operation")]
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    Constant,
    Selector,
    Operation,
}

impl ElementDescriptor {
    pub fn has_fine_grain(&self) -> bool {
        !(self.constants.is_empty() && self.selectors.is_empty() && self.operations.is_empty())
    }

    /// Column-offset groups in order of first appearance: constants, then selectors,
    /// then operation units.
    pub fn groups(&self) -> Vec<usize> {
        let mut groups = Vec::new();
        let all = self
            .constants
            .iter()
            .map(|c| c.group)
            .chain(self.selectors.iter().map(|s| s.group))
            .chain(self.operations.iter().map(|o| o.group));
        for group in all {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }

    /// Payload one slice column holds over the full footprint height.
    ///
    /// Operation blocks need an even start row, so a placement on an odd row holds one
    /// block less per slice column than this. The derived column count does not know the
    /// placement row; the surplus block spills into the next slice column at mapping time.
    fn capacity(&self, kind: UnitKind) -> usize {
        let luts = self.height as usize * LUTS_PER_CLB;
        match kind {
            UnitKind::Constant => luts * BITS_PER_LUT,
            UnitKind::Selector | UnitKind::Operation => luts,
        }
    }

    /// (payload, reserved columns) of every unit of `kind` in `group`.
    fn group_units(&self, kind: UnitKind, group: usize) -> Vec<(usize, usize)> {
        match kind {
            UnitKind::Constant => self
                .constants
                .iter()
                .filter(|c| c.group == group)
                .map(|c| (c.bits, c.columns))
                .collect(),
            UnitKind::Selector => self
                .selectors
                .iter()
                .filter(|s| s.group == group)
                .map(|s| (s.luts(), s.columns))
                .collect(),
            UnitKind::Operation => self
                .operations
                .iter()
                .filter(|o| o.group == group)
                .map(|o| (o.blocks * LUTS_PER_OPERATION_BLOCK, o.columns))
                .collect(),
        }
    }

    fn set_group_columns(&mut self, kind: UnitKind, group: usize, columns: usize) {
        match kind {
            UnitKind::Constant => self
                .constants
                .iter_mut()
                .filter(|c| c.group == group)
                .for_each(|c| c.columns = columns),
            UnitKind::Selector => self
                .selectors
                .iter_mut()
                .filter(|s| s.group == group)
                .for_each(|s| s.columns = columns),
            UnitKind::Operation => self
                .operations
                .iter_mut()
                .filter(|o| o.group == group)
                .for_each(|o| o.columns = columns),
        }
    }

    /// Check the descriptor and derive the column count of every group that does not
    /// reserve one explicitly.
    ///
    /// A group that reserves columns keeps them, but its payload must fit.
    pub fn finalize(&mut self) -> Result<(), RefabricError> {
        if self.width == 0 || self.height == 0 {
            return Err(RefabricError::Argument(format!(
                "Element {:?} has an empty footprint",
                self.name
            )));
        }
        if let Some(s) = self.selectors.iter().find(|s| s.inputs < 2 || s.data_width == 0) {
            return Err(RefabricError::Argument(format!(
                "Element {:?} has a selector with {} inputs and data width {}",
                self.name, s.inputs, s.data_width
            )));
        }
        for group in self.groups() {
            for kind in [UnitKind::Constant, UnitKind::Selector, UnitKind::Operation] {
                let units = self.group_units(kind, group);
                let payload: usize = units.iter().map(|&(p, _)| p).sum();
                if payload == 0 {
                    continue;
                }
                let capacity = self.capacity(kind);
                let reserved = units.iter().map(|&(_, c)| c).max().unwrap_or(0);
                if reserved == 0 {
                    let derived = payload.div_ceil(capacity);
                    trace!(
                        "{}: {kind:?} group {group} needs {derived} columns for {payload}",
                        self.name
                    );
                    self.set_group_columns(kind, group, derived);
                } else if payload > reserved * capacity {
                    return Err(RefabricError::Argument(format!(
                        "Element {:?}: {kind:?} group {group} needs {payload} but {reserved} columns hold {}",
                        self.name,
                        reserved * capacity
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Elements available for placement. Ids are indices into the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementCatalog {
    elements: Vec<ElementDescriptor>,
}

impl ElementCatalog {
    /// Finalize every descriptor and build the catalog.
    pub fn new(mut elements: Vec<ElementDescriptor>) -> Result<ElementCatalog, RefabricError> {
        for element in &mut elements {
            element.finalize()?;
        }
        debug!("Catalog holds {} elements", elements.len());
        Ok(ElementCatalog { elements })
    }

    pub fn get(&self, id: usize) -> Result<&ElementDescriptor, RefabricError> {
        self.elements
            .get(id)
            .ok_or_else(|| RefabricError::Argument(format!("No element with id {id}")))
    }

    pub fn id_of(&self, name: &str) -> Result<usize, RefabricError> {
        self.elements
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| RefabricError::Argument(format!("No element named {name:?}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::rstest;

    fn element(height: u32) -> ElementDescriptor {
        ElementDescriptor {
            name: "test".into(),
            image: "test.pbs".into(),
            width: 3,
            height,
            constants: vec![],
            selectors: vec![],
            operations: vec![],
        }
    }

    #[rstest]
    #[case::one_bit(1, 4, 1)]
    #[case::exactly_full(32, 4, 1)]
    #[case::one_over(33, 4, 2)]
    #[case::tall(200, 16, 2)]
    fn test_constant_columns(#[case] bits: usize, #[case] height: u32, #[case] columns: usize) {
        let mut e = element(height);
        e.constants = vec![ConstantSpec {
            bits,
            group: 0,
            columns: 0,
        }];
        e.finalize().unwrap();
        assert_eq!(e.constants[0].columns, columns);
    }

    #[rstest]
    #[case::two_inputs(8, 2, 1, 2)]
    #[case::three_levels(4, 8, 1, 3)]
    #[case::wide(20, 4, 4, 2)]
    fn test_selector_columns(
        #[case] data_width: usize,
        #[case] inputs: usize,
        #[case] height: u32,
        #[case] columns: usize,
    ) {
        let mut e = element(height);
        e.selectors = vec![SelectorSpec {
            data_width,
            inputs,
            group: 0,
            columns: 0,
        }];
        e.finalize().unwrap();
        assert_eq!(e.selectors[0].columns, columns);
    }

    #[rstest]
    #[case::small(2, 16, 1)]
    #[case::exact(8, 16, 1)]
    #[case::over(9, 16, 2)]
    fn test_operation_columns(#[case] blocks: usize, #[case] height: u32, #[case] columns: usize) {
        let mut e = element(height);
        e.operations = vec![OperationSpec {
            blocks,
            group: 0,
            columns: 0,
        }];
        e.finalize().unwrap();
        assert_eq!(e.operations[0].columns, columns);
    }

    #[test]
    fn test_group_columns_shared_by_units() {
        let mut e = element(4);
        e.constants = vec![
            ConstantSpec { bits: 20, group: 0, columns: 0 },
            ConstantSpec { bits: 20, group: 0, columns: 0 },
            ConstantSpec { bits: 8, group: 1, columns: 0 },
        ];
        e.finalize().unwrap();
        let columns: Vec<usize> = e.constants.iter().map(|c| c.columns).collect();
        assert_eq!(columns, vec![2, 2, 1]);
        assert_eq!(e.groups(), vec![0, 1]);
    }

    #[test]
    fn test_reserved_columns_are_kept() {
        let mut e = element(4);
        e.constants = vec![ConstantSpec { bits: 10, group: 0, columns: 5 }];
        e.finalize().unwrap();
        assert_eq!(e.constants[0].columns, 5);
    }

    #[gtest]
    fn test_reserved_columns_too_small() {
        let mut e = element(1);
        e.constants = vec![ConstantSpec { bits: 24, group: 0, columns: 2 }];
        expect_that!(
            e.finalize(),
            err(displays_as(contains_substring("RefabricError::Argument:")))
        );
    }

    #[test]
    fn test_selector_levels() {
        let s = |inputs| SelectorSpec { data_width: 3, inputs, group: 0, columns: 0 };
        assert_eq!(s(2).levels(), 1);
        assert_eq!(s(4).levels(), 1);
        assert_eq!(s(5).levels(), 2);
        assert_eq!(s(6).luts(), 6);
    }

    #[gtest]
    fn test_catalog_lookup() {
        let catalog = ElementCatalog::new(vec![element(2)]).unwrap();
        assert_eq!(catalog.id_of("test").unwrap(), 0);
        expect_that!(
            catalog.get(3),
            err(displays_as(contains_substring("No element with id 3")))
        );
    }
}
