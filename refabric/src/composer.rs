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

//! Read-modify-write composition of partial configuration images.
//!
//! A partial image only carries the frame words of the logic-cell rows its region covers.
//! Every frame of a clock-region row is shared by all 50 rows of the region though, so
//! writing the image directly would clobber the rows above and below the region. The
//! composer therefore reads back every clock-region row a request spans, copies the new
//! words over the covered rows of each frame and writes the merged rows back.
//!
//! The scratch buffer holds the readback segments at the bottom, one per (region, clock
//! region row) pair, and the new image right above them:
//!
//! ```text
//! | segment 0 | segment 1 | ... | new image |
//! 0                             readback_end
//! ```
//!
//! Clock columns only take their interconnect frames from the image and config columns
//! take nothing, but the image still holds words for them, so the new-image cursor walks
//! every frame of every column. Both cursors are checked against their expected end before
//! anything is written.

use crate::error::RefabricError;
use crate::fabric::{
    BlockKind, FRAME_WORDS, FRAMES_CLK_INTERCONNECT, Fabric, HALF_FRAME_WORDS,
    ROWS_PER_CLOCK_REGION, WORDS_PER_ROW,
};
use crate::image_store::ImageStore;
use crate::port::pcap::BulkDriver;
use crate::port::{ConfigTransport, Poller};
use log::{debug, error, info, trace};
use std::ops::{Range, RangeInclusive};

/// Hard limit of the segment table.
pub const MAX_SEGMENTS: usize = 15;

/// First word of the upper half of a frame.
const UPPER_HALF: usize = HALF_FRAME_WORDS + 1;

/// Rectangular span of device columns and device rows (a pblock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub first_column: u32,
    pub last_column: u32,
    pub first_row: u32,
    pub last_row: u32,
    /// Zero the content frames of RAM columns in the region after writing.
    pub erase_ram: bool,
}

impl Region {
    /// Region of a `width` x `height` footprint anchored at device column `column`,
    /// device row `row`.
    pub fn new(column: u32, row: u32, width: u32, height: u32) -> Region {
        Region {
            first_column: column,
            last_column: column + width.max(1) - 1,
            first_row: row,
            last_row: row + height.max(1) - 1,
            erase_ram: false,
        }
    }

    pub fn with_ram_erase(mut self, erase_ram: bool) -> Region {
        self.erase_ram = erase_ram;
        self
    }

    pub fn clock_rows(&self) -> RangeInclusive<u32> {
        self.first_row / ROWS_PER_CLOCK_REGION..=self.last_row / ROWS_PER_CLOCK_REGION
    }
}

/// One (region, clock-region row) readback in the scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub region: Region,
    pub row: u32,
    /// First scratch word of the segment.
    pub start: usize,
    pub len: usize,
}

/// Which steps of a composition run.
///
/// Module stacks are composed by several calls on the same buffer: the first layer reads
/// back and combines, later layers combine onto the buffer the previous call left, and the
/// last one writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackMode {
    /// Readback, combine and write.
    #[default]
    Full,
    /// Readback and combine, no write.
    First,
    /// Combine onto the previous buffer, no write.
    Middle,
    /// Combine onto the previous buffer, then write.
    Last,
    /// Write the previous buffer as is.
    WriteOnly,
}

impl StackMode {
    /// Mode of a stack layer given whether it is the first and the last layer.
    pub fn from_flags(first: bool, last: bool) -> StackMode {
        match (first, last) {
            (true, true) => StackMode::Full,
            (true, false) => StackMode::First,
            (false, false) => StackMode::Middle,
            (false, true) => StackMode::Last,
        }
    }

    fn reads(self) -> bool {
        matches!(self, StackMode::Full | StackMode::First)
    }

    fn combines(self) -> bool {
        !matches!(self, StackMode::WriteOnly)
    }

    fn writes(self) -> bool {
        matches!(self, StackMode::Full | StackMode::Last | StackMode::WriteOnly)
    }
}

/// Words of each frame a region owns in one clock-region row.
///
/// Offsets are frame words. Words `0..50` are the lower half of the frame, word 50 is
/// the clock word and words `51..101` the upper half; every logic-cell row owns two words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPlacement {
    /// The region rows all lie in the lower half.
    Lower { offset: usize, len: usize },
    /// The region rows all lie in the upper half. `offset` counts from the first word
    /// of the upper half.
    Upper { offset: usize, len: usize },
    /// The region rows cover the clock word. The lower part ends at the clock word and
    /// the upper part starts right after it.
    Straddle {
        lower_offset: usize,
        lower_len: usize,
        upper_len: usize,
    },
}

impl RowPlacement {
    /// Placement of the device rows `first_row..=last_row` inside clock-region row `row`.
    pub fn for_rows(first_row: u32, last_row: u32, row: u32) -> Result<RowPlacement, RefabricError> {
        let base = row * ROWS_PER_CLOCK_REGION;
        let first_unused = if row == first_row / ROWS_PER_CLOCK_REGION {
            (first_row - base) as usize * WORDS_PER_ROW
        } else {
            0
        };
        let last_unused = if row == last_row / ROWS_PER_CLOCK_REGION {
            (base + ROWS_PER_CLOCK_REGION - 1 - last_row) as usize * WORDS_PER_ROW
        } else {
            0
        };
        let half = HALF_FRAME_WORDS;
        match (first_unused < half, last_unused < half) {
            (true, true) => Ok(RowPlacement::Straddle {
                lower_offset: first_unused,
                lower_len: half - first_unused,
                upper_len: half - last_unused,
            }),
            (false, true) => Ok(RowPlacement::Upper {
                offset: first_unused - half,
                len: (half - last_unused) - (first_unused - half),
            }),
            (true, false) => Ok(RowPlacement::Lower {
                offset: first_unused,
                len: 2 * half - first_unused - last_unused,
            }),
            (false, false) => Err(RefabricError::Argument(format!(
                "Rows {first_row}..={last_row} do not touch clock-region row {row}"
            ))),
        }
    }

    /// Words of one frame carried by the partial image.
    pub fn words_per_frame(&self) -> usize {
        match *self {
            RowPlacement::Lower { len, .. } | RowPlacement::Upper { len, .. } => len,
            RowPlacement::Straddle {
                lower_len,
                upper_len,
                ..
            } => lower_len + upper_len,
        }
    }

    /// (frame word range, image word range) pairs.
    fn spans(&self) -> [(Range<usize>, Range<usize>); 2] {
        match *self {
            RowPlacement::Lower { offset, len } => [(offset..offset + len, 0..len), (0..0, 0..0)],
            RowPlacement::Upper { offset, len } => {
                let start = UPPER_HALF + offset;
                [(start..start + len, 0..len), (0..0, 0..0)]
            }
            RowPlacement::Straddle {
                lower_offset,
                lower_len,
                upper_len,
            } => [
                (lower_offset..lower_offset + lower_len, 0..lower_len),
                (
                    UPPER_HALF..UPPER_HALF + upper_len,
                    lower_len..lower_len + upper_len,
                ),
            ],
        }
    }

    /// Copy the image words of one frame into the readback frame.
    pub fn combine(&self, image: &[u32], frame: &mut [u32]) {
        for (frame_words, image_words) in self.spans() {
            frame[frame_words].copy_from_slice(&image[image_words]);
        }
    }

    /// Append the words of `frame` a partial image would carry.
    pub fn extract(&self, frame: &[u32], image: &mut Vec<u32>) {
        for (frame_words, _) in self.spans() {
            image.extend_from_slice(&frame[frame_words]);
        }
    }
}

/// Bounds-checked position in a word buffer.
#[derive(Debug)]
struct Cursor {
    name: &'static str,
    position: usize,
    end: usize,
}

impl Cursor {
    fn new(name: &'static str, start: usize, end: usize) -> Cursor {
        Cursor {
            name,
            position: start,
            end,
        }
    }

    fn advance(&mut self, words: usize) -> Result<Range<usize>, RefabricError> {
        let next = self.position + words;
        if next > self.end {
            return Err(RefabricError::CursorMismatch {
                cursor: self.name,
                actual: next,
                expected: self.end,
            });
        }
        let range = self.position..next;
        self.position = next;
        Ok(range)
    }

    fn finish(&self) -> Result<(), RefabricError> {
        if self.position != self.end {
            return Err(RefabricError::CursorMismatch {
                cursor: self.name,
                actual: self.position,
                expected: self.end,
            });
        }
        Ok(())
    }
}

/// Whether each frame of the span takes words from the image, in frame order.
fn frame_plan(fabric: &Fabric, region: &Region, row: u32) -> Result<Vec<bool>, RefabricError> {
    let mut plan = Vec::new();
    for column in region.first_column..=region.last_column {
        let info = fabric.column(row, column)?;
        let combined = match info.kind {
            BlockKind::Cfg => 0,
            BlockKind::Clk => FRAMES_CLK_INTERCONNECT.min(info.frames),
            _ => info.frames,
        };
        plan.extend((0..info.frames).map(|frame| frame < combined));
    }
    Ok(plan)
}

/// Lay segments out for `regions`, starting at scratch word 0.
fn plan_segments(fabric: &Fabric, regions: &[Region]) -> Result<Vec<Segment>, RefabricError> {
    let mut segments = Vec::new();
    let mut start = 0;
    for region in regions {
        if region.first_column > region.last_column || region.first_row > region.last_row {
            return Err(RefabricError::Argument(format!("Empty region {region:?}")));
        }
        for row in region.clock_rows() {
            if segments.len() == MAX_SEGMENTS {
                return Err(RefabricError::SegmentOverflow { max: MAX_SEGMENTS });
            }
            let len = fabric.words_in_span(row, region.first_column, region.last_column)?;
            segments.push(Segment {
                region: *region,
                row,
                start,
                len,
            });
            start += len;
        }
    }
    Ok(segments)
}

/// Cut the words a partial image of `regions` would carry out of a segmented readback.
///
/// `readback` holds the clock-region rows of every region back to back, in the order
/// [`BitstreamComposer::write_regions`] reads them.
pub fn extract_region_image(
    readback: &[u32],
    fabric: &Fabric,
    regions: &[Region],
) -> Result<Vec<u32>, RefabricError> {
    let segments = plan_segments(fabric, regions)?;
    let expected = segments.last().map_or(0, |s| s.start + s.len);
    let mut cursor = Cursor::new("readback", 0, readback.len());
    let mut image = Vec::new();
    for segment in &segments {
        let placement = RowPlacement::for_rows(
            segment.region.first_row,
            segment.region.last_row,
            segment.row,
        )?;
        for _ in frame_plan(fabric, &segment.region, segment.row)? {
            let frame = cursor.advance(FRAME_WORDS)?;
            placement.extract(&readback[frame], &mut image);
        }
    }
    Cursor::new("readback", cursor.position, expected).finish()?;
    Ok(image)
}

/// Composition engine with its scratch buffer and segment table.
#[derive(Debug)]
pub struct BitstreamComposer {
    scratch: Vec<u32>,
    segments: Vec<Segment>,
    readback_end: usize,
}

impl BitstreamComposer {
    pub fn new(scratch_words: usize) -> BitstreamComposer {
        BitstreamComposer {
            scratch: vec![0; scratch_words],
            segments: Vec::new(),
            readback_end: 0,
        }
    }

    /// Segments of the last composition.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_words(&self, segment: &Segment) -> &[u32] {
        &self.scratch[segment.start..segment.start + segment.len]
    }

    /// Every composed segment back to back.
    pub fn composed(&self) -> &[u32] {
        &self.scratch[..self.readback_end]
    }

    /// Drop the composed buffer.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.readback_end = 0;
    }

    /// Compose the named image over `regions` and, depending on `mode`, write the result.
    ///
    /// The image holds, for every region in order, every clock-region row the region spans
    /// from the bottom up and every frame of every column from left to right, the words of
    /// the frame that belong to the region's rows.
    ///
    /// # Returns: `Result<(), RefabricError>`
    /// * `Ok(())` - All requested steps completed
    /// * `Err(RefabricError::PartialWrite)` - A write failed after the port was written;
    ///   the fabric content of the regions is unknown
    /// * `Err(_)` - Any other error is raised before the first write
    #[allow(clippy::too_many_arguments)]
    pub fn write_regions<T: ConfigTransport, S: ImageStore + ?Sized>(
        &mut self,
        transport: &mut T,
        poller: &Poller,
        fabric: &Fabric,
        store: &mut S,
        image: &str,
        regions: &[Region],
        mode: StackMode,
    ) -> Result<(), RefabricError> {
        if let Err(e) = self.prepare(transport, poller, fabric, store, image, regions, mode) {
            self.clear();
            return Err(e);
        }
        if mode.writes() {
            self.write_segments(transport, poller, fabric)?;
            info!(
                "Wrote {} clock-region rows for {} region(s)",
                self.segments.len(),
                regions.len()
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare<T: ConfigTransport, S: ImageStore + ?Sized>(
        &mut self,
        transport: &mut T,
        poller: &Poller,
        fabric: &Fabric,
        store: &mut S,
        image: &str,
        regions: &[Region],
        mode: StackMode,
    ) -> Result<(), RefabricError> {
        let planned = plan_segments(fabric, regions)?;
        if mode.reads() {
            self.readback(transport, poller, fabric, planned)?;
        } else if self.segments.is_empty() {
            return Err(RefabricError::Argument(format!(
                "{mode:?} needs a buffer composed by an earlier call"
            )));
        } else if planned != self.segments {
            return Err(RefabricError::Argument(
                "Regions differ from the ones of the composed buffer".to_string(),
            ));
        }
        if mode.combines() {
            let words = store.load(image, &mut self.scratch[self.readback_end..])?;
            debug!("Loaded {words} words of {image:?} above the readback");
            self.combine(fabric, words)?;
        }
        Ok(())
    }

    fn readback<T: ConfigTransport>(
        &mut self,
        transport: &mut T,
        poller: &Poller,
        fabric: &Fabric,
        segments: Vec<Segment>,
    ) -> Result<(), RefabricError> {
        self.clear();
        let mut driver = BulkDriver::new(transport, poller);
        for segment in &segments {
            let available = self.scratch.len().saturating_sub(segment.start);
            if available < segment.len + FRAME_WORDS {
                return Err(RefabricError::ScratchOverflow {
                    needed: segment.start + segment.len + FRAME_WORDS,
                    available: self.scratch.len(),
                });
            }
            let words = driver.read_row(
                fabric,
                segment.row,
                segment.region.first_column,
                segment.region.last_column,
                &mut self.scratch[segment.start..],
            )?;
            if words != segment.len {
                return Err(RefabricError::CursorMismatch {
                    cursor: "readback",
                    actual: segment.start + words,
                    expected: segment.start + segment.len,
                });
            }
            trace!("Read back row {} into scratch word {}", segment.row, segment.start);
        }
        self.readback_end = segments.last().map_or(0, |s| s.start + s.len);
        self.segments = segments;
        Ok(())
    }

    fn combine(&mut self, fabric: &Fabric, image_words: usize) -> Result<(), RefabricError> {
        let (readback, image) = self.scratch.split_at_mut(self.readback_end);
        let mut new = Cursor::new("new image", 0, image_words);
        for segment in &self.segments {
            let placement = RowPlacement::for_rows(
                segment.region.first_row,
                segment.region.last_row,
                segment.row,
            )?;
            let per_frame = placement.words_per_frame();
            let mut old = Cursor::new("readback", segment.start, segment.start + segment.len);
            for combined in frame_plan(fabric, &segment.region, segment.row)? {
                let source = new.advance(per_frame)?;
                let frame = old.advance(FRAME_WORDS)?;
                if combined {
                    placement.combine(&image[source], &mut readback[frame]);
                }
            }
            old.finish()?;
            trace!("Combined row {} as {placement:?}", segment.row);
        }
        new.finish()
    }

    fn write_segments<T: ConfigTransport>(
        &mut self,
        transport: &mut T,
        poller: &Poller,
        fabric: &Fabric,
    ) -> Result<(), RefabricError> {
        let mut driver = BulkDriver::new(transport, poller);
        for segment in &self.segments {
            let region = &segment.region;
            driver
                .write_row(
                    fabric,
                    segment.row,
                    region.first_column,
                    region.last_column,
                    &self.scratch[segment.start..segment.start + segment.len],
                    region.erase_ram,
                )
                .map_err(|e| {
                    error!("Write of clock-region row {} failed: {e}", segment.row);
                    RefabricError::PartialWrite {
                        row: segment.row,
                        source: Box::new(e),
                    }
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::fabric_for_device;
    use crate::image_store::MemoryImageStore;
    use crate::sim::SimulatedFabric;
    use googletest::prelude::*;
    use rstest::rstest;
    use std::time::Duration;

    fn poller() -> Poller {
        Poller::new(Duration::from_millis(20))
    }

    #[rstest]
    #[case::lower_half(0, 24, RowPlacement::Lower { offset: 0, len: 50 })]
    #[case::upper_half(25, 49, RowPlacement::Upper { offset: 0, len: 50 })]
    #[case::straddle(10, 39, RowPlacement::Straddle { lower_offset: 20, lower_len: 30, upper_len: 30 })]
    #[case::partition_rows(9, 24, RowPlacement::Lower { offset: 18, len: 32 })]
    #[case::upper_part(30, 44, RowPlacement::Upper { offset: 10, len: 30 })]
    #[case::whole_row(0, 49, RowPlacement::Straddle { lower_offset: 0, lower_len: 50, upper_len: 50 })]
    fn test_row_placement(#[case] first: u32, #[case] last: u32, #[case] expected: RowPlacement) {
        assert_eq!(RowPlacement::for_rows(first, last, 0).unwrap(), expected);
    }

    #[test]
    fn test_row_placement_across_rows() {
        // rows 40..=59 cover the top of clock-region row 0 and the bottom of row 1
        assert_eq!(
            RowPlacement::for_rows(40, 59, 0).unwrap(),
            RowPlacement::Upper { offset: 30, len: 20 }
        );
        assert_eq!(
            RowPlacement::for_rows(40, 59, 1).unwrap(),
            RowPlacement::Lower { offset: 0, len: 20 }
        );
    }

    #[test]
    fn test_combine_leaves_clock_word() {
        let placement = RowPlacement::for_rows(10, 39, 0).unwrap();
        let mut frame = vec![7; FRAME_WORDS];
        placement.combine(&[1; 60], &mut frame);
        assert_eq!(&frame[..20], &[7; 20]);
        assert_eq!(&frame[20..50], &[1; 30]);
        assert_eq!(frame[50], 7);
        assert_eq!(&frame[51..81], &[1; 30]);
        assert_eq!(&frame[81..], &[7; 20]);
    }

    #[test]
    fn test_frame_plan_of_clock_and_config_columns() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let plan = frame_plan(&fabric, &Region::new(33, 0, 1, 1), 0).unwrap();
        assert_eq!(plan.len(), 30);
        assert_eq!(plan.iter().filter(|&&c| c).count(), FRAMES_CLK_INTERCONNECT);
        let plan = frame_plan(&fabric, &Region::new(50, 0, 1, 1), 0).unwrap();
        assert!(plan.iter().all(|&c| !c));
    }

    #[gtest]
    fn test_full_composition_preserves_other_rows() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        hw.fill_pattern(3);
        let before = hw.row_words(0, 40, 45).unwrap();
        let mut store = MemoryImageStore::new();
        store.insert("top", vec![0xC0DE_C0DE; 216 * 32]);
        let mut composer = BitstreamComposer::new(1 << 16);
        let region = Region::new(40, 9, 6, 16);

        composer
            .write_regions(&mut hw, &poller(), &fabric, &mut store, "top", &[region], StackMode::Full)
            .unwrap();

        assert_eq!(hw.frame_writes(), 1);
        let after = hw.row_words(0, 40, 45).unwrap();
        for (frame, (new, old)) in after.chunks(FRAME_WORDS).zip(before.chunks(FRAME_WORDS)).enumerate() {
            assert_eq!(&new[18..50], &[0xC0DE_C0DE; 32][..], "frame {frame}");
            assert_eq!(&new[..18], &old[..18]);
            assert_eq!(&new[50..], &old[50..]);
        }
    }

    #[gtest]
    fn test_composing_readback_is_a_no_op() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        hw.fill_pattern(11);
        // spans the clock column and two clock-region rows
        let regions = [Region::new(30, 30, 6, 40), Region::new(48, 5, 4, 10)];
        let mut readback = Vec::new();
        for region in &regions {
            for row in region.clock_rows() {
                readback.extend(hw.row_words(row, region.first_column, region.last_column).unwrap());
            }
        }
        let image = extract_region_image(&readback, &fabric, &regions).unwrap();
        let mut store = MemoryImageStore::new();
        store.insert("same", image);
        let mut composer = BitstreamComposer::new(1 << 17);

        composer
            .write_regions(&mut hw, &poller(), &fabric, &mut store, "same", &regions, StackMode::First)
            .unwrap();

        assert_eq!(composer.segments().len(), 3);
        assert_eq!(composer.composed(), &readback[..]);
        assert_eq!(hw.frame_writes(), 0);
    }

    #[gtest]
    fn test_short_image_is_rejected_before_write() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        store.insert("short", vec![1; 216 * 32 - 1]);
        let mut composer = BitstreamComposer::new(1 << 16);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "short",
            &[Region::new(40, 9, 6, 16)],
            StackMode::Full,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring("RefabricError::CursorMismatch: new image cursor")))
        );
        assert_eq!(hw.frame_writes(), 0);
        assert!(composer.segments().is_empty());
    }

    #[gtest]
    fn test_long_image_is_rejected() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        store.insert("long", vec![1; 216 * 32 + 5]);
        let mut composer = BitstreamComposer::new(1 << 16);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "long",
            &[Region::new(40, 9, 6, 16)],
            StackMode::Full,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring(
                "new image cursor ended at word 6912, expected word 6917"
            )))
        );
        assert_eq!(hw.frame_writes(), 0);
    }

    #[gtest]
    fn test_segment_table_overflow() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        let regions = vec![Region::new(40, 0, 1, 150); 6];
        let mut composer = BitstreamComposer::new(1 << 20);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "none",
            &regions,
            StackMode::Full,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring(
                "RefabricError::SegmentOverflow: More than 15 clock-region segments requested"
            )))
        );
        assert!(hw.transfers().is_empty());
    }

    #[gtest]
    fn test_scratch_too_small() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        let mut composer = BitstreamComposer::new(36 * FRAME_WORDS);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "none",
            &[Region::new(40, 0, 1, 1)],
            StackMode::Full,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring("RefabricError::ScratchOverflow:")))
        );
    }

    #[gtest]
    fn test_stacked_layers_write_once() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let region = Region::new(40, 0, 1, 25);
        let mut store = MemoryImageStore::new();
        store.insert("base", vec![1; 36 * 50]);
        let mut upper = vec![1; 36 * 50];
        for frame in upper.chunks_mut(50) {
            frame[40..].fill(2);
        }
        store.insert("upper", upper);
        let mut composer = BitstreamComposer::new(1 << 16);
        let poller = poller();

        for (image, mode) in [("base", StackMode::First), ("upper", StackMode::Last)] {
            composer
                .write_regions(&mut hw, &poller, &fabric, &mut store, image, &[region], mode)
                .unwrap();
        }

        assert_eq!(hw.frame_writes(), 1);
        let words = hw.row_words(0, 40, 40).unwrap();
        assert_eq!(&words[..40], &[1; 40]);
        assert_eq!(&words[40..50], &[2; 10]);
        assert_eq!(words[50], 0);
    }

    /// 36 frames of the lower half of column 40 with `value` in words `words` of every frame
    /// and `base` elsewhere.
    fn layer(base: u32, value: u32, words: Range<usize>) -> Vec<u32> {
        let mut image = vec![base; 36 * 50];
        for frame in image.chunks_mut(50) {
            frame[words.clone()].fill(value);
        }
        image
    }

    #[gtest]
    fn test_stacked_middle_layer() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        hw.fill_pattern(5);
        let before = hw.row_words(0, 40, 40).unwrap();
        let region = Region::new(40, 0, 1, 25);
        let mut store = MemoryImageStore::new();
        store.insert("base", layer(1, 1, 0..0));
        store.insert("middle", layer(1, 2, 20..40));
        store.insert("top", {
            let mut top = layer(1, 2, 20..40);
            for frame in top.chunks_mut(50) {
                frame[40..].fill(3);
            }
            top
        });
        let mut composer = BitstreamComposer::new(1 << 16);
        let poller = poller();

        composer
            .write_regions(&mut hw, &poller, &fabric, &mut store, "base", &[region], StackMode::First)
            .unwrap();
        composer
            .write_regions(&mut hw, &poller, &fabric, &mut store, "middle", &[region], StackMode::Middle)
            .unwrap();
        assert_eq!(hw.frame_writes(), 0);
        assert_eq!(&composer.composed()[20..40], &[2; 20]);
        composer
            .write_regions(&mut hw, &poller, &fabric, &mut store, "top", &[region], StackMode::Last)
            .unwrap();

        assert_eq!(hw.frame_writes(), 1);
        let after = hw.row_words(0, 40, 40).unwrap();
        for (new, old) in after.chunks(FRAME_WORDS).zip(before.chunks(FRAME_WORDS)) {
            assert_eq!(&new[..20], &[1; 20]);
            assert_eq!(&new[20..40], &[2; 20]);
            assert_eq!(&new[40..50], &[3; 10]);
            assert_eq!(&new[50..], &old[50..]);
        }
    }

    #[gtest]
    fn test_write_only_rewrites_buffer() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let region = Region::new(40, 0, 1, 25);
        let mut store = MemoryImageStore::new();
        store.insert("base", layer(4, 4, 0..0));
        let mut composer = BitstreamComposer::new(1 << 16);
        let poller = poller();

        composer
            .write_regions(&mut hw, &poller, &fabric, &mut store, "base", &[region], StackMode::First)
            .unwrap();
        let composed = composer.composed().to_vec();
        // a readback now would pick up the new pattern instead of the composed rows
        hw.fill_pattern(21);
        composer
            .write_regions(&mut hw, &poller, &fabric, &mut store, "missing", &[region], StackMode::WriteOnly)
            .unwrap();

        assert_eq!(hw.frame_writes(), 1);
        assert_eq!(hw.row_words(0, 40, 40).unwrap(), composed);
        assert_eq!(composer.composed(), &composed[..]);
    }

    #[gtest]
    fn test_stacking_with_different_regions_is_rejected() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        store.insert("base", layer(1, 1, 0..0));
        let mut composer = BitstreamComposer::new(1 << 16);
        let poller = poller();
        composer
            .write_regions(
                &mut hw,
                &poller,
                &fabric,
                &mut store,
                "base",
                &[Region::new(40, 0, 1, 25)],
                StackMode::First,
            )
            .unwrap();

        let result = composer.write_regions(
            &mut hw,
            &poller,
            &fabric,
            &mut store,
            "base",
            &[Region::new(41, 0, 1, 25)],
            StackMode::Last,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring(
                "Regions differ from the ones of the composed buffer"
            )))
        );
        assert_eq!(hw.frame_writes(), 0);
        assert!(composer.segments().is_empty());
    }

    #[gtest]
    fn test_stacking_needs_earlier_buffer() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        let mut store = MemoryImageStore::new();
        let mut composer = BitstreamComposer::new(1 << 16);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "none",
            &[Region::new(40, 0, 1, 25)],
            StackMode::WriteOnly,
        );
        expect_that!(
            result,
            err(displays_as(contains_substring("WriteOnly needs a buffer composed by an earlier call")))
        );
    }

    #[gtest]
    fn test_transport_failure_while_writing_is_fatal() {
        let fabric = fabric_for_device("xc7z020").unwrap();
        let mut hw = SimulatedFabric::new(&fabric);
        // readback takes two transfers, the write fails on its frame data
        hw.fail_after(3);
        let mut store = MemoryImageStore::new();
        store.insert("top", vec![0; 36 * 50]);
        let mut composer = BitstreamComposer::new(1 << 16);
        let result = composer.write_regions(
            &mut hw,
            &poller(),
            &fabric,
            &mut store,
            "top",
            &[Region::new(40, 0, 1, 25)],
            StackMode::Full,
        );
        let error = result.unwrap_err();
        assert!(error.is_fatal());
        expect_that!(
            error.to_string(),
            contains_substring("RefabricError::PartialWrite: Write of clock-region row 0")
        );
    }

    #[rstest]
    #[case(true, true, StackMode::Full)]
    #[case(true, false, StackMode::First)]
    #[case(false, false, StackMode::Middle)]
    #[case(false, true, StackMode::Last)]
    fn test_stack_mode_from_flags(#[case] first: bool, #[case] last: bool, #[case] mode: StackMode) {
        assert_eq!(StackMode::from_flags(first, last), mode);
    }
}
