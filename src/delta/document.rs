//! # Delta Document
//!
//! A logical byte sequence described by a list of segments. Source segments
//! are ranges of the file source; memory segments are ranges of the
//! document's private memory store, a [`PagedData`].
//!
//! ```text
//! document  | src 0..10 | mem 0..1 | src 11..256 |
//! memory    [x]
//! ```
//!
//! ## List Invariants
//!
//! - no segment is empty
//! - lengths add up to the document size
//! - no two neighbours can merge: a source segment followed by the source
//!   range right after it, or a memory segment followed by the store range
//!   right after it, is always a single segment
//! - memory segments never share store bytes, so the store holds live bytes
//!   plus a counted amount of garbage
//!
//! ## Pointer Cache
//!
//! The document caches the last resolved segment with its logical start.
//! Lookups walk from there in either direction, which keeps hex-editor style
//! editing close to constant time. After a structural edit at `position` the
//! cache points at the segment holding `position - 1`: splits only ever cut
//! the segment at or after `position`, and a merge keeps its left node, so
//! that segment and its start survive the edit.
//!
//! ## Split, Splice and Merge
//!
//! Every structural edit first turns its boundaries into segment boundaries
//! by splitting, then unlinks or inserts whole segments, then merges
//! neighbours around the edit. Writing one byte of a source segment splits it
//! into up to three pieces with a one-byte memory segment in the middle.
//!
//! ## Coalescing
//!
//! New bytes are appended to the memory store. When they continue a memory
//! segment that ends both at the edit position and at the tail of the store,
//! that segment grows instead of a new one appearing, so typing or
//! overwriting byte after byte keeps a single segment.
//!
//! ## Garbage
//!
//! Removed memory bytes at the tail of the store are truncated; any others
//! become garbage. Once garbage reaches a page and outweighs the live bytes,
//! the store is compacted: live ranges are packed to the front in store
//! order, segments are rebased and the freed pages go back to the allocator.

use std::fmt;
use std::sync::Arc;

use eyre::{bail, eyre, Result};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::DEFAULT_PAGE_SIZE;
use crate::data::{chunk_len, BinaryData, EditableBinaryData};
use crate::error::{check_growth, check_position, check_range, DataError};
use crate::paged::PagedData;

use super::list::{SegmentId, SegmentList};
use super::repository::RepositoryShared;
use super::segment::DataSegment;
use super::source::FileDataSource;

/// Last resolved segment and its logical start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SegmentPointer {
    pub(super) id: SegmentId,
    pub(super) start: u64,
}

pub(crate) struct DocumentCore {
    pub(super) source: Option<Arc<FileDataSource>>,
    pub(super) segments: SegmentList,
    pub(super) memory: PagedData,
    /// Bytes of `memory` no segment refers to.
    pub(super) memory_garbage: u64,
    pub(super) data_size: u64,
    pub(super) pointer: Option<SegmentPointer>,
}

impl DocumentCore {
    pub(super) fn new(source: Option<Arc<FileDataSource>>, memory: PagedData) -> Self {
        let mut segments = SegmentList::new();
        let data_size = source.as_ref().map_or(0, |source| source.data_size());
        if data_size > 0 {
            segments.push_back(DataSegment::Source {
                start: 0,
                length: data_size,
            });
        }
        Self {
            source,
            segments,
            memory,
            memory_garbage: 0,
            data_size,
            pointer: None,
        }
    }

    pub(super) fn empty(source: Option<Arc<FileDataSource>>, memory: PagedData) -> Self {
        Self {
            source,
            segments: SegmentList::new(),
            memory,
            memory_garbage: 0,
            data_size: 0,
            pointer: None,
        }
    }

    pub(super) fn locate(&mut self, position: u64) -> Result<(SegmentId, u64)> {
        let mut cursor = match self.pointer {
            Some(pointer) if position >= pointer.start || pointer.start - position < position => {
                Some((pointer.id, pointer.start))
            }
            _ => self.segments.first().map(|id| (id, 0)),
        };

        loop {
            let Some((id, start)) = cursor else {
                bail!(
                    "segment list ends before position {} (size {})",
                    position,
                    self.data_size
                );
            };
            let length = self.segments.get(id).length();
            if position < start {
                cursor = self
                    .segments
                    .prev(id)
                    .map(|prev| (prev, start - self.segments.get(prev).length()));
            } else if position >= start + length {
                cursor = self.segments.next(id).map(|next| (next, start + length));
            } else {
                self.pointer = Some(SegmentPointer { id, start });
                return Ok((id, start));
            }
        }
    }

    /// Segment holding the byte just before `position`, which survives any
    /// edit starting at `position`.
    fn anchor_before(&mut self, position: u64) -> Result<Option<SegmentPointer>> {
        if position == 0 {
            return Ok(None);
        }
        let (id, start) = self.locate(position - 1)?;
        Ok(Some(SegmentPointer { id, start }))
    }

    /// Makes `position` a segment boundary and returns the segment starting
    /// there, or `None` at the end of the document.
    fn split_at(&mut self, position: u64) -> Result<Option<SegmentId>> {
        if position >= self.data_size {
            return Ok(None);
        }
        let (id, start) = self.locate(position)?;
        if start == position {
            return Ok(Some(id));
        }

        let (left, right) = self.segments.get(id).split(position - start);
        self.segments.set(id, left);
        Ok(Some(self.segments.insert_after(id, right)))
    }

    /// Merges mergeable neighbours from `from` up to and including the
    /// boundary after `stop`. The left node of a merge is kept.
    pub(super) fn merge_run(&mut self, from: SegmentId, stop: SegmentId) {
        let mut current = from;
        let mut stop = stop;
        while let Some(next) = self.segments.next(current) {
            let left = self.segments.get(current);
            let right = self.segments.get(next);
            if left.can_merge(&right) {
                self.segments
                    .set(current, left.with_length(left.length() + right.length()));
                self.segments.remove(next);
                if next == stop {
                    stop = current;
                }
                continue;
            }
            if current == stop {
                break;
            }
            current = next;
        }
    }

    /// Inserts `segments` at `position`. Memory segments must already refer
    /// to this document's memory store.
    pub(super) fn splice(&mut self, position: u64, segments: Vec<DataSegment>) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        let total: u64 = segments.iter().map(DataSegment::length).sum();
        check_growth(self.data_size, total)?;
        if total == 0 {
            return Ok(());
        }

        let anchor = self.anchor_before(position)?;
        let next = self.split_at(position)?;

        let mut first_new = None;
        let mut last_new = None;
        for segment in segments.into_iter().filter(|segment| segment.length() > 0) {
            let id = match next {
                Some(next) => self.segments.insert_before(next, segment),
                None => self.segments.push_back(segment),
            };
            first_new.get_or_insert(id);
            last_new = Some(id);
        }
        self.data_size += total;

        if let (Some(from), Some(stop)) = (anchor.map(|anchor| anchor.id).or(first_new), last_new) {
            self.merge_run(from, stop);
        }
        self.pointer = anchor;
        Ok(())
    }

    pub(super) fn insert_bytes(&mut self, position: u64, bytes: &[u8]) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        let length = bytes.len() as u64;
        check_growth(self.data_size, length)?;
        if length == 0 {
            return Ok(());
        }

        let anchor = self.anchor_before(position)?;
        let memory_end = self.memory.data_size();
        if let Some(anchor) = anchor {
            if let DataSegment::Memory {
                start,
                length: anchor_length,
            } = self.segments.get(anchor.id)
            {
                if anchor.start + anchor_length == position && start + anchor_length == memory_end {
                    self.memory.insert_slice(memory_end, bytes)?;
                    self.segments.set(
                        anchor.id,
                        DataSegment::Memory {
                            start,
                            length: anchor_length + length,
                        },
                    );
                    self.data_size += length;
                    self.pointer = Some(anchor);
                    return Ok(());
                }
            }
        }

        self.memory.insert_slice(memory_end, bytes)?;
        self.splice(
            position,
            vec![DataSegment::Memory {
                start: memory_end,
                length,
            }],
        )
    }

    /// Inserts `length` copies of `value`, appending them to the memory store
    /// one page at a time.
    pub(super) fn insert_repeated(&mut self, position: u64, length: u64, value: u8) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        check_growth(self.data_size, length)?;
        let chunk = vec![value; chunk_len(length, self.memory.page_size())];
        let mut done = 0u64;
        while done < length {
            let count = chunk_len(length - done, chunk.len());
            self.insert_bytes(position + done, &chunk[..count])?;
            done += count as u64;
        }
        Ok(())
    }

    /// Inserts `start..start + length` of `other`, sharing its source
    /// segments and copying its memory bytes into this store.
    pub(super) fn insert_from_core(
        &mut self,
        position: u64,
        other: &mut DocumentCore,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        check_range(start, length, other.data_size)?;
        check_growth(self.data_size, length)?;
        if length == 0 {
            return Ok(());
        }

        if !self.shares_source(other) {
            let mut buffer = vec![0u8; chunk_len(length, DEFAULT_PAGE_SIZE)];
            let mut done = 0u64;
            while done < length {
                let count = chunk_len(length - done, buffer.len());
                other.read(start + done, &mut buffer[..count])?;
                self.insert_bytes(position + done, &buffer[..count])?;
                done += count as u64;
            }
            return Ok(());
        }

        let mut mapped = Vec::new();
        for segment in other.segments_in_range(start, length)? {
            match segment {
                DataSegment::Source { .. } => mapped.push(segment),
                DataSegment::Memory { start, length } => {
                    let target = self.memory.data_size();
                    self.memory.insert_data(target, &other.memory, start, length)?;
                    mapped.push(DataSegment::Memory {
                        start: target,
                        length,
                    });
                }
            }
        }
        self.splice(position, mapped)
    }

    /// Inserts a copy of `start..start + length` of this document at
    /// `position`.
    pub(super) fn insert_copy_within(&mut self, position: u64, start: u64, length: u64) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        check_range(start, length, self.data_size)?;
        check_growth(self.data_size, length)?;

        let mut mapped = Vec::new();
        for segment in self.segments_in_range(start, length)? {
            match segment {
                DataSegment::Source { .. } => mapped.push(segment),
                DataSegment::Memory { start, length } => {
                    let target = self.memory.data_size();
                    self.memory.set_data_size(target + length)?;
                    self.memory.copy_within(target, start, length)?;
                    mapped.push(DataSegment::Memory {
                        start: target,
                        length,
                    });
                }
            }
        }
        self.splice(position, mapped)
    }

    pub(super) fn insert_from_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(position, 0, self.data_size)?;
        check_range(start, length, data.data_size())?;
        check_growth(self.data_size, length)?;

        let mut buffer = vec![0u8; chunk_len(length, DEFAULT_PAGE_SIZE)];
        let mut done = 0u64;
        while done < length {
            let count = chunk_len(length - done, buffer.len());
            data.copy_to_slice(start + done, &mut buffer[..count])?;
            self.insert_bytes(position + done, &buffer[..count])?;
            done += count as u64;
        }
        Ok(())
    }

    /// Segments covering `start..start + length`, clipped to the range.
    pub(super) fn segments_in_range(&mut self, start: u64, length: u64) -> Result<Vec<DataSegment>> {
        check_range(start, length, self.data_size)?;
        let mut result = Vec::new();
        if length == 0 {
            return Ok(result);
        }

        let (mut id, mut segment_start) = self.locate(start)?;
        let end = start + length;
        loop {
            let segment = self.segments.get(id);
            let from = start.max(segment_start) - segment_start;
            let to = end.min(segment_start + segment.length()) - segment_start;
            result.push(segment.slice(from, to - from));

            segment_start += segment.length();
            if segment_start >= end {
                break;
            }
            id = self
                .segments
                .next(id)
                .ok_or_else(|| eyre!("segment list ends before position {}", end))?;
        }
        Ok(result)
    }

    /// Single memory segment covering `position..position + length`, as the
    /// store offset of `position`.
    fn memory_run(&mut self, position: u64, length: u64) -> Result<Option<u64>> {
        let (id, start) = self.locate(position)?;
        match self.segments.get(id) {
            DataSegment::Memory {
                start: memory_start,
                length: segment_length,
            } if position + length <= start + segment_length => {
                Ok(Some(memory_start + position - start))
            }
            _ => Ok(None),
        }
    }

    pub(super) fn read(&mut self, position: u64, target: &mut [u8]) -> Result<()> {
        check_range(position, target.len() as u64, self.data_size)?;
        if target.is_empty() {
            return Ok(());
        }

        let (mut id, mut start) = self.locate(position)?;
        let mut done = 0usize;
        loop {
            let segment = self.segments.get(id);
            let offset = position + done as u64 - start;
            let count = chunk_len(segment.length() - offset, target.len() - done);
            let window = &mut target[done..done + count];
            match segment {
                DataSegment::Source { start: source_start, .. } => match &self.source {
                    Some(source) => source.read_at(source_start + offset, window)?,
                    None => bail!(DataError::NotSupported("document has no file source")),
                },
                DataSegment::Memory {
                    start: memory_start,
                    ..
                } => self.memory.copy_to_slice(memory_start + offset, window)?,
            }

            done += count;
            if done == target.len() {
                break;
            }
            start += segment.length();
            id = self
                .segments
                .next(id)
                .ok_or_else(|| eyre!("segment list ends before position {}", start))?;
        }
        self.pointer = Some(SegmentPointer { id, start });
        Ok(())
    }

    pub(super) fn remove(&mut self, position: u64, length: u64) -> Result<()> {
        check_range(position, length, self.data_size)?;
        if length == 0 {
            return Ok(());
        }

        let anchor = self.anchor_before(position)?;
        let first = self.split_at(position)?;
        let end = self.split_at(position + length)?;

        let mut removed = Vec::new();
        let mut cursor = first;
        while cursor != end {
            let Some(id) = cursor else { break };
            cursor = self.segments.next(id);
            removed.push(self.segments.remove(id));
        }
        self.data_size -= length;
        self.pointer = anchor;

        for segment in removed.into_iter().rev() {
            self.release_memory(segment)?;
        }
        if let Some(anchor) = anchor {
            self.merge_run(anchor.id, anchor.id);
        }
        self.compact_memory_if_wasteful()
    }

    /// Shrinks the memory store if `segment` was its last range, otherwise
    /// counts its bytes as garbage.
    fn release_memory(&mut self, segment: DataSegment) -> Result<()> {
        if let DataSegment::Memory { start, length } = segment {
            if start + length == self.memory.data_size() {
                self.memory.set_data_size(start)?;
            } else {
                self.memory_garbage += length;
            }
        }
        Ok(())
    }

    /// Compacts the memory store once garbage reaches a full page and at
    /// least as many bytes as the live memory segments hold.
    fn compact_memory_if_wasteful(&mut self) -> Result<()> {
        let live = self.memory.data_size() - self.memory_garbage;
        if self.memory_garbage >= self.memory.page_size() as u64 && self.memory_garbage >= live {
            self.compact_memory()?;
        }
        Ok(())
    }

    /// Packs live memory ranges to the front of the store in store order,
    /// rebases their segments and drops the freed tail pages.
    pub(super) fn compact_memory(&mut self) -> Result<()> {
        let mut ranges: Vec<(u64, SegmentId)> = self
            .segments
            .iter()
            .filter_map(|(id, segment)| match segment {
                DataSegment::Memory { start, .. } => Some((start, id)),
                DataSegment::Source { .. } => None,
            })
            .collect();
        ranges.sort_unstable_by_key(|(start, _)| *start);

        // ranges are disjoint, so each target lies below every unmoved range
        let before = self.memory.data_size();
        let mut packed = 0u64;
        for (start, id) in ranges {
            let length = self.segments.get(id).length();
            self.memory.copy_within(packed, start, length)?;
            self.segments.set(id, DataSegment::Memory { start: packed, length });
            packed += length;
        }
        self.memory.set_data_size(packed)?;
        self.memory_garbage = 0;

        if let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) {
            self.merge_run(first, last);
        }
        self.pointer = None;
        debug!(before, after = packed, "compacted memory store");
        Ok(())
    }

    pub(super) fn replace_bytes(&mut self, position: u64, bytes: &[u8]) -> Result<()> {
        let length = bytes.len() as u64;
        check_range(position, length, self.data_size)?;
        if length == 0 {
            return Ok(());
        }

        if let Some(memory_position) = self.memory_run(position, length)? {
            return self.memory.replace_slice(memory_position, bytes);
        }
        self.remove(position, length)?;
        self.insert_bytes(position, bytes)
    }

    pub(super) fn replace_from_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(position, length, self.data_size)?;
        check_range(start, length, data.data_size())?;
        if length == 0 {
            return Ok(());
        }

        if let Some(memory_position) = self.memory_run(position, length)? {
            return self.memory.replace_data(memory_position, data, start, length);
        }
        self.remove(position, length)?;
        self.insert_from_data(position, data, start, length)
    }

    pub(super) fn set_byte(&mut self, position: u64, value: u8) -> Result<()> {
        check_position(position, self.data_size)?;
        let (id, start) = self.locate(position)?;
        let segment = self.segments.get(id);

        if let DataSegment::Memory {
            start: memory_start,
            ..
        } = segment
        {
            return self.memory.set_byte(memory_start + position - start, value);
        }

        let memory_end = self.memory.data_size();
        if position == start {
            if let Some(prev) = self.segments.prev(id) {
                if let DataSegment::Memory {
                    start: prev_start,
                    length: prev_length,
                } = self.segments.get(prev)
                {
                    if prev_start + prev_length == memory_end {
                        self.memory.insert_slice(memory_end, &[value])?;
                        self.segments.set(
                            prev,
                            DataSegment::Memory {
                                start: prev_start,
                                length: prev_length + 1,
                            },
                        );
                        if segment.length() == 1 {
                            self.segments.remove(id);
                            self.merge_run(prev, prev);
                        } else {
                            self.segments.set(id, segment.skip(1));
                        }
                        self.pointer = Some(SegmentPointer {
                            id: prev,
                            start: start - prev_length,
                        });
                        return Ok(());
                    }
                }
            }
        }

        self.memory.insert_slice(memory_end, &[value])?;
        let target = if position > start {
            let (left, right) = segment.split(position - start);
            self.segments.set(id, left);
            self.segments.insert_after(id, right)
        } else {
            id
        };
        let target_segment = self.segments.get(target);
        if target_segment.length() > 1 {
            self.segments.insert_after(target, target_segment.skip(1));
        }
        self.segments.set(
            target,
            DataSegment::Memory {
                start: memory_end,
                length: 1,
            },
        );
        self.pointer = Some(SegmentPointer { id, start });
        trace!(position, "byte moved to memory segment");
        Ok(())
    }

    pub(super) fn fill(&mut self, position: u64, length: u64, value: u8) -> Result<()> {
        check_range(position, length, self.data_size)?;
        if length == 0 {
            return Ok(());
        }

        if let Some(memory_position) = self.memory_run(position, length)? {
            return self.memory.fill(memory_position, length, value);
        }
        self.remove(position, length)?;
        self.insert_repeated(position, length, value)
    }

    pub(super) fn set_data_size(&mut self, size: u64) -> Result<()> {
        if size > self.data_size {
            self.insert_repeated(self.data_size, size - self.data_size, 0)
        } else {
            self.remove(size, self.data_size - size)
        }
    }

    pub(super) fn clear(&mut self) {
        self.segments.clear();
        self.memory.clear();
        self.memory_garbage = 0;
        self.data_size = 0;
        self.pointer = None;
    }

    fn shares_source(&self, other: &DocumentCore) -> bool {
        match (&self.source, &other.source) {
            (Some(mine), Some(theirs)) => Arc::ptr_eq(mine, theirs),
            _ => false,
        }
    }

    pub(super) fn validate(&self) {
        let mut total = 0u64;
        let mut previous: Option<(SegmentId, DataSegment)> = None;
        let mut count = 0usize;
        let mut live_memory = 0u64;

        for (id, segment) in self.segments.iter() {
            assert!(segment.length() > 0, "empty segment at position {}", total);
            assert_eq!(
                self.segments.prev(id),
                previous.map(|(id, _)| id),
                "broken back link at position {}",
                total
            );
            match segment {
                DataSegment::Source { .. } => {
                    let source = self
                        .source
                        .as_ref()
                        .unwrap_or_else(|| panic!("source segment at {} without a source", total));
                    assert!(
                        segment.end() <= source.data_size(),
                        "source segment {:?} at {} exceeds source size {}",
                        segment,
                        total,
                        source.data_size()
                    );
                }
                DataSegment::Memory { .. } => {
                    assert!(
                        segment.end() <= self.memory.data_size(),
                        "memory segment {:?} at {} exceeds memory size {}",
                        segment,
                        total,
                        self.memory.data_size()
                    );
                    live_memory += segment.length();
                }
            }
            if let Some((_, prev)) = previous {
                assert!(
                    !prev.can_merge(&segment),
                    "mergeable segments {:?} and {:?} at {}",
                    prev,
                    segment,
                    total
                );
            }

            total += segment.length();
            count += 1;
            previous = Some((id, segment));
        }

        assert_eq!(self.segments.last(), previous.map(|(id, _)| id), "broken tail link");
        assert_eq!(count, self.segments.len(), "segment count mismatch");
        assert_eq!(total, self.data_size, "segment lengths do not add up to data size");
        assert_eq!(
            live_memory + self.memory_garbage,
            self.memory.data_size(),
            "memory store size does not match live bytes plus garbage"
        );
        self.validate_pointer_position();
    }

    pub(super) fn validate_pointer_position(&self) {
        let Some(pointer) = self.pointer else {
            return;
        };
        let mut start = 0u64;
        for (id, segment) in self.segments.iter() {
            if id == pointer.id {
                assert_eq!(
                    start, pointer.start,
                    "cached segment pointer has start {} but segment starts at {}",
                    pointer.start, start
                );
                return;
            }
            start += segment.length();
        }
        panic!("cached segment pointer refers to a removed segment");
    }
}

/// Editable view of a file source plus in-memory changes.
///
/// Unchanged ranges are read straight from the source. Edited bytes live in
/// a memory store owned by the document. Nothing touches the file until
/// [`DeltaDocument::save`].
pub struct DeltaDocument {
    core: Arc<Mutex<DocumentCore>>,
    repository: Arc<RepositoryShared>,
}

impl DeltaDocument {
    pub(super) fn from_core(core: DocumentCore, repository: Arc<RepositoryShared>) -> Self {
        let core = Arc::new(Mutex::new(core));
        repository.register(&core);
        Self { core, repository }
    }

    pub fn file_source(&self) -> Option<Arc<FileDataSource>> {
        self.core.lock().source.clone()
    }

    /// Snapshot of the segment list in document order.
    pub fn segments(&self) -> Vec<DataSegment> {
        self.core.lock().segments.to_vec()
    }

    pub fn segment_count(&self) -> usize {
        self.core.lock().segments.len()
    }

    /// Bytes held by the memory store, including unreferenced ones.
    pub fn memory_size(&self) -> u64 {
        self.core.lock().memory.data_size()
    }

    /// Bytes of the memory store no segment refers to any more. Removals
    /// compact the store once garbage outweighs live bytes.
    pub fn memory_garbage(&self) -> u64 {
        self.core.lock().memory_garbage
    }

    /// Packs the memory store so it holds only bytes the document shows.
    pub fn compact_memory(&mut self) -> Result<()> {
        self.core.lock().compact_memory()
    }

    pub fn copy(&self) -> Result<DeltaDocument> {
        self.copy_range(0, self.data_size())
    }

    /// New document over the same source holding `start..start + length`.
    pub fn copy_range(&self, start: u64, length: u64) -> Result<DeltaDocument> {
        let mut core = self.core.lock();
        let mut copy = DocumentCore::empty(core.source.clone(), self.repository.new_memory_store());
        copy.insert_from_core(0, &mut core, start, length)?;
        drop(core);
        Ok(DeltaDocument::from_core(copy, Arc::clone(&self.repository)))
    }

    /// Inserts a copy of `start..start + length` of this document at
    /// `position`. Source ranges are shared, memory bytes are duplicated.
    pub fn insert_copy_within(&mut self, position: u64, start: u64, length: u64) -> Result<()> {
        self.core.lock().insert_copy_within(position, start, length)
    }

    /// Writes the document back into its source file.
    ///
    /// Other documents over the same source are detached first: their source
    /// ranges are copied into their memory stores so they keep their content.
    /// Afterwards this document is a single source segment over the new file.
    pub fn save(&mut self) -> Result<()> {
        let source = match self.file_source() {
            Some(source) => source,
            None => bail!(DataError::NotSupported("document has no file source")),
        };
        if !source.is_writable() {
            bail!(DataError::NotSupported("data source is read-only"));
        }

        self.repository.detach_dependents(&source, &self.core)?;
        self.core.lock().save()
    }

    /// Checks the segment list invariants.
    ///
    /// # Panics
    ///
    /// Panics describing the first violated invariant.
    pub fn validate(&self) {
        self.core.lock().validate();
    }

    /// # Panics
    ///
    /// Panics if the cached segment pointer is stale.
    pub fn validate_pointer_position(&self) {
        self.core.lock().validate_pointer_position();
    }

    /// Drops all content and memory pages. The document stays usable and
    /// empty.
    pub fn dispose(&mut self) {
        let mut core = self.core.lock();
        core.clear();
        core.source = None;
    }
}

impl fmt::Debug for DeltaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("DeltaDocument")
            .field("source", &core.source.as_ref().map(|source| source.path().to_path_buf()))
            .field("data_size", &core.data_size)
            .field("segments", &core.segments.len())
            .field("memory", &core.memory.data_size())
            .finish()
    }
}

impl BinaryData for DeltaDocument {
    fn data_size(&self) -> u64 {
        self.core.lock().data_size
    }

    fn copy_to_slice(&self, position: u64, target: &mut [u8]) -> Result<()> {
        self.core.lock().read(position, target)
    }

    fn as_delta_document(&self) -> Option<&DeltaDocument> {
        Some(self)
    }
}

impl EditableBinaryData for DeltaDocument {
    fn set_data_size(&mut self, size: u64) -> Result<()> {
        self.core.lock().set_data_size(size)
    }

    fn set_byte(&mut self, position: u64, value: u8) -> Result<()> {
        self.core.lock().set_byte(position, value)
    }

    fn insert_uninitialized(&mut self, position: u64, length: u64) -> Result<()> {
        self.core.lock().insert_repeated(position, length, 0)
    }

    fn insert_zeroed(&mut self, position: u64, length: u64) -> Result<()> {
        self.core.lock().insert_repeated(position, length, 0)
    }

    fn insert_slice(&mut self, position: u64, data: &[u8]) -> Result<()> {
        self.core.lock().insert_bytes(position, data)
    }

    fn insert_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        let mut core = self.core.lock();
        match data.as_delta_document() {
            Some(other) => {
                let mut other_core = other.core.lock();
                core.insert_from_core(position, &mut other_core, start, length)
            }
            None => core.insert_from_data(position, data, start, length),
        }
    }

    fn replace_slice(&mut self, position: u64, data: &[u8]) -> Result<()> {
        self.core.lock().replace_bytes(position, data)
    }

    fn replace_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        let mut core = self.core.lock();
        match data.as_delta_document() {
            Some(other) => {
                check_range(position, length, core.data_size)?;
                let mut other_core = other.core.lock();
                check_range(start, length, other_core.data_size)?;
                core.remove(position, length)?;
                core.insert_from_core(position, &mut other_core, start, length)
            }
            None => core.replace_from_data(position, data, start, length),
        }
    }

    fn fill(&mut self, position: u64, length: u64, value: u8) -> Result<()> {
        self.core.lock().fill(position, length, value)
    }

    fn remove(&mut self, position: u64, length: u64) -> Result<()> {
        self.core.lock().remove(position, length)
    }

    fn clear(&mut self) {
        self.core.lock().clear();
    }
}
