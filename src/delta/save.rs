//! Writing a document back into its own source file.
//!
//! ## Placement
//!
//! Every segment has a target range in the new file: segment `i` lands at
//! the sum of the lengths before it. A source segment whose start equals its
//! target is already in place and is not touched.
//!
//! ## Hazards
//!
//! A relocated source segment is hazardous when its source range overlaps
//! the target range of another relocated source segment, because that
//! relocation could destroy bytes before they are read. Hazardous segments
//! are spooled to an anonymous temp file before anything is written. Memory
//! and spooled segments are written last, after every in-file read, so their
//! targets never make a segment hazardous.
//!
//! ## Phases
//!
//! ```text
//! 1. spool hazardous source segments        file unchanged
//! 2. relocate the other moved source ranges  direction-aware copy in place
//! 3. write memory and spooled segments       no remaining reader depends on them
//! 4. truncate or extend to the new size, sync
//! ```
//!
//! After phase 1 no write can reach a range that still has to be read by a
//! later phase: non-hazardous sources only overlap their own target, which
//! the direction-aware copy handles.
//!
//! On success the document becomes one source segment over the whole file and
//! its memory store is cleared. On an I/O error the file content is
//! unspecified and the document keeps its segments.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use eyre::{bail, Result, WrapErr};
use tracing::{debug, trace};

use crate::config::SAVE_COPY_BUFFER_SIZE;
use crate::data::{chunk_len, BinaryData, EditableBinaryData};
use crate::error::DataError;

use super::document::DocumentCore;
use super::segment::DataSegment;
use super::source::FileDataSource;

#[derive(Debug, Clone, Copy)]
struct Placement {
    target: u64,
    segment: DataSegment,
}

impl Placement {
    fn in_place(&self) -> bool {
        matches!(self.segment, DataSegment::Source { start, .. } if start == self.target)
    }
}

/// Target ranges of relocated source segments, sorted by start.
struct WriteRanges(Vec<(u64, u64, usize)>);

impl WriteRanges {
    fn new(placements: &[Placement]) -> Self {
        Self(
            placements
                .iter()
                .enumerate()
                .filter(|(_, placement)| placement.segment.is_source() && !placement.in_place())
                .map(|(index, placement)| {
                    (
                        placement.target,
                        placement.target + placement.segment.length(),
                        index,
                    )
                })
                .collect(),
        )
    }

    /// True if `start..end` overlaps a write of any placement but `owner`.
    fn overlaps_other(&self, start: u64, end: u64, owner: usize) -> bool {
        let first = self.0.partition_point(|&(_, write_end, _)| write_end <= start);
        self.0[first..]
            .iter()
            .take_while(|&&(write_start, _, _)| write_start < end)
            .any(|&(_, _, index)| index != owner)
    }
}

impl DocumentCore {
    pub(super) fn save(&mut self) -> Result<()> {
        let source = match &self.source {
            Some(source) => std::sync::Arc::clone(source),
            None => bail!(DataError::NotSupported("document has no file source")),
        };
        if !source.is_writable() {
            bail!(DataError::NotSupported("data source is read-only"));
        }

        let mut placements = Vec::with_capacity(self.segments.len());
        let mut target = 0u64;
        for (_, segment) in self.segments.iter() {
            placements.push(Placement { target, segment });
            target += segment.length();
        }
        let total = target;
        let writes = WriteRanges::new(&placements);

        let mut buffer = vec![0u8; SAVE_COPY_BUFFER_SIZE];
        let mut spool: Option<File> = None;
        let mut spool_len = 0u64;
        let mut spooled: Vec<Option<u64>> = vec![None; placements.len()];

        for (index, placement) in placements.iter().enumerate() {
            if let DataSegment::Source { start, length } = placement.segment {
                if start != placement.target && writes.overlaps_other(start, start + length, index) {
                    let file = match spool.as_mut() {
                        Some(file) => file,
                        None => spool.insert(
                            tempfile::tempfile().wrap_err("failed to create save spool file")?,
                        ),
                    };
                    spool_range(&source, start, length, file, &mut buffer)?;
                    spooled[index] = Some(spool_len);
                    spool_len += length;
                }
            }
        }

        let mut relocated = 0usize;
        for (index, placement) in placements.iter().enumerate() {
            if let DataSegment::Source { start, length } = placement.segment {
                if start != placement.target && spooled[index].is_none() {
                    trace!(from = start, to = placement.target, length, "relocating source range");
                    source.copy_within(start, placement.target, length)?;
                    relocated += 1;
                }
            }
        }

        let mut memory_bytes = 0u64;
        for (index, placement) in placements.iter().enumerate() {
            match (placement.segment, spooled[index]) {
                (DataSegment::Memory { start, length }, _) => {
                    trace!(to = placement.target, length, "writing memory segment");
                    let mut done = 0u64;
                    while done < length {
                        let count = chunk_len(length - done, buffer.len());
                        self.memory.copy_to_slice(start + done, &mut buffer[..count])?;
                        source.write_at(placement.target + done, &buffer[..count])?;
                        done += count as u64;
                    }
                    memory_bytes += length;
                }
                (DataSegment::Source { length, .. }, Some(offset)) => {
                    if let Some(file) = spool.as_mut() {
                        unspool_range(file, offset, length, &source, placement.target, &mut buffer)?;
                    }
                }
                (DataSegment::Source { .. }, None) => {}
            }
        }

        source.set_len(total)?;
        source.sync()?;

        debug!(
            path = ?source.path(),
            size = total,
            segments = placements.len(),
            relocated,
            spooled = spool_len,
            memory_bytes,
            "saved document"
        );

        self.segments.clear();
        if total > 0 {
            self.segments.push_back(DataSegment::Source {
                start: 0,
                length: total,
            });
        }
        self.memory.clear();
        self.memory_garbage = 0;
        self.data_size = total;
        self.pointer = None;
        Ok(())
    }

    /// Replaces every source segment with a memory copy of its bytes, so the
    /// document no longer reads from the source file.
    pub(super) fn detach_source(&mut self) -> Result<()> {
        let source = match &self.source {
            Some(source) => std::sync::Arc::clone(source),
            None => return Ok(()),
        };

        let mut buffer = vec![0u8; SAVE_COPY_BUFFER_SIZE];
        let mut detached = 0u64;
        let mut cursor = self.segments.first();
        while let Some(id) = cursor {
            if let DataSegment::Source { start, length } = self.segments.get(id) {
                let memory_start = self.memory.data_size();
                self.memory.set_data_size(memory_start + length)?;
                let mut done = 0u64;
                while done < length {
                    let count = chunk_len(length - done, buffer.len());
                    source.read_at(start + done, &mut buffer[..count])?;
                    self.memory
                        .replace_slice(memory_start + done, &buffer[..count])?;
                    done += count as u64;
                }
                self.segments.set(
                    id,
                    DataSegment::Memory {
                        start: memory_start,
                        length,
                    },
                );
                detached += length;
            }
            cursor = self.segments.next(id);
        }

        if let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) {
            self.merge_run(first, last);
        }
        self.pointer = None;
        debug!(path = ?source.path(), bytes = detached, "detached document from source");
        Ok(())
    }
}

fn spool_range(
    source: &FileDataSource,
    start: u64,
    length: u64,
    spool: &mut File,
    buffer: &mut [u8],
) -> Result<()> {
    spool
        .seek(SeekFrom::End(0))
        .wrap_err("failed to seek save spool file")?;
    let mut done = 0u64;
    while done < length {
        let count = chunk_len(length - done, buffer.len());
        source.read_at(start + done, &mut buffer[..count])?;
        spool
            .write_all(&buffer[..count])
            .wrap_err("failed to write save spool file")?;
        done += count as u64;
    }
    Ok(())
}

fn unspool_range(
    spool: &mut File,
    offset: u64,
    length: u64,
    source: &FileDataSource,
    target: u64,
    buffer: &mut [u8],
) -> Result<()> {
    spool
        .seek(SeekFrom::Start(offset))
        .wrap_err("failed to seek save spool file")?;
    let mut done = 0u64;
    while done < length {
        let count = chunk_len(length - done, buffer.len());
        spool
            .read_exact(&mut buffer[..count])
            .wrap_err("failed to read save spool file")?;
        source.write_at(target + done, &buffer[..count])?;
        done += count as u64;
    }
    Ok(())
}
