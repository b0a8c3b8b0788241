//! # Byte-Range Contract
//!
//! Every container in bindelta, from a plain byte slice up to a delta
//! document backed by a multi-gigabyte file, exposes the same two traits:
//!
//! - [`BinaryData`]: read access to a contiguous logical byte range
//! - [`EditableBinaryData`]: insert, remove, replace, fill and resize
//!
//! Consumers (hex grids, undo commands, on-demand loaders) only ever talk to
//! these traits, so a document can be swapped for a paged buffer without the
//! caller noticing.
//!
//! ## Positions
//!
//! Positions and lengths are `u64`. A range `position..position + length` is
//! valid when it ends at or before `data_size()`. Inserting at exactly
//! `data_size()` appends. Every violation fails with
//! [`DataError::OutOfBounds`](crate::error::DataError) before anything is
//! modified.
//!
//! ## Self-Referencing Edits
//!
//! The borrow checker rules out `data.replace_data(0, &data, ..)`. Containers
//! that support moving bytes within themselves expose it explicitly
//! (`PagedData::copy_within`, `DeltaDocument::insert_copy_within`).
//!
//! ## Equality
//!
//! [`data_equals`] compares any two implementations in page-sized chunks so
//! neither side has to be materialized in full.

use std::io::{Read, Write};

use eyre::Result;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::delta::DeltaDocument;
use crate::error::{check_position, check_range};
use crate::paged::PagedData;
use crate::stream::{BinaryDataReader, BinaryDataWriter};

/// Read access to a logical byte range.
pub trait BinaryData {
    fn data_size(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.data_size() == 0
    }

    fn byte_at(&self, position: u64) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.copy_to_slice(position, &mut byte)?;
        Ok(byte[0])
    }

    /// Copies `target.len()` bytes starting at `position` into `target`.
    fn copy_to_slice(&self, position: u64, target: &mut [u8]) -> Result<()>;

    /// Materializes `start..start + length` into an independent paged buffer.
    fn to_paged_data(&self, start: u64, length: u64) -> Result<PagedData>
    where
        Self: Sized,
    {
        check_range(start, length, self.data_size())?;
        let mut copy = PagedData::new();
        copy.insert_uninitialized(0, length)?;
        copy.replace_data(0, self, start, length)?;
        Ok(copy)
    }

    /// Writes the whole content to `writer` in page-sized chunks.
    fn save_to_writer(&self, writer: &mut dyn Write) -> Result<()> {
        let size = self.data_size();
        let mut buffer = vec![0u8; chunk_len(size, DEFAULT_PAGE_SIZE)];
        let mut position = 0u64;
        while position < size {
            let chunk = chunk_len(size - position, buffer.len());
            self.copy_to_slice(position, &mut buffer[..chunk])?;
            writer.write_all(&buffer[..chunk])?;
            position += chunk as u64;
        }
        writer.flush()?;
        Ok(())
    }

    fn reader(&self) -> BinaryDataReader<'_, Self>
    where
        Self: Sized,
    {
        BinaryDataReader::new(self)
    }

    fn range_reader(&self, start: u64, length: u64) -> Result<BinaryDataReader<'_, Self>>
    where
        Self: Sized,
    {
        BinaryDataReader::with_range(self, start, length)
    }

    /// Lets a delta document recognize another delta document and share its
    /// source ranges instead of copying bytes.
    #[doc(hidden)]
    fn as_delta_document(&self) -> Option<&DeltaDocument> {
        None
    }
}

/// Mutating extension of [`BinaryData`].
pub trait EditableBinaryData: BinaryData {
    /// Grows with zero bytes or truncates at the end.
    fn set_data_size(&mut self, size: u64) -> Result<()>;

    fn set_byte(&mut self, position: u64, value: u8) -> Result<()>;

    /// Opens a gap of `length` bytes at `position`. The gap content is
    /// unspecified until written.
    fn insert_uninitialized(&mut self, position: u64, length: u64) -> Result<()>;

    fn insert_zeroed(&mut self, position: u64, length: u64) -> Result<()> {
        self.insert_uninitialized(position, length)?;
        self.fill(position, length, 0)
    }

    fn insert_slice(&mut self, position: u64, data: &[u8]) -> Result<()>;

    fn insert_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(start, length, data.data_size())?;
        self.insert_uninitialized(position, length)?;
        self.replace_data(position, data, start, length)
    }

    /// Inserts up to `maximum` bytes (everything when `None`) read from
    /// `reader`, returning how many were inserted.
    fn insert_from_reader(
        &mut self,
        position: u64,
        reader: &mut dyn Read,
        maximum: Option<u64>,
    ) -> Result<u64> {
        if position > self.data_size() {
            check_range(position, 0, self.data_size())?;
        }

        let mut buffer = vec![0u8; DEFAULT_PAGE_SIZE];
        let mut loaded = 0u64;
        loop {
            let wanted = match maximum {
                Some(max) => chunk_len(max - loaded, buffer.len()),
                None => buffer.len(),
            };
            if wanted == 0 {
                break;
            }
            let read = read_full(reader, &mut buffer[..wanted])?;
            if read == 0 {
                break;
            }
            self.insert_slice(position + loaded, &buffer[..read])?;
            loaded += read as u64;
            if read < wanted {
                break;
            }
        }
        Ok(loaded)
    }

    fn replace_slice(&mut self, position: u64, data: &[u8]) -> Result<()>;

    fn replace_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(position, length, self.data_size())?;
        check_range(start, length, data.data_size())?;

        let mut buffer = vec![0u8; chunk_len(length, DEFAULT_PAGE_SIZE)];
        let mut done = 0u64;
        while done < length {
            let chunk = chunk_len(length - done, buffer.len());
            data.copy_to_slice(start + done, &mut buffer[..chunk])?;
            self.replace_slice(position + done, &buffer[..chunk])?;
            done += chunk as u64;
        }
        Ok(())
    }

    fn fill(&mut self, position: u64, length: u64, value: u8) -> Result<()>;

    fn remove(&mut self, position: u64, length: u64) -> Result<()>;

    fn clear(&mut self);

    /// Replaces the whole content with everything `reader` yields.
    fn load_from_reader(&mut self, reader: &mut dyn Read) -> Result<()> {
        self.clear();
        self.insert_from_reader(0, reader, None)?;
        Ok(())
    }

    fn writer(&mut self) -> BinaryDataWriter<'_, Self>
    where
        Self: Sized,
    {
        BinaryDataWriter::new(self)
    }

    fn range_writer(&mut self, start: u64, length: u64) -> Result<BinaryDataWriter<'_, Self>>
    where
        Self: Sized,
    {
        BinaryDataWriter::with_range(self, start, length)
    }
}

impl BinaryData for [u8] {
    fn data_size(&self) -> u64 {
        self.len() as u64
    }

    fn copy_to_slice(&self, position: u64, target: &mut [u8]) -> Result<()> {
        check_range(position, target.len() as u64, self.len() as u64)?;
        let start = position as usize;
        target.copy_from_slice(&self[start..start + target.len()]);
        Ok(())
    }

    fn byte_at(&self, position: u64) -> Result<u8> {
        check_position(position, self.len() as u64)?;
        Ok(self[position as usize])
    }
}

impl BinaryData for Vec<u8> {
    fn data_size(&self) -> u64 {
        self.len() as u64
    }

    fn copy_to_slice(&self, position: u64, target: &mut [u8]) -> Result<()> {
        self.as_slice().copy_to_slice(position, target)
    }
}

/// Byte-for-byte comparison of two byte ranges, buffered one page at a time.
pub fn data_equals(left: &dyn BinaryData, right: &dyn BinaryData) -> Result<bool> {
    let size = left.data_size();
    if right.data_size() != size {
        return Ok(false);
    }

    let buffer_len = chunk_len(size, DEFAULT_PAGE_SIZE);
    let mut left_buf = vec![0u8; buffer_len];
    let mut right_buf = vec![0u8; buffer_len];
    let mut position = 0u64;
    while position < size {
        let chunk = chunk_len(size - position, buffer_len);
        left.copy_to_slice(position, &mut left_buf[..chunk])?;
        right.copy_to_slice(position, &mut right_buf[..chunk])?;
        if left_buf[..chunk] != right_buf[..chunk] {
            return Ok(false);
        }
        position += chunk as u64;
    }
    Ok(true)
}

/// `min(remaining, limit)` as a `usize`.
pub(crate) fn chunk_len(remaining: u64, limit: usize) -> usize {
    remaining.min(limit as u64) as usize
}

/// Reads until `buffer` is full or the reader is exhausted.
pub(crate) fn read_full(reader: &mut dyn Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
