use std::io::{self, Seek, SeekFrom, Write};

use eyre::Result;

use crate::data::{chunk_len, EditableBinaryData};
use crate::error::check_range;

use super::{seek_target, to_io_error};

/// Overwriting writer over a range of any [`EditableBinaryData`].
///
/// Writes replace existing bytes and never grow the data. Once the range is
/// exhausted `write` returns `Ok(0)`, which `write_all` reports as
/// `WriteZero`.
#[derive(Debug)]
pub struct BinaryDataWriter<'a, D: EditableBinaryData + ?Sized> {
    data: &'a mut D,
    start: u64,
    length: u64,
    position: u64,
    mark: u64,
}

impl<'a, D: EditableBinaryData + ?Sized> BinaryDataWriter<'a, D> {
    pub fn new(data: &'a mut D) -> Self {
        Self {
            length: data.data_size(),
            data,
            start: 0,
            position: 0,
            mark: 0,
        }
    }

    pub fn with_range(data: &'a mut D, start: u64, length: u64) -> Result<Self> {
        check_range(start, length, data.data_size())?;
        Ok(Self {
            data,
            start,
            length,
            position: 0,
            mark: 0,
        })
    }

    pub fn stream_size(&self) -> u64 {
        self.length
    }

    pub fn processed_size(&self) -> u64 {
        self.position
    }

    pub fn available(&self) -> u64 {
        self.length - self.position
    }

    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// Returns to the last mark so the bytes after it can be rewritten.
    pub fn reset(&mut self) {
        self.position = self.mark;
    }

    /// Advances by up to `count` bytes without writing them.
    pub fn skip(&mut self, count: u64) -> u64 {
        let skipped = count.min(self.available());
        self.position += skipped;
        skipped
    }

    pub fn finish(&mut self) -> u64 {
        let remaining = self.available();
        self.position = self.length;
        remaining
    }
}

impl<D: EditableBinaryData + ?Sized> Write for BinaryDataWriter<'_, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = chunk_len(self.available(), buf.len());
        if count == 0 {
            return Ok(0);
        }
        self.data
            .replace_slice(self.start + self.position, &buf[..count])
            .map_err(to_io_error)?;
        self.position += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: EditableBinaryData + ?Sized> Seek for BinaryDataWriter<'_, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = seek_target(pos, self.position, self.length)?;
        Ok(self.position)
    }
}
