use std::io::{self, Read, Seek, SeekFrom};

use eyre::Result;

use crate::data::{chunk_len, BinaryData};
use crate::error::check_range;

use super::{seek_target, to_io_error};

/// Sequential reader over a range of any [`BinaryData`].
///
/// Positions reported by `Seek` are relative to the start of the range.
#[derive(Debug)]
pub struct BinaryDataReader<'a, D: BinaryData + ?Sized> {
    data: &'a D,
    start: u64,
    length: u64,
    position: u64,
    mark: u64,
}

impl<'a, D: BinaryData + ?Sized> BinaryDataReader<'a, D> {
    pub fn new(data: &'a D) -> Self {
        Self {
            length: data.data_size(),
            data,
            start: 0,
            position: 0,
            mark: 0,
        }
    }

    pub fn with_range(data: &'a D, start: u64, length: u64) -> Result<Self> {
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

    pub fn reset(&mut self) {
        self.position = self.mark;
    }

    /// Advances by up to `count` bytes and returns how many were skipped.
    pub fn skip(&mut self, count: u64) -> u64 {
        let skipped = count.min(self.available());
        self.position += skipped;
        skipped
    }

    /// Jumps to the end of the range and returns how many bytes were left.
    pub fn finish(&mut self) -> u64 {
        let remaining = self.available();
        self.position = self.length;
        remaining
    }

    pub fn into_inner(self) -> &'a D {
        self.data
    }
}

impl<D: BinaryData + ?Sized> Read for BinaryDataReader<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = chunk_len(self.available(), buf.len());
        if count == 0 {
            return Ok(0);
        }
        self.data
            .copy_to_slice(self.start + self.position, &mut buf[..count])
            .map_err(to_io_error)?;
        self.position += count as u64;
        Ok(count)
    }
}

impl<D: BinaryData + ?Sized> Seek for BinaryDataReader<'_, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = seek_target(pos, self.position, self.length)?;
        Ok(self.position)
    }
}
