//! # Paged Byte Buffer
//!
//! `PagedData` stores a byte sequence as a vector of pages. Every page except
//! the last holds exactly `page_size` bytes; the last holds `1..=page_size`.
//! An empty buffer has no pages.
//!
//! ## Page Arithmetic
//!
//! ```text
//! position p  ->  page p / page_size, offset p % page_size
//! end e       ->  page (e - 1) / page_size, in-page end ((e - 1) % page_size) + 1
//! ```
//!
//! Pages come from an optional [`PageAllocator`]. Without one they are plain
//! heap pages; with one they may be swapped pages that read and write
//! through a swap file.
//!
//! ## Moving Bytes
//!
//! Inserting grows the buffer and shifts `[at, old_size)` right; removing
//! shifts the tail left and shrinks. Both are moves inside the same pages, so
//! the copy order decides whether unread bytes survive:
//!
//! ```text
//! target > source (insert)   backward: start at the tail, walk toward `at`
//! target < source (remove)   forward:  start at `at`, walk toward the tail
//! ```
//!
//! Each step copies the largest chunk that stays within both the current
//! source page and the current target page, so a chunk never straddles a
//! page boundary and needs no scratch buffer when both pages are in memory.
//! [`PagedData::copy_within`] picks the direction the same way `memmove`
//! does and is how a buffer replaces a range with bytes from itself.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use eyre::{bail, Result};

use crate::config::{DEFAULT_PAGE_SIZE, MAX_DATA_SIZE};
use crate::data::{chunk_len, data_equals, read_full, BinaryData, EditableBinaryData};
use crate::error::{check_growth, check_position, check_range, DataError};

use super::page::{DataPage, PageAllocator};

pub struct PagedData {
    pages: Vec<DataPage>,
    page_size: usize,
    allocator: Option<Arc<dyn PageAllocator>>,
}

impl PagedData {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be positive");
        Self {
            pages: Vec::new(),
            page_size,
            allocator: None,
        }
    }

    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn with_allocator(page_size: usize, allocator: Arc<dyn PageAllocator>) -> Self {
        let mut data = Self::with_page_size(page_size);
        data.allocator = Some(allocator);
        data
    }

    pub fn from_slice(data: &[u8]) -> Self {
        let mut paged = Self::new();
        paged.pages = data
            .chunks(paged.page_size)
            .map(|chunk| DataPage::from_vec(chunk.to_vec()))
            .collect();
        paged
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&DataPage> {
        self.pages.get(index)
    }

    pub fn swapped_page_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_swapped()).count()
    }

    pub fn allocator(&self) -> Option<&Arc<dyn PageAllocator>> {
        self.allocator.as_ref()
    }

    /// Independent copy of the whole buffer, allocated the same way.
    pub fn copy(&self) -> Result<PagedData> {
        self.copy_range(0, self.data_size())
    }

    pub fn copy_range(&self, start: u64, length: u64) -> Result<PagedData> {
        check_range(start, length, self.data_size())?;
        let mut copy = self.empty_like();
        copy.insert_uninitialized(0, length)?;
        copy.replace_data(0, self, start, length)?;
        Ok(copy)
    }

    /// Copies `length` bytes from `source` to `target` inside this buffer.
    /// Overlapping ranges are handled like `memmove`.
    pub fn copy_within(&mut self, target: u64, source: u64, length: u64) -> Result<()> {
        let size = self.data_size();
        check_range(source, length, size)?;
        check_range(target, length, size)?;
        if length == 0 || source == target {
            return Ok(());
        }

        if source > target || source + length <= target {
            self.move_forward(source, target, length)
        } else {
            self.move_backward(source, target, length)
        }
    }

    /// Appends everything `reader` yields, up to `maximum` bytes.
    pub fn append_from_reader(
        &mut self,
        reader: &mut dyn Read,
        maximum: Option<u64>,
    ) -> Result<u64> {
        let mut loaded = 0u64;
        loop {
            let wanted = match maximum {
                Some(max) => chunk_len(max - loaded, self.page_size),
                None => self.page_size,
            };
            if wanted == 0 {
                break;
            }

            let mut buffer = vec![0u8; wanted];
            let read = read_full(reader, &mut buffer)?;
            if read == 0 {
                break;
            }
            buffer.truncate(read);

            let size = self.data_size();
            check_growth(size, read as u64)?;
            if size % self.page_size as u64 == 0 {
                let page = self.create_page(buffer)?;
                self.pages.push(page);
            } else {
                self.insert_slice(size, &buffer)?;
            }

            loaded += read as u64;
            if read < wanted {
                break;
            }
        }
        Ok(loaded)
    }

    fn empty_like(&self) -> PagedData {
        PagedData {
            pages: Vec::new(),
            page_size: self.page_size,
            allocator: self.allocator.clone(),
        }
    }

    fn create_page(&self, data: Vec<u8>) -> Result<DataPage> {
        match &self.allocator {
            Some(allocator) => allocator.create_page(data),
            None => Ok(DataPage::from_vec(data)),
        }
    }

    fn locate(&self, position: u64) -> (usize, usize) {
        let page_size = self.page_size as u64;
        ((position / page_size) as usize, (position % page_size) as usize)
    }

    /// Page and in-page end offset of the byte just before `end`.
    fn end_location(&self, end: u64) -> (usize, usize) {
        let (page, offset) = self.locate(end);
        if offset == 0 {
            (page - 1, self.page_size)
        } else {
            (page, offset)
        }
    }

    fn copy_chunk(
        &mut self,
        source: (usize, usize),
        target: (usize, usize),
        length: usize,
        scratch: &mut Vec<u8>,
    ) -> Result<()> {
        let (source_page, source_offset) = source;
        let (target_page, target_offset) = target;

        if source_page == target_page {
            if let Some(slice) = self.pages[source_page].as_mut_slice() {
                slice.copy_within(source_offset..source_offset + length, target_offset);
                return Ok(());
            }
        } else {
            let (from, to) = if source_page < target_page {
                let (left, right) = self.pages.split_at_mut(target_page);
                (&left[source_page], &mut right[0])
            } else {
                let (left, right) = self.pages.split_at_mut(source_page);
                (&right[0], &mut left[target_page])
            };
            if let (Some(from), Some(to)) = (from.as_slice(), to.as_mut_slice()) {
                to[target_offset..target_offset + length]
                    .copy_from_slice(&from[source_offset..source_offset + length]);
                return Ok(());
            }
        }

        scratch.resize(length, 0);
        self.pages[source_page].read(source_offset, &mut scratch[..length])?;
        self.pages[target_page].write(target_offset, &scratch[..length])
    }

    fn move_forward(&mut self, source: u64, target: u64, length: u64) -> Result<()> {
        let mut scratch = Vec::new();
        let mut done = 0u64;
        while done < length {
            let (source_page, source_offset) = self.locate(source + done);
            let (target_page, target_offset) = self.locate(target + done);
            let chunk = (self.page_size - source_offset)
                .min(self.page_size - target_offset)
                .min(chunk_len(length - done, self.page_size));
            self.copy_chunk(
                (source_page, source_offset),
                (target_page, target_offset),
                chunk,
                &mut scratch,
            )?;
            done += chunk as u64;
        }
        Ok(())
    }

    fn move_backward(&mut self, source: u64, target: u64, length: u64) -> Result<()> {
        let mut scratch = Vec::new();
        let mut remaining = length;
        while remaining > 0 {
            let (source_page, source_end) = self.end_location(source + remaining);
            let (target_page, target_end) = self.end_location(target + remaining);
            let chunk = source_end
                .min(target_end)
                .min(chunk_len(remaining, self.page_size));
            self.copy_chunk(
                (source_page, source_end - chunk),
                (target_page, target_end - chunk),
                chunk,
                &mut scratch,
            )?;
            remaining -= chunk as u64;
        }
        Ok(())
    }
}

impl Default for PagedData {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PagedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedData")
            .field("page_size", &self.page_size)
            .field("data_size", &self.data_size())
            .field("pages", &self.pages.len())
            .field("swapped", &self.swapped_page_count())
            .finish()
    }
}

/// Content equality regardless of page size.
///
/// A page that fails to read (a swap file I/O error) makes the buffers
/// compare unequal. Use [`data_equals`] to get the error instead.
impl PartialEq for PagedData {
    fn eq(&self, other: &Self) -> bool {
        data_equals(self, other).unwrap_or(false)
    }
}

impl BinaryData for PagedData {
    fn data_size(&self) -> u64 {
        match self.pages.last() {
            Some(last) => ((self.pages.len() - 1) * self.page_size + last.len()) as u64,
            None => 0,
        }
    }

    fn byte_at(&self, position: u64) -> Result<u8> {
        check_position(position, self.data_size())?;
        let (page, offset) = self.locate(position);
        let mut byte = [0u8; 1];
        self.pages[page].read(offset, &mut byte)?;
        Ok(byte[0])
    }

    fn copy_to_slice(&self, position: u64, target: &mut [u8]) -> Result<()> {
        check_range(position, target.len() as u64, self.data_size())?;
        let mut done = 0usize;
        while done < target.len() {
            let (page, offset) = self.locate(position + done as u64);
            let chunk = (self.pages[page].len() - offset).min(target.len() - done);
            self.pages[page].read(offset, &mut target[done..done + chunk])?;
            done += chunk;
        }
        Ok(())
    }

    fn save_to_writer(&self, writer: &mut dyn Write) -> Result<()> {
        for page in &self.pages {
            match page.as_slice() {
                Some(slice) => writer.write_all(slice)?,
                None => writer.write_all(&page.to_vec()?)?,
            }
        }
        writer.flush()?;
        Ok(())
    }
}

impl EditableBinaryData for PagedData {
    fn set_data_size(&mut self, size: u64) -> Result<()> {
        if size > MAX_DATA_SIZE {
            bail!(DataError::DataOverflow {
                requested: size,
                maximum: MAX_DATA_SIZE,
            });
        }

        let current = self.data_size();
        if size > current {
            let mut remaining = size - current;
            let last_len = self.pages.last().map(DataPage::len);
            if let Some(last_len) = last_len.filter(|len| *len < self.page_size) {
                let grow = chunk_len(remaining, self.page_size - last_len);
                let mut bytes = match self.pages.pop() {
                    Some(page) => page.to_vec()?,
                    None => Vec::new(),
                };
                bytes.resize(last_len + grow, 0);
                let page = self.create_page(bytes)?;
                self.pages.push(page);
                remaining -= grow as u64;
            }
            while remaining > 0 {
                let length = chunk_len(remaining, self.page_size);
                let page = self.create_page(vec![0u8; length])?;
                self.pages.push(page);
                remaining -= length as u64;
            }
        } else if size < current {
            let page_size = self.page_size as u64;
            let keep = size.div_ceil(page_size) as usize;
            self.pages.truncate(keep);

            let tail = (size % page_size) as usize;
            if tail > 0 && self.pages.last().map_or(false, |last| last.len() > tail) {
                let mut bytes = match self.pages.pop() {
                    Some(page) => page.to_vec()?,
                    None => Vec::new(),
                };
                bytes.truncate(tail);
                let page = self.create_page(bytes)?;
                self.pages.push(page);
            }
        }
        Ok(())
    }

    fn set_byte(&mut self, position: u64, value: u8) -> Result<()> {
        check_position(position, self.data_size())?;
        let (page, offset) = self.locate(position);
        self.pages[page].write(offset, &[value])
    }

    fn insert_uninitialized(&mut self, position: u64, length: u64) -> Result<()> {
        let size = self.data_size();
        check_range(position, 0, size)?;
        check_growth(size, length)?;
        if length == 0 {
            return Ok(());
        }

        self.set_data_size(size + length)?;
        if position < size {
            self.move_backward(position, position + length, size - position)?;
        }
        Ok(())
    }

    fn insert_slice(&mut self, position: u64, data: &[u8]) -> Result<()> {
        self.insert_uninitialized(position, data.len() as u64)?;
        self.replace_slice(position, data)
    }

    fn insert_from_reader(
        &mut self,
        position: u64,
        reader: &mut dyn Read,
        maximum: Option<u64>,
    ) -> Result<u64> {
        check_range(position, 0, self.data_size())?;
        if position == self.data_size() {
            return self.append_from_reader(reader, maximum);
        }

        let mut loaded = self.empty_like();
        let length = loaded.append_from_reader(reader, maximum)?;
        self.insert_data(position, &loaded, 0, length)?;
        Ok(length)
    }

    fn replace_slice(&mut self, position: u64, data: &[u8]) -> Result<()> {
        check_range(position, data.len() as u64, self.data_size())?;
        let mut done = 0usize;
        while done < data.len() {
            let (page, offset) = self.locate(position + done as u64);
            let chunk = (self.pages[page].len() - offset).min(data.len() - done);
            self.pages[page].write(offset, &data[done..done + chunk])?;
            done += chunk;
        }
        Ok(())
    }

    fn replace_data(
        &mut self,
        position: u64,
        data: &dyn BinaryData,
        start: u64,
        length: u64,
    ) -> Result<()> {
        check_range(position, length, self.data_size())?;
        check_range(start, length, data.data_size())?;

        let mut scratch = Vec::new();
        let mut done = 0u64;
        while done < length {
            let (page, offset) = self.locate(position + done);
            let chunk = (self.pages[page].len() - offset).min(chunk_len(length - done, usize::MAX));
            match self.pages[page].as_mut_slice() {
                Some(slice) => data.copy_to_slice(start + done, &mut slice[offset..offset + chunk])?,
                None => {
                    scratch.resize(chunk, 0);
                    data.copy_to_slice(start + done, &mut scratch[..chunk])?;
                    self.pages[page].write(offset, &scratch[..chunk])?;
                }
            }
            done += chunk as u64;
        }
        Ok(())
    }

    fn fill(&mut self, position: u64, length: u64, value: u8) -> Result<()> {
        check_range(position, length, self.data_size())?;
        let mut done = 0u64;
        while done < length {
            let (page, offset) = self.locate(position + done);
            let chunk = (self.pages[page].len() - offset).min(chunk_len(length - done, usize::MAX));
            self.pages[page].fill(offset, chunk, value)?;
            done += chunk as u64;
        }
        Ok(())
    }

    fn remove(&mut self, position: u64, length: u64) -> Result<()> {
        let size = self.data_size();
        check_range(position, length, size)?;
        if length == 0 {
            return Ok(());
        }

        let tail = size - position - length;
        if tail > 0 {
            self.move_forward(position + length, position, tail)?;
        }
        self.set_data_size(size - length)
    }

    fn clear(&mut self) {
        self.pages.clear();
    }

    fn load_from_reader(&mut self, reader: &mut dyn Read) -> Result<()> {
        self.clear();
        self.append_from_reader(reader, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn contents(data: &PagedData) -> Vec<u8> {
        let mut out = vec![0u8; data.data_size() as usize];
        data.copy_to_slice(0, &mut out).unwrap();
        out
    }

    #[test]
    fn new_buffer_is_empty() {
        let data = PagedData::new();
        assert_eq!(data.data_size(), 0);
        assert_eq!(data.page_count(), 0);
        assert!(data.is_empty());
    }

    #[test]
    #[should_panic(expected = "page size must be positive")]
    fn zero_page_size_panics() {
        let _ = PagedData::with_page_size(0);
    }

    #[test]
    fn set_data_size_grows_and_shrinks_pages() {
        let mut data = PagedData::with_page_size(8);
        data.set_data_size(20).unwrap();
        assert_eq!(data.page_count(), 3);
        assert_eq!(data.page(2).unwrap().len(), 4);

        data.set_data_size(22).unwrap();
        assert_eq!(data.page_count(), 3);
        assert_eq!(data.page(2).unwrap().len(), 6);

        data.set_data_size(8).unwrap();
        assert_eq!(data.page_count(), 1);
        assert_eq!(data.data_size(), 8);

        data.set_data_size(3).unwrap();
        assert_eq!(data.page(0).unwrap().len(), 3);
    }

    #[test]
    fn grow_fills_with_zeros() {
        let mut data = PagedData::with_page_size(4);
        data.insert_slice(0, &[1, 2, 3]).unwrap();
        data.set_data_size(9).unwrap();
        assert_eq!(contents(&data), vec![1, 2, 3, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn insert_in_middle_shifts_across_pages() {
        let mut data = PagedData::with_page_size(4);
        data.insert_slice(0, &sample(10)).unwrap();
        data.insert_slice(3, &[200, 201, 202, 203, 204]).unwrap();

        let mut expected = sample(10);
        expected.splice(3..3, [200, 201, 202, 203, 204]);
        assert_eq!(contents(&data), expected);
    }

    #[test]
    fn insert_past_end_is_out_of_bounds() {
        let mut data = PagedData::from_slice(&[1, 2, 3]);
        let err = data.insert_slice(4, &[9]).unwrap_err();
        assert!(crate::error::is_out_of_bounds(&err));
        assert_eq!(contents(&data), vec![1, 2, 3]);
    }

    #[test]
    fn remove_range_across_pages() {
        let mut data = PagedData::with_page_size(4);
        data.insert_slice(0, &sample(17)).unwrap();
        data.remove(2, 9).unwrap();

        let mut expected = sample(17);
        expected.drain(2..11);
        assert_eq!(contents(&data), expected);
        assert_eq!(data.page_count(), 2);
    }

    #[test]
    fn remove_past_end_is_out_of_bounds() {
        let mut data = PagedData::from_slice(&[1, 2, 3]);
        assert!(data.remove(2, 2).is_err());
        assert!(data.remove(3, 0).is_ok());
    }

    #[test]
    fn replace_slice_spans_pages() {
        let mut data = PagedData::with_page_size(4);
        data.insert_slice(0, &[0u8; 12]).unwrap();
        data.replace_slice(2, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(contents(&data), vec![0, 0, 1, 2, 3, 4, 5, 6, 0, 0, 0, 0]);
    }

    #[test]
    fn copy_within_overlapping_forward_and_backward() {
        let original = sample(20);

        let mut data = PagedData::with_page_size(3);
        data.insert_slice(0, &original).unwrap();
        data.copy_within(2, 5, 10).unwrap();
        let mut expected = original.clone();
        expected.copy_within(5..15, 2);
        assert_eq!(contents(&data), expected);

        let mut data = PagedData::with_page_size(3);
        data.insert_slice(0, &original).unwrap();
        data.copy_within(7, 1, 12).unwrap();
        let mut expected = original.clone();
        expected.copy_within(1..13, 7);
        assert_eq!(contents(&data), expected);
    }

    #[test]
    fn fill_range() {
        let mut data = PagedData::with_page_size(4);
        data.insert_zeroed(0, 10).unwrap();
        data.fill(3, 5, 0xEE).unwrap();
        assert_eq!(contents(&data), vec![0, 0, 0, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0, 0]);
    }

    #[test]
    fn byte_access() {
        let mut data = PagedData::with_page_size(4);
        data.insert_zeroed(0, 9).unwrap();
        data.set_byte(8, 42).unwrap();
        assert_eq!(data.byte_at(8).unwrap(), 42);
        assert!(data.byte_at(9).is_err());
        assert!(data.set_byte(9, 1).is_err());
    }

    #[test]
    fn copy_range_is_independent() {
        let mut data = PagedData::from_slice(&sample(100));
        let copy = data.copy_range(10, 20).unwrap();
        data.fill(0, 100, 0).unwrap();
        assert_eq!(contents(&copy), sample(100)[10..30].to_vec());
    }

    #[test]
    fn equality_compares_content_not_layout() {
        let mut left = PagedData::with_page_size(3);
        left.insert_slice(0, &sample(10)).unwrap();
        let right = PagedData::from_slice(&sample(10));
        assert_eq!(left, right);

        left.set_byte(0, 99).unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn load_and_insert_from_reader() {
        let mut data = PagedData::with_page_size(4);
        data.load_from_reader(&mut &sample(10)[..]).unwrap();
        assert_eq!(contents(&data), sample(10));

        let inserted = data
            .insert_from_reader(2, &mut &[7u8, 7, 7, 7, 7][..], Some(3))
            .unwrap();
        assert_eq!(inserted, 3);
        let mut expected = sample(10);
        expected.splice(2..2, [7, 7, 7]);
        assert_eq!(contents(&data), expected);
    }

    #[test]
    fn append_from_reader_fills_partial_page() {
        let mut data = PagedData::with_page_size(4);
        data.insert_slice(0, &[1, 2]).unwrap();
        data.insert_from_reader(2, &mut &[3u8, 4, 5, 6, 7][..], None)
            .unwrap();
        assert_eq!(contents(&data), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(data.page(0).unwrap().len(), 4);
    }

    #[test]
    fn save_to_writer_outputs_content() {
        let data = PagedData::from_slice(&sample(9000));
        let mut out = Vec::new();
        data.save_to_writer(&mut out).unwrap();
        assert_eq!(out, sample(9000));
    }
}
