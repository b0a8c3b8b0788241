//! # Swap File Pages
//!
//! Fixed-size pages stored in a single temporary file. Page `p` occupies
//! bytes `p * page_size .. (p + 1) * page_size`.
//!
//! ## Handles vs. Physical Pages
//!
//! Callers hold a [`SwapPageId`], never a file offset. The store maps each id
//! to its current physical page through a slot table, which lets a sweep move
//! pages around without touching the pages' owners:
//!
//! ```text
//! slots (id -> physical)        owners (physical -> id)
//! +----+----------+             +----------+------+
//! | 0  | Some(2)  |             | 0        | 2    |
//! | 1  | None     |  free id    | 1        | None |  free page
//! | 2  | Some(0)  |             | 2        | 0    |
//! +----+----------+             +----------+------+
//! ```
//!
//! ## Free List and Sweep
//!
//! Released physical pages go to a free list with room for
//! [`SWAP_FREE_LIST_CAPACITY`] entries. Allocation pops from it before
//! growing the file. When a release fills the list, a sweep runs:
//!
//! 1. Free pages at the end of the file are dropped
//! 2. The highest live page is copied into the lowest free page
//! 3. Repeat until no free page remains, then truncate the file
//!
//! After a sweep `used_pages() == live_pages()` and the free list is empty.
//!
//! ## Reads Beyond End of File
//!
//! A page that was allocated but never written, or a short last page, reads
//! back as zeros past the physical end of the file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{bail, eyre, Result, WrapErr};
use smallvec::SmallVec;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::config::{SWAP_FILE_PREFIX, SWAP_FREE_LIST_CAPACITY};
use crate::error::{check_range, DataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwapPageId(u32);

impl SwapPageId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// One page relocation performed by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMove {
    pub id: SwapPageId,
    pub from: u64,
    pub to: u64,
}

#[derive(Debug)]
pub struct SwapFilePages {
    file: Option<NamedTempFile>,
    page_size: usize,
    used_pages: u64,
    slots: Vec<Option<u64>>,
    owners: Vec<Option<SwapPageId>>,
    free_ids: Vec<u32>,
    free_pages: SmallVec<[u64; SWAP_FREE_LIST_CAPACITY]>,
}

impl SwapFilePages {
    /// Creates a swap file in the system temp directory.
    pub fn new(page_size: usize) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(SWAP_FILE_PREFIX)
            .tempfile()
            .wrap_err("failed to create swap file")?;
        Self::from_file(file, page_size)
    }

    pub fn in_directory(directory: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        let directory = directory.as_ref();
        let file = tempfile::Builder::new()
            .prefix(SWAP_FILE_PREFIX)
            .tempfile_in(directory)
            .wrap_err_with(|| format!("failed to create swap file in {:?}", directory))?;
        Self::from_file(file, page_size)
    }

    fn from_file(file: NamedTempFile, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            bail!(DataError::InvalidArgument("swap page size must be positive"));
        }
        debug!(path = ?file.path(), page_size, "created swap file");
        Ok(Self {
            file: Some(file),
            page_size,
            used_pages: 0,
            slots: Vec::new(),
            owners: Vec::new(),
            free_ids: Vec::new(),
            free_pages: SmallVec::new(),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Physical pages in the file, including free ones.
    pub fn used_pages(&self) -> u64 {
        self.used_pages
    }

    /// Pages currently owned by a handle.
    pub fn live_pages(&self) -> u64 {
        self.slots.iter().filter(|slot| slot.is_some()).count() as u64
    }

    pub fn free_list_len(&self) -> usize {
        self.free_pages.len()
    }

    pub fn physical_index(&self, id: SwapPageId) -> Option<u64> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|file| file.path().to_path_buf())
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn file_len(&self) -> Result<u64> {
        let file = self.file_ref()?;
        Ok(file.metadata().wrap_err("failed to stat swap file")?.len())
    }

    pub fn allocate_page(&mut self) -> Result<SwapPageId> {
        self.file_ref()?;

        let physical = match self.free_pages.pop() {
            Some(physical) => physical,
            None => {
                let physical = self.used_pages;
                self.used_pages += 1;
                self.owners.push(None);
                physical
            }
        };

        let id = match self.free_ids.pop() {
            Some(index) => SwapPageId(index),
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| eyre!("swap page handle space exhausted"))?;
                self.slots.push(None);
                SwapPageId(index)
            }
        };

        self.slots[id.0 as usize] = Some(physical);
        self.owners[physical as usize] = Some(id);
        trace!(id = id.0, physical, "allocated swap page");
        Ok(id)
    }

    /// Returns the page to the free list. Returns the relocations done if the
    /// release triggered a sweep.
    pub fn release_page(&mut self, id: SwapPageId) -> Result<Vec<PageMove>> {
        let physical = self
            .slots
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(DataError::InvalidArgument("swap page is not allocated"))?;

        self.owners[physical as usize] = None;
        self.free_ids.push(id.0);
        self.free_pages.push(physical);

        if self.free_pages.len() >= SWAP_FREE_LIST_CAPACITY {
            return self.sweep();
        }
        Ok(Vec::new())
    }

    /// Compacts the file so that no free page remains.
    pub fn sweep(&mut self) -> Result<Vec<PageMove>> {
        let mut holes: Vec<u64> = self.free_pages.drain(..).collect();
        holes.sort_unstable();

        let mut moves = Vec::new();
        let mut buffer = vec![0u8; self.page_size];
        let (mut lo, mut hi) = (0, holes.len());

        while lo < hi {
            let last = self.used_pages - 1;
            if holes[hi - 1] == last {
                hi -= 1;
                self.owners.pop();
                self.used_pages -= 1;
                continue;
            }

            let target = holes[lo];
            lo += 1;

            let id = self.owners[last as usize]
                .ok_or_else(|| eyre!("swap page {} is neither free nor owned", last))?;
            self.read_at(last * self.page_size as u64, &mut buffer)?;
            self.write_at(target * self.page_size as u64, &buffer)?;

            self.slots[id.0 as usize] = Some(target);
            self.owners[target as usize] = Some(id);
            self.owners.pop();
            self.used_pages -= 1;
            moves.push(PageMove {
                id,
                from: last,
                to: target,
            });
        }

        let new_len = self.used_pages * self.page_size as u64;
        let file_len = self.file_len()?;
        if file_len > new_len {
            self.file_ref()?
                .set_len(new_len)
                .wrap_err("failed to truncate swap file")?;
        }

        debug!(
            moved = moves.len(),
            used_pages = self.used_pages,
            "swept swap file"
        );
        Ok(moves)
    }

    pub fn read_page(&mut self, id: SwapPageId) -> Result<Vec<u8>> {
        let mut page = vec![0u8; self.page_size];
        self.read_page_at(id, 0, &mut page)?;
        Ok(page)
    }

    pub fn read_page_at(&mut self, id: SwapPageId, offset: usize, target: &mut [u8]) -> Result<()> {
        let physical = self.resolve(id)?;
        check_range(offset as u64, target.len() as u64, self.page_size as u64)?;
        self.read_at(physical * self.page_size as u64 + offset as u64, target)
    }

    pub fn write_page(&mut self, id: SwapPageId, data: &[u8]) -> Result<()> {
        self.write_page_at(id, 0, data)
    }

    pub fn write_page_at(&mut self, id: SwapPageId, offset: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            bail!(DataError::InvalidArgument("swap page write must not be empty"));
        }
        let physical = self.resolve(id)?;
        check_range(offset as u64, data.len() as u64, self.page_size as u64)?;
        self.write_at(physical * self.page_size as u64 + offset as u64, data)
    }

    /// Deletes the swap file. Every later operation fails.
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            file.close()
                .wrap_err_with(|| format!("failed to delete swap file {:?}", path))?;
            debug!(path = ?path, "closed swap file");
        }
        Ok(())
    }

    fn resolve(&self, id: SwapPageId) -> Result<u64> {
        match self.physical_index(id) {
            Some(physical) => Ok(physical),
            None => bail!(DataError::InvalidArgument("swap page is not allocated")),
        }
    }

    fn file_ref(&self) -> Result<&File> {
        match &self.file {
            Some(file) => Ok(file.as_file()),
            None => bail!(DataError::NotSupported("swap file is closed")),
        }
    }

    fn read_at(&self, position: u64, target: &mut [u8]) -> Result<()> {
        let mut file = self.file_ref()?;
        file.seek(SeekFrom::Start(position))
            .wrap_err_with(|| format!("failed to seek swap file to {}", position))?;

        let mut filled = 0;
        while filled < target.len() {
            let read = file
                .read(&mut target[filled..])
                .wrap_err_with(|| format!("failed to read swap file at {}", position))?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        target[filled..].fill(0);
        Ok(())
    }

    fn write_at(&self, position: u64, data: &[u8]) -> Result<()> {
        let mut file = self.file_ref()?;
        file.seek(SeekFrom::Start(position))
            .wrap_err_with(|| format!("failed to seek swap file to {}", position))?;
        file.write_all(data)
            .wrap_err_with(|| format!("failed to write swap file at {}", position))?;
        Ok(())
    }
}
