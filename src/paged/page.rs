//! Storage for a single page of a [`PagedData`](super::PagedData).
//!
//! A page lives either on the heap or in a swap file. Both kinds release
//! what they hold when dropped: heap pages give their bytes back to the
//! memory budget that charged them, swapped pages return their slot to the
//! swap store.

use std::fmt;
use std::sync::Arc;

use eyre::Result;

use crate::error::check_range;
use crate::memory::MemoryBudget;
use crate::swap::SwappedPage;

/// Creates the storage for new pages. Installed on a paged buffer to decide
/// where its pages live.
pub trait PageAllocator: Send + Sync + fmt::Debug {
    fn create_page(&self, data: Vec<u8>) -> Result<DataPage>;
}

/// Keeps every page on the heap without accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPageAllocator;

impl PageAllocator for HeapPageAllocator {
    fn create_page(&self, data: Vec<u8>) -> Result<DataPage> {
        Ok(DataPage::from_vec(data))
    }
}

#[derive(Debug)]
pub enum DataPage {
    Memory(MemoryPage),
    Swapped(SwappedPage),
}

impl DataPage {
    pub fn from_vec(data: Vec<u8>) -> Self {
        DataPage::Memory(MemoryPage::new(data))
    }

    pub fn len(&self) -> usize {
        match self {
            DataPage::Memory(page) => page.data.len(),
            DataPage::Swapped(page) => page.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_swapped(&self) -> bool {
        matches!(self, DataPage::Swapped(_))
    }

    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            DataPage::Memory(page) => Some(&page.data),
            DataPage::Swapped(_) => None,
        }
    }

    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            DataPage::Memory(page) => Some(&mut page.data),
            DataPage::Swapped(_) => None,
        }
    }

    pub fn read(&self, offset: usize, target: &mut [u8]) -> Result<()> {
        check_range(offset as u64, target.len() as u64, self.len() as u64)?;
        if target.is_empty() {
            return Ok(());
        }
        match self {
            DataPage::Memory(page) => {
                target.copy_from_slice(&page.data[offset..offset + target.len()]);
                Ok(())
            }
            DataPage::Swapped(page) => page.read(offset, target),
        }
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(offset as u64, data.len() as u64, self.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        match self {
            DataPage::Memory(page) => {
                page.data[offset..offset + data.len()].copy_from_slice(data);
                Ok(())
            }
            DataPage::Swapped(page) => page.write(offset, data),
        }
    }

    pub fn fill(&mut self, offset: usize, length: usize, value: u8) -> Result<()> {
        if let DataPage::Memory(page) = self {
            check_range(offset as u64, length as u64, page.data.len() as u64)?;
            page.data[offset..offset + length].fill(value);
            return Ok(());
        }
        self.write(offset, &vec![value; length])
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut data = vec![0u8; self.len()];
        self.read(0, &mut data)?;
        Ok(data)
    }
}

pub struct MemoryPage {
    data: Box<[u8]>,
    budget: Option<Arc<MemoryBudget>>,
}

impl MemoryPage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: data.into_boxed_slice(),
            budget: None,
        }
    }

    /// Wraps bytes already charged to `budget`. The charge is released on drop.
    pub fn charged(data: Vec<u8>, budget: Arc<MemoryBudget>) -> Self {
        Self {
            data: data.into_boxed_slice(),
            budget: Some(budget),
        }
    }
}

impl fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPage")
            .field("len", &self.data.len())
            .field("charged", &self.budget.is_some())
            .finish()
    }
}

impl Drop for MemoryPage {
    fn drop(&mut self) {
        if let Some(budget) = &self.budget {
            budget.release(self.data.len() as u64);
        }
    }
}
