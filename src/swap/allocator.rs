//! Budget-driven page placement.
//!
//! [`SwapPageAllocator`] charges each new page to a [`MemoryBudget`]. If the
//! charge is refused the bytes are written to the swap file and the page is
//! represented by a [`SwappedPage`] handle instead.

use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::memory::MemoryBudget;
use crate::paged::{DataPage, MemoryPage, PageAllocator};

use super::file_pages::{SwapFilePages, SwapPageId};

pub type SharedSwapPages = Arc<Mutex<SwapFilePages>>;

/// Page content held in the swap file. Dropping the handle frees the slot.
#[derive(Debug)]
pub struct SwappedPage {
    id: SwapPageId,
    len: usize,
    store: SharedSwapPages,
}

impl SwappedPage {
    /// Allocates a swap slot and writes `data` into it.
    pub fn store(store: &SharedSwapPages, data: &[u8]) -> Result<Self> {
        let id = store.lock().allocate_page()?;
        let page = Self {
            id,
            len: data.len(),
            store: Arc::clone(store),
        };
        if !data.is_empty() {
            page.write(0, data)?;
        }
        Ok(page)
    }

    pub fn id(&self) -> SwapPageId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read(&self, offset: usize, target: &mut [u8]) -> Result<()> {
        self.store.lock().read_page_at(self.id, offset, target)
    }

    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.store.lock().write_page_at(self.id, offset, data)
    }
}

impl Drop for SwappedPage {
    fn drop(&mut self) {
        let mut store = self.store.lock();
        if store.is_closed() {
            return;
        }
        if let Err(err) = store.release_page(self.id) {
            warn!(id = self.id.index(), error = %err, "failed to release swap page");
        }
    }
}

#[derive(Debug)]
pub struct SwapPageAllocator {
    budget: Arc<MemoryBudget>,
    store: SharedSwapPages,
}

impl SwapPageAllocator {
    pub fn new(budget: Arc<MemoryBudget>, store: SharedSwapPages) -> Self {
        Self { budget, store }
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    pub fn store(&self) -> &SharedSwapPages {
        &self.store
    }
}

impl PageAllocator for SwapPageAllocator {
    fn create_page(&self, data: Vec<u8>) -> Result<DataPage> {
        if self.budget.try_allocate(data.len() as u64) {
            return Ok(DataPage::Memory(MemoryPage::charged(
                data,
                Arc::clone(&self.budget),
            )));
        }

        let page = SwappedPage::store(&self.store, &data)?;
        trace!(id = page.id().index(), len = data.len(), "page moved to swap");
        Ok(DataPage::Swapped(page))
    }
}
