//! # Segments Repository
//!
//! Owns the file sources, the page allocation policy and the swap store
//! shared by a family of delta documents.
//!
//! ## Builder
//!
//! | Option         | Default      | Description                                  |
//! |----------------|--------------|----------------------------------------------|
//! | page_size      | 4096         | Page size of every memory store              |
//! | memory_budget  | -1           | Heap bytes for pages, -1 never swaps         |
//! | swap_directory | system temp  | Where the swap file is created               |
//!
//! ```ignore
//! let repository = SegmentsRepository::builder()
//!     .memory_budget(64 * 1024 * 1024)
//!     .swap_directory("/var/tmp")
//!     .build()?;
//!
//! let source = repository.open_file_source("image.bin", EditMode::ReadWrite)?;
//! let mut document = repository.create_document(&source)?;
//! document.insert_slice(0, b"header")?;
//! repository.save_document(&mut document)?;
//! ```
//!
//! ## Document Registry
//!
//! The repository keeps a weak reference to every document it created. When
//! one document is saved, every other live document over the same source is
//! detached first so that rewriting the file cannot change its content.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use eyre::{bail, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{DEFAULT_PAGE_SIZE, UNLIMITED_MEMORY};
use crate::error::DataError;
use crate::memory::{BudgetStats, MemoryBudget};
use crate::paged::{PageAllocator, PagedData};
use crate::swap::{SharedSwapPages, SwapFilePages, SwapPageAllocator};

use super::document::{DeltaDocument, DocumentCore};
use super::source::{EditMode, FileDataSource};

pub(crate) struct RepositoryShared {
    page_size: usize,
    allocator: Option<Arc<dyn PageAllocator>>,
    budget: Arc<MemoryBudget>,
    swap: Option<SharedSwapPages>,
    sources: Mutex<Vec<Arc<FileDataSource>>>,
    documents: Mutex<Vec<Weak<Mutex<DocumentCore>>>>,
}

impl RepositoryShared {
    pub(super) fn new_memory_store(&self) -> PagedData {
        match &self.allocator {
            Some(allocator) => PagedData::with_allocator(self.page_size, Arc::clone(allocator)),
            None => PagedData::with_page_size(self.page_size),
        }
    }

    pub(super) fn register(&self, core: &Arc<Mutex<DocumentCore>>) {
        let mut documents = self.documents.lock();
        documents.retain(|document| document.strong_count() > 0);
        documents.push(Arc::downgrade(core));
    }

    fn live_documents(&self) -> Vec<Arc<Mutex<DocumentCore>>> {
        self.documents
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Detaches every live document over `source` except `except`. Returns
    /// how many documents were detached.
    pub(super) fn detach_dependents(
        &self,
        source: &Arc<FileDataSource>,
        except: &Arc<Mutex<DocumentCore>>,
    ) -> Result<usize> {
        let mut detached = 0;
        for core in self.live_documents() {
            if Arc::ptr_eq(&core, except) {
                continue;
            }
            let mut core = core.lock();
            let shares = core
                .source
                .as_ref()
                .map_or(false, |other| Arc::ptr_eq(other, source));
            if shares {
                core.detach_source()?;
                detached += 1;
            }
        }
        Ok(detached)
    }
}

/// Factory and owner of delta documents, their sources and swap storage.
pub struct SegmentsRepository {
    shared: Arc<RepositoryShared>,
}

impl SegmentsRepository {
    /// Heap-only repository with default page size.
    pub fn new() -> Self {
        Self::from_parts(DEFAULT_PAGE_SIZE, None, Arc::new(MemoryBudget::unbounded()), None)
    }

    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::new()
    }

    /// Repository whose memory stores create pages through `allocator`.
    pub fn with_allocator(page_size: usize, allocator: Arc<dyn PageAllocator>) -> Result<Self> {
        if page_size == 0 {
            bail!(DataError::InvalidArgument("page size must be positive"));
        }
        Ok(Self::from_parts(
            page_size,
            Some(allocator),
            Arc::new(MemoryBudget::unbounded()),
            None,
        ))
    }

    fn from_parts(
        page_size: usize,
        allocator: Option<Arc<dyn PageAllocator>>,
        budget: Arc<MemoryBudget>,
        swap: Option<SharedSwapPages>,
    ) -> Self {
        Self {
            shared: Arc::new(RepositoryShared {
                page_size,
                allocator,
                budget,
                swap,
                sources: Mutex::new(Vec::new()),
                documents: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    pub fn open_file_source(
        &self,
        path: impl AsRef<Path>,
        edit_mode: EditMode,
    ) -> Result<Arc<FileDataSource>> {
        let source = Arc::new(FileDataSource::open(path, edit_mode)?);
        self.add_data_source(Arc::clone(&source));
        Ok(source)
    }

    pub fn add_data_source(&self, source: Arc<FileDataSource>) {
        let mut sources = self.shared.sources.lock();
        if !sources.iter().any(|known| Arc::ptr_eq(known, &source)) {
            sources.push(source);
        }
    }

    pub fn sources(&self) -> Vec<Arc<FileDataSource>> {
        self.shared.sources.lock().clone()
    }

    /// Detaches the documents still reading from `source`, then closes it.
    pub fn close_file_source(&self, source: &Arc<FileDataSource>) -> Result<()> {
        let mut detached = 0;
        for core in self.shared.live_documents() {
            let mut core = core.lock();
            if core
                .source
                .as_ref()
                .map_or(false, |other| Arc::ptr_eq(other, source))
            {
                core.detach_source()?;
                core.source = None;
                detached += 1;
            }
        }

        source.close();
        self.shared
            .sources
            .lock()
            .retain(|known| !Arc::ptr_eq(known, source));
        debug!(path = ?source.path(), detached, "closed file source");
        Ok(())
    }

    /// Document showing the current content of `source`.
    pub fn create_document(&self, source: &Arc<FileDataSource>) -> Result<DeltaDocument> {
        if source.is_closed() {
            bail!(DataError::NotSupported("data source is closed"));
        }
        self.add_data_source(Arc::clone(source));
        let core = DocumentCore::new(Some(Arc::clone(source)), self.shared.new_memory_store());
        Ok(DeltaDocument::from_core(core, Arc::clone(&self.shared)))
    }

    /// Document without a file source. Its content lives in memory only.
    pub fn create_empty_document(&self) -> DeltaDocument {
        let core = DocumentCore::empty(None, self.shared.new_memory_store());
        DeltaDocument::from_core(core, Arc::clone(&self.shared))
    }

    pub fn save_document(&self, document: &mut DeltaDocument) -> Result<()> {
        document.save()
    }

    pub fn swap_pages(&self) -> Option<SharedSwapPages> {
        self.shared.swap.clone()
    }

    pub fn memory_stats(&self) -> BudgetStats {
        self.shared.budget.stats()
    }

    /// Closes every source and deletes the swap file. Documents that are
    /// still alive fail on their next read of source or swapped data.
    pub fn close(self) -> Result<()> {
        for source in self.shared.sources.lock().drain(..) {
            source.close();
        }
        if let Some(swap) = &self.shared.swap {
            swap.lock().close()?;
        }
        debug!("closed segments repository");
        Ok(())
    }
}

impl Default for SegmentsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SegmentsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentsRepository")
            .field("page_size", &self.shared.page_size)
            .field("sources", &self.shared.sources.lock().len())
            .field("budget", &self.shared.budget.stats())
            .field("swap", &self.shared.swap.is_some())
            .finish()
    }
}

/// Builder for [`SegmentsRepository`].
#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    page_size: Option<usize>,
    memory_budget: Option<i64>,
    swap_directory: Option<PathBuf>,
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Heap bytes available to pages. `-1` disables swapping, `0` swaps every
    /// page.
    pub fn memory_budget(mut self, bytes: i64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    pub fn swap_directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.swap_directory = Some(directory.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<SegmentsRepository> {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!(DataError::InvalidArgument("page size must be positive"));
        }

        let budget = Arc::new(MemoryBudget::from_setting(
            self.memory_budget.unwrap_or(UNLIMITED_MEMORY),
        )?);
        if !budget.is_bounded() {
            return Ok(SegmentsRepository::from_parts(page_size, None, budget, None));
        }

        let store = match &self.swap_directory {
            Some(directory) => SwapFilePages::in_directory(directory, page_size)?,
            None => SwapFilePages::new(page_size)?,
        };
        let swap: SharedSwapPages = Arc::new(Mutex::new(store));
        let allocator: Arc<dyn PageAllocator> = Arc::new(SwapPageAllocator::new(
            Arc::clone(&budget),
            Arc::clone(&swap),
        ));

        debug!(page_size, limit = ?budget.limit(), "created swapping repository");
        Ok(SegmentsRepository::from_parts(
            page_size,
            Some(allocator),
            budget,
            Some(swap),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_never_swaps() {
        let repository = SegmentsRepository::builder().build().unwrap();
        assert!(repository.swap_pages().is_none());
        assert_eq!(repository.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(repository.memory_stats().limit, None);
    }

    #[test]
    fn bounded_budget_creates_swap_store() {
        let dir = tempfile::tempdir().unwrap();
        let repository = SegmentsRepository::builder()
            .page_size(512)
            .memory_budget(0)
            .swap_directory(dir.path())
            .build()
            .unwrap();

        let swap = repository.swap_pages().unwrap();
        let path = swap.lock().path().unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(swap.lock().page_size(), 512);

        repository.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SegmentsRepository::builder().page_size(0).build().is_err());
        assert!(SegmentsRepository::builder()
            .memory_budget(-5)
            .build()
            .is_err());
    }

    #[test]
    fn custom_allocator_backs_memory_stores() {
        use crate::data::{BinaryData, EditableBinaryData};
        use crate::paged::HeapPageAllocator;

        let repository = SegmentsRepository::with_allocator(16, Arc::new(HeapPageAllocator)).unwrap();
        let mut document = repository.create_empty_document();
        document.insert_slice(0, &[7; 40]).unwrap();
        assert_eq!(document.data_size(), 40);
        assert_eq!(repository.page_size(), 16);
        assert!(repository.swap_pages().is_none());

        assert!(SegmentsRepository::with_allocator(0, Arc::new(HeapPageAllocator)).is_err());
    }

    #[test]
    fn registry_drops_dead_documents() {
        let repository = SegmentsRepository::new();
        for _ in 0..10 {
            let _document = repository.create_empty_document();
        }
        let _kept = repository.create_empty_document();
        assert_eq!(repository.shared.live_documents().len(), 1);
        assert!(repository.shared.documents.lock().len() <= 2);
    }
}
