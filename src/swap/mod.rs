//! # Swap Page Store
//!
//! Lets the memory store of a document grow beyond the memory budget by
//! keeping pages in a temporary file.
//!
//! ## Components
//!
//! - [`SwapFilePages`]: page-granular storage in one temp file with a bounded
//!   free list and sweep-based compaction
//! - [`SwappedPage`]: RAII handle for one page in the store
//! - [`SwapPageAllocator`]: a [`PageAllocator`](crate::paged::PageAllocator)
//!   that keeps pages on the heap while the budget allows and swaps the rest
//!
//! ## Ownership
//!
//! The store is shared as `Arc<Mutex<SwapFilePages>>` between the repository
//! that created it and every swapped page. The repository deletes the file
//! when closed. Pages dropped after that release nothing.
//!
//! ## Thread Safety
//!
//! All access goes through a `parking_lot::Mutex`. Each page read or write is
//! a seek plus one I/O call under the lock.

mod allocator;
mod file_pages;

pub use allocator::{SharedSwapPages, SwapPageAllocator, SwappedPage};
pub use file_pages::{PageMove, SwapFilePages, SwapPageId};
