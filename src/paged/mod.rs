//! # Paged Buffer
//!
//! [`PagedData`] stores a growable byte sequence as a list of fixed-size pages
//! so that inserting or removing in the middle of a large buffer touches page
//! contents instead of reallocating one huge array.
//!
//! ## Layout
//!
//! ```text
//! position p  ->  page p / page_size, offset p % page_size
//!
//! +-----------+-----------+-----------+------+
//! | page 0    | page 1    | page 2    | p3   |   only the last page
//! | page_size | page_size | page_size | <=ps |   may be shorter
//! +-----------+-----------+-----------+------+
//! ```
//!
//! ## Insert and Remove
//!
//! Inserting `n` bytes grows the buffer by `n` and shifts the tail towards
//! the end, copying from the last byte backwards so no byte is overwritten
//! before it has moved. Removing shifts the tail forward and shrinks.
//! [`PagedData::copy_within`] chooses the direction from the overlap.
//!
//! ## Page Placement
//!
//! New pages are created through an optional [`PageAllocator`]. Without one
//! every page is a plain heap page. The swap allocator charges pages to a
//! memory budget and spills to a swap file when the budget is exhausted.
//! Copies between two heap pages use slice copies. Anything involving a
//! swapped page goes through a staging buffer.

mod page;
mod paged_data;

pub use page::{DataPage, HeapPageAllocator, MemoryPage, PageAllocator};
pub use paged_data::PagedData;
