//! # bindelta - Editable Views of Large Binary Files
//!
//! bindelta is the storage engine behind hex-editor style tools. Files of any
//! size can be edited byte by byte without rewriting the file on each edit:
//!
//! - **Paged buffers**: growable byte arrays built from fixed-size pages
//! - **Delta documents**: copy-on-write segment lists over a file source
//! - **Swap pages**: page overflow into a temp file past a memory budget
//!
//! ## Quick Start
//!
//! ```ignore
//! use bindelta::{EditMode, EditableBinaryData, BinaryData, SegmentsRepository};
//!
//! let repository = SegmentsRepository::builder()
//!     .memory_budget(16 * 1024 * 1024)
//!     .build()?;
//!
//! let source = repository.open_file_source("firmware.bin", EditMode::ReadWrite)?;
//! let mut document = repository.create_document(&source)?;
//!
//! document.set_byte(0x10, 0xff)?;
//! document.insert_slice(0, b"MAGIC")?;
//! document.remove(0x400, 0x100)?;
//!
//! document.save()?;
//! repository.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   SegmentsRepository (sources, save) │
//! ├──────────────────────────────────────┤
//! │   DeltaDocument (segment list)       │
//! ├───────────────────┬──────────────────┤
//! │  FileDataSource   │  PagedData       │
//! │  (original file)  │  (edited bytes)  │
//! │                   ├──────────────────┤
//! │                   │ DataPage: memory │
//! │                   │ or swapped page  │
//! ├───────────────────┴──────────────────┤
//! │   SwapFilePages (temp page file)     │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Byte Range Contract
//!
//! Every container implements [`BinaryData`], editable ones also implement
//! [`EditableBinaryData`]. Positions and lengths are `u64`. Ranges outside the
//! data fail with [`DataError::OutOfBounds`], which callers can recover from
//! an `eyre::Report` with `downcast_ref`.
//!
//! ## Module Overview
//!
//! - [`data`]: byte range traits and chunked comparison
//! - [`paged`]: pages, page allocators and the paged buffer
//! - [`memory`]: memory budget accounting
//! - [`swap`]: swap page file and swapped pages
//! - [`delta`]: segments, delta documents, repository and save
//! - [`stream`]: `Read`/`Write`/`Seek` views over byte ranges
//! - [`config`]: constants
//! - [`error`]: error taxonomy

pub mod config;
pub mod data;
pub mod delta;
pub mod error;
pub mod memory;
pub mod paged;
pub mod stream;
pub mod swap;

pub use data::{data_equals, BinaryData, EditableBinaryData};
pub use delta::{
    DataSegment, DeltaDocument, EditMode, FileDataSource, RepositoryBuilder, SegmentsRepository,
};
pub use error::{is_out_of_bounds, DataError};
pub use memory::{BudgetStats, MemoryBudget};
pub use paged::{DataPage, PageAllocator, PagedData};
pub use stream::{BinaryDataReader, BinaryDataWriter};
pub use swap::{SwapFilePages, SwapPageAllocator};
