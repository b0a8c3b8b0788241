//! # Delta Documents
//!
//! A delta document presents an editable byte sequence on top of a file
//! without copying the file. The content is an ordered list of segments:
//!
//! ```text
//! file:     [ 0 ........................................ 256 )
//!
//! document: | Source 0..10 | Memory 0..1 | Source 11..245 | Memory 1..3 |
//!             ^ read from file  ^ edited byte               ^ appended
//! ```
//!
//! - **Source segments** point into the file source
//! - **Memory segments** point into a memory store owned by the document, a
//!   [`PagedData`](crate::paged::PagedData) whose pages may be swapped
//!
//! ## Invariants
//!
//! 1. No segment is empty
//! 2. Segment lengths add up to the document size
//! 3. No two neighbours could be merged: same kind and contiguous backing
//!    ranges are always joined
//! 4. The cached segment pointer, if set, names a live segment and its true
//!    logical start
//!
//! `DeltaDocument::validate` asserts all of them.
//!
//! ## Locality
//!
//! Each document caches the last segment it resolved together with its
//! logical start. Lookups walk from there (or from the head when that is
//! closer), so sequential access costs O(1) per segment boundary.
//!
//! ## Memory Store Growth
//!
//! Edited bytes are appended to the memory store. A memory segment that ends
//! at the end of the store is extended in place by typing at its end, and
//! removing the last range of the store shrinks it again. Unreferenced bytes
//! elsewhere in the store are reclaimed on save.
//!
//! ## Saving
//!
//! See [`save`] for how a document is written back into its own source.

mod document;
mod list;
mod repository;
mod save;
mod segment;
mod source;

pub use document::DeltaDocument;
pub use list::{SegmentId, SegmentList};
pub use repository::{RepositoryBuilder, SegmentsRepository};
pub use segment::DataSegment;
pub use source::{EditMode, FileDataSource};
