//! # bindelta Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> PagedData page geometry (page = pos / size, offset = pos % size)
//!       │
//!       ├─> SwapFilePages page geometry (file offset = index * size)
//!       │
//!       └─> SAVE_COPY_BUFFER_SIZE (must be a multiple, so save chunks
//!             line up with memory pages)
//!
//! SWAP_FREE_LIST_CAPACITY (20)
//!       │
//!       └─> Releasing a page while the free list is full triggers a sweep
//!             that moves up to this many pages and truncates the swap file
//!
//! MAX_DATA_SIZE (i64::MAX)
//!       │
//!       └─> Any insert that would grow data past this fails with DataOverflow
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `DEFAULT_PAGE_SIZE > 0`
//! 2. `SAVE_COPY_BUFFER_SIZE % DEFAULT_PAGE_SIZE == 0`
//! 3. `SWAP_FREE_LIST_CAPACITY > 0` (a sweep must always have a slot to fill)

// ============================================================================
// PAGE LAYOUT CONSTANTS
// ============================================================================

/// Default size of a single data page in bytes.
/// Only the last page of a buffer may be shorter.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Largest logical size a buffer or document may reach.
/// Positions are `u64` but the on-disk offsets are signed in most OS APIs.
pub const MAX_DATA_SIZE: u64 = i64::MAX as u64;

const _: () = assert!(DEFAULT_PAGE_SIZE > 0, "DEFAULT_PAGE_SIZE must be positive");

// ============================================================================
// SWAP CONFIGURATION
// ============================================================================

/// Number of released swap pages kept for reuse before a sweep compacts the
/// swap file.
pub const SWAP_FREE_LIST_CAPACITY: usize = 20;

/// File name prefix used for swap files created in the temp directory.
pub const SWAP_FILE_PREFIX: &str = "swap";

/// Memory budget value meaning "never swap".
pub const UNLIMITED_MEMORY: i64 = -1;

const _: () = assert!(
    SWAP_FREE_LIST_CAPACITY > 0,
    "SWAP_FREE_LIST_CAPACITY must allow at least one released page"
);

// ============================================================================
// SAVE CONFIGURATION
// ============================================================================

/// Size of the scratch buffer used when relocating or spooling file ranges
/// during save (64KB).
pub const SAVE_COPY_BUFFER_SIZE: usize = 64 * 1024;

const _: () = assert!(
    SAVE_COPY_BUFFER_SIZE % DEFAULT_PAGE_SIZE == 0,
    "SAVE_COPY_BUFFER_SIZE must be a multiple of DEFAULT_PAGE_SIZE"
);
