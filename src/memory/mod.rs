//! # Memory Budget Management
//!
//! Tracks how many bytes of page payload live on the heap and decides when
//! new pages must go to the swap store instead.
//!
//! ## Architecture
//!
//! ```text
//! +----------------------------------------------------------+
//! |                 Repository Memory Budget                  |
//! |      (-1 = unlimited, 0 = swap everything, N bytes)      |
//! +----------------------------------------------------------+
//! |                                                          |
//! |  +----------------------+   fits?   +------------------+ |
//! |  | SwapPageAllocator    | --------> | heap page        | |
//! |  | create_page(bytes)   |    no     | (charged here)   | |
//! |  |                      | --------> | swap file page   | |
//! |  +----------------------+           +------------------+ |
//! |                                                          |
//! +----------------------------------------------------------+
//! ```
//!
//! ## Enforcement Model
//!
//! Page allocation never fails because of the budget. A page that does not
//! fit is written to the swap file. The hard-limit `allocate` is still
//! available for callers that prefer an error.
//!
//! ## Release
//!
//! Every heap page charged to a budget holds an `Arc<MemoryBudget>` and gives
//! its bytes back when dropped, so the counter follows the pages without any
//! explicit bookkeeping in the buffers.
//!
//! ## Configuration
//!
//! ```rust,ignore
//! let repository = SegmentsRepository::builder()
//!     .memory_budget(16 * 1024 * 1024)
//!     .build()?;
//!
//! println!("{}", repository.memory_stats());
//! ```

mod budget;

pub use budget::{BudgetStats, MemoryBudget, MemoryError};
