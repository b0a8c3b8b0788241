//! # Memory Budget Implementation
//!
//! A single counter of bytes held by in-memory pages, checked against an
//! optional limit.
//!
//! ## Design Principles
//!
//! 1. **Hard Limits**: `allocate` refuses anything that would exceed the limit
//! 2. **Soft Callers**: page allocation uses `try_allocate` and falls back to
//!    the swap store instead of failing
//! 3. **Thread Safety**: the counters are atomics updated with CAS loops
//!
//! ## Accounting
//!
//! Only page payloads are tracked. Segment lists, page vectors and staging
//! buffers are small compared to the data and are not counted. The peak
//! value is kept for diagnostics and never decreases.

use std::sync::atomic::{AtomicU64, Ordering};

use eyre::{bail, Result};

use crate::config::UNLIMITED_MEMORY;
use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetStats {
    pub limit: Option<u64>,
    pub used: u64,
    pub peak: u64,
}

impl BudgetStats {
    pub fn available(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    pub fn utilization_percent(&self) -> f64 {
        match self.limit {
            Some(0) | None => 0.0,
            Some(limit) => (self.used as f64 / limit as f64) * 100.0,
        }
    }
}

impl std::fmt::Display for BudgetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "memory:{}/{},peak:{}", self.used, limit, self.peak),
            None => write!(f, "memory:{}/unlimited,peak:{}", self.used, self.peak),
        }
    }
}

#[derive(Debug)]
pub struct MemoryError {
    pub requested: u64,
    pub available: u64,
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "memory budget exceeded: requested {} bytes but only {} available",
            self.requested, self.available
        )
    }
}

impl std::error::Error for MemoryError {}

#[derive(Debug)]
pub struct MemoryBudget {
    limit: Option<u64>,
    used: AtomicU64,
    peak: AtomicU64,
}

impl MemoryBudget {
    pub fn unbounded() -> Self {
        Self::with_limit(None)
    }

    pub fn with_limit(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
            peak: AtomicU64::new(0),
        }
    }

    /// Interprets the repository-level setting: `-1` is unlimited, any other
    /// negative value is rejected.
    pub fn from_setting(limit: i64) -> Result<Self> {
        if limit == UNLIMITED_MEMORY {
            return Ok(Self::unbounded());
        }
        if limit < 0 {
            bail!(DataError::InvalidArgument(
                "memory budget must be -1 (unlimited) or non-negative"
            ));
        }
        Ok(Self::with_limit(Some(limit as u64)))
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_bounded(&self) -> bool {
        self.limit.is_some()
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn available(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.used()))
    }

    pub fn can_allocate(&self, bytes: u64) -> bool {
        match self.available() {
            Some(available) => available >= bytes,
            None => true,
        }
    }

    pub fn allocate(&self, bytes: u64) -> Result<()> {
        if let Err(available) = self.reserve(bytes) {
            bail!(MemoryError {
                requested: bytes,
                available,
            });
        }
        Ok(())
    }

    /// Like [`allocate`](Self::allocate) but reports a refusal as `false`
    /// without building an error.
    pub fn try_allocate(&self, bytes: u64) -> bool {
        self.reserve(bytes).is_ok()
    }

    /// Adds `bytes` to the used counter if the limit allows it. On refusal
    /// returns the bytes that were still available.
    fn reserve(&self, bytes: u64) -> std::result::Result<(), u64> {
        if bytes == 0 {
            return Ok(());
        }

        loop {
            let current = self.used.load(Ordering::Acquire);
            let new_used = current.saturating_add(bytes);

            if let Some(limit) = self.limit {
                if new_used > limit {
                    return Err(limit.saturating_sub(current));
                }
            }

            match self.used.compare_exchange_weak(
                current,
                new_used,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(new_used, Ordering::AcqRel);
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
    }

    pub fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }

        loop {
            let current = self.used.load(Ordering::Acquire);
            let new_value = current.saturating_sub(bytes);

            match self.used.compare_exchange_weak(
                current,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    pub fn stats(&self) -> BudgetStats {
        BudgetStats {
            limit: self.limit,
            used: self.used(),
            peak: self.peak.load(Ordering::Acquire),
        }
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::unbounded()
    }
}
