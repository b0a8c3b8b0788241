//! # bindelta Configuration Module
//!
//! This module centralizes all configuration constants for bindelta. Constants
//! are grouped by their functional area and interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The paged buffer, the swap store and the save routine all reason about the
//! same page geometry. Keeping `DEFAULT_PAGE_SIZE`, the swap free-list
//! capacity and the save copy buffer together makes it obvious when one of
//! them is changed without the others.
//!
//! Runtime configuration (page size, memory budget, swap directory) is passed
//! through [`crate::delta::RepositoryBuilder`]; the values here are only the
//! defaults and hard limits.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
