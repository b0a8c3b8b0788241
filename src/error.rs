//! # Error Taxonomy
//!
//! All fallible operations in bindelta return `eyre::Result`. Conditions that
//! are caller contract violations are raised as a typed [`DataError`] so that
//! callers can tell them apart from I/O failures:
//!
//! ```ignore
//! match document.remove(10, 4) {
//!     Err(err) if matches!(err.downcast_ref::<DataError>(), Some(DataError::OutOfBounds { .. })) => {
//!         // caller bug, nothing was changed
//!     }
//!     Err(err) => return Err(err),
//!     Ok(()) => {}
//! }
//! ```
//!
//! I/O failures keep the underlying `std::io::Error` inside the report, with
//! the file path or page index attached as context, so
//! `err.downcast_ref::<std::io::Error>()` still works.
//!
//! Nothing in this crate retries. A failed call either left the data untouched
//! (all bounds are checked before any page is modified) or, for I/O errors in
//! the middle of a save, left the target file in an unspecified state.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Position or range lies outside the valid data.
    OutOfBounds { position: u64, length: u64, size: u64 },
    /// Malformed argument that is not a range problem.
    InvalidArgument(&'static str),
    /// Requested size exceeds [`crate::config::MAX_DATA_SIZE`].
    DataOverflow { requested: u64, maximum: u64 },
    /// Operation is not available on this data or source.
    NotSupported(&'static str),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::OutOfBounds {
                position,
                length,
                size,
            } => write!(
                f,
                "range {}..{} is outside of available data (size {})",
                position,
                position.saturating_add(*length),
                size
            ),
            DataError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            DataError::DataOverflow { requested, maximum } => write!(
                f,
                "maximum data size overflow: {} bytes requested, {} allowed",
                requested, maximum
            ),
            DataError::NotSupported(msg) => write!(f, "operation not supported: {}", msg),
        }
    }
}

impl std::error::Error for DataError {}

/// Fails with `OutOfBounds` unless `position..position + length` lies within `size`.
pub(crate) fn check_range(position: u64, length: u64, size: u64) -> eyre::Result<()> {
    match position.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(DataError::OutOfBounds {
            position,
            length,
            size,
        }
        .into()),
    }
}

/// Fails with `OutOfBounds` unless `position` addresses an existing byte.
pub(crate) fn check_position(position: u64, size: u64) -> eyre::Result<()> {
    if position < size {
        Ok(())
    } else {
        Err(DataError::OutOfBounds {
            position,
            length: 1,
            size,
        }
        .into())
    }
}

/// Fails with `DataOverflow` if growing `size` by `length` passes the limit.
pub(crate) fn check_growth(size: u64, length: u64) -> eyre::Result<()> {
    let maximum = crate::config::MAX_DATA_SIZE;
    if length > maximum - size.min(maximum) {
        return Err(DataError::DataOverflow {
            requested: size.saturating_add(length),
            maximum,
        }
        .into());
    }
    Ok(())
}

/// Returns true if the report carries a `DataError::OutOfBounds`.
pub fn is_out_of_bounds(err: &eyre::Report) -> bool {
    matches!(
        err.downcast_ref::<DataError>(),
        Some(DataError::OutOfBounds { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_range_accepts_range_ending_at_size() {
        assert!(check_range(10, 6, 16).is_ok());
        assert!(check_range(16, 0, 16).is_ok());
    }

    #[test]
    fn check_range_rejects_range_past_size() {
        let err = check_range(10, 7, 16).unwrap_err();
        assert!(is_out_of_bounds(&err));
    }

    #[test]
    fn check_range_rejects_overflowing_end() {
        let err = check_range(u64::MAX, 2, 16).unwrap_err();
        assert!(is_out_of_bounds(&err));
    }

    #[test]
    fn check_growth_reports_overflow() {
        let err = check_growth(crate::config::MAX_DATA_SIZE - 1, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::DataOverflow { .. })
        ));
        assert!(check_growth(0, crate::config::MAX_DATA_SIZE).is_ok());
    }

    #[test]
    fn display_mentions_range() {
        let err = DataError::OutOfBounds {
            position: 4,
            length: 2,
            size: 5,
        };
        assert_eq!(
            err.to_string(),
            "range 4..6 is outside of available data (size 5)"
        );
    }
}
