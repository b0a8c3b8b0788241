//! # Stream Adapters
//!
//! `std::io` views over byte ranges:
//!
//! - [`BinaryDataReader`]: `Read + Seek` with mark/reset, skip and finish
//! - [`BinaryDataWriter`]: `Write + Seek` that overwrites in place
//!
//! Both can be limited to a sub-range. Errors from the underlying data are
//! converted to `io::Error`. Range violations map to
//! `io::ErrorKind::InvalidInput`, everything else keeps its report as the
//! inner error.

mod reader;
mod writer;

use std::io::{self, SeekFrom};

pub use reader::BinaryDataReader;
pub use writer::BinaryDataWriter;

use crate::error::is_out_of_bounds;

pub(crate) fn to_io_error(err: eyre::Report) -> io::Error {
    let kind = if is_out_of_bounds(&err) {
        io::ErrorKind::InvalidInput
    } else if let Some(io_err) = err.downcast_ref::<io::Error>() {
        io_err.kind()
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, Box::<dyn std::error::Error + Send + Sync>::from(err))
}

/// Resolves a seek request against a range of `length` bytes.
pub(crate) fn seek_target(pos: SeekFrom, current: u64, length: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::End(delta) => length.checked_add_signed(delta),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
    };
    match target {
        Some(target) if target <= length => Ok(target),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek position outside of stream range",
        )),
    }
}
