//! File-backed data source.
//!
//! A [`FileDataSource`] is the original content of a document. Reads and
//! writes are positioned and serialized through one mutex, so a source can be
//! shared by several documents.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{bail, Result, WrapErr};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::SAVE_COPY_BUFFER_SIZE;
use crate::data::chunk_len;
use crate::error::{check_range, DataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug)]
struct SourceState {
    file: Option<File>,
    size: u64,
}

#[derive(Debug)]
pub struct FileDataSource {
    path: PathBuf,
    edit_mode: EditMode,
    state: Mutex<SourceState>,
}

impl FileDataSource {
    pub fn open(path: impl AsRef<Path>, edit_mode: EditMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(edit_mode == EditMode::ReadWrite)
            .open(&path)
            .wrap_err_with(|| format!("failed to open data source {:?}", path))?;
        let size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat data source {:?}", path))?
            .len();

        debug!(path = ?path, size, mode = ?edit_mode, "opened data source");
        Ok(Self {
            path,
            edit_mode,
            state: Mutex::new(SourceState {
                file: Some(file),
                size,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn is_writable(&self) -> bool {
        self.edit_mode == EditMode::ReadWrite
    }

    pub fn data_size(&self) -> u64 {
        self.state.lock().size
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().file.is_none()
    }

    pub fn read_at(&self, position: u64, target: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock();
        check_range(position, target.len() as u64, state.size)?;
        let file = open_file(&mut state)?;
        file.seek(SeekFrom::Start(position))
            .and_then(|_| file.read_exact(target))
            .wrap_err_with(|| {
                format!(
                    "failed to read {} bytes at {} from {:?}",
                    target.len(),
                    position,
                    self.path
                )
            })
    }

    pub fn write_at(&self, position: u64, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let mut state = self.state.lock();
        write_locked(&mut state, &self.path, position, data)
    }

    /// Moves `length` bytes from `source` to `target`, choosing the copy
    /// direction so overlapping ranges are preserved.
    pub fn copy_within(&self, source: u64, target: u64, length: u64) -> Result<()> {
        self.ensure_writable()?;
        if length == 0 || source == target {
            return Ok(());
        }

        let mut state = self.state.lock();
        check_range(source, length, state.size)?;

        let mut buffer = vec![0u8; chunk_len(length, SAVE_COPY_BUFFER_SIZE)];
        let backward = target > source && target < source + length;
        let mut done = 0u64;
        while done < length {
            let chunk = chunk_len(length - done, buffer.len());
            let offset = if backward {
                length - done - chunk as u64
            } else {
                done
            };

            let file = open_file(&mut state)?;
            file.seek(SeekFrom::Start(source + offset))
                .and_then(|_| file.read_exact(&mut buffer[..chunk]))
                .wrap_err_with(|| format!("failed to read {:?} at {}", self.path, source + offset))?;
            write_locked(&mut state, &self.path, target + offset, &buffer[..chunk])?;
            done += chunk as u64;
        }
        Ok(())
    }

    pub fn set_len(&self, size: u64) -> Result<()> {
        self.ensure_writable()?;
        let mut state = self.state.lock();
        let file = open_file(&mut state)?;
        file.set_len(size)
            .wrap_err_with(|| format!("failed to resize {:?} to {}", self.path, size))?;
        state.size = size;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        let file = open_file(&mut state)?;
        file.sync_all()
            .wrap_err_with(|| format!("failed to sync {:?}", self.path))
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.file.take().is_some() {
            debug!(path = ?self.path, "closed data source");
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.edit_mode != EditMode::ReadWrite {
            bail!(DataError::NotSupported("data source is read-only"));
        }
        Ok(())
    }
}

fn open_file(state: &mut SourceState) -> Result<&mut File> {
    match state.file.as_mut() {
        Some(file) => Ok(file),
        None => bail!(DataError::NotSupported("data source is closed")),
    }
}

fn write_locked(state: &mut SourceState, path: &Path, position: u64, data: &[u8]) -> Result<()> {
    let file = open_file(state)?;
    file.seek(SeekFrom::Start(position))
        .and_then(|_| file.write_all(data))
        .wrap_err_with(|| {
            format!(
                "failed to write {} bytes at {} to {:?}",
                data.len(),
                position,
                path
            )
        })?;
    state.size = state.size.max(position + data.len() as u64);
    Ok(())
}
