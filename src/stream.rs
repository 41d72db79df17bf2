//! Scoped read/write file handle
//!
//! A [`ScopedFileStream`] owns exactly one open file. The handle is released
//! when the stream is dropped, including during panic unwinding, so a
//! worker can never carry an open file past the task it was opened for.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive read/write handle on a single regular file
#[derive(Debug)]
pub struct ScopedFileStream {
    file: File,
    path: PathBuf,
}

impl ScopedFileStream {
    /// Open `path` for combined reading and writing
    ///
    /// Fails with [`Error::Open`] if the path does not exist, is a
    /// directory, or lacks read+write permission.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;

        // Some platforms allow opening a directory; reject it here.
        let metadata = file.metadata().map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(Error::Open {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        debug!("Opened {:?} ({} bytes)", path, metadata.len());

        Ok(ScopedFileStream {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path this stream was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the underlying file
    pub(crate) fn len(&self) -> Result<u64> {
        let metadata = self.file.metadata().map_err(|source| Error::Transform {
            path: self.path.clone(),
            source,
        })?;
        Ok(metadata.len())
    }

    /// Flush file contents to disk and release the handle
    ///
    /// Dropping the stream also releases the handle, but discards any error
    /// the final sync would have reported.
    pub fn close(self) -> Result<()> {
        self.file.sync_all().map_err(|source| Error::Transform {
            path: self.path.clone(),
            source,
        })?;
        debug!("Closed {:?}", self.path);
        Ok(())
    }
}

impl Read for ScopedFileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for ScopedFileStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for ScopedFileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
