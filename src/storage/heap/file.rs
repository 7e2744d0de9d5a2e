//! Backing file for the segment heap
//!
//! All I/O is positional (`pread`/`pwrite` on unix, `seek_read`/`seek_write`
//! on windows), so concurrent readers and writers never share a cursor.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Chunk size used when zero-filling regions that already exist on disk
const ZERO_CHUNK: usize = 64 * 1024;

/// Chunk size used when moving segments during compaction
const COPY_CHUNK: usize = 1024 * 1024;

#[cfg(not(any(unix, windows)))]
compile_error!("heapstore needs positional file I/O, available on unix and windows targets only");

#[cfg(unix)]
mod positional {
    use std::fs::File;
    use std::io::Result;
    use std::os::unix::fs::FileExt;

    #[inline]
    pub fn read_exact_at(file: &File, buffer: &mut [u8], offset: u64) -> Result<()> {
        file.read_exact_at(buffer, offset)
    }

    #[inline]
    pub fn write_all_at(file: &File, buffer: &[u8], offset: u64) -> Result<()> {
        file.write_all_at(buffer, offset)
    }
}

#[cfg(windows)]
mod positional {
    use std::fs::File;
    use std::io::{Error, ErrorKind, Result};
    use std::os::windows::fs::FileExt;

    pub fn read_exact_at(file: &File, mut buffer: &mut [u8], mut offset: u64) -> Result<()> {
        while !buffer.is_empty() {
            match file.seek_read(buffer, offset) {
                Ok(0) => break,
                Ok(n) => {
                    let tmp = buffer;
                    buffer = &mut tmp[n..];
                    offset += n as u64;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        if !buffer.is_empty() {
            Err(Error::new(
                ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            ))
        } else {
            Ok(())
        }
    }

    pub fn write_all_at(file: &File, mut buffer: &[u8], mut offset: u64) -> Result<()> {
        while !buffer.is_empty() {
            match file.seek_write(buffer, offset) {
                Ok(0) => {
                    return Err(Error::new(
                        ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => {
                    buffer = &buffer[n..];
                    offset += n as u64;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// The single file holding every heap byte
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    file: File,
}

impl HeapFile {
    /// Create or open the heap file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::IoFailure(format!("Failed to open heap file {:?}: {}", path, e)))?;

        debug!("Opened heap file: {:?}", path);
        Ok(Self { path, file })
    }

    /// Location of the file on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical length of the file
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| Error::IoFailure(format!("Failed to stat heap file: {}", e)))
    }

    /// Make `[from, to)` exist on disk and read as zeros
    ///
    /// Bytes past the current physical end come from `set_len`. Bytes that are
    /// already on disk (left over from an earlier process) are overwritten.
    pub fn zero_extend(&self, from: u64, to: u64) -> Result<()> {
        let physical = self.len()?;

        let mut offset = from;
        let overwrite_end = to.min(physical);
        if offset < overwrite_end {
            let zeros = vec![0u8; ZERO_CHUNK];
            while offset < overwrite_end {
                let chunk = (overwrite_end - offset).min(ZERO_CHUNK as u64) as usize;
                self.write_at(&zeros[..chunk], offset)?;
                offset += chunk as u64;
            }
        }

        if physical < to {
            self.file
                .set_len(to)
                .map_err(|e| Error::IoFailure(format!("Failed to extend heap file to {}: {}", to, e)))?;
        }

        debug!(from, to, physical, "Zero-extended heap file");
        Ok(())
    }

    /// Make the file at least `len` bytes long without touching existing bytes
    pub fn ensure_len(&self, len: u64) -> Result<()> {
        if self.len()? < len {
            self.file
                .set_len(len)
                .map_err(|e| Error::IoFailure(format!("Failed to extend heap file to {}: {}", len, e)))?;
        }
        Ok(())
    }

    /// Fill `buffer` from `offset`; a short read is an error
    pub fn read_at(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        positional::read_exact_at(&self.file, buffer, offset).map_err(|e| {
            Error::IoFailure(format!(
                "Read of {} bytes at {} failed: {}",
                buffer.len(),
                offset,
                e
            ))
        })
    }

    /// Write all of `buffer` at `offset`
    pub fn write_at(&self, buffer: &[u8], offset: u64) -> Result<()> {
        positional::write_all_at(&self.file, buffer, offset).map_err(|e| {
            Error::IoFailure(format!(
                "Write of {} bytes at {} failed: {}",
                buffer.len(),
                offset,
                e
            ))
        })
    }

    /// Move `len` bytes from `src` down to `dst`
    ///
    /// Requires `dst < src`. Copying front to back in chunks never overwrites
    /// source bytes that have not been read yet, even when the ranges overlap.
    pub fn copy_within(&self, src: u64, dst: u64, len: u64) -> Result<()> {
        debug_assert!(dst < src);

        let mut buffer = vec![0u8; (len.min(COPY_CHUNK as u64)) as usize];
        let mut copied = 0u64;
        while copied < len {
            let chunk = (len - copied).min(COPY_CHUNK as u64) as usize;
            self.read_at(&mut buffer[..chunk], src + copied)?;
            self.write_at(&buffer[..chunk], dst + copied)?;
            copied += chunk as u64;
        }
        Ok(())
    }

    /// Flush file contents to disk
    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| Error::IoFailure(format!("Flush failed: {}", e)))
    }
}
