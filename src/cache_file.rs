//! Self-cleaning local spill file
//!
//! A `CacheFile` holds one decompressed NAR. Its directory entry is removed
//! the moment it is created, so the bytes are only reachable through the open
//! handle: nothing is left behind if the process dies, and the space is given
//! back as soon as the handle is dropped or closed.

use crate::error::{CacheFsError, CacheFsResult};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Anonymous, random-access byte store backed by an unlinked temporary file
#[derive(Debug)]
pub struct CacheFile {
    file: File,
    /// Name the file had before it was unlinked; diagnostics only
    created_as: PathBuf,
}

impl CacheFile {
    /// Create a cache file in the system temporary directory
    pub fn create(hint: &str) -> CacheFsResult<Self> {
        Self::create_in(&std::env::temp_dir(), hint)
    }

    /// Create a cache file in `dir`, named after `hint` until it is unlinked
    pub fn create_in(dir: &Path, hint: &str) -> CacheFsResult<Self> {
        let named = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(hint)))
            .tempfile_in(dir)
            .map_err(|e| CacheFsError::local_storage("creating cache file", e))?;

        let (file, temp_path) = named.into_parts();
        let created_as = temp_path.to_path_buf();
        temp_path
            .close()
            .map_err(|e| CacheFsError::local_storage("could not pre-delete cache file", e))?;

        debug!("Created cache file {} (unlinked)", created_as.display());
        Ok(Self { file, created_as })
    }

    /// Path the file was created under; it no longer exists
    pub fn created_as(&self) -> &Path {
        &self.created_as
    }

    /// Read at an absolute offset without moving the cursor
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            std::os::unix::fs::FileExt::read_at(&self.file, buf, offset)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::FileExt::seek_read(&self.file, buf, offset)
        }
    }

    /// Fill `buf` completely from an absolute offset
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Write at an absolute offset without moving the cursor
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            std::os::unix::fs::FileExt::write_at(&self.file, buf, offset)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::FileExt::seek_write(&self.file, buf, offset)
        }
    }

    /// Current size of the stored bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Release the backing storage now
    ///
    /// Dropping has the same effect; this form exists so callers can make the
    /// release point explicit.
    pub fn close(self) {
        debug!("Closing cache file {}", self.created_as.display());
    }
}

impl Read for CacheFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for CacheFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for CacheFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Keep the hint usable as a file name prefix
fn sanitize(hint: &str) -> String {
    let cleaned: String = hint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "-_.+".contains(c) { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "nar".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unlinked_immediately() {
        let dir = TempDir::new().unwrap();
        let cache = CacheFile::create_in(dir.path(), "abc-hello-2.12").unwrap();

        assert!(!cache.created_as().exists());
        assert!(cache
            .created_as()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("abc-hello-2.12-"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sequential_and_positional_io() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheFile::create_in(dir.path(), "io").unwrap();

        cache.write_all(b"hello, world").unwrap();
        cache.seek(SeekFrom::Start(0)).unwrap();

        let mut head = [0u8; 5];
        cache.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"hello");

        let mut tail = [0u8; 5];
        cache.read_exact_at(&mut tail, 7).unwrap();
        assert_eq!(&tail, b"world");

        cache.write_at(b"W", 7).unwrap();
        cache.read_exact_at(&mut tail, 7).unwrap();
        assert_eq!(&tail, b"World");
        assert_eq!(cache.len().unwrap(), 12);

        cache.close();
    }

    #[test]
    fn read_past_end_is_eof() {
        let dir = TempDir::new().unwrap();
        let cache = CacheFile::create_in(dir.path(), "eof").unwrap();
        let mut buf = [0u8; 4];
        let err = cache.read_exact_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn hint_is_sanitized() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize(""), "nar");
    }

    #[test]
    fn missing_directory_is_local_storage_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = CacheFile::create_in(&missing, "x").unwrap_err();
        assert!(matches!(err, CacheFsError::LocalStorage { .. }));
    }
}
