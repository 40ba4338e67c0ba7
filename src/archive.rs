//! Read-only file handles over an indexed NAR
//!
//! An `Archive` pairs the `CacheFile` holding a decompressed NAR with its
//! index. Opening a path resolves what the entry can do once, up front: a
//! regular file handle reads and seeks, a directory handle lists. Anything
//! that would modify the archive is refused.

use crate::cache_file::CacheFile;
use crate::error::{CacheFsError, CacheFsResult};
use crate::nar::{NarListing, NarNode};
use serde::Serialize;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::debug;

const MODE_FILE: u32 = 0o444;
const MODE_EXEC: u32 = 0o555;
const MODE_DIR: u32 = 0o555;
const MODE_SYMLINK: u32 = 0o777;

/// Kind of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Stat information for an archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    pub kind: EntryKind,
}

impl FileInfo {
    fn from_node(name: &str, node: &NarNode) -> Self {
        let (size, mode, kind) = match node {
            NarNode::Regular {
                executable, size, ..
            } => {
                let mode = if *executable { MODE_EXEC } else { MODE_FILE };
                (*size, mode, EntryKind::File)
            }
            NarNode::Directory { .. } => (0, MODE_DIR, EntryKind::Directory),
            NarNode::Symlink { target } => (target.len() as u64, MODE_SYMLINK, EntryKind::Symlink),
        };
        Self {
            name: name.to_string(),
            size,
            mode,
            kind,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// `ls -l` style mode string, e.g. `dr-xr-xr-x`
    pub fn mode_string(&self) -> String {
        let kind = match self.kind {
            EntryKind::File => '-',
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
        };
        let mut out = String::with_capacity(10);
        out.push(kind);
        for shift in [6, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }
}

/// Map the remainder of a virtual path onto a path inside the archive
///
/// The store path prefix and any leading separator are removed; an empty
/// remainder addresses the archive root, which is how single-file archives
/// are reached.
pub fn path_in_archive<'a>(virtual_path: &'a str, store_path: &str) -> &'a str {
    let rest = virtual_path
        .strip_prefix(store_path)
        .unwrap_or(virtual_path)
        .trim_start_matches('/');
    if rest.is_empty() {
        "."
    } else {
        rest
    }
}

/// An indexed NAR backed by a cache file
#[derive(Debug)]
pub struct Archive {
    data: Arc<CacheFile>,
    listing: NarListing,
}

impl Archive {
    /// Index the NAR held in `cache`
    pub fn new(mut cache: CacheFile) -> CacheFsResult<Self> {
        cache
            .seek(SeekFrom::Start(0))
            .map_err(|e| CacheFsError::local_storage("rewinding cache file", e))?;
        let listing = NarListing::parse(&mut cache)?;
        Ok(Self {
            data: Arc::new(cache),
            listing,
        })
    }

    /// Open an entry; `name` is reported back by `ArchiveFile::name`
    pub fn open(&self, path: &str, name: &str) -> CacheFsResult<ArchiveFile> {
        let located = self.listing.lookup(path)?;
        let info = FileInfo::from_node(located.name, located.node);

        let handle = match located.node {
            NarNode::Regular { size, offset, .. } => EntryHandle::File {
                offset: *offset,
                size: *size,
                pos: 0,
            },
            NarNode::Directory { entries } => EntryHandle::Directory {
                entries: entries
                    .iter()
                    .map(|(name, node)| FileInfo::from_node(name, node))
                    .collect(),
                cursor: 0,
            },
            // lookup follows every link below the root, so this is a symlink root
            NarNode::Symlink { .. } => EntryHandle::Symlink,
        };

        debug!("Opened {} ({:?}) in archive", path, info.kind);
        Ok(ArchiveFile {
            name: name.to_string(),
            info,
            handle,
            data: Arc::clone(&self.data),
        })
    }
}

#[derive(Debug)]
enum EntryHandle {
    File { offset: u64, size: u64, pos: u64 },
    Directory { entries: Vec<FileInfo>, cursor: usize },
    Symlink,
}

/// Handle on one entry of an archive
///
/// Keeps the archive's cache file alive until the last handle is closed.
#[derive(Debug)]
pub struct ArchiveFile {
    name: String,
    info: FileInfo,
    handle: EntryHandle,
    data: Arc<CacheFile>,
}

impl ArchiveFile {
    /// Name the entry was opened under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stat(&self) -> CacheFsResult<FileInfo> {
        Ok(self.info.clone())
    }

    /// Read from the current position
    pub fn read(&mut self, buf: &mut [u8]) -> CacheFsResult<usize> {
        let n = self.read_at(buf, self.position("read")?)?;
        if let EntryHandle::File { pos, .. } = &mut self.handle {
            *pos += n as u64;
        }
        Ok(n)
    }

    /// Read at an offset within the entry; returns 0 at end of file
    pub fn read_at(&self, buf: &mut [u8], off: u64) -> CacheFsResult<usize> {
        let EntryHandle::File { offset, size, .. } = self.handle else {
            return Err(self.unsupported("read"));
        };
        if off >= size || buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min((size - off) as usize);
        self.data
            .read_exact_at(&mut buf[..len], offset + off)
            .map_err(|e| CacheFsError::local_storage("reading cache file", e))?;
        Ok(len)
    }

    pub fn seek(&mut self, from: SeekFrom) -> CacheFsResult<u64> {
        let EntryHandle::File { size, pos, .. } = &mut self.handle else {
            return Err(self.unsupported("seek"));
        };
        let target = match from {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => size.checked_add_signed(n),
            SeekFrom::Current(n) => pos.checked_add_signed(n),
        };
        let target = target.ok_or_else(|| {
            CacheFsError::io(
                format!("seeking in {}", self.name),
                io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position"),
            )
        })?;
        *pos = target;
        Ok(target)
    }

    /// List directory entries; `count == 0` returns all remaining entries
    pub fn readdir(&mut self, count: usize) -> CacheFsResult<Vec<FileInfo>> {
        let EntryHandle::Directory { entries, cursor } = &mut self.handle else {
            return Err(CacheFsError::NotADirectory(self.name.clone()));
        };
        let remaining = &entries[*cursor..];
        let take = if count == 0 {
            remaining.len()
        } else {
            count.min(remaining.len())
        };
        let batch = remaining[..take].to_vec();
        *cursor += take;
        Ok(batch)
    }

    pub fn readdirnames(&mut self, count: usize) -> CacheFsResult<Vec<String>> {
        Ok(self.readdir(count)?.into_iter().map(|info| info.name).collect())
    }

    pub fn write(&mut self, _buf: &[u8]) -> CacheFsResult<usize> {
        Err(self.denied("write"))
    }

    pub fn write_at(&mut self, _buf: &[u8], _off: u64) -> CacheFsResult<usize> {
        Err(self.denied("write"))
    }

    pub fn write_string(&mut self, _s: &str) -> CacheFsResult<usize> {
        Err(self.denied("write"))
    }

    pub fn truncate(&mut self, _size: u64) -> CacheFsResult<()> {
        Err(self.denied("truncate"))
    }

    /// Nothing to flush on a read-only view
    pub fn sync(&self) -> CacheFsResult<()> {
        Ok(())
    }

    pub fn close(self) -> CacheFsResult<()> {
        debug!("Closing {}", self.name);
        Ok(())
    }

    fn position(&self, op: &'static str) -> CacheFsResult<u64> {
        match self.handle {
            EntryHandle::File { pos, .. } => Ok(pos),
            _ => Err(self.unsupported(op)),
        }
    }

    fn unsupported(&self, op: &'static str) -> CacheFsError {
        CacheFsError::UnsupportedOperation {
            op,
            path: self.name.clone(),
        }
    }

    fn denied(&self, op: &'static str) -> CacheFsError {
        CacheFsError::PermissionDenied {
            op,
            path: self.name.clone(),
        }
    }
}

impl Read for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ArchiveFile::read(self, buf).map_err(io::Error::from)
    }
}

impl Seek for ArchiveFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ArchiveFile::seek(self, pos).map_err(io::Error::from)
    }
}
