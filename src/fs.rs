//! Read-only filesystem facade over a binary cache
//!
//! Every `open` runs the whole pipeline for the requested path: resolve the
//! narinfo, fetch and decompress the NAR into a fresh cache file, index it,
//! and open the entry inside it. Nothing is shared between calls apart from
//! the store directory, which is discovered once.

use crate::archive::{path_in_archive, Archive, ArchiveFile, FileInfo};
use crate::client::Client;
use crate::error::{CacheFsError, CacheFsResult};
use crate::fetch::fetch_nar;
use crate::mirror::Mirror;
use crate::options::FsOptions;
use crate::resolve::{self, Resolved};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::SystemTime;
use tracing::debug;

/// Store directory assumed until a mirror advertises one
pub const DEFAULT_STORE_DIR: &str = "/nix/store";

const FS_NAME: &str = "nix-http-cache-fs";

/// Access requested when opening a file
///
/// Only reads are ever honoured; any write intent is refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenFlags {
    pub const READ_ONLY: Self = Self {
        write: false,
        create: false,
        truncate: false,
        append: false,
    };

    pub fn wants_write(&self) -> bool {
        self.write || self.create || self.truncate || self.append
    }
}

/// Filesystem-shaped interface
///
/// Mutating operations exist so callers written against a general
/// filesystem keep working; a read-only implementation refuses them.
pub trait Filesystem: Send + Sync {
    /// Identifier for diagnostics
    fn name(&self) -> &'static str;

    fn open(&self, path: &str) -> CacheFsResult<ArchiveFile>;

    fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> CacheFsResult<ArchiveFile>;

    fn stat(&self, path: &str) -> CacheFsResult<FileInfo>;

    /// All entries of a directory
    fn read_dir(&self, path: &str) -> CacheFsResult<Vec<FileInfo>> {
        self.open(path)?.readdir(0)
    }

    /// All entry names of a directory
    fn read_dir_names(&self, path: &str) -> CacheFsResult<Vec<String>> {
        self.open(path)?.readdirnames(0)
    }

    fn create(&self, path: &str) -> CacheFsResult<ArchiveFile>;
    fn mkdir(&self, path: &str, perm: u32) -> CacheFsResult<()>;
    fn mkdir_all(&self, path: &str, perm: u32) -> CacheFsResult<()>;
    fn remove(&self, path: &str) -> CacheFsResult<()>;
    fn remove_all(&self, path: &str) -> CacheFsResult<()>;
    fn rename(&self, from: &str, to: &str) -> CacheFsResult<()>;
    fn chmod(&self, path: &str, mode: u32) -> CacheFsResult<()>;
    fn chown(&self, path: &str, uid: u32, gid: u32) -> CacheFsResult<()>;
    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> CacheFsResult<()>;
}

/// Read-only view of one or more binary cache mirrors
#[derive(Debug)]
pub struct NixCacheFs {
    /// Priority order
    mirrors: Vec<Mirror>,
    client: Client,
    temp_dir: PathBuf,
    store_dir: OnceLock<String>,
}

impl NixCacheFs {
    /// Create a filesystem over `mirrors`, highest priority first
    pub fn new(mirrors: Vec<Mirror>, options: FsOptions) -> CacheFsResult<Self> {
        if mirrors.is_empty() {
            return Err(CacheFsError::ConfigInvalid {
                path: PathBuf::new(),
                reason: "at least one mirror is required".to_string(),
            });
        }

        Ok(Self {
            client: Client::new(&options),
            temp_dir: options.temp_dir(),
            mirrors,
            store_dir: OnceLock::new(),
        })
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    /// Store directory advertised by the first mirror
    ///
    /// Discovery failures are silent and retried on the next call; until it
    /// succeeds the default store directory is assumed.
    pub fn store_dir(&self) -> String {
        if let Some(dir) = self.store_dir.get() {
            return dir.clone();
        }
        let Some(first) = self.mirrors.first() else {
            return DEFAULT_STORE_DIR.to_string();
        };
        match resolve::discover_store_dir(&self.client, first) {
            Some(dir) => self.store_dir.get_or_init(|| dir).clone(),
            None => DEFAULT_STORE_DIR.to_string(),
        }
    }

    /// Resolve the narinfo record behind a virtual path
    pub fn narinfo(&self, path: &str) -> CacheFsResult<Resolved> {
        let store_dir = self.store_dir();
        let result = resolve::resolve_narinfo(&self.client, &self.mirrors, path, &store_dir);
        self.logged("getNarInfo", result)
    }

    fn open_entry(&self, path: &str) -> CacheFsResult<ArchiveFile> {
        let resolved = self.narinfo(path)?;
        let cache = fetch_nar(&self.client, &resolved, &self.mirrors, &self.temp_dir)?;
        let archive = Archive::new(cache)?;

        let inner = path_in_archive(path, &resolved.narinfo.store_path);
        debug!("Opening {} inside {}", inner, resolved.narinfo.store_path);
        archive.open(inner, path)
    }

    fn logged<T>(&self, op: &str, result: CacheFsResult<T>) -> CacheFsResult<T> {
        result.map_err(|e| {
            self.client.error_log(op, &e);
            e
        })
    }
}

fn denied<T>(op: &'static str, path: &str) -> CacheFsResult<T> {
    Err(CacheFsError::PermissionDenied {
        op,
        path: path.to_string(),
    })
}

impl Filesystem for NixCacheFs {
    fn name(&self) -> &'static str {
        FS_NAME
    }

    fn open(&self, path: &str) -> CacheFsResult<ArchiveFile> {
        self.open_file(path, OpenFlags::READ_ONLY, 0o777)
    }

    fn open_file(&self, path: &str, flags: OpenFlags, _perm: u32) -> CacheFsResult<ArchiveFile> {
        if flags.wants_write() {
            return denied("open for writing", path);
        }
        let result = self.open_entry(path);
        self.logged("OpenFile", result)
    }

    /// Stat requires unpacking the archive, so it costs a full open
    fn stat(&self, path: &str) -> CacheFsResult<FileInfo> {
        self.open(path)?.stat()
    }

    fn create(&self, path: &str) -> CacheFsResult<ArchiveFile> {
        denied("create", path)
    }

    fn mkdir(&self, path: &str, _perm: u32) -> CacheFsResult<()> {
        denied("mkdir", path)
    }

    fn mkdir_all(&self, path: &str, _perm: u32) -> CacheFsResult<()> {
        denied("mkdir", path)
    }

    fn remove(&self, path: &str) -> CacheFsResult<()> {
        denied("remove", path)
    }

    fn remove_all(&self, path: &str) -> CacheFsResult<()> {
        denied("remove", path)
    }

    fn rename(&self, from: &str, _to: &str) -> CacheFsResult<()> {
        denied("rename", from)
    }

    fn chmod(&self, path: &str, _mode: u32) -> CacheFsResult<()> {
        denied("chmod", path)
    }

    fn chown(&self, path: &str, _uid: u32, _gid: u32) -> CacheFsResult<()> {
        denied("chown", path)
    }

    fn chtimes(&self, path: &str, _atime: SystemTime, _mtime: SystemTime) -> CacheFsResult<()> {
        denied("chtimes", path)
    }
}
