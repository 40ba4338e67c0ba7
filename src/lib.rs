//! nix-cachefs - Nix binary cache as a read-only filesystem
//!
//! Resolves store paths against one or more HTTP binary cache mirrors,
//! fetches and decompresses their NAR archives into self-cleaning local
//! files, and serves the files inside through read-only handles.

pub mod archive;
pub mod cache_file;
pub mod cli;
pub mod client;
pub mod config;
#[path = "creds/mod.rs"]
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod mirror;
pub mod nar;
pub mod narinfo;
pub mod options;
pub mod resolve;
pub mod retry;
pub mod transport;
pub mod ui;

pub use archive::{ArchiveFile, EntryKind, FileInfo};
pub use error::{CacheFsError, CacheFsResult};
pub use fs::{Filesystem, NixCacheFs, OpenFlags};
pub use mirror::Mirror;
pub use options::FsOptions;
