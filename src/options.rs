//! Options for constructing a `NixCacheFs`
//!
//! # Example
//!
//! ```ignore
//! let options = FsOptions::default()
//!     .with_netrc_file("/etc/nix/netrc")
//!     .with_persistent_cache("/var/cache/nix-cachefs")
//!     .with_debug_sink(|msg| eprintln!("debug: {}", msg));
//!
//! let fs = NixCacheFs::new(vec![Mirror::parse("https://cache.nixos.org")?], options)?;
//! ```

use crate::credentials::Netrc;
use crate::transport::{CachingTransport, Transport, UreqTransport, DEFAULT_TIMEOUT};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Callback receiving one formatted diagnostic line
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for the filesystem
#[derive(Clone, Default)]
pub struct FsOptions {
    /// Transport override; a `ureq` client is used when unset
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) netrc: Option<Netrc>,
    pub(crate) debug_sink: Option<LogSink>,
    pub(crate) error_sink: Option<LogSink>,
    pub(crate) persistent_cache: Option<PathBuf>,
    pub(crate) timeout: Option<Duration>,
    /// Where cache files are created; the system temp dir when unset
    pub(crate) temp_dir: Option<PathBuf>,
}

impl FsOptions {
    /// Use a custom transport instead of the built-in HTTP client
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Read credentials from a netrc file
    ///
    /// A file that cannot be read or parsed is logged and ignored; requests
    /// then go out without credentials.
    pub fn with_netrc_file(mut self, path: impl AsRef<Path>) -> Self {
        match Netrc::from_file(path.as_ref()) {
            Ok(netrc) => self.netrc = Some(netrc),
            Err(e) => warn!("Ignoring netrc {}: {}", path.as_ref().display(), e),
        }
        self
    }

    /// Use inline netrc content for credentials
    pub fn with_netrc(mut self, content: &str) -> Self {
        match Netrc::parse(content) {
            Ok(netrc) => self.netrc = Some(netrc),
            Err(e) => warn!("Ignoring inline netrc: {}", e),
        }
        self
    }

    pub fn with_debug_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug_sink = Some(Arc::new(sink));
        self
    }

    pub fn with_error_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Keep a persistent copy of every fetched object under `dir`
    pub fn with_persistent_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistent_cache = Some(dir.into());
        self
    }

    /// Global timeout per request for the built-in HTTP client
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Assemble the transport stack these options describe
    pub(crate) fn build_transport(&self) -> Arc<dyn Transport> {
        let base: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(UreqTransport::new(self.timeout.unwrap_or(DEFAULT_TIMEOUT))),
        };
        match &self.persistent_cache {
            Some(dir) => Arc::new(CachingTransport::new(dir.clone(), base)),
            None => base,
        }
    }

    pub(crate) fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl fmt::Debug for FsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsOptions")
            .field("custom_transport", &self.transport.is_some())
            .field("netrc", &self.netrc.is_some())
            .field("debug_sink", &self.debug_sink.is_some())
            .field("error_sink", &self.error_sink.is_some())
            .field("persistent_cache", &self.persistent_cache)
            .field("timeout", &self.timeout)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}
