//! Binary cache mirror endpoints

use crate::error::{CacheFsError, CacheFsResult};
use std::fmt;
use url::Url;

/// One configured base endpoint serving the binary cache
///
/// The base URL always ends in `/` so relative references resolve beneath it
/// rather than replacing its last path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    base: Url,
}

impl Mirror {
    /// Create a mirror from a base URL
    pub fn new(mut base: Url) -> CacheFsResult<Self> {
        if base.cannot_be_a_base() {
            return Err(CacheFsError::invalid_path(
                base.as_str(),
                "mirror URL cannot be used as a base",
            ));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// Parse a mirror from a string such as `https://cache.nixos.org`
    pub fn parse(s: &str) -> CacheFsResult<Self> {
        let url = Url::parse(s.trim())
            .map_err(|e| CacheFsError::invalid_path(s, format!("invalid mirror URL: {}", e)))?;
        Self::new(url)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL of a file directly beneath the mirror root
    pub fn join(&self, name: &str) -> CacheFsResult<Url> {
        self.base
            .join(name.trim_start_matches('/'))
            .map_err(|e| CacheFsError::invalid_path(name, e.to_string()))
    }

    /// Resolve a blob location, which may be absolute or mirror-relative
    pub fn resolve(&self, location: &str) -> CacheFsResult<Url> {
        self.base
            .join(location)
            .map_err(|e| CacheFsError::invalid_path(location, e.to_string()))
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}
