//! Binary cache metadata: `.narinfo` records and `nix-cache-info`
//!
//! Both are line-based `Field: value` text. Only the fields the filesystem
//! needs are validated; everything else is kept verbatim.

use crate::error::{CacheFsError, CacheFsResult};
use serde::Serialize;
use std::fmt;

/// Compression codec applied to a NAR blob
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum Compression {
    #[default]
    None,
    Xz,
    Bzip2,
    Gzip,
    Zstd,
    /// Unrecognised codec name; served without decompression
    Other(String),
}

impl Compression {
    /// Parse the `Compression` field; empty means none
    pub fn from_field(value: &str) -> Self {
        match value {
            "" | "none" => Self::None,
            "xz" => Self::Xz,
            "bzip2" => Self::Bzip2,
            "gzip" => Self::Gzip,
            "zstd" => Self::Zstd,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Xz => "xz",
            Self::Bzip2 => "bzip2",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Other(name) => name,
        };
        write!(f, "{}", name)
    }
}

impl From<Compression> for String {
    fn from(c: Compression) -> Self {
        c.to_string()
    }
}

/// Metadata record for one store path
#[derive(Debug, Clone, Default, Serialize)]
pub struct NarInfo {
    /// Full store path, e.g. `/nix/store/<hash>-<name>`
    pub store_path: String,
    /// Blob location, absolute or relative to the serving mirror
    pub url: String,
    pub compression: Compression,
    pub file_hash: Option<String>,
    pub file_size: Option<u64>,
    pub nar_hash: Option<String>,
    pub nar_size: Option<u64>,
    pub references: Vec<String>,
    pub deriver: Option<String>,
    pub sigs: Vec<String>,
    pub ca: Option<String>,
    /// Fields not interpreted here, in file order
    pub extra: Vec<(String, String)>,
}

impl NarInfo {
    /// Parse a `.narinfo` document
    pub fn parse(text: &str) -> CacheFsResult<Self> {
        let mut info = NarInfo::default();
        let mut store_path = None;
        let mut url = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| CacheFsError::metadata(format!("line without ':': {:?}", line)))?;
            let value = value.trim();

            match key {
                "StorePath" => store_path = Some(value.to_string()),
                "URL" => url = Some(value.to_string()),
                "Compression" => info.compression = Compression::from_field(value),
                "FileHash" => info.file_hash = Some(value.to_string()),
                "FileSize" => info.file_size = Some(parse_size(key, value)?),
                "NarHash" => info.nar_hash = Some(value.to_string()),
                "NarSize" => info.nar_size = Some(parse_size(key, value)?),
                "References" => {
                    info.references = value.split_whitespace().map(str::to_string).collect()
                }
                "Deriver" if value != "unknown-deriver" => info.deriver = Some(value.to_string()),
                "Deriver" => {}
                "Sig" => info.sigs.push(value.to_string()),
                "CA" => info.ca = Some(value.to_string()),
                other => info.extra.push((other.to_string(), value.to_string())),
            }
        }

        info.store_path = store_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CacheFsError::metadata("missing StorePath"))?;
        info.url = url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CacheFsError::metadata("missing URL"))?;
        Ok(info)
    }

    /// Parse raw response bytes
    pub fn from_bytes(bytes: &[u8]) -> CacheFsResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CacheFsError::metadata(format!("narinfo is not UTF-8: {}", e)))?;
        Self::parse(text)
    }

    /// Last component of the store path, `<hash>-<name>`
    pub fn base_name(&self) -> &str {
        self.store_path
            .rsplit('/')
            .next()
            .unwrap_or(self.store_path.as_str())
    }

    /// Hash part of the store path, the lookup key for this record
    pub fn hash_part(&self) -> &str {
        hash_part(self.base_name())
    }
}

/// Global information served at `nix-cache-info`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheInfo {
    pub store_dir: Option<String>,
    pub want_mass_query: Option<bool>,
    pub priority: Option<u32>,
}

impl CacheInfo {
    /// Parse a `nix-cache-info` document, ignoring lines it cannot use
    pub fn parse(text: &str) -> Self {
        let mut info = CacheInfo::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key {
                "StoreDir" => info.store_dir = Some(value.to_string()),
                "WantMassQuery" => info.want_mass_query = Some(value == "1"),
                "Priority" => info.priority = value.parse().ok(),
                _ => {}
            }
        }
        info
    }
}

/// Portion of a store path base name before its first `-`
pub fn hash_part(base_name: &str) -> &str {
    base_name.split('-').next().unwrap_or(base_name)
}

fn parse_size(key: &str, value: &str) -> CacheFsResult<u64> {
    value
        .parse()
        .map_err(|_| CacheFsError::metadata(format!("{} is not a number: {:?}", key, value)))
}
