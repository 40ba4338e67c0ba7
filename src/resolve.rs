//! Metadata resolution: virtual path to `.narinfo` record

use crate::client::Client;
use crate::error::{CacheFsError, CacheFsResult};
use crate::mirror::Mirror;
use crate::narinfo::{CacheInfo, NarInfo};
use crate::retry::{first_success, Fallback};
use tracing::debug;

const CACHE_INFO: &str = "nix-cache-info";

/// A virtual path split into its store components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath<'a> {
    /// Top-level component, `<hash>-<name>`
    pub top_level: &'a str,
    /// Lookup key for the narinfo record
    pub key: &'a str,
}

impl<'a> VirtualPath<'a> {
    /// Split `path` once the store directory has been removed from its front
    ///
    /// An unknown (empty) store directory strips nothing.
    pub fn parse(path: &'a str, store_dir: &str) -> CacheFsResult<Self> {
        let rest = path.strip_prefix(store_dir).unwrap_or(path);
        let mut segments = rest.split('/');
        segments.next();
        let top_level = segments
            .next()
            .ok_or_else(|| CacheFsError::invalid_path(path, "no store path component"))?;

        let key = top_level.split('-').next().unwrap_or(top_level);
        if key.is_empty() {
            return Err(CacheFsError::invalid_path(path, "empty store path hash"));
        }

        Ok(Self { top_level, key })
    }
}

/// Metadata together with the mirror that served it
#[derive(Debug, Clone)]
pub struct Resolved {
    pub narinfo: NarInfo,
    pub origin: Mirror,
}

/// Fetch and parse the narinfo for `path`, trying mirrors in priority order
pub fn resolve_narinfo(
    client: &Client,
    mirrors: &[Mirror],
    path: &str,
    store_dir: &str,
) -> CacheFsResult<Resolved> {
    client.debug_log("getNarInfo", &[path]);
    let vpath = VirtualPath::parse(path, store_dir)?;
    let name = format!("{}.narinfo", vpath.key);

    let result = first_success(mirrors, |mirror| {
        let url = mirror.join(&name)?;
        let body = client
            .get(url)?
            .read_to_vec()
            .map_err(|e| CacheFsError::io(format!("reading {} from {}", name, mirror), e))?;
        let narinfo = NarInfo::from_bytes(&body)?;
        if narinfo.hash_part() != vpath.key {
            return Err(CacheFsError::metadata(format!(
                "{} describes {}, not {}",
                name, narinfo.store_path, vpath.key
            )));
        }
        Ok(narinfo)
    });

    match result {
        Ok((narinfo, origin)) => {
            debug!("Resolved {} to {} via {}", path, narinfo.store_path, origin);
            Ok(Resolved {
                narinfo,
                origin: origin.clone(),
            })
        }
        Err(Fallback::Aborted(e)) => Err(e),
        Err(Fallback::Exhausted(attempts)) => Err(CacheFsError::MetadataNotFound {
            key: vpath.key.to_string(),
            attempts,
        }),
    }
}

/// Read the store directory advertised by `mirror`
///
/// Returns `None` on any failure; callers keep whatever they had before.
pub fn discover_store_dir(client: &Client, mirror: &Mirror) -> Option<String> {
    let url = mirror.join(CACHE_INFO).ok()?;
    let body = match client.get(url) {
        Ok(response) => response.read_to_vec().ok()?,
        Err(e) => {
            debug!("Store dir discovery on {} failed: {}", mirror, e);
            return None;
        }
    };
    let text = String::from_utf8_lossy(&body);
    CacheInfo::parse(&text).store_dir.filter(|dir| !dir.is_empty())
}
