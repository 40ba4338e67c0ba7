//! Blob download with mirror fallback and streaming decompression

use crate::cache_file::CacheFile;
use crate::client::Client;
use crate::error::{CacheFsError, CacheFsResult};
use crate::mirror::Mirror;
use crate::narinfo::Compression;
use crate::resolve::Resolved;
use crate::retry::{first_success, Fallback};
use std::io::{self, Read, Seek, SeekFrom};
use std::iter;
use std::path::Path;
use tracing::{debug, info};

/// Wrap `body` in the decoder for `compression`
///
/// Unknown codecs are passed through undecoded.
pub fn decoder(
    compression: &Compression,
    body: Box<dyn Read + Send>,
) -> io::Result<Box<dyn Read + Send>> {
    Ok(match compression {
        Compression::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(body)),
        Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(body)),
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(body)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(body)?),
        Compression::None => body,
        Compression::Other(name) => {
            debug!("Unknown compression {:?}, reading blob as-is", name);
            body
        }
    })
}

/// Download and decompress the NAR described by `resolved` into a cache file
///
/// The origin mirror is tried first, then every configured mirror in order.
pub fn fetch_nar(
    client: &Client,
    resolved: &Resolved,
    mirrors: &[Mirror],
    temp_dir: &Path,
) -> CacheFsResult<CacheFile> {
    let narinfo = &resolved.narinfo;
    client.debug_log("getNar", &[&narinfo.store_path, resolved.origin.base().as_str()]);

    let candidates = iter::once(&resolved.origin).chain(mirrors);
    let result = first_success(candidates, |mirror| {
        let url = mirror.resolve(&narinfo.url)?;
        let response = client.get(url.clone())?;

        let mut cache = CacheFile::create_in(temp_dir, narinfo.base_name())?;

        let mut reader = decoder(&narinfo.compression, response.body)
            .map_err(|e| CacheFsError::io(format!("opening {} decoder for {}", narinfo.compression, url), e))?;
        let copied = io::copy(&mut reader, &mut cache)
            .map_err(|e| CacheFsError::io(format!("copying {}", url), e))?;

        cache
            .seek(SeekFrom::Start(0))
            .map_err(|e| CacheFsError::local_storage("rewinding cache file", e))?;

        debug!("Fetched {} ({} bytes decompressed)", url, copied);
        Ok(cache)
    });

    match result {
        Ok((cache, mirror)) => {
            info!("Fetched {} from {}", narinfo.store_path, mirror);
            Ok(cache)
        }
        Err(Fallback::Aborted(e)) => Err(e),
        Err(Fallback::Exhausted(attempts)) => Err(CacheFsError::TransferFailed {
            store_path: narinfo.store_path.clone(),
            attempts,
        }),
    }
}
