//! Persistent on-disk copy of response bodies
//!
//! This is not an HTTP cache: entries are keyed by the cleaned request path
//! alone and never revalidated. Binary cache objects are content addressed,
//! so a path that was fetched once keeps meaning the same bytes.

use super::{Request, Response, Transport, TransportError};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// Transport decorator that serves repeat requests from disk
pub struct CachingTransport<T> {
    dir: PathBuf,
    inner: T,
}

impl<T: Transport> CachingTransport<T> {
    pub fn new(dir: impl Into<PathBuf>, inner: T) -> Self {
        Self {
            dir: dir.into(),
            inner,
        }
    }

    /// Location on disk for a request URL
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        let mut parts: Vec<&str> = Vec::new();
        for segment in url.path().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        if parts.is_empty() {
            parts.push("index");
        }
        parts.iter().fold(self.dir.clone(), |path, part| path.join(part))
    }

    fn store(&self, path: &Path, mut response: Response, url: &Url) -> Result<Response, TransportError> {
        let parent = path.parent().unwrap_or(&self.dir);
        fs::create_dir_all(parent).map_err(|e| local("creating cache directory", e))?;

        // Written beside the final location and renamed into place once
        // complete, so an interrupted body is never served later.
        let mut partial =
            NamedTempFile::new_in(parent).map_err(|e| local("creating cache entry", e))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match response.body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TransportError::Request {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
            };
            partial
                .write_all(&buf[..n])
                .map_err(|e| local("writing cache entry", e))?;
        }

        partial
            .persist(path)
            .map_err(|e| local("storing cache entry", e.error))?;
        let file = File::open(path).map_err(|e| local("reopening cache entry", e))?;
        debug!("Stored {} at {}", url, path.display());

        Ok(Response {
            status: response.status,
            headers: response.headers,
            body: Box::new(file),
            from_cache: false,
        })
    }
}

impl<T: Transport> Transport for CachingTransport<T> {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let path = self.cache_path(&request.url);

        if let Ok(file) = File::open(&path) {
            if file.metadata().map(|m| m.is_file()).unwrap_or(false) {
                debug!("Serving {} from {}", request.url, path.display());
                let mut response = Response::ok(Box::new(file));
                response.from_cache = true;
                return Ok(response);
            }
        }

        let response = self.inner.send(request)?;
        self.store(&path, response, &request.url)
    }
}

fn local(context: &str, source: io::Error) -> TransportError {
    TransportError::LocalStorage {
        context: context.to_string(),
        source,
    }
}
