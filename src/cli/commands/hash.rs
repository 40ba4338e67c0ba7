//! Hash command - SHA-256 of a file inside the cache

use crate::cli::args::PathArgs;
use crate::error::{CacheFsError, CacheFsResult};
use crate::fs::{Filesystem, NixCacheFs};
use crate::ui::{TaskSpinner, UiContext};
use sha2::{Digest, Sha256};
use std::io::Read;

const CHUNK_SIZE: usize = 64 * 1024;

/// Execute the hash command
pub fn execute(args: PathArgs, fs: &NixCacheFs) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}", args.path));

    let file = fs.open(&args.path)?;
    let digest = sha256_hex(file)?;
    spinner.clear();

    println!("{}  {}", digest, args.path);
    Ok(())
}

/// Hex SHA-256 of everything `reader` yields
pub fn sha256_hex(mut reader: impl Read) -> CacheFsResult<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| CacheFsError::io("hashing file", e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
