//! Store-dir command - print the cache's store directory

use crate::error::CacheFsResult;
use crate::fs::NixCacheFs;

/// Execute the store-dir command
pub fn execute(fs: &NixCacheFs) -> CacheFsResult<()> {
    println!("{}", fs.store_dir());
    Ok(())
}
