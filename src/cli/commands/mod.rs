//! CLI command implementations

pub mod cat;
pub mod config;
pub mod hash;
pub mod ls;
pub mod narinfo;
pub mod stat;
pub mod store_dir;

pub use cat::execute as cat;
pub use config::execute as config;
pub use hash::execute as hash;
pub use ls::execute as ls;
pub use narinfo::execute as narinfo;
pub use stat::execute as stat;
pub use store_dir::execute as store_dir;

use crate::config::Config;
use crate::error::CacheFsResult;
use crate::fs::NixCacheFs;
use crate::mirror::Mirror;
use tracing::debug;

/// Build the filesystem from configuration, `--mirror` flags taking precedence
pub fn build_fs(cli_mirrors: &[String], config: &Config) -> CacheFsResult<NixCacheFs> {
    let mirrors = if cli_mirrors.is_empty() {
        config.mirrors()?
    } else {
        cli_mirrors
            .iter()
            .map(|m| Mirror::parse(m))
            .collect::<CacheFsResult<Vec<_>>>()?
    };
    debug!(
        "Using mirrors: {}",
        mirrors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    NixCacheFs::new(mirrors, config.fs_options())
}
