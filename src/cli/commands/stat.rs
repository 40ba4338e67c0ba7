//! Stat command - show metadata for one path

use crate::cli::args::StatArgs;
use crate::error::CacheFsResult;
use crate::fs::{Filesystem, NixCacheFs};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the stat command
pub fn execute(args: StatArgs, fs: &NixCacheFs) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}", args.path));

    let info = fs.stat(&args.path)?;
    spinner.clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    ui::key_value(&ctx, "Path", &args.path);
    ui::key_value(&ctx, "Name", &info.name);
    ui::key_value(&ctx, "Type", &format!("{:?}", info.kind).to_lowercase());
    ui::key_value(&ctx, "Size", &info.size.to_string());
    ui::key_value(&ctx, "Mode", &format!("{:04o} ({})", info.mode, info.mode_string()));
    Ok(())
}
