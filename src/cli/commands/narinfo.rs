//! Narinfo command - show the metadata record behind a path

use crate::cli::args::StatArgs;
use crate::error::CacheFsResult;
use crate::fs::NixCacheFs;
use crate::narinfo::NarInfo;
use crate::ui::{self, TaskSpinner, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct NarInfoOutput<'a> {
    mirror: String,
    #[serde(flatten)]
    narinfo: &'a NarInfo,
}

/// Execute the narinfo command
pub fn execute(args: StatArgs, fs: &NixCacheFs) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {}", args.path));

    let resolved = fs.narinfo(&args.path)?;
    spinner.clear();

    if args.json {
        let output = NarInfoOutput {
            mirror: resolved.origin.to_string(),
            narinfo: &resolved.narinfo,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let info = &resolved.narinfo;
    ui::key_value(&ctx, "Mirror", &resolved.origin.to_string());
    ui::key_value(&ctx, "StorePath", &info.store_path);
    ui::key_value(&ctx, "URL", &info.url);
    ui::key_value(&ctx, "Compression", &info.compression.to_string());
    if let Some(size) = info.file_size {
        ui::key_value(&ctx, "FileSize", &size.to_string());
    }
    if let Some(hash) = &info.nar_hash {
        ui::key_value(&ctx, "NarHash", hash);
    }
    if let Some(size) = info.nar_size {
        ui::key_value(&ctx, "NarSize", &size.to_string());
    }
    if !info.references.is_empty() {
        ui::key_value(&ctx, "References", &info.references.join(" "));
    }
    if let Some(deriver) = &info.deriver {
        ui::key_value(&ctx, "Deriver", deriver);
    }
    for sig in &info.sigs {
        ui::key_value(&ctx, "Sig", sig);
    }
    for (key, value) in &info.extra {
        ui::key_value(&ctx, key, value);
    }
    Ok(())
}
