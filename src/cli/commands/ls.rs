//! Ls command - list a directory

use crate::archive::{EntryKind, FileInfo};
use crate::cli::args::LsArgs;
use crate::error::CacheFsResult;
use crate::fs::{Filesystem, NixCacheFs};
use crate::ui::{TaskSpinner, UiContext};
use console::style;

/// Execute the ls command
pub fn execute(args: LsArgs, fs: &NixCacheFs) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}", args.path));

    let entries = fs.read_dir(&args.path)?;
    spinner.clear();

    for entry in &entries {
        if args.long {
            println!("{}", long_line(entry));
        } else {
            println!("{}", styled_name(entry));
        }
    }
    Ok(())
}

fn long_line(entry: &FileInfo) -> String {
    format!(
        "{} {:>10} {}",
        entry.mode_string(),
        entry.size,
        styled_name(entry)
    )
}

fn styled_name(entry: &FileInfo) -> String {
    match entry.kind {
        EntryKind::Directory => style(&entry.name).blue().bold().to_string(),
        EntryKind::Symlink => style(&entry.name).cyan().to_string(),
        EntryKind::File if entry.mode & 0o111 != 0 => style(&entry.name).green().to_string(),
        EntryKind::File => entry.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_line_layout() {
        console::set_colors_enabled(false);
        let entry = FileInfo {
            name: "hello".to_string(),
            size: 1234,
            mode: 0o555,
            kind: EntryKind::File,
        };
        assert_eq!(long_line(&entry), "-r-xr-xr-x       1234 hello");
    }
}
