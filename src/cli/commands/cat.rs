//! Cat command - stream a file to stdout

use crate::cli::args::PathArgs;
use crate::error::{CacheFsError, CacheFsResult};
use crate::fs::{Filesystem, NixCacheFs};
use crate::ui::{TaskSpinner, UiContext};
use std::io::{self, Write};

/// Execute the cat command
pub fn execute(args: PathArgs, fs: &NixCacheFs) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}", args.path));

    let mut file = fs.open(&args.path)?;
    spinner.clear();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match io::copy(&mut file, &mut out).and_then(|_| out.flush()) {
        Ok(()) => {}
        // `nix-cachefs cat ... | head` closes the pipe early
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => return Err(CacheFsError::io(format!("writing {} to stdout", args.path), e)),
    }

    file.close()
}
