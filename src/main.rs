//! nix-cachefs - Nix binary cache browser
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use nix_cachefs::cli::{commands, Cli, Commands};
use nix_cachefs::config::ConfigManager;
use nix_cachefs::error::CacheFsResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> CacheFsResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load()?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Loaded configuration from {}", config_manager.path().display());

    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config, &config_manager);
    }

    let fs = commands::build_fs(&cli.mirrors, &config)?;

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Cat(args) => commands::cat(args, &fs),
        Commands::Ls(args) => commands::ls(args, &fs),
        Commands::Stat(args) => commands::stat(args, &fs),
        Commands::StoreDir => commands::store_dir(&fs),
        Commands::Narinfo(args) => commands::narinfo(args, &fs),
        Commands::Hash(args) => commands::hash(args, &fs),
    }
}

/// `RUST_LOG` if set, else 0 = warn, 1 = info, 2+ = debug; always on stderr
fn init_logging(verbose: u8, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("nix_cachefs=warn"),
        1 => EnvFilter::new("nix_cachefs=info"),
        _ => EnvFilter::new("nix_cachefs=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
