//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// nix-cachefs - browse a Nix binary cache as a read-only filesystem
///
/// Paths look like `/nix/store/<hash>-<name>[/path/inside]`. Each command
/// fetches the store path's archive from the first mirror that has it.
#[derive(Parser, Debug)]
#[command(name = "nix-cachefs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NIX_CACHEFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Mirror URL, highest priority first (replaces configured mirrors)
    ///
    /// Must come before the subcommand; repeat for more mirrors.
    #[arg(short, long = "mirror")]
    pub mirrors: Vec<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a file from the cache to stdout
    Cat(PathArgs),

    /// List a directory
    Ls(LsArgs),

    /// Show file metadata
    Stat(StatArgs),

    /// Print the store directory advertised by the first mirror
    StoreDir,

    /// Show the narinfo record behind a path
    Narinfo(StatArgs),

    /// Print the SHA-256 digest of a file
    Hash(PathArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// A single store path argument
#[derive(Parser, Debug)]
pub struct PathArgs {
    /// Path under the store directory
    pub path: String,
}

/// Arguments for the ls command
#[derive(Parser, Debug)]
pub struct LsArgs {
    /// Directory under the store directory
    pub path: String,

    /// Show mode and size for each entry
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for commands that can emit JSON
#[derive(Parser, Debug)]
pub struct StatArgs {
    /// Path under the store directory
    pub path: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_cat() {
        let cli = Cli::parse_from(["nix-cachefs", "cat", "/nix/store/abc-hello/bin/hello"]);
        match cli.command {
            Commands::Cat(args) => assert_eq!(args.path, "/nix/store/abc-hello/bin/hello"),
            _ => panic!("expected Cat command"),
        }
    }

    #[test]
    fn cli_parses_ls_long() {
        let cli = Cli::parse_from(["nix-cachefs", "ls", "-l", "/nix/store/abc-hello"]);
        match cli.command {
            Commands::Ls(args) => assert!(args.long),
            _ => panic!("expected Ls command"),
        }
    }

    #[test]
    fn cli_parses_repeated_mirrors() {
        let cli = Cli::parse_from([
            "nix-cachefs",
            "--mirror",
            "https://a.example",
            "-m",
            "https://b.example",
            "stat",
            "--json",
            "/nix/store/abc-hello",
        ]);
        assert_eq!(cli.mirrors, ["https://a.example", "https://b.example"]);
        match cli.command {
            Commands::Stat(args) => assert!(args.json),
            _ => panic!("expected Stat command"),
        }
    }

    #[test]
    fn mirror_after_subcommand_is_rejected() {
        let result = Cli::try_parse_from([
            "nix-cachefs",
            "-m",
            "https://a.example",
            "stat",
            "-m",
            "https://b.example",
            "/nix/store/abc-hello",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["nix-cachefs", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force }),
            }) => assert!(force),
            _ => panic!("expected Config init command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["nix-cachefs", "store-dir"]);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.command, Commands::StoreDir));

        let cli = Cli::parse_from(["nix-cachefs", "-v", "store-dir"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["nix-cachefs", "-vv", "store-dir"]);
        assert_eq!(cli.verbose, 2);
    }
}
