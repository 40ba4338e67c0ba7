//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::CacheFsResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> CacheFsResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force)?,
    }

    Ok(())
}

fn show_config(config: &Config) -> CacheFsResult<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn init_config(manager: &ConfigManager, force: bool) -> CacheFsResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    let mut config = Config::default();
    config.cache.persistent_dir = Some(ConfigManager::default_cache_dir());
    manager.save(&config)?;

    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}
