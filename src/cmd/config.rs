//! Configuration view and validation commands: `stockboard config`.

use std::path::Path;

use anyhow::{Result, bail};
use console::style;

use stockboard::board::controller::RemoteUpdatePolicy;
use stockboard::config::{CONFIG_FILE, CliOverrides, StockboardToml};

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let default_path = project_dir.join(CONFIG_FILE);
    let path = config_path.unwrap_or(&default_path);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", style("Stockboard Configuration").bold().cyan());
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No {} found at {}; using defaults", CONFIG_FILE, path.display());
            }
            println!();

            let config = StockboardToml::resolve(project_dir, config_path, overrides)?;
            print_effective(&config, project_dir);
        }
        Some(ConfigCommands::Validate) => {
            if !path.exists() && config_path.is_some() {
                bail!("Config file {} does not exist", path.display());
            }
            let config = StockboardToml::resolve(project_dir, config_path, overrides)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid", style("✓").green());
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  {} {}", style("⚠").yellow(), warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            StockboardToml::default().save(path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}

fn print_effective(config: &StockboardToml, project_dir: &Path) {
    println!("Effective values (with env/CLI overrides):");
    println!("[store]");
    println!("  db_path = \"{}\"", config.db_path(project_dir).display());
    println!("  document = \"{}\"", config.document_key());
    println!("[server]");
    println!("  host = \"{}\"", config.server.host);
    println!("  port = {}", config.server.port);
    println!("  dev_mode = {}", config.server.dev_mode);
    println!("[board]");
    println!("  default_category = \"{}\"", config.board.default_category);
    println!(
        "  remote_updates = \"{}\"",
        match config.board.remote_updates {
            RemoteUpdatePolicy::Replace => "replace",
            RemoteUpdatePolicy::Warn => "warn",
        }
    );
    println!("  distance_offset = {}", config.board.distance_offset);
    println!("  row_height = {}", config.board.row_height);
    println!("[user]");
    match config.user_stamp() {
        Some(user) => println!("  uid = \"{}\" ({})", user.uid, user.label()),
        None => println!("  {}", style("(signed out; saves will be refused)").dim()),
    }
    println!("[logging]");
    println!("  level = \"{}\"", config.logging.level);
    println!("  json = {}", config.logging.json);
    if let Some(dir) = &config.logging.dir {
        println!("  dir = \"{}\"", dir.display());
    }
    println!();
}
