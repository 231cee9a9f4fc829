//! Server and project setup commands: `stockboard serve`, `stockboard init`.

use anyhow::{Context as _, Result};
use console::style;
use serde_json::json;
use tracing::info;

use stockboard::board::db::SqliteDocumentStore;
use stockboard::board::server::start_server;
use stockboard::board::store::DocumentStore;
use stockboard::config::CONFIG_FILE;

use super::Context;

pub async fn cmd_serve(ctx: &Context) -> Result<()> {
    let warnings = ctx.config.validate();
    for warning in &warnings {
        eprintln!("{} {}", style("warning:").yellow(), warning);
    }
    start_server(ctx.config.server_config(&ctx.project_dir)).await
}

pub async fn cmd_init(ctx: &Context, force: bool) -> Result<()> {
    let config_path = ctx.project_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        println!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    } else {
        ctx.config.save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let db_path = ctx.db_path();
    let store = SqliteDocumentStore::open(&db_path)
        .with_context(|| format!("Failed to open board database {}", db_path.display()))?;
    let key = ctx.config.document_key();
    if store.get(&key).await?.is_none() {
        store.set(&key, json!({ "items": [] }), false).await?;
        info!(key = %key, "created empty board document");
        println!("Created empty board {} in {}", key, db_path.display());
    } else {
        println!("Board {} already present in {}", key, db_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Set [user] uid in {} (or pass --user)", CONFIG_FILE);
    println!("  2. Run `stockboard seed` to add demo cards");
    println!("  3. Run `stockboard serve` to share the board");
    println!("  {}", style("Open http://127.0.0.1:3150/api/board to check it").dim());
    Ok(())
}
