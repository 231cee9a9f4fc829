use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stockboard::config::{CliOverrides, StockboardToml};

mod cmd;

#[derive(Parser)]
#[command(name = "stockboard")]
#[command(version, about = "Shared stock Kanban board")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Config file (defaults to stockboard.toml in the project directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Board database path. Overrides stockboard.toml and STOCKBOARD_DB_PATH.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Acting user id. Overrides [user] uid and STOCKBOARD_USER_UID.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP/WebSocket board server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (CORS permissive, listen on all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// Create stockboard.toml and an empty board database
    Init {
        /// Overwrite an existing stockboard.toml
        #[arg(long)]
        force: bool,
    },
    /// Show the board
    Board {
        /// Category tab to show (defaults to [board] default_category)
        #[arg(short, long)]
        category: Option<String>,

        /// Title search across all categories
        #[arg(short, long)]
        search: Option<String>,

        /// Print the board view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a card and save
    Add {
        title: String,

        #[arg(short, long)]
        price: String,

        #[arg(long, default_value = "inStock")]
        column: String,

        #[arg(short, long)]
        category: Option<String>,
    },
    /// Edit a card's title, price or category and save
    Edit {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        price: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },
    /// Move a card to a column, optionally before another card, and save
    Move {
        id: String,

        /// Target column
        #[arg(long)]
        to: String,

        /// Insert before this card id (default: end of column)
        #[arg(long)]
        before: Option<String>,
    },
    /// Delete a card and save
    Delete { id: String },
    /// Fill the board with dummy cards
    Seed {
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Keep existing cards instead of replacing them
        #[arg(long)]
        append: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default stockboard.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let (port, dev_mode) = match &cli.command {
        Commands::Serve { port, dev } => (*port, *dev),
        _ => (None, false),
    };
    let overrides = CliOverrides {
        db_path: cli.db_path.clone(),
        port,
        dev_mode,
        user: cli.user.clone(),
        log_level: cli.verbose.then(|| "debug".to_string()),
    };

    // `config` reads the file per subcommand, so `config init` works without one.
    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&project_dir, cli.config.as_deref(), &overrides, command.clone());
    }

    // `init --force` rewrites the file, so a broken one must not stop it.
    let config = match &cli.command {
        Commands::Init { force: true } => StockboardToml::resolve_defaults(&overrides)?,
        _ => StockboardToml::resolve(&project_dir, cli.config.as_deref(), &overrides)?,
    };
    let _log_guard = stockboard::logging::init(
        &config.logging.level,
        cli.log_json || config.logging.json,
        config.logging.dir.as_deref(),
    )?;
    let ctx = cmd::Context {
        project_dir,
        config,
    };

    match cli.command {
        Commands::Serve { .. } => cmd::cmd_serve(&ctx).await?,
        Commands::Init { force } => cmd::cmd_init(&ctx, force).await?,
        Commands::Board {
            category,
            search,
            json,
        } => cmd::cmd_board(&ctx, category.as_deref(), search.as_deref(), json).await?,
        Commands::Add {
            title,
            price,
            column,
            category,
        } => cmd::cmd_add(&ctx, &title, &price, &column, category.as_deref()).await?,
        Commands::Edit {
            id,
            title,
            price,
            category,
        } => {
            cmd::cmd_edit(&ctx, &id, title.as_deref(), price.as_deref(), category.as_deref())
                .await?
        }
        Commands::Move { id, to, before } => cmd::cmd_move(&ctx, &id, &to, before.as_deref()).await?,
        Commands::Delete { id } => cmd::cmd_delete(&ctx, &id).await?,
        Commands::Seed { count, append } => cmd::cmd_seed(&ctx, count, append).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
