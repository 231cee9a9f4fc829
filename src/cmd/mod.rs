//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                   |
//! |-----------|----------------------------------------------------|
//! | `serve`   | `Serve`, `Init`                                    |
//! | `board`   | `Board`, `Add`, `Edit`, `Move`, `Delete`, `Seed`   |
//! | `config`  | `Config`                                           |

use std::path::PathBuf;

use stockboard::config::StockboardToml;

pub mod board;
pub mod config;
pub mod serve;

pub use board::{cmd_add, cmd_board, cmd_delete, cmd_edit, cmd_move, cmd_seed};
pub use config::cmd_config;
pub use serve::{cmd_init, cmd_serve};

/// Resolved configuration shared by every command.
pub struct Context {
    pub project_dir: PathBuf,
    pub config: StockboardToml,
}

impl Context {
    pub fn db_path(&self) -> PathBuf {
        self.config.db_path(&self.project_dir)
    }
}
