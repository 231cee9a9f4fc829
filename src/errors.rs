//! Typed error hierarchy for the stock board.
//!
//! - `DraftError`: add/edit form input that cannot become a card
//! - `SyncError`: remote document fetch/save failures surfaced to the controller
//! - `BoardError`: controller-level failures (state machine, card lookup)

use thiserror::Error;

/// Errors from validating card form input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error("Card title must not be blank")]
    BlankTitle,

    #[error("Please enter a valid price (got '{0}')")]
    InvalidPrice(String),
}

/// Errors from the remote sync gateway.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch board document {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to save board document {key}: {source}")]
    Save {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Board document {key} has unreadable items: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No user is currently signed in")]
    Unauthenticated,
}

/// Errors from the board controller.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board is still loading")]
    NotReady,

    #[error("Board failed to load: {0}. Reload to retry.")]
    LoadFailed(String),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Card {id} not found")]
    CardNotFound { id: String },

    #[error(transparent)]
    InvalidCard(#[from] DraftError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
