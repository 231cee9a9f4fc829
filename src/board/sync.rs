//! Remote sync gateway for the shared board document.
//!
//! The whole board is one document, `{ "items": [Card, ...] }`. Reads return
//! the list verbatim, writes overwrite the `items` field wholesale with a
//! top-level merge, and there is no revision check: the last save wins.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::auth::AuthProvider;
use super::models::Card;
use super::store::{DocumentKey, DocumentStore, DocumentSubscription};
use crate::errors::SyncError;

#[derive(Clone)]
pub struct SyncGateway {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    key: DocumentKey,
}

impl SyncGateway {
    pub fn new(store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            store,
            auth,
            key: DocumentKey::board(),
        }
    }

    pub fn with_key(mut self, key: DocumentKey) -> Self {
        self.key = key;
        self
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Read the full card list. A missing document or `items` field is empty.
    pub async fn fetch_all(&self) -> Result<Vec<Card>, SyncError> {
        let doc = self.store.get(&self.key).await.map_err(|source| SyncError::Fetch {
            key: self.key.to_string(),
            source,
        })?;
        let cards = decode_items(&self.key, doc.as_ref())?;
        debug!(key = %self.key, count = cards.len(), "fetched board document");
        Ok(cards)
    }

    /// Live feed of the card list. Every write, including our own saves, is delivered.
    pub fn subscribe(&self) -> CardSubscription {
        CardSubscription {
            inner: self.store.subscribe(&self.key),
        }
    }

    /// Overwrite the remote card list. Requires a signed-in user.
    pub async fn save_all(&self, cards: &[Card]) -> Result<(), SyncError> {
        if self.auth.current_user().is_none() {
            return Err(SyncError::Unauthenticated);
        }
        let body = json!({ "items": cards });
        self.store
            .set(&self.key, body, true)
            .await
            .map_err(|source| SyncError::Save {
                key: self.key.to_string(),
                source,
            })?;
        info!(key = %self.key, count = cards.len(), "saved board document");
        Ok(())
    }
}

/// Decode the `items` field of a board document. `null` or absent is empty.
pub fn decode_items(key: &DocumentKey, doc: Option<&Value>) -> Result<Vec<Card>, SyncError> {
    let items = match doc.and_then(|d| d.get("items")) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(items) => items,
    };
    Vec::<Card>::deserialize(items).map_err(|source| SyncError::Decode {
        key: key.to_string(),
        source,
    })
}

/// Handle on the live card feed. Dropping it also releases the channel.
pub struct CardSubscription {
    inner: DocumentSubscription,
}

impl CardSubscription {
    pub async fn next(&mut self) -> Option<Result<Vec<Card>, SyncError>> {
        let doc = self.inner.next().await?;
        Some(decode_items(self.inner.key(), Some(&doc)))
    }

    /// Newest snapshot already delivered, without waiting.
    pub fn try_latest(&mut self) -> Option<Result<Vec<Card>, SyncError>> {
        let doc = self.inner.try_latest()?;
        Some(decode_items(self.inner.key(), Some(&doc)))
    }

    pub fn unsubscribe(self) {
        debug!(key = %self.inner.key(), "board subscription closed");
    }
}
