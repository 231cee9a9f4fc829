//! Document store abstraction the sync gateway talks to.
//!
//! A store holds JSON documents addressed by `collection/document`, supports
//! whole-document or top-level-merge writes, and pushes the full document to
//! subscribers after every write.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

/// Snapshots retained per document for slow subscribers.
const WATCH_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub collection: String,
    pub document: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document: document.into(),
        }
    }

    /// The single shared board document, `kanban/allItems`.
    pub fn board() -> Self {
        Self::new("kanban", "allItems")
    }
}

impl Default for DocumentKey {
    fn default() -> Self {
        Self::board()
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.document)
    }
}

impl FromStr for DocumentKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, document))
                if !collection.is_empty() && !document.is_empty() && !document.contains('/') =>
            {
                Ok(Self::new(collection, document))
            }
            _ => Err(format!("Invalid document key: {} (expected collection/document)", s)),
        }
    }
}

/// Live feed of one document. Each item is the full document after a write.
pub struct DocumentSubscription {
    key: DocumentKey,
    rx: broadcast::Receiver<Value>,
}

impl DocumentSubscription {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Wait for the next snapshot. `None` once the store has gone away.
    pub async fn next(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(key = %self.key, skipped = n, "document subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Latest pending snapshot without waiting, draining older ones.
    pub fn try_latest(&mut self) -> Option<Value> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(value) => latest = Some(value),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!(key = %self.key, skipped = n, "skipping stale snapshots");
                }
                Err(_) => return latest,
            }
        }
    }
}

/// Per-document fan-out of write notifications.
#[derive(Default)]
pub struct Watchers {
    senders: Mutex<HashMap<DocumentKey, broadcast::Sender<Value>>>,
}

impl Watchers {
    pub fn subscribe(&self, key: &DocumentKey) -> DocumentSubscription {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        let tx = senders
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        DocumentSubscription {
            key: key.clone(),
            rx: tx.subscribe(),
        }
    }

    pub fn notify(&self, key: &DocumentKey, value: &Value) {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = senders.get(key) {
            // No live receivers is fine.
            let _ = tx.send(value.clone());
        }
    }

    pub fn subscriber_count(&self, key: &DocumentKey) -> usize {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.get(key).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

/// Repository interface for shared documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>>;

    /// Write `value`. With `merge`, top-level fields of an existing object
    /// document that `value` does not mention are kept. Returns the stored
    /// document.
    async fn set(&self, key: &DocumentKey, value: Value, merge: bool) -> Result<Value>;

    fn subscribe(&self, key: &DocumentKey) -> DocumentSubscription;

    fn subscriber_count(&self, key: &DocumentKey) -> usize;
}

/// Combine an existing document with an incoming write.
pub fn merge_documents(existing: Option<Value>, incoming: Value, merge: bool) -> Value {
    match (merge, existing, incoming) {
        (true, Some(Value::Object(mut base)), Value::Object(fields)) => {
            for (name, value) in fields {
                base.insert(name, value);
            }
            Value::Object(base)
        }
        (_, _, incoming) => incoming,
    }
}

/// Process-local store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<DocumentKey, Value>>,
    watchers: Watchers,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(key: DocumentKey, value: Value) -> Self {
        let mut docs = HashMap::new();
        docs.insert(key, value);
        Self {
            docs: RwLock::new(docs),
            watchers: Watchers::default(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn set(&self, key: &DocumentKey, value: Value, merge: bool) -> Result<Value> {
        let stored = {
            let mut docs = self.docs.write().await;
            let merged = merge_documents(docs.remove(key), value, merge);
            docs.insert(key.clone(), merged.clone());
            merged
        };
        self.watchers.notify(key, &stored);
        Ok(stored)
    }

    fn subscribe(&self, key: &DocumentKey) -> DocumentSubscription {
        self.watchers.subscribe(key)
    }

    fn subscriber_count(&self, key: &DocumentKey) -> usize {
        self.watchers.subscriber_count(key)
    }
}
