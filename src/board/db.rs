use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::warn;

use super::store::{DocumentKey, DocumentStore, DocumentSubscription, Watchers, merge_documents};

/// Async-safe handle to the document database.
///
/// Wraps `DocumentDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<DocumentDb>>,
}

impl DbHandle {
    pub fn new(db: DocumentDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut DocumentDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&mut guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct DocumentDb {
    conn: Connection,
    /// `PRAGMA data_version` at the last external-change scan.
    data_version: Option<i64>,
    /// Last body seen per document, by this connection or a scan.
    seen: HashMap<DocumentKey, Value>,
}

impl DocumentDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self {
            conn,
            data_version: None,
            seen: HashMap::new(),
        };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            data_version: None,
            seen: HashMap::new(),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS documents (
                    collection TEXT NOT NULL,
                    document TEXT NOT NULL,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (collection, document)
                );
                ",
            )
            .context("Failed to create documents table")?;
        Ok(())
    }

    pub fn get_document(&self, key: &DocumentKey) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND document = ?2",
                params![key.collection, key.document],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query document")?;
        body.map(|b| {
            serde_json::from_str(&b).with_context(|| format!("Document {} is not valid JSON", key))
        })
        .transpose()
    }

    /// Read-modify-write under the connection lock. Returns the stored body.
    pub fn put_document(&mut self, key: &DocumentKey, value: Value, merge: bool) -> Result<Value> {
        let existing = if merge { self.get_document(key)? } else { None };
        let stored = merge_documents(existing, value, merge);
        let body = serde_json::to_string(&stored).context("Failed to serialize document")?;
        self.conn
            .execute(
                "INSERT INTO documents (collection, document, body, updated_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(collection, document)
                 DO UPDATE SET body = excluded.body, updated_at = datetime('now')",
                params![key.collection, key.document, body],
            )
            .context("Failed to upsert document")?;
        self.seen.insert(key.clone(), stored.clone());
        Ok(stored)
    }

    /// Documents committed by other connections since the previous scan.
    ///
    /// The first scan only records a baseline and reports nothing. Writes
    /// made through this connection never show up here.
    pub fn external_changes(&mut self) -> Result<Vec<(DocumentKey, Value)>> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
            .context("Failed to read data_version")?;
        if self.data_version == Some(version) {
            return Ok(Vec::new());
        }
        let baseline = self.data_version.is_none();
        self.data_version = Some(version);

        let mut changed = Vec::new();
        for (key, body) in self.all_documents()? {
            if self.seen.get(&key) == Some(&body) {
                continue;
            }
            self.seen.insert(key.clone(), body.clone());
            if !baseline {
                changed.push((key, body));
            }
        }
        Ok(changed)
    }

    fn all_documents(&self) -> Result<Vec<(DocumentKey, Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT collection, document, body FROM documents")
            .context("Failed to prepare document scan")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    DocumentKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    row.get::<_, String>(2)?,
                ))
            })
            .context("Failed to scan documents")?;

        let mut documents = Vec::new();
        for row in rows {
            let (key, body) = row.context("Failed to read document row")?;
            match serde_json::from_str(&body) {
                Ok(value) => documents.push((key, value)),
                Err(e) => warn!(key = %key, error = %e, "skipping document with invalid JSON"),
            }
        }
        Ok(documents)
    }
}

/// Durable document store on SQLite with in-process push notifications.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: DbHandle,
    watchers: Arc<Watchers>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_db(DocumentDb::new(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_db(DocumentDb::new_in_memory()?))
    }

    pub fn from_db(db: DocumentDb) -> Self {
        Self {
            db: DbHandle::new(db),
            watchers: Arc::new(Watchers::default()),
        }
    }

    /// Pick up writes other processes made to the database file and notify
    /// this store's subscribers. Returns the changed documents.
    pub async fn sync_external_writes(&self) -> Result<Vec<(DocumentKey, Value)>> {
        let changed = self.db.call(|db| db.external_changes()).await?;
        for (key, body) in &changed {
            self.watchers.notify(key, body);
        }
        Ok(changed)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>> {
        let key = key.clone();
        self.db.call(move |db| db.get_document(&key)).await
    }

    async fn set(&self, key: &DocumentKey, value: Value, merge: bool) -> Result<Value> {
        let owned = key.clone();
        let stored = self
            .db
            .call(move |db| db.put_document(&owned, value, merge))
            .await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = DocumentDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = 'documents'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 1);
        Ok(())
    }

    #[test]
    fn test_put_and_merge_document() -> Result<()> {
        let mut db = DocumentDb::new_in_memory()?;
        let key = DocumentKey::board();
        assert!(db.get_document(&key)?.is_none());

        db.put_document(&key, json!({"items": [], "owner": "kitchen"}), false)?;
        let stored = db.put_document(&key, json!({"items": [{"id": "1"}]}), true)?;
        assert_eq!(stored, json!({"items": [{"id": "1"}], "owner": "kitchen"}));
        assert_eq!(db.get_document(&key)?, Some(stored));

        db.put_document(&key, json!({"items": []}), false)?;
        assert_eq!(db.get_document(&key)?, Some(json!({"items": []})));

        Ok(())
    }

    #[test]
    fn test_documents_survive_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("board.db");
        {
            let mut db = DocumentDb::new(&path)?;
            db.put_document(&DocumentKey::board(), json!({"items": [1, 2]}), true)?;
        }
        let db = DocumentDb::new(&path)?;
        assert_eq!(
            db.get_document(&DocumentKey::board())?,
            Some(json!({"items": [1, 2]}))
        );
        Ok(())
    }

    #[test]
    fn test_external_changes_see_other_connections_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.db");
        let key = DocumentKey::board();
        let mut server = DocumentDb::new(&path)?;
        let mut other = DocumentDb::new(&path)?;

        other.put_document(&key, json!({"items": [1]}), false)?;
        assert!(server.external_changes()?.is_empty());

        server.put_document(&key, json!({"items": [2]}), false)?;
        assert!(server.external_changes()?.is_empty());

        other.put_document(&key, json!({"items": [3]}), false)?;
        other.put_document(&DocumentKey::new("kanban", "archive"), json!({"items": []}), false)?;
        let mut changed = server.external_changes()?;
        changed.sort_by_key(|(key, _)| key.to_string());
        assert_eq!(
            changed,
            vec![
                (DocumentKey::new("kanban", "allItems"), json!({"items": [3]})),
                (DocumentKey::new("kanban", "archive"), json!({"items": []})),
            ]
        );
        assert!(server.external_changes()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_external_writes_reach_subscribers() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.db");
        let key = DocumentKey::board();
        let server = SqliteDocumentStore::open(&path)?;
        assert!(server.sync_external_writes().await?.is_empty());
        let mut sub = server.subscribe(&key);

        let cli = SqliteDocumentStore::open(&path)?;
        cli.set(&key, json!({"items": []}), true).await?;

        let changed = server.sync_external_writes().await?;
        assert_eq!(changed, vec![(key.clone(), json!({"items": []}))]);
        assert_eq!(sub.next().await, Some(json!({"items": []})));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_store_notifies_subscribers() -> Result<()> {
        let store = SqliteDocumentStore::in_memory()?;
        let key = DocumentKey::board();
        let mut sub = store.subscribe(&key);

        store.set(&key, json!({"items": []}), true).await?;
        assert_eq!(sub.next().await, Some(json!({"items": []})));
        assert_eq!(store.get(&key).await?, Some(json!({"items": []})));
        Ok(())
    }
}
