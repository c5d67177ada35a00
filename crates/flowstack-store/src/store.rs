use std::path::Path;
use std::sync::Mutex;

use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use flowstack_core::error::{FlowstackError, Result};
use flowstack_core::traits::StackStore;
use flowstack_core::types::StackRecord;

use crate::blocks::{normalize_blocks, parse_blocks};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stacks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        blocks TEXT NOT NULL
    );";

/// SQLite-backed stack store.
pub struct SqliteStackStore {
    conn: Mutex<Connection>,
}

impl SqliteStackStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowstackError::Database(format!("Failed to create db directory: {e}")))?;
        }

        let conn =
            Connection::open(path).map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| FlowstackError::Database(e.to_string()))?;

        debug!(path = %path.display(), "Stack store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| FlowstackError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StackStore for SqliteStackStore {
    fn create(
        &self,
        name: &str,
        blocks: serde_json::Value,
    ) -> BoxFuture<'_, Result<StackRecord>> {
        let name = name.to_string();

        Box::pin(async move {
            let normalized = serde_json::Value::Object(normalize_blocks(blocks));
            let text = serde_json::to_string(&normalized)?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            conn.execute(
                "INSERT INTO stacks (name, blocks) VALUES (?1, ?2)",
                params![name, text],
            )
            .map_err(|e| FlowstackError::Database(e.to_string()))?;
            let id = conn.last_insert_rowid();

            debug!(id, name = %name, "Stack created");
            Ok(StackRecord {
                id,
                name,
                blocks: normalized,
            })
        })
    }

    fn get(&self, id: i64) -> BoxFuture<'_, Result<StackRecord>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let row = conn
                .query_row(
                    "SELECT name, blocks FROM stacks WHERE id = ?1",
                    params![id],
                    |row| {
                        let name: String = row.get(0)?;
                        let blocks: String = row.get(1)?;
                        Ok((name, blocks))
                    },
                )
                .optional()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            match row {
                Some((name, blocks)) => Ok(StackRecord {
                    id,
                    name,
                    blocks: parse_blocks(&blocks),
                }),
                None => Err(FlowstackError::StackNotFound(id)),
            }
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<StackRecord>>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare("SELECT id, name, blocks FROM stacks ORDER BY id ASC")
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let name: String = row.get(1)?;
                    let blocks: String = row.get(2)?;
                    Ok((id, name, blocks))
                })
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let (id, name, blocks) =
                    row.map_err(|e| FlowstackError::Database(e.to_string()))?;
                records.push(StackRecord {
                    id,
                    name,
                    blocks: parse_blocks(&blocks),
                });
            }

            Ok(records)
        })
    }

    fn update(
        &self,
        id: i64,
        name: &str,
        blocks: serde_json::Value,
    ) -> BoxFuture<'_, Result<StackRecord>> {
        let name = name.to_string();

        Box::pin(async move {
            let normalized = serde_json::Value::Object(normalize_blocks(blocks));
            let text = serde_json::to_string(&normalized)?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            let changed = conn
                .execute(
                    "UPDATE stacks SET name = ?1, blocks = ?2 WHERE id = ?3",
                    params![name, text, id],
                )
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(FlowstackError::StackNotFound(id));
            }

            debug!(id, name = %name, "Stack updated");
            Ok(StackRecord {
                id,
                name,
                blocks: normalized,
            })
        })
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            let changed = conn
                .execute("DELETE FROM stacks WHERE id = ?1", params![id])
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(FlowstackError::StackNotFound(id));
            }

            debug!(id, "Stack deleted");
            Ok(())
        })
    }
}
