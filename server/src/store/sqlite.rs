// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! SQLite-backed block store.
//!
//! One table keyed by the namespaced storage key. All statements share one
//! connection behind a mutex, so operations within a process run one at a
//! time; each is a single-row upsert, lookup or range delete and holds the
//! lock briefly. WAL keeps other processes reading the same file while this
//! one writes. Blocking calls run on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use super::{BlockHit, BlockStore};
use crate::identity::BlockKey;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    key        TEXT PRIMARY KEY,
    kind       TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    last_seen  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS blocks_expires_at ON blocks (expires_at);
";

const UPSERT_SQL: &str = "
INSERT INTO blocks (key, kind, expires_at, last_seen)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(key) DO UPDATE SET
    kind       = excluded.kind,
    expires_at = excluded.expires_at,
    last_seen  = excluded.last_seen
";

const LOOKUP_SQL: &str = "SELECT expires_at FROM blocks WHERE key = ?1 AND expires_at > ?2";

const CLEANUP_SQL: &str = "DELETE FROM blocks WHERE expires_at <= ?1";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite database {}", path.display()))?;

        let journal = Self::initialize(&conn)?;
        info!(path = %path.display(), %journal, "block table ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(conn: &Connection) -> Result<String> {
        let journal: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("enable WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("set synchronous")?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set busy timeout")?;
        conn.execute_batch(SCHEMA_SQL).context("create blocks table")?;
        Ok(journal)
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("sqlite connection mutex poisoned"))?;
            f(&mut guard).with_context(|| format!("sqlite {op}"))
        })
        .await
        .with_context(|| format!("sqlite {op} task"))?
    }
}

#[async_trait]
impl BlockStore for SqliteStore {
    async fn check(&self, keys: &[BlockKey], now: i64) -> Result<Option<BlockHit>> {
        let keys = keys.to_vec();
        self.with_conn("check", move |conn| {
            let mut stmt = conn.prepare_cached(LOOKUP_SQL)?;
            for key in keys {
                let expires_at: Option<i64> = stmt
                    .query_row(params![key.storage_key(), now], |row| row.get(0))
                    .optional()?;
                if let Some(expires_at) = expires_at {
                    return Ok(Some(BlockHit { key, expires_at }));
                }
            }
            Ok(None)
        })
        .await
    }

    async fn mark(&self, keys: &[BlockKey], expires_at: i64, now: i64) -> Result<()> {
        let keys = keys.to_vec();
        self.with_conn("mark", move |conn| {
            let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
            for key in &keys {
                stmt.execute(params![key.storage_key(), key.kind().tag(), expires_at, now])?;
                debug!(%key, expires_at, "marked (sqlite)");
            }
            Ok(())
        })
        .await
    }

    async fn cleanup_expired(&self, now: i64) -> Result<usize> {
        self.with_conn("cleanup", move |conn| {
            conn.prepare_cached(CLEANUP_SQL)?.execute(params![now])
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
