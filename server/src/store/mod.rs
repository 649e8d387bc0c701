// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Block-key storage.
//!
//! A store maps [`BlockKey`] to an expiry instant. Entries whose expiry is
//! at or before `now` are logically absent: `check` never reports them and
//! `cleanup_expired` may reclaim them at any time. Callers pass `now`
//! explicitly so every operation of one gate reads the same clock.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::identity::BlockKey;

mod memory;
mod redis_store;
mod sqlite;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;

/// A live entry found by [`BlockStore::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHit {
    pub key: BlockKey,
    pub expires_at: i64,
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Returns the first key in `keys` (in the given order) whose entry
    /// expires strictly after `now`.
    async fn check(&self, keys: &[BlockKey], now: i64) -> Result<Option<BlockHit>>;

    /// Inserts every key or refreshes it to `expires_at`, recording `now`
    /// as `last_seen`. Each key is written atomically; the set as a whole
    /// need not be.
    async fn mark(&self, keys: &[BlockKey], expires_at: i64, now: i64) -> Result<()>;

    /// Deletes entries with `expires_at <= now` and returns how many went.
    async fn cleanup_expired(&self, now: i64) -> Result<usize>;

    fn backend_name(&self) -> &'static str;
}

//
// ─── FACTORY ─────────────────────────────────────────────────────────
//
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite(PathBuf),
    InMemory,
    Redis(String),
}

impl fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite(path) => f.debug_tuple("Sqlite").field(path).finish(),
            StoreBackend::InMemory => f.write_str("InMemory"),
            StoreBackend::Redis(url) => f.debug_tuple("Redis").field(&redact_url(url)).finish(),
        }
    }
}

/// `url` with any userinfo (`user:password@`) replaced by `***`, for logs.
pub fn redact_url(url: &str) -> String {
    let (prefix, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (format!("{scheme}://"), rest),
        None => (String::new(), url),
    };
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{prefix}***{}", &rest[at..]),
        None => url.to_string(),
    }
}

impl StoreBackend {
    pub async fn build(self) -> Result<Arc<dyn BlockStore>> {
        match self {
            StoreBackend::Sqlite(path) => {
                info!(path = %path.display(), "using SQLite block store");
                Ok(Arc::new(SqliteStore::open(&path)?))
            }
            StoreBackend::InMemory => {
                warn!("using in-memory block store; blocks are lost on restart");
                Ok(Arc::new(InMemoryStore::default()))
            }
            StoreBackend::Redis(url) => {
                info!(url = %redact_url(&url), "using Redis block store");
                Ok(Arc::new(RedisStore::new(&url)?))
            }
        }
    }
}
