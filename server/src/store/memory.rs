// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BlockHit, BlockStore};
use crate::identity::BlockKey;

#[derive(Debug, Clone, Copy)]
struct Entry {
    expires_at: i64,
    last_seen: i64,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    map: Arc<RwLock<HashMap<BlockKey, Entry>>>,
}

impl InMemoryStore {
    /// Number of rows, expired ones included.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }

    pub async fn expires_at(&self, key: &BlockKey) -> Option<i64> {
        self.map.read().await.get(key).map(|e| e.expires_at)
    }

    /// When `key` was last marked.
    pub async fn last_seen(&self, key: &BlockKey) -> Option<i64> {
        self.map.read().await.get(key).map(|e| e.last_seen)
    }
}

#[async_trait]
impl BlockStore for InMemoryStore {
    async fn check(&self, keys: &[BlockKey], now: i64) -> Result<Option<BlockHit>> {
        let map = self.map.read().await;
        let hit = keys.iter().find_map(|key| {
            map.get(key)
                .filter(|e| e.expires_at > now)
                .map(|e| BlockHit {
                    key: key.clone(),
                    expires_at: e.expires_at,
                })
        });
        Ok(hit)
    }

    async fn mark(&self, keys: &[BlockKey], expires_at: i64, now: i64) -> Result<()> {
        let mut map = self.map.write().await;
        for key in keys {
            map.insert(
                key.clone(),
                Entry {
                    expires_at,
                    last_seen: now,
                },
            );
            debug!(%key, expires_at, "marked (in-memory)");
        }
        Ok(())
    }

    async fn cleanup_expired(&self, now: i64) -> Result<usize> {
        let mut map = self.map.write().await;
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        Ok(before - map.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
