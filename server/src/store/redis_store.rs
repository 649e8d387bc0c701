// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Redis-backed block store for deployments that run several gate
//! processes against one shared state.
//!
//! Each key holds its own `expires_at` (unix ms) and carries a matching
//! `PXAT`, so Redis reclaims dead rows itself and `cleanup_expired` has
//! nothing to do.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tracing::{debug, warn};

use super::{redact_url, BlockHit, BlockStore};
use crate::identity::BlockKey;

const KEY_PREFIX: &str = "codgate:block:";

pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Validates the URL; no connection is made until first use.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("open redis @ {}", redact_url(url)))?;
        Ok(Self { client })
    }

    fn redis_key(key: &BlockKey) -> String {
        format!("{KEY_PREFIX}{}", key.storage_key())
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        let mut backoff_ms = 50u64;
        let mut attempt = 1;
        loop {
            match self.client.get_multiplexed_tokio_connection().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < 3 => {
                    warn!(attempt, "redis connect failed: {e}; retrying in {backoff_ms}ms");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e).context("connect redis"),
            }
        }
    }
}

#[async_trait]
impl BlockStore for RedisStore {
    async fn check(&self, keys: &[BlockKey], now: i64) -> Result<Option<BlockHit>> {
        let mut conn = self.get_conn().await?;
        for key in keys {
            let expires_at: Option<i64> = conn
                .get(Self::redis_key(key))
                .await
                .context("redis GET")?;
            if let Some(expires_at) = expires_at.filter(|exp| *exp > now) {
                return Ok(Some(BlockHit {
                    key: key.clone(),
                    expires_at,
                }));
            }
        }
        Ok(None)
    }

    async fn mark(&self, keys: &[BlockKey], expires_at: i64, _now: i64) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("SET")
                .arg(Self::redis_key(key))
                .arg(expires_at)
                .arg("PXAT")
                .arg(expires_at)
                .ignore();
        }
        let () = pipe.query_async(&mut conn).await.context("redis SET PXAT")?;
        debug!(count = keys.len(), expires_at, "marked (redis)");
        Ok(())
    }

    async fn cleanup_expired(&self, _now: i64) -> Result<usize> {
        Ok(0)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::BlockKind;

    #[test]
    fn keys_are_prefixed_storage_keys() {
        let key = BlockKey::new(BlockKind::Ip, "2001:db8::1");
        assert_eq!(RedisStore::redis_key(&key), "codgate:block:ip:2001:db8::1");
    }

    #[test]
    fn rejects_non_redis_urls() {
        assert!(RedisStore::new("http://localhost").is_err());
        assert!(RedisStore::new("redis://127.0.0.1:6379").is_ok());
    }
}
