// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Block gate: one store, one TTL, one clock.
//!
//! `check` and `mark` each start with an opportunistic sweep of expired
//! rows. A failed sweep is logged and ignored; the lookup that follows
//! compares against `now` anyway, so stale rows can never read as blocked.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::GateError;
use crate::identity::{BlockKey, BlockKind, Identity};
use crate::store::BlockStore;

/// Result of a block-status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    /// Whole seconds left, rounded up and never below 1 while blocked.
    pub remaining_seconds: Option<u64>,
    pub matched: Option<BlockKey>,
}

impl BlockStatus {
    fn clear() -> Self {
        Self {
            blocked: false,
            remaining_seconds: None,
            matched: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub marked: Vec<BlockKind>,
    /// `None` when there was nothing to mark.
    pub expires_at: Option<i64>,
}

pub struct BlockGate {
    store: Arc<dyn BlockStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl BlockGate {
    pub fn new(store: Arc<dyn BlockStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn BlockStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn ttl_millis(&self) -> i64 {
        self.ttl.as_millis().min(i64::MAX as u128) as i64
    }

    /// Blocked if any of the identity's keys is live. The reported match is
    /// the first live key in ip, cookie, fingerprint order.
    pub async fn check(&self, identity: &Identity) -> Result<BlockStatus, GateError> {
        match require_keys(identity) {
            Ok(keys) => self.check_keys(&keys).await,
            Err(GateError::MissingIdentity) => {
                debug!("check without usable identity; reporting not blocked");
                Ok(BlockStatus::clear())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn check_keys(&self, keys: &[BlockKey]) -> Result<BlockStatus, GateError> {
        self.sweep().await;

        let mut ordered = keys.to_vec();
        ordered.sort_by_key(BlockKey::kind);

        let now = self.clock.now_millis();
        let hit = self
            .store
            .check(&ordered, now)
            .await
            .map_err(GateError::StoreUnavailable)?;

        Ok(match hit {
            Some(hit) => {
                let remaining_ms = hit.expires_at.saturating_sub(now);
                let remaining = ((remaining_ms + 999) / 1000).max(1) as u64;
                debug!(key = %hit.key, remaining, "blocked");
                BlockStatus {
                    blocked: true,
                    remaining_seconds: Some(remaining),
                    matched: Some(hit.key),
                }
            }
            None => BlockStatus::clear(),
        })
    }

    /// Blocks every key of the identity until `now + ttl`.
    pub async fn mark(&self, identity: &Identity) -> Result<MarkOutcome, GateError> {
        match require_keys(identity) {
            Ok(keys) => self.mark_keys(&keys).await,
            Err(GateError::MissingIdentity) => {
                debug!("mark without usable identity; nothing recorded");
                Ok(MarkOutcome {
                    marked: Vec::new(),
                    expires_at: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn mark_keys(&self, keys: &[BlockKey]) -> Result<MarkOutcome, GateError> {
        self.sweep().await;

        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(self.ttl_millis());
        self.store
            .mark(keys, expires_at, now)
            .await
            .map_err(GateError::StoreUnavailable)?;

        let marked: Vec<BlockKind> = keys.iter().map(BlockKey::kind).collect();
        info!(?marked, expires_at, "visitor blocked");
        Ok(MarkOutcome {
            marked,
            expires_at: Some(expires_at),
        })
    }

    /// Deletes every row whose expiry has passed.
    pub async fn cleanup_expired(&self) -> Result<usize, GateError> {
        let now = self.clock.now_millis();
        self.store
            .cleanup_expired(now)
            .await
            .map_err(GateError::StoreUnavailable)
    }

    async fn sweep(&self) {
        match self.cleanup_expired().await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "expired blocks reclaimed"),
            Err(e) => warn!("expiry sweep failed: {e}"),
        }
    }
}

fn require_keys(identity: &Identity) -> Result<Vec<BlockKey>, GateError> {
    if identity.is_empty() {
        Err(GateError::MissingIdentity)
    } else {
        Ok(identity.keys())
    }
}
