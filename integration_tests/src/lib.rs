// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Shared fixtures for the cross-crate scenario tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use codgate_crypto::TokenCodec;
use codgate_server::clock::ManualClock;
use codgate_server::config::CookieConfig;
use codgate_server::gate::BlockGate;
use codgate_server::identity::IdentityResolver;
use codgate_server::routes;
use codgate_server::store::BlockStore;
use codgate_server::{AppState, Auth};

pub const DAY: Duration = Duration::from_secs(86_400);
pub const TEST_SECRET: &str = "integration-secret-0123456789abcdef";

/// A router over `store` whose clock starts at unix ms 0 and only moves
/// when the test moves it.
pub fn app_with_store(store: Arc<dyn BlockStore>, token_mode: bool) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let gate = BlockGate::with_clock(store, DAY, clock.clone());
    let auth = if token_mode {
        Auth::Token(TokenCodec::new(TEST_SECRET))
    } else {
        Auth::Cookie
    };
    let state = AppState::new(
        Arc::new(gate),
        IdentityResolver::new(true),
        auth,
        CookieConfig::default(),
    );
    (routes::router(Arc::new(state), true), clock)
}

/// `POST uri` as seen from `ip`, optionally carrying the gate cookie.
pub fn post(uri: &str, ip: &str, cookie_id: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip);
    if let Some(cid) = cookie_id {
        builder = builder.header(header::COOKIE, format!("codgate_cid={cid}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|e| panic!("building request for {uri}: {e}"))
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|e| panic!("reading body: {e}"));
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("body is not JSON: {e}"))
}
