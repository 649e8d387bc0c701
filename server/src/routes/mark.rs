// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use codgate_common::api::{GateReq, MarkResp};

use super::{parse_body, request_identity, with_cookie};
use crate::error::GateError;
use crate::AppState;

/// `POST /mark`: block every key of this visitor for one TTL.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GateError> {
    let req: GateReq = parse_body(&body)?;
    let who = request_identity(&state, connect_info, &headers, &req)?;

    let outcome = state.gate.mark(&who.identity).await?;
    let resp = MarkResp {
        ok: true,
        marked: outcome.marked.iter().map(|k| k.tag().to_string()).collect(),
        expires_at: outcome.expires_at,
    };
    Ok(with_cookie(Json(resp), who.set_cookie))
}

#[cfg(test)]
mod tests {
    use super::super::{router, test_support::*};
    use crate::Auth;
    use axum::http::header;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn mark_then_check_from_other_ip_hits_cookie() {
        let (state, clock) = state(Auth::Cookie);
        let app = router(state, false);

        let mut req = post("/mark", "1.2.3.4", r#"{"fingerprint":"canvas-hash-0001"}"#);
        req.headers_mut()
            .insert(header::COOKIE, "codgate_cid=abc123".parse().unwrap());
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            json(resp).await,
            json!({ "ok": true, "marked": ["ip", "cid", "fp"], "expiresAt": 86_400_000i64 })
        );

        clock.set(3_600_000);
        let resp = app
            .clone()
            .oneshot(post("/check", "1.2.3.4", "{}"))
            .await
            .unwrap();
        assert_eq!(
            json(resp).await,
            json!({ "blocked": true, "remainingSeconds": 82_800, "hit": "ip:1.2.3.4" })
        );

        let mut req = post("/check", "9.9.9.9", "");
        req.headers_mut()
            .insert(header::COOKIE, "codgate_cid=abc123".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(json(resp).await["hit"], json!("cid:abc123"));
    }

    #[tokio::test]
    async fn short_fingerprint_is_ignored() {
        let (state, _) = state(Auth::Cookie);
        let resp = router(state, false)
            .oneshot(post("/mark", "1.2.3.4", r#"{"fingerprint":"tiny"}"#))
            .await
            .unwrap();
        assert_eq!(json(resp).await["marked"], json!(["ip", "cid"]));
    }
}
