// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use codgate_common::api::{IssueReq, IssueResp};
use tracing::debug;

use super::parse_body;
use crate::error::GateError;
use crate::identity::is_valid_cookie_id;
use crate::AppState;

/// `POST /issue`: sign a token for a cookie identifier. Token mode only.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IssueResp>, GateError> {
    let codec = state
        .token_codec()
        .ok_or_else(|| GateError::BadRequest("token issuance is disabled".into()))?;

    let req: IssueReq = parse_body(&body)?;
    let cid = req
        .cid
        .ok_or_else(|| GateError::InvalidSubject("cid is required".into()))?;

    if !is_valid_cookie_id(&cid) {
        return Err(GateError::InvalidSubject(
            "cid must be 6 to 128 lowercase hex characters".into(),
        ));
    }
    let token = codec.issue(&cid)?;

    debug!("issued token");
    Ok(Json(IssueResp { ok: true, token }))
}
