// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

pub mod check;
pub mod issue;
pub mod mark;
pub mod whoami;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use codgate_common::api::GateReq;
use codgate_crypto::new_cookie_id;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::identity::{is_valid_cookie_id, parse_cookie_header, Identity};
use crate::{AppState, Auth};

const BODY_LIMIT: usize = 16 * 1024;

pub fn router(state: Arc<AppState>, enable_whoami: bool) -> Router {
    let mut app = Router::new()
        .route("/", get(health))
        .route("/check", post(check::handle))
        .route("/mark", post(mark::handle));

    if state.token_codec().is_some() {
        app = app.route("/issue", post(issue::handle));
    }
    if enable_whoami {
        app = app.route("/whoami", post(whoami::handle));
    }

    app.layer(DefaultBodyLimit::max(BODY_LIMIT)).with_state(state)
}

async fn health() -> &'static str {
    "codgate ok"
}

/// Identity of one request plus the cookie to set if a new identifier was
/// minted for it.
pub(crate) struct RequestIdentity {
    pub identity: Identity,
    pub set_cookie: Option<String>,
}

pub(crate) fn request_identity(
    state: &AppState,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: &HeaderMap,
    req: &GateReq,
) -> Result<RequestIdentity, GateError> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let forwarded_for = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok());

    let (cookie_id, set_cookie) = match &state.auth {
        Auth::Cookie => {
            let existing = headers
                .get(header::COOKIE)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| parse_cookie_header(h, &state.cookie.name))
                .filter(|cid| is_valid_cookie_id(cid));
            match existing {
                Some(cid) => (cid, None),
                None => {
                    let cid = new_cookie_id();
                    debug!("minted cookie identifier");
                    let set_cookie = state.cookie.set_cookie_header(&cid);
                    (cid, Some(set_cookie))
                }
            }
        }
        Auth::Token(codec) => {
            let (Some(cid), Some(token)) = (req.cid.as_deref(), req.token.as_deref()) else {
                return Err(GateError::BadRequest("cid and token are required".into()));
            };
            if !codec.verify(token, cid) {
                return Err(GateError::AuthenticationFailed);
            }
            (cid.to_string(), None)
        }
    };

    let identity = state.resolver.resolve(
        peer,
        forwarded_for,
        Some(cookie_id.as_str()),
        req.fingerprint.as_deref(),
    );
    Ok(RequestIdentity {
        identity,
        set_cookie,
    })
}

/// Empty bodies read as `{}`; storefront beacons often send nothing.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, GateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| GateError::BadRequest(format!("invalid JSON body: {e}")))
}

pub(crate) fn with_cookie(body: impl IntoResponse, set_cookie: Option<String>) -> Response {
    let mut response = body.into_response();
    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("dropping unencodable Set-Cookie: {e}"),
        }
    }
    response
}
