// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! JSON bodies exchanged with the storefront scripts.
//!
//! Field names follow the storefront's camelCase convention on the way out
//! (`remainingSeconds`, `expiresAt`); request fields are short lowercase
//! names (`cid`, `token`, `fingerprint`).

use serde::{Deserialize, Serialize};

// ============================================================================
// Gate requests
// ============================================================================

/// Body of `POST /check` and `POST /mark`. Every field is optional; an empty
/// or missing body is the same as `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateReq {
    /// Client-computed device fingerprint (untrusted).
    #[serde(default)]
    pub fingerprint: Option<String>,

    /// Cookie identifier, required in token mode.
    #[serde(default)]
    pub cid: Option<String>,

    /// Token previously returned by `POST /issue` for `cid`.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResp {
    pub blocked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,

    /// Namespaced key that matched, e.g. `ip:203.0.113.7` or `cid:abc123`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit: Option<String>,
}

impl CheckResp {
    pub fn not_blocked() -> Self {
        Self {
            blocked: false,
            remaining_seconds: None,
            hit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResp {
    pub ok: bool,

    /// Kind tags that were written (`ip`, `cid`, `fp`).
    pub marked: Vec<String>,

    /// Expiry of the written entries in unix milliseconds; `null` when the
    /// request carried no usable identity.
    pub expires_at: Option<i64>,
}

// ============================================================================
// Token issuance
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueReq {
    #[serde(default)]
    pub cid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResp {
    pub ok: bool,
    pub token: String,
}

// ============================================================================
// Diagnostics & errors
// ============================================================================

/// Body of `POST /whoami`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoamiResp {
    pub ip: Option<String>,
    pub cid: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResp {
    pub ok: bool,
    pub error: String,
}

impl ErrorResp {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_resp_omits_empty_fields() {
        let v = serde_json::to_value(CheckResp::not_blocked()).unwrap();
        assert_eq!(v, json!({ "blocked": false }));

        let blocked = CheckResp {
            blocked: true,
            remaining_seconds: Some(82_800),
            hit: Some("ip:1.2.3.4".into()),
        };
        assert_eq!(
            serde_json::to_value(blocked).unwrap(),
            json!({ "blocked": true, "remainingSeconds": 82800, "hit": "ip:1.2.3.4" })
        );
    }

    #[test]
    fn gate_req_accepts_empty_object() {
        let req: GateReq = serde_json::from_str("{}").unwrap();
        assert!(req.fingerprint.is_none() && req.cid.is_none() && req.token.is_none());
    }

    #[test]
    fn mark_resp_uses_camel_case() {
        let resp = MarkResp {
            ok: true,
            marked: vec!["ip".into(), "cid".into()],
            expires_at: Some(86_400_000),
        };
        assert_eq!(
            serde_json::to_value(resp).unwrap(),
            json!({ "ok": true, "marked": ["ip", "cid"], "expiresAt": 86400000 })
        );
    }
}
