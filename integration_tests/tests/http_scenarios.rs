// SPDX-License-Identifier: Apache-2.0 OR MIT
// Integration test: storefront flows through the HTTP router.
//
// Drives the real router with `oneshot` over a SQLite store and a manual
// clock, covering cookie mode and token mode end to end.

use anyhow::Result;
use axum::http::{header, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use codgate_crypto::TokenCodec;
use codgate_integration_tests::{app_with_store, body_json, post, TEST_SECRET};
use codgate_server::store::{InMemoryStore, SqliteStore};

#[tokio::test]
async fn cookie_mode_day_in_the_life() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::open(dir.path().join("gate.sqlite"))?);
    let (app, clock) = app_with_store(store, false);

    // First visit: not blocked, a cookie identifier is minted.
    let resp = app.clone().oneshot(post("/check", "1.2.3.4", None, json!({}))).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()[header::SET_COOKIE].to_str()?.to_string();
    let cid = set_cookie
        .strip_prefix("codgate_cid=")
        .and_then(|rest| rest.split(';').next())
        .expect("cookie value")
        .to_string();
    assert_eq!(cid.len(), 32);
    assert_eq!(body_json(resp).await, json!({ "blocked": false }));

    // The storefront flags the visitor.
    let resp = app
        .clone()
        .oneshot(post("/mark", "1.2.3.4", Some(&cid), json!({})))
        .await?;
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(
        body_json(resp).await,
        json!({ "ok": true, "marked": ["ip", "cid"], "expiresAt": 86_400_000i64 })
    );

    // Same cookie from a new network: still blocked via the cookie.
    clock.set(3_600_000);
    let resp = app
        .clone()
        .oneshot(post("/check", "9.9.9.9", Some(&cid), json!({})))
        .await?;
    assert_eq!(
        body_json(resp).await,
        json!({ "blocked": true, "remainingSeconds": 82_800, "hit": format!("cid:{cid}") })
    );

    // A different visitor on a different network is unaffected.
    let resp = app
        .clone()
        .oneshot(post("/check", "5.6.7.8", Some("abcdef"), json!({})))
        .await?;
    assert_eq!(body_json(resp).await["blocked"], json!(false));

    // A day later the block has lapsed.
    clock.set(86_400_001);
    let resp = app.oneshot(post("/check", "1.2.3.4", Some(&cid), json!({}))).await?;
    assert_eq!(body_json(resp).await, json!({ "blocked": false }));
    Ok(())
}

#[tokio::test]
async fn remark_extends_the_block() -> Result<()> {
    let (app, clock) = app_with_store(Arc::new(InMemoryStore::default()), false);

    app.clone()
        .oneshot(post("/mark", "1.2.3.4", Some("abc123"), json!({})))
        .await?;
    clock.set(43_200_000);
    let resp = app
        .clone()
        .oneshot(post("/mark", "1.2.3.4", Some("abc123"), json!({})))
        .await?;
    assert_eq!(body_json(resp).await["expiresAt"], json!(129_600_000i64));

    clock.set(90_000_000);
    let resp = app.oneshot(post("/check", "1.2.3.4", None, json!({}))).await?;
    let body = body_json(resp).await;
    assert_eq!(body["blocked"], json!(true));
    assert_eq!(body["remainingSeconds"], json!(39_600));
    Ok(())
}

#[tokio::test]
async fn fingerprint_catches_a_cleared_cookie_jar() -> Result<()> {
    let (app, _clock) = app_with_store(Arc::new(InMemoryStore::default()), false);
    let fp = json!({ "fingerprint": "webgl:abcdef:1920x1080" });

    app.clone()
        .oneshot(post("/mark", "1.2.3.4", Some("abc123"), fp.clone()))
        .await?;

    let resp = app.oneshot(post("/check", "9.9.9.9", None, fp)).await?;
    let body = body_json(resp).await;
    assert_eq!(body["blocked"], json!(true));
    assert_eq!(body["hit"], json!("fp:webgl:abcdef:1920x1080"));
    Ok(())
}

#[tokio::test]
async fn token_mode_end_to_end() -> Result<()> {
    let (app, _clock) = app_with_store(Arc::new(InMemoryStore::default()), true);

    let resp = app
        .clone()
        .oneshot(post("/issue", "1.2.3.4", None, json!({ "cid": "00aa11bb22cc" })))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let issued = body_json(resp).await;
    assert_eq!(issued["ok"], json!(true));
    let token = issued["token"].as_str().expect("token").to_string();

    // The server's token verifies with the same secret outside the router.
    assert!(TokenCodec::new(TEST_SECRET).verify(&token, "00aa11bb22cc"));

    let auth = json!({ "cid": "00aa11bb22cc", "token": token });
    let resp = app.clone().oneshot(post("/mark", "1.2.3.4", None, auth.clone())).await?;
    assert_eq!(body_json(resp).await["marked"], json!(["ip", "cid"]));

    let resp = app.clone().oneshot(post("/check", "9.9.9.9", None, auth)).await?;
    assert_eq!(body_json(resp).await["hit"], json!("cid:00aa11bb22cc"));

    // Missing token: 400. Token for someone else: 403.
    let resp = app
        .clone()
        .oneshot(post("/check", "1.2.3.4", None, json!({ "cid": "00aa11bb22cc" })))
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let forged = TokenCodec::new("some-other-secret-0123456789abcdef").issue("00aa11bb22cc")?;
    let resp = app
        .oneshot(post("/check", "1.2.3.4", None, json!({ "cid": "00aa11bb22cc", "token": forged })))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(resp).await,
        json!({ "ok": false, "error": "authentication failed" })
    );
    Ok(())
}
