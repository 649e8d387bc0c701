// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::http::{HeaderValue, Method};
use codgate_common::duration::{env_duration, format_duration, parse_duration};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::store::StoreBackend;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_BLOCK_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_DB_PATH: &str = "codgate.sqlite";
pub const DEFAULT_COOKIE_NAME: &str = "codgate_cid";
pub const DEFAULT_COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 86_400);
pub const MIN_SECRET_LEN: usize = 32;

/// Secrets that show up in sample env files.
const PLACEHOLDER_SECRETS: &[&str] = &["changeme", "change-me", "secret", "dev-secret", "test-secret"];

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub block_ttl: Duration,
    pub store: StoreBackend,
    pub auth: AuthMode,
    pub cors: CorsPolicy,
    pub behind_proxy: bool,
    pub cookie: CookieConfig,
    pub enable_whoami: bool,
    pub allow_insecure_secret: bool,
}

/// How a request proves which cookie identifier it owns.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// The identifier rides in a cookie the server sets itself.
    Cookie,
    /// The client sends `cid` + `token` in the body; `/issue` mints tokens.
    Token {
        secret: String,
        max_age: Option<Duration>,
    },
}

impl AuthMode {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::Cookie => "cookie",
            AuthMode::Token { .. } => "token",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Cookie => f.write_str("Cookie"),
            AuthMode::Token { max_age, .. } => f
                .debug_struct("Token")
                .field("secret", &"<redacted>")
                .field("max_age", max_age)
                .finish(),
        }
    }
}

/// Cross-origin policy for the storefront scripts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Only this exact origin, with credentials.
    Strict(String),
    /// Echo whatever origin asked, with credentials.
    ReflectOrigin,
    /// `*`, no credentials. Cookie mode cannot work cross-site under this.
    AllowAll,
}

impl CorsPolicy {
    pub fn layer(&self) -> Result<CorsLayer> {
        let base = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE]);

        Ok(match self {
            CorsPolicy::Strict(origin) => {
                let origin = HeaderValue::from_str(origin)
                    .with_context(|| format!("STORE_ORIGIN is not a valid header value: {origin}"))?;
                base.allow_origin(origin).allow_credentials(true)
            }
            CorsPolicy::ReflectOrigin => base
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true),
            CorsPolicy::AllowAll => base.allow_origin(Any),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    pub max_age: Duration,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            max_age: DEFAULT_COOKIE_MAX_AGE,
        }
    }
}

impl CookieConfig {
    /// `Set-Cookie` value for a freshly minted identifier. `SameSite=None`
    /// is required for the cookie to travel on cross-site storefront calls.
    pub fn set_cookie_header(&self, cookie_id: &str) -> String {
        format!(
            "{}={}; Path=/; Max-Age={}; SameSite=None; Secure",
            self.name,
            cookie_id,
            self.max_age.as_secs()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            block_ttl: DEFAULT_BLOCK_TTL,
            store: StoreBackend::Sqlite(PathBuf::from(DEFAULT_DB_PATH)),
            auth: AuthMode::Cookie,
            cors: CorsPolicy::ReflectOrigin,
            behind_proxy: true,
            cookie: CookieConfig::default(),
            enable_whoami: false,
            allow_insecure_secret: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_str = match (env::var("BIND_ADDR"), env::var("PORT")) {
            (Ok(addr), _) => addr,
            (Err(_), Ok(port)) => format!("0.0.0.0:{port}"),
            _ => DEFAULT_BIND_ADDR.to_string(),
        };
        let bind_addr: SocketAddr = bind_str
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR: {bind_str}"))?;

        let block_ttl = env_duration("BLOCK_TTL", DEFAULT_BLOCK_TTL);

        let store = match env_string("STORE_BACKEND").as_deref().unwrap_or("sqlite") {
            "sqlite" => StoreBackend::Sqlite(
                env_string("DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            ),
            "memory" => StoreBackend::InMemory,
            "redis" => {
                let url = env_string("REDIS_URL").context("STORE_BACKEND=redis requires REDIS_URL")?;
                StoreBackend::Redis(url)
            }
            other => bail!("Unknown STORE_BACKEND: {other} (expected sqlite, memory or redis)"),
        };

        let auth = match env_string("AUTH_MODE").as_deref().unwrap_or("cookie") {
            "cookie" => AuthMode::Cookie,
            "token" => AuthMode::Token {
                secret: env_string("TOKEN_SECRET").context("AUTH_MODE=token requires TOKEN_SECRET")?,
                max_age: token_max_age()?,
            },
            other => bail!("Unknown AUTH_MODE: {other} (expected cookie or token)"),
        };

        let store_origin = env_string("STORE_ORIGIN");
        let cors = match (env_string("CORS_MODE").as_deref(), store_origin) {
            (Some("strict") | None, Some(origin)) => CorsPolicy::Strict(origin),
            (Some("strict"), None) => bail!("CORS_MODE=strict requires STORE_ORIGIN"),
            (Some("reflect") | None, _) => CorsPolicy::ReflectOrigin,
            (Some("any"), _) => CorsPolicy::AllowAll,
            (Some(other), _) => bail!("Unknown CORS_MODE: {other} (expected strict, reflect or any)"),
        };

        let cookie = CookieConfig {
            name: env_string("COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            max_age: env_duration("COOKIE_MAX_AGE", DEFAULT_COOKIE_MAX_AGE),
        };

        let config = Self {
            bind_addr,
            block_ttl,
            store,
            auth,
            cors,
            behind_proxy: env_bool_or("BEHIND_PROXY", true),
            cookie,
            enable_whoami: env_bool_or("ENABLE_WHOAMI", false),
            allow_insecure_secret: env_bool_or("ALLOW_INSECURE_SECRET", false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_ttl.is_zero() {
            bail!("BLOCK_TTL must be positive");
        }
        if self.cookie.name.is_empty()
            || !self
                .cookie
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            bail!("COOKIE_NAME must be non-empty and use only [A-Za-z0-9_-]");
        }

        if let AuthMode::Token { secret, .. } = &self.auth {
            if let Some(problem) = secret_problem(secret) {
                if self.allow_insecure_secret {
                    warn!("TOKEN_SECRET {problem}; accepted because ALLOW_INSECURE_SECRET=true");
                } else {
                    bail!("TOKEN_SECRET {problem}; set a random secret or ALLOW_INSECURE_SECRET=true for development");
                }
            }
        }

        if matches!(self.auth, AuthMode::Cookie) && self.cors == CorsPolicy::AllowAll {
            warn!("CORS_MODE=any disables credentials; cross-site cookies will not be sent");
        }
        Ok(())
    }

    /// One-line summary for the startup log. Never includes the secret.
    pub fn summary(&self) -> String {
        format!(
            "auth={} ttl={} store={:?} cors={:?} behind_proxy={}",
            self.auth.name(),
            format_duration(self.block_ttl),
            self.store,
            self.cors,
            self.behind_proxy
        )
    }
}

fn secret_problem(secret: &str) -> Option<&'static str> {
    let lowered = secret.trim().to_ascii_lowercase();
    if PLACEHOLDER_SECRETS.contains(&lowered.as_str()) {
        Some("is a placeholder value")
    } else if secret.len() < MIN_SECRET_LEN {
        Some("is shorter than 32 characters")
    } else {
        None
    }
}

/// Unset means unbounded; a value that does not parse refuses to start
/// rather than silently disabling expiry.
fn token_max_age() -> Result<Option<Duration>> {
    let Some(raw) = env_string("TOKEN_MAX_AGE") else {
        return Ok(None);
    };
    let max_age = parse_duration(&raw).with_context(|| format!("Invalid TOKEN_MAX_AGE: {raw}"))?;
    if max_age.is_zero() {
        bail!("TOKEN_MAX_AGE must be positive");
    }
    Ok(Some(max_age))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_bool_or(key: &str, default: bool) -> bool {
    match env_string(key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}
