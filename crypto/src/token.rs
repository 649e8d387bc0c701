// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Signed identity tokens.
//!
//! A token binds a cookie identifier (the *subject*) to the moment it was
//! issued:
//!
//! ```text
//! token     = subject "." issued_at "." signature
//! signature = hex(HMAC-SHA256(secret, subject "." issued_at))
//! ```
//!
//! `issued_at` is unix milliseconds in decimal. Tokens are never stored on
//! the server; anyone holding the secret can re-derive the signature.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SUBJECT_LEN: usize = 6;
pub const MAX_SUBJECT_LEN: usize = 256;
pub const FIELD_SEPARATOR: char = '.';

/// Default tolerance for tokens stamped slightly in the future.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid subject: {0}")]
    InvalidSubject(&'static str),
}

/// Current wall-clock time in unix milliseconds.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// HMAC-SHA256 over `subject "." issued_at`.
pub fn compute_signature(secret: &[u8], subject: &str, issued_at: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(subject.as_bytes());
    mac.update(&[FIELD_SEPARATOR as u8]);
    mac.update(issued_at.as_bytes());
    mac.finalize().into_bytes().into()
}

fn validate_subject(subject: &str) -> Result<(), TokenError> {
    let len = subject.chars().count();
    if len < MIN_SUBJECT_LEN {
        return Err(TokenError::InvalidSubject("must be at least 6 characters"));
    }
    if len > MAX_SUBJECT_LEN {
        return Err(TokenError::InvalidSubject("must be at most 256 characters"));
    }
    if subject.contains(FIELD_SEPARATOR) {
        return Err(TokenError::InvalidSubject("must not contain '.'"));
    }
    Ok(())
}

/// Issues and verifies identity tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Zeroizing<Vec<u8>>,
    max_age: Option<Duration>,
    max_clock_skew: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("max_age", &self.max_age)
            .field("max_clock_skew", &self.max_clock_skew)
            .finish()
    }
}

impl TokenCodec {
    /// Tokens from this codec never expire on their own.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            max_age: None,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
        }
    }

    /// Reject tokens older than `max_age` (and tokens stamped further in the
    /// future than the clock-skew allowance).
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, unix_millis())
    }

    pub fn issue_at(&self, subject: &str, issued_at: i64) -> Result<String, TokenError> {
        validate_subject(subject)?;
        let issued_at = issued_at.to_string();
        let signature = compute_signature(&self.secret, subject, &issued_at);
        Ok(format!(
            "{subject}{sep}{issued_at}{sep}{sig}",
            sep = FIELD_SEPARATOR,
            sig = hex::encode(signature)
        ))
    }

    /// True only for a well-formed token issued by this codec for
    /// `expected_subject`. Never panics on hostile input.
    pub fn verify(&self, token: &str, expected_subject: &str) -> bool {
        self.verify_at(token, expected_subject, unix_millis())
    }

    pub fn verify_at(&self, token: &str, expected_subject: &str, now: i64) -> bool {
        let mut fields = token.split(FIELD_SEPARATOR);
        let (Some(subject), Some(issued_at), Some(signature), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return false;
        };

        if subject.is_empty() || subject != expected_subject {
            return false;
        }
        if issued_at.is_empty() || !issued_at.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let Ok(issued_ms) = issued_at.parse::<i64>() else {
            return false;
        };

        let expected = hex::encode(compute_signature(&self.secret, subject, issued_at));
        if expected.len() != signature.len() {
            return false;
        }
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return false;
        }

        match self.max_age {
            Some(max_age) => {
                let max_age_ms = max_age.as_millis().min(i64::MAX as u128) as i64;
                let skew_ms = self.max_clock_skew.as_millis().min(i64::MAX as u128) as i64;
                let age = now.saturating_sub(issued_ms);
                age <= max_age_ms && age >= -skew_ms
            }
            None => true,
        }
    }
}
