// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Cryptographic pieces of the checkout gate.
//!
//! - [`token`]: HMAC-SHA256 identity tokens binding a cookie identifier to
//!   its issuance time, verified in constant time.
//! - [`new_cookie_id`]: fresh visitor identifiers from the OS RNG.
//!
//! The token secret lives in a `Zeroizing` buffer and is wiped when the
//! codec is dropped.

use rand::{rngs::OsRng, RngCore};

pub mod token;

pub use token::{compute_signature, unix_millis, TokenCodec, TokenError};

/// Random bytes behind every cookie identifier.
pub const COOKIE_ID_BYTES: usize = 16;

/// A new cookie identifier: 16 bytes from the OS RNG as lowercase hex.
pub fn new_cookie_id() -> String {
    let mut bytes = [0u8; COOKIE_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
