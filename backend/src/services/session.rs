//! Session scoping for cached upstream data
//!
//! Tokens are not verified locally, so cached data is only ever served back to
//! the exact token upstream returned it for. A scope is the SHA-256 digest of
//! the raw bearer token.

use sha2::{Digest, Sha256};

/// Cache partition for one session token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionScope([u8; 32]);

impl SessionScope {
    pub fn of(token: &str) -> Self {
        Self(Sha256::digest(token.as_bytes()).into())
    }
}
