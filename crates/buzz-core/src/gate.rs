// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bearer-token gate for administrative operations.
//!
//! A successful check yields an [`AdminGrant`]. Operations that need
//! administrative rights take a grant by value, so they cannot be called
//! without passing through the gate first.

use crate::error::AuthorizationError;

/// Proof that the caller presented the administrative credential.
#[derive(Debug)]
pub struct AdminGrant {
    _private: (),
}

/// Checks `Authorization: Bearer <token>` headers against a configured token.
#[derive(Clone)]
pub struct AdminGate {
    token: String,
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}

impl AdminGate {
    /// Gate accepting `token`. An empty token rejects everything.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<AdminGrant, AuthorizationError> {
        let header = authorization
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(AuthorizationError::Missing)?;
        let (scheme, credential) = header
            .split_once(' ')
            .ok_or(AuthorizationError::Invalid)?;
        if !scheme.eq_ignore_ascii_case("bearer") || self.token.is_empty() {
            return Err(AuthorizationError::Invalid);
        }
        if tokens_match(credential.trim().as_bytes(), self.token.as_bytes()) {
            Ok(AdminGrant { _private: () })
        } else {
            Err(AuthorizationError::Invalid)
        }
    }
}

/// Compares every byte without an early exit. Token length is not hidden.
fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| acc | std::hint::black_box(x ^ y));
    std::hint::black_box(diff) == 0
}
