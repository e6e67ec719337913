// ABOUTME: Core data model: agents, clients, authorization requests, tokens, refresh entries
// ABOUTME: Secrets are stored only as bcrypt hashes; plaintext exists once, in creation responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A non-human principal holding its own credential pair.
#[derive(Debug, Clone)]
pub struct Agent {
    pub agent_id: String,
    /// bcrypt hash of the agent secret; the plaintext is never stored
    pub secret_hash: String,
    pub user_email: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// A relying website registered with this server.
#[derive(Debug, Clone)]
pub struct Client {
    pub client_id: String,
    pub secret_hash: String,
    pub name: String,
    /// Exact-match redirect URIs, in registration order
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of an authorization request. Transitions are monotonic forward:
///
/// ```text
/// pending -> authenticated -> completed
/// pending -> error
/// pending -> expired
/// ```
///
/// `completed`, `expired`, and `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Authenticated,
    Completed,
    Expired,
    Error,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authenticated => "authenticated",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side record of an in-flight authorization.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub request_id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scope: String,
    pub status: RequestStatus,
    /// Set when the agent authenticates
    pub code: Option<String>,
    pub agent_id: Option<String>,
    pub model: Option<String>,
    /// Set when the request enters the `error` state
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthRequest {
    /// Whether the request has outlived its TTL at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// An issued token pair: JWT access token plus opaque refresh token.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub agent_id: String,
    pub client_id: String,
    pub model: String,
    pub scope: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Never flips back to false once revoked
    pub revoked: bool,
}

/// Index entry for an opaque refresh token.
///
/// `token_id` always points at the most recently issued access token for
/// this refresh token; the refresh grant updates it. Revocation cascades
/// follow the link in both directions.
#[derive(Debug, Clone)]
pub struct RefreshEntry {
    pub refresh_token: String,
    pub token_id: String,
    pub agent_id: String,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshEntry {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Token endpoint success body (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RequestStatus::Authenticated).unwrap(),
            "authenticated"
        );
        assert_eq!(RequestStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn expiry_is_strict_inequality() {
        let now = Utc::now();
        let request = AuthRequest {
            request_id: "req_x".into(),
            client_id: "client_x".into(),
            redirect_uri: "https://example.com/cb".into(),
            state: "s".into(),
            code_challenge: "c".into(),
            code_challenge_method: "S256".into(),
            scope: "openid".into(),
            status: RequestStatus::Pending,
            code: None,
            agent_id: None,
            model: None,
            error: None,
            created_at: now,
            expires_at: now,
        };
        assert!(!request.is_expired_at(now));
        assert!(request.is_expired_at(now + Duration::seconds(1)));
    }
}
