// ABOUTME: Syntactic validation for emails, URLs, identifiers, and PKCE parameters
// ABOUTME: Redirect URI matching is exact string equality, never prefix or normalization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::constants::oauth::CHALLENGE_METHOD_S256;

/// `<nonspace_at>@<nonspace_dot><nonspace>`. Intentionally loose; the email
/// is an operator contact, not a login.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s]+$").expect("static regex"));

/// Check an email address for plausible shape.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Check that a string parses as an absolute URL.
#[must_use]
pub fn is_valid_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok()
}

/// Agent and client identifiers: `[A-Za-z0-9_-]`, at least 3 characters.
#[must_use]
pub fn is_valid_identifier(id: &str) -> bool {
    id.len() >= 3
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Only `S256` is accepted; OAuth 2.1 forbids `plain`.
#[must_use]
pub fn is_supported_challenge_method(method: &str) -> bool {
    method == CHALLENGE_METHOD_S256
}

/// Redirect URI membership: strict string equality against the client's
/// registered set. No prefix matching, no trailing-slash normalization.
#[must_use]
pub fn redirect_uri_allowed(allowed: &[String], redirect_uri: &str) -> bool {
    allowed.iter().any(|uri| uri == redirect_uri)
}

/// PKCE code challenge shape: base64url, 43–128 characters (RFC 7636 §4.2).
#[must_use]
pub fn is_valid_code_challenge(challenge: &str) -> bool {
    (43..=128).contains(&challenge.len())
        && challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// PKCE code verifier shape: unreserved characters, 43–128 characters
/// (RFC 7636 §4.1).
#[must_use]
pub fn is_valid_code_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
}
