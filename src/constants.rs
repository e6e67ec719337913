// ABOUTME: Application-wide constants for TTLs, identifier prefixes, and OAuth defaults
// ABOUTME: Single source of truth for values shared between config, services, and tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

/// Default lifetimes, overridable through the environment (see `config`).
pub mod limits {
    /// Access tokens live for one hour.
    pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
    /// Refresh tokens live for thirty days.
    pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;
    /// Authorization requests (and their codes) live for ten minutes.
    pub const DEFAULT_AUTH_REQUEST_TTL_SECS: i64 = 600;
    /// The sweeper wakes up every five minutes.
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
}

/// Identifier and token prefixes.
///
/// The prefix makes the token class recognizable in logs and bug reports
/// without revealing anything about the value itself.
pub mod prefixes {
    pub const AGENT_ID: &str = "agent_";
    pub const CLIENT_ID: &str = "client_";
    pub const REQUEST_ID: &str = "req_";
    pub const AUTH_CODE: &str = "code_";
    pub const REFRESH_TOKEN: &str = "rt_";
}

/// OAuth protocol defaults.
pub mod oauth {
    /// Scope granted when the authorization request omits one.
    pub const DEFAULT_SCOPE: &str = "openid profile";
    /// Scopes advertised in the discovery document.
    pub const SUPPORTED_SCOPES: [&str; 3] = ["openid", "profile", "email"];
    /// Grant types a freshly registered client may use.
    pub const DEFAULT_GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];
    /// The only accepted PKCE challenge method (OAuth 2.1 forbids `plain`).
    pub const CHALLENGE_METHOD_S256: &str = "S256";
}

/// HTTP status codes used when mapping protocol errors to responses.
pub mod http_status {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}
