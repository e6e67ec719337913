// ABOUTME: Environment-based configuration loading for deployment-specific settings
// ABOUTME: Every TTL, the JWT secret, issuer, scope default, and listen address are overridable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

//! Environment-based configuration.
//!
//! Configuration is process-wide state: loaded once at startup, immutable at
//! runtime. A missing `JWT_SECRET` is tolerated by generating an ephemeral
//! one, which is consistent with the in-memory store; neither survives a
//! restart.

use std::env;

use base64::{engine::general_purpose, Engine as _};
use tracing::{info, warn};

use crate::constants::limits::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_AUTH_REQUEST_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::constants::oauth::DEFAULT_SCOPE;
use crate::crypto;
use crate::errors::{AppError, AppResult};

/// Token and authorization-request policy.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for access tokens
    pub jwt_secret: Vec<u8>,
    /// `iss` claim and discovery-document issuer
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub auth_request_ttl_secs: i64,
    /// Scope granted when the authorization request omits one
    pub default_scope: String,
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub auth: AuthConfig,
    /// Period of the background sweeper that removes expired rows
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable contains an unparseable value or the
    /// resulting configuration is invalid.
    pub fn from_env() -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            // Not an error: production deployments configure the environment directly.
            tracing::debug!("no .env file loaded: {e}");
        }

        let http_port = parse_env("HTTP_PORT", 8081_u16)?;
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let issuer =
            env::var("JWT_ISSUER").unwrap_or_else(|_| format!("http://localhost:{http_port}"));

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!(
                    "JWT_SECRET not set; generating an ephemeral signing secret \
                     (issued tokens will not survive a restart)"
                );
                let secret = crypto::generate_jwt_secret()
                    .map_err(|e| AppError::crypto(format!("cannot generate JWT secret: {e}")))?;
                general_purpose::URL_SAFE_NO_PAD.encode(secret).into_bytes()
            }
        };

        let config = Self {
            host,
            http_port,
            auth: AuthConfig {
                jwt_secret,
                issuer,
                access_token_ttl_secs: parse_env(
                    "ACCESS_TOKEN_TTL_SECS",
                    DEFAULT_ACCESS_TOKEN_TTL_SECS,
                )?,
                refresh_token_ttl_secs: parse_env(
                    "REFRESH_TOKEN_TTL_SECS",
                    DEFAULT_REFRESH_TOKEN_TTL_SECS,
                )?,
                auth_request_ttl_secs: parse_env(
                    "AUTH_REQUEST_TTL_SECS",
                    DEFAULT_AUTH_REQUEST_TTL_SECS,
                )?,
                default_scope: env::var("DEFAULT_SCOPE")
                    .unwrap_or_else(|_| DEFAULT_SCOPE.to_owned()),
            },
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
        };

        config.validate()?;
        info!("configuration loaded (issuer: {})", config.auth.issuer);
        Ok(config)
    }

    /// Validate loaded values.
    ///
    /// # Errors
    /// Returns an error for an empty issuer or non-positive TTLs.
    pub fn validate(&self) -> AppResult<()> {
        if self.auth.issuer.is_empty() {
            return Err(AppError::config("JWT_ISSUER must not be empty"));
        }
        if !self.auth.issuer.starts_with("https://")
            && !self.auth.issuer.starts_with("http://localhost")
            && !self.auth.issuer.starts_with("http://127.0.0.1")
        {
            // RFC 8414 hygiene: a production issuer must be HTTPS.
            warn!(
                "issuer {} is neither HTTPS nor localhost; browsers and clients \
                 outside this machine should not trust it",
                self.auth.issuer
            );
        }
        if self.auth.access_token_ttl_secs <= 0
            || self.auth.refresh_token_ttl_secs <= 0
            || self.auth.auth_request_ttl_secs <= 0
        {
            return Err(AppError::config("token TTLs must be positive"));
        }
        if self.auth.refresh_token_ttl_secs < self.auth.access_token_ttl_secs {
            return Err(AppError::config(
                "REFRESH_TOKEN_TTL_SECS must be at least ACCESS_TOKEN_TTL_SECS",
            ));
        }
        Ok(())
    }

    /// One-line summary for startup logging; never includes secrets.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "AgentAuth server on {}:{} (issuer {}, access TTL {}s, refresh TTL {}s, request TTL {}s, sweep every {}s)",
            self.host,
            self.http_port,
            self.auth.issuer,
            self.auth.access_token_ttl_secs,
            self.auth.refresh_token_ttl_secs,
            self.auth.auth_request_ttl_secs,
            self.sweep_interval_secs,
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("invalid value for {name}: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
