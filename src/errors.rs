// ABOUTME: Centralized error handling: OAuth wire errors and internal application errors
// ABOUTME: Maps every protocol error kind to its RFC 6749 string and HTTP status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

//! # Error handling
//!
//! Two error families live here:
//!
//! - [`OAuthError`] is the wire format every JSON endpoint speaks:
//!   `{"error": "...", "error_description": "..."}` with a status code
//!   derived from the error kind.
//! - [`AppError`] covers internal faults (configuration, crypto, invariant
//!   violations). It never reaches a client verbatim; handlers convert it to
//!   an opaque `server_error`.

use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

use crate::constants::http_status::{
    BAD_REQUEST, INTERNAL_SERVER_ERROR, NOT_FOUND, UNAUTHORIZED,
};

/// Protocol error kinds, serialized as their RFC 6749 / RFC 7009 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthErrorKind {
    /// Malformed or missing request parameters
    InvalidRequest,
    /// Client or agent authentication failed
    InvalidClient,
    /// Authorization code or refresh token is invalid, consumed, or mismatched
    InvalidGrant,
    /// Grant type is not supported by this server or this client
    UnsupportedGrantType,
    /// `response_type` other than `code`
    UnsupportedResponseType,
    /// The authorization request outlived its TTL
    RequestExpired,
    /// The referenced entity does not exist
    NotFound,
    /// Internal invariant violation or store inconsistency
    ServerError,
}

impl OAuthErrorKind {
    /// The wire string for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::RequestExpired => "request_expired",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
        }
    }

    /// The HTTP status this kind maps to.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnsupportedGrantType
            | Self::UnsupportedResponseType
            | Self::RequestExpired => BAD_REQUEST,
            Self::InvalidClient => UNAUTHORIZED,
            Self::NotFound => NOT_FOUND,
            Self::ServerError => INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for OAuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth error response body.
///
/// Every error body carries `error` and `error_description`, including the
/// admin surface, so callers only ever parse one error shape.
#[derive(Debug, Clone, ThisError)]
pub struct OAuthError {
    pub kind: OAuthErrorKind,
    pub description: String,
}

impl OAuthError {
    #[must_use]
    pub fn new(kind: OAuthErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::InvalidRequest, description)
    }

    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::InvalidClient, description)
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::InvalidGrant, description)
    }

    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            OAuthErrorKind::UnsupportedGrantType,
            "Grant type not supported",
        )
    }

    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(
            OAuthErrorKind::UnsupportedResponseType,
            "Only the 'code' response type is supported",
        )
    }

    #[must_use]
    pub fn request_expired() -> Self {
        Self::new(
            OAuthErrorKind::RequestExpired,
            "Authorization request has expired",
        )
    }

    #[must_use]
    pub fn not_found(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(OAuthErrorKind::NotFound, format!("{entity} not found"))
    }

    /// Generic server error. The detailed cause is logged by the caller,
    /// never serialized.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            OAuthErrorKind::ServerError,
            "An internal error occurred while processing the request",
        )
    }

    /// The HTTP status to respond with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl Serialize for OAuthError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("OAuthError", 2)?;
        s.serialize_field("error", self.kind.as_str())?;
        s.serialize_field("error_description", &self.description)?;
        s.end()
    }
}

/// Internal error codes for faults that are not protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Configuration is missing or invalid
    ConfigError,
    /// Cryptographic operation failed (RNG, hashing, signing)
    CryptoError,
    /// Input failed syntactic validation
    InvalidInput,
    /// Anything else unexpected
    InternalError,
}

/// Internal application error.
///
/// Grounded in the store/config/crypto layers; the HTTP layer converts these
/// to an opaque `server_error` after logging the details.
#[derive(Debug, Clone, ThisError)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    #[must_use]
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, message)
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Result alias for internal operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for OAuthError {
    fn from(error: AppError) -> Self {
        // Log the real cause here so call sites don't have to remember to.
        tracing::error!("internal error surfaced to client: {error}");
        Self::server_error()
    }
}

impl From<anyhow::Error> for OAuthError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("internal error surfaced to client: {error:#}");
        Self::server_error()
    }
}
