// ABOUTME: Library entry point for the AgentAuth authorization server
// ABOUTME: OAuth 2.1 authorization-code + PKCE flow for non-human principals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

#![deny(unsafe_code)]

//! # AgentAuth Server
//!
//! An OAuth 2.1 authorization server for autonomous agents. A website starts
//! a standard authorization-code + PKCE flow in a browser; instead of an
//! interactive login, the landing page exposes a `request_id` that the
//! controlling agent reads and redeems over a back channel with its
//! `(agent_id, agent_secret)` credential pair. The browser polls a status
//! endpoint, picks up the authorization code, and returns to the client's
//! registered callback, after which the client exchanges the code for tokens
//! at the regular token endpoint.
//!
//! ## Surface
//!
//! - `GET /authorize`: landing page, creates the pending request
//! - `POST /api/agent/authenticate`: agent back-channel login
//! - `GET /api/check-status`: browser poll, delivers the code once
//! - `POST /token`: authorization-code and refresh-token grants
//! - `POST /introspect`, `POST /revoke`: RFC 7662 / RFC 7009
//! - `GET /.well-known/oauth-authorization-server`, `/.well-known/jwks.json`
//! - `/api/admin/*`: agent and client provisioning
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentauth_server::config::ServerConfig;
//! use agentauth_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("{}", config.summary());
//!     Ok(())
//! }
//! ```

/// Admin provisioning of agents and clients
pub mod admin;

/// Authorization request coordinator (the pending/authenticated/completed
/// state machine)
pub mod authorize;

/// Environment-based configuration
pub mod config;

/// Application constants and defaults
pub mod constants;

/// Cryptographic primitives: hashing, PKCE, JWT, randomness
pub mod crypto;

/// Error types and the OAuth error wire format
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Core data model
pub mod models;

/// HTTP routes and handlers
pub mod routes;

/// In-memory store and TTL sweeper
pub mod store;

/// Token endpoint grants
pub mod tokens;

/// Token introspection and revocation
pub mod introspection;

/// Syntactic validation helpers
pub mod validation;
