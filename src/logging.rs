// ABOUTME: Structured logging setup with env-driven filtering
// ABOUTME: Honors RUST_LOG, falling back to LOG_LEVEL, then to info
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the environment.
///
/// `RUST_LOG` takes precedence; `LOG_LEVEL` sets a crate-wide default
/// otherwise.
///
/// # Errors
/// Returns an error if a subscriber is already installed.
pub fn init_from_env() -> Result<()> {
    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}
