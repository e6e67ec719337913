// ABOUTME: Server binary: loads configuration, starts the sweeper, serves the route tree
// ABOUTME: Single-process authority; all state lives in the in-memory store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

#![deny(unsafe_code)]

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use agentauth_server::{
    config::ServerConfig,
    logging,
    routes::{self, ServerContext},
    store::Store,
};

#[derive(Parser)]
#[command(name = "agentauth-server")]
#[command(about = "OAuth 2.1 authorization server for autonomous agents")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    logging::init_from_env()?;
    info!("{}", config.summary());
    warn!(
        "the /api/admin routes are unauthenticated; front them with an \
         authenticated control plane before exposing this server"
    );

    let store = Arc::new(Store::with_sweeper(Duration::from_secs(
        config.sweep_interval_secs,
    )));
    let config = Arc::new(config);
    let ctx = ServerContext::new(store, config.clone());

    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST: {}", config.host))?;

    info!(
        "listening on {}:{} (issuer {})",
        config.host, config.http_port, config.auth.issuer
    );
    warp::serve(routes::routes(ctx))
        .run((host, config.http_port))
        .await;

    Ok(())
}
