// ABOUTME: Shared test utilities: fixture agents, clients, configs, and flow helpers
// ABOUTME: bcrypt fixtures use the minimum cost; the hash value itself is not under test
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Once};

use chrono::{Duration, Utc};

use agentauth_server::{
    authorize::{AgentAuthenticateRequest, AuthorizeParams},
    config::{AuthConfig, ServerConfig},
    models::{Agent, AuthRequest, Client, RefreshEntry, RequestStatus, TokenRecord},
    routes::ServerContext,
    store::Store,
};

/// RFC 7636 appendix B vector, also the happy path of the end-to-end tests.
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub const AGENT_ID: &str = "agent_test00000001";
pub const AGENT_SECRET: &str = "agent-secret-fixture";
pub const CLIENT_ID: &str = "client_test0000001";
pub const CLIENT_SECRET: &str = "client-secret-fixture";
pub const REDIRECT_URI: &str = "https://example.com/callback";
pub const ISSUER: &str = "http://localhost:8081";

static INIT_LOGGER: Once = Once::new();

/// Quiet logging for tests; raise with `TEST_LOG=debug`.
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let level = std::env::var("TEST_LOG").unwrap_or_else(|_| "warn".to_owned());
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(level))
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        http_port: 8081,
        auth: AuthConfig {
            jwt_secret: b"integration-test-jwt-secret".to_vec(),
            issuer: ISSUER.into(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 30 * 24 * 3600,
            auth_request_ttl_secs: 600,
            default_scope: "openid profile".into(),
        },
        sweep_interval_secs: 300,
    }
}

/// Fresh context over an empty store, no background sweeper.
pub fn test_context() -> ServerContext {
    init_test_logging();
    ServerContext::new(Arc::new(Store::new()), Arc::new(test_config()))
}

/// Minimum-cost bcrypt (4) for fixtures; verification behavior is identical.
pub fn fixture_hash(secret: &str) -> String {
    bcrypt::hash(secret, 4).expect("bcrypt fixture hash")
}

pub fn make_agent(agent_id: &str, secret: &str) -> Agent {
    Agent {
        agent_id: agent_id.into(),
        secret_hash: fixture_hash(secret),
        user_email: "owner@example.com".into(),
        user_name: "Owner".into(),
        created_at: Utc::now(),
    }
}

pub fn make_client(client_id: &str, secret: &str, redirect_uris: Vec<String>) -> Client {
    Client {
        client_id: client_id.into(),
        secret_hash: fixture_hash(secret),
        name: "Example Website".into(),
        redirect_uris,
        grant_types: vec!["authorization_code".into(), "refresh_token".into()],
        created_at: Utc::now(),
    }
}

/// Seed the standard agent and client fixtures into a context's store.
pub async fn seed_fixtures(ctx: &ServerContext) {
    assert!(ctx.store.insert_agent(make_agent(AGENT_ID, AGENT_SECRET)).await);
    assert!(
        ctx.store
            .insert_client(make_client(
                CLIENT_ID,
                CLIENT_SECRET,
                vec![REDIRECT_URI.into()],
            ))
            .await
    );
}

pub fn authorize_params(state: &str) -> AuthorizeParams {
    AuthorizeParams {
        response_type: "code".into(),
        client_id: CLIENT_ID.into(),
        redirect_uri: REDIRECT_URI.into(),
        state: state.into(),
        code_challenge: CHALLENGE.into(),
        code_challenge_method: "S256".into(),
        scope: None,
    }
}

pub fn authorize_query(state: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.insert("response_type".into(), "code".into());
    params.insert("client_id".into(), CLIENT_ID.into());
    params.insert("redirect_uri".into(), REDIRECT_URI.into());
    params.insert("state".into(), state.into());
    params.insert("code_challenge".into(), CHALLENGE.into());
    params.insert("code_challenge_method".into(), "S256".into());
    params
}

pub fn agent_login(request_id: &str) -> AgentAuthenticateRequest {
    AgentAuthenticateRequest {
        request_id: request_id.into(),
        agent_id: AGENT_ID.into(),
        agent_secret: AGENT_SECRET.into(),
        model: "browser-use".into(),
    }
}

/// An authorization request that expired a minute ago, inserted directly.
pub fn expired_request(request_id: &str) -> AuthRequest {
    let created = Utc::now() - Duration::minutes(11);
    AuthRequest {
        request_id: request_id.into(),
        client_id: CLIENT_ID.into(),
        redirect_uri: REDIRECT_URI.into(),
        state: "state-expired".into(),
        code_challenge: CHALLENGE.into(),
        code_challenge_method: "S256".into(),
        scope: "openid profile".into(),
        status: RequestStatus::Pending,
        code: None,
        agent_id: None,
        model: None,
        error: None,
        created_at: created,
        expires_at: created + Duration::minutes(10),
    }
}

/// A token pair inserted directly into the store, bypassing the grant path.
pub fn make_token_pair(token_id: &str, refresh_token: &str) -> (TokenRecord, RefreshEntry) {
    let now = Utc::now();
    let token = TokenRecord {
        token_id: token_id.into(),
        access_token: format!("jwt-{token_id}"),
        refresh_token: refresh_token.into(),
        agent_id: AGENT_ID.into(),
        client_id: CLIENT_ID.into(),
        model: "browser-use".into(),
        scope: "openid profile".into(),
        access_expires_at: now + Duration::hours(1),
        refresh_expires_at: now + Duration::days(30),
        created_at: now,
        revoked: false,
    };
    let refresh = RefreshEntry {
        refresh_token: refresh_token.into(),
        token_id: token_id.into(),
        agent_id: AGENT_ID.into(),
        client_id: CLIENT_ID.into(),
        expires_at: now + Duration::days(30),
        revoked: false,
    };
    (token, refresh)
}

/// Drive the full browser+agent flow up to an undelivered code and return
/// `(request_id, code, state, redirect_uri)` from the first poll.
pub async fn run_flow_to_code(ctx: &ServerContext, state: &str) -> (String, String, String, String) {
    use agentauth_server::authorize::StatusDocument;

    let request = ctx
        .coordinator
        .begin_authorization(authorize_params(state))
        .await
        .expect("begin authorization");

    ctx.coordinator
        .authenticate_agent(agent_login(&request.request_id))
        .await
        .expect("agent authenticate");

    match ctx
        .coordinator
        .poll_status(&request.request_id)
        .await
        .expect("poll status")
    {
        StatusDocument::Authenticated {
            code,
            state,
            redirect_uri,
        } => (request.request_id, code, state, redirect_uri),
        other => panic!("expected authenticated status, got {other:?}"),
    }
}
