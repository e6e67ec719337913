// ABOUTME: HTTP surface: warp filters and handlers for every endpoint of the server
// ABOUTME: Authorize renders HTML; every other endpoint speaks the JSON error wire format
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::admin::{AdminService, CreateAgentRequest, CreateClientRequest, UpdateClientRequest};
use crate::authorize::{AgentAuthenticateRequest, AuthorizationCoordinator, AuthorizeParams};
use crate::config::ServerConfig;
use crate::errors::OAuthError;
use crate::introspection::{IntrospectionService, TokenQueryRequest};
use crate::store::Store;
use crate::tokens::{TokenRequest, TokenService};

/// Landing page template embedded at compile time to avoid filesystem IO on
/// the request path.
const AUTHORIZE_TEMPLATE: &str = include_str!("../templates/authorize.html");
/// Error page template, same deal.
const OAUTH_ERROR_TEMPLATE: &str = include_str!("../templates/oauth_error.html");

/// Browser poll cadence baked into the landing page.
const POLL_INTERVAL_MS: u32 = 1500;

/// Shared context for all route handlers.
#[derive(Clone)]
pub struct ServerContext {
    pub store: Arc<Store>,
    pub config: Arc<ServerConfig>,
    pub coordinator: Arc<AuthorizationCoordinator>,
    pub tokens: Arc<TokenService>,
    pub introspection: Arc<IntrospectionService>,
    pub admin: Arc<AdminService>,
}

impl ServerContext {
    /// Wire up all services over one store and configuration.
    #[must_use]
    pub fn new(store: Arc<Store>, config: Arc<ServerConfig>) -> Self {
        Self {
            coordinator: Arc::new(AuthorizationCoordinator::new(store.clone(), config.clone())),
            tokens: Arc::new(TokenService::new(store.clone(), config.clone())),
            introspection: Arc::new(IntrospectionService::new(store.clone(), config.clone())),
            admin: Arc::new(AdminService::new(store.clone())),
            store,
            config,
        }
    }
}

/// The complete route tree.
pub fn routes(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    authorize_route(ctx.clone())
        .or(agent_authenticate_route(ctx.clone()))
        .or(check_status_route(ctx.clone()))
        .or(token_route(ctx.clone()))
        .or(introspect_route(ctx.clone()))
        .or(revoke_route(ctx.clone()))
        .or(discovery_route(ctx.clone()))
        .or(jwks_route())
        .or(admin_routes(ctx))
        .recover(handle_rejection)
}

fn with_context(
    ctx: ServerContext,
) -> impl Filter<Extract = (ServerContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// JSON reply carrying the OAuth error wire format and its status.
fn oauth_error_reply(error: &OAuthError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(warp::reply::json(error), status)
}

// ── /authorize ──────────────────────────────────────────────────────────

fn authorize_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("authorize")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_context(ctx))
        .and_then(handle_authorize)
}

async fn handle_authorize(
    params: HashMap<String, String>,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    let parsed = match AuthorizeParams::from_query(&params) {
        Ok(parsed) => parsed,
        Err(error) => return Ok(render_error_page(&error)),
    };

    match ctx.coordinator.begin_authorization(parsed).await {
        Ok(request) => {
            let client_name = ctx
                .store
                .get_client(&request.client_id)
                .await
                .map_or_else(|| request.client_id.clone(), |c| c.name);
            let html = AUTHORIZE_TEMPLATE
                .replace("{{REQUEST_ID}}", &html_escape(&request.request_id))
                .replace("{{CLIENT_NAME}}", &html_escape(&client_name))
                .replace("{{POLL_INTERVAL_MS}}", &POLL_INTERVAL_MS.to_string());
            Ok(warp::reply::html(html))
        }
        Err(error) => Ok(render_error_page(&error)),
    }
}

/// Render the HTML error page. Always HTTP 200: at this stage the request is
/// not bound to a verified redirect URI, so the page itself is the error
/// surface and is meant for a human.
fn render_error_page(error: &OAuthError) -> warp::reply::Html<String> {
    let html = OAUTH_ERROR_TEMPLATE
        .replace("{{ERROR}}", &html_escape(error.kind.as_str()))
        .replace("{{DESCRIPTION}}", &html_escape(&error.description));
    warp::reply::html(html)
}

/// Minimal HTML entity escaping for template interpolation.
fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ── /api/agent/authenticate ─────────────────────────────────────────────

fn agent_authenticate_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "agent" / "authenticate")
        .and(warp::post())
        .and(warp::body::json::<AgentAuthenticateRequest>())
        .and(with_context(ctx))
        .and_then(handle_agent_authenticate)
}

async fn handle_agent_authenticate(
    request: AgentAuthenticateRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.coordinator.authenticate_agent(request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

// ── /api/check-status ───────────────────────────────────────────────────

fn check_status_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "check-status")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_context(ctx))
        .and_then(handle_check_status)
}

async fn handle_check_status(
    params: HashMap<String, String>,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    let Some(request_id) = params.get("request_id") else {
        return Ok(oauth_error_reply(&OAuthError::invalid_request(
            "Missing request_id parameter",
        )));
    };

    match ctx.coordinator.poll_status(request_id).await {
        Ok(document) => Ok(warp::reply::with_status(
            warp::reply::json(&document),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

// ── /token ──────────────────────────────────────────────────────────────

fn token_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("token")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(
            warp::body::json::<TokenRequest>()
                .or(warp::body::form::<TokenRequest>())
                .unify(),
        )
        .and(with_context(ctx))
        .and_then(handle_token)
}

async fn handle_token(
    auth_header: Option<String>,
    mut request: TokenRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match apply_basic_credentials(
        auth_header.as_deref(),
        &mut request.client_id,
        &mut request.client_secret,
    ) {
        Ok(()) => {}
        Err(error) => return Ok(oauth_error_reply(&error)),
    }

    match ctx.tokens.grant(request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

/// Merge `client_secret_basic` credentials into a request. The header wins
/// over body fields; a malformed Basic header is a client-auth failure.
fn apply_basic_credentials(
    auth_header: Option<&str>,
    client_id: &mut String,
    client_secret: &mut String,
) -> Result<(), OAuthError> {
    let Some(header) = auth_header else {
        return Ok(());
    };
    let Some(encoded) = header.strip_prefix("Basic ") else {
        // Bearer or other schemes are not client authentication here.
        return Ok(());
    };

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| OAuthError::invalid_client("Malformed Basic authorization header"))?;
    let (id, secret) = decoded
        .split_once(':')
        .ok_or_else(|| OAuthError::invalid_client("Malformed Basic authorization header"))?;

    *client_id = id.to_owned();
    *client_secret = secret.to_owned();
    Ok(())
}

// ── /introspect and /revoke ─────────────────────────────────────────────

fn introspect_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("introspect")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(
            warp::body::json::<TokenQueryRequest>()
                .or(warp::body::form::<TokenQueryRequest>())
                .unify(),
        )
        .and(with_context(ctx))
        .and_then(handle_introspect)
}

async fn handle_introspect(
    auth_header: Option<String>,
    mut request: TokenQueryRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match apply_basic_credentials(
        auth_header.as_deref(),
        &mut request.client_id,
        &mut request.client_secret,
    ) {
        Ok(()) => {}
        Err(error) => return Ok(oauth_error_reply(&error)),
    }

    match ctx.introspection.introspect(request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

fn revoke_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("revoke")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(
            warp::body::json::<TokenQueryRequest>()
                .or(warp::body::form::<TokenQueryRequest>())
                .unify(),
        )
        .and(with_context(ctx))
        .and_then(handle_revoke)
}

async fn handle_revoke(
    auth_header: Option<String>,
    mut request: TokenQueryRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match apply_basic_credentials(
        auth_header.as_deref(),
        &mut request.client_id,
        &mut request.client_secret,
    ) {
        Ok(()) => {}
        Err(error) => return Ok(oauth_error_reply(&error)),
    }

    match ctx.introspection.revoke(request).await {
        // RFC 7009: revocation presents a success façade; the body is empty.
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({})),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

// ── Discovery and JWKS ──────────────────────────────────────────────────

fn discovery_route(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!(".well-known" / "oauth-authorization-server")
        .and(warp::get())
        .and(with_context(ctx))
        .map(|ctx: ServerContext| {
            let issuer = &ctx.config.auth.issuer;
            warp::reply::json(&serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/token"),
                "introspection_endpoint": format!("{issuer}/introspect"),
                "revocation_endpoint": format!("{issuer}/revoke"),
                "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
                "response_types_supported": ["code"],
                "grant_types_supported": ["authorization_code", "refresh_token"],
                "code_challenge_methods_supported": ["S256"],
                "token_endpoint_auth_methods_supported": ["client_secret_post", "client_secret_basic"],
                "scopes_supported": crate::constants::oauth::SUPPORTED_SCOPES,
                "token_endpoint_auth_signing_alg_values_supported": ["HS256"],
            }))
        })
}

fn jwks_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!(".well-known" / "jwks.json")
        .and(warp::get())
        .map(|| {
            // HS256 is symmetric; there is no public key to publish.
            warp::reply::json(&serde_json::json!({ "keys": [] }))
        })
}

// ── /api/admin ──────────────────────────────────────────────────────────

fn admin_routes(
    ctx: ServerContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let create_agent = warp::path!("api" / "admin" / "agents")
        .and(warp::post())
        .and(warp::body::json::<CreateAgentRequest>())
        .and(with_context(ctx.clone()))
        .and_then(handle_create_agent);

    let list_agents = warp::path!("api" / "admin" / "agents")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_list_agents);

    let get_agent = warp::path!("api" / "admin" / "agents" / String)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_get_agent);

    let delete_agent = warp::path!("api" / "admin" / "agents" / String)
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and_then(handle_delete_agent);

    let create_client = warp::path!("api" / "admin" / "clients")
        .and(warp::post())
        .and(warp::body::json::<CreateClientRequest>())
        .and(with_context(ctx.clone()))
        .and_then(handle_create_client);

    let list_clients = warp::path!("api" / "admin" / "clients")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_list_clients);

    let get_client = warp::path!("api" / "admin" / "clients" / String)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_get_client);

    let update_client = warp::path!("api" / "admin" / "clients" / String)
        .and(warp::put())
        .and(warp::body::json::<UpdateClientRequest>())
        .and(with_context(ctx.clone()))
        .and_then(handle_update_client);

    let delete_client = warp::path!("api" / "admin" / "clients" / String)
        .and(warp::delete())
        .and(with_context(ctx))
        .and_then(handle_delete_client);

    create_agent
        .or(list_agents)
        .or(get_agent)
        .or(delete_agent)
        .or(create_client)
        .or(list_clients)
        .or(get_client)
        .or(update_client)
        .or(delete_client)
}

async fn handle_create_agent(
    request: CreateAgentRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.create_agent(request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::CREATED,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_list_agents(ctx: ServerContext) -> Result<impl Reply, Rejection> {
    let agents = ctx.admin.list_agents().await;
    Ok(warp::reply::json(&serde_json::json!({ "agents": agents })))
}

async fn handle_get_agent(agent_id: String, ctx: ServerContext) -> Result<impl Reply, Rejection> {
    match ctx.admin.get_agent(&agent_id).await {
        Ok(agent) => Ok(warp::reply::with_status(
            warp::reply::json(&agent),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_delete_agent(
    agent_id: String,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.delete_agent(&agent_id).await {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "success": true })),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_create_client(
    request: CreateClientRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.create_client(request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::CREATED,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_list_clients(ctx: ServerContext) -> Result<impl Reply, Rejection> {
    let clients = ctx.admin.list_clients().await;
    Ok(warp::reply::json(&serde_json::json!({ "clients": clients })))
}

async fn handle_get_client(
    client_id: String,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.get_client(&client_id).await {
        Ok(client) => Ok(warp::reply::with_status(
            warp::reply::json(&client),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_update_client(
    client_id: String,
    request: UpdateClientRequest,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.update_client(&client_id, request).await {
        Ok(client) => Ok(warp::reply::with_status(
            warp::reply::json(&client),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

async fn handle_delete_client(
    client_id: String,
    ctx: ServerContext,
) -> Result<impl Reply, Rejection> {
    match ctx.admin.delete_client(&client_id).await {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "success": true })),
            StatusCode::OK,
        )),
        Err(error) => Ok(oauth_error_reply(&error)),
    }
}

// ── Rejection handling ──────────────────────────────────────────────────

/// Convert warp rejections into the JSON error wire format.
async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, error) = if rejection.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            OAuthError::not_found("Resource"),
        )
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request(format!("Invalid request body: {e}")),
        )
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("Invalid query string"),
        )
    } else if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            OAuthError::invalid_request("Method not allowed"),
        )
    } else {
        tracing::error!("unhandled rejection: {rejection:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, OAuthError::server_error())
    };

    Ok(warp::reply::with_status(warp::reply::json(&error), status))
}
