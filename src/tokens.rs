// ABOUTME: Token endpoint grants: authorization-code with PKCE and non-rotating refresh
// ABOUTME: Issues HS256 JWT access tokens and opaque refresh tokens bound to (agent, client, scope, model)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::constants::prefixes;
use crate::crypto::{self, AccessTokenClaims};
use crate::errors::OAuthError;
use crate::models::{Client, RefreshEntry, TokenRecord, TokenResponse};
use crate::store::Store;
use crate::validation;

/// Token endpoint request body. Accepted as JSON or form-encoded; client
/// credentials may instead arrive in an `Authorization: Basic` header, which
/// the route layer merges in before calling the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

/// Authenticate a client by id and secret.
///
/// Used by the token, introspection, and revocation endpoints; all of them
/// refuse to act for unauthenticated callers.
///
/// # Errors
/// Returns `invalid_client` without distinguishing unknown ids from wrong
/// secrets.
pub(crate) async fn authenticate_client(
    store: &Store,
    client_id: &str,
    client_secret: &str,
) -> Result<Client, OAuthError> {
    let Some(client) = store.get_client(client_id).await else {
        warn!(client_id = %client_id, "token request for unknown client");
        return Err(OAuthError::invalid_client("Client authentication failed"));
    };

    let secret = client_secret.to_owned();
    let hash = client.secret_hash.clone();
    let verified = tokio::task::spawn_blocking(move || crypto::verify_secret(&secret, &hash))
        .await
        .unwrap_or(false);

    if verified {
        Ok(client)
    } else {
        warn!(client_id = %client_id, "client secret verification failed");
        Err(OAuthError::invalid_client("Client authentication failed"))
    }
}

/// Implements the token endpoint grants.
pub struct TokenService {
    store: Arc<Store>,
    config: Arc<ServerConfig>,
}

impl TokenService {
    #[must_use]
    pub fn new(store: Arc<Store>, config: Arc<ServerConfig>) -> Self {
        Self { store, config }
    }

    /// Dispatch on `grant_type`.
    ///
    /// # Errors
    /// `invalid_client` (401) before anything else; then the grant-specific
    /// errors of §4.5.
    pub async fn grant(&self, request: TokenRequest) -> Result<TokenResponse, OAuthError> {
        let client =
            authenticate_client(&self.store, &request.client_id, &request.client_secret).await?;

        if !client.grant_types.iter().any(|g| g == &request.grant_type) {
            return Err(OAuthError::unsupported_grant_type());
        }

        match request.grant_type.as_str() {
            "authorization_code" => self.authorization_code_grant(&client, request).await,
            "refresh_token" => self.refresh_token_grant(&client, request).await,
            _ => Err(OAuthError::unsupported_grant_type()),
        }
    }

    async fn authorization_code_grant(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let code = request
            .code
            .ok_or_else(|| OAuthError::invalid_request("Missing code parameter"))?;
        let code_verifier = request
            .code_verifier
            .ok_or_else(|| OAuthError::invalid_request("Missing code_verifier parameter"))?;

        let Some(auth_request) = self.store.resolve_code(&code).await else {
            return Err(OAuthError::invalid_grant("Invalid authorization code"));
        };
        if auth_request.code.as_deref() != Some(code.as_str()) {
            return Err(OAuthError::invalid_grant("Invalid authorization code"));
        }

        if auth_request.client_id != client.client_id {
            warn!(
                client_id = %client.client_id,
                request_id = %auth_request.request_id,
                "code presented by a different client than it was issued to"
            );
            return Err(OAuthError::invalid_grant(
                "Code was issued to a different client",
            ));
        }

        // Both a malformed verifier and a mismatched one consume the code:
        // a failed exchange must not leave the code open to further guesses.
        let pkce_ok = validation::is_valid_code_verifier(&code_verifier)
            && crypto::verify_pkce(
                &code_verifier,
                &auth_request.code_challenge,
                &auth_request.code_challenge_method,
            );
        if !pkce_ok {
            warn!(
                request_id = %auth_request.request_id,
                "PKCE verification failed; consuming code"
            );
            self.store.discard_code(&code).await;
            return Err(OAuthError::invalid_grant("Invalid code_verifier"));
        }

        let now = Utc::now();
        if auth_request.is_expired_at(now) {
            self.store.discard_code(&code).await;
            return Err(OAuthError::invalid_grant("Authorization code expired"));
        }

        let (Some(agent_id), Some(model)) = (auth_request.agent_id, auth_request.model) else {
            tracing::error!(
                request_id = %auth_request.request_id,
                "authenticated request without agent_id/model"
            );
            return Err(OAuthError::server_error());
        };

        let (token, refresh) =
            self.mint_token_pair(&agent_id, &client.client_id, &model, &auth_request.scope, now)?;
        let response = Self::token_response(&token, self.config.auth.access_token_ttl_secs);

        if !self
            .store
            .commit_exchange(&code, &auth_request.request_id, token, refresh)
            .await
        {
            // Lost the race to a concurrent exchange; single-use holds.
            return Err(OAuthError::invalid_grant("Invalid authorization code"));
        }

        info!(
            client_id = %client.client_id,
            agent_id = %agent_id,
            "authorization code exchanged"
        );
        Ok(response)
    }

    async fn refresh_token_grant(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = request
            .refresh_token
            .ok_or_else(|| OAuthError::invalid_request("Missing refresh_token parameter"))?;

        let now = Utc::now();
        let entry = self
            .store
            .get_refresh(&refresh_token)
            .await
            .ok_or_else(|| OAuthError::invalid_grant("Invalid refresh token"))?;
        if entry.revoked {
            return Err(OAuthError::invalid_grant("Refresh token has been revoked"));
        }
        if entry.is_expired_at(now) {
            return Err(OAuthError::invalid_grant("Refresh token expired"));
        }
        if entry.client_id != client.client_id {
            warn!(
                client_id = %client.client_id,
                "refresh token presented by a different client than it was issued to"
            );
            return Err(OAuthError::invalid_grant(
                "Refresh token was issued to a different client",
            ));
        }

        // The previous access token carries the model and scope forward.
        let Some(previous) = self.store.get_token(&entry.token_id).await else {
            tracing::error!(
                refresh_token_id = %entry.token_id,
                "refresh entry points at a missing token record"
            );
            return Err(OAuthError::server_error());
        };

        // Refresh tokens are not rotated: the entry and its expiry survive,
        // only a fresh access token is minted.
        let token = self.build_token_record(
            &entry.agent_id,
            &client.client_id,
            &previous.model,
            &previous.scope,
            refresh_token.clone(),
            entry.expires_at,
            now,
        )?;
        let response = Self::token_response(&token, self.config.auth.access_token_ttl_secs);

        if !self.store.record_refreshed_token(token).await {
            // Entry disappeared between validation and persist (sweeper race).
            return Err(OAuthError::invalid_grant("Invalid refresh token"));
        }

        info!(
            client_id = %client.client_id,
            agent_id = %entry.agent_id,
            "access token refreshed"
        );
        Ok(response)
    }

    /// Mint a fresh token pair for a code exchange.
    fn mint_token_pair(
        &self,
        agent_id: &str,
        client_id: &str,
        model: &str,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<(TokenRecord, RefreshEntry), OAuthError> {
        let refresh_token = crypto::random_id(prefixes::REFRESH_TOKEN, 32)?;
        let refresh_expires_at = now + Duration::seconds(self.config.auth.refresh_token_ttl_secs);

        let token = self.build_token_record(
            agent_id,
            client_id,
            model,
            scope,
            refresh_token.clone(),
            refresh_expires_at,
            now,
        )?;
        let refresh = RefreshEntry {
            refresh_token,
            token_id: token.token_id.clone(),
            agent_id: agent_id.to_owned(),
            client_id: client_id.to_owned(),
            expires_at: refresh_expires_at,
            revoked: false,
        };
        Ok((token, refresh))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_token_record(
        &self,
        agent_id: &str,
        client_id: &str,
        model: &str,
        scope: &str,
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, OAuthError> {
        let token_id = Uuid::new_v4().to_string();
        let access_expires_at = now + Duration::seconds(self.config.auth.access_token_ttl_secs);
        let claims = AccessTokenClaims {
            jti: token_id.clone(),
            sub: agent_id.to_owned(),
            client_id: client_id.to_owned(),
            model: model.to_owned(),
            scope: scope.to_owned(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            iss: self.config.auth.issuer.clone(),
        };
        let access_token = crypto::sign_access_token(&claims, &self.config.auth.jwt_secret)
            .map_err(|e| {
                tracing::error!("failed to sign access token: {e:#}");
                OAuthError::server_error()
            })?;

        Ok(TokenRecord {
            token_id,
            access_token,
            refresh_token,
            agent_id: agent_id.to_owned(),
            client_id: client_id.to_owned(),
            model: model.to_owned(),
            scope: scope.to_owned(),
            access_expires_at,
            refresh_expires_at,
            created_at: now,
            revoked: false,
        })
    }

    fn token_response(token: &TokenRecord, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: token.access_token.clone(),
            token_type: "Bearer".to_owned(),
            expires_in,
            refresh_token: token.refresh_token.clone(),
            scope: token.scope.clone(),
        }
    }
}
