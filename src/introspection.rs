// ABOUTME: RFC 7662 token introspection and RFC 7009 revocation with pair cascade
// ABOUTME: Active means: valid JWT, live store record, not revoked, bound to the asking client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::crypto;
use crate::errors::OAuthError;
use crate::store::Store;
use crate::tokens::authenticate_client;

/// Introspection / revocation request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQueryRequest {
    #[serde(default)]
    pub token: String,
    pub token_type_hint: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// RFC 7662 introspection response. Everything but `active` is omitted for
/// inactive tokens: a negative answer carries no further detail.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl IntrospectionResponse {
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            token_type: None,
            exp: None,
            iat: None,
            sub: None,
            iss: None,
            model: None,
        }
    }
}

/// Token metadata and revocation service.
pub struct IntrospectionService {
    store: Arc<Store>,
    config: Arc<ServerConfig>,
}

impl IntrospectionService {
    #[must_use]
    pub fn new(store: Arc<Store>, config: Arc<ServerConfig>) -> Self {
        Self { store, config }
    }

    /// Introspect a token for an authenticated client.
    ///
    /// With a `refresh_token` hint the refresh entry is checked first;
    /// otherwise the access-token path runs first and the refresh path is
    /// the fallback for tokens that do not verify as our JWTs.
    ///
    /// # Errors
    /// `invalid_client` when the caller's credentials do not validate.
    pub async fn introspect(
        &self,
        request: TokenQueryRequest,
    ) -> Result<IntrospectionResponse, OAuthError> {
        let client =
            authenticate_client(&self.store, &request.client_id, &request.client_secret).await?;

        // A wrong hint only changes the search order, per RFC 7662 §2.1.
        let response = if request.token_type_hint.as_deref() == Some("refresh_token") {
            match self
                .introspect_refresh(&request.token, &client.client_id)
                .await
            {
                Some(active) => Some(active),
                None => {
                    self.introspect_access(&request.token, &client.client_id)
                        .await
                }
            }
        } else {
            match self.introspect_access(&request.token, &client.client_id).await {
                Some(active) => Some(active),
                None => {
                    self.introspect_refresh(&request.token, &client.client_id)
                        .await
                }
            }
        };

        Ok(response.unwrap_or_else(IntrospectionResponse::inactive))
    }

    async fn introspect_access(
        &self,
        token: &str,
        client_id: &str,
    ) -> Option<IntrospectionResponse> {
        let claims = crypto::verify_access_token(
            token,
            &self.config.auth.jwt_secret,
            &self.config.auth.issuer,
        )?;

        let record = self.store.find_token_by_access(token).await?;
        if record.revoked || record.client_id != client_id {
            debug!(
                token_id = %record.token_id,
                "access token inactive (revoked or foreign client)"
            );
            return None;
        }
        if Utc::now() > record.access_expires_at {
            return None;
        }

        Some(IntrospectionResponse {
            active: true,
            scope: Some(record.scope),
            client_id: Some(record.client_id),
            token_type: Some("Bearer".to_owned()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            sub: Some(claims.sub),
            iss: Some(claims.iss),
            model: Some(record.model),
        })
    }

    async fn introspect_refresh(
        &self,
        token: &str,
        client_id: &str,
    ) -> Option<IntrospectionResponse> {
        let entry = self.store.get_refresh(token).await?;
        if entry.revoked || entry.client_id != client_id || entry.is_expired_at(Utc::now()) {
            return None;
        }

        // Model and scope live on the linked access token record.
        let linked = self.store.get_token(&entry.token_id).await?;

        Some(IntrospectionResponse {
            active: true,
            scope: Some(linked.scope),
            client_id: Some(entry.client_id),
            token_type: Some("refresh_token".to_owned()),
            exp: Some(entry.expires_at.timestamp()),
            iat: None,
            sub: Some(entry.agent_id),
            iss: None,
            model: Some(linked.model),
        })
    }

    /// Revoke a token (RFC 7009). Always succeeds for an authenticated
    /// client, even when the token is unknown or already revoked: the
    /// success façade denies probing for live tokens.
    ///
    /// Revoking either half of a token pair revokes the other; the cascade
    /// is best-effort and idempotent.
    ///
    /// # Errors
    /// `invalid_client` when the caller's credentials do not validate;
    /// this precedes any revocation attempt, so anonymous callers learn
    /// nothing.
    pub async fn revoke(&self, request: TokenQueryRequest) -> Result<(), OAuthError> {
        let client =
            authenticate_client(&self.store, &request.client_id, &request.client_secret).await?;

        let revoked = if request.token_type_hint.as_deref() == Some("refresh_token") {
            self.try_revoke_refresh(&request.token, &client.client_id)
                .await
                || self
                    .try_revoke_access(&request.token, &client.client_id)
                    .await
        } else {
            self.try_revoke_access(&request.token, &client.client_id)
                .await
                || self
                    .try_revoke_refresh(&request.token, &client.client_id)
                    .await
        };

        if revoked {
            info!(client_id = %client.client_id, "token revoked");
        } else {
            debug!(client_id = %client.client_id, "revocation no-op (unknown or foreign token)");
        }
        Ok(())
    }

    async fn try_revoke_access(&self, token: &str, client_id: &str) -> bool {
        match self.store.find_token_by_access(token).await {
            Some(record) if record.client_id == client_id => {
                self.store.revoke_token(&record.token_id).await
            }
            _ => false,
        }
    }

    async fn try_revoke_refresh(&self, token: &str, client_id: &str) -> bool {
        match self.store.get_refresh(token).await {
            Some(entry) if entry.client_id == client_id => {
                self.store.revoke_refresh(&entry.refresh_token).await
            }
            _ => false,
        }
    }
}
