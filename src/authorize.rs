// ABOUTME: Authorization request coordinator: begin, agent back-channel authenticate, status poll
// ABOUTME: Owns the pending/authenticated/completed state machine between browser and agent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

//! # Authorization request coordinator
//!
//! `/authorize` creates a pending request and hands the browser a landing
//! page carrying the `request_id`. The controlling agent reads the id from
//! the page and posts its credentials to the back channel; the browser polls
//! the status endpoint until the code is ready and then follows the redirect
//! back to the client.
//!
//! ```text
//! pending ── authenticate_agent(valid) ──▶ authenticated
//! pending ── authenticate_agent(invalid) ─▶ error
//! pending ── sweep / poll past expiry ───▶ expired
//! authenticated ── poll_status (first) ──▶ completed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::constants::prefixes;
use crate::crypto;
use crate::errors::OAuthError;
use crate::models::{AuthRequest, RequestStatus};
use crate::store::{AuthenticateCas, PollCas, Store};
use crate::validation;

/// Parsed `/authorize` query parameters.
#[derive(Debug, Clone)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scope: Option<String>,
}

impl AuthorizeParams {
    /// Parse query parameters, reporting the first missing field.
    ///
    /// # Errors
    /// Returns `invalid_request` naming the missing parameter.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, OAuthError> {
        let required = |name: &str| -> Result<String, OAuthError> {
            params
                .get(name)
                .cloned()
                .ok_or_else(|| OAuthError::invalid_request(format!("Missing {name} parameter")))
        };

        Ok(Self {
            response_type: required("response_type")?,
            client_id: required("client_id")?,
            redirect_uri: required("redirect_uri")?,
            state: required("state")?,
            code_challenge: required("code_challenge")?,
            code_challenge_method: required("code_challenge_method")?,
            scope: params.get("scope").cloned(),
        })
    }
}

/// Back-channel authentication request posted by the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentAuthenticateRequest {
    pub request_id: String,
    pub agent_id: String,
    pub agent_secret: String,
    /// What the agent is running; flows into token claims
    pub model: String,
}

/// Back-channel authentication success body.
#[derive(Debug, Serialize)]
pub struct AgentAuthenticateResponse {
    pub success: bool,
}

/// Status document served to the polling browser.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusDocument {
    Pending,
    Error {
        error: String,
    },
    /// Returned exactly once; delivering it completes the request
    Authenticated {
        code: String,
        state: String,
        redirect_uri: String,
    },
}

/// Coordinates the authorization request lifecycle between the browser-side
/// polling loop and the agent back channel.
pub struct AuthorizationCoordinator {
    store: Arc<Store>,
    config: Arc<ServerConfig>,
}

impl AuthorizationCoordinator {
    #[must_use]
    pub fn new(store: Arc<Store>, config: Arc<ServerConfig>) -> Self {
        Self { store, config }
    }

    /// Begin an authorization: validate the request and create a pending
    /// `AuthRequest`. The route layer renders the landing page around the
    /// returned record.
    ///
    /// Every failure here renders as an HTML error page, never a redirect:
    /// at this stage the request is not yet bound to a verified redirect
    /// URI, and redirecting an unvalidated one would forward the error to an
    /// attacker-chosen location.
    ///
    /// # Errors
    /// Returns the protocol error to render.
    pub async fn begin_authorization(
        &self,
        params: AuthorizeParams,
    ) -> Result<AuthRequest, OAuthError> {
        if params.response_type != "code" {
            return Err(OAuthError::unsupported_response_type());
        }

        let client = self
            .store
            .get_client(&params.client_id)
            .await
            .ok_or_else(|| OAuthError::invalid_request("Unknown client_id"))?;

        if !validation::is_valid_url(&params.redirect_uri) {
            return Err(OAuthError::invalid_request(
                "redirect_uri must be an absolute URL",
            ));
        }
        if !validation::redirect_uri_allowed(&client.redirect_uris, &params.redirect_uri) {
            return Err(OAuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }
        if params.state.is_empty() {
            return Err(OAuthError::invalid_request("state must not be empty"));
        }
        if !validation::is_supported_challenge_method(&params.code_challenge_method) {
            return Err(OAuthError::invalid_request(
                "code_challenge_method must be 'S256'",
            ));
        }
        if !validation::is_valid_code_challenge(&params.code_challenge) {
            return Err(OAuthError::invalid_request(
                "code_challenge must be 43-128 base64url characters",
            ));
        }

        let request_id = crypto::random_id(prefixes::REQUEST_ID, 16)?;
        let now = Utc::now();
        let request = AuthRequest {
            request_id: request_id.clone(),
            client_id: client.client_id.clone(),
            redirect_uri: params.redirect_uri,
            state: params.state,
            code_challenge: params.code_challenge,
            code_challenge_method: params.code_challenge_method,
            scope: params
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| self.config.auth.default_scope.clone()),
            status: RequestStatus::Pending,
            code: None,
            agent_id: None,
            model: None,
            error: None,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.auth.auth_request_ttl_secs),
        };

        self.store.insert_request(request.clone()).await;
        info!(
            request_id = %request_id,
            client_id = %client.client_id,
            "authorization request created"
        );
        Ok(request)
    }

    /// Handle the agent back-channel authentication.
    ///
    /// A failed credential check terminates the request (one-shot policy):
    /// a second guess requires starting a fresh authorization.
    ///
    /// # Errors
    /// `not_found` for an unknown request, `request_expired` past the TTL,
    /// `invalid_request` for a non-pending request, `invalid_client` for bad
    /// credentials.
    pub async fn authenticate_agent(
        &self,
        request: AgentAuthenticateRequest,
    ) -> Result<AgentAuthenticateResponse, OAuthError> {
        let auth_request = self
            .store
            .get_request(&request.request_id)
            .await
            .ok_or_else(|| OAuthError::not_found("Authorization request"))?;

        let now = Utc::now();
        match auth_request.status {
            RequestStatus::Pending if auth_request.is_expired_at(now) => {
                self.store.mark_request_expired(&request.request_id).await;
                return Err(OAuthError::request_expired());
            }
            RequestStatus::Pending => {}
            status => {
                return Err(OAuthError::invalid_request(format!(
                    "Authorization request is not pending (status: {status})"
                )));
            }
        }

        let Some(agent) = self.store.get_agent(&request.agent_id).await else {
            warn!(
                request_id = %request.request_id,
                agent_id = %request.agent_id,
                "authentication attempt for unknown agent"
            );
            self.store
                .fail_request(&request.request_id, "Invalid agent credentials")
                .await;
            return Err(OAuthError::invalid_client("Invalid agent credentials"));
        };

        let secret = request.agent_secret.clone();
        let hash = agent.secret_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || crypto::verify_secret(&secret, &hash))
                .await
                .unwrap_or(false);

        if !verified {
            warn!(
                request_id = %request.request_id,
                agent_id = %request.agent_id,
                "agent credential verification failed; terminating request"
            );
            self.store
                .fail_request(&request.request_id, "Invalid agent credentials")
                .await;
            return Err(OAuthError::invalid_client("Invalid agent credentials"));
        }

        let code = crypto::random_id(prefixes::AUTH_CODE, 32)?;
        match self
            .store
            .complete_authentication(
                &request.request_id,
                &agent.agent_id,
                &request.model,
                &code,
                Utc::now(),
            )
            .await
        {
            AuthenticateCas::Done => {
                info!(
                    request_id = %request.request_id,
                    agent_id = %agent.agent_id,
                    "agent authenticated"
                );
                Ok(AgentAuthenticateResponse { success: true })
            }
            AuthenticateCas::Expired => Err(OAuthError::request_expired()),
            AuthenticateCas::NotPending(status) => Err(OAuthError::invalid_request(format!(
                "Authorization request is not pending (status: {status})"
            ))),
            AuthenticateCas::NotFound => Err(OAuthError::not_found("Authorization request")),
        }
    }

    /// Serve the browser poll. Delivering the code transitions the request
    /// to `completed`, so a reload or back-navigation never sees it again.
    ///
    /// # Errors
    /// `not_found` for an unknown request id.
    pub async fn poll_status(&self, request_id: &str) -> Result<StatusDocument, OAuthError> {
        match self.store.poll_consume(request_id, Utc::now()).await {
            PollCas::NotFound => Err(OAuthError::not_found("Authorization request")),
            PollCas::Pending => Ok(StatusDocument::Pending),
            PollCas::Failed(error) => Ok(StatusDocument::Error { error }),
            PollCas::Delivered {
                code,
                state,
                redirect_uri,
            } => {
                info!(request_id = %request_id, "authorization code delivered to poller");
                Ok(StatusDocument::Authenticated {
                    code,
                    state,
                    redirect_uri,
                })
            }
        }
    }
}
