// ABOUTME: Admin provisioning of agents and clients: registration, secret issuance-once, CRUD
// ABOUTME: Secrets are hashed before storage; the plaintext appears only in the creation response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

//! # Admin registration
//!
//! The admin surface is unauthenticated in this core; a deployment must
//! front `/api/admin/*` with an authenticated control plane. The binary
//! warns about this at startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{oauth::DEFAULT_GRANT_TYPES, prefixes};
use crate::crypto;
use crate::errors::OAuthError;
use crate::models::{Agent, Client};
use crate::store::Store;
use crate::validation;

/// Warning attached to every secret-bearing creation response.
const SECRET_WARNING: &str =
    "Store this secret now. It is shown only once and cannot be recovered.";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentRequest {
    pub user_email: String,
    pub user_name: String,
    /// Caller-chosen id; generated when omitted
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    pub agent_id: String,
    /// Plaintext secret, revealed exactly once
    pub agent_secret: String,
    pub user_email: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub warning: &'static str,
}

/// Agent view without the secret hash.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub user_email: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Agent> for AgentSummary {
    fn from(agent: Agent) -> Self {
        Self {
            agent_id: agent.agent_id,
            user_email: agent.user_email,
            user_name: agent.user_name,
            created_at: agent.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateClientResponse {
    pub client_id: String,
    /// Plaintext secret, revealed exactly once
    pub client_secret: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub warning: &'static str,
}

/// Client view without the secret hash.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Client> for ClientSummary {
    fn from(client: Client) -> Self {
        Self {
            client_id: client.client_id,
            client_name: client.name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            created_at: client.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateClientRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
}

/// Agent and client provisioning.
pub struct AdminService {
    store: Arc<Store>,
}

impl AdminService {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Register a new agent and return its secret exactly once.
    ///
    /// # Errors
    /// `invalid_request` for a bad email, malformed id, or id collision.
    pub async fn create_agent(
        &self,
        request: CreateAgentRequest,
    ) -> Result<CreateAgentResponse, OAuthError> {
        if !validation::is_valid_email(&request.user_email) {
            return Err(OAuthError::invalid_request("Invalid user_email"));
        }

        let agent_id = match request.agent_id {
            Some(id) => {
                if !validation::is_valid_identifier(&id) {
                    return Err(OAuthError::invalid_request(
                        "agent_id must be at least 3 characters of [A-Za-z0-9_-]",
                    ));
                }
                id
            }
            None => crypto::random_id(prefixes::AGENT_ID, 12)?,
        };

        let agent_secret = crypto::random_secret()?;
        let secret_hash = Self::hash_blocking(agent_secret.clone()).await?;

        let agent = Agent {
            agent_id: agent_id.clone(),
            secret_hash,
            user_email: request.user_email.clone(),
            user_name: request.user_name.clone(),
            created_at: Utc::now(),
        };
        let created_at = agent.created_at;

        if !self.store.insert_agent(agent).await {
            return Err(OAuthError::invalid_request("agent_id already exists"));
        }

        info!(agent_id = %agent_id, "agent registered");
        Ok(CreateAgentResponse {
            agent_id,
            agent_secret,
            user_email: request.user_email,
            user_name: request.user_name,
            created_at,
            warning: SECRET_WARNING,
        })
    }

    pub async fn list_agents(&self) -> Vec<AgentSummary> {
        self.store
            .list_agents()
            .await
            .into_iter()
            .map(AgentSummary::from)
            .collect()
    }

    /// # Errors
    /// `not_found` for an unknown agent.
    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, OAuthError> {
        self.store
            .get_agent(agent_id)
            .await
            .map(AgentSummary::from)
            .ok_or_else(|| OAuthError::not_found("Agent"))
    }

    /// # Errors
    /// `not_found` for an unknown agent.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), OAuthError> {
        if self.store.delete_agent(agent_id).await {
            info!(agent_id = %agent_id, "agent deleted");
            Ok(())
        } else {
            Err(OAuthError::not_found("Agent"))
        }
    }

    /// Register a new client and return its secret exactly once.
    ///
    /// # Errors
    /// `invalid_request` for missing/invalid redirect URIs, a malformed id,
    /// or an id collision.
    pub async fn create_client(
        &self,
        request: CreateClientRequest,
    ) -> Result<CreateClientResponse, OAuthError> {
        if request.redirect_uris.is_empty() {
            return Err(OAuthError::invalid_request(
                "At least one redirect URI is required",
            ));
        }
        for uri in &request.redirect_uris {
            if !validation::is_valid_url(uri) {
                return Err(OAuthError::invalid_request(format!(
                    "Invalid redirect URI: {uri}"
                )));
            }
        }

        let client_id = match request.client_id {
            Some(id) => {
                if !validation::is_valid_identifier(&id) {
                    return Err(OAuthError::invalid_request(
                        "client_id must be at least 3 characters of [A-Za-z0-9_-]",
                    ));
                }
                id
            }
            None => crypto::random_id(prefixes::CLIENT_ID, 12)?,
        };

        let client_secret = crypto::random_secret()?;
        let secret_hash = Self::hash_blocking(client_secret.clone()).await?;

        let client = Client {
            client_id: client_id.clone(),
            secret_hash,
            name: request.client_name.clone(),
            redirect_uris: request.redirect_uris.clone(),
            grant_types: DEFAULT_GRANT_TYPES.iter().map(|&g| g.to_owned()).collect(),
            created_at: Utc::now(),
        };
        let created_at = client.created_at;
        let grant_types = client.grant_types.clone();

        if !self.store.insert_client(client).await {
            return Err(OAuthError::invalid_request("client_id already exists"));
        }

        info!(client_id = %client_id, "client registered");
        Ok(CreateClientResponse {
            client_id,
            client_secret,
            client_name: request.client_name,
            redirect_uris: request.redirect_uris,
            grant_types,
            created_at,
            warning: SECRET_WARNING,
        })
    }

    pub async fn list_clients(&self) -> Vec<ClientSummary> {
        self.store
            .list_clients()
            .await
            .into_iter()
            .map(ClientSummary::from)
            .collect()
    }

    /// # Errors
    /// `not_found` for an unknown client.
    pub async fn get_client(&self, client_id: &str) -> Result<ClientSummary, OAuthError> {
        self.store
            .get_client(client_id)
            .await
            .map(ClientSummary::from)
            .ok_or_else(|| OAuthError::not_found("Client"))
    }

    /// Partial update of `client_name` and/or `redirect_uris`.
    ///
    /// # Errors
    /// `invalid_request` for invalid URIs, `not_found` for an unknown client.
    pub async fn update_client(
        &self,
        client_id: &str,
        request: UpdateClientRequest,
    ) -> Result<ClientSummary, OAuthError> {
        if let Some(uris) = &request.redirect_uris {
            if uris.is_empty() {
                return Err(OAuthError::invalid_request(
                    "At least one redirect URI is required",
                ));
            }
            for uri in uris {
                if !validation::is_valid_url(uri) {
                    return Err(OAuthError::invalid_request(format!(
                        "Invalid redirect URI: {uri}"
                    )));
                }
            }
        }

        self.store
            .update_client(client_id, request.client_name, request.redirect_uris)
            .await
            .map(ClientSummary::from)
            .ok_or_else(|| OAuthError::not_found("Client"))
    }

    /// # Errors
    /// `not_found` for an unknown client.
    pub async fn delete_client(&self, client_id: &str) -> Result<(), OAuthError> {
        if self.store.delete_client(client_id).await {
            info!(client_id = %client_id, "client deleted");
            Ok(())
        } else {
            Err(OAuthError::not_found("Client"))
        }
    }

    /// bcrypt off the async executor, as all hashing here is.
    async fn hash_blocking(secret: String) -> Result<String, OAuthError> {
        tokio::task::spawn_blocking(move || crypto::hash_secret(&secret))
            .await
            .map_err(|e| {
                tracing::error!("hashing task panicked: {e}");
                OAuthError::server_error()
            })?
            .map_err(|e| {
                tracing::error!("secret hashing failed: {e:#}");
                OAuthError::server_error()
            })
    }
}
