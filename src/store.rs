// ABOUTME: In-memory keyed repository for agents, clients, requests, codes, and tokens
// ABOUTME: Single writer lock makes compound transitions atomic; a background sweeper removes expired rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

//! # Store
//!
//! The store is the single owner of all mutable state. Every map lives
//! behind one `tokio::sync::RwLock`, so a compound mutation (authenticate
//! transition, poll delivery, code exchange, cascading revoke) runs under a
//! single write guard and is observed atomically. Expensive work (bcrypt,
//! JWT signing) happens in the services, outside the lock.
//!
//! Expiry is enforced twice: at use time by every reader, and periodically
//! by the sweeper. The sweeper is a soft bound; correctness never depends on
//! it having run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{Agent, AuthRequest, Client, RefreshEntry, RequestStatus, TokenRecord};

#[derive(Default)]
struct StoreInner {
    agents: HashMap<String, Agent>,
    clients: HashMap<String, Client>,
    requests: HashMap<String, AuthRequest>,
    /// code -> request_id
    codes: HashMap<String, String>,
    /// token_id -> record
    tokens: HashMap<String, TokenRecord>,
    /// refresh token -> entry
    refresh_tokens: HashMap<String, RefreshEntry>,
}

/// Outcome of the authenticate compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticateCas {
    /// Transitioned `pending -> authenticated`, code bound
    Done,
    /// Request was pending but past its TTL; it is now `expired`
    Expired,
    /// Request is in a non-pending state
    NotPending(RequestStatus),
    NotFound,
}

/// Outcome of the poll compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCas {
    NotFound,
    /// Still waiting for the agent
    Pending,
    /// Terminal failure; the message is what the browser shows
    Failed(String),
    /// First observation of `authenticated`; the request is now `completed`
    /// and the code will never be handed out again
    Delivered {
        code: String,
        state: String,
        redirect_uri: String,
    },
}

/// Rows removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub requests: usize,
    pub codes: usize,
    pub tokens: usize,
    pub refresh_tokens: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.requests + self.codes + self.tokens + self.refresh_tokens
    }
}

/// The in-memory repository.
///
/// Cloning is cheap; all clones share the same state. The sweeper task holds
/// a clone of the inner lock and shuts down when signalled on drop, the same
/// arrangement the background cleanup of an in-memory cache uses.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store without a sweeper (tests drive `sweep_expired`
    /// directly).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            shutdown_tx: None,
        }
    }

    /// Create a store with a background sweeper running at `interval`.
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn with_sweeper(interval: Duration) -> Self {
        let inner = Arc::new(RwLock::new(StoreInner::default()));
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        let sweep_target = inner.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sweep an empty store.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = Self::sweep_inner(&sweep_target, Utc::now()).await;
                        if report.total() > 0 {
                            debug!(
                                requests = report.requests,
                                codes = report.codes,
                                tokens = report.tokens,
                                refresh_tokens = report.refresh_tokens,
                                "swept expired entries"
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("store sweeper received shutdown signal");
                        break;
                    }
                }
            }
        });

        Self {
            inner,
            shutdown_tx: Some(Arc::new(shutdown_tx)),
        }
    }

    // ── Agents ──────────────────────────────────────────────────────────

    /// Insert a new agent. Returns false if the id is taken.
    pub async fn insert_agent(&self, agent: Agent) -> bool {
        let mut inner = self.inner.write().await;
        if inner.agents.contains_key(&agent.agent_id) {
            return false;
        }
        inner.agents.insert(agent.agent_id.clone(), agent);
        true
    }

    pub async fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.inner.read().await.agents.get(agent_id).cloned()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        agents
    }

    pub async fn delete_agent(&self, agent_id: &str) -> bool {
        self.inner.write().await.agents.remove(agent_id).is_some()
    }

    // ── Clients ─────────────────────────────────────────────────────────

    /// Insert a new client. Returns false if the id is taken.
    pub async fn insert_client(&self, client: Client) -> bool {
        let mut inner = self.inner.write().await;
        if inner.clients.contains_key(&client.client_id) {
            return false;
        }
        inner.clients.insert(client.client_id.clone(), client);
        true
    }

    pub async fn get_client(&self, client_id: &str) -> Option<Client> {
        self.inner.read().await.clients.get(client_id).cloned()
    }

    pub async fn list_clients(&self) -> Vec<Client> {
        let inner = self.inner.read().await;
        let mut clients: Vec<Client> = inner.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        clients
    }

    /// Partial update of a client's mutable fields. Returns the updated
    /// client, or None if it does not exist.
    pub async fn update_client(
        &self,
        client_id: &str,
        name: Option<String>,
        redirect_uris: Option<Vec<String>>,
    ) -> Option<Client> {
        let mut inner = self.inner.write().await;
        let client = inner.clients.get_mut(client_id)?;
        if let Some(name) = name {
            client.name = name;
        }
        if let Some(uris) = redirect_uris {
            client.redirect_uris = uris;
        }
        Some(client.clone())
    }

    pub async fn delete_client(&self, client_id: &str) -> bool {
        self.inner.write().await.clients.remove(client_id).is_some()
    }

    // ── Authorization requests ──────────────────────────────────────────

    pub async fn insert_request(&self, request: AuthRequest) {
        self.inner
            .write()
            .await
            .requests
            .insert(request.request_id.clone(), request);
    }

    pub async fn get_request(&self, request_id: &str) -> Option<AuthRequest> {
        self.inner.read().await.requests.get(request_id).cloned()
    }

    /// Transition a pending request to `expired`. Idempotent in effect:
    /// returns false when the request is absent or already terminal.
    pub async fn mark_request_expired(&self, request_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.requests.get_mut(request_id) {
            Some(request) if request.status == RequestStatus::Pending => {
                request.status = RequestStatus::Expired;
                true
            }
            _ => false,
        }
    }

    /// Transition a pending request to `error` with a message. A failed
    /// credential attempt terminates the request (one-shot policy).
    pub async fn fail_request(&self, request_id: &str, error: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.requests.get_mut(request_id) {
            Some(request) if request.status == RequestStatus::Pending => {
                request.status = RequestStatus::Error;
                request.error = Some(error.to_owned());
                true
            }
            _ => false,
        }
    }

    /// Compare-and-set for the agent authentication transition: re-checks
    /// `pending` and the TTL under the write guard, then patches the request
    /// and binds the code in the same critical section.
    pub async fn complete_authentication(
        &self,
        request_id: &str,
        agent_id: &str,
        model: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthenticateCas {
        let mut inner = self.inner.write().await;
        let Some(request) = inner.requests.get_mut(request_id) else {
            return AuthenticateCas::NotFound;
        };
        match request.status {
            RequestStatus::Pending if request.is_expired_at(now) => {
                request.status = RequestStatus::Expired;
                AuthenticateCas::Expired
            }
            RequestStatus::Pending => {
                request.status = RequestStatus::Authenticated;
                request.agent_id = Some(agent_id.to_owned());
                request.model = Some(model.to_owned());
                request.code = Some(code.to_owned());
                inner
                    .codes
                    .insert(code.to_owned(), request_id.to_owned());
                AuthenticateCas::Done
            }
            status => AuthenticateCas::NotPending(status),
        }
    }

    /// Compare-and-set for the status poll. The `authenticated -> completed`
    /// transition happens under the write guard, so the code is delivered to
    /// at most one poll.
    pub async fn poll_consume(&self, request_id: &str, now: DateTime<Utc>) -> PollCas {
        let mut inner = self.inner.write().await;
        let Some(request) = inner.requests.get_mut(request_id) else {
            return PollCas::NotFound;
        };
        match request.status {
            RequestStatus::Pending if request.is_expired_at(now) => {
                request.status = RequestStatus::Expired;
                PollCas::Failed("Authorization request has expired".to_owned())
            }
            RequestStatus::Pending => PollCas::Pending,
            RequestStatus::Authenticated => {
                request.status = RequestStatus::Completed;
                // Invariant: authenticated implies a bound code.
                let code = request.code.clone().unwrap_or_default();
                PollCas::Delivered {
                    code,
                    state: request.state.clone(),
                    redirect_uri: request.redirect_uri.clone(),
                }
            }
            RequestStatus::Completed => {
                PollCas::Failed("Authorization code already delivered".to_owned())
            }
            RequestStatus::Expired => {
                PollCas::Failed("Authorization request has expired".to_owned())
            }
            RequestStatus::Error => PollCas::Failed(
                request
                    .error
                    .clone()
                    .unwrap_or_else(|| "Authorization failed".to_owned()),
            ),
        }
    }

    // ── Authorization codes ─────────────────────────────────────────────

    /// Resolve a code to its authorization request without consuming it.
    pub async fn resolve_code(&self, code: &str) -> Option<AuthRequest> {
        let inner = self.inner.read().await;
        let request_id = inner.codes.get(code)?;
        inner.requests.get(request_id).cloned()
    }

    /// Remove a code and its authorization request. Used when a failed
    /// exchange (bad verifier, expired request) must still consume the code.
    pub async fn discard_code(&self, code: &str) {
        let mut inner = self.inner.write().await;
        if let Some(request_id) = inner.codes.remove(code) {
            inner.requests.remove(&request_id);
        }
    }

    /// Commit a successful exchange: re-validate the code binding under the
    /// write guard, persist the token and refresh entries, then delete the
    /// code and request last. Returns false if the code was consumed
    /// concurrently; the caller reports `invalid_grant`.
    pub async fn commit_exchange(
        &self,
        code: &str,
        request_id: &str,
        token: TokenRecord,
        refresh: RefreshEntry,
    ) -> bool {
        let mut inner = self.inner.write().await;

        let still_bound = inner.codes.get(code).is_some_and(|id| id == request_id)
            && inner
                .requests
                .get(request_id)
                .is_some_and(|r| r.code.as_deref() == Some(code));
        if !still_bound {
            return false;
        }

        inner
            .refresh_tokens
            .insert(refresh.refresh_token.clone(), refresh);
        inner.tokens.insert(token.token_id.clone(), token);

        // Single-use: the code and its request go away only after the token
        // state is in place.
        inner.codes.remove(code);
        inner.requests.remove(request_id);
        true
    }

    // ── Tokens ──────────────────────────────────────────────────────────

    pub async fn insert_token(&self, token: TokenRecord) {
        self.inner
            .write()
            .await
            .tokens
            .insert(token.token_id.clone(), token);
    }

    pub async fn get_token(&self, token_id: &str) -> Option<TokenRecord> {
        self.inner.read().await.tokens.get(token_id).cloned()
    }

    /// Look up a token record by its access-token string. Linear scan;
    /// adequate at this scale, and introspection and revocation see exactly
    /// the record the token endpoint persisted.
    pub async fn find_token_by_access(&self, access_token: &str) -> Option<TokenRecord> {
        let inner = self.inner.read().await;
        inner
            .tokens
            .values()
            .find(|t| t.access_token == access_token)
            .cloned()
    }

    pub async fn insert_refresh(&self, entry: RefreshEntry) {
        self.inner
            .write()
            .await
            .refresh_tokens
            .insert(entry.refresh_token.clone(), entry);
    }

    pub async fn get_refresh(&self, refresh_token: &str) -> Option<RefreshEntry> {
        self.inner
            .read()
            .await
            .refresh_tokens
            .get(refresh_token)
            .cloned()
    }

    /// Persist the access token minted by a refresh grant and repoint the
    /// refresh entry at it. The refresh token itself is not rotated.
    pub async fn record_refreshed_token(&self, token: TokenRecord) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.refresh_tokens.get_mut(&token.refresh_token) else {
            return false;
        };
        entry.token_id = token.token_id.clone();
        inner.tokens.insert(token.token_id.clone(), token);
        true
    }

    /// Revoke a token by id and cascade to its refresh entry. Idempotent;
    /// concurrent revokes converge on the same state.
    pub async fn revoke_token(&self, token_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(token) = inner.tokens.get_mut(token_id) else {
            return false;
        };
        token.revoked = true;
        let refresh_token = token.refresh_token.clone();
        if let Some(entry) = inner.refresh_tokens.get_mut(&refresh_token) {
            entry.revoked = true;
        }
        true
    }

    /// Revoke a refresh token and cascade to its linked access token.
    /// Idempotent.
    pub async fn revoke_refresh(&self, refresh_token: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.refresh_tokens.get_mut(refresh_token) else {
            return false;
        };
        entry.revoked = true;
        let token_id = entry.token_id.clone();
        if let Some(token) = inner.tokens.get_mut(&token_id) {
            token.revoked = true;
        }
        true
    }

    // ── Sweeping ────────────────────────────────────────────────────────

    /// Remove every expired row: authorization requests past their TTL
    /// (with any code still bound to them), refresh entries past theirs,
    /// and token rows whose refresh window has closed. Token rows must
    /// outlive their access expiry because the refresh grant recovers
    /// `model` and `scope` from them.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SweepReport {
        Self::sweep_inner(&self.inner, now).await
    }

    async fn sweep_inner(inner: &Arc<RwLock<StoreInner>>, now: DateTime<Utc>) -> SweepReport {
        let mut guard = inner.write().await;
        let mut report = SweepReport::default();

        let expired_requests: Vec<String> = guard
            .requests
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.request_id.clone())
            .collect();
        for request_id in &expired_requests {
            guard.requests.remove(request_id);
        }
        report.requests = expired_requests.len();

        let dead_codes: Vec<String> = guard
            .codes
            .iter()
            .filter(|(_, request_id)| !guard.requests.contains_key(*request_id))
            .map(|(code, _)| code.clone())
            .collect();
        for code in &dead_codes {
            guard.codes.remove(code);
        }
        report.codes = dead_codes.len();

        let expired_refresh: Vec<String> = guard
            .refresh_tokens
            .values()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.refresh_token.clone())
            .collect();
        for refresh_token in &expired_refresh {
            guard.refresh_tokens.remove(refresh_token);
        }
        report.refresh_tokens = expired_refresh.len();

        let expired_tokens: Vec<String> = guard
            .tokens
            .values()
            .filter(|t| now > t.refresh_expires_at)
            .map(|t| t.token_id.clone())
            .collect();
        for token_id in &expired_tokens {
            guard.tokens.remove(token_id);
        }
        report.tokens = expired_tokens.len();

        report
    }

    /// Row counts, mostly for tests and the health endpoint.
    pub async fn counts(&self) -> StoreCounts {
        let inner = self.inner.read().await;
        StoreCounts {
            agents: inner.agents.len(),
            clients: inner.clients.len(),
            requests: inner.requests.len(),
            codes: inner.codes.len(),
            tokens: inner.tokens.len(),
            refresh_tokens: inner.refresh_tokens.len(),
        }
    }
}

/// Current row counts per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub agents: usize,
    pub clients: usize,
    pub requests: usize,
    pub codes: usize,
    pub tokens: usize,
    pub refresh_tokens: usize,
}

impl Drop for Store {
    fn drop(&mut self) {
        // Signal the sweeper on drop; errors mean the channel is already
        // closed, which is fine.
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                debug!(error = ?e, "sweeper shutdown signal not delivered");
            }
        }
    }
}
