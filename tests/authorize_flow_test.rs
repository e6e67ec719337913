// ABOUTME: Coordinator state machine: begin, agent authenticate, poll, one-shot failure, expiry
// ABOUTME: Covers single-delivery of the code and every terminal transition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

mod common;

use agentauth_server::authorize::{AgentAuthenticateRequest, StatusDocument};
use agentauth_server::errors::OAuthErrorKind;
use agentauth_server::models::RequestStatus;
use common::{
    agent_login, authorize_params, expired_request, seed_fixtures, test_context, AGENT_ID,
    CHALLENGE, REDIRECT_URI,
};

#[tokio::test]
async fn begin_creates_pending_request_with_defaults() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let request = ctx
        .coordinator
        .begin_authorization(authorize_params("xyz123"))
        .await
        .unwrap();

    assert!(request.request_id.starts_with("req_"));
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.scope, "openid profile");
    assert_eq!(request.state, "xyz123");
    assert_eq!(request.code_challenge, CHALLENGE);
    assert!(request.code.is_none());
    assert!(request.expires_at > request.created_at);

    // Round-trips through the store.
    let stored = ctx.store.get_request(&request.request_id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
}

#[tokio::test]
async fn begin_respects_explicit_scope() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let mut params = authorize_params("s");
    params.scope = Some("openid email".into());
    let request = ctx.coordinator.begin_authorization(params).await.unwrap();
    assert_eq!(request.scope, "openid email");
}

#[tokio::test]
async fn begin_rejects_bad_requests_without_touching_store() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let cases = vec![
        {
            let mut p = authorize_params("s");
            p.response_type = "token".into();
            (p, OAuthErrorKind::UnsupportedResponseType)
        },
        {
            let mut p = authorize_params("s");
            p.client_id = "client_unknown".into();
            (p, OAuthErrorKind::InvalidRequest)
        },
        {
            let mut p = authorize_params("s");
            p.redirect_uri = "https://evil.example/cb".into();
            (p, OAuthErrorKind::InvalidRequest)
        },
        {
            let mut p = authorize_params("s");
            p.redirect_uri = format!("{REDIRECT_URI}/");
            (p, OAuthErrorKind::InvalidRequest)
        },
        {
            let mut p = authorize_params("s");
            p.code_challenge_method = "plain".into();
            (p, OAuthErrorKind::InvalidRequest)
        },
        {
            let mut p = authorize_params("s");
            p.code_challenge = "short".into();
            (p, OAuthErrorKind::InvalidRequest)
        },
        {
            let mut p = authorize_params("s");
            p.state = String::new();
            (p, OAuthErrorKind::InvalidRequest)
        },
    ];

    for (params, expected) in cases {
        let err = ctx.coordinator.begin_authorization(params).await.unwrap_err();
        assert_eq!(err.kind, expected, "{}", err.description);
    }
    assert_eq!(ctx.store.counts().await.requests, 0);
}

#[tokio::test]
async fn happy_transition_chain() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let request = ctx
        .coordinator
        .begin_authorization(authorize_params("abc"))
        .await
        .unwrap();

    // Browser polls before the agent arrives.
    assert_eq!(
        ctx.coordinator.poll_status(&request.request_id).await.unwrap(),
        StatusDocument::Pending
    );

    let response = ctx
        .coordinator
        .authenticate_agent(agent_login(&request.request_id))
        .await
        .unwrap();
    assert!(response.success);

    let stored = ctx.store.get_request(&request.request_id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Authenticated);
    assert_eq!(stored.agent_id.as_deref(), Some(AGENT_ID));
    assert_eq!(stored.model.as_deref(), Some("browser-use"));

    match ctx.coordinator.poll_status(&request.request_id).await.unwrap() {
        StatusDocument::Authenticated {
            code,
            state,
            redirect_uri,
        } => {
            assert!(code.starts_with("code_"));
            assert_eq!(state, "abc");
            assert_eq!(redirect_uri, REDIRECT_URI);
        }
        other => panic!("expected authenticated, got {other:?}"),
    }

    // Second poll must not return the code again.
    match ctx.coordinator.poll_status(&request.request_id).await.unwrap() {
        StatusDocument::Error { .. } => {}
        other => panic!("expected error after delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_credentials_terminate_the_request() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let request = ctx
        .coordinator
        .begin_authorization(authorize_params("abc"))
        .await
        .unwrap();

    let mut login = agent_login(&request.request_id);
    login.agent_secret = "wrong-secret".into();
    let err = ctx.coordinator.authenticate_agent(login).await.unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::InvalidClient);

    // One-shot policy: even the correct secret cannot recover the request.
    let err = ctx
        .coordinator
        .authenticate_agent(agent_login(&request.request_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::InvalidRequest);

    match ctx.coordinator.poll_status(&request.request_id).await.unwrap() {
        StatusDocument::Error { error } => assert_eq!(error, "Invalid agent credentials"),
        other => panic!("expected error document, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_agent_terminates_the_request() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let request = ctx
        .coordinator
        .begin_authorization(authorize_params("abc"))
        .await
        .unwrap();

    let mut login = agent_login(&request.request_id);
    login.agent_id = "agent_who".into();
    let err = ctx.coordinator.authenticate_agent(login).await.unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::InvalidClient);

    let stored = ctx.store.get_request(&request.request_id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Error);
}

#[tokio::test]
async fn expired_request_rejects_authentication_and_polls_as_error() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;
    ctx.store.insert_request(expired_request("req_exp1")).await;

    let err = ctx
        .coordinator
        .authenticate_agent(agent_login("req_exp1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::RequestExpired);

    match ctx.coordinator.poll_status("req_exp1").await.unwrap() {
        StatusDocument::Error { .. } => {}
        other => panic!("expected error for expired request, got {other:?}"),
    }
    assert_eq!(
        ctx.store.get_request("req_exp1").await.unwrap().status,
        RequestStatus::Expired
    );
}

#[tokio::test]
async fn poll_transitions_pending_past_expiry() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;
    ctx.store.insert_request(expired_request("req_exp2")).await;

    match ctx.coordinator.poll_status("req_exp2").await.unwrap() {
        StatusDocument::Error { .. } => {}
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(
        ctx.store.get_request("req_exp2").await.unwrap().status,
        RequestStatus::Expired
    );
}

#[tokio::test]
async fn unknown_request_ids_are_not_found() {
    let ctx = test_context();
    seed_fixtures(&ctx).await;

    let err = ctx.coordinator.poll_status("req_missing").await.unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::NotFound);

    let err = ctx
        .coordinator
        .authenticate_agent(AgentAuthenticateRequest {
            request_id: "req_missing".into(),
            agent_id: AGENT_ID.into(),
            agent_secret: "whatever".into(),
            model: "m".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, OAuthErrorKind::NotFound);
}
