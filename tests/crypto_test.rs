// ABOUTME: Laws for the crypto primitives: PKCE, secret hashing, JWT, randomness
// ABOUTME: Exercises the properties the rest of the system leans on
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use chrono::Utc;

use agentauth_server::crypto::{
    compute_s256_challenge, hash_secret, random_id, random_secret, sign_access_token,
    verify_access_token, verify_pkce, verify_secret, AccessTokenClaims,
};

#[test]
fn pkce_round_trip_holds_for_generated_verifiers() {
    for _ in 0..8 {
        let verifier = random_secret().unwrap();
        let challenge = compute_s256_challenge(&verifier);
        assert!(verify_pkce(&verifier, &challenge, "S256"));
    }
}

#[test]
fn pkce_rejects_wrong_verifier_and_method() {
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    assert!(verify_pkce(verifier, challenge, "S256"));
    assert!(!verify_pkce("wrong", challenge, "S256"));
    assert!(!verify_pkce(verifier, challenge, "plain"));
    assert!(!verify_pkce(verifier, challenge, "S512"));
}

#[test]
fn secret_hash_verifies_and_embeds_parameters() {
    let hash = hash_secret("correct horse battery staple").unwrap();

    assert!(verify_secret("correct horse battery staple", &hash));
    assert!(!verify_secret("correct horse battery stable", &hash));
    assert!(!verify_secret("", &hash));

    // bcrypt modular crypt format with the configured work factor.
    assert!(hash.starts_with("$2"));

    // A second hash of the same input differs (fresh salt) but still verifies.
    let hash2 = hash_secret("correct horse battery staple").unwrap();
    assert_ne!(hash, hash2);
    assert!(verify_secret("correct horse battery staple", &hash2));
}

#[test]
fn verify_secret_is_false_on_garbage_hash() {
    assert!(!verify_secret("anything", "not-a-bcrypt-hash"));
    assert!(!verify_secret("anything", ""));
}

#[test]
fn jwt_round_trip_preserves_claims() {
    let secret = b"crypto-test-secret";
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        jti: "tok-test-1".into(),
        sub: "agent_mt7XkrbQSKoDLN1l".into(),
        client_id: "client_h2f9s8d7".into(),
        model: "browser-use".into(),
        scope: "openid profile".into(),
        iat: now,
        exp: now + 3600,
        iss: "http://localhost:8081".into(),
    };

    let token = sign_access_token(&claims, secret).unwrap();
    assert_eq!(token.split('.').count(), 3);

    let decoded = verify_access_token(&token, secret, "http://localhost:8081").unwrap();
    assert_eq!(decoded, claims);
}

#[test]
fn jwt_verification_failures_are_indistinct() {
    let secret = b"crypto-test-secret";
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        jti: "tok-test-1".into(),
        sub: "agent_a".into(),
        client_id: "client_b".into(),
        model: "m".into(),
        scope: "openid".into(),
        iat: now - 7200,
        exp: now - 3600,
        iss: "http://localhost:8081".into(),
    };
    let expired = sign_access_token(&claims, secret).unwrap();

    // Expired, wrong key, wrong issuer, malformed: all just None.
    assert!(verify_access_token(&expired, secret, "http://localhost:8081").is_none());

    let live = AccessTokenClaims {
        exp: now + 3600,
        ..claims
    };
    let token = sign_access_token(&live, secret).unwrap();
    assert!(verify_access_token(&token, b"other-key", "http://localhost:8081").is_none());
    assert!(verify_access_token(&token, secret, "http://elsewhere").is_none());
    assert!(verify_access_token("garbage", secret, "http://localhost:8081").is_none());
}

#[test]
fn random_ids_are_prefixed_unique_and_urlsafe() {
    let a = random_id("code_", 32).unwrap();
    let b = random_id("code_", 32).unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with("code_"));
    // 32 bytes -> 43 base64url chars, no padding.
    assert_eq!(a.len(), 5 + 43);
    assert!(a[5..]
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}
