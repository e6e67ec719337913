// ABOUTME: Edge cases for the syntactic validators
// ABOUTME: Redirect matching must never normalize or prefix-match
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use agentauth_server::validation::{
    is_supported_challenge_method, is_valid_code_challenge, is_valid_code_verifier,
    is_valid_email, is_valid_identifier, is_valid_url, redirect_uri_allowed,
};

#[test]
fn email_validation() {
    assert!(is_valid_email("owner@example.com"));
    assert!(is_valid_email("first.last+tag@sub.example.io"));

    assert!(!is_valid_email("plain"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("user@"));
    assert!(!is_valid_email("user@nodot"));
    assert!(!is_valid_email("user name@example.com"));
}

#[test]
fn url_validation() {
    assert!(is_valid_url("https://example.com/cb"));
    assert!(is_valid_url("http://localhost:3000/callback?app=1"));
    assert!(is_valid_url("custom-scheme://device/cb"));

    assert!(!is_valid_url("example.com/cb"));
    assert!(!is_valid_url("//missing-scheme.com"));
    assert!(!is_valid_url(""));
}

#[test]
fn identifier_validation() {
    assert!(is_valid_identifier("agent_mt7XkrbQSKoDLN1l"));
    assert!(is_valid_identifier("a-b"));
    assert!(is_valid_identifier("123"));

    assert!(!is_valid_identifier(""));
    assert!(!is_valid_identifier("ab"));
    assert!(!is_valid_identifier("bad id"));
    assert!(!is_valid_identifier("bad/id"));
    assert!(!is_valid_identifier("bad@id"));
}

#[test]
fn challenge_method_is_exactly_s256() {
    assert!(is_supported_challenge_method("S256"));
    assert!(!is_supported_challenge_method("plain"));
    assert!(!is_supported_challenge_method("S256 "));
    assert!(!is_supported_challenge_method(""));
}

#[test]
fn redirect_membership_is_exact_match_only() {
    let allowed = vec![
        "https://example.com/cb".to_owned(),
        "https://example.com/other".to_owned(),
    ];

    assert!(redirect_uri_allowed(&allowed, "https://example.com/cb"));
    assert!(redirect_uri_allowed(&allowed, "https://example.com/other"));

    // No trailing-slash normalization, no prefix or query matching.
    assert!(!redirect_uri_allowed(&allowed, "https://example.com/cb/"));
    assert!(!redirect_uri_allowed(&allowed, "https://example.com/cb/deep"));
    assert!(!redirect_uri_allowed(&allowed, "https://example.com/cb?x=1"));
    assert!(!redirect_uri_allowed(&allowed, "HTTPS://example.com/cb"));
    assert!(!redirect_uri_allowed(&[], "https://example.com/cb"));
}

#[test]
fn pkce_parameter_shapes() {
    let ok = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    assert!(is_valid_code_challenge(ok));
    assert!(is_valid_code_verifier(ok));

    assert!(!is_valid_code_challenge("too-short"));
    assert!(!is_valid_code_verifier("wrong"));
    assert!(!is_valid_code_challenge(&"a".repeat(129)));
    assert!(is_valid_code_verifier(&"a".repeat(128)));
    // Verifier allows '.' and '~'; challenge (base64url) does not.
    assert!(is_valid_code_verifier(&format!("{}.~", &"a".repeat(41))));
    assert!(!is_valid_code_challenge(&format!("{}.~", &"a".repeat(41))));
}
