// ABOUTME: Cryptographic primitives: secret hashing, PKCE S256, HS256 JWTs, secure randomness
// ABOUTME: Pure functions over byte strings; verification failures are deliberately indistinct
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 AgentAuth

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::oauth::CHALLENGE_METHOD_S256;

/// Claims carried by every access token this server signs.
///
/// `jti` is the issuing token record's id. It makes two tokens minted within
/// the same second distinct strings; claims are otherwise second-granular.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Token record id, also the uniqueness salt
    pub jti: String,
    /// Agent identifier the token was issued to
    pub sub: String,
    /// Client the token is bound to
    pub client_id: String,
    /// Model the agent declared at authentication time
    pub model: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Configured issuer
    pub iss: String,
}

/// Hash a secret with bcrypt.
///
/// The cost factor, salt, and parameters are all encoded in the returned
/// string, so verification needs nothing but the hash.
///
/// # Errors
/// Returns an error if bcrypt rejects the input (e.g. embedded NUL bytes).
pub fn hash_secret(plaintext: &str) -> Result<String> {
    let hash = bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)?;
    Ok(hash)
}

/// Verify a secret against a stored bcrypt hash.
///
/// Any parse or verification failure returns `false`; callers cannot
/// distinguish a malformed hash from a wrong secret.
#[must_use]
pub fn verify_secret(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Compute the S256 challenge for a verifier: `base64url(SHA256(verifier))`,
/// no padding (RFC 7636 §4.2).
#[must_use]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a PKCE `(verifier, challenge)` pair.
///
/// True iff `method` is `S256` and the computed challenge matches the stored
/// one. The comparison is constant-time to avoid leaking prefix information.
#[must_use]
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    if method != CHALLENGE_METHOD_S256 {
        return false;
    }
    let computed = compute_s256_challenge(code_verifier);
    computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}

/// Sign access-token claims with HS256.
///
/// # Errors
/// Returns an error if JWT encoding fails.
pub fn sign_access_token(claims: &AccessTokenClaims, secret: &[u8]) -> Result<String> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?;
    Ok(token)
}

/// Verify an HS256 access token: signature, issuer, and expiry.
///
/// Returns `None` on any failure without distinguishing the cause; a token
/// endpoint that reports *why* a token is bad is an oracle.
#[must_use]
pub fn verify_access_token(
    token: &str,
    secret: &[u8],
    expected_issuer: &str,
) -> Option<AccessTokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    // TTLs are measured against a single clock; no leeway is applied.
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_issuer(&[expected_issuer]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    decode::<AccessTokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .ok()
}

/// Fill `n` bytes from the system CSPRNG.
///
/// # Errors
/// Returns an error if the system RNG fails; the server cannot operate
/// securely without working randomness.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; n];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("system RNG failure: {e}");
        anyhow::anyhow!("system RNG failure")
    })?;
    Ok(bytes)
}

/// Generate an opaque identifier: `prefix` + base64url (no padding) of
/// `n_bytes` random bytes. The output alphabet is `[A-Za-z0-9_-]`.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn random_id(prefix: &str, n_bytes: usize) -> Result<String> {
    let bytes = random_bytes(n_bytes)?;
    Ok(format!(
        "{prefix}{}",
        general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    ))
}

/// Generate a 43-character base64url secret from 32 random bytes. Used for
/// agent and client secrets, which are revealed exactly once at creation.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn random_secret() -> Result<String> {
    random_id("", 32)
}

/// Generate a random 64-byte JWT signing secret.
///
/// Used when `JWT_SECRET` is not configured. Tokens signed with a generated
/// secret do not survive a restart, which matches the in-memory store.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn generate_jwt_secret() -> Result<[u8; 64]> {
    let rng = SystemRandom::new();
    let mut secret = [0u8; 64];
    rng.fill(&mut secret).map_err(|e| {
        tracing::error!("system RNG failure while generating JWT secret: {e}");
        anyhow::anyhow!("system RNG failure")
    })?;
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn pkce_rejects_non_s256_methods() {
        let challenge = compute_s256_challenge("verifier-value");
        assert!(!verify_pkce("verifier-value", &challenge, "plain"));
        assert!(!verify_pkce("verifier-value", &challenge, "s256"));
        assert!(!verify_pkce("verifier-value", &challenge, ""));
    }

    #[test]
    fn pkce_known_vector() {
        // RFC 7636 appendix B test vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(compute_s256_challenge(verifier), challenge);
        assert!(verify_pkce(verifier, challenge, "S256"));
        assert!(!verify_pkce("wrong", challenge, "S256"));
    }

    #[test]
    fn jwt_round_trip_and_issuer_check() {
        let secret = b"test-secret-key-for-unit-tests";
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            jti: "tok-test-1".into(),
            sub: "agent_abc".into(),
            client_id: "client_xyz".into(),
            model: "browser-use".into(),
            scope: "openid profile".into(),
            iat: now,
            exp: now + 3600,
            iss: "http://localhost:8081".into(),
        };

        let token = sign_access_token(&claims, secret).unwrap();
        let decoded = verify_access_token(&token, secret, "http://localhost:8081").unwrap();
        assert_eq!(decoded, claims);

        assert!(verify_access_token(&token, secret, "http://other-issuer").is_none());
        assert!(verify_access_token(&token, b"different-secret", "http://localhost:8081").is_none());
        assert!(verify_access_token("not.a.jwt", secret, "http://localhost:8081").is_none());
    }

    #[test]
    fn expired_jwt_is_invalid() {
        let secret = b"test-secret-key-for-unit-tests";
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            jti: "tok-test-1".into(),
            sub: "agent_abc".into(),
            client_id: "client_xyz".into(),
            model: "gpt-test".into(),
            scope: "openid".into(),
            iat: now - 7200,
            exp: now - 3600,
            iss: "http://localhost:8081".into(),
        };
        let token = sign_access_token(&claims, secret).unwrap();
        assert!(verify_access_token(&token, secret, "http://localhost:8081").is_none());
    }

    #[test]
    fn random_id_shape() {
        let id = random_id("req_", 16).unwrap();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), 4 + 22);
        assert!(id[4..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let secret = random_secret().unwrap();
        assert_eq!(secret.len(), 43);
    }
}
