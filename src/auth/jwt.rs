//! Session token signing
//!
//! Tokens are standard JWTs carrying a random key/value pair and an expiry.
//! The HMAC secret is generated when the signer is built and lives only in
//! memory, so a restart invalidates every outstanding token.
//!
//! Expiry lives in the custom `expire` claim (unix seconds) and is checked
//! by the session service, not by `jsonwebtoken`, so that an expired token
//! is reported as such rather than as a generic decode failure.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{GateError, Result};

/// Token lifetime: 30 minutes
pub const TOKEN_TTL_SECS: i64 = 30 * 60;

/// Secret length in bytes
const SECRET_LEN: usize = 32;

/// Payload stored in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Vault lookup key
    pub key: String,
    /// Value the vault must hold for `key`
    pub value: String,
    /// Expiration time (unix seconds)
    pub expire: i64,
}

impl TokenClaims {
    /// Claims issued at `issued_at`, expiring after the fixed TTL
    pub fn new(key: String, value: String, issued_at: i64) -> Self {
        Self {
            key,
            value,
            expire: issued_at + TOKEN_TTL_SECS,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expire
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Why a presented token was not accepted
///
/// Callers only see validity; the reason is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token could not be decoded")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token was signed with an unexpected algorithm")]
    AlgorithmMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token key is not in the vault")]
    UnknownKey,
    #[error("token value does not match the vault")]
    ValueMismatch,
}

/// JWT signer and verifier
#[derive(Clone)]
pub struct TokenSigner {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    /// Create a signer with a fresh random secret
    pub fn new(algorithm: Algorithm) -> Result<Self> {
        let mut secret = [0u8; SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| GateError::Internal(format!("Failed to generate signing secret: {}", e)))?;
        Self::with_secret(&secret, algorithm)
    }

    /// Create a signer from a known secret
    ///
    /// Lets tokens be checked by (or accepted from) another implementation
    /// that shares the secret.
    pub fn with_secret(secret: &[u8], algorithm: Algorithm) -> Result<Self> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(GateError::Config(format!(
                "{:?} is not an HMAC algorithm",
                algorithm
            )));
        }
        if secret.is_empty() {
            return Err(GateError::Config("signing secret must not be empty".into()));
        }

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign claims into a compact JWT
    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| GateError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature and algorithm and decode the claims
    ///
    /// Does not check expiry or the vault.
    pub fn verify(&self, token: &str) -> std::result::Result<TokenClaims, TokenRejection> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenRejection::AlgorithmMismatch
                }
                _ => TokenRejection::Malformed,
            })
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-that-is-at-least-32-characters-long";

    fn claims() -> TokenClaims {
        TokenClaims::new("key-1".into(), "value-1".into(), Utc::now().timestamp())
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = TokenSigner::new(Algorithm::HS256).unwrap();
        let token = signer.sign(&claims()).unwrap();

        // header.claims.signature
        assert_eq!(token.split('.').count(), 3);

        let decoded = signer.verify(&token).unwrap();
        assert_eq!(decoded.key, "key-1");
        assert_eq!(decoded.value, "value-1");
        assert!(!decoded.is_expired());
    }

    #[test]
    fn test_expire_is_thirty_minutes_out() {
        let claims = TokenClaims::new("k".into(), "v".into(), 1_000);
        assert_eq!(claims.expire, 1_000 + 1_800);
        assert!(!claims.is_expired_at(2_799));
        assert!(claims.is_expired_at(2_800));
    }

    #[test]
    fn test_each_signer_has_its_own_secret() {
        let first = TokenSigner::new(Algorithm::HS256).unwrap();
        let second = TokenSigner::new(Algorithm::HS256).unwrap();

        let token = first.sign(&claims()).unwrap();
        assert_eq!(second.verify(&token), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let hs512 = TokenSigner::with_secret(SECRET, Algorithm::HS512).unwrap();
        let hs256 = TokenSigner::with_secret(SECRET, Algorithm::HS256).unwrap();

        let token = hs512.sign(&claims()).unwrap();
        assert_eq!(hs256.verify(&token), Err(TokenRejection::AlgorithmMismatch));
    }

    #[test]
    fn test_malformed_token() {
        let signer = TokenSigner::new(Algorithm::HS256).unwrap();
        assert_eq!(signer.verify("invalid-token"), Err(TokenRejection::Malformed));
        assert_eq!(signer.verify(""), Err(TokenRejection::Malformed));
    }

    #[test]
    fn test_tampered_claims() {
        let signer = TokenSigner::with_secret(SECRET, Algorithm::HS256).unwrap();
        let token = signer.sign(&claims()).unwrap();

        let other = TokenClaims::new("key-2".into(), "value-2".into(), Utc::now().timestamp());
        let other_token = signer.sign(&other).unwrap();

        // Splice the second payload onto the first signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other_token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(signer.verify(&forged), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_interop_with_plain_jsonwebtoken() {
        let signer = TokenSigner::with_secret(SECRET, Algorithm::HS256).unwrap();
        let token = signer.sign(&claims()).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        let decoded = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(SECRET),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims["key"], "key-1");
        assert!(decoded.claims["expire"].is_i64());
    }

    #[test]
    fn test_non_hmac_rejected() {
        assert!(TokenSigner::with_secret(SECRET, Algorithm::RS256).is_err());
        assert!(TokenSigner::with_secret(b"", Algorithm::HS256).is_err());
    }

    #[test]
    fn test_random_secret_is_256_bits() {
        assert_eq!(SECRET_LEN, 32);
        let signer = TokenSigner::new(Algorithm::HS256).unwrap();
        let claims = TokenClaims::new("k".into(), "v".into(), 0);
        let token = signer.sign(&claims).unwrap();
        assert_eq!(signer.verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_verify_leaves_expiry_to_caller() {
        let signer = TokenSigner::with_secret(SECRET, Algorithm::HS256).unwrap();
        let claims = TokenClaims::new("k".into(), "v".into(), 0);
        let token = signer.sign(&claims).unwrap();

        let decoded = signer.verify(&token).unwrap();
        assert!(decoded.is_expired_at(Utc::now().timestamp()));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = TokenSigner::with_secret(SECRET, Algorithm::HS256).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("test-secret"));
    }
}
