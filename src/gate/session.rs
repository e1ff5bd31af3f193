//! Session token service
//!
//! Turns a request plus its access level into a `Decision`:
//!
//! - **new identity**: run the guard chain (unless the caller is already
//!   authenticated upstream) and issue a token on success.
//! - **returning identity**: verify the presented token against the signer
//!   and the key vault; any failure falls back to the new-identity flow.
//!
//! Guard failures deny protected routes and degrade limited routes to a
//! tokenless pass. Token failures never deny on their own.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::auth::{
    GuardChain, GuardRegistry, IdentifierGenerator, KeyVault, TokenClaims, TokenRejection,
    TokenSigner, UuidGenerator, VaultCheck,
};
use crate::config::{GateConfig, TokenType};
use crate::logging::{EventType, GateEvent, GateLogger};
use crate::types::{Decision, GateError, GateRequest, Result};

/// Attempts at finding an unused vault key before giving up
const MAX_ISSUE_ATTEMPTS: usize = 8;

/// Access level of a gated route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Protected,
    Limited,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Protected => write!(f, "protected"),
            AccessLevel::Limited => write!(f, "limited"),
        }
    }
}

/// Guard chain + key vault + signer
pub struct SessionTokenService {
    guards: GuardChain,
    vault: Arc<KeyVault>,
    signer: TokenSigner,
    ids: Arc<dyn IdentifierGenerator>,
    log: GateLogger,
}

impl SessionTokenService {
    /// Build with the default guards and UUID identifiers
    pub fn new(config: &GateConfig) -> Result<Self> {
        Self::with_parts(config, &GuardRegistry::default(), Arc::new(UuidGenerator))
    }

    /// Build with a custom guard registry and identifier source
    pub fn with_parts(
        config: &GateConfig,
        registry: &GuardRegistry,
        ids: Arc<dyn IdentifierGenerator>,
    ) -> Result<Self> {
        match config.token_type() {
            TokenType::JwtRandom => {}
            TokenType::JwtPassword => {
                return Err(GateError::Config(format!(
                    "token type {} is not implemented; remove the 'password' protocol",
                    TokenType::JwtPassword
                )));
            }
        }

        let guards = GuardChain::build(config, registry)?;
        let signer = TokenSigner::new(config.signing_algorithm()?)?;

        Ok(Self {
            guards,
            vault: Arc::new(KeyVault::new()),
            signer,
            ids,
            log: GateLogger::new(config.logging),
        })
    }

    pub fn vault(&self) -> &Arc<KeyVault> {
        &self.vault
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn guards(&self) -> &GuardChain {
        &self.guards
    }

    /// Verify a caller that has no usable token
    pub fn verify_new_identity(&self, request: &GateRequest, level: AccessLevel) -> Decision {
        let accepted = if request.externally_authenticated {
            self.log.log(
                GateEvent::new(EventType::ExternalIdentity)
                    .with_request(request)
                    .with_route(level),
            );
            true
        } else {
            self.guards.verify_identity(request)
        };

        if !accepted {
            return self.reject(request, level);
        }

        match self.issue_token() {
            Ok(token) => {
                self.log.log(
                    GateEvent::new(EventType::TokenIssued)
                        .with_request(request)
                        .with_route(level),
                );
                Decision::issued(token)
            }
            Err(e) => {
                self.log.failure("token issuance", &e);
                match level {
                    AccessLevel::Protected => self.reject(request, level),
                    // guards accepted, so no noToken marker
                    AccessLevel::Limited => Decision::bypass(),
                }
            }
        }
    }

    /// Verify a caller presenting `token`, re-authenticating on failure
    pub fn verify_returning_identity(
        &self,
        request: &GateRequest,
        token: &str,
        level: AccessLevel,
    ) -> Decision {
        match self.validate_token(token) {
            Ok(_) => {
                self.log.log(
                    GateEvent::new(EventType::TokenAccepted)
                        .with_request(request)
                        .with_route(level),
                );
                Decision::returning(token.to_string())
            }
            Err(rejection) => {
                self.log.log(
                    GateEvent::new(EventType::TokenRejected)
                        .with_request(request)
                        .with_route(level)
                        .with_reason(rejection),
                );
                self.verify_new_identity(request, level)
            }
        }
    }

    /// Issue a fresh token and record it in the vault
    pub fn issue_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let claims = TokenClaims::new(self.ids.generate()?, self.ids.generate()?, now);
            let token = self.signer.sign(&claims)?;

            if self
                .vault
                .try_insert(&claims.key, &claims.value, claims.expire)
            {
                return Ok(token);
            }
            tracing::warn!("Token key collision, regenerating");
        }

        Err(GateError::Internal(format!(
            "no unique token key after {} attempts",
            MAX_ISSUE_ATTEMPTS
        )))
    }

    /// Check signature, algorithm, expiry and vault entry
    pub fn validate_token(&self, token: &str) -> std::result::Result<TokenClaims, TokenRejection> {
        self.validate_token_at(token, Utc::now().timestamp())
    }

    fn validate_token_at(
        &self,
        token: &str,
        now: i64,
    ) -> std::result::Result<TokenClaims, TokenRejection> {
        let claims = self.signer.verify(token)?;

        // Vault lookup first so an expired entry is evicted either way
        let stored = self.vault.check(&claims.key, &claims.value, now);
        if claims.is_expired_at(now) {
            return Err(TokenRejection::Expired);
        }

        match stored {
            VaultCheck::Valid => Ok(claims),
            VaultCheck::Missing => Err(TokenRejection::UnknownKey),
            VaultCheck::Mismatch => Err(TokenRejection::ValueMismatch),
            VaultCheck::Expired => Err(TokenRejection::Expired),
        }
    }

    fn reject(&self, request: &GateRequest, level: AccessLevel) -> Decision {
        match level {
            AccessLevel::Protected => {
                self.log.log(
                    GateEvent::new(EventType::Denied)
                        .with_request(request)
                        .with_route(level),
                );
                Decision::deny()
            }
            AccessLevel::Limited => {
                self.log.log(
                    GateEvent::new(EventType::Degraded)
                        .with_request(request)
                        .with_route(level),
                );
                Decision::degraded()
            }
        }
    }
}

impl fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenService")
            .field("guards", &self.guards.names())
            .field("vault_entries", &self.vault.len())
            .field("signer", &self.signer)
            .finish()
    }
}
