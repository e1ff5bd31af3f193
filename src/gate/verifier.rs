//! Gateway verifier
//!
//! Entry point for the HTTP layer. Classifies the request, then picks the
//! session flow from the route class and whether a token was presented.

use std::sync::Arc;

use crate::auth::{GuardRegistry, IdentifierGenerator, UuidGenerator};
use crate::config::GateConfig;
use crate::gate::{AccessLevel, Classification, RouteClass, RouteClassifier, SessionTokenService};
use crate::logging::{EventType, GateEvent, GateLogger};
use crate::types::{Decision, GateRequest, Result};

/// Top-level gate
#[derive(Debug)]
pub struct GatewayVerifier {
    config: Arc<GateConfig>,
    classifier: RouteClassifier,
    sessions: SessionTokenService,
    log: GateLogger,
}

impl GatewayVerifier {
    /// Validate the configuration and build the gate
    pub fn new(config: GateConfig) -> Result<Self> {
        Self::with_parts(config, &GuardRegistry::default(), Arc::new(UuidGenerator))
    }

    /// Build with extra guard protocols registered
    pub fn with_registry(config: GateConfig, registry: &GuardRegistry) -> Result<Self> {
        Self::with_parts(config, registry, Arc::new(UuidGenerator))
    }

    pub fn with_parts(
        config: GateConfig,
        registry: &GuardRegistry,
        ids: Arc<dyn IdentifierGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        let sessions = SessionTokenService::with_parts(&config, registry, ids)?;
        let classifier =
            RouteClassifier::new(config.protected_routes.clone(), config.limited_routes.clone());
        let log = GateLogger::new(config.logging);

        Ok(Self {
            config: Arc::new(config),
            classifier,
            sessions,
            log,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionTokenService {
        &self.sessions
    }

    /// Classify a request line
    pub fn classify(&self, request: &GateRequest) -> Classification {
        self.classifier.classify(&request.method, &request.path)
    }

    /// Decide on a request
    pub fn verify(&self, request: &GateRequest) -> Decision {
        let class = self.classify(request).class();

        let level = match class {
            RouteClass::Protected => AccessLevel::Protected,
            RouteClass::Limited => AccessLevel::Limited,
            RouteClass::Unprotected => {
                self.log.log(
                    GateEvent::new(EventType::Bypass)
                        .with_request(request)
                        .with_route(class),
                );
                return Decision::bypass();
            }
        };

        match request.token() {
            Some(token) => {
                self.log.log(
                    GateEvent::new(EventType::ReturningIdentity)
                        .with_request(request)
                        .with_route(class),
                );
                self.sessions.verify_returning_identity(request, token, level)
            }
            None => {
                self.log.log(
                    GateEvent::new(EventType::NewIdentity)
                        .with_request(request)
                        .with_route(class),
                );
                self.sessions.verify_new_identity(request, level)
            }
        }
    }
}
