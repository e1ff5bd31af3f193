//! Guard strategies and the guard chain
//!
//! A guard answers one question: is this request's identity acceptable?
//! Guards are registered by protocol name in a `GuardRegistry`; the chain
//! instantiates one guard per configured protocol, in order, and accepts a
//! request only if every guard does. Guards read the config and the request
//! and never touch shared state.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{GateConfig, PROTOCOL_IP, PROTOCOL_PASSWORD};
use crate::logging::{EventType, GateEvent, GateLogger};
use crate::types::{GateError, GateRequest, Result};

/// A pluggable identity check
pub trait GuardStrategy: Send + Sync {
    /// Protocol name, for logs
    fn name(&self) -> &str;

    /// `Ok(true)` accepts, `Ok(false)` declines. Errors count as declines.
    fn verify_identity(&self, request: &GateRequest) -> Result<bool>;
}

/// Accepts callers whose address is in the allowed set
#[derive(Debug, Clone, Default)]
pub struct IpRangeGuard {
    allowed: HashSet<IpAddr>,
}

impl IpRangeGuard {
    pub fn new(allowed: HashSet<IpAddr>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    /// Build from `allowedIpRange`; an unset range rejects everyone
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        Ok(Self::new(config.allowed_addresses()?))
    }
}

impl GuardStrategy for IpRangeGuard {
    fn name(&self) -> &str {
        PROTOCOL_IP
    }

    fn verify_identity(&self, request: &GateRequest) -> Result<bool> {
        Ok(request
            .address
            .map(|ip| self.allowed.contains(&ip.to_canonical()))
            .unwrap_or(false))
    }
}

/// Password credential check
///
/// Not implemented: always fails with `GateError::Unimplemented` so the
/// chain treats it as a decline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordGuard;

impl GuardStrategy for PasswordGuard {
    fn name(&self) -> &str {
        PROTOCOL_PASSWORD
    }

    fn verify_identity(&self, _request: &GateRequest) -> Result<bool> {
        Err(GateError::Unimplemented(
            "password guard verification is not supported yet".into(),
        ))
    }
}

type GuardFactory = Arc<dyn Fn(&GateConfig) -> Result<Arc<dyn GuardStrategy>> + Send + Sync>;

/// Protocol name → guard factory
#[derive(Clone)]
pub struct GuardRegistry {
    factories: HashMap<String, GuardFactory>,
}

impl GuardRegistry {
    /// Registry with no protocols
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a protocol
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&GateConfig) -> Result<Arc<dyn GuardStrategy>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the guard for a protocol
    pub fn build(&self, name: &str, config: &GateConfig) -> Result<Arc<dyn GuardStrategy>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GateError::Config(format!("unknown protocol '{}'", name)))?;
        factory(config)
    }
}

impl Default for GuardRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(PROTOCOL_IP, |config| {
                Ok(Arc::new(IpRangeGuard::from_config(config)?) as Arc<dyn GuardStrategy>)
            })
            .register(PROTOCOL_PASSWORD, |_| {
                Ok(Arc::new(PasswordGuard) as Arc<dyn GuardStrategy>)
            });
        registry
    }
}

/// Ordered, AND-combined guards
#[derive(Clone)]
pub struct GuardChain {
    guards: Vec<Arc<dyn GuardStrategy>>,
    log: GateLogger,
}

impl GuardChain {
    /// One guard per configured protocol, in order
    pub fn build(config: &GateConfig, registry: &GuardRegistry) -> Result<Self> {
        if config.protocols.is_empty() {
            return Err(GateError::Config("protocols must not be empty".into()));
        }

        let guards = config
            .protocols
            .iter()
            .map(|name| registry.build(name, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            guards,
            log: GateLogger::new(config.logging),
        })
    }

    /// Guard names in chain order
    pub fn names(&self) -> Vec<&str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// True only if every guard accepts; an empty chain accepts nobody
    pub fn verify_identity(&self, request: &GateRequest) -> bool {
        if self.guards.is_empty() {
            return false;
        }

        for guard in &self.guards {
            let reason = match guard.verify_identity(request) {
                Ok(true) => continue,
                Ok(false) => "identity not verified".to_string(),
                Err(e) => e.to_string(),
            };

            self.log.log(
                GateEvent::new(EventType::GuardRejected)
                    .with_request(request)
                    .with_guard(guard.name())
                    .with_reason(reason),
            );
            return false;
        }

        self.log.log(
            GateEvent::new(EventType::GuardAccepted)
                .with_request(request)
                .with_guard(self.names().join(",")),
        );
        true
    }
}
