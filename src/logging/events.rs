//! Engine event logging
//!
//! Decision events are emitted through `tracing` only when the gate was
//! configured with `logging: true`. Internal failures bypass the toggle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

use crate::types::GateRequest;

/// Engine event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Unprotected route passed straight through
    Bypass,
    /// Caller without a token is being verified
    NewIdentity,
    /// Caller presented a token
    ReturningIdentity,
    /// Identity established upstream, guards skipped
    ExternalIdentity,
    /// Every guard accepted
    GuardAccepted,
    /// A guard declined or failed
    GuardRejected,
    /// Fresh token issued
    TokenIssued,
    /// Presented token verified
    TokenAccepted,
    /// Presented token failed verification
    TokenRejected,
    /// Request denied
    Denied,
    /// Limited route passed without a token
    Degraded,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Bypass => "bypass",
            EventType::NewIdentity => "new_identity",
            EventType::ReturningIdentity => "returning_identity",
            EventType::ExternalIdentity => "external_identity",
            EventType::GuardAccepted => "guard_accepted",
            EventType::GuardRejected => "guard_rejected",
            EventType::TokenIssued => "token_issued",
            EventType::TokenAccepted => "token_accepted",
            EventType::TokenRejected => "token_rejected",
            EventType::Denied => "denied",
            EventType::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// A single engine event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub method: Option<String>,
    pub path: Option<String>,
    /// Route class the request fell under
    pub route: Option<String>,
    /// Guard that produced the event
    pub guard: Option<String>,
    /// Why a check failed
    pub reason: Option<String>,
}

impl GateEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            method: None,
            path: None,
            route: None,
            guard: None,
            reason: None,
        }
    }

    /// Attach the request line
    pub fn with_request(mut self, request: &GateRequest) -> Self {
        self.method = Some(request.method.clone());
        self.path = Some(request.path.clone());
        self
    }

    pub fn with_route(mut self, route: impl fmt::Display) -> Self {
        self.route = Some(route.to_string());
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn with_reason(mut self, reason: impl fmt::Display) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// Event logger gated by the `logging` configuration flag
#[derive(Debug, Clone, Copy, Default)]
pub struct GateLogger {
    enabled: bool,
}

impl GateLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit an event if logging is enabled
    pub fn log(&self, event: GateEvent) {
        if !self.enabled {
            return;
        }
        info!(
            event = %event.event_type,
            method = event.method.as_deref().unwrap_or("-"),
            path = event.path.as_deref().unwrap_or("-"),
            route = event.route.as_deref().unwrap_or("-"),
            guard = event.guard.as_deref().unwrap_or("-"),
            reason = event.reason.as_deref().unwrap_or("-"),
            "gate event"
        );
    }

    /// Internal failure; always logged
    pub fn failure(&self, context: &str, err: &dyn fmt::Display) {
        error!(context = context, error = %err, "gate internal failure");
    }
}
