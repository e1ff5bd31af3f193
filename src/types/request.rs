//! Request value consumed by the gate
//!
//! Carries exactly what the engine needs, independent of any HTTP framework.

use std::net::IpAddr;

/// A single request presented to the gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    /// HTTP method as sent by the client (e.g. "GET")
    pub method: String,
    /// Request path, without query string
    pub path: String,
    /// Caller network address, if known
    pub address: Option<IpAddr>,
    /// Session token presented by the caller (cookie, header, ...)
    pub token: Option<String>,
    /// Identity already established by an external mechanism
    pub externally_authenticated: bool,
}

impl GateRequest {
    /// Create a request for a method and path
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the caller address
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the presented session token. Empty values count as absent.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    /// Mark the request as authenticated upstream
    pub fn with_external_auth(mut self, authenticated: bool) -> Self {
        self.externally_authenticated = authenticated;
        self
    }

    /// Presented token, if any
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
