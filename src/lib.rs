//! Gatehouse - request gatekeeper for HTTP services
//!
//! Gatehouse classifies incoming requests against route policies, runs an
//! ordered chain of identity guards, and issues short-lived session tokens
//! backed by an in-memory key vault.
//!
//! ## Decisions
//!
//! - **Unprotected** routes always pass.
//! - **Protected** routes pass only with a valid token or a verified identity.
//! - **Limited** routes never deny; unverified callers just get no token.
//!
//! ```no_run
//! use gatehouse::{GateConfig, GateRequest, GatewayVerifier, RouteRule};
//!
//! let gate = GatewayVerifier::new(GateConfig {
//!     protocols: vec!["ip".into()],
//!     allowed_ip_range: Some(vec!["10.0.0.5".into()]),
//!     protected_routes: vec![RouteRule::new("POST", "/a")],
//!     ..Default::default()
//! })?;
//!
//! let request = GateRequest::new("POST", "/a").with_address("10.0.0.5".parse().unwrap());
//! let decision = gate.verify(&request);
//! assert!(decision.pass);
//! # Ok::<(), gatehouse::GateError>(())
//! ```

pub mod auth;
pub mod config;
pub mod gate;
pub mod logging;
pub mod server;
pub mod types;

pub use config::{Args, GateConfig, TokenType};
pub use gate::{GatewayVerifier, RouteRule};
pub use server::{run, AppState};
pub use types::{Decision, GateError, GateRequest, Result};
