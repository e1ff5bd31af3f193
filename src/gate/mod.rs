//! The gate: route classification, session decisions and the entry point
//!
//! ```text
//! GateRequest ──▶ GatewayVerifier ──▶ RouteClassifier
//!                       │
//!                       ▼
//!               SessionTokenService ──▶ GuardChain / KeyVault / TokenSigner
//!                       │
//!                       ▼
//!                   Decision
//! ```

pub mod classifier;
pub mod session;
pub mod verifier;

pub use classifier::{Classification, RouteClass, RouteClassifier, RouteRule, WILDCARD};
pub use session::{AccessLevel, SessionTokenService};
pub use verifier::GatewayVerifier;
