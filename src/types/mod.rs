//! Shared types for Gatehouse

pub mod decision;
pub mod error;
pub mod request;

pub use decision::Decision;
pub use error::{GateError, Result};
pub use request::GateRequest;
