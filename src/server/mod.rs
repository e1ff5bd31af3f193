//! HTTP server for Gatehouse

pub mod http;

pub use http::{gate_request, run, AppState};
