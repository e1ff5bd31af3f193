//! Decision returned to the HTTP layer

use serde::{Deserialize, Serialize};

/// Outcome of gating one request
///
/// When `pass` is true at most one of `token` / `no_token` is set. Neither
/// set means a pass-through without any token involvement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_token: bool,
}

impl Decision {
    /// Unprotected route, nothing to check
    pub fn bypass() -> Self {
        Self {
            pass: true,
            token: None,
            no_token: false,
        }
    }

    /// Access refused
    pub fn deny() -> Self {
        Self {
            pass: false,
            token: None,
            no_token: false,
        }
    }

    /// Identity verified and a fresh token issued
    pub fn issued(token: String) -> Self {
        Self {
            pass: true,
            token: Some(token),
            no_token: false,
        }
    }

    /// Presented token is still valid and is handed back unchanged
    pub fn returning(token: String) -> Self {
        Self::issued(token)
    }

    /// Limited route: let the request through but withhold a token
    pub fn degraded() -> Self {
        Self {
            pass: true,
            token: None,
            no_token: true,
        }
    }
}
