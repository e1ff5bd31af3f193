//! Route classification
//!
//! Decides whether a request line falls under a protected or limited route
//! policy. Rules match by exact string equality; a literal `*` in either
//! field matches any value for that field. `*` is not a glob, so a rule
//! path of `/*` only matches the literal path `/*`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::GateError;

/// Wildcard accepted in either field of a rule
pub const WILDCARD: &str = "*";

/// A single method + path policy rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRule {
    pub method: String,
    pub path: String,
}

impl RouteRule {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Rule matching every request
    pub fn any() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Check whether this rule covers a request line
    pub fn matches(&self, method: &str, path: &str) -> bool {
        field_matches(&self.method, method) && field_matches(&self.path, path)
    }
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

impl fmt::Display for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Parses "METHOD PATH", e.g. "POST /path/one" or "* *"
impl FromStr for RouteRule {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), None) => Ok(Self::new(method, path)),
            _ => Err(GateError::Config(format!(
                "route rule '{}' must be \"METHOD PATH\"",
                s.trim()
            ))),
        }
    }
}

/// Route class after precedence is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    Limited,
    Unprotected,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteClass::Protected => write!(f, "protected"),
            RouteClass::Limited => write!(f, "limited"),
            RouteClass::Unprotected => write!(f, "unprotected"),
        }
    }
}

/// Result of classifying one request line
///
/// Holds the index of the first matching rule in each list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub protected: Option<usize>,
    pub limited: Option<usize>,
}

impl Classification {
    pub fn is_protected(&self) -> bool {
        self.protected.is_some()
    }

    pub fn is_limited(&self) -> bool {
        self.limited.is_some()
    }

    /// Protected wins when a request matches both lists
    pub fn class(&self) -> RouteClass {
        if self.is_protected() {
            RouteClass::Protected
        } else if self.is_limited() {
            RouteClass::Limited
        } else {
            RouteClass::Unprotected
        }
    }
}

/// Matches request lines against the configured route lists
#[derive(Debug, Clone, Default)]
pub struct RouteClassifier {
    protected: Vec<RouteRule>,
    limited: Vec<RouteRule>,
}

impl RouteClassifier {
    pub fn new(protected: Vec<RouteRule>, limited: Vec<RouteRule>) -> Self {
        Self { protected, limited }
    }

    /// Classify a request line
    pub fn classify(&self, method: &str, path: &str) -> Classification {
        Classification {
            protected: first_match(&self.protected, method, path),
            limited: first_match(&self.limited, method, path),
        }
    }

    /// Rule at a protected-list index
    pub fn protected_rule(&self, index: usize) -> Option<&RouteRule> {
        self.protected.get(index)
    }

    /// Rule at a limited-list index
    pub fn limited_rule(&self, index: usize) -> Option<&RouteRule> {
        self.limited.get(index)
    }
}

fn first_match(rules: &[RouteRule], method: &str, path: &str) -> Option<usize> {
    rules.iter().position(|rule| rule.matches(method, path))
}
