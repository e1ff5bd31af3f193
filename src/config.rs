//! Configuration for Gatehouse
//!
//! Two layers: `Args` is the clap CLI / environment surface of the binary,
//! `GateConfig` is the immutable engine configuration it produces. A JSON
//! file with the `GateConfig` shape can be layered underneath the CLI.

use clap::Parser;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::gate::RouteRule;
use crate::types::{GateError, Result};

/// Protocol name enabling the IP-range guard
pub const PROTOCOL_IP: &str = "ip";

/// Protocol name enabling the password guard
pub const PROTOCOL_PASSWORD: &str = "password";

/// Cookie carrying the session token unless overridden
pub const DEFAULT_TOKEN_COOKIE: &str = "ENTRY_CONTROL_TOKEN";

/// Kind of token the engine issues, derived from the enabled protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Random key/value pair, used when no password protocol is enabled
    JwtRandom,
    /// Password-bound token (not implemented)
    JwtPassword,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::JwtRandom => write!(f, "jwt-random"),
            TokenType::JwtPassword => write!(f, "jwt-password"),
        }
    }
}

/// Engine configuration
///
/// Built once at startup and never mutated after the engine takes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    /// Guard protocols, in chain order
    pub protocols: Vec<String>,
    /// Routes that deny unverified callers
    pub protected_routes: Vec<RouteRule>,
    /// Routes that only withhold a token from unverified callers
    pub limited_routes: Vec<RouteRule>,
    /// Addresses accepted by the IP guard
    pub allowed_ip_range: Option<Vec<String>>,
    /// JWT signing algorithm
    pub token_algorithm: String,
    /// Emit engine events
    pub logging: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protocols: vec![PROTOCOL_PASSWORD.to_string()],
            protected_routes: Vec::new(),
            limited_routes: Vec::new(),
            allowed_ip_range: None,
            token_algorithm: "HS256".to_string(),
            logging: false,
        }
    }
}

impl GateConfig {
    /// Configuration with the given protocols and defaults elsewhere
    pub fn with_protocols<I, S>(protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protocols: protocols.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Token type, always recomputed from `protocols`
    pub fn token_type(&self) -> TokenType {
        if self.protocols.iter().any(|p| p == PROTOCOL_PASSWORD) {
            TokenType::JwtPassword
        } else {
            TokenType::JwtRandom
        }
    }

    /// Whether a protocol is enabled
    pub fn has_protocol(&self, name: &str) -> bool {
        self.protocols.iter().any(|p| p == name)
    }

    /// Parsed allowed addresses (empty if unset)
    pub fn allowed_addresses(&self) -> Result<HashSet<IpAddr>> {
        let Some(range) = &self.allowed_ip_range else {
            return Ok(HashSet::new());
        };

        range
            .iter()
            .map(|entry| {
                entry
                    .trim()
                    .parse::<IpAddr>()
                    .map(|ip| ip.to_canonical())
                    .map_err(|_| {
                        GateError::Config(format!("allowedIpRange: invalid address '{}'", entry))
                    })
            })
            .collect()
    }

    /// Signing algorithm; only HMAC works with a process-generated secret
    pub fn signing_algorithm(&self) -> Result<Algorithm> {
        let algorithm = Algorithm::from_str(&self.token_algorithm).map_err(|_| {
            GateError::Config(format!(
                "tokenAlgorithm: unknown algorithm '{}'",
                self.token_algorithm
            ))
        })?;

        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
            other => Err(GateError::Config(format!(
                "tokenAlgorithm: {:?} needs a key pair, only HS256/HS384/HS512 are supported",
                other
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.protocols.is_empty() {
            return Err(GateError::Config("protocols must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for protocol in &self.protocols {
            if !seen.insert(protocol.as_str()) {
                return Err(GateError::Config(format!(
                    "protocol '{}' listed more than once",
                    protocol
                )));
            }
        }

        if self.has_protocol(PROTOCOL_IP) && self.allowed_ip_range.is_none() {
            return Err(GateError::Config(
                "allowedIpRange is required when the 'ip' protocol is enabled".to_string(),
            ));
        }
        self.allowed_addresses()?;

        for rule in self.protected_routes.iter().chain(&self.limited_routes) {
            if rule.method.is_empty() || rule.path.is_empty() {
                return Err(GateError::Config(format!(
                    "route rule '{}' has an empty method or path",
                    rule
                )));
            }
        }

        self.signing_algorithm()?;

        Ok(())
    }
}

/// Log output format
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Gatehouse - request gatekeeper for HTTP services
#[derive(Parser, Debug, Clone)]
#[command(name = "gatehouse")]
#[command(about = "Route-policy gatekeeper issuing short-lived session tokens")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// JSON file with a full gate configuration (CLI values override it)
    #[arg(long, env = "GATE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Guard protocols in chain order (e.g. "ip")
    #[arg(long, env = "GATE_PROTOCOLS", value_delimiter = ',')]
    pub protocols: Vec<String>,

    /// Addresses accepted by the IP guard
    #[arg(long, env = "ALLOWED_IPS", value_delimiter = ',')]
    pub allowed_ips: Vec<String>,

    /// Protected routes as "METHOD PATH" pairs
    #[arg(long, env = "PROTECTED_ROUTES", value_delimiter = ',')]
    pub protected_routes: Vec<String>,

    /// Limited routes as "METHOD PATH" pairs
    #[arg(long, env = "LIMITED_ROUTES", value_delimiter = ',')]
    pub limited_routes: Vec<String>,

    /// JWT signing algorithm
    #[arg(long, env = "TOKEN_ALGORITHM")]
    pub token_algorithm: Option<String>,

    /// Emit engine decision events
    #[arg(long, env = "GATE_LOGGING", default_value = "false")]
    pub gate_logging: bool,

    /// Cookie carrying the session token
    #[arg(long, env = "TOKEN_COOKIE", default_value = DEFAULT_TOKEN_COOKIE)]
    pub token_cookie: String,

    /// Trust X-Real-IP / X-Authenticated-User from a fronting proxy
    #[arg(long, env = "TRUST_PROXY_HEADERS", default_value = "false")]
    pub trust_proxy_headers: bool,

    /// Seconds between expired vault entry sweeps (0 disables)
    #[arg(long, env = "VAULT_COMPACTION_SECS", default_value = "0")]
    pub vault_compaction_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    /// Build the validated engine configuration
    pub fn gate_config(&self) -> Result<GateConfig> {
        let mut config = match &self.config_file {
            Some(path) => GateConfig::from_file(path)?,
            None => GateConfig::default(),
        };

        if !self.protocols.is_empty() {
            config.protocols = trimmed(&self.protocols);
        }
        if !self.allowed_ips.is_empty() {
            config.allowed_ip_range = Some(trimmed(&self.allowed_ips));
        }
        if !self.protected_routes.is_empty() {
            config.protected_routes = parse_rules(&self.protected_routes)?;
        }
        if !self.limited_routes.is_empty() {
            config.limited_routes = parse_rules(&self.limited_routes)?;
        }
        if let Some(algorithm) = &self.token_algorithm {
            config.token_algorithm = algorithm.clone();
        }
        config.logging = config.logging || self.gate_logging;

        config.validate()?;
        Ok(config)
    }
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_rules(values: &[String]) -> Result<Vec<RouteRule>> {
    trimmed(values).iter().map(|v| v.parse()).collect()
}
