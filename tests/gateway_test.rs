//! End-to-end gate scenarios
//!
//! Drives `GatewayVerifier` the way the HTTP layer does and checks the
//! decision table, the token round trip and concurrent issuance.

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse::auth::{GuardRegistry, GuardStrategy, TokenClaims};
use gatehouse::{Decision, GateConfig, GateRequest, GatewayVerifier, RouteRule};

fn ip_gate() -> GatewayVerifier {
    GatewayVerifier::new(GateConfig {
        protocols: vec!["ip".into()],
        allowed_ip_range: Some(vec!["10.0.0.5".into()]),
        protected_routes: vec![
            RouteRule::new("POST", "/a"),
            RouteRule::new("PUT", "/path/two"),
        ],
        limited_routes: vec![RouteRule::new("GET", "/")],
        ..Default::default()
    })
    .unwrap()
}

fn request(ip: &str, method: &str, path: &str) -> GateRequest {
    GateRequest::new(method, path).with_address(ip.parse().unwrap())
}

// =============================================================================
// Decision table
// =============================================================================

#[test]
fn test_protected_route_scenario() {
    let gate = ip_gate();

    let decision = gate.verify(&request("10.0.0.5", "POST", "/a"));
    assert!(decision.pass);
    let token = decision.token.expect("token issued");
    assert!(!token.is_empty());

    // issued key maps to its value in the vault
    let claims = gate.sessions().signer().verify(&token).unwrap();
    assert_eq!(
        gate.sessions().vault().get(&claims.key),
        Some(claims.value.clone())
    );

    assert_eq!(
        gate.verify(&request("10.0.0.9", "POST", "/a")),
        Decision {
            pass: false,
            token: None,
            no_token: false
        }
    );
}

#[test]
fn test_limited_route_scenario() {
    let gate = ip_gate();
    let decision = gate.verify(&request("10.0.0.9", "GET", "/"));
    assert_eq!(
        decision,
        Decision {
            pass: true,
            token: None,
            no_token: true
        }
    );
}

#[test]
fn test_limited_routes_never_deny() {
    let gate = ip_gate();
    for ip in ["10.0.0.5", "10.0.0.9", "192.168.1.1", "::1"] {
        for token in [None, Some("junk")] {
            let mut req = request(ip, "GET", "/");
            if let Some(token) = token {
                req = req.with_token(token);
            }
            let decision = gate.verify(&req);
            assert!(decision.pass);
            // noToken exactly when the guard failed
            assert_eq!(decision.no_token, ip != "10.0.0.5");
            assert_eq!(decision.token.is_some(), ip == "10.0.0.5");
        }
    }
}

#[test]
fn test_unprotected_always_passes() {
    let gate = ip_gate();
    for ip in ["10.0.0.5", "10.0.0.9"] {
        for req in [
            request(ip, "GET", "/other"),
            request(ip, "DELETE", "/a"),
            request(ip, "GET", "/other").with_token("anything"),
        ] {
            assert_eq!(
                gate.verify(&req),
                Decision {
                    pass: true,
                    token: None,
                    no_token: false
                }
            );
        }
    }
}

#[test]
fn test_round_trip_reuses_token() {
    let gate = ip_gate();
    let token = gate
        .verify(&request("10.0.0.5", "PUT", "/path/two"))
        .token
        .unwrap();

    for _ in 0..3 {
        let decision =
            gate.verify(&request("10.0.0.5", "PUT", "/path/two").with_token(token.clone()));
        assert_eq!(decision.token.as_deref(), Some(token.as_str()));
    }
    assert_eq!(gate.sessions().vault().len(), 1);
}

#[test]
fn test_expired_token_triggers_reauthentication() {
    let gate = ip_gate();
    let sessions = gate.sessions();

    let issued_at = chrono::Utc::now().timestamp() - 3_600;
    let claims = TokenClaims::new("stale-key".into(), "stale-value".into(), issued_at);
    let stale = sessions.signer().sign(&claims).unwrap();
    sessions
        .vault()
        .try_insert(&claims.key, &claims.value, i64::MAX);

    let decision = gate.verify(&request("10.0.0.5", "POST", "/a").with_token(stale.clone()));
    assert!(decision.pass);
    assert_ne!(decision.token.unwrap(), stale);

    let decision = gate.verify(&request("10.0.0.9", "POST", "/a").with_token(stale));
    assert!(!decision.pass);
}

#[test]
fn test_restart_invalidates_tokens() {
    let before = ip_gate();
    let token = before.verify(&request("10.0.0.5", "POST", "/a")).token.unwrap();

    let after = ip_gate();
    let decision = after.verify(&request("10.0.0.9", "POST", "/a").with_token(token));
    assert!(!decision.pass);
}

#[test]
fn test_custom_guard_joins_chain() {
    struct BusinessHours(bool);

    impl GuardStrategy for BusinessHours {
        fn name(&self) -> &str {
            "hours"
        }

        fn verify_identity(&self, _request: &GateRequest) -> gatehouse::Result<bool> {
            Ok(self.0)
        }
    }

    for open in [true, false] {
        let mut registry = GuardRegistry::default();
        registry.register("hours", move |_| {
            Ok(Arc::new(BusinessHours(open)) as Arc<dyn GuardStrategy>)
        });

        let gate = GatewayVerifier::with_registry(
            GateConfig {
                protocols: vec!["ip".into(), "hours".into()],
                allowed_ip_range: Some(vec!["10.0.0.5".into()]),
                protected_routes: vec![RouteRule::any()],
                ..Default::default()
            },
            &registry,
        )
        .unwrap();

        assert_eq!(gate.verify(&request("10.0.0.5", "GET", "/x")).pass, open);
    }
}

#[test]
fn test_config_errors_prevent_startup() {
    // default protocols select the unimplemented password token type
    assert!(GatewayVerifier::new(GateConfig::default()).is_err());

    // ip without a range
    assert!(GatewayVerifier::new(GateConfig::with_protocols(["ip"])).is_err());

    // unknown protocol
    let config = GateConfig {
        protocols: vec!["fingerprint".into()],
        ..Default::default()
    };
    assert!(GatewayVerifier::new(config).is_err());
}

#[test]
fn test_json_config() {
    let config = GateConfig::from_json(
        r#"{
            "protocols": ["ip"],
            "allowedIpRange": ["10.0.0.5"],
            "protectedRoutes": [{"path": "/path/one", "method": "POST"}],
            "limitedRoutes": [{"path": "/", "method": "GET"}]
        }"#,
    )
    .unwrap();
    let gate = GatewayVerifier::new(config).unwrap();

    assert!(gate.verify(&request("10.0.0.5", "POST", "/path/one")).token.is_some());
    assert!(!gate.verify(&request("10.0.0.9", "POST", "/path/one")).pass);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance() {
    let gate = Arc::new(ip_gate());

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.verify(&request("10.0.0.5", "POST", "/a"))
                    .token
                    .expect("token issued")
            })
        })
        .collect();

    let mut tokens = Vec::new();
    for task in tasks {
        tokens.push(task.await.unwrap());
    }

    let keys: HashSet<String> = tokens
        .iter()
        .map(|t| gate.sessions().signer().verify(t).unwrap().key)
        .collect();
    assert_eq!(keys.len(), tokens.len());
    assert_eq!(gate.sessions().vault().len(), tokens.len());

    // every token verifies independently
    for token in tokens {
        let decision = gate.verify(&request("10.0.0.9", "POST", "/a").with_token(token.clone()));
        assert_eq!(decision.token, Some(token));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issue_and_verify() {
    let gate = Arc::new(ip_gate());
    let seed = gate.verify(&request("10.0.0.5", "POST", "/a")).token.unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let gate = Arc::clone(&gate);
            let seed = seed.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    gate.verify(&request("10.0.0.5", "POST", "/a")).pass
                } else {
                    let decision =
                        gate.verify(&request("10.0.0.9", "POST", "/a").with_token(seed.clone()));
                    decision.token.as_deref() == Some(seed.as_str())
                }
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(gate.sessions().vault().len(), 17);
}
