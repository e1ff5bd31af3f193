//! Gatehouse - request gatekeeper for HTTP services

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use gatehouse::{config::Args, logging, server, GatewayVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init_tracing(&args.log_level, args.log_format);

    let config = match args.gate_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("======================================");
    info!("  Gatehouse - request gatekeeper");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Protocols: {}", config.protocols.join(", "));
    info!("Token type: {}", config.token_type());
    info!("Algorithm: {}", config.token_algorithm);
    info!(
        "Routes: {} protected, {} limited",
        config.protected_routes.len(),
        config.limited_routes.len()
    );
    info!("Engine logging: {}", if config.logging { "on" } else { "off" });
    info!("======================================");

    // Refuse to serve traffic with a configuration the engine rejects
    let gate = match GatewayVerifier::new(config) {
        Ok(gate) => gate,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(server::AppState::new(args, gate));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
