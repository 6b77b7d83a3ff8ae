//! The Nightfall server binary.
//!
//! Configuration comes from `NIGHTFALL_*` environment variables (a `.env`
//! file in the working directory is loaded first). Log verbosity follows
//! `RUST_LOG`, defaulting to `info`.

use std::process::ExitCode;

use nightfall::{NightfallServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        bind = %config.bind_addr,
        min_players = config.game.min_players,
        end_day = config.game.end_day,
        "starting Nightfall"
    );

    let server = match NightfallServer::from_config(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}
