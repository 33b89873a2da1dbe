use std::{process, sync::Arc};

use clap::Parser;
use stmtdb::{
    api::{self, AppState},
    config::{CliArgs, Config, LoggingConfig},
};
use stmtdb_sqlite::SqliteStorage;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_tracing(&config.logging);

    let addr = match config.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "Invalid server configuration");
            process::exit(1);
        }
    };

    // Opening the store applies pending migrations; serving against a
    // half-migrated schema is not an option.
    let storage = match SqliteStorage::open(&config.database.path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(error = %e, path = %config.database.path, "Failed to open database");
            process::exit(1);
        }
    };

    let marking = config.marking_rule();
    if marking.is_empty() {
        tracing::warn!("No marking names configured, imported transactions will not be marked");
    }

    let state = AppState::new(Arc::new(storage), marking);
    let app = api::router(state, config.auth.clone());

    tracing::info!(%addr, database = %config.database.path, "API listening");

    let server = match axum::Server::try_bind(&addr) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind listener");
            process::exit(1);
        }
    };

    if let Err(e) = server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        process::exit(1);
    }
}
