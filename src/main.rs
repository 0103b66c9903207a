// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process, sync::Arc};

use axum_server::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use encrypted_users::{
    api::router,
    cipher::FieldCipher,
    config::{Config, LogFormat, StoreBackend, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{DocumentStore, MemoryDocumentStore, UserDatabase, UserRepository},
};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server terminated");
        process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cipher = FieldCipher::new(&config.secret_key)?;
    tracing::info!(algorithm = cipher.algorithm(), "Field cipher ready");

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Redb => {
            std::fs::create_dir_all(&config.data_dir)?;
            let path = config.database_path();
            tracing::info!(path = %path.display(), "Opening user database");
            Arc::new(UserDatabase::open(&path)?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, records are lost on exit");
            Arc::new(MemoryDocumentStore::new())
        }
    };
    store.ensure_indexes()?;

    let users = UserRepository::new(cipher, store).with_timeout(config.store_timeout);
    let app = router(AppState::new(users));

    let addr = config.bind_addr()?;
    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    tracing::info!(%addr, "Encrypted users server listening (docs at /docs)");
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(handle: Handle<SocketAddr>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
}
