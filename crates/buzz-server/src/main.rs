// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! BUZZ IT server.
//! Teams POST buzzes over HTTP; observers watch the ranking live over WebSocket.

mod app;
mod error;
mod settings;
mod ws;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use buzz_core::{
    AdminGate, BroadcastHub, LogRecordStore, LogStoreConfig, MemoryRecordStore, OrderingEngine,
    RecordStore,
};
use clap::Parser;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::settings::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let prefs = settings::load_prefs(&args);
    if prefs.uses_default_admin_token() {
        warn!("admin token is the built-in default; set --admin-token or BUZZ_ADMIN_TOKEN");
    }
    if prefs.admin_token.is_empty() {
        warn!("admin token is empty; clearing records is disabled");
    }

    let store: Arc<dyn RecordStore> = match &prefs.store_path {
        Some(path) => {
            let store = LogRecordStore::open(LogStoreConfig {
                path: path.clone(),
                sync_writes: prefs.sync_writes,
            })
            .with_context(|| format!("open buzz log {}", path.display()))?;
            info!(path = %path.display(), records = store.count()?, "buzz log opened");
            Arc::new(store)
        }
        None => {
            info!("no --store given; records are kept in memory only");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let engine = OrderingEngine::new(store, BroadcastHub::new(prefs.subscriber_buffer));
    let state = Arc::new(AppState::new(
        engine,
        AdminGate::new(prefs.admin_token.clone()),
        &prefs.allow_origins,
    ));
    let app = app::router(state);

    let handle = Handle::new();
    // graceful shutdown on Ctrl+C
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(?err, "failed to install ctrl-c handler");
            return;
        }
        info!("shutting down");
        shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    let listen = prefs.listen;
    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = load_tls(cert, key).await.context("load tls config")?;
            info!("buzz server listening (TLS) on {listen}");
            axum_server::bind_rustls(listen, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        (None, None) => {
            info!("buzz server listening on {listen}");
            axum_server::bind(listen)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        _ => {
            return Err(anyhow!(
                "must provide both --tls-cert and --tls-key or neither"
            ))
        }
    }

    Ok(())
}

async fn load_tls(cert_path: PathBuf, key_path: PathBuf) -> Result<RustlsConfig> {
    // the no-provider rustls build needs a process-wide provider; a second install is a no-op
    let _ = rustls::crypto::ring::default_provider().install_default();
    let cfg = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    Ok(cfg)
}
