// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command line and layered server settings.
//!
//! Effective settings are built in three layers: built-in defaults, the
//! persisted `buzz_server` prefs document, then flags and `BUZZ_*` variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use buzz_app_core::config::ConfigService;
use buzz_app_core::prefs::{ServerPrefs, PREFS_KEY};
use buzz_config_fs::FsConfigStore;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "BUZZ IT buzz-in server")]
pub(crate) struct Args {
    /// HTTP/WebSocket listener (e.g. 0.0.0.0:5000)
    #[arg(long, env = "BUZZ_LISTEN")]
    pub listen: Option<SocketAddr>,
    /// JSON-lines record log. Records stay in memory when unset.
    #[arg(long, env = "BUZZ_STORE")]
    pub store: Option<PathBuf>,
    /// fsync the record log after every append
    #[arg(long)]
    pub sync_writes: bool,
    /// Bearer token required to clear all records
    #[arg(long, env = "BUZZ_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,
    /// Allowed browser Origin values (repeatable, `*` accepts any)
    #[arg(long, env = "BUZZ_ALLOW_ORIGIN", value_delimiter = ',')]
    pub allow_origin: Vec<String>,
    /// Events queued per observer before it is told to resync
    #[arg(long)]
    pub subscriber_buffer: Option<usize>,
    /// Skip reading and writing the persisted prefs document
    #[arg(long)]
    pub no_config: bool,
    /// TLS certificate (PEM). If provided, key must also be provided.
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,
    /// TLS private key (PEM). If provided, cert must also be provided.
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

impl Args {
    /// Overlay explicitly given flags onto `prefs`.
    pub(crate) fn apply(&self, mut prefs: ServerPrefs) -> ServerPrefs {
        if let Some(listen) = self.listen {
            prefs.listen = listen;
        }
        if let Some(store) = &self.store {
            prefs.store_path = Some(store.clone());
        }
        prefs.sync_writes |= self.sync_writes;
        if let Some(token) = &self.admin_token {
            prefs.admin_token.clone_from(token);
        }
        if !self.allow_origin.is_empty() {
            prefs.allow_origins.clone_from(&self.allow_origin);
        }
        if let Some(buffer) = self.subscriber_buffer {
            prefs.subscriber_buffer = buffer.max(1);
        }
        prefs
    }
}

/// Resolve effective prefs. Config-dir trouble is logged and falls back to defaults.
pub(crate) fn load_prefs(args: &Args) -> ServerPrefs {
    if args.no_config {
        return args.apply(ServerPrefs::default());
    }
    let base = match FsConfigStore::new() {
        Ok(store) => {
            let path = store.base().display().to_string();
            match ConfigService::new(store).load_or_init::<ServerPrefs>(PREFS_KEY) {
                Ok(loaded) => {
                    if loaded.from_store {
                        info!(dir = %path, "loaded server prefs");
                    } else {
                        info!(dir = %path, "wrote default server prefs");
                    }
                    loaded.value
                }
                Err(err) => {
                    warn!(?err, dir = %path, "failed to load server prefs; using defaults");
                    ServerPrefs::default()
                }
            }
        }
        Err(err) => {
            warn!(?err, "config dir unavailable; using defaults");
            ServerPrefs::default()
        }
    };
    args.apply(base)
}
