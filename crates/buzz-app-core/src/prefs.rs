// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted preferences for the BUZZ IT server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Config key under which [`ServerPrefs`] is stored.
pub const PREFS_KEY: &str = "buzz_server";

/// Admin token used when none is configured (matches the stock moderator client).
pub const DEFAULT_ADMIN_TOKEN: &str = "admin123";

/// Server settings; missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerPrefs {
    /// HTTP/WebSocket listener.
    pub listen: SocketAddr,
    /// JSON-lines record log; `None` keeps records in memory only.
    pub store_path: Option<PathBuf>,
    /// `fsync` each appended record.
    pub sync_writes: bool,
    /// Bearer token required by `DELETE /buzz`.
    pub admin_token: String,
    /// Browser origins allowed by CORS and the WebSocket origin check.
    pub allow_origins: Vec<String>,
    /// Per-observer event queue depth.
    pub subscriber_buffer: usize,
}

impl Default for ServerPrefs {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            store_path: None,
            sync_writes: false,
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
            allow_origins: vec!["http://localhost:5173".to_string()],
            subscriber_buffer: 256,
        }
    }
}

impl ServerPrefs {
    /// `true` while the well-known default token is in effect.
    pub fn uses_default_admin_token(&self) -> bool {
        self.admin_token == DEFAULT_ADMIN_TOKEN
    }
}
