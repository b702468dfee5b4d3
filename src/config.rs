//! Client settings.
//!
//! Defaults suit a page served by the backend itself. A deployment can
//! override them by writing JSON to localStorage under
//! [`ClientConfig::STORAGE_KEY`], e.g.
//! `{"api_version": "legacy", "persist_results": false}`.

use crate::api::ApiVersion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend revision to talk to.
    pub api_version: ApiVersion,
    /// Prefix for endpoint paths. Empty means same origin.
    pub base_url: String,
    /// Whether successful device checks are written to the local cache.
    pub persist_results: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::V1,
            base_url: String::new(),
            persist_results: true,
        }
    }
}

impl ClientConfig {
    /// localStorage key for overrides.
    pub const STORAGE_KEY: &'static str = "mvt_web_settings";

    /// Parses overrides; anything unparseable yields the defaults.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse client settings: {}", e);
                Self::default()
            }
        }
    }

    /// Load settings from localStorage.
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let window = match web_sys::window() {
            Some(w) => w,
            None => return Self::default(),
        };

        let storage = match window.local_storage() {
            Ok(Some(s)) => s,
            _ => return Self::default(),
        };

        match storage.get_item(Self::STORAGE_KEY) {
            Ok(Some(json)) => {
                tracing::info!("Loaded client settings from localStorage");
                Self::from_json(&json)
            }
            _ => Self::default(),
        }
    }
}
