use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

use crate::api::models::DEFAULT_FALLBACK_TTL;

pub const DEFAULT_STATE_FILE: &str = "itmdns.state.json";

/// Desired-state file.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub provider: ProviderSettings,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Minutes between reconcile passes; 0 applies once and exits.
    #[serde(default)]
    pub reconcile_interval: u64,

    #[serde(default)]
    #[validate(nested)]
    pub dns_apps: BTreeMap<String, DnsAppConfig>,
}

/// Provider block. Anything left out falls back to the environment.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderSettings {
    #[validate(length(min = 1, message = "Client id cannot be empty"))]
    pub client_id: Option<String>,

    #[validate(length(min = 1, message = "Client secret cannot be empty"))]
    pub client_secret: Option<String>,

    #[validate(length(min = 1, message = "Base URL cannot be empty"))]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DnsAppConfig {
    #[validate(length(min = 1, message = "DNS app name cannot be empty"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[validate(length(min = 1, message = "Fallback CNAME cannot be empty"))]
    pub fallback_cname: String,

    #[serde(default = "default_fallback_ttl")]
    #[validate(range(min = 1, message = "Fallback TTL must be greater than 0"))]
    pub fallback_ttl: u32,

    #[serde(default)]
    pub app_data: Option<String>,

    /// Read into `app_data` at load time, relative to the config file.
    #[serde(default)]
    pub app_data_file: Option<PathBuf>,

    /// Adopt an existing app instead of creating one.
    #[serde(default)]
    pub import_id: Option<String>,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_fallback_ttl() -> u32 {
    DEFAULT_FALLBACK_TTL
}
