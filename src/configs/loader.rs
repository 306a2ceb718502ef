use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Track resolution settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoaderConfig {
    /// Base URL of the Lavalink-compatible node used for `/v4/loadtracks`.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    #[serde(default = "default_node_password")]
    pub node_password: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Prefix applied to free-text queries, e.g. `ytsearch`.
    #[serde(default = "default_search_prefix")]
    pub default_search_prefix: String,
    #[serde(default = "default_max_choices")]
    pub max_choices: usize,
    #[serde(default = "default_disambiguation_ttl_secs")]
    pub disambiguation_ttl_secs: u64,
}

impl LoaderConfig {
    pub fn disambiguation_ttl(&self) -> Duration {
        Duration::from_secs(self.disambiguation_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            node_password: default_node_password(),
            request_timeout_ms: default_request_timeout_ms(),
            default_search_prefix: default_search_prefix(),
            max_choices: default_max_choices(),
            disambiguation_ttl_secs: default_disambiguation_ttl_secs(),
        }
    }
}

fn default_node_url() -> String {
    "http://127.0.0.1:2333".to_string()
}

fn default_node_password() -> String {
    "youshallnotpass".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_search_prefix() -> String {
    "ytsearch".to_string()
}

fn default_max_choices() -> usize {
    5
}

fn default_disambiguation_ttl_secs() -> u64 {
    25
}
