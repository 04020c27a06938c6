// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::str::FromStr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Maximum request body size in MB.
    pub max_body_mb: usize,
    /// Request timeout in seconds. Analyses still running are cancelled.
    pub request_timeout_secs: u64,
    /// Number of rayon worker threads for per-space analysis.
    pub worker_threads: usize,
    /// Optional path to an engine configuration JSON file.
    pub engine_config: Option<String>,
    /// Number of graphs kept in the in-memory cache.
    pub graph_cache_size: usize,
    /// Allowed CORS origins (comma-separated, or "*" for all).
    pub cors_origins: Vec<String>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 8080),
            max_body_mb: env_or("MAX_BODY_MB", 64),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            worker_threads: env_or("WORKER_THREADS", num_cpus::get()),
            engine_config: std::env::var("ENGINE_CONFIG")
                .ok()
                .filter(|path| !path.trim().is_empty()),
            graph_cache_size: env_or("GRAPH_CACHE_SIZE", 8),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| {
                    // Default: allow common development origins
                    "http://localhost:3000,http://localhost:5173,http://127.0.0.1:3000,http://127.0.0.1:5173".into()
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
