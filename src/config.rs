//! Process configuration, read once from the environment at startup.
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const DEFAULT_EMBED_BASE: &str = "https://vidsrc.to/embed";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub image_base_url: String,
    pub embed_base_url: String,
    pub bind_addr: SocketAddr,
    pub search_debounce: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tmdb_api_key = get("TMDB_API_KEY").ok_or(ConfigError::Missing("TMDB_API_KEY"))?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let search_debounce = match get("SEARCH_DEBOUNCE_MS") {
            Some(raw) => {
                let ms = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                    var: "SEARCH_DEBOUNCE_MS",
                    value: raw.clone(),
                })?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        };

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url: base_url(get("TMDB_BASE_URL"), DEFAULT_TMDB_BASE),
            image_base_url: base_url(get("IMAGE_BASE_URL"), DEFAULT_IMAGE_BASE),
            embed_base_url: base_url(get("EMBED_BASE_URL"), DEFAULT_EMBED_BASE),
            bind_addr,
            search_debounce,
        })
    }

    /// Config used by tests and tooling that never reach the network.
    pub fn for_api_key(api_key: &str) -> Self {
        Self {
            tmdb_api_key: api_key.to_string(),
            tmdb_base_url: DEFAULT_TMDB_BASE.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE.to_string(),
            embed_base_url: DEFAULT_EMBED_BASE.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            search_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

fn base_url(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}
