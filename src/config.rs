//! Client configuration.
//!
//! Only two knobs matter to the session core: where the backend lives
//! and how long to wait for it. Values come from the environment (with
//! `.env` support for development builds) and fall back to production
//! defaults.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Production API base URL
const DEFAULT_BASE_URL: &str = "https://api.rescuebox.app/v1";

/// Environment variable overriding the base URL
const BASE_URL_ENV: &str = "RESCUEBOX_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file if
    /// one is present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let base_url = match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            Ok(_) => {
                warn!("{BASE_URL_ENV} is set but empty, using default base URL");
                DEFAULT_BASE_URL.to_string()
            }
            Err(_) => DEFAULT_BASE_URL.to_string(),
        };

        Self { base_url }
    }
}
