//! Application configuration. Load from TOML or environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global configuration for the survey gateway and its backend client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Application identity, used in health reporting and logs.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base URL of the storage backend API, e.g. "http://localhost:8000".
    pub backend_url: String,
    /// Backend mode: "http" talks to `backend_url`, "mock" keeps entities
    /// in process memory (local development and tests).
    pub backend_mode: String,
    /// Timeout for a single backend RPC. A turn never blocks longer.
    pub request_timeout_secs: u64,
}

impl SurveyConfig {
    /// Load config from file and environment. Precedence: env `SURVEY_CONFIG`
    /// path > `config/gateway.toml` > defaults, then `SURVEY`-prefixed
    /// environment variables on top.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("SURVEY_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Survey Gateway")?
            .set_default("port", 8001_i64)?
            .set_default("backend_url", "http://localhost:8000")?
            .set_default("backend_mode", "http")?
            .set_default("request_timeout_secs", 10_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("SURVEY").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
