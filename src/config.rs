// Application settings, layered from defaults, an optional seedsync.toml and SEEDSYNC__* env vars

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the prediction backend (crop, fertilizer, yield, disease, rotation, schemes, profile)
    pub backend_base_url: String,
    pub weather_base_url: String,
    pub weather_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub proxy_url: Option<String>,
    // Where the first-visit flag is persisted
    pub state_dir: PathBuf,
    // Sessions untouched for this long are dropped with their forms and uploads
    pub session_idle_minutes: u64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Self::defaults()?
            // Load from a configuration file (e.g., seedsync.toml)
            .add_source(File::with_name("seedsync").required(false))
            // Load from environment variables (e.g., SEEDSYNC__WEATHER_API_KEY)
            .add_source(Environment::with_prefix("SEEDSYNC").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("backend_base_url", "http://localhost:8000")?
            .set_default("weather_base_url", "https://api.openweathermap.org/data/2.5")?
            .set_default("gemini_base_url", "https://generativelanguage.googleapis.com/v1beta")?
            .set_default("gemini_model", "gemini-1.5-flash")?
            .set_default("state_dir", ".seedsync")?
            .set_default("session_idle_minutes", 120)?)
    }

    /// Settings with every collaborator pointed at `base_url`, used by tests with a stub server.
    #[cfg(test)]
    pub fn for_stub(base_url: &str) -> Self {
        Settings {
            server_address: "127.0.0.1:0".to_string(),
            backend_base_url: base_url.to_string(),
            weather_base_url: base_url.to_string(),
            weather_api_key: Some("test-weather-key".to_string()),
            gemini_base_url: base_url.to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_api_key: Some("test-gemini-key".to_string()),
            firebase_project_id: None,
            proxy_url: None,
            state_dir: std::env::temp_dir().join("seedsync-tests"),
            session_idle_minutes: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_without_any_sources() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.server_address, "127.0.0.1:3000");
        assert_eq!(settings.gemini_model, "gemini-1.5-flash");
        assert!(settings.weather_api_key.is_none());
        assert_eq!(settings.state_dir, PathBuf::from(".seedsync"));
        assert_eq!(settings.session_idle_minutes, 120);
    }
}
