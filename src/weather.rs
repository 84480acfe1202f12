// Current-weather lookups for the irrigation and dashboard panels.
// Failures never escape this module: callers only ever see "no data".

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Settings;
use crate::models::WeatherSnapshot;

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    main: OpenWeatherMain,
    wind: OpenWeatherWind,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

#[derive(Clone)]
pub struct WeatherClient {
    http: Arc<Client>,
    settings: Arc<Settings>,
}

impl WeatherClient {
    pub fn new(http: Arc<Client>, settings: Arc<Settings>) -> Self {
        Self { http, settings }
    }

    /// Fetches the current weather for `location`. Returns `None` on any failure.
    /// Every call goes to the provider; nothing is cached.
    pub async fn fetch(&self, location: &str) -> Option<WeatherSnapshot> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }
        // Key is read per call so a reloaded configuration takes effect immediately
        let Some(api_key) = self.settings.weather_api_key.as_deref() else {
            tracing::warn!("Weather API key not configured; no weather data for '{}'", location);
            return None;
        };

        match self.try_fetch(location, api_key).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Failed to fetch weather data for '{}': {:#}", location, e);
                None
            }
        }
    }

    async fn try_fetch(&self, location: &str, api_key: &str) -> Result<WeatherSnapshot> {
        let mut url = Url::parse(&format!("{}/weather", self.settings.weather_base_url.trim_end_matches('/')))
            .context("Invalid weather base URL")?;
        url.query_pairs_mut()
            .append_pair("q", location)
            .append_pair("units", "metric")
            .append_pair("appid", api_key);
        tracing::debug!(location, "Requesting current weather");

        let response = self.http.get(url).send().await?.error_for_status()?;
        let data: OpenWeatherResponse = response
            .json()
            .await
            .context("Failed to parse weather payload")?;
        let description = data
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| anyhow!("Weather payload has no conditions"))?;

        Ok(WeatherSnapshot {
            temperature: data.main.temp,
            humidity: data.main.humidity,
            wind_speed: data.wind.speed,
            description,
            last_updated: chrono::Local::now().format("%H:%M:%S").to_string(),
        })
    }
}

/// The weather panel of one session: tracks the selected location and its latest snapshot.
#[derive(Debug, Default)]
pub struct LocationWeather {
    location: Option<String>,
    snapshot: Option<WeatherSnapshot>,
}

impl LocationWeather {
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    /// Re-fetches when the location changes; the previous snapshot is discarded first.
    pub async fn select(&mut self, client: &WeatherClient, location: &str) -> Option<&WeatherSnapshot> {
        let location = location.trim();
        if self.location.as_deref() != Some(location) {
            self.location = Some(location.to_string());
            self.snapshot = None;
            self.snapshot = client.fetch(location).await;
        }
        self.snapshot.as_ref()
    }

    pub async fn refresh(&mut self, client: &WeatherClient) -> Option<&WeatherSnapshot> {
        if let Some(location) = self.location.clone() {
            self.snapshot = client.fetch(&location).await;
        }
        self.snapshot.as_ref()
    }
}
