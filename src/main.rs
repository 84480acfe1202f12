use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;
use crate::controller::Services;
use crate::launch::LaunchFlag;
use crate::session::Sessions;

// Declare modules
mod advice;
mod advisories;
mod auth;
mod backend;
mod config;
mod controller;
mod error;
mod form;
mod launch;
mod models;
mod routes;
mod schemes;
mod session;
mod tables;
mod weather;

#[cfg(test)]
mod test_support;

const USER_AGENT: &str = concat!("seedsync/", env!("CARGO_PKG_VERSION"));
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Define the application state struct
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    http_client: Arc<Client>,
    services: Services,
    sessions: Arc<Sessions>,
    launch: Arc<LaunchFlag>,
}

impl AppState {
    fn new(settings: Arc<Settings>, http_client: Arc<Client>) -> Self {
        let launch = LaunchFlag::load(&settings.state_dir);
        let idle_timeout = Duration::from_secs(settings.session_idle_minutes.saturating_mul(60));
        AppState {
            services: Services::new(http_client.clone(), settings.clone()),
            sessions: Arc::new(Sessions::new(idle_timeout)),
            launch: Arc::new(launch),
            settings,
            http_client,
        }
    }
}

fn build_http_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url).context("Invalid proxy_url in configuration")?);
        tracing::info!("Routing outbound requests through the configured proxy.");
    }
    builder.build().context("Failed to build shared reqwest client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "seedsync=info,tower_http=info".into())) // Default to info if RUST_LOG not set
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing SeedSync server...");

    // Load configuration
    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    if settings.weather_api_key.is_none() {
        tracing::warn!("No weather API key configured; weather panels will stay empty.");
    }
    if settings.gemini_api_key.is_none() {
        tracing::warn!("No Gemini API key configured; irrigation advice will read N/A.");
    }
    let shared_settings = Arc::new(settings);

    let http_client = Arc::new(build_http_client(&shared_settings)?);
    tracing::info!("Shared HTTP client created.");

    let app_state = AppState::new(shared_settings.clone(), http_client);

    // Tabs that never come back would otherwise keep their sessions forever
    let sessions = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle().await;
            if evicted > 0 {
                tracing::info!("Evicted {} idle sessions", evicted);
            }
        }
    });

    let router: Router = routes::create_router(app_state);
    let app = router
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Parse the server address from settings
    let addr: SocketAddr = match shared_settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(
                "Invalid server address format in configuration ('{}'): {}",
                shared_settings.server_address,
                e
            );
            return Err(anyhow::anyhow!("Invalid server address format: {}", shared_settings.server_address));
        }
    };

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
