// Firebase ID-token verification and the AuthenticatedUser extractor

use axum::{
    RequestPartsExt, async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::{AppState, config::Settings, error::AppError};

const GOOGLE_PUBLIC_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const DEFAULT_KEY_MAX_AGE: Duration = Duration::from_secs(3600);

// exp, aud and iss are checked by `Validation` against the raw token, not read from here
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

struct CachedKeys {
    keys: Arc<HashMap<String, DecodingKey>>,
    fetched_at: Instant,
    max_age: Duration,
}

// Verification keys only; honours the max-age Google sends with them
static PUBLIC_KEYS: Lazy<RwLock<Option<CachedKeys>>> = Lazy::new(|| RwLock::new(None));

fn max_age(cache_control: &str) -> Duration {
    cache_control
        .split(',')
        .find_map(|part| part.trim().strip_prefix("max-age=").and_then(|v| v.parse::<u64>().ok()))
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_KEY_MAX_AGE)
}

async fn google_keys(http_client: &Client) -> Result<Arc<HashMap<String, DecodingKey>>, AppError> {
    if let Some(cache) = &*PUBLIC_KEYS.read().await {
        if cache.fetched_at.elapsed() < cache.max_age {
            return Ok(cache.keys.clone());
        }
    }

    info!("Fetching Google public keys from {}", GOOGLE_PUBLIC_KEYS_URL);
    let response = http_client
        .get(GOOGLE_PUBLIC_KEYS_URL)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AppError::InternalServerError(anyhow::Error::new(e).context("Network error fetching Google keys")))?;

    let max_age = max_age(
        response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );

    let key_map: HashMap<String, String> = response
        .json()
        .await
        .map_err(|e| AppError::InternalServerError(anyhow::Error::new(e).context("Error parsing Google keys JSON")))?;

    let keys: HashMap<String, DecodingKey> = key_map
        .into_iter()
        .filter_map(|(kid, pem)| match DecodingKey::from_rsa_pem(pem.as_bytes()) {
            Ok(key) => Some((kid, key)),
            Err(e) => {
                error!("Failed to decode public key PEM for kid {}: {}", kid, e);
                None
            }
        })
        .collect();

    if keys.is_empty() {
        return Err(AppError::InternalServerError(anyhow::anyhow!("Failed to load any valid Google public keys")));
    }

    let keys = Arc::new(keys);
    *PUBLIC_KEYS.write().await = Some(CachedKeys { keys: keys.clone(), fetched_at: Instant::now(), max_age });
    info!("Cached {} Google public keys for {:?}", keys.len(), max_age);
    Ok(keys)
}

/// Verifies a Firebase ID token against Google's published keys and the configured project.
pub async fn verify_token(token: &str, settings: &Settings, http_client: &Client) -> Result<Claims, AppError> {
    let header = decode_header(token).map_err(|e| {
        warn!("Invalid JWT header: {}", e);
        AppError::Unauthorized("Invalid token format".into())
    })?;
    let kid = header
        .kid
        .ok_or_else(|| AppError::Unauthorized("Token missing key identifier".into()))?;

    let project_id = settings.firebase_project_id.as_deref().ok_or_else(|| {
        error!("Firebase project id not configured");
        AppError::InternalServerError(anyhow::anyhow!("Missing Firebase project id configuration"))
    })?;

    let keys = google_keys(http_client).await?;
    let decoding_key = keys.get(&kid).ok_or_else(|| {
        warn!("Unknown 'kid' {} found in token header", kid);
        AppError::Unauthorized("Unknown key identifier".into())
    })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[project_id]);
    validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, project_id)]);

    let decoded = decode::<Claims>(token, decoding_key, &validation).map_err(|e| {
        warn!("Token validation failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
            jsonwebtoken::errors::ErrorKind::InvalidAudience => AppError::Unauthorized("Invalid token audience".into()),
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => AppError::Unauthorized("Invalid token issuer".into()),
            _ => AppError::Unauthorized("Invalid token".into()),
        }
    })?;

    info!("Token validated for user {}", decoded.claims.sub);
    Ok(decoded.claims)
}

/// The signed-in user, taken from `Authorization: Bearer <firebase id token>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| {
                warn!("Failed to extract Authorization header: {}", e);
                AppError::Unauthorized("Missing or invalid Authorization header".into())
            })?;

        let app_state = AppState::from_ref(state);
        let claims = verify_token(bearer.token(), &app_state.settings, &app_state.http_client).await?;
        Ok(AuthenticatedUser { user_id: claims.sub, email: claims.email })
    }
}
