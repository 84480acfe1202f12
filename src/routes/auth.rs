use axum::{
    Json,
    extract::{Form, State},
};
use serde_json::{Value, json};

use crate::{AppState, auth, error::AppResult, models::LoginForm};

// First few characters of a token for the logs; counts chars so it never splits one
fn token_preview(token: &str) -> String {
    token.chars().take(10).collect()
}

// Handler for POST /login
// The login page posts the ID token obtained from the Firebase web SDK
pub async fn handle_login(State(app_state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Json<Value>> {
    tracing::info!("Received login token (first few chars): {}", token_preview(&form.id_token));

    let claims = auth::verify_token(&form.id_token, &app_state.settings, &app_state.http_client)
        .await
        .inspect_err(|e| tracing::error!("Token verification failed: {:?}", e))?;

    tracing::info!("Token verified successfully for user_id: {}", claims.sub);
    Ok(Json(json!({ "userId": claims.sub })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_stops_on_character_boundaries() {
        assert_eq!(token_preview("eyJhbGciOiJSUzI1NiJ9.payload"), "eyJhbGciOi");
        assert_eq!(token_preview("short"), "short");
        // 'é' spans bytes 9..11, so a byte slice at 10 would panic
        assert_eq!(token_preview("abcdefghié-tail"), "abcdefghié");
    }
}
