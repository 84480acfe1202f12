// Irrigation advice from the Gemini text model.
// The model is asked for fenced JSON; anything we cannot read becomes the "N/A" sentinel.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::Settings;
use crate::models::IrrigationAdvice;

// First fenced block, optionally tagged "json"
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:json)?\n?(.*?)```").expect("fenced block pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct IrrigationInputs {
    pub crop_type: String,
    pub soil_type: String,
    pub region: String,
    pub growth_stage: String,
    pub soil_moisture: f64,
    pub last_irrigation_date: NaiveDate,
}

pub fn build_prompt(inputs: &IrrigationInputs) -> String {
    format!(
        r#"
Provide irrigation advice:
Crop: {crop}
Soil: {soil}
Region: {region}
Growth Stage: {stage}
Soil Moisture: {moisture}%
Last Irrigation Date: {last}

Respond ONLY with valid JSON, wrapped in triple backticks:
```
{{
  "waterQuantity": "...",
  "nextDate": "...",
  "confidence": "...",
  "reasoning": "..."
}}
```
"#,
        crop = inputs.crop_type,
        soil = inputs.soil_type,
        region = inputs.region,
        stage = inputs.growth_stage,
        moisture = inputs.soil_moisture,
        last = inputs.last_irrigation_date.format("%Y-%m-%d"),
    )
}

/// Pulls the advice object out of free model text.
///
/// Looks for a fenced block first and falls back to the whole text when there is none.
/// Returns [`IrrigationAdvice::unparsed`] only if the candidate is not a JSON object.
/// Keys the model left out are filled in one by one.
pub fn parse_advice(text: &str) -> IrrigationAdvice {
    let candidate = FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str());

    match serde_json::from_str::<IrrigationAdvice>(candidate.trim()) {
        Ok(advice) => advice.fill_missing(),
        Err(e) => {
            tracing::warn!("Could not parse Gemini irrigation reply: {}", e);
            IrrigationAdvice::unparsed()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct AdviceClient {
    http: Arc<Client>,
    settings: Arc<Settings>,
}

impl AdviceClient {
    pub fn new(http: Arc<Client>, settings: Arc<Settings>) -> Self {
        Self { http, settings }
    }

    /// Asks the model for irrigation advice. Never fails: every error path yields the sentinel.
    pub async fn get_advice(&self, inputs: &IrrigationInputs) -> IrrigationAdvice {
        let Some(api_key) = self.settings.gemini_api_key.as_deref() else {
            tracing::warn!("Gemini API key not configured; returning fallback irrigation advice");
            return IrrigationAdvice::unparsed();
        };

        match self.generate(&build_prompt(inputs), api_key).await {
            Ok(text) => {
                tracing::debug!("Gemini raw response: {}", text);
                parse_advice(&text)
            }
            Err(e) => {
                tracing::error!("Gemini request failed: {:#}", e);
                IrrigationAdvice::unparsed()
            }
        }
    }

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String> {
        let model = &self.settings.gemini_model;
        let model_path = if model.starts_with("models/") {
            model.clone()
        } else {
            format!("models/{}", model)
        };
        let endpoint = format!(
            "{}/{}:generateContent",
            self.settings.gemini_base_url.trim_end_matches('/'),
            model_path
        );
        let mut url = Url::parse(&endpoint).context("failed to parse Gemini endpoint URL")?;
        url.query_pairs_mut().append_pair("key", api_key);

        let body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{"text": prompt}]
                }
            ]
        });

        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        let payload = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("Gemini API error ({}): {}", status, payload.trim()));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&payload).context("failed to parse Gemini response JSON")?;
        let text: String = parsed
            .candidates
            .first()
            .map(|c| c.content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(anyhow!("no text candidate returned from Gemini"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::{Json, Router, extract::{Path, Query}, http::StatusCode, response::IntoResponse, routing::post};
    use std::collections::HashMap;

    fn inputs() -> IrrigationInputs {
        IrrigationInputs {
            crop_type: "Wheat".into(),
            soil_type: "Loamy".into(),
            region: "Punjab".into(),
            growth_stage: "Vegetative".into(),
            soil_moisture: 40.0,
            last_irrigation_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    #[test]
    fn parses_a_json_tagged_fence() {
        let text = "Sure!\n```json\n{\"waterQuantity\": \"25 mm\", \"nextDate\": \"2024-06-05\", \"confidence\": \"High\", \"reasoning\": \"Moisture is low\"}\n```\nGood luck.";
        let advice = parse_advice(text);
        assert_eq!(advice.water_quantity, "25 mm");
        assert_eq!(advice.next_date, "2024-06-05");
        assert_eq!(advice.confidence, "High");
        assert_eq!(advice.reasoning, "Moisture is low");
    }

    #[test]
    fn parses_an_untagged_fence() {
        let text = "```\n{\"waterQuantity\": \"10 mm\", \"nextDate\": \"tomorrow\", \"confidence\": \"Medium\", \"reasoning\": \"r\"}```";
        assert_eq!(parse_advice(text).water_quantity, "10 mm");
    }

    #[test]
    fn bare_json_without_a_fence_is_accepted() {
        let text = "{\"waterQuantity\": \"5 mm\", \"nextDate\": \"in 3 days\", \"confidence\": \"Low\", \"reasoning\": \"rain due\"}";
        assert_eq!(parse_advice(text).next_date, "in 3 days");
    }

    #[test]
    fn text_without_fence_or_json_yields_the_sentinel() {
        assert_eq!(parse_advice("Water your crops twice a week."), IrrigationAdvice::unparsed());
    }

    #[test]
    fn missing_keys_are_filled_individually() {
        let text = "```json\n{\"waterQuantity\":\"20 mm\",\"nextDate\":\"2024-06-04\",\"confidence\":\"High\"}\n```";
        let advice = parse_advice(text);
        assert_eq!(advice.water_quantity, "20 mm");
        assert_eq!(advice.next_date, "2024-06-04");
        assert_eq!(advice.confidence, "High");
        assert_eq!(advice.reasoning, "");

        let sparse = parse_advice(r#"{"nextDate": "tomorrow"}"#);
        assert_eq!(sparse.water_quantity, "N/A");
        assert_eq!(sparse.next_date, "tomorrow");
        assert_eq!(sparse.confidence, "N/A");
    }

    #[test]
    fn null_values_do_not_discard_the_reply() {
        let text = "```\n{\"waterQuantity\":\"15 mm\",\"nextDate\":null,\"confidence\":70,\"reasoning\":null}\n```";
        let advice = parse_advice(text);
        assert_ne!(advice, IrrigationAdvice::unparsed());
        assert_eq!(advice.water_quantity, "15 mm");
        assert_eq!(advice.next_date, "N/A");
        assert_eq!(advice.confidence, "70");
        assert_eq!(advice.reasoning, "");
    }

    #[test]
    fn fenced_invalid_json_yields_the_sentinel() {
        let advice = parse_advice("```json\n{waterQuantity: 25mm,}\n```");
        assert_eq!(
            advice,
            IrrigationAdvice {
                water_quantity: "N/A".into(),
                next_date: "N/A".into(),
                confidence: "N/A".into(),
                reasoning: "Could not parse Gemini response".into(),
            }
        );
    }

    #[test]
    fn prompt_embeds_every_input() {
        let prompt = build_prompt(&inputs());
        for needle in ["Crop: Wheat", "Soil: Loamy", "Region: Punjab", "Growth Stage: Vegetative", "Soil Moisture: 40%", "Last Irrigation Date: 2024-06-01", "\"waterQuantity\""] {
            assert!(prompt.contains(needle), "prompt is missing {needle}");
        }
    }

    #[tokio::test]
    async fn end_to_end_against_a_gemini_stub() {
        let app = Router::new().route(
            "/models/*call",
            post(|Path(call): Path<String>, Query(q): Query<HashMap<String, String>>, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(call, "gemini-1.5-flash:generateContent");
                assert_eq!(q.get("key").map(String::as_str), Some("test-gemini-key"));
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default().to_string();
                if !prompt.contains("Crop: Wheat") {
                    return (StatusCode::BAD_REQUEST, "bad prompt").into_response();
                }
                Json(serde_json::json!({
                    "candidates": [{"content": {"parts": [{"text": "```json\n{\"waterQuantity\": \"20 mm\", \"nextDate\": \"2024-06-04\", \"confidence\": 80, \"reasoning\": \"Warm week\"}\n```"}]}}]
                }))
                .into_response()
            }),
        );
        let base = spawn_stub(app).await;
        let client = AdviceClient::new(Arc::new(Client::new()), Arc::new(Settings::for_stub(&base)));

        let advice = client.get_advice(&inputs()).await;
        assert_eq!(advice.water_quantity, "20 mm");
        assert_eq!(advice.confidence, "80");
    }

    #[tokio::test]
    async fn transport_failure_yields_the_sentinel() {
        let client = AdviceClient::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        assert_eq!(client.get_advice(&inputs()).await, IrrigationAdvice::unparsed());
    }
}
