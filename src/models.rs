// Data structures exchanged with the collaborators and rendered by the pages

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// --- Prediction results ---

/// Normalized outcome of one advisory submission, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub label: String,
    pub confidence: Option<f64>,
    pub explanation: Option<String>,
    pub image: Option<String>,
    pub sections: Vec<DetailSection>,
    // Shown next to fabricated or caveated results ("developer note")
    pub disclaimer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSection {
    pub title: String,
    pub items: Vec<String>,
}

impl DetailSection {
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        Self { title: title.into(), items }
    }
}

// --- Weather ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
    pub last_updated: String,
}

// --- Irrigation advice (generative text) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationAdvice {
    #[serde(default, deserialize_with = "lenient_string")]
    pub water_quantity: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub next_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub confidence: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reasoning: String,
}

impl IrrigationAdvice {
    /// Missing or null keys read "N/A", except reasoning which stays blank.
    pub fn fill_missing(mut self) -> Self {
        for value in [&mut self.water_quantity, &mut self.next_date, &mut self.confidence] {
            if value.trim().is_empty() {
                *value = "N/A".to_string();
            }
        }
        self
    }

    pub fn unparsed() -> Self {
        Self {
            water_quantity: "N/A".to_string(),
            next_date: "N/A".to_string(),
            confidence: "N/A".to_string(),
            reasoning: "Could not parse Gemini response".to_string(),
        }
    }
}

// Models sometimes answer `"confidence": 85`; keep it as "85". `null` reads as blank.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected a string, got {}", other))),
    }
}

// --- Government schemes ---

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemeQuery {
    pub limit: u32,
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemePage {
    pub total: u32,
    pub schemes: Vec<SchemeRecord>,
    pub limit: u32,
    pub offset: u32,
}

/// Server-owned scheme description. Keys the pages never read are dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub scheme_type: Option<String>,
    #[serde(default)]
    pub eligibility: Option<DetailContent>,
    #[serde(default)]
    pub benefits: Option<DetailContent>,
    #[serde(default)]
    pub how_to_apply: Option<DetailContent>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub crop_types: Vec<String>,
    #[serde(default)]
    pub components: Option<DetailContent>,
    #[serde(default)]
    pub implementation: Option<DetailContent>,
    #[serde(default)]
    pub financial_support: Option<DetailContent>,
}

/// Variably-shaped detail section: prose, a list, or a nested set of labelled entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailContent {
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<DetailContent>),
    Fields(BTreeMap<String, DetailContent>),
}

impl DetailContent {
    /// Flattens the section into display lines, prefixing nested entries with their key.
    pub fn lines(&self) -> Vec<String> {
        match self {
            DetailContent::Text(s) => s.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect(),
            DetailContent::Number(n) => vec![n.to_string()],
            DetailContent::Flag(b) => vec![if *b { "Yes".to_string() } else { "No".to_string() }],
            DetailContent::List(items) => items.iter().flat_map(DetailContent::lines).collect(),
            DetailContent::Fields(map) => map
                .iter()
                .flat_map(|(key, value)| {
                    let key = humanize_key(key);
                    value.lines().into_iter().map(move |line| format!("{}: {}", key, line))
                })
                .collect(),
        }
    }
}

impl SchemeRecord {
    /// Present detail sections in page order, with display titles.
    pub fn sections(&self) -> Vec<DetailSection> {
        let mut sections = Vec::new();
        let named = [
            ("Eligibility", &self.eligibility),
            ("Benefits", &self.benefits),
            ("How to apply", &self.how_to_apply),
            ("Components", &self.components),
            ("Implementation", &self.implementation),
            ("Financial support", &self.financial_support),
        ];
        for (title, content) in named {
            if let Some(content) = content {
                let items = content.lines();
                if !items.is_empty() {
                    sections.push(DetailSection::new(title, items));
                }
            }
        }
        if !self.crop_types.is_empty() {
            sections.push(DetailSection::new("Crops covered", self.crop_types.clone()));
        }
        sections
    }
}

pub(crate) fn humanize_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// --- Profile (pass-through to the backend profile store) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Partial profile update; only the provided fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Profile>,
    #[serde(default)]
    pub image_url: Option<String>,
}

// Login form posted by the Firebase web SDK
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "idToken")]
    pub id_token: String,
}
