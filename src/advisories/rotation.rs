// Crop rotation planning. A backend failure shows a generic legume-break plan, clearly flagged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ValidationError};
use crate::models::{DetailSection, PredictionResult};

const CROPS: &[&str] = &["Wheat", "Rice", "Maize", "Barley", "Pulses", "Mustard", "Soybean", "Cotton"];
const SOILS: &[&str] = &["Clay", "Loamy", "Sandy", "Silty"];
const CLIMATES: &[&str] = &["Tropical", "Temperate", "Arid", "Subtropical", "Mediterranean"];
const SEASONS: &[&str] = &["Kharif", "Rabi", "Zaid"];
const WATER: &[&str] = &["High", "Medium", "Low"];
const IRRIGATION: &[&str] = &["Drip", "Flood", "Sprinkler", "None"];
const PESTS: &[&str] = &["Fungal Infection", "Pest Attacks", "Bacterial Blight", "Rust", "Nematodes", "None"];
const GOALS: &[&str] = &["Maximize yield", "Soil health", "Minimize pest risk", "Market demand", "Water conservation"];

const PLACEHOLDER_NOTE: &str = "Developer note: the rotation service could not be reached. \
This is a generic example plan, not advice for your field.";

static SCHEMA: FormSchema = FormSchema {
    fields: &[
        FieldSpec { name: "currentCrop", label: "Current crop", kind: FieldKind::Select { options: CROPS, default: None }, required: true },
        FieldSpec { name: "previousCrops", label: "Previous crop(s)", kind: FieldKind::MultiSelect { options: CROPS }, required: false },
        FieldSpec { name: "soilType", label: "Soil type", kind: FieldKind::Select { options: SOILS, default: None }, required: true },
        FieldSpec { name: "nitrogen", label: "Nitrogen", kind: FieldKind::Slider { min: 0.0, max: 140.0, default: 50.0 }, required: true },
        FieldSpec { name: "phosphorus", label: "Phosphorus", kind: FieldKind::Slider { min: 0.0, max: 145.0, default: 25.0 }, required: true },
        FieldSpec { name: "potassium", label: "Potassium", kind: FieldKind::Slider { min: 0.0, max: 205.0, default: 70.0 }, required: true },
        FieldSpec { name: "soilpH", label: "Soil pH", kind: FieldKind::Slider { min: 3.5, max: 10.0, default: 6.5 }, required: true },
        FieldSpec { name: "climateZone", label: "Climate zone", kind: FieldKind::Select { options: CLIMATES, default: None }, required: true },
        FieldSpec { name: "season", label: "Season", kind: FieldKind::Select { options: SEASONS, default: None }, required: true },
        FieldSpec { name: "waterAvailability", label: "Water availability", kind: FieldKind::Select { options: WATER, default: None }, required: true },
        FieldSpec { name: "irrigationType", label: "Irrigation type", kind: FieldKind::Select { options: IRRIGATION, default: None }, required: true },
        FieldSpec { name: "pestDiseaseHistory", label: "Pest/disease history", kind: FieldKind::MultiSelect { options: PESTS }, required: false },
        FieldSpec { name: "targetGoal", label: "Target goal", kind: FieldKind::Select { options: GOALS, default: Some("Soil health") }, required: true },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationRequest {
    pub current_crop: String,
    pub previous_crops: Vec<String>,
    pub soil_type: String,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    #[serde(rename = "soilpH")]
    pub soil_ph: f64,
    pub climate_zone: String,
    pub season: String,
    pub water_availability: String,
    pub irrigation_type: String,
    pub pest_disease_history: Vec<String>,
    pub target_goal: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationResponse {
    pub next_crop: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub advantages: Vec<String>,
    #[serde(default)]
    pub rotation_plan: Option<Vec<String>>,
}

pub struct RotationAdvisory;

#[async_trait]
impl Advisory for RotationAdvisory {
    type Request = RotationRequest;
    type Response = RotationResponse;

    const SLUG: &'static str = "rotation";
    const TITLE: &'static str = "Crop Rotation Planner";
    const POLICY: FailurePolicy = FailurePolicy::FailSoft;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<RotationRequest, ValidationError> {
        Ok(RotationRequest {
            current_crop: form.text("currentCrop")?,
            previous_crops: form.list("previousCrops"),
            soil_type: form.text("soilType")?,
            nitrogen: form.number("nitrogen")?,
            phosphorus: form.number("phosphorus")?,
            potassium: form.number("potassium")?,
            soil_ph: form.number("soilpH")?,
            climate_zone: form.text("climateZone")?,
            season: form.text("season")?,
            water_availability: form.text("waterAvailability")?,
            irrigation_type: form.text("irrigationType")?,
            pest_disease_history: form.list("pestDiseaseHistory"),
            target_goal: form.text("targetGoal")?,
        })
    }

    async fn send(services: &Services, request: RotationRequest) -> Result<RotationResponse, BackendError> {
        services.backend.generate_rotation_advice(&request).await
    }

    fn present(response: RotationResponse) -> PredictionResult {
        let mut sections = Vec::new();
        if !response.advantages.is_empty() {
            sections.push(DetailSection::new("Advantages", response.advantages));
        }
        if let Some(plan) = response.rotation_plan.filter(|p| !p.is_empty()) {
            sections.push(DetailSection::new("Rotation plan", plan));
        }
        PredictionResult {
            label: response.next_crop,
            explanation: Some(response.justification).filter(|j| !j.trim().is_empty()),
            sections,
            ..Default::default()
        }
    }

    fn placeholder(_form: &FormState) -> Option<PredictionResult> {
        let mut result = Self::present(RotationResponse {
            next_crop: "Pulses".to_string(),
            justification: "Pulses fix nitrogen and break the pest and disease cycles of cereals such as wheat or maize."
                .to_string(),
            advantages: vec![
                "Nitrogen fixation reduces fertilizer needs.".to_string(),
                "Disrupts the life cycles of cereal pests and diseases.".to_string(),
                "Improves soil structure and microbial activity.".to_string(),
            ],
            rotation_plan: Some(vec![
                "Season 1 (Rabi): Wheat".to_string(),
                "Season 2 (Kharif): Pulses".to_string(),
                "Season 3 (Rabi): Mustard".to_string(),
            ]),
        });
        result.disclaimer = Some(PLACEHOLDER_NOTE.to_string());
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::controller::{ControllerError, FormController, Phase};
    use crate::form::FieldValue;
    use crate::test_support::spawn_stub;
    use axum::{Json, Router, routing::post};
    use reqwest::Client;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn filled() -> Vec<(String, FieldValue)> {
        [
            ("currentCrop", FieldValue::Text("Wheat".into())),
            ("previousCrops", FieldValue::List(vec!["Rice".into(), "Maize".into()])),
            ("soilType", FieldValue::Text("Loamy".into())),
            ("climateZone", FieldValue::Text("Subtropical".into())),
            ("season", FieldValue::Text("Rabi".into())),
            ("waterAvailability", FieldValue::Text("Medium".into())),
            ("irrigationType", FieldValue::Text("Drip".into())),
            ("soilpH", FieldValue::Text("7.2".into())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn request_uses_the_camel_case_form_names() {
        let mut form = SCHEMA.defaults();
        SCHEMA.apply_all(&mut form, filled()).unwrap();
        SCHEMA.validate(&form).unwrap();

        let wire = serde_json::to_value(RotationAdvisory::build_request(&form).unwrap()).unwrap();
        assert_eq!(wire["currentCrop"], "Wheat");
        assert_eq!(wire["previousCrops"], json!(["Rice", "Maize"]));
        assert_eq!(wire["soilpH"], 7.2);
        assert_eq!(wire["pestDiseaseHistory"], json!([]));
        assert_eq!(wire["targetGoal"], "Soil health");
    }

    #[test]
    fn unknown_previous_crop_is_rejected() {
        let mut form = SCHEMA.defaults();
        SCHEMA.apply_all(&mut form, filled()).unwrap();
        SCHEMA.apply(&mut form, "previousCrops", FieldValue::List(vec!["Quinoa".into()])).unwrap();
        assert_eq!(
            SCHEMA.validate(&form),
            Err(ValidationError::UnknownChoice { field: "previousCrops".into(), value: "Quinoa".into() })
        );
    }

    #[tokio::test]
    async fn untouched_form_is_incomplete() {
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        let controller = FormController::<RotationAdvisory>::new();
        assert!(matches!(
            controller.submit(&services).await,
            Err(ControllerError::Invalid(ValidationError::Missing { .. }))
        ));
    }

    #[tokio::test]
    async fn advice_is_mapped_into_sections() {
        let app = Router::new().route(
            "/api/rotation/generate-advice",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["soilType"], "Loamy");
                Json(json!({
                    "nextCrop": "Chickpea",
                    "justification": "Restores nitrogen after wheat.",
                    "advantages": ["Fixes nitrogen"],
                    "rotationPlan": []
                }))
            }),
        );
        let base = spawn_stub(app).await;
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub(&base)));
        let controller = FormController::<RotationAdvisory>::new();
        controller.update(filled()).await.unwrap();

        let resolution = controller.submit(&services).await.unwrap();
        assert!(!resolution.placeholder);
        assert_eq!(resolution.result.label, "Chickpea");
        assert_eq!(resolution.result.sections, vec![DetailSection::new("Advantages", vec!["Fixes nitrogen".into()])]);
    }

    #[tokio::test]
    async fn backend_failure_shows_the_flagged_example_plan() {
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        let controller = FormController::<RotationAdvisory>::new();
        controller.update(filled()).await.unwrap();

        let resolution = controller.submit(&services).await.unwrap();
        assert!(resolution.placeholder);
        assert_eq!(resolution.result.label, "Pulses");
        assert_eq!(resolution.result.disclaimer.as_deref(), Some(PLACEHOLDER_NOTE));
        assert!(matches!(controller.view().await.phase, Phase::Resolved { placeholder: true, .. }));

        let report = controller.report().await.unwrap();
        assert_eq!(report.feature, "rotation");
        assert_eq!(report.input_data.get("currentCrop"), Some(&FieldValue::Choice("Wheat".into())));
    }
}
