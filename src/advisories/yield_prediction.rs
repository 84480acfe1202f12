// Yield prediction from crop, region, season and inputs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ValidationError};
use crate::models::PredictionResult;

// Spelled the way the yield dataset spells them
const CROPS: &[&str] = &[
    "Arecanut", "Bajra", "Banana", "Barley", "Coconut", "Cotton(lint)", "Gram", "Groundnut", "Jowar", "Jute", "Maize",
    "Moong(Green Gram)", "Onion", "Potato", "Ragi", "Rapeseed &Mustard", "Rice", "Soyabean", "Sugarcane", "Sunflower",
    "Turmeric", "Urad", "Wheat",
];
const STATES: &[&str] = &[
    "Andhra Pradesh", "Assam", "Bihar", "Chhattisgarh", "Gujarat", "Haryana", "Karnataka", "Kerala", "Madhya Pradesh",
    "Maharashtra", "Odisha", "Punjab", "Rajasthan", "Tamil Nadu", "Telangana", "Uttar Pradesh", "Uttarakhand", "West Bengal",
];
const SEASONS: &[&str] = &["Autumn", "Kharif", "Rabi", "Summer", "Whole Year", "Winter"];

static SCHEMA: FormSchema = FormSchema {
    fields: &[
        FieldSpec { name: "crop", label: "Crop", kind: FieldKind::Select { options: CROPS, default: Some("Rice") }, required: true },
        FieldSpec { name: "state", label: "State", kind: FieldKind::Select { options: STATES, default: Some("Punjab") }, required: true },
        FieldSpec { name: "season", label: "Season", kind: FieldKind::Select { options: SEASONS, default: Some("Kharif") }, required: true },
        FieldSpec { name: "rainfall", label: "Annual rainfall (mm)", kind: FieldKind::Number { min: 0.0, max: 6000.0, default: Some(1200.0) }, required: true },
        FieldSpec { name: "fertilizer", label: "Fertilizer (kg/ha)", kind: FieldKind::Number { min: 0.0, max: 1000.0, default: Some(150.0) }, required: true },
        FieldSpec { name: "pesticide", label: "Pesticide (kg/ha)", kind: FieldKind::Number { min: 0.0, max: 50.0, default: Some(0.5) }, required: true },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRequest {
    pub crop: String,
    pub state: String,
    pub season: String,
    pub rainfall: f64,
    pub fertilizer: f64,
    pub pesticide: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YieldResponse {
    pub predicted_yield: f64,
    pub unit: String,
    pub confidence: Option<f64>,
    pub note: Option<String>,
}

pub struct YieldAdvisory;

#[async_trait]
impl Advisory for YieldAdvisory {
    type Request = YieldRequest;
    type Response = YieldResponse;

    const SLUG: &'static str = "yield";
    const TITLE: &'static str = "Yield Prediction";
    const POLICY: FailurePolicy = FailurePolicy::FailVisible;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<YieldRequest, ValidationError> {
        Ok(YieldRequest {
            crop: form.text("crop")?,
            state: form.text("state")?,
            season: form.text("season")?,
            rainfall: form.number("rainfall")?,
            fertilizer: form.number("fertilizer")?,
            pesticide: form.number("pesticide")?,
        })
    }

    async fn send(services: &Services, request: YieldRequest) -> Result<YieldResponse, BackendError> {
        services.backend.predict_yield(&request).await
    }

    fn present(response: YieldResponse) -> PredictionResult {
        PredictionResult {
            label: format!("{:.2} {}", response.predicted_yield, response.unit),
            confidence: response.confidence,
            disclaimer: response.note.filter(|n| !n.trim().is_empty()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::controller::{ControllerError, FormController};
    use crate::form::FieldValue;
    use crate::test_support::spawn_stub;
    use axum::{Json, Router, routing::post};
    use reqwest::Client;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn free_text_numbers_are_coerced() {
        let mut form = SCHEMA.defaults();
        SCHEMA
            .apply_all(&mut form, [
                ("rainfall".to_string(), FieldValue::Text("980.5".into())),
                ("season".to_string(), FieldValue::Text("Rabi".into())),
            ])
            .unwrap();
        SCHEMA.validate(&form).unwrap();

        let request = YieldAdvisory::build_request(&form).unwrap();
        assert_eq!(
            request,
            YieldRequest {
                crop: "Rice".into(),
                state: "Punjab".into(),
                season: "Rabi".into(),
                rainfall: 980.5,
                fertilizer: 150.0,
                pesticide: 0.5,
            }
        );
    }

    #[test]
    fn cleared_number_blocks_submission() {
        let mut form = SCHEMA.defaults();
        SCHEMA.apply(&mut form, "pesticide", FieldValue::Text("".into())).unwrap();
        assert_eq!(SCHEMA.validate(&form), Err(ValidationError::Missing { field: "pesticide".into() }));
    }

    #[tokio::test]
    async fn yield_is_labelled_with_its_unit() {
        let app = Router::new().route(
            "/api/yield/predict",
            post(|Json(body): Json<YieldRequest>| async move {
                assert_eq!(body.crop, "Rice");
                Json(json!({"predicted_yield": 27.3456, "unit": "quintals/hectare", "note": "Model estimate"}))
            }),
        );
        let base = spawn_stub(app).await;
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub(&base)));

        let result = FormController::<YieldAdvisory>::new().submit(&services).await.unwrap().result;
        assert_eq!(result.label, "27.35 quintals/hectare");
        assert_eq!(result.disclaimer.as_deref(), Some("Model estimate"));
    }

    #[tokio::test]
    async fn out_of_range_input_is_rejected_before_sending() {
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        let controller = FormController::<YieldAdvisory>::new();
        controller.update([("fertilizer".to_string(), FieldValue::Number(5000.0))]).await.unwrap();

        assert!(matches!(
            controller.submit(&services).await,
            Err(ControllerError::Invalid(ValidationError::OutOfRange { .. }))
        ));
    }
}
