// Fertilizer recommendation. Falls back to a flagged random pick when the backend is down.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ValidationError};
use crate::models::{DetailSection, PredictionResult};
use crate::tables::{FERTILIZER_CROP_TYPES, FERTILIZERS, PLACEHOLDER_FERTILIZER_IMAGE, SOIL_TYPES, fertilizer_info, label_code};

const PLACEHOLDER_NOTE: &str = "Developer note: the fertilizer service could not be reached. \
This recommendation was picked at random from the fertilizer catalogue and is not a prediction.";

static SCHEMA: FormSchema = FormSchema {
    fields: &[
        FieldSpec { name: "temperature", label: "Temperature (°C)", kind: FieldKind::Slider { min: 0.0, max: 50.0, default: 26.0 }, required: true },
        FieldSpec { name: "humidity", label: "Humidity (%)", kind: FieldKind::Slider { min: 0.0, max: 100.0, default: 52.0 }, required: true },
        FieldSpec { name: "moisture", label: "Soil moisture (%)", kind: FieldKind::Slider { min: 0.0, max: 100.0, default: 38.0 }, required: true },
        FieldSpec { name: "soil_type", label: "Soil type", kind: FieldKind::Select { options: SOIL_TYPES, default: Some("Loamy") }, required: true },
        FieldSpec { name: "crop_type", label: "Crop type", kind: FieldKind::Select { options: FERTILIZER_CROP_TYPES, default: Some("Wheat") }, required: true },
        FieldSpec { name: "nitrogen", label: "Nitrogen", kind: FieldKind::Slider { min: 0.0, max: 140.0, default: 37.0 }, required: true },
        FieldSpec { name: "potassium", label: "Potassium", kind: FieldKind::Slider { min: 0.0, max: 205.0, default: 0.0 }, required: true },
        FieldSpec { name: "phosphorous", label: "Phosphorous", kind: FieldKind::Slider { min: 0.0, max: 145.0, default: 0.0 }, required: true },
    ],
};

/// Soil and crop travel as the integer codes the model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FertilizerRequest {
    pub temperature: f64,
    pub humidity: f64,
    pub moisture: f64,
    pub soil_type: u8,
    pub crop_type: u8,
    pub nitrogen: f64,
    pub potassium: f64,
    pub phosphorous: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FertilizerResponse {
    pub recommended_fertilizer: String,
    // Fraction in [0, 1]
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub tips: Option<String>,
    pub gemini_tip: Option<String>,
    pub note: Option<String>,
}

fn encode(form: &FormState, field: &str, table: &[&str]) -> Result<u8, ValidationError> {
    let label = form.text(field)?;
    label_code(table, &label).ok_or(ValidationError::UnknownChoice { field: field.to_string(), value: label })
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub struct FertilizerAdvisory;

#[async_trait]
impl Advisory for FertilizerAdvisory {
    type Request = FertilizerRequest;
    type Response = FertilizerResponse;

    const SLUG: &'static str = "fertilizer";
    const TITLE: &'static str = "Fertilizer Recommendation";
    const POLICY: FailurePolicy = FailurePolicy::FailSoft;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<FertilizerRequest, ValidationError> {
        Ok(FertilizerRequest {
            temperature: form.number("temperature")?,
            humidity: form.number("humidity")?,
            moisture: form.number("moisture")?,
            soil_type: encode(form, "soil_type", SOIL_TYPES)?,
            crop_type: encode(form, "crop_type", FERTILIZER_CROP_TYPES)?,
            nitrogen: form.number("nitrogen")?,
            potassium: form.number("potassium")?,
            phosphorous: form.number("phosphorous")?,
        })
    }

    async fn send(services: &Services, request: FertilizerRequest) -> Result<FertilizerResponse, BackendError> {
        services.backend.predict_fertilizer(&request).await
    }

    fn present(response: FertilizerResponse) -> PredictionResult {
        let info = fertilizer_info(&response.recommended_fertilizer);
        let tips = non_blank(response.tips).or_else(|| info.map(|i| i.tips.to_string()));

        let mut sections = Vec::new();
        if let Some(tips) = tips {
            sections.push(DetailSection::new("Application tips", vec![tips]));
        }
        if let Some(tip) = non_blank(response.gemini_tip) {
            sections.push(DetailSection::new("AI tip", vec![tip]));
        }

        PredictionResult {
            label: response.recommended_fertilizer.trim().to_string(),
            confidence: response.confidence.map(|c| (c * 10_000.0).round() / 100.0),
            explanation: non_blank(response.description).or_else(|| info.map(|i| i.description.to_string())),
            image: Some(info.map_or(PLACEHOLDER_FERTILIZER_IMAGE, |i| i.image).to_string()),
            sections,
            disclaimer: non_blank(response.note),
        }
    }

    fn placeholder(_form: &FormState) -> Option<PredictionResult> {
        let pick = FERTILIZERS.choose(&mut rand::thread_rng())?;
        Some(PredictionResult {
            label: pick.name.to_string(),
            confidence: None,
            explanation: Some(pick.description.to_string()),
            image: Some(pick.image.to_string()),
            sections: vec![DetailSection::new("Application tips", vec![pick.tips.to_string()])],
            disclaimer: Some(PLACEHOLDER_NOTE.to_string()),
        })
    }
}
