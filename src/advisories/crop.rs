// Crop recommendation: soil nutrients and climate in, one crop label out

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ValidationError};
use crate::models::PredictionResult;
use crate::tables::crop_info;

static SCHEMA: FormSchema = FormSchema {
    fields: &[
        FieldSpec { name: "N", label: "Nitrogen (N)", kind: FieldKind::Slider { min: 0.0, max: 140.0, default: 50.0 }, required: true },
        FieldSpec { name: "P", label: "Phosphorus (P)", kind: FieldKind::Slider { min: 5.0, max: 145.0, default: 25.0 }, required: true },
        FieldSpec { name: "K", label: "Potassium (K)", kind: FieldKind::Slider { min: 5.0, max: 205.0, default: 70.0 }, required: true },
        FieldSpec { name: "temperature", label: "Temperature (°C)", kind: FieldKind::Slider { min: 8.0, max: 44.0, default: 25.0 }, required: true },
        FieldSpec { name: "humidity", label: "Humidity (%)", kind: FieldKind::Slider { min: 14.0, max: 100.0, default: 75.0 }, required: true },
        FieldSpec { name: "ph", label: "Soil pH", kind: FieldKind::Slider { min: 3.5, max: 10.0, default: 6.5 }, required: true },
        FieldSpec { name: "rainfall", label: "Rainfall (mm)", kind: FieldKind::Slider { min: 20.0, max: 300.0, default: 120.0 }, required: true },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRequest {
    #[serde(rename = "N")]
    pub nitrogen: f64,
    #[serde(rename = "P")]
    pub phosphorus: f64,
    #[serde(rename = "K")]
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CropResponse {
    pub predicted_crop: String,
}

pub struct CropAdvisory;

#[async_trait]
impl Advisory for CropAdvisory {
    type Request = CropRequest;
    type Response = CropResponse;

    const SLUG: &'static str = "crop";
    const TITLE: &'static str = "Crop Recommendation";
    const POLICY: FailurePolicy = FailurePolicy::FailVisible;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<CropRequest, ValidationError> {
        Ok(CropRequest {
            nitrogen: form.number("N")?,
            phosphorus: form.number("P")?,
            potassium: form.number("K")?,
            temperature: form.number("temperature")?,
            humidity: form.number("humidity")?,
            ph: form.number("ph")?,
            rainfall: form.number("rainfall")?,
        })
    }

    async fn send(services: &Services, request: CropRequest) -> Result<CropResponse, BackendError> {
        services.backend.predict_crop(&request).await
    }

    fn present(response: CropResponse) -> PredictionResult {
        let label = response.predicted_crop.trim().to_lowercase();
        let info = crop_info(&label);
        PredictionResult {
            explanation: (!info.description.is_empty()).then(|| info.description.to_string()),
            image: Some(info.image),
            label,
            ..Default::default()
        }
    }

    fn failure_message(_error: &BackendError) -> String {
        "Prediction failed.".to_string()
    }
}
