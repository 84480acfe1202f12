// Pest and disease detection from one leaf photo

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ImageUpload, ValidationError};
use crate::models::{DetailSection, PredictionResult};

pub const IMAGE_FIELD: &str = "image";

static SCHEMA: FormSchema = FormSchema {
    fields: &[FieldSpec { name: IMAGE_FIELD, label: "Leaf photo", kind: FieldKind::Image, required: true }],
};

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseResponse {
    pub predicted_disease: String,
    // Percent, already rounded by the service
    pub confidence: f64,
    #[serde(default)]
    pub prevention_tips: String,
    pub structured_info: Option<StructuredInfo>,
}

/// The treatment guide sections the result page shows. Other keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredInfo {
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub immediate_actions: Vec<String>,
    #[serde(default)]
    pub chemical_controls: Vec<String>,
    #[serde(default)]
    pub cultural_practices: Vec<String>,
    #[serde(default)]
    pub monitoring: Vec<String>,
    #[serde(default)]
    pub resistant_varieties: Vec<String>,
}

impl StructuredInfo {
    fn into_sections(self) -> Vec<DetailSection> {
        let overview = self.overview.map(|o| vec![o]).unwrap_or_default();
        [
            ("Overview", overview),
            ("Immediate actions", self.immediate_actions),
            ("Chemical controls", self.chemical_controls),
            ("Cultural practices", self.cultural_practices),
            ("Monitoring", self.monitoring),
            ("Resistant varieties", self.resistant_varieties),
        ]
        .into_iter()
        .filter_map(|(title, items)| {
            let items: Vec<String> = items
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            (!items.is_empty()).then(|| DetailSection::new(title, items))
        })
        .collect()
    }
}

pub struct DiseaseAdvisory;

#[async_trait]
impl Advisory for DiseaseAdvisory {
    type Request = ImageUpload;
    type Response = DiseaseResponse;

    const SLUG: &'static str = "disease";
    const TITLE: &'static str = "Pest & Disease Detection";
    const POLICY: FailurePolicy = FailurePolicy::FailVisible;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<ImageUpload, ValidationError> {
        form.image(IMAGE_FIELD).cloned()
    }

    async fn send(services: &Services, request: ImageUpload) -> Result<DiseaseResponse, BackendError> {
        services.backend.predict_disease(&request).await
    }

    fn present(response: DiseaseResponse) -> PredictionResult {
        let tips = response.prevention_tips.trim();
        PredictionResult {
            label: response.predicted_disease,
            confidence: Some(response.confidence),
            explanation: (!tips.is_empty()).then(|| tips.to_string()),
            image: None,
            sections: response.structured_info.unwrap_or_default().into_sections(),
            disclaimer: None,
        }
    }
}
