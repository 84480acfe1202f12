// Irrigation advice, answered by the generative text model rather than the prediction backend

use async_trait::async_trait;

use crate::advice::IrrigationInputs;
use crate::backend::BackendError;
use crate::controller::{Advisory, FailurePolicy, Services};
use crate::form::{FieldKind, FieldSpec, FormSchema, FormState, ValidationError};
use crate::models::{DetailSection, IrrigationAdvice, PredictionResult};

const CROPS: &[&str] = &[
    "Apple", "Banana", "Barley", "Brinjal", "Cabbage", "Chickpea", "Coffee", "Cotton", "Garlic", "Groundnut", "Jute",
    "Lentil", "Maize", "Mango", "Millet", "Mustard", "Onion", "Potato", "Pulses", "Rice", "Sorghum", "Soybean",
    "Sugarcane", "Sunflower", "Tea", "Tomato", "Vegetables", "Wheat",
];
const SOILS: &[&str] = &[
    "Alluvial", "Black", "Chalky", "Clay", "Clayey", "Laterite", "Loam", "Loamy", "Peaty", "Sandy", "Sandy Loam", "Silty",
];
pub const REGIONS: &[&str] = &[
    "Agra", "Aligarh", "Amritsar", "Bareilly", "Cauvery Delta", "Chandigarh", "Dehradun", "Delhi", "Gurgaon", "Jaipur",
    "Jodhpur", "Kanpur", "Krishna Delta", "Lucknow", "Meerut", "Moradabad", "Noida", "Shimla", "Udaipur", "Varanasi",
];
const GROWTH_STAGES: &[&str] = &["Seedling", "Vegetative", "Flowering", "Maturity"];

pub const REGION_FIELD: &str = "region";

static SCHEMA: FormSchema = FormSchema {
    fields: &[
        FieldSpec { name: "cropType", label: "Crop", kind: FieldKind::Select { options: CROPS, default: None }, required: true },
        FieldSpec { name: "soilType", label: "Soil type", kind: FieldKind::Select { options: SOILS, default: None }, required: true },
        FieldSpec { name: REGION_FIELD, label: "Region", kind: FieldKind::Select { options: REGIONS, default: Some("Noida") }, required: true },
        FieldSpec { name: "growthStage", label: "Growth stage", kind: FieldKind::Select { options: GROWTH_STAGES, default: Some("Vegetative") }, required: true },
        FieldSpec { name: "soilMoisture", label: "Soil moisture (%)", kind: FieldKind::Slider { min: 0.0, max: 100.0, default: 40.0 }, required: true },
        FieldSpec { name: "lastIrrigationDate", label: "Last irrigation date", kind: FieldKind::Date, required: true },
    ],
};

pub struct IrrigationAdvisory;

#[async_trait]
impl Advisory for IrrigationAdvisory {
    type Request = IrrigationInputs;
    type Response = IrrigationAdvice;

    const SLUG: &'static str = "irrigation";
    const TITLE: &'static str = "Irrigation Advice";
    // The advice client absorbs every failure into its sentinel reply
    const POLICY: FailurePolicy = FailurePolicy::FailSoft;

    fn schema() -> &'static FormSchema {
        &SCHEMA
    }

    fn build_request(form: &FormState) -> Result<IrrigationInputs, ValidationError> {
        Ok(IrrigationInputs {
            crop_type: form.text("cropType")?,
            soil_type: form.text("soilType")?,
            region: form.text(REGION_FIELD)?,
            growth_stage: form.text("growthStage")?,
            soil_moisture: form.number("soilMoisture")?,
            last_irrigation_date: form.date("lastIrrigationDate")?,
        })
    }

    async fn send(services: &Services, request: IrrigationInputs) -> Result<IrrigationAdvice, BackendError> {
        Ok(services.advice.get_advice(&request).await)
    }

    fn is_fallback(advice: &IrrigationAdvice) -> bool {
        *advice == IrrigationAdvice::unparsed()
    }

    fn present(advice: IrrigationAdvice) -> PredictionResult {
        let unusable = advice == IrrigationAdvice::unparsed();
        PredictionResult {
            confidence: advice.confidence.trim().trim_end_matches('%').parse::<f64>().ok(),
            explanation: Some(advice.reasoning),
            sections: vec![
                DetailSection::new("Next irrigation", vec![advice.next_date]),
                DetailSection::new("Confidence", vec![advice.confidence]),
            ],
            label: advice.water_quantity,
            image: None,
            disclaimer: unusable.then(|| "The advice service did not return a usable answer. Try again later.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::controller::{ControllerError, FormController};
    use crate::form::FieldValue;
    use chrono::NaiveDate;
    use reqwest::Client;
    use std::sync::Arc;

    fn filled() -> Vec<(String, FieldValue)> {
        vec![
            ("cropType".to_string(), FieldValue::Text("Wheat".into())),
            ("soilType".to_string(), FieldValue::Text("Loamy".into())),
            ("lastIrrigationDate".to_string(), FieldValue::Text("2024-06-01".into())),
        ]
    }

    #[test]
    fn date_text_is_parsed_into_the_inputs() {
        let mut form = SCHEMA.defaults();
        SCHEMA.apply_all(&mut form, filled()).unwrap();
        SCHEMA.validate(&form).unwrap();

        let inputs = IrrigationAdvisory::build_request(&form).unwrap();
        assert_eq!(inputs.region, "Noida");
        assert_eq!(inputs.growth_stage, "Vegetative");
        assert_eq!(inputs.soil_moisture, 40.0);
        assert_eq!(inputs.last_irrigation_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn malformed_date_is_rejected_on_entry() {
        let mut form = SCHEMA.defaults();
        let err = SCHEMA
            .apply(&mut form, "lastIrrigationDate", FieldValue::Text("01/06/2024".into()))
            .unwrap_err();
        assert!(matches!(err, ValidationError::WrongKind { .. }));
    }

    #[test]
    fn parsed_advice_is_presented_without_a_disclaimer() {
        let result = IrrigationAdvisory::present(IrrigationAdvice {
            water_quantity: "25 mm".into(),
            next_date: "2024-06-05".into(),
            confidence: "85%".into(),
            reasoning: "Soil is drying out.".into(),
        });
        assert_eq!(result.label, "25 mm");
        assert_eq!(result.confidence, Some(85.0));
        assert!(result.disclaimer.is_none());
    }

    #[tokio::test]
    async fn unreachable_model_still_resolves_with_the_flagged_sentinel() {
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        let controller = FormController::<IrrigationAdvisory>::new();
        controller.update(filled()).await.unwrap();

        let resolution = controller.submit(&services).await.unwrap();
        assert_eq!(resolution.result.label, "N/A");
        assert!(resolution.placeholder);
        assert!(resolution.result.disclaimer.is_some());
        assert_eq!(resolution.result.confidence, None);

        // The stand-in answer is not a prediction: kept out of history, flagged in the report
        assert!(controller.view().await.history.is_empty());
        assert!(controller.report().await.unwrap().placeholder);
    }

    #[tokio::test]
    async fn missing_date_blocks_submission() {
        let services = Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")));
        let controller = FormController::<IrrigationAdvisory>::new();
        controller.update(filled().into_iter().take(2)).await.unwrap();

        assert!(matches!(
            controller.submit(&services).await,
            Err(ControllerError::Invalid(ValidationError::Missing { field })) if field == "lastIrrigationDate"
        ));
    }
}
