// Form state shared by every advisory page.
// A FormSchema declares the fields of one form; a FormState holds what the user has entered so far.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("{field} is required")]
    Missing { field: String },
    #[error("{field} must be a number, got '{raw}'")]
    NotANumber { field: String, raw: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: String, value: f64, min: f64, max: f64 },
    #[error("'{value}' is not a valid choice for {field}")]
    UnknownChoice { field: String, value: String },
    #[error("{field} expects {expected}")]
    WrongKind { field: String, expected: &'static str },
}

/// An uploaded file held in a form until submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: bytes.len(),
            bytes,
        }
    }
}

// Incoming JSON only ever produces Number, Text, List or Empty.
// The schema turns Text into Choice/Date according to the field kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    #[serde(skip_deserializing)]
    Choice(String),
    #[serde(skip_deserializing)]
    Date(NaiveDate),
    List(Vec<String>),
    #[serde(skip_deserializing)]
    Image(ImageUpload),
    Empty,
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) | FieldValue::Choice(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Image(upload) => upload.bytes.is_empty(),
            FieldValue::Number(_) | FieldValue::Date(_) => false,
        }
    }

    /// How the value reads back in an input control.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) | FieldValue::Choice(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::Image(upload) => upload.file_name.clone(),
            FieldValue::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    // Slider-backed: always has a value inside its bounds
    Slider { min: f64, max: f64, default: f64 },
    // Free-text numeric input, coerced at submission time
    Number { min: f64, max: f64, default: Option<f64> },
    Select { options: &'static [&'static str], default: Option<&'static str> },
    MultiSelect { options: &'static [&'static str] },
    Text { default: &'static str },
    Date,
    Image,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    fn default_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Slider { default, .. } => FieldValue::Number(default),
            FieldKind::Number { default, .. } => default.map_or(FieldValue::Empty, FieldValue::Number),
            FieldKind::Select { default, .. } => {
                default.map_or(FieldValue::Empty, |d| FieldValue::Choice(d.to_string()))
            }
            FieldKind::MultiSelect { .. } => FieldValue::List(Vec::new()),
            FieldKind::Text { default } if !default.is_empty() => FieldValue::Text(default.to_string()),
            FieldKind::Text { .. } | FieldKind::Date | FieldKind::Image => FieldValue::Empty,
        }
    }

    // Normalizes a raw value to the representation this field stores. Range and choice
    // membership are left to `FormSchema::validate`, which runs before every submission.
    fn accept(&self, value: FieldValue) -> Result<FieldValue, ValidationError> {
        if matches!(value, FieldValue::Empty) {
            return Ok(FieldValue::Empty);
        }
        let wrong = |expected| ValidationError::WrongKind { field: self.name.to_string(), expected };
        match (self.kind, value) {
            (FieldKind::Slider { .. } | FieldKind::Number { .. }, v @ (FieldValue::Number(_) | FieldValue::Text(_))) => Ok(v),
            (FieldKind::Slider { .. } | FieldKind::Number { .. }, _) => Err(wrong("a number")),
            (FieldKind::Select { .. }, FieldValue::Text(s) | FieldValue::Choice(s)) => Ok(FieldValue::Choice(s)),
            (FieldKind::Select { .. }, _) => Err(wrong("one of the listed options")),
            (FieldKind::MultiSelect { .. }, v @ FieldValue::List(_)) => Ok(v),
            (FieldKind::MultiSelect { .. }, _) => Err(wrong("a list of options")),
            (FieldKind::Text { .. }, v @ FieldValue::Text(_)) => Ok(v),
            (FieldKind::Text { .. }, FieldValue::Number(n)) => Ok(FieldValue::Text(n.to_string())),
            (FieldKind::Text { .. }, _) => Err(wrong("text")),
            (FieldKind::Date, v @ FieldValue::Date(_)) => Ok(v),
            (FieldKind::Date, FieldValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| wrong("a date in YYYY-MM-DD form")),
            (FieldKind::Date, _) => Err(wrong("a date in YYYY-MM-DD form")),
            (FieldKind::Image, v @ FieldValue::Image(_)) => Ok(v),
            (FieldKind::Image, _) => Err(wrong("an uploaded image")),
        }
    }

    fn check(&self, value: Option<&FieldValue>) -> Result<(), ValidationError> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ if self.required => return Err(ValidationError::Missing { field: self.name.to_string() }),
            _ => return Ok(()),
        };
        match self.kind {
            FieldKind::Slider { min, max, .. } | FieldKind::Number { min, max, .. } => {
                if let Some(n) = coerce_number(self.name, value)? {
                    if n < min || n > max {
                        return Err(ValidationError::OutOfRange { field: self.name.to_string(), value: n, min, max });
                    }
                }
                Ok(())
            }
            FieldKind::Select { options, .. } => match value {
                FieldValue::Choice(choice) if options.contains(&choice.as_str()) => Ok(()),
                FieldValue::Choice(choice) => Err(ValidationError::UnknownChoice {
                    field: self.name.to_string(),
                    value: choice.clone(),
                }),
                _ => Err(ValidationError::WrongKind { field: self.name.to_string(), expected: "one of the listed options" }),
            },
            FieldKind::MultiSelect { options } => match value {
                FieldValue::List(items) => match items.iter().find(|item| !options.contains(&item.as_str())) {
                    Some(bad) => Err(ValidationError::UnknownChoice { field: self.name.to_string(), value: bad.clone() }),
                    None => Ok(()),
                },
                _ => Err(ValidationError::WrongKind { field: self.name.to_string(), expected: "a list of options" }),
            },
            FieldKind::Text { .. } | FieldKind::Date | FieldKind::Image => Ok(()),
        }
    }
}

// String → f64 coercion used for every numeric field ("25.5" becomes 25.5).
fn coerce_number(field: &str, value: &FieldValue) -> Result<Option<f64>, ValidationError> {
    let not_a_number = |raw: String| ValidationError::NotANumber { field: field.to_string(), raw };
    match value {
        FieldValue::Empty => Ok(None),
        FieldValue::Number(n) if n.is_finite() => Ok(Some(*n)),
        FieldValue::Number(n) => Err(not_a_number(n.to_string())),
        FieldValue::Text(s) if s.trim().is_empty() => Ok(None),
        FieldValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(not_a_number(s.clone())),
        },
        _ => Err(ValidationError::WrongKind { field: field.to_string(), expected: "a number" }),
    }
}

#[derive(Debug)]
pub struct FormSchema {
    pub fields: &'static [FieldSpec],
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn defaults(&self) -> FormState {
        FormState(
            self.fields
                .iter()
                .map(|f| (f.name.to_string(), f.default_value()))
                .collect(),
        )
    }

    /// Sets one field, normalizing the value to the field's kind.
    pub fn apply(&self, state: &mut FormState, name: &str, value: FieldValue) -> Result<(), ValidationError> {
        let spec = self
            .field(name)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
        let value = spec.accept(value)?;
        state.0.insert(name.to_string(), value);
        Ok(())
    }

    /// Applies a batch of updates; either all of them land or none do.
    pub fn apply_all(
        &self,
        state: &mut FormState,
        updates: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Result<(), ValidationError> {
        let mut staged = state.clone();
        for (name, value) in updates {
            self.apply(&mut staged, &name, value)?;
        }
        *state = staged;
        Ok(())
    }

    /// Required fields present, numbers finite and in bounds, choices from the declared options.
    pub fn validate(&self, state: &FormState) -> Result<(), ValidationError> {
        if let Some(unknown) = state.0.keys().find(|k| self.field(k).is_none()) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }
        self.fields.iter().try_for_each(|spec| spec.check(state.get(spec.name)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormState(BTreeMap<String, FieldValue>);

impl FormState {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    // --- Typed accessors used when building a request from an already validated form ---

    pub fn number(&self, name: &str) -> Result<f64, ValidationError> {
        let value = self.get(name).unwrap_or(&FieldValue::Empty);
        coerce_number(name, value)?.ok_or_else(|| ValidationError::Missing { field: name.to_string() })
    }

    pub fn text(&self, name: &str) -> Result<String, ValidationError> {
        match self.get(name) {
            Some(FieldValue::Text(s) | FieldValue::Choice(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(FieldValue::Number(n)) => Ok(n.to_string()),
            _ => Err(ValidationError::Missing { field: name.to_string() }),
        }
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(FieldValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate, ValidationError> {
        match self.get(name) {
            Some(FieldValue::Date(d)) => Ok(*d),
            _ => Err(ValidationError::Missing { field: name.to_string() }),
        }
    }

    pub fn image(&self, name: &str) -> Result<&ImageUpload, ValidationError> {
        match self.get(name) {
            Some(FieldValue::Image(upload)) if !upload.bytes.is_empty() => Ok(upload),
            _ => Err(ValidationError::Missing { field: name.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: FormSchema = FormSchema {
        fields: &[
            FieldSpec { name: "ph", label: "Soil pH", kind: FieldKind::Slider { min: 0.0, max: 14.0, default: 6.5 }, required: true },
            FieldSpec { name: "rainfall", label: "Rainfall", kind: FieldKind::Number { min: 0.0, max: 300.0, default: None }, required: true },
            FieldSpec { name: "soil", label: "Soil", kind: FieldKind::Select { options: &["Loamy", "Sandy"], default: Some("Loamy") }, required: true },
            FieldSpec { name: "history", label: "History", kind: FieldKind::MultiSelect { options: &["Aphids", "Rust"] }, required: false },
            FieldSpec { name: "sown", label: "Sown on", kind: FieldKind::Date, required: false },
        ],
    };

    #[test]
    fn defaults_follow_the_schema() {
        let state = SAMPLE.defaults();
        assert_eq!(state.get("ph"), Some(&FieldValue::Number(6.5)));
        assert_eq!(state.get("rainfall"), Some(&FieldValue::Empty));
        assert_eq!(state.get("soil"), Some(&FieldValue::Choice("Loamy".into())));
        assert_eq!(state.get("history"), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn text_input_is_coerced_to_float() {
        let mut state = SAMPLE.defaults();
        SAMPLE.apply(&mut state, "rainfall", FieldValue::Text(" 25.5 ".into())).unwrap();
        SAMPLE.validate(&state).unwrap();
        assert_eq!(state.number("rainfall").unwrap(), 25.5);
    }

    #[test]
    fn missing_required_number_blocks_validation() {
        let state = SAMPLE.defaults();
        assert_eq!(
            SAMPLE.validate(&state),
            Err(ValidationError::Missing { field: "rainfall".into() })
        );
    }

    #[test]
    fn out_of_range_and_non_finite_values_are_rejected() {
        let mut state = SAMPLE.defaults();
        SAMPLE.apply(&mut state, "rainfall", FieldValue::Number(120.0)).unwrap();
        SAMPLE.apply(&mut state, "ph", FieldValue::Number(15.0)).unwrap();
        assert!(matches!(SAMPLE.validate(&state), Err(ValidationError::OutOfRange { .. })));

        SAMPLE.apply(&mut state, "ph", FieldValue::Text("NaN".into())).unwrap();
        assert!(matches!(SAMPLE.validate(&state), Err(ValidationError::NotANumber { .. })));
    }

    #[test]
    fn choices_and_multi_choices_must_come_from_the_options() {
        let mut state = SAMPLE.defaults();
        SAMPLE.apply(&mut state, "rainfall", FieldValue::Number(10.0)).unwrap();
        SAMPLE.apply(&mut state, "soil", FieldValue::Text("Peaty".into())).unwrap();
        assert!(matches!(SAMPLE.validate(&state), Err(ValidationError::UnknownChoice { .. })));

        SAMPLE.apply(&mut state, "soil", FieldValue::Text("Sandy".into())).unwrap();
        SAMPLE.apply(&mut state, "history", FieldValue::List(vec!["Rust".into(), "Locusts".into()])).unwrap();
        assert_eq!(
            SAMPLE.validate(&state),
            Err(ValidationError::UnknownChoice { field: "history".into(), value: "Locusts".into() })
        );
    }

    #[test]
    fn dates_parse_from_iso_text() {
        let mut state = SAMPLE.defaults();
        SAMPLE.apply(&mut state, "sown", FieldValue::Text("2024-06-01".into())).unwrap();
        assert_eq!(state.date("sown").unwrap(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(SAMPLE.apply(&mut state, "sown", FieldValue::Text("June 1st".into())).is_err());
    }

    #[test]
    fn batch_updates_are_all_or_nothing() {
        let mut state = SAMPLE.defaults();
        let before = state.clone();
        let result = SAMPLE.apply_all(
            &mut state,
            vec![
                ("ph".to_string(), FieldValue::Number(7.0)),
                ("nonexistent".to_string(), FieldValue::Number(1.0)),
            ],
        );
        assert_eq!(result, Err(ValidationError::UnknownField("nonexistent".into())));
        assert_eq!(state, before);
    }

    #[test]
    fn json_patch_values_deserialize_into_field_values() {
        let patch: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"ph": 6.8, "rainfall": "99", "history": ["Aphids"], "sown": null}"#).unwrap();
        assert_eq!(patch["ph"], FieldValue::Number(6.8));
        assert_eq!(patch["rainfall"], FieldValue::Text("99".into()));
        assert_eq!(patch["history"], FieldValue::List(vec!["Aphids".into()]));
        assert_eq!(patch["sown"], FieldValue::Empty);
    }
}
