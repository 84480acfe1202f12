use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use super::advisory::workspace;
use crate::AppState;
use crate::advisories::irrigation::REGIONS;
use crate::advisories::{
    CropAdvisory, DiseaseAdvisory, FertilizerAdvisory, IrrigationAdvisory, RotationAdvisory, YieldAdvisory,
};
use crate::backend::BackendError;
use crate::controller::{Advisory, ControllerView, HistoryEntry, Phase};
use crate::error::{AppError, AppResult};
use crate::form::{FieldKind, FormSchema};
use crate::models::{DetailSection, PredictionResult, SchemeRecord, WeatherSnapshot};
use crate::schemes::SchemeCursor;
use crate::session::{SessionFeature, Workspace};

fn render<T: Template>(template: &T, name: &str) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render {} template: {}", name, e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

// --- Landing & login ---

struct FeatureLink {
    slug: &'static str,
    title: &'static str,
}

const FEATURES: &[FeatureLink] = &[
    FeatureLink { slug: "crop", title: "Crop Recommendation" },
    FeatureLink { slug: "fertilizer", title: "Fertilizer Recommendation" },
    FeatureLink { slug: "irrigation", title: "Irrigation Advice" },
    FeatureLink { slug: "yield", title: "Yield Prediction" },
    FeatureLink { slug: "disease", title: "Pest & Disease Detection" },
    FeatureLink { slug: "rotation", title: "Crop Rotation Planner" },
];

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    first_visit: bool,
    features: &'static [FeatureLink],
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    firebase_project_id: String,
}

pub async fn landing_page(State(app_state): State<AppState>) -> AppResult<Html<String>> {
    let template = LandingTemplate { first_visit: app_state.launch.is_first_visit(), features: FEATURES };
    render(&template, "landing")
}

pub async fn complete_splash(State(app_state): State<AppState>) -> StatusCode {
    app_state.launch.mark_seen();
    StatusCode::NO_CONTENT
}

pub async fn login_page(State(app_state): State<AppState>) -> AppResult<Html<String>> {
    let template = LoginTemplate {
        firebase_project_id: app_state.settings.firebase_project_id.clone().unwrap_or_default(),
    };
    render(&template, "login")
}

// --- Advisory pages ---

struct ChoiceOption {
    value: &'static str,
    selected: bool,
}

/// One input control, flattened from the field spec and the current form value.
struct FieldWidget {
    name: &'static str,
    label: &'static str,
    control: &'static str,
    min: String,
    max: String,
    value: String,
    options: Vec<ChoiceOption>,
    required: bool,
}

fn widgets(schema: &FormSchema, view: &ControllerView) -> Vec<FieldWidget> {
    schema
        .fields
        .iter()
        .map(|spec| {
            let current = view.form.get(spec.name);
            let value = current.map(|v| v.display()).unwrap_or_default();
            let selected: Vec<String> = view.form.list(spec.name);
            let (control, min, max, options) = match spec.kind {
                FieldKind::Slider { min, max, .. } => ("range", min.to_string(), max.to_string(), Vec::new()),
                FieldKind::Number { min, max, .. } => ("number", min.to_string(), max.to_string(), Vec::new()),
                FieldKind::Select { options, .. } => (
                    "select",
                    String::new(),
                    String::new(),
                    options.iter().map(|o| ChoiceOption { value: *o, selected: value == *o }).collect(),
                ),
                FieldKind::MultiSelect { options } => (
                    "multiselect",
                    String::new(),
                    String::new(),
                    options
                        .iter()
                        .map(|o| ChoiceOption { value: *o, selected: selected.iter().any(|s| s == o) })
                        .collect(),
                ),
                FieldKind::Text { .. } => ("text", String::new(), String::new(), Vec::new()),
                FieldKind::Date => ("date", String::new(), String::new(), Vec::new()),
                FieldKind::Image => ("file", String::new(), String::new(), Vec::new()),
            };
            FieldWidget {
                name: spec.name,
                label: spec.label,
                control,
                min,
                max,
                value,
                options,
                required: spec.required,
            }
        })
        .collect()
}

#[derive(Template)]
#[template(path = "advisory.html")]
struct AdvisoryTemplate {
    session_id: Uuid,
    feature: &'static str,
    title: &'static str,
    fields: Vec<FieldWidget>,
    submitting: bool,
    result: Option<PredictionResult>,
    placeholder: bool,
    error: Option<String>,
    history: Vec<HistoryEntry>,
    // Irrigation only: the weather panel next to the form
    regions: Vec<ChoiceOption>,
    weather: Option<WeatherSnapshot>,
}

async fn advisory_template<A: SessionFeature>(sid: Uuid, ws: &Workspace) -> AdvisoryTemplate {
    let view = A::controller(ws).view().await;
    let fields = widgets(A::schema(), &view);
    let (submitting, result, placeholder, error) = match view.phase.clone() {
        Phase::Collecting => (false, None, false, None),
        Phase::Submitting => (true, None, false, None),
        Phase::Resolved { result, placeholder } => (false, Some(result), placeholder, None),
        Phase::Failed { message } => (false, None, false, Some(message)),
    };
    AdvisoryTemplate {
        session_id: sid,
        feature: A::SLUG,
        title: A::TITLE,
        fields,
        submitting,
        result,
        placeholder,
        error,
        history: view.history,
        regions: Vec::new(),
        weather: None,
    }
}

pub async fn advisory_page(
    State(app_state): State<AppState>,
    Path((sid, feature)): Path<(Uuid, String)>,
) -> AppResult<Html<String>> {
    let ws = workspace(&app_state, sid).await?;
    let template = match feature.as_str() {
        f if f == CropAdvisory::SLUG => advisory_template::<CropAdvisory>(sid, &ws).await,
        f if f == FertilizerAdvisory::SLUG => advisory_template::<FertilizerAdvisory>(sid, &ws).await,
        f if f == YieldAdvisory::SLUG => advisory_template::<YieldAdvisory>(sid, &ws).await,
        f if f == DiseaseAdvisory::SLUG => advisory_template::<DiseaseAdvisory>(sid, &ws).await,
        f if f == RotationAdvisory::SLUG => advisory_template::<RotationAdvisory>(sid, &ws).await,
        f if f == IrrigationAdvisory::SLUG => {
            let mut template = advisory_template::<IrrigationAdvisory>(sid, &ws).await;
            let panel = ws.weather.lock().await;
            template.regions = REGIONS
                .iter()
                .map(|r| ChoiceOption { value: *r, selected: panel.location() == Some(*r) })
                .collect();
            template.weather = panel.snapshot().cloned();
            template
        }
        other => return Err(AppError::NotFound(format!("Unknown feature '{}'", other))),
    };
    render(&template, "advisory")
}

// --- Government schemes ---

#[derive(Deserialize)]
pub struct SchemeFilters {
    search: Option<String>,
    scheme_type: Option<String>,
}

#[derive(Template)]
#[template(path = "schemes.html")]
struct SchemesTemplate {
    schemes: Vec<SchemeRecord>,
    search: String,
    scheme_type: String,
    total: u32,
    has_more: bool,
    next_offset: u32,
    error: Option<String>,
}

pub async fn schemes_page(
    State(app_state): State<AppState>,
    Query(filters): Query<SchemeFilters>,
) -> AppResult<Html<String>> {
    let search = filters.search.unwrap_or_default();
    let scheme_type = filters.scheme_type.unwrap_or_default();
    let mut cursor = SchemeCursor::new(Some(search.clone()), Some(scheme_type.clone()));

    let (schemes, error) = match cursor.next_page(&app_state.services.backend).await {
        Ok(schemes) => (schemes, None),
        Err(e) => {
            tracing::error!("Failed to load schemes: {}", e);
            (Vec::new(), Some("Could not load government schemes right now.".to_string()))
        }
    };
    let template = SchemesTemplate {
        schemes,
        search,
        scheme_type,
        total: cursor.total().unwrap_or(0),
        has_more: !cursor.is_exhausted(),
        next_offset: cursor.offset(),
        error,
    };
    render(&template, "schemes")
}

#[derive(Template)]
#[template(path = "scheme_detail.html")]
struct SchemeDetailTemplate {
    scheme: Option<SchemeRecord>,
    sections: Vec<DetailSection>,
}

pub async fn scheme_detail_page(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    match app_state.services.backend.get_scheme(&id).await {
        Ok(scheme) => {
            let sections = scheme.sections();
            let template = SchemeDetailTemplate { scheme: Some(scheme), sections };
            Ok(render(&template, "scheme_detail")?.into_response())
        }
        Err(BackendError::NotFound) => {
            tracing::info!("Scheme {} not found", id);
            let template = SchemeDetailTemplate { scheme: None, sections: Vec::new() };
            Ok((StatusCode::NOT_FOUND, render(&template, "scheme_detail")?).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
