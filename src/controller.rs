// The submit/reset state machine behind every advisory page.
//
// One controller per feature per session. A controller owns its form, allows at most one
// outstanding submission, and ends every submission in exactly one result or one error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinError;

use crate::advice::AdviceClient;
use crate::backend::{BackendClient, BackendError};
use crate::config::Settings;
use crate::form::{FieldValue, FormSchema, FormState, ValidationError};
use crate::models::PredictionResult;
use crate::weather::WeatherClient;

/// Outbound collaborators an advisory may call.
#[derive(Clone)]
pub struct Services {
    pub backend: BackendClient,
    pub weather: WeatherClient,
    pub advice: AdviceClient,
}

impl Services {
    pub fn new(http: Arc<Client>, settings: Arc<Settings>) -> Self {
        Self {
            backend: BackendClient::new(http.clone(), settings.backend_base_url.clone()),
            weather: WeatherClient::new(http.clone(), settings.clone()),
            advice: AdviceClient::new(http, settings),
        }
    }
}

/// What a feature does when its collaborator fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Show the error and blank any prior result.
    FailVisible,
    /// Show a locally fabricated, clearly flagged result instead.
    FailSoft,
}

#[async_trait]
pub trait Advisory: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    const SLUG: &'static str;
    const TITLE: &'static str;
    const POLICY: FailurePolicy;

    fn schema() -> &'static FormSchema;

    /// Applies the feature's field renames and coercions to an already validated form.
    fn build_request(form: &FormState) -> Result<Self::Request, ValidationError>;

    /// Issues the single outbound call for one submission.
    async fn send(services: &Services, request: Self::Request) -> Result<Self::Response, BackendError>;

    fn present(response: Self::Response) -> PredictionResult;

    /// True when a successful reply is the collaborator's own stand-in answer rather than a
    /// real recommendation. Such results are flagged and kept out of history.
    fn is_fallback(_response: &Self::Response) -> bool {
        false
    }

    /// Fabricated result for fail-soft features; always carries a disclaimer.
    fn placeholder(_form: &FormState) -> Option<PredictionResult> {
        None
    }

    fn failure_message(error: &BackendError) -> String {
        format!("{} failed: {}", Self::TITLE, error)
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a submission is already in progress")]
    Busy,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{message}")]
    Upstream { message: String, source: BackendError },
    #[error("the form was reset while the request was in flight")]
    Superseded,
    #[error("there is no result to report yet")]
    NoResult,
    #[error("the submission task stopped unexpectedly")]
    Task(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Phase {
    Collecting,
    Submitting,
    Resolved { result: PredictionResult, placeholder: bool },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub result: PredictionResult,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub submitted_at: DateTime<Utc>,
    pub result: PredictionResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerView {
    pub feature: &'static str,
    pub title: &'static str,
    pub policy: FailurePolicy,
    pub form: FormState,
    pub phase: Phase,
    pub history: Vec<HistoryEntry>,
}

/// Downloadable record of the current result and the inputs that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub feature: &'static str,
    pub input_data: FormState,
    pub result: PredictionResult,
    pub placeholder: bool,
}

// Oldest entries are dropped past this
const HISTORY_LIMIT: usize = 50;

struct ControllerState {
    form: FormState,
    phase: Phase,
    // Bumped by every submit and reset; a response only lands if its generation is current
    generation: u64,
    submitted_form: Option<FormState>,
    history: Vec<HistoryEntry>,
}

pub struct FormController<A: Advisory> {
    state: Arc<Mutex<ControllerState>>,
    _advisory: PhantomData<fn() -> A>,
}

impl<A: Advisory> Default for FormController<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Advisory> FormController<A> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                form: A::schema().defaults(),
                phase: Phase::Collecting,
                generation: 0,
                submitted_form: None,
                history: Vec::new(),
            })),
            _advisory: PhantomData,
        }
    }

    pub async fn view(&self) -> ControllerView {
        let state = self.state.lock().await;
        Self::snapshot(&state)
    }

    fn snapshot(state: &ControllerState) -> ControllerView {
        ControllerView {
            feature: A::SLUG,
            title: A::TITLE,
            policy: A::POLICY,
            form: state.form.clone(),
            phase: state.phase.clone(),
            history: state.history.clone(),
        }
    }

    /// Edits fields. Rejected while a submission is outstanding (the form is frozen).
    pub async fn update(
        &self,
        updates: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Result<ControllerView, ControllerError> {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Submitting {
            return Err(ControllerError::Busy);
        }
        A::schema().apply_all(&mut state.form, updates)?;
        Ok(Self::snapshot(&state))
    }

    /// Validates the form and sends exactly one request. A second call while one is
    /// outstanding is rejected with [`ControllerError::Busy`].
    pub async fn submit(&self, services: &Services) -> Result<Resolution, ControllerError> {
        let (request, form, generation) = {
            let mut state = self.state.lock().await;
            if state.phase == Phase::Submitting {
                return Err(ControllerError::Busy);
            }
            A::schema().validate(&state.form)?;
            let request = A::build_request(&state.form)?;
            state.phase = Phase::Submitting;
            state.generation += 1;
            (request, state.form.clone(), state.generation)
        };

        tracing::info!(feature = A::SLUG, "Submitting advisory form");
        // The call runs on its own task: a caller that goes away neither cancels the request
        // nor leaves the form stuck in Submitting. The lock is not held across the network call.
        let state = Arc::clone(&self.state);
        let services = services.clone();
        let task = tokio::spawn(async move {
            let outcome = A::send(&services, request).await;
            Self::settle(&state, generation, form, outcome).await
        });

        match task.await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::error!(feature = A::SLUG, "Submission task failed: {}", e);
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.phase = Phase::Failed { message: format!("{} failed unexpectedly.", A::TITLE) };
                    state.submitted_form = None;
                }
                Err(ControllerError::Task(e))
            }
        }
    }

    // Writes the outcome back, unless a reset or newer submission has moved the form on
    async fn settle(
        state: &Mutex<ControllerState>,
        generation: u64,
        form: FormState,
        outcome: Result<A::Response, BackendError>,
    ) -> Result<Resolution, ControllerError> {
        let mut state = state.lock().await;
        if state.generation != generation {
            tracing::debug!(feature = A::SLUG, "Dropping response for a form that was reset");
            return Err(ControllerError::Superseded);
        }

        match outcome {
            Ok(response) => {
                let fallback = A::is_fallback(&response);
                let result = A::present(response);
                if fallback {
                    tracing::warn!(feature = A::SLUG, "Collaborator answered with its fallback; result is flagged");
                } else {
                    tracing::info!(feature = A::SLUG, label = %result.label, "Advisory resolved");
                    state.history.push(HistoryEntry { submitted_at: Utc::now(), result: result.clone() });
                    if state.history.len() > HISTORY_LIMIT {
                        state.history.remove(0);
                    }
                }
                state.phase = Phase::Resolved { result: result.clone(), placeholder: fallback };
                state.submitted_form = Some(form);
                Ok(Resolution { result, placeholder: fallback })
            }
            Err(error) => match (A::POLICY, A::placeholder(&form)) {
                (FailurePolicy::FailSoft, Some(result)) => {
                    tracing::warn!(feature = A::SLUG, "Backend failed ({}); showing placeholder result", error);
                    state.phase = Phase::Resolved { result: result.clone(), placeholder: true };
                    state.submitted_form = Some(form);
                    Ok(Resolution { result, placeholder: true })
                }
                _ => {
                    tracing::error!(feature = A::SLUG, "Advisory request failed: {}", error);
                    let message = A::failure_message(&error);
                    state.phase = Phase::Failed { message: message.clone() };
                    state.submitted_form = None;
                    Err(ControllerError::Upstream { message, source: error })
                }
            },
        }
    }

    /// Back to the feature's defaults, discarding any result, error or in-flight request.
    pub async fn reset(&self) -> ControllerView {
        let mut state = self.state.lock().await;
        state.form = A::schema().defaults();
        state.phase = Phase::Collecting;
        state.generation += 1;
        state.submitted_form = None;
        Self::snapshot(&state)
    }

    pub async fn report(&self) -> Result<Report, ControllerError> {
        let state = self.state.lock().await;
        match (&state.phase, &state.submitted_form) {
            (Phase::Resolved { result, placeholder }, Some(form)) => Ok(Report {
                timestamp: Utc::now(),
                feature: A::SLUG,
                input_data: form.clone(),
                result: result.clone(),
                placeholder: *placeholder,
            }),
            _ => Err(ControllerError::NoResult),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FieldKind, FieldSpec};
    use once_cell::sync::Lazy;
    use std::time::Duration;
    use tokio::sync::Notify;

    static ECHO_FORM: FormSchema = FormSchema {
        fields: &[FieldSpec {
            name: "level",
            label: "Level",
            kind: FieldKind::Slider { min: 0.0, max: 10.0, default: 5.0 },
            required: true,
        }],
    };

    // One gate per level so concurrently running tests never release each other's requests
    static GATES: Lazy<Vec<Notify>> = Lazy::new(|| (0..=10).map(|_| Notify::new()).collect());

    fn gate(level: f64) -> &'static Notify {
        &GATES[level as usize]
    }

    // Waits on its level's gate, then fails for level 0 and echoes every other level
    struct GatedEcho;

    #[async_trait]
    impl Advisory for GatedEcho {
        type Request = f64;
        type Response = f64;
        const SLUG: &'static str = "gated";
        const TITLE: &'static str = "Gated echo";
        const POLICY: FailurePolicy = FailurePolicy::FailVisible;

        fn schema() -> &'static FormSchema {
            &ECHO_FORM
        }

        fn build_request(form: &FormState) -> Result<f64, ValidationError> {
            form.number("level")
        }

        async fn send(_services: &Services, request: f64) -> Result<f64, BackendError> {
            gate(request).notified().await;
            if request == 0.0 {
                Err(BackendError::Transport("connection refused".into()))
            } else {
                Ok(request)
            }
        }

        fn present(response: f64) -> PredictionResult {
            PredictionResult { label: format!("level {}", response), ..Default::default() }
        }
    }

    fn services() -> Services {
        Services::new(Arc::new(Client::new()), Arc::new(Settings::for_stub("http://127.0.0.1:9")))
    }

    async fn wait_for_phase(controller: &FormController<GatedEcho>, wanted: &Phase) {
        for _ in 0..200 {
            if &controller.view().await.phase == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("controller never reached {wanted:?}");
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_rejected_and_the_form_is_frozen() {
        let controller = Arc::new(FormController::<GatedEcho>::new());
        let services = services();

        let first = {
            let controller = controller.clone();
            let services = services.clone();
            tokio::spawn(async move { controller.submit(&services).await })
        };
        wait_for_phase(&controller, &Phase::Submitting).await;

        assert!(matches!(controller.submit(&services).await, Err(ControllerError::Busy)));
        assert!(matches!(
            controller.update([("level".to_string(), FieldValue::Number(7.0))]).await,
            Err(ControllerError::Busy)
        ));

        gate(5.0).notify_one();
        let resolution = first.await.unwrap().unwrap();
        assert_eq!(resolution.result.label, "level 5");
        assert!(!resolution.placeholder);
        assert_eq!(controller.view().await.history.len(), 1);
    }

    #[tokio::test]
    async fn reset_discards_an_in_flight_submission() {
        let controller = Arc::new(FormController::<GatedEcho>::new());
        controller.update([("level".to_string(), FieldValue::Number(2.0))]).await.unwrap();
        let services = services();

        let pending = {
            let controller = controller.clone();
            let services = services.clone();
            tokio::spawn(async move { controller.submit(&services).await })
        };
        wait_for_phase(&controller, &Phase::Submitting).await;

        let view = controller.reset().await;
        assert_eq!(view.phase, Phase::Collecting);
        assert_eq!(view.form, ECHO_FORM.defaults());

        gate(2.0).notify_one();
        assert!(matches!(pending.await.unwrap(), Err(ControllerError::Superseded)));
        let view = controller.view().await;
        assert_eq!(view.phase, Phase::Collecting);
        assert!(view.history.is_empty());
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_strand_the_submission() {
        let controller = Arc::new(FormController::<GatedEcho>::new());
        controller.update([("level".to_string(), FieldValue::Number(3.0))]).await.unwrap();
        let services = services();

        let caller = {
            let controller = controller.clone();
            let services = services.clone();
            tokio::spawn(async move { controller.submit(&services).await })
        };
        wait_for_phase(&controller, &Phase::Submitting).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        gate(3.0).notify_one();
        let resolved = Phase::Resolved {
            result: PredictionResult { label: "level 3".into(), ..Default::default() },
            placeholder: false,
        };
        wait_for_phase(&controller, &resolved).await;
        assert_eq!(controller.view().await.history.len(), 1);
        assert!(controller.update([("level".to_string(), FieldValue::Number(4.0))]).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_network() {
        let controller = FormController::<GatedEcho>::new();
        controller.update([("level".to_string(), FieldValue::Number(11.0))]).await.unwrap();

        let err = controller.submit(&services()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Invalid(ValidationError::OutOfRange { .. })));
        assert_eq!(controller.view().await.phase, Phase::Collecting);
        assert!(matches!(controller.report().await, Err(ControllerError::NoResult)));
    }

    #[tokio::test]
    async fn fail_visible_blanks_the_result_and_reset_restores_defaults() {
        let controller = Arc::new(FormController::<GatedEcho>::new());
        controller.update([("level".to_string(), FieldValue::Number(0.0))]).await.unwrap();
        let services = services();

        let pending = {
            let controller = controller.clone();
            let services = services.clone();
            tokio::spawn(async move { controller.submit(&services).await })
        };
        wait_for_phase(&controller, &Phase::Submitting).await;
        gate(0.0).notify_one();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ControllerError::Upstream { .. }));
        assert!(matches!(controller.view().await.phase, Phase::Failed { .. }));
        assert!(matches!(controller.report().await, Err(ControllerError::NoResult)));

        let view = controller.reset().await;
        assert_eq!(view.phase, Phase::Collecting);
        assert_eq!(view.form.get("level"), Some(&FieldValue::Number(5.0)));
    }
}
