//! Form server built on axum.

use super::pages::{PageView, Pages};
use crate::artifact::ModelSlot;
use crate::error::{ConfigurationError, ValidationError};
use crate::pipeline::{SubmissionOutcome, submit};
use crate::record::FieldValue;
use crate::schema::DatasetKind;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the axum handlers.
///
/// The model slot sits behind one mutex that is held for the whole
/// load-and-score step, so submissions are processed one at a time.
#[derive(Clone)]
pub struct WebState {
    slot: Arc<Mutex<ModelSlot>>,
    pages: Arc<Pages>,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for WebState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebState")
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl WebState {
    pub fn new(slot: ModelSlot) -> Result<Self, Box<handlebars::TemplateError>> {
        Ok(Self {
            slot: Arc::new(Mutex::new(slot)),
            pages: Arc::new(Pages::new()?),
            started_at: Utc::now(),
        })
    }

    /// Uptime in seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_seconds().max(0) as u64
    }

    /// Select the artifact for `dataset` and, when `values` are given, run
    /// one submission against it. Scoring is blocking, so it runs off the
    /// async executor.
    async fn process(
        &self,
        dataset: DatasetKind,
        values: Option<BTreeMap<String, FieldValue>>,
    ) -> Result<Option<SubmissionOutcome>, ConfigurationError> {
        let slot = Arc::clone(&self.slot);
        let joined = tokio::task::spawn_blocking(
            move || -> Result<Option<SubmissionOutcome>, ConfigurationError> {
                let mut slot = slot.blocking_lock();
                let classifier = slot.select(dataset)?;
                Ok(values.map(|values| submit(dataset, &values, classifier.as_ref())))
            },
        )
        .await;
        match joined {
            Ok(result) => result,
            Err(e) => Err(ConfigurationError::Invalid {
                message: format!("Model worker stopped: {e}"),
            }),
        }
    }

    fn render(&self, status: StatusCode, view: &PageView) -> Response {
        match self.pages.render(view) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                warn!(error = %e, "Failed to render page");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
            }
        }
    }
}

/// Build the axum Router with the form pages and the JSON API.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/predict", post(form_predict_handler))
        .route("/health", get(health_handler))
        .route("/api/datasets", get(datasets_handler))
        .route("/api/schema/{dataset}", get(schema_handler))
        .route("/api/predict/{dataset}", post(api_predict_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DatasetQuery {
    dataset: Option<String>,
}

impl DatasetQuery {
    fn dataset(&self) -> Result<DatasetKind, ValidationError> {
        match &self.dataset {
            Some(value) => value.parse(),
            None => Ok(DatasetKind::default()),
        }
    }
}

fn bad_dataset(e: &ValidationError) -> Response {
    (StatusCode::NOT_FOUND, e.to_string()).into_response()
}

/// Render the form for the selected dataset.
async fn index_handler(
    State(state): State<WebState>,
    Query(query): Query<DatasetQuery>,
) -> Response {
    let dataset = match query.dataset() {
        Ok(dataset) => dataset,
        Err(e) => return bad_dataset(&e),
    };
    let view = PageView::new(dataset);
    match state.process(dataset, None).await {
        Ok(_) => state.render(StatusCode::OK, &view),
        Err(e) => state.render(StatusCode::SERVICE_UNAVAILABLE, &view.halted(&e)),
    }
}

/// Coerce url-encoded form entries into typed values.
fn coerce_entries(
    dataset: DatasetKind,
    entries: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, FieldValue>, ValidationError> {
    let schema = dataset.schema();
    entries
        .iter()
        .map(|(name, raw)| {
            let spec = schema
                .field(name)
                .ok_or_else(|| ValidationError::UnexpectedField {
                    dataset,
                    name: name.clone(),
                })?;
            Ok((name.clone(), spec.coerce(raw)?))
        })
        .collect()
}

/// Handle a form submission and re-render the page with its outcome.
async fn form_predict_handler(
    State(state): State<WebState>,
    Query(query): Query<DatasetQuery>,
    Form(entries): Form<BTreeMap<String, String>>,
) -> Response {
    let dataset = match query.dataset() {
        Ok(dataset) => dataset,
        Err(e) => return bad_dataset(&e),
    };
    let view = PageView::with_entries(dataset, &entries);

    let values = match coerce_entries(dataset, &entries) {
        Ok(values) => values,
        Err(e) => return state.render(StatusCode::OK, &view.warning(e.to_string())),
    };

    match state.process(dataset, Some(values)).await {
        Ok(Some(outcome)) => state.render(StatusCode::OK, &view.outcome(&outcome)),
        Ok(None) => state.render(StatusCode::OK, &view),
        Err(e) => state.render(StatusCode::SERVICE_UNAVAILABLE, &view.halted(&e)),
    }
}

/// Health check endpoint.
async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    let loaded = {
        let slot = state.slot.lock().await;
        slot.current().map(|m| m.dataset.as_str())
    };
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.uptime_secs(),
        "loaded_dataset": loaded,
    }))
}

async fn datasets_handler() -> impl IntoResponse {
    let datasets: Vec<_> = DatasetKind::ALL
        .into_iter()
        .map(|kind| {
            serde_json::json!({
                "id": kind.as_str(),
                "name": kind.display_name(),
            })
        })
        .collect();
    Json(datasets)
}

async fn schema_handler(Path(dataset): Path<String>) -> Response {
    match dataset.parse::<DatasetKind>() {
        Ok(kind) => Json(kind.schema()).into_response(),
        Err(e) => api_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
    }
}

fn api_error(status: StatusCode, tag: &str, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": tag, "message": message })),
    )
        .into_response()
}

/// Score a JSON object of field values.
async fn api_predict_handler(
    State(state): State<WebState>,
    Path(dataset): Path<String>,
    Json(body): Json<BTreeMap<String, serde_json::Value>>,
) -> Response {
    let dataset = match dataset.parse::<DatasetKind>() {
        Ok(kind) => kind,
        Err(e) => return api_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
    };

    let schema = dataset.schema();
    let mut values = BTreeMap::new();
    for (name, raw) in &body {
        let coerced = match schema.field(name) {
            Some(spec) => spec.coerce_json(raw),
            None => Err(ValidationError::UnexpectedField {
                dataset,
                name: name.clone(),
            }),
        };
        match coerced {
            Ok(value) => {
                values.insert(name.clone(), value);
            }
            Err(e) => return api_error(StatusCode::UNPROCESSABLE_ENTITY, "rejected", e.to_string()),
        }
    }

    match state.process(dataset, Some(values)).await {
        Ok(Some(SubmissionOutcome::Succeeded(result))) => {
            let outcome = result.outcome();
            Json(serde_json::json!({
                "status": "succeeded",
                "label": result.label(),
                "message": outcome.message,
                "tone": outcome.tone,
                "confidence": result.confidence(),
            }))
            .into_response()
        }
        Ok(Some(SubmissionOutcome::Rejected { message })) => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "rejected", message)
        }
        Ok(Some(SubmissionOutcome::Failed { message })) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed", message)
        }
        Ok(None) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed",
            "No submission was run".to_string(),
        ),
        Err(e) => api_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", e.to_string()),
    }
}

/// Start the form server on `host:port`.
///
/// This is an async function that runs until cancelled.
pub async fn run(state: WebState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Health prediction form listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
