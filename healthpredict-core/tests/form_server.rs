//! Integration tests for the form pages and the JSON prediction API.

use axum::body::Body;
use healthpredict_core::web::{WebState, router};
use healthpredict_core::{
    ArtifactLoader, Classifier, ConfigurationError, DatasetKind, InputRecord, ModelSlot,
    ModelsConfig, PredictionError,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

struct Fixed {
    label: i64,
    distribution: Vec<f64>,
    calls: Arc<AtomicUsize>,
}

impl Classifier for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn classify(&self, _record: &InputRecord) -> Result<i64, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.label)
    }

    fn score_distribution(&self, _record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        Ok(self.distribution.clone())
    }
}

/// Diabetes scores positive, hospital readmission negative, and the kidney
/// artifact is missing.
#[derive(Default)]
struct StubLoader {
    loads: AtomicUsize,
    calls: Arc<AtomicUsize>,
}

impl ArtifactLoader for StubLoader {
    fn load(
        &self,
        dataset: DatasetKind,
        path: &Path,
    ) -> Result<Arc<dyn Classifier>, ConfigurationError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let (label, distribution) = match dataset {
            DatasetKind::Diabetes => (1, vec![0.2, 0.8]),
            DatasetKind::HospitalReadmission => (0, vec![0.65, 0.35]),
            DatasetKind::KidneyDisease => {
                return Err(ConfigurationError::ArtifactMissing {
                    dataset,
                    path: path.to_path_buf(),
                });
            }
        };
        Ok(Arc::new(Fixed {
            label,
            distribution,
            calls: Arc::clone(&self.calls),
        }))
    }
}

fn make_app() -> (axum::Router, Arc<StubLoader>) {
    let loader = Arc::new(StubLoader::default());
    let slot = ModelSlot::new(loader.clone(), ModelsConfig::default());
    (router(WebState::new(slot).unwrap()), loader)
}

fn make_request(uri: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn make_json_request(uri: &str, body: serde_json::Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn make_form_request(uri: &str, form: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn send(
    app: axum::Router,
    req: axum::http::Request<Body>,
) -> (axum::http::StatusCode, String) {
    let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn diabetes_json(glucose: f64, bmi: f64) -> serde_json::Value {
    serde_json::json!({
        "Pregnancies": 1,
        "Glucose": glucose,
        "BloodPressure": 72,
        "SkinThickness": 20,
        "Insulin": 80,
        "BMI": bmi,
        "DiabetesPedigreeFunction": 0.45,
        "Age": 40,
    })
}

const DIABETES_FORM: &str = "Pregnancies=1&Glucose=150&BloodPressure=72&SkinThickness=20\
&Insulin=80&BMI=31.5&DiabetesPedigreeFunction=0.45&Age=40";

// --- Pages ---

#[tokio::test]
async fn test_index_renders_selected_dataset() {
    let (app, _) = make_app();
    let (status, html) = send(app, make_request("/?dataset=hospital_readmission")).await;
    assert_eq!(status, 200);
    assert!(html.contains("name=\"n_lab_procedures\""));
    assert!(html.contains("name=\"diag_1\""));
    assert!(html.contains("value=\"250.01\""));
}

#[tokio::test]
async fn test_index_accepts_display_name() {
    let (app, _) = make_app();
    let (status, html) = send(app, make_request("/?dataset=Hospital%20Readmission")).await;
    assert_eq!(status, 200);
    assert!(html.contains("name=\"medical_specialty\""));
}

#[tokio::test]
async fn test_index_unknown_dataset() {
    let (app, _) = make_app();
    let (status, _) = send(app, make_request("/?dataset=heart")).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_form_submission_shows_result() {
    let (app, loader) = make_app();
    let (status, html) = send(
        app,
        make_form_request("/predict?dataset=diabetes", DIABETES_FORM),
    )
    .await;
    assert_eq!(status, 200);
    assert!(html.contains("⚠️ Diabetes Risk Detected"));
    assert!(html.contains("80.00%"));
    assert!(html.contains("Consult a healthcare professional"));
    // Entered values are echoed back into the form.
    assert!(html.contains("value=\"31.5\""));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_form_rejection_shows_warning() {
    let (app, loader) = make_app();
    let form = DIABETES_FORM.replace("Glucose=150", "Glucose=0");
    let (status, html) = send(app, make_form_request("/predict?dataset=diabetes", &form)).await;
    assert_eq!(status, 200);
    assert!(html.contains("Glucose and BMI cannot be 0"));
    assert!(!html.contains("Prediction Result"));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_form_missing_artifact_halts() {
    let (app, _) = make_app();
    let (status, html) = send(
        app,
        make_form_request("/predict?dataset=kidney_disease", "Age=30"),
    )
    .await;
    assert_eq!(status, 503);
    assert!(html.contains("kidney-model.pkl"));
    assert!(!html.contains("Enter Your Details"));
}

// --- JSON API ---

#[tokio::test]
async fn test_api_datasets() {
    let (app, _) = make_app();
    let (status, body) = send(app, make_request("/api/datasets")).await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let ids: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["diabetes", "hospital_readmission", "kidney_disease"]);
}

#[tokio::test]
async fn test_api_schema_lists_fields_in_order() {
    let (app, _) = make_app();
    let (status, body) = send(app, make_request("/api/schema/kidney_disease")).await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let fields = json["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 24);
    assert_eq!(fields[0]["name"], "Age");
    assert_eq!(json["rule"]["rule"], "require_non_zero");
}

#[tokio::test]
async fn test_api_predict_succeeds() {
    let (app, _) = make_app();
    let (status, body) = send(
        app,
        make_json_request("/api/predict/diabetes", diabetes_json(150.0, 31.5)),
    )
    .await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["label"], 1);
    assert_eq!(json["message"], "Diabetes Risk Detected");
    assert_eq!(json["tone"], "warning");
    assert_eq!(json["confidence"], 80.0);
}

#[tokio::test]
async fn test_api_predict_rejects_zero_bmi() {
    let (app, loader) = make_app();
    let (status, body) = send(
        app,
        make_json_request("/api/predict/diabetes", diabetes_json(150.0, 0.0)),
    )
    .await;
    assert_eq!(status, 422);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "rejected");
    assert_eq!(
        json["message"],
        "Please enter valid values (Glucose and BMI cannot be 0)."
    );
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_predict_rejects_unknown_field() {
    let (app, _) = make_app();
    let mut body = diabetes_json(150.0, 31.5);
    body["Cholesterol"] = serde_json::json!(180);
    let (status, _) = send(app, make_json_request("/api/predict/diabetes", body)).await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn test_api_predict_missing_artifact() {
    let (app, _) = make_app();
    let (status, body) = send(
        app,
        make_json_request("/api/predict/kidney_disease", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, 503);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "unavailable");
}

// --- Model slot ---

#[tokio::test]
async fn test_artifact_reloaded_only_on_selection_change() {
    let (app, loader) = make_app();
    for uri in [
        "/?dataset=diabetes",
        "/?dataset=diabetes",
        "/?dataset=hospital_readmission",
        "/?dataset=diabetes",
    ] {
        let (status, _) = send(app.clone(), make_request(uri)).await;
        assert_eq!(status, 200);
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 3);

    let (_, body) = send(app, make_request("/health")).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["loaded_dataset"], "diabetes");
}
