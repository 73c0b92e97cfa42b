//! Bridge to pickled scikit-learn estimators.
//!
//! The artifact file is used unchanged. Opening it starts one Python worker
//! that unpickles the estimator once and keeps it in memory. Each call sends
//! the ordered record as a JSON line; the worker builds a one-row
//! `pandas.DataFrame` with exactly the record's column names in order and
//! answers with a JSON line.
//!
//! The worker lives on a small runtime owned by the artifact, so the
//! synchronous [`Classifier`] methods can be called from any blocking
//! thread.

use crate::error::MlError;
use crate::runtime::{PythonRuntime, PythonWorker};
use healthpredict_core::{Classifier, FieldValue, InputRecord, PredictionError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

const BRIDGE_SCRIPT: &str = r#"
import json
import sys

def load(path):
    if path.endswith(".joblib"):
        import joblib
        return joblib.load(path)
    import pickle
    with open(path, "rb") as fh:
        return pickle.load(fh)

def reply(obj):
    sys.stdout.write(json.dumps(obj) + "\n")
    sys.stdout.flush()

try:
    model = load(sys.argv[1])
    load_error = None
except Exception as e:
    model = None
    load_error = str(e)

for line in sys.stdin:
    req = json.loads(line)
    if load_error is not None:
        reply({"error": "unreadable", "message": load_error})
        continue
    op = req["op"]
    try:
        if op == "describe":
            missing = [m for m in ("predict", "predict_proba") if not callable(getattr(model, m, None))]
            features = getattr(model, "feature_names_in_", None)
            reply({
                "missing": missing,
                "features": None if features is None else [str(f) for f in features],
            })
        else:
            import pandas as pd
            frame = pd.DataFrame([req["values"]], columns=req["columns"])
            if op == "predict":
                reply({"label": int(model.predict(frame)[0])})
            else:
                reply({"proba": [float(p) for p in model.predict_proba(frame)[0]]})
    except Exception as e:
        reply({"error": "invocation", "message": str(e)})
"#;

#[derive(Serialize)]
struct BridgeRequest {
    op: &'static str,
    columns: Vec<&'static str>,
    values: Vec<FieldValue>,
}

/// [`Classifier`] backed by a pickled estimator held by a Python worker.
pub struct PickleArtifact {
    name: String,
    path: PathBuf,
    runtime: PythonRuntime,
    features: Option<Vec<String>>,
    worker: Mutex<PythonWorker>,
    rt: Option<Runtime>,
}

impl std::fmt::Debug for PickleArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickleArtifact")
            .field("name", &self.name)
            .field("features", &self.features)
            .finish()
    }
}

impl PickleArtifact {
    /// Unpickle `path` once and check that it can classify.
    ///
    /// Blocks; call it from a blocking thread, not from async code.
    pub fn open(path: &Path, runtime: PythonRuntime) -> Result<Self, MlError> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("pickle-bridge")
            .enable_all()
            .build()?;
        let mut worker = start_worker(&rt, &runtime, path)?;

        let describe = BridgeRequest {
            op: "describe",
            columns: Vec::new(),
            values: Vec::new(),
        };
        let reply = rt.block_on(worker.request(&serde_json::to_value(describe)?))?;
        bridge_error(&reply)?;

        let missing = reply
            .get("missing")
            .cloned()
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()?
            .unwrap_or_default();
        if !missing.is_empty() {
            worker.shutdown();
            return Err(MlError::model(format!(
                "artifact does not provide {}",
                missing.join(", ")
            )));
        }
        let features = reply
            .get("features")
            .cloned()
            .map(serde_json::from_value::<Option<Vec<String>>>)
            .transpose()?
            .flatten();

        debug!(path = %path.display(), features = ?features, "Opened pickle artifact");
        Ok(Self {
            name: format!("pickle:{}", path.display()),
            path: path.to_path_buf(),
            runtime,
            features,
            worker: Mutex::new(worker),
            rt: Some(rt),
        })
    }

    /// Column names the estimator was fitted on, when it records them.
    pub fn features(&self) -> Option<&[String]> {
        self.features.as_deref()
    }

    fn invoke(&self, op: &'static str, record: &InputRecord) -> Result<serde_json::Value, MlError> {
        let (columns, values): (Vec<_>, Vec<_>) = record.columns().into_iter().unzip();
        let request = serde_json::to_value(BridgeRequest {
            op,
            columns,
            values,
        })?;

        let rt = self
            .rt
            .as_ref()
            .ok_or_else(|| MlError::python("Python worker is no longer running"))?;
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| MlError::python("Python worker lock poisoned"))?;
        if worker.is_broken() {
            warn!(path = %self.path.display(), "Restarting Python worker");
            *worker = start_worker(rt, &self.runtime, &self.path)?;
        }
        let reply = rt.block_on(worker.request(&request))?;
        bridge_error(&reply)?;
        Ok(reply)
    }
}

impl Drop for PickleArtifact {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.lock() {
            worker.shutdown();
        }
        if let Some(rt) = self.rt.take() {
            rt.shutdown_background();
        }
    }
}

fn start_worker(
    rt: &Runtime,
    runtime: &PythonRuntime,
    path: &Path,
) -> Result<PythonWorker, MlError> {
    let path_arg = path.to_string_lossy().into_owned();
    rt.block_on(async { runtime.spawn_worker(BRIDGE_SCRIPT, &[path_arg.as_str()]) })
}

/// Turn an `{"error": ..., "message": ...}` reply into an error.
fn bridge_error(reply: &serde_json::Value) -> Result<(), MlError> {
    let Some(kind) = reply.get("error").and_then(|e| e.as_str()) else {
        return Ok(());
    };
    let message = reply
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Err(match kind {
        "unreadable" => MlError::Model(message),
        _ => MlError::Inference(message),
    })
}

impl Classifier for PickleArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &InputRecord) -> Result<i64, PredictionError> {
        let reply = self.invoke("predict", record)?;
        reply
            .get("label")
            .and_then(|l| l.as_i64())
            .ok_or_else(|| PredictionError::invocation("bridge returned no label"))
    }

    fn score_distribution(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        let reply = self.invoke("predict_proba", record)?;
        let proba = reply
            .get("proba")
            .cloned()
            .ok_or_else(|| PredictionError::invocation("bridge returned no probabilities"))?;
        serde_json::from_value(proba).map_err(|e| PredictionError::invocation(e.to_string()))
    }
}
