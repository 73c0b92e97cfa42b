//! Python runtime manager for the pickle bridge.
//!
//! Runs Python as managed `tokio` subprocesses speaking JSON. One-shot
//! scripts get their input on stdin and answer on stdout; a
//! [`PythonWorker`] stays alive and answers one JSON line per request line.

use crate::error::MlError;
use healthpredict_core::PythonConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    timeout: Duration,
}

impl Default for PythonRuntime {
    fn default() -> Self {
        Self::from_config(&PythonConfig::default())
    }
}

impl PythonRuntime {
    /// Create with explicit paths.
    pub fn with_config(
        python_path: PathBuf,
        venv_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            python_path,
            venv_path,
            timeout,
        }
    }

    pub fn from_config(config: &PythonConfig) -> Self {
        Self::with_config(
            config.python_path.clone(),
            config.venv_path.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Get the effective Python command (accounting for venv).
    pub fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a Python script with JSON input/output.
    ///
    /// The script receives input as a JSON string on stdin and should
    /// write its output as JSON to stdout.
    pub async fn run_script(
        &self,
        script: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, MlError> {
        let input_json = serde_json::to_string(input)?;

        debug!(
            script_len = script.len(),
            python = %self.python_cmd().display(),
            "Running Python script"
        );

        let result = tokio::time::timeout(self.timeout, async {
            let mut child = Command::new(self.python_cmd())
                .args(["-c", script])
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| MlError::python(format!("Failed to spawn Python: {e}")))?;

            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| MlError::python("Python stdin is not piped"))?;
            let feed = async move {
                let written = stdin.write_all(input_json.as_bytes()).await;
                drop(stdin);
                written
            };
            // Both pipes drain while the input is written.
            let (written, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(MlError::python(format!(
                    "Python script failed ({}): {}",
                    output.status,
                    stderr.trim()
                )));
            }
            written?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.trim().is_empty() {
                Ok(serde_json::Value::Null)
            } else {
                serde_json::from_str(stdout.trim())
                    .map_err(|e| MlError::python(format!("Invalid JSON output: {e}")))
            }
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(MlError::Timeout(format!(
                "Python script timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Check which packages are importable.
    pub async fn check_packages(&self, packages: &[&str]) -> HashMap<String, bool> {
        const SCRIPT: &str = r#"
import importlib, json, sys
found = {}
for name in json.load(sys.stdin):
    try:
        importlib.import_module(name)
        found[name] = True
    except Exception:
        found[name] = False
print(json.dumps(found))
"#;
        let reply = self
            .run_script(SCRIPT, &serde_json::json!(packages))
            .await
            .ok()
            .and_then(|v| serde_json::from_value::<HashMap<String, bool>>(v).ok())
            .unwrap_or_default();

        packages
            .iter()
            .map(|pkg| (pkg.to_string(), reply.get(*pkg).copied().unwrap_or(false)))
            .collect()
    }

    /// Start a long-lived worker running `script` with `args`.
    ///
    /// Must be called inside a tokio runtime; the worker's pipes stay bound
    /// to that runtime.
    pub fn spawn_worker(&self, script: &str, args: &[&str]) -> Result<PythonWorker, MlError> {
        let mut child = Command::new(self.python_cmd())
            .args(["-c", script])
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MlError::python(format!("Failed to spawn Python: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MlError::python("Python stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MlError::python("Python stdout is not piped"))?;
        if let Some(stderr) = child.stderr.take() {
            let pid = child.id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(?pid, %line, "Python worker stderr");
                }
            });
        }

        debug!(
            pid = ?child.id(),
            python = %self.python_cmd().display(),
            "Started Python worker"
        );
        Ok(PythonWorker {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            timeout: self.timeout,
            broken: false,
        })
    }
}

/// A Python process answering line-delimited JSON requests.
#[derive(Debug)]
pub struct PythonWorker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    timeout: Duration,
    broken: bool,
}

impl PythonWorker {
    /// Send one request and wait for its reply line.
    ///
    /// After a timeout or a broken pipe the worker is killed and every
    /// later request fails.
    pub async fn request(
        &mut self,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, MlError> {
        if self.broken {
            return Err(MlError::python("Python worker is no longer running"));
        }

        let mut line = serde_json::to_string(input)?;
        line.push('\n');
        let exchange = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;
            self.stdout.next_line().await
        };

        let reply = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) => {
                self.shutdown();
                return Err(MlError::python("Python worker exited"));
            }
            Ok(Err(e)) => {
                self.shutdown();
                return Err(MlError::python(format!("Python worker pipe failed: {e}")));
            }
            Err(_) => {
                self.shutdown();
                return Err(MlError::Timeout(format!(
                    "Python worker did not answer within {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        serde_json::from_str(&reply)
            .map_err(|e| MlError::python(format!("Invalid JSON output: {e}")))
    }

    /// Whether the process was killed or stopped answering.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Kill the process. Idempotent.
    pub fn shutdown(&mut self) {
        self.broken = true;
        let _ = self.child.start_kill();
    }
}
