//! Handlebars page rendering for the prediction form.
//!
//! The page is rendered from the schema registry alone. Templates are
//! embedded; every echoed value goes through Handlebars HTML escaping.

use crate::error::ConfigurationError;
use crate::pipeline::SubmissionOutcome;
use crate::predict::Tone;
use crate::schema::{DatasetKind, FieldKind, FieldSpec};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DISCLAIMER: &str = "This is a prediction. Consult a healthcare professional for a diagnosis.";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Health Prediction App</title>
<style>
body { margin: 0; font-family: sans-serif; background-color: #f0f4f8; display: flex; }
.sidebar { width: 280px; min-height: 100vh; padding: 20px; background-color: #ffffff; box-shadow: 2px 0 6px rgba(0, 0, 0, 0.05); }
.main { flex: 1; max-width: 760px; margin: 0 auto; padding: 20px; }
.header { font-size: 34px; color: #00bcd4; text-align: center; margin-bottom: 10px; }
.subheader { font-size: 18px; color: #666; text-align: center; margin-bottom: 30px; }
.columns { display: flex; gap: 24px; }
.column { flex: 1; }
.field { margin-bottom: 14px; }
.field label { display: block; font-weight: bold; margin-bottom: 4px; }
.field input, .field select { width: 100%; padding: 6px; box-sizing: border-box; }
.help { font-size: 12px; color: #666; }
button { background-color: #00bcd4; color: white; border: none; border-radius: 8px; padding: 10px 20px; font-size: 16px; cursor: pointer; }
button:hover { background-color: #008c9e; }
.result-box { background-color: #ffffff; padding: 15px; border-radius: 8px; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1); margin-top: 20px; text-align: center; }
.warning { color: #d32f2f; font-weight: bold; }
.success { color: #388e3c; font-weight: bold; }
.banner { padding: 12px; border-radius: 8px; margin-top: 20px; }
.banner.error { background-color: #fdecea; color: #b71c1c; }
.banner.notice { background-color: #fff8e1; color: #8d6e00; }
.footer { text-align: center; color: #666; margin-top: 30px; }
</style>
</head>
<body>
<aside class="sidebar">
<h2>Health Prediction</h2>
<p>Select a dataset to predict health outcomes.</p>
<form method="get" action="/">
<label for="dataset">Select Prediction Type</label>
<select id="dataset" name="dataset" onchange="this.form.submit()">
{{#each datasets}}<option value="{{value}}"{{#if selected}} selected{{/if}}>{{label}}</option>
{{/each}}</select>
<noscript><button type="submit">Select</button></noscript>
</form>
<hr>
<p><strong>Instructions:</strong></p>
<ul>
<li>Select a dataset.</li>
<li>Enter the required details.</li>
<li>Click 'Predict' to see results.</li>
</ul>
<p><strong>Note</strong>: Predictions are for informational purposes. Consult a doctor for medical advice.</p>
</aside>
<main class="main">
<div class="header">Health Prediction App</div>
<div class="subheader">Assess your health risk with a few clicks</div>
{{#if config_error}}
<div class="banner error">{{config_error}}</div>
{{else}}
<h3>Enter Your Details</h3>
<form method="post" action="/predict?dataset={{dataset}}">
<div class="columns">
<div class="column">
{{#each left}}{{> field}}{{/each}}
</div>
<div class="column">
{{#each right}}{{> field}}{{/each}}
</div>
</div>
<button type="submit">Predict</button>
</form>
{{#if warning}}<div class="banner notice">{{warning}}</div>{{/if}}
{{#if result}}
<div class="result-box">
<h3>Prediction Result</h3>
<p class="{{result.tone}}">{{result.icon}} {{result.message}}</p>
<p><strong>Confidence</strong>: {{result.confidence}}</p>
<p><strong>Disclaimer</strong>: {{disclaimer}}</p>
</div>
{{/if}}
{{#if failure}}<div class="banner error">{{failure}}</div>{{/if}}
{{/if}}
<hr>
<p class="footer">Health Prediction App</p>
</main>
</body>
</html>
"#;

const FIELD_PARTIAL: &str = r#"<div class="field">
<label for="{{name}}">{{label}}</label>
{{#if is_number}}<input type="number" id="{{name}}" name="{{name}}" value="{{value}}" min="{{min}}" max="{{max}}" step="{{step}}" required>{{/if}}
{{#if is_select}}<select id="{{name}}" name="{{name}}">
{{#each options}}<option value="{{value}}"{{#if selected}} selected{{/if}}>{{value}}</option>
{{/each}}</select>{{/if}}
{{#if is_text}}<input type="text" id="{{name}}" name="{{name}}" value="{{value}}" required>{{/if}}
<div class="help">{{help}}</div>
</div>
"#;

#[derive(Debug, Clone, Serialize)]
struct DatasetOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ChoiceOption {
    value: &'static str,
    selected: bool,
}

/// Render model for one input widget.
#[derive(Debug, Clone, Serialize)]
struct FieldView {
    name: &'static str,
    label: &'static str,
    help: &'static str,
    value: String,
    is_number: bool,
    is_select: bool,
    is_text: bool,
    min: String,
    max: String,
    step: String,
    options: Vec<ChoiceOption>,
}

impl FieldView {
    fn new(spec: &FieldSpec, value: String) -> Self {
        let mut view = Self {
            name: spec.name,
            label: spec.label,
            help: spec.help,
            value,
            is_number: false,
            is_select: false,
            is_text: false,
            min: String::new(),
            max: String::new(),
            step: String::new(),
            options: Vec::new(),
        };
        match spec.kind {
            FieldKind::Continuous { min, max, step, .. } => {
                view.is_number = true;
                view.min = min.to_string();
                view.max = max.to_string();
                view.step = step.to_string();
            }
            FieldKind::Integer { min, max, step, .. } => {
                view.is_number = true;
                view.min = min.to_string();
                view.max = max.to_string();
                view.step = step.to_string();
            }
            FieldKind::Categorical { choices } => {
                view.is_select = true;
                view.options = choices
                    .iter()
                    .map(|&choice| ChoiceOption {
                        value: choice,
                        selected: choice == view.value,
                    })
                    .collect();
            }
            FieldKind::Text { .. } => view.is_text = true,
        }
        view
    }
}

#[derive(Debug, Clone, Serialize)]
struct ResultView {
    icon: &'static str,
    message: &'static str,
    tone: Tone,
    confidence: String,
}

/// Everything the page template needs for one render.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    dataset: &'static str,
    datasets: Vec<DatasetOption>,
    left: Vec<FieldView>,
    right: Vec<FieldView>,
    config_error: Option<String>,
    warning: Option<String>,
    result: Option<ResultView>,
    failure: Option<String>,
    disclaimer: &'static str,
}

impl PageView {
    /// Fresh form for `dataset`, every widget at its default.
    pub fn new(dataset: DatasetKind) -> Self {
        Self::with_entries(dataset, &BTreeMap::new())
    }

    /// Form for `dataset` echoing the raw entries the user submitted.
    /// Fields without an entry fall back to their default.
    pub fn with_entries(dataset: DatasetKind, entries: &BTreeMap<String, String>) -> Self {
        let schema = dataset.schema();
        let view = |spec: &FieldSpec| {
            let value = entries
                .get(spec.name)
                .cloned()
                .unwrap_or_else(|| spec.default_value().to_string());
            FieldView::new(spec, value)
        };
        Self {
            dataset: dataset.as_str(),
            datasets: DatasetKind::ALL
                .into_iter()
                .map(|kind| DatasetOption {
                    value: kind.as_str(),
                    label: kind.display_name(),
                    selected: kind == dataset,
                })
                .collect(),
            left: schema.column(1).map(view).collect(),
            right: schema.column(2).map(view).collect(),
            config_error: None,
            warning: None,
            result: None,
            failure: None,
            disclaimer: DISCLAIMER,
        }
    }

    /// Replace the form with an error banner; nothing else is shown.
    pub fn halted(mut self, error: &ConfigurationError) -> Self {
        self.config_error = Some(error.to_string());
        self.left.clear();
        self.right.clear();
        self
    }

    pub fn warning(mut self, message: impl Into<String>) -> Self {
        self.warning = Some(message.into());
        self
    }

    pub fn outcome(mut self, outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Rejected { message } => self.warning = Some(message.clone()),
            SubmissionOutcome::Succeeded(result) => {
                let shown = result.outcome();
                self.result = Some(ResultView {
                    icon: shown.tone.icon(),
                    message: shown.message,
                    tone: shown.tone,
                    confidence: result.confidence_display(),
                });
            }
            SubmissionOutcome::Failed { message } => self.failure = Some(message.clone()),
        }
        self
    }
}

/// Compiled page templates.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}

impl Pages {
    pub fn new() -> Result<Self, Box<TemplateError>> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry
            .register_partial("field", FIELD_PARTIAL)
            .map_err(Box::new)?;
        registry
            .register_template_string("page", PAGE_TEMPLATE)
            .map_err(Box::new)?;
        Ok(Self { registry })
    }

    pub fn render(&self, view: &PageView) -> Result<String, RenderError> {
        self.registry.render("page", view)
    }
}
