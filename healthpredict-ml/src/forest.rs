//! Native tree-ensemble artifact.
//!
//! Trees are stored as flat node arrays in the layout scikit-learn exports:
//! node 0 is the root and children always come after their parent. The class
//! distribution is the mean of the normalized leaf weights over all trees,
//! matching `RandomForestClassifier.predict_proba`.

use crate::columns::{align, category, numeric, unknown_category};
use crate::error::MlError;
use healthpredict_core::{Classifier, InputRecord, PredictionError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Input column of a forest. Categories are ordinal-encoded by their
/// position in `categories`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForestColumn {
    Numeric { name: String },
    Categorical { name: String, categories: Vec<String> },
}

impl ForestColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric { name } | Self::Categorical { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Route to `left` when the feature value is `<= threshold`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class weights, e.g. training sample counts.
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Normalized class distribution of the leaf `features` fall into.
    fn leaf_distribution(&self, features: &[f64]) -> Vec<f64> {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    return value.iter().map(|w| w / total).collect();
                }
            }
        }
    }

    fn validate(&self, tree: usize, n_features: usize, n_classes: usize) -> Result<(), MlError> {
        if self.nodes.is_empty() {
            return Err(MlError::model(format!("tree {tree} has no nodes")));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(MlError::model(format!(
                            "tree {tree} node {index} splits on unknown feature {feature}"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(MlError::model(format!(
                            "tree {tree} node {index} has a NaN threshold"
                        )));
                    }
                    // Forward-only children rule out cycles.
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(MlError::model(format!(
                                "tree {tree} node {index} has invalid child {child}"
                            )));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(MlError::model(format!(
                            "tree {tree} leaf {index} has {} classes, expected {n_classes}",
                            value.len()
                        )));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0)
                        || value.iter().sum::<f64>() <= 0.0
                    {
                        return Err(MlError::model(format!(
                            "tree {tree} leaf {index} has unusable weights"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn default_classes() -> usize {
    2
}

/// Fitted tree ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    #[serde(default = "default_classes")]
    pub n_classes: usize,
    pub columns: Vec<ForestColumn>,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    pub fn validate(&self) -> Result<(), MlError> {
        if self.n_classes < 2 {
            return Err(MlError::model("forest needs at least two classes"));
        }
        if self.columns.is_empty() {
            return Err(MlError::model("forest has no columns"));
        }
        if self.trees.is_empty() {
            return Err(MlError::model("forest has no trees"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(MlError::model(format!(
                    "column '{}' is listed twice",
                    column.name()
                )));
            }
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.columns.len(), self.n_classes)?;
        }
        Ok(())
    }

    fn encode(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        let values = align(self.columns.iter().map(ForestColumn::name), record)?;
        self.columns
            .iter()
            .zip(&values)
            .map(|(column, value)| match column {
                ForestColumn::Numeric { name } => numeric(name, value),
                ForestColumn::Categorical { name, categories } => {
                    let level = category(name, value)?;
                    categories
                        .iter()
                        .position(|c| c == level)
                        .map(|i| i as f64)
                        .ok_or_else(|| unknown_category(name, level))
                }
            })
            .collect()
    }

    /// Mean class distribution over all trees.
    pub fn predict_proba(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        let features = self.encode(record)?;
        let mut sum = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.leaf_distribution(&features)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / n).collect())
    }
}

/// Index of the largest probability; ties go to the lower class.
pub fn argmax(distribution: &[f64]) -> usize {
    let mut best = 0;
    for (i, p) in distribution.iter().enumerate() {
        if *p > distribution[best] {
            best = i;
        }
    }
    best
}

/// [`Classifier`] over a validated [`ForestModel`].
#[derive(Debug)]
pub struct ForestArtifact {
    name: String,
    model: ForestModel,
}

impl ForestArtifact {
    pub fn new(name: impl Into<String>, model: ForestModel) -> Result<Self, MlError> {
        model.validate()?;
        Ok(Self {
            name: name.into(),
            model,
        })
    }

    pub fn model(&self) -> &ForestModel {
        &self.model
    }
}

impl Classifier for ForestArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &InputRecord) -> Result<i64, PredictionError> {
        let distribution = self.model.predict_proba(record)?;
        Ok(argmax(&distribution) as i64)
    }

    fn score_distribution(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        self.model.predict_proba(record)
    }
}
