//! Network hyperparameters and their validation.
//!
//! [`NetworkConfig`] is a burn [`Config`], so it gets `with_*` builders and
//! JSON `save`/`load` for free. Construction of the network always goes
//! through [`NetworkConfig::validate`]; nothing downstream re-checks widths.

use std::fmt;
use std::str::FromStr;

use burn::config::Config;
use burn::constant;
use serde::{Deserialize, Serialize};

use crate::error::{HmlstmError, Result};

/// Per-layer hidden widths, either one width broadcast to every layer or an
/// explicit list with one entry per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HiddenSizes {
    Uniform(usize),
    PerLayer(Vec<usize>),
}

impl HiddenSizes {
    /// Expand to exactly `num_layers` widths.
    pub fn resolve(&self, num_layers: usize) -> Result<Vec<usize>> {
        match self {
            HiddenSizes::Uniform(size) => Ok(vec![*size; num_layers]),
            HiddenSizes::PerLayer(sizes) if sizes.len() == num_layers => Ok(sizes.clone()),
            HiddenSizes::PerLayer(sizes) => Err(HmlstmError::config(format!(
                "{} hidden sizes given for {} layers",
                sizes.len(),
                num_layers
            ))),
        }
    }
}

impl From<usize> for HiddenSizes {
    fn from(size: usize) -> Self {
        HiddenSizes::Uniform(size)
    }
}

impl From<Vec<usize>> for HiddenSizes {
    fn from(sizes: Vec<usize>) -> Self {
        HiddenSizes::PerLayer(sizes)
    }
}

/// Which output head sits on top of the gated embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Two-layer tanh MLP, squared error loss.
    Regression,
    /// Two-layer tanh MLP, softmax cross entropy against one-/multi-hot targets.
    Classification,
    /// Dot product against candidate embeddings, softmax over candidates.
    AnswerScoring,
}

// Carried inside modules as a plain field, never as a parameter.
constant!(TaskKind);

impl TaskKind {
    /// Whether predictions are scored by argmax agreement with the target.
    pub fn is_categorical(&self) -> bool {
        !matches!(self, TaskKind::Regression)
    }
}

impl FromStr for TaskKind {
    type Err = HmlstmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regression" => Ok(TaskKind::Regression),
            "classification" => Ok(TaskKind::Classification),
            "answer_scoring" | "answer-scoring" | "qa" => Ok(TaskKind::AnswerScoring),
            other => Err(HmlstmError::config(format!("unknown task kind '{other}'"))),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Regression => "regression",
            TaskKind::Classification => "classification",
            TaskKind::AnswerScoring => "answer_scoring",
        };
        f.write_str(name)
    }
}

/// Shape and optimisation hyperparameters of an [`HmlstmNetwork`](crate::network::HmlstmNetwork).
#[derive(Config, Debug)]
pub struct NetworkConfig {
    /// Width of one input timestep (the token embedding width for token input).
    pub input_size: usize,
    pub num_layers: usize,
    pub hidden_sizes: HiddenSizes,
    /// Regression/classification width, or the number of answer candidates.
    pub output_size: usize,
    pub task: TaskKind,
    #[config(default = 100)]
    pub embed_size: usize,
    #[config(default = 100)]
    pub out_hidden_size: usize,
    /// Token table size. Required for answer scoring.
    pub vocab_size: Option<usize>,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Initial slope of the boundary sigmoid.
    #[config(default = 1.0)]
    pub slope: f64,
    /// Width of the all-zero summary fed to the top layer; 0 disables it.
    #[config(default = 0)]
    pub top_summary_size: usize,
}

impl NetworkConfig {
    /// Broadcast/check the hidden sizes against `num_layers`.
    pub fn resolved_hidden_sizes(&self) -> Result<Vec<usize>> {
        self.hidden_sizes.resolve(self.num_layers)
    }

    /// Check every cross-field constraint and return the per-layer widths.
    pub fn validate(&self) -> Result<Vec<usize>> {
        if self.num_layers == 0 {
            return Err(HmlstmError::config("num_layers must be at least 1"));
        }
        let sizes = self.resolved_hidden_sizes()?;
        if let Some(layer) = sizes.iter().position(|&h| h == 0) {
            return Err(HmlstmError::config(format!(
                "hidden size of layer {layer} is zero"
            )));
        }
        for (name, value) in [
            ("input_size", self.input_size),
            ("output_size", self.output_size),
            ("embed_size", self.embed_size),
            ("out_hidden_size", self.out_hidden_size),
        ] {
            if value == 0 {
                return Err(HmlstmError::config(format!("{name} must be positive")));
            }
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(HmlstmError::config(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(self.slope.is_finite() && self.slope > 0.0) {
            return Err(HmlstmError::config(format!(
                "slope must be positive and finite, got {}",
                self.slope
            )));
        }
        match (self.task, self.vocab_size) {
            (TaskKind::AnswerScoring, None) => {
                return Err(HmlstmError::config(
                    "answer scoring needs vocab_size for the shared token embedding",
                ));
            }
            (TaskKind::AnswerScoring, Some(_)) if self.input_size != self.embed_size => {
                return Err(HmlstmError::config(format!(
                    "answer scoring compares token embeddings (width {}) with the \
                     network embedding (width {}); they must match",
                    self.input_size, self.embed_size
                )));
            }
            (_, Some(0)) => return Err(HmlstmError::config("vocab_size must be positive")),
            _ => {}
        }
        Ok(sizes)
    }

    /// Width of the concatenated per-layer hidden states.
    pub fn total_hidden_size(&self) -> Result<usize> {
        Ok(self.resolved_hidden_sizes()?.iter().sum())
    }
}
