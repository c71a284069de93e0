//! Error taxonomy for network construction, data handling, checkpoints and
//! training.
//!
//! End-of-epoch is not an error: a [`BatchSource`](crate::data::BatchSource)
//! signals it with `Ok(None)`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HmlstmError {
    /// Inconsistent dimensions, unknown task kind or a missing hyperparameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed batch contents (shape disagreement, out-of-range token id).
    #[error("data error: {0}")]
    Data(String),

    /// Answer-scoring fixture whose answer id does not occur among the candidates.
    #[error("answer not found among candidates for batch rows {rows:?}")]
    AnswerNotInCandidates { rows: Vec<usize> },

    #[error("checkpoint error at '{path}': {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("loss diverged to {loss} at epoch {epoch}, step {step}")]
    NumericalDivergence { epoch: usize, step: usize, loss: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HmlstmError> = std::result::Result<T, E>;

impl HmlstmError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        HmlstmError::Configuration(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        HmlstmError::Data(msg.into())
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        HmlstmError::Checkpoint {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
