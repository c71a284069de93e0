//! # HM-LSTM - Hierarchical Multiscale LSTM (Rust)
//!
//! A stack of recurrent layers in which every layer decides, at every
//! timestep, whether a segment has ended. That binary boundary gates what
//! flows between layers and across time, so higher layers learn to update
//! at coarser timescales.
//!
//! ## Features
//!
//! - **HierarchicalCell**: COPY / UPDATE / FLUSH per layer, picked by the
//!   boundary of the layer below and the layer's own previous boundary
//! - **Straight-through boundaries**: exact 0/1 forward values with an
//!   identity gradient through the boundary probability
//! - **Hmlstm**: sequence layer returning final states and a boundary trace
//! - **Heads**: gated embedding plus regression, classification or
//!   answer-scoring outputs
//! - **Training**: Adam training loop with validation, slope annealing,
//!   divergence handling and atomic checkpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use hmlstm::prelude::*;
//!
//! let config = NetworkConfig::new(1, 2, HiddenSizes::Uniform(30), 1, TaskKind::Regression);
//! assert_eq!(config.resolved_hidden_sizes().unwrap(), vec![30, 30]);
//! ```
//!
//! ## Sequence-level Usage
//!
//! ```ignore
//! use hmlstm::rnn::Hmlstm;
//!
//! let rnn = Hmlstm::<Backend>::new(16, &[64, 64], &device)?;
//! let out = rnn.forward(input, None); // input: [T, B, 16]
//! assert!(out.boundaries.is_binary());
//! ```

pub mod cells;
pub mod config;
pub mod data;
pub mod error;
pub mod heads;
pub mod network;
pub mod rnn;
pub mod train;

pub mod prelude {
    pub use crate::cells::{HierarchicalCell, LayerStack, LayerState};
    pub use crate::config::{HiddenSizes, NetworkConfig, TaskKind};
    pub use crate::data::{
        answer_distribution, Batch, BatchInput, BatchSource, BatchTarget, SinusoidConfig,
        SinusoidSource, VecBatchSource, OOV_ID,
    };
    pub use crate::error::{HmlstmError, Result};
    pub use crate::heads::{GateEmbed, OutputHead};
    pub use crate::network::{HmlstmNetwork, Prediction, StepOutput};
    pub use crate::rnn::{BoundaryTrace, Hmlstm};
    pub use crate::train::{
        CheckpointStore, DivergencePolicy, Init, Trainer, TrainingConfig, TrainingObserver,
    };
}
