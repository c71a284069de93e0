//! # Training
//!
//! [`Trainer`] owns the network parameters for their whole lifecycle:
//!
//! | Phase | Reached by | Allows |
//! |-------|------------|--------|
//! | `Uninitialized` | [`Trainer::new`] | `initialize` |
//! | `Ready` | `initialize(Init::Fresh / Init::Resume)`, `train` | `train`, `predict`, `save` |
//! | `Saved` | `save` | everything `Ready` allows |
//!
//! Progress goes to a [`TrainingObserver`]; [`TracingObserver`] forwards it
//! to `tracing`. Checkpoints are handled by [`CheckpointStore`].

pub mod checkpoint;
pub mod metrics;
pub mod observer;
pub mod trainer;

pub use checkpoint::CheckpointStore;
pub use metrics::{argmax_matches, ValidationReport};
pub use observer::{TracingObserver, TrainingObserver};
pub use trainer::{DivergencePolicy, Init, Trainer, TrainerPhase, TrainingConfig, TrainingReport};
