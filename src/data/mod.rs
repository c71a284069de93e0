//! # Data
//!
//! Host-side batches and the sources that produce them.
//!
//! | Item | Role |
//! |------|------|
//! | [`Batch`] | Input, target and optional answer candidates of one step |
//! | [`BatchSource`] | Restartable batch stream, `Ok(None)` ends an epoch |
//! | [`VecBatchSource`] | Replays an in-memory list |
//! | [`SinusoidSource`] | Synthetic noisy sinusoid regression |
//! | [`answer_distribution`] | One-hot answer targets over candidate ids |
//!
//! Token ids index the network's embedding table; [`OOV_ID`] is reserved for
//! out-of-vocabulary words.

pub mod answer;
pub mod batch;
pub mod sinusoid;
pub mod source;

pub use answer::{answer_distribution, AnswerTargets};
pub use batch::{Batch, BatchInput, BatchTarget, OOV_ID};
pub use sinusoid::{SinusoidConfig, SinusoidSource};
pub use source::{BatchSource, VecBatchSource};
