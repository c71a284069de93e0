//! # Output Heads
//!
//! Feed-forward modules that turn the per-layer hidden states into a task
//! prediction:
//!
//! ```text
//! [h_0; …; h_{L-1}] ──GateEmbed──▶ embedding [B, E] ──OutputHead──▶ (loss, prediction)
//! ```
//!
//! [`OutputHead`] is a single type tagged with a [`TaskKind`](crate::config::TaskKind);
//! every task goes through [`OutputHead::compute_loss_and_prediction`].

pub mod gate_embed;
pub mod output;

pub use gate_embed::GateEmbed;
pub use output::{soft_cross_entropy, squared_error, HeadOutput, OutputHead, OutputMlp};
