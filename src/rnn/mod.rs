//! # Sequence Processing
//!
//! [`Hmlstm`] is the layer most users want: it unrolls a stack of
//! hierarchical cells over a whole sequence and returns the final states
//! together with a [`BoundaryTrace`].
//!
//! ## Tensor Shapes
//!
//! ### Input Tensor (3D)
//!
//! | Format | Shape | Default |
//! |--------|-------|---------|
//! | Sequence-first | `[seq_len, batch, features]` | ✓ Yes |
//! | Batch-first | `[batch, seq_len, features]` | No |
//!
//! Use `.with_batch_first(true)` to switch to batch-first format.
//!
//! ### Output
//!
//! | Field | Contents |
//! |-------|----------|
//! | `final_states` | `(cell, hidden, boundary)` per layer after the last step |
//! | `history` | every step's states, only with `.with_return_sequences(true)` or `unroll(.., true)` |
//! | `boundaries` | `[batch, layers, seq_len]` of exact 0/1 values |
//!
//! ## Example
//!
//! ```ignore
//! use hmlstm::rnn::Hmlstm;
//!
//! let rnn = Hmlstm::<Backend>::new(16, &[64, 64, 64], &device)?;
//! let out = rnn.forward(input, None);           // input: [T, B, 16]
//! let h = out.final_hidden_concat();            // [B, 192]
//! println!("{}", out.boundaries.render(0, 60)); // top layer first
//! ```
//!
//! An empty sequence (`seq_len == 0`) returns the initial states unchanged
//! and an empty trace.

pub mod hmlstm;
pub mod trace;

pub use hmlstm::{Hmlstm, SequenceOutput};
pub use trace::{BoundaryScore, BoundaryTrace};
