//! # Hierarchical Multiscale Cells
//!
//! Single-timestep building blocks. The sequence layer in [`crate::rnn`]
//! drives them across time; use them directly when you need custom state
//! handling.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HierarchicalCell`] | One HM-LSTM layer: COPY / UPDATE / FLUSH transition |
//! | [`LayerStack`] | `L` cells wired bottom-up for one timestep |
//! | [`LayerState`] | `(cell, hidden, boundary)` of one layer |
//!
//! ## Transition Modes
//!
//! Each layer picks one of three transitions from its own previous boundary
//! `z` and the boundary `z_below` just produced by the layer underneath:
//!
//! ```text
//! z = 1                 FLUSH   c' = i ⊙ g             h' = o ⊙ tanh(c')
//! z = 0, z_below = 1    UPDATE  c' = f ⊙ c + i ⊙ g     h' = o ⊙ tanh(c')
//! z = 0, z_below = 0    COPY    c' = c                 h' = h
//! ```
//!
//! COPY is what lets upper layers tick slower than lower ones: until the
//! layer below reports a boundary, nothing reaches them.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input_below` | `[batch, input_size]` |
//! | `summary_above` | `[batch, above_size]` |
//! | `cell`, `hidden` | `[batch, hidden_size]` |
//! | `boundary` | `[batch, 1]` |
//!
//! ## Example
//!
//! ```ignore
//! use hmlstm::cells::{LayerStack, LayerState};
//!
//! let stack = LayerStack::<Backend>::new(16, &[32, 32], 0, &device)?;
//! let states = stack.zero_states(batch, &device);
//! let step = stack.forward(input_t, &states);
//! // step.states: new (c, h, z) per layer, step.hidden: new h per layer
//! ```

pub mod boundary;
pub mod hmlstm_cell;
pub mod layer_stack;
pub mod state;

pub use boundary::{boundary_probability, hard_decision, straight_through};
pub use hmlstm_cell::HierarchicalCell;
pub use layer_stack::{LayerStack, StackStep};
pub use state::LayerState;
