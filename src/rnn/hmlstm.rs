//! Hierarchical Multiscale LSTM sequence layer
//!
//! Unrolls a [`LayerStack`] over the time axis, carrying every layer's
//! `(cell, hidden, boundary)` forward and recording the boundary of every
//! layer at every step.

use crate::cells::{LayerStack, LayerState};
use crate::error::Result;
use crate::rnn::trace::BoundaryTrace;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Everything one unroll produces.
#[derive(Debug, Clone)]
pub struct SequenceOutput<B: Backend> {
    /// State of every layer after the last timestep (the initial state for
    /// an empty sequence).
    pub final_states: Vec<LayerState<B>>,
    /// States of every layer at every timestep, `history[t][l]`. Empty unless
    /// the layer was built with `return_sequences` (or unrolled with
    /// `keep_history`).
    pub history: Vec<Vec<LayerState<B>>>,
    /// Boundary values `[batch, layers, time]`.
    pub boundaries: BoundaryTrace,
}

impl<B: Backend> SequenceOutput<B> {
    /// Final hidden state of every layer, bottom first.
    pub fn final_hidden(&self) -> Vec<Tensor<B, 2>> {
        self.final_states.iter().map(|s| s.hidden.clone()).collect()
    }

    /// Final hidden states concatenated: `[batch, sum(hidden_sizes)]`.
    pub fn final_hidden_concat(&self) -> Tensor<B, 2> {
        Tensor::cat(self.final_hidden(), 1)
    }

    /// Number of timesteps unrolled.
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

/// HM-LSTM RNN layer
///
/// Processes sequences by folding a [`LayerStack`] over time. The fold is
/// strictly sequential: every layer's COPY/UPDATE/FLUSH choice depends on the
/// state left by the previous step.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct Hmlstm<B: Backend> {
    stack: LayerStack<B>,
    /// Whether input is `[batch, seq, features]` instead of `[seq, batch, features]`
    #[module(skip)]
    batch_first: bool,
    /// Whether to keep the state of every timestep
    #[module(skip)]
    return_sequences: bool,
}

impl<B: Backend> Hmlstm<B> {
    /// Create a new HM-LSTM layer.
    ///
    /// # Arguments
    /// * `input_size` - Number of input features
    /// * `hidden_sizes` - Hidden width of every layer, bottom first
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_sizes: &[usize], device: &B::Device) -> Result<Self> {
        Ok(Self::from_stack(LayerStack::new(input_size, hidden_sizes, 0, device)?))
    }

    /// Wrap an already built stack.
    pub fn from_stack(stack: LayerStack<B>) -> Self {
        Self {
            stack,
            batch_first: false,
            return_sequences: false,
        }
    }

    /// Set whether input is batch-first (default: false, i.e. `[seq, batch, features]`)
    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    /// Set whether to keep every timestep's states (default: false)
    pub fn with_return_sequences(mut self, return_sequences: bool) -> Self {
        self.return_sequences = return_sequences;
        self
    }

    /// Set the boundary slope of every layer.
    pub fn with_slope(mut self, slope: f64) -> Self {
        self.stack.set_slope(slope);
        self
    }

    pub(crate) fn set_slope(&mut self, slope: f64) {
        self.stack.set_slope(slope);
    }

    pub fn stack(&self) -> &LayerStack<B> {
        &self.stack
    }

    pub fn num_layers(&self) -> usize {
        self.stack.num_layers()
    }

    pub fn input_size(&self) -> usize {
        self.stack.input_size()
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.stack.hidden_sizes()
    }

    pub fn slope(&self) -> f64 {
        self.stack.slope()
    }

    pub fn batch_first(&self) -> bool {
        self.batch_first
    }

    pub fn return_sequences(&self) -> bool {
        self.return_sequences
    }

    /// Forward pass through the HM-LSTM layer
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape:
    ///   - 3D: [seq, batch, features] if batch_first=false
    ///   - 3D: [batch, seq, features] if batch_first=true
    /// * `state` - Optional initial per-layer states; zeros if None
    ///
    /// # Returns
    /// A [`SequenceOutput`] with the final states, the optional history and
    /// the boundary trace.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<Vec<LayerState<B>>>,
    ) -> SequenceOutput<B> {
        self.unroll(input, state, self.return_sequences)
    }

    /// [`forward`](Self::forward) with the history choice made per call
    /// instead of at construction.
    pub fn unroll(
        &self,
        input: Tensor<B, 3>,
        state: Option<Vec<LayerState<B>>>,
        keep_history: bool,
    ) -> SequenceOutput<B> {
        let device = input.device();
        let dims = input.dims();
        let (batch_size, seq_len) = if self.batch_first {
            (dims[0], dims[1])
        } else {
            (dims[1], dims[0])
        };
        let num_layers = self.stack.num_layers();

        let mut current = state.unwrap_or_else(|| self.stack.zero_states(batch_size, &device));
        let mut history = Vec::with_capacity(if keep_history { seq_len } else { 0 });
        let mut boundaries: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step_input = if self.batch_first {
                // input[batch, t, features] -> [batch, features]
                input.clone().narrow(1, t, 1).reshape([batch_size, dims[2]])
            } else {
                // input[t, batch, features] -> [batch, features]
                input.clone().narrow(0, t, 1).reshape([batch_size, dims[2]])
            };

            let step = self.stack.forward(step_input, &current);

            // [batch, layers]
            let z_t = Tensor::cat(step.states.iter().map(|s| s.boundary.clone()).collect(), 1);
            boundaries.push(z_t);

            current = step.states;
            if keep_history {
                history.push(current.clone());
            }
        }

        let boundaries = if seq_len == 0 {
            BoundaryTrace::empty(batch_size, num_layers)
        } else {
            let flat: Vec<f32> = Tensor::stack::<3>(boundaries, 0)
                .into_data()
                .iter::<f32>()
                .collect();
            BoundaryTrace::from_time_major(flat, seq_len, batch_size, num_layers)
        };

        SequenceOutput {
            final_states: current,
            history,
            boundaries,
        }
    }
}
