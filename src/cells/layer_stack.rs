use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::hmlstm_cell::HierarchicalCell;
use super::state::LayerState;
use crate::error::{HmlstmError, Result};

/// Result of one timestep through the whole stack.
#[derive(Debug, Clone)]
pub struct StackStep<B: Backend> {
    /// New state of every layer, bottom first.
    pub states: Vec<LayerState<B>>,
    /// New hidden state of every layer, bottom first.
    pub hidden: Vec<Tensor<B, 2>>,
}

/// `L` hierarchical cells wired for a single timestep.
///
/// Layer `l` reads the *current* output of layer `l - 1` and the *previous*
/// hidden state of layer `l + 1`. The one-step lag on the top-down path keeps
/// the bottom-up sweep a single pass.
#[derive(Module, Debug)]
pub struct LayerStack<B: Backend> {
    cells: Vec<HierarchicalCell<B>>,
    #[module(skip)]
    top_summary_size: usize,
}

impl<B: Backend> LayerStack<B> {
    /// Build the stack for `input_size` raw features and the given per-layer
    /// widths. The top layer gets an all-zero summary of `top_summary_size`
    /// features (none when 0).
    pub fn new(
        input_size: usize,
        hidden_sizes: &[usize],
        top_summary_size: usize,
        device: &B::Device,
    ) -> Result<Self> {
        if hidden_sizes.is_empty() {
            return Err(HmlstmError::config("a layer stack needs at least one layer"));
        }

        let num_layers = hidden_sizes.len();
        let cells = (0..num_layers)
            .map(|l| {
                let below = if l == 0 { input_size } else { hidden_sizes[l - 1] };
                let above = if l + 1 == num_layers {
                    top_summary_size
                } else {
                    hidden_sizes[l + 1]
                };
                HierarchicalCell::new(below, hidden_sizes[l], device)
                    .map(|cell| cell.with_summary_above(above, device))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cells,
            top_summary_size,
        })
    }

    pub fn with_slope(mut self, slope: f64) -> Self {
        self.set_slope(slope);
        self
    }

    pub(crate) fn set_slope(&mut self, slope: f64) {
        for cell in self.cells.iter_mut() {
            cell.set_slope(slope);
        }
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn input_size(&self) -> usize {
        self.cells[0].input_size()
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.cells.iter().map(|c| c.hidden_size()).collect()
    }

    pub fn top_summary_size(&self) -> usize {
        self.top_summary_size
    }

    pub fn cells(&self) -> &[HierarchicalCell<B>] {
        &self.cells
    }

    pub fn slope(&self) -> f64 {
        self.cells[0].slope()
    }

    /// Zero state for every layer.
    pub fn zero_states(&self, batch_size: usize, device: &B::Device) -> Vec<LayerState<B>> {
        self.cells
            .iter()
            .map(|c| LayerState::zeros(batch_size, c.hidden_size(), device))
            .collect()
    }

    /// Run one timestep, bottom to top.
    ///
    /// # Arguments
    /// * `input` - `[batch, input_size]` raw input for this timestep
    /// * `states` - previous state of every layer, bottom first
    ///
    /// # Panics
    /// If `states.len()` differs from the number of layers.
    pub fn forward(&self, input: Tensor<B, 2>, states: &[LayerState<B>]) -> StackStep<B> {
        assert_eq!(
            states.len(),
            self.cells.len(),
            "expected one state per layer"
        );
        let batch_size = input.dims()[0];
        let device = input.device();

        let mut new_states: Vec<LayerState<B>> = Vec::with_capacity(self.cells.len());
        let mut below = input;
        let mut boundary_below = Tensor::<B, 2>::ones([batch_size, 1], &device);

        for (l, cell) in self.cells.iter().enumerate() {
            let summary_above = match states.get(l + 1) {
                Some(above) => Some(above.hidden.clone()),
                None if self.top_summary_size > 0 => Some(Tensor::zeros(
                    [batch_size, self.top_summary_size],
                    &device,
                )),
                None => None,
            };

            let next = cell.forward(below, boundary_below, summary_above, states[l].clone());
            below = next.hidden.clone();
            boundary_below = next.boundary.clone();
            new_states.push(next);
        }

        let hidden = new_states.iter().map(|s| s.hidden.clone()).collect();
        StackStep {
            states: new_states,
            hidden,
        }
    }
}
