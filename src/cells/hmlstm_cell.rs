use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::boundary::{boundary_probability, straight_through};
use super::state::LayerState;
use crate::error::{HmlstmError, Result};

/// One layer of a hierarchical multiscale LSTM.
///
/// Gates are computed from three gated sources:
/// - s_rec   = (1 - z) * h             (dropped when this layer flushes)
/// - s_below = z_below * h_below       (only when the layer below fired)
/// - s_above = h_above                 (previous-step summary of the layer above)
///
/// and the transition is picked by the previous boundary `z` and `z_below`:
/// - FLUSH  (z = 1):              c' = i * g
/// - UPDATE (z = 0, z_below = 1): c' = f * c + i * g
/// - COPY   (z = 0, z_below = 0): c' = c, h' = h
///
/// Outside COPY, h' = o * tanh(c'). The new boundary is read off the new cell
/// state through [`straight_through`].
#[derive(Module, Debug)]
pub struct HierarchicalCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    #[module(skip)]
    above_size: usize,
    #[module(skip)]
    slope: f64,
    recurrent_map: Linear<B>,          // hidden_size -> 4 * hidden_size (with bias)
    below_map: Linear<B>,              // input_size  -> 4 * hidden_size
    above_map: Option<Linear<B>>,      // above_size  -> 4 * hidden_size
    boundary_map: Linear<B>,           // hidden_size -> 1
}

impl<B: Backend> HierarchicalCell<B> {
    /// Create a cell reading `input_size` features from below.
    ///
    /// Zero widths are rejected here so that no call-time check is needed.
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Result<Self> {
        if input_size == 0 || hidden_size == 0 {
            return Err(HmlstmError::config(format!(
                "cell widths must be positive (input {input_size}, hidden {hidden_size})"
            )));
        }

        let recurrent_map = LinearConfig::new(hidden_size, 4 * hidden_size)
            .with_bias(true)
            .init(device);

        let below_map = LinearConfig::new(input_size, 4 * hidden_size)
            .with_bias(false)
            .init(device);

        let boundary_map = LinearConfig::new(hidden_size, 1)
            .with_bias(true)
            .init(device);

        Ok(Self {
            input_size,
            hidden_size,
            above_size: 0,
            slope: 1.0,
            recurrent_map,
            below_map,
            above_map: None,
            boundary_map,
        })
    }

    /// Accept a top-down summary of `above_size` features. 0 removes it.
    pub fn with_summary_above(mut self, above_size: usize, device: &B::Device) -> Self {
        let hidden_size = self.hidden_size;
        self.above_size = above_size;
        self.above_map = (above_size > 0).then(|| {
            LinearConfig::new(above_size, 4 * hidden_size)
                .with_bias(false)
                .init(device)
        });
        self
    }

    /// Set the slope of the boundary sigmoid.
    pub fn with_slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Width of the expected summary-above, 0 when the cell takes none.
    pub fn above_size(&self) -> usize {
        self.above_size
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub(crate) fn set_slope(&mut self, slope: f64) {
        self.slope = slope;
    }

    /// Advance the layer by one timestep.
    ///
    /// # Arguments
    /// * `input_below` - `[batch, input_size]`, raw input or the new hidden state of the layer below
    /// * `boundary_below` - `[batch, 1]`, the new boundary of the layer below (ones for layer 0)
    /// * `summary_above` - `[batch, above_size]`, previous hidden state of the layer above
    /// * `state` - this layer's previous state
    pub fn forward(
        &self,
        input_below: Tensor<B, 2>,
        boundary_below: Tensor<B, 2>,
        summary_above: Option<Tensor<B, 2>>,
        state: LayerState<B>,
    ) -> LayerState<B> {
        let LayerState {
            cell,
            hidden,
            boundary,
        } = state;
        let [batch_size, hidden_size] = hidden.dims();

        let z = boundary.expand([batch_size, hidden_size]);
        let z_below = boundary_below.clone().expand([batch_size, hidden_size]);
        let not_z = Tensor::ones_like(&z) - z.clone();

        // Gated sources
        let s_recurrent = not_z.clone() * hidden.clone();
        let s_below = boundary_below.expand([batch_size, self.input_size]) * input_below;

        let mut pre = self.recurrent_map.forward(s_recurrent) + self.below_map.forward(s_below);
        if let (Some(above_map), Some(summary)) = (&self.above_map, summary_above) {
            pre = pre + above_map.forward(summary);
        }

        // Split into 4 gates
        let chunks = pre.chunk(4, 1);
        let input_gate = activation::sigmoid(chunks[0].clone());
        let candidate = chunks[1].clone().tanh();
        let forget_gate = activation::sigmoid(chunks[2].clone() + 1.0);
        let output_gate = activation::sigmoid(chunks[3].clone());

        // Mode masks, exactly one of them is 1 per row
        let flush = z;
        let update = not_z.clone() * z_below.clone();
        let copy = not_z * (Tensor::ones_like(&z_below) - z_below);

        let fresh = input_gate * candidate;
        let new_cell = flush * fresh.clone()
            + update * (forget_gate * cell.clone() + fresh)
            + copy.clone() * cell;

        let emitted = output_gate * new_cell.clone().tanh();
        let new_hidden = (Tensor::ones_like(&copy) - copy.clone()) * emitted + copy * hidden;

        let boundary_pre = self.boundary_map.forward(new_cell.clone());
        let new_boundary = straight_through(boundary_probability(boundary_pre, self.slope));

        LayerState::new(new_cell, new_hidden, new_boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_cell_creation() {
        let device = get_test_device();
        let cell = HierarchicalCell::<TestBackend>::new(20, 50, &device)
            .unwrap()
            .with_summary_above(30, &device)
            .with_slope(2.0);

        assert_eq!(cell.input_size(), 20);
        assert_eq!(cell.hidden_size(), 50);
        assert_eq!(cell.above_size(), 30);
        assert_eq!(cell.slope(), 2.0);
    }

    #[test]
    fn test_zero_width_is_configuration_error() {
        let device = get_test_device();
        let err = HierarchicalCell::<TestBackend>::new(0, 50, &device).unwrap_err();
        assert!(matches!(err, HmlstmError::Configuration(_)));
    }

    #[test]
    fn test_forward_shapes() {
        let device = get_test_device();
        let cell = HierarchicalCell::<TestBackend>::new(20, 50, &device)
            .unwrap()
            .with_summary_above(30, &device);

        let batch_size = 4;
        let input = Tensor::<TestBackend, 2>::random([batch_size, 20], Distribution::Default, &device);
        let z_below = Tensor::<TestBackend, 2>::ones([batch_size, 1], &device);
        let above = Tensor::<TestBackend, 2>::zeros([batch_size, 30], &device);
        let state = LayerState::zeros(batch_size, 50, &device);

        let next = cell.forward(input, z_below, Some(above), state);

        assert_eq!(next.cell.dims(), [batch_size, 50]);
        assert_eq!(next.hidden.dims(), [batch_size, 50]);
        assert_eq!(next.boundary.dims(), [batch_size, 1]);
    }

    #[test]
    fn test_update_from_zero_state_moves_hidden() {
        let device = get_test_device();
        let cell = HierarchicalCell::<TestBackend>::new(10, 20, &device).unwrap();

        let input = Tensor::<TestBackend, 2>::ones([2, 10], &device);
        let z_below = Tensor::<TestBackend, 2>::ones([2, 1], &device);
        let state = LayerState::zeros(2, 20, &device);

        let next = cell.forward(input, z_below, None, state);

        let h_sum = next.hidden.abs().sum().into_scalar();
        assert!(h_sum > 0.0, "UPDATE should write new information into h");
    }
}
