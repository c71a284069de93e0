use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// State of one layer at one timestep.
///
/// `cell` and `hidden` are `[batch, hidden_size]`; `boundary` is `[batch, 1]`
/// and holds exactly 0.0 or 1.0 in the forward pass.
#[derive(Debug, Clone)]
pub struct LayerState<B: Backend> {
    pub cell: Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
    pub boundary: Tensor<B, 2>,
}

impl<B: Backend> LayerState<B> {
    pub fn new(cell: Tensor<B, 2>, hidden: Tensor<B, 2>, boundary: Tensor<B, 2>) -> Self {
        Self {
            cell,
            hidden,
            boundary,
        }
    }

    /// All-zero state used at the start of every sequence.
    pub fn zeros(batch_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            cell: Tensor::zeros([batch_size, hidden_size], device),
            hidden: Tensor::zeros([batch_size, hidden_size], device),
            boundary: Tensor::zeros([batch_size, 1], device),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[0]
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_zero_state_shapes() {
        let device = Default::default();
        let state = LayerState::<TestBackend>::zeros(3, 7, &device);

        assert_eq!(state.cell.dims(), [3, 7]);
        assert_eq!(state.hidden.dims(), [3, 7]);
        assert_eq!(state.boundary.dims(), [3, 1]);
        assert_eq!(state.batch_size(), 3);
        assert_eq!(state.hidden_size(), 7);
        assert_eq!(state.boundary.sum().into_scalar(), 0.0);
    }
}
