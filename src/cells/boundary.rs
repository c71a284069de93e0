//! Boundary detector with a straight-through gradient.
//!
//! The forward pass needs a hard 0/1 decision so that COPY/UPDATE/FLUSH are
//! selected exactly; the backward pass needs something differentiable. The
//! split lives here and nowhere else:
//!
//! ```text
//! p        = σ(slope · pre)                 boundary_probability
//! hard(p)  = 1[p ≥ 0.5]                     hard_decision
//! z        = p + detach(hard(p) − p)        straight_through
//! ```
//!
//! `z` evaluates to exactly `hard(p)` (for `p ≥ 0.5`, `1 − p` is exact by
//! Sterbenz; for `p < 0.5`, `0 − p` is exact), while `∂z/∂p = 1`.

use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Threshold above which a boundary fires.
pub const BOUNDARY_THRESHOLD: f32 = 0.5;

/// Slope-annealed sigmoid of the boundary pre-activation.
pub fn boundary_probability<B: Backend, const D: usize>(
    pre: Tensor<B, D>,
    slope: f64,
) -> Tensor<B, D> {
    activation::sigmoid(pre.mul_scalar(slope))
}

/// Hard 0/1 step of a probability. Carries no gradient.
pub fn hard_decision<B: Backend, const D: usize>(probability: Tensor<B, D>) -> Tensor<B, D> {
    probability
        .greater_equal_elem(BOUNDARY_THRESHOLD)
        .float()
}

/// Hard decision in the forward pass, identity gradient in the backward pass.
pub fn straight_through<B: Backend, const D: usize>(probability: Tensor<B, D>) -> Tensor<B, D> {
    let hard = hard_decision(probability.clone());
    probability.clone() + (hard - probability).detach()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiff = Autodiff<TestBackend>;

    #[test]
    fn test_hard_decision_is_binary() {
        let device = Default::default();
        let p = Tensor::<TestBackend, 1>::from_floats([0.0, 0.2, 0.49, 0.5, 0.51, 0.97, 1.0], &device);

        let z = hard_decision(p).into_data().to_vec::<f32>().unwrap();
        assert_eq!(z, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_straight_through_forward_is_exact() {
        let device = Default::default();
        let p = Tensor::<TestBackend, 1>::from_floats([0.013, 0.3, 0.4999, 0.5, 0.7, 0.999], &device);

        let z = straight_through(p).into_data().to_vec::<f32>().unwrap();
        assert_eq!(z, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_straight_through_gradient_is_identity() {
        let device = Default::default();
        let p = Tensor::<TestAutodiff, 1>::from_floats([0.2, 0.8], &device).require_grad();

        let z = straight_through(p.clone());
        let grads = z.sum().backward();
        let grad = p.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();

        assert_eq!(grad, vec![1.0, 1.0]);
    }

    #[test]
    fn test_slope_sharpens_probability() {
        let device = Default::default();
        let pre = Tensor::<TestBackend, 1>::from_floats([0.5], &device);

        let flat: f32 = boundary_probability(pre.clone(), 1.0).into_scalar();
        let steep: f32 = boundary_probability(pre, 5.0).into_scalar();
        assert!(steep > flat);
    }
}
