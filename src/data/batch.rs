//! Host-side batches.
//!
//! Batches live in `ndarray` storage so that one batch source can feed both
//! the autodiff backend used for training and the plain backend used for
//! validation. Tensors are materialised per backend with the `*_tensor`
//! methods.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::{Array2, Array3};

use super::answer::answer_distribution;
use crate::error::{HmlstmError, Result};

/// Out-of-vocabulary token id reserved by convention.
pub const OOV_ID: i64 = 0;

/// Sequence input of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput {
    /// Dense features `[time, batch, input_size]`.
    Dense(Array3<f32>),
    /// Token ids `[time, batch]`, embedded by the network.
    Tokens(Array2<i64>),
}

/// What the network is asked to predict.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchTarget {
    /// One target per sequence `[batch, output_size]`.
    Final(Array2<f32>),
    /// One target per timestep `[time, batch, output_size]`.
    PerStep(Array3<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input: BatchInput,
    pub target: BatchTarget,
    /// Candidate token ids `[batch, num_candidates]` for answer scoring.
    pub candidates: Option<Array2<i64>>,
}

impl Batch {
    /// Assemble a batch, checking that every part agrees on batch size and
    /// sequence length.
    pub fn new(
        input: BatchInput,
        target: BatchTarget,
        candidates: Option<Array2<i64>>,
    ) -> Result<Self> {
        let (timesteps, batch_size) = match &input {
            BatchInput::Dense(x) => (x.dim().0, x.dim().1),
            BatchInput::Tokens(ids) => ids.dim(),
        };

        match &target {
            BatchTarget::Final(t) if t.dim().0 != batch_size => {
                return Err(HmlstmError::data(format!(
                    "target has {} rows for a batch of {batch_size}",
                    t.dim().0
                )));
            }
            BatchTarget::PerStep(t) if t.dim().0 != timesteps || t.dim().1 != batch_size => {
                return Err(HmlstmError::data(format!(
                    "per-step target {:?} does not match input [{timesteps}, {batch_size}]",
                    t.dim()
                )));
            }
            _ => {}
        }

        if let Some(c) = &candidates {
            if c.dim().0 != batch_size {
                return Err(HmlstmError::data(format!(
                    "candidates have {} rows for a batch of {batch_size}",
                    c.dim().0
                )));
            }
        }

        Ok(Self {
            input,
            target,
            candidates,
        })
    }

    /// Dense sequence with one target per sequence.
    pub fn dense(input: Array3<f32>, target: Array2<f32>) -> Result<Self> {
        Self::new(BatchInput::Dense(input), BatchTarget::Final(target), None)
    }

    /// Dense sequence with a target at every timestep.
    pub fn dense_per_step(input: Array3<f32>, target: Array3<f32>) -> Result<Self> {
        Self::new(BatchInput::Dense(input), BatchTarget::PerStep(target), None)
    }

    /// Query+context ids `[time, batch]`, candidates `[batch, n]` and the
    /// answer id of every row. Fails if an answer is not among its row's
    /// candidates.
    pub fn answer_scoring(
        tokens: Array2<i64>,
        candidates: Array2<i64>,
        answers: &[i64],
    ) -> Result<Self> {
        let target = answer_distribution(candidates.view(), answers)?.into_checked()?;
        Self::new(
            BatchInput::Tokens(tokens),
            BatchTarget::Final(target),
            Some(candidates),
        )
    }

    pub fn timesteps(&self) -> usize {
        match &self.input {
            BatchInput::Dense(x) => x.dim().0,
            BatchInput::Tokens(ids) => ids.dim().0,
        }
    }

    pub fn batch_size(&self) -> usize {
        match &self.input {
            BatchInput::Dense(x) => x.dim().1,
            BatchInput::Tokens(ids) => ids.dim().1,
        }
    }

    /// Reject token ids outside `0..vocab_size` before any lookup happens.
    pub fn check_vocab(&self, vocab_size: usize) -> Result<()> {
        let inputs = match &self.input {
            BatchInput::Tokens(ids) => Some(ids.iter()),
            BatchInput::Dense(_) => None,
        };
        let candidates = self.candidates.as_ref().map(|c| c.iter());

        for &id in inputs.into_iter().flatten().chain(candidates.into_iter().flatten()) {
            if id < 0 || id as usize >= vocab_size {
                return Err(HmlstmError::data(format!(
                    "token id {id} outside vocabulary of {vocab_size}"
                )));
            }
        }
        Ok(())
    }

    pub fn dense_tensor<B: Backend>(&self, device: &B::Device) -> Option<Tensor<B, 3>> {
        match &self.input {
            BatchInput::Dense(x) => Some(array3_tensor(x, device)),
            BatchInput::Tokens(_) => None,
        }
    }

    /// Targets as `[rows, width]`; per-step rows are ordered `t * batch + b`.
    pub fn target_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        match &self.target {
            BatchTarget::Final(t) => array2_tensor(t, device),
            BatchTarget::PerStep(t) => {
                let (timesteps, batch_size, width) = t.dim();
                array3_tensor(t, device).reshape([timesteps * batch_size, width])
            }
        }
    }

    pub fn token_tensor<B: Backend>(&self, device: &B::Device) -> Option<Tensor<B, 2, Int>> {
        match &self.input {
            BatchInput::Tokens(ids) => Some(int_tensor(ids, device)),
            BatchInput::Dense(_) => None,
        }
    }

    pub fn candidate_tensor<B: Backend>(&self, device: &B::Device) -> Option<Tensor<B, 2, Int>> {
        self.candidates.as_ref().map(|c| int_tensor(c, device))
    }
}

pub(crate) fn array2_tensor<B: Backend>(array: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}

pub(crate) fn array3_tensor<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (d0, d1, d2) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [d0, d1, d2]), device)
}

fn int_tensor<B: Backend>(array: &Array2<i64>, device: &B::Device) -> Tensor<B, 2, Int> {
    let (rows, cols) = array.dim();
    let data: Vec<i64> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}
