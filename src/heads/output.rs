use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::TaskKind;
use crate::error::{HmlstmError, Result};

/// Loss and prediction of one head evaluation.
#[derive(Debug, Clone)]
pub struct HeadOutput<B: Backend> {
    /// Mean loss over the batch, shape `[1]`.
    pub loss: Tensor<B, 1>,
    /// Regression values or logits, `[batch, output_size]`.
    pub prediction: Tensor<B, 2>,
}

/// Two tanh layers followed by a linear read-out.
#[derive(Module, Debug)]
pub struct OutputMlp<B: Backend> {
    hidden1: Linear<B>,
    hidden2: Linear<B>,
    readout: Linear<B>,
}

impl<B: Backend> OutputMlp<B> {
    pub fn new(
        embed_size: usize,
        out_hidden_size: usize,
        output_size: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            hidden1: LinearConfig::new(embed_size, out_hidden_size).init(device),
            hidden2: LinearConfig::new(out_hidden_size, out_hidden_size).init(device),
            readout: LinearConfig::new(out_hidden_size, output_size).init(device),
        }
    }

    pub fn forward(&self, embedding: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden1.forward(embedding).tanh();
        let x = self.hidden2.forward(x).tanh();
        self.readout.forward(x)
    }
}

/// Task head selected at configuration time.
///
/// | Task | Prediction | Loss |
/// |------|------------|------|
/// | Regression | MLP output | mean squared error |
/// | Classification | MLP logits | softmax cross entropy |
/// | AnswerScoring | `candidates · embedding` | softmax cross entropy over candidates |
#[derive(Module, Debug)]
pub struct OutputHead<B: Backend> {
    /// Absent for answer scoring, which has no parameters of its own.
    mlp: Option<OutputMlp<B>>,
    #[module(skip)]
    task: TaskKind,
    #[module(skip)]
    output_size: usize,
}

impl<B: Backend> OutputHead<B> {
    pub fn new(
        task: TaskKind,
        embed_size: usize,
        out_hidden_size: usize,
        output_size: usize,
        device: &B::Device,
    ) -> Self {
        let mlp = match task {
            TaskKind::Regression | TaskKind::Classification => Some(OutputMlp::new(
                embed_size,
                out_hidden_size,
                output_size,
                device,
            )),
            TaskKind::AnswerScoring => None,
        };
        Self {
            mlp,
            task,
            output_size,
        }
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Prediction only.
    ///
    /// # Arguments
    /// * `embedding` - `[batch, embed_size]`
    /// * `candidates` - `[batch, num_candidates, embed_size]`, required for answer scoring
    pub fn predict(
        &self,
        embedding: Tensor<B, 2>,
        candidates: Option<Tensor<B, 3>>,
    ) -> Result<Tensor<B, 2>> {
        match &self.mlp {
            Some(mlp) => Ok(mlp.forward(embedding)),
            None => {
                let candidates = candidates.ok_or_else(|| {
                    HmlstmError::config("answer scoring needs candidate embeddings")
                })?;
                let [batch_size, num_candidates, _] = candidates.dims();
                // [B, N, E] x [B, E, 1] -> [B, N, 1]
                let scores = candidates.matmul(embedding.unsqueeze_dim::<3>(2));
                Ok(scores.reshape([batch_size, num_candidates]))
            }
        }
    }

    /// Loss and prediction for one batch.
    ///
    /// `target` is `[batch, output_size]`: values for regression, a one-hot or
    /// multi-hot distribution otherwise.
    pub fn compute_loss_and_prediction(
        &self,
        embedding: Tensor<B, 2>,
        target: Tensor<B, 2>,
        candidates: Option<Tensor<B, 3>>,
    ) -> Result<HeadOutput<B>> {
        let prediction = self.predict(embedding, candidates)?;
        if prediction.dims() != target.dims() {
            return Err(HmlstmError::data(format!(
                "target shape {:?} does not match prediction shape {:?}",
                target.dims(),
                prediction.dims()
            )));
        }

        let loss = match self.task {
            TaskKind::Regression => squared_error(prediction.clone(), target),
            TaskKind::Classification | TaskKind::AnswerScoring => {
                soft_cross_entropy(prediction.clone(), target)
            }
        };

        Ok(HeadOutput { loss, prediction })
    }
}

/// Mean elementwise squared error.
pub fn squared_error<B: Backend>(prediction: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = prediction - target;
    (diff.clone() * diff).mean()
}

/// Batch mean of `-Σ target · log_softmax(logits)`.
pub fn soft_cross_entropy<B: Backend>(logits: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = activation::log_softmax(logits, 1);
    (target * log_probs).sum_dim(1).neg().mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_regression_head() {
        let device = Default::default();
        let head = OutputHead::<TestBackend>::new(TaskKind::Regression, 8, 16, 3, &device);

        let e = Tensor::<TestBackend, 2>::ones([2, 8], &device);
        let t = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let out = head.compute_loss_and_prediction(e, t, None).unwrap();

        assert_eq!(out.prediction.dims(), [2, 3]);
        assert_eq!(out.loss.dims(), [1]);
        assert!(out.loss.into_scalar() >= 0.0);
    }

    #[test]
    fn test_squared_error_value() {
        let device = Default::default();
        let p = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let t = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [3.0, 2.0]], &device);

        // (0 + 4 + 0 + 4) / 4
        assert_eq!(squared_error(p, t).into_scalar(), 2.0);
    }

    #[test]
    fn test_soft_cross_entropy_uniform_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([1, 4], &device);
        let target = Tensor::<TestBackend, 2>::from_floats([[0.0, 1.0, 0.0, 0.0]], &device);

        let ce: f32 = soft_cross_entropy(logits, target).into_scalar();
        assert!((ce - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_answer_scoring_requires_candidates() {
        let device = Default::default();
        let head = OutputHead::<TestBackend>::new(TaskKind::AnswerScoring, 4, 16, 10, &device);

        let e = Tensor::<TestBackend, 2>::ones([2, 4], &device);
        let t = Tensor::<TestBackend, 2>::zeros([2, 10], &device);
        assert!(matches!(
            head.compute_loss_and_prediction(e, t, None),
            Err(HmlstmError::Configuration(_))
        ));
    }

    #[test]
    fn test_answer_scoring_dot_products() {
        let device = Default::default();
        let head = OutputHead::<TestBackend>::new(TaskKind::AnswerScoring, 2, 16, 3, &device);

        let e = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device);
        let c = Tensor::<TestBackend, 3>::from_floats([[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]], &device);

        let logits = head.predict(e, Some(c)).unwrap();
        assert_eq!(logits.into_data().to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_target_shape_mismatch_is_data_error() {
        let device = Default::default();
        let head = OutputHead::<TestBackend>::new(TaskKind::Classification, 8, 16, 3, &device);

        let e = Tensor::<TestBackend, 2>::ones([2, 8], &device);
        let t = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
        assert!(matches!(
            head.compute_loss_and_prediction(e, t, None),
            Err(HmlstmError::Data(_))
        ));
    }
}
