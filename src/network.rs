//! The complete HM-LSTM network.
//!
//! ```text
//! ids ──Embedding──┐
//!                  ├─> Hmlstm ─> GateEmbed ─> OutputHead ─> (loss, prediction)
//! dense input ─────┘        └──> BoundaryTrace
//! ```

use burn::module::Module;
use burn::nn::{Embedding, EmbeddingConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::cells::LayerStack;
use crate::config::NetworkConfig;
use crate::data::batch::{array2_tensor, array3_tensor};
use crate::data::{Batch, BatchInput, BatchTarget};
use crate::error::{HmlstmError, Result};
use crate::heads::{GateEmbed, OutputHead};
use crate::rnn::{BoundaryTrace, Hmlstm, SequenceOutput};

/// Network output shaped like the batch target it answers.
#[derive(Debug, Clone)]
pub enum Prediction<B: Backend> {
    /// `[batch, output_size]`
    Final(Tensor<B, 2>),
    /// `[time, batch, output_size]`
    PerStep(Tensor<B, 3>),
}

impl<B: Backend> Prediction<B> {
    /// All predicted rows as `[rows, output_size]`.
    pub fn flatten(self) -> Tensor<B, 2> {
        match self {
            Prediction::Final(p) => p,
            Prediction::PerStep(p) => {
                let [t, b, o] = p.dims();
                p.reshape([t * b, o])
            }
        }
    }
}

/// Result of one forward pass with loss.
#[derive(Debug, Clone)]
pub struct StepOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub prediction: Prediction<B>,
    pub boundaries: BoundaryTrace,
}

#[derive(Module, Debug)]
pub struct HmlstmNetwork<B: Backend> {
    /// Token table, present when the config names a vocabulary.
    embedding: Option<Embedding<B>>,
    driver: Hmlstm<B>,
    gate_embed: GateEmbed<B>,
    head: OutputHead<B>,
    #[module(skip)]
    vocab_size: Option<usize>,
}

impl NetworkConfig {
    /// Build a freshly initialized network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<HmlstmNetwork<B>> {
        let hidden_sizes = self.validate()?;

        let embedding = self
            .vocab_size
            .map(|vocab| EmbeddingConfig::new(vocab, self.input_size).init(device));
        let stack = LayerStack::new(self.input_size, &hidden_sizes, self.top_summary_size, device)?
            .with_slope(self.slope);
        let driver = Hmlstm::from_stack(stack);
        let gate_embed = GateEmbed::new(&hidden_sizes, self.embed_size, device);
        let head = OutputHead::new(
            self.task,
            self.embed_size,
            self.out_hidden_size,
            self.output_size,
            device,
        );

        Ok(HmlstmNetwork {
            embedding,
            driver,
            gate_embed,
            head,
            vocab_size: self.vocab_size,
        })
    }
}

impl<B: Backend> HmlstmNetwork<B> {
    pub fn driver(&self) -> &Hmlstm<B> {
        &self.driver
    }

    pub fn gate_embed(&self) -> &GateEmbed<B> {
        &self.gate_embed
    }

    pub fn head(&self) -> &OutputHead<B> {
        &self.head
    }

    pub fn slope(&self) -> f64 {
        self.driver.slope()
    }

    pub fn set_slope(&mut self, slope: f64) {
        self.driver.set_slope(slope);
    }

    pub fn with_slope(mut self, slope: f64) -> Self {
        self.set_slope(slope);
        self
    }

    /// Look up token ids of any 2D layout, `[d0, d1] -> [d0, d1, input_size]`.
    pub fn embed_tokens(&self, ids: Tensor<B, 2, Int>) -> Result<Tensor<B, 3>> {
        let embedding = self
            .embedding
            .as_ref()
            .ok_or_else(|| HmlstmError::config("token input needs a vocabulary size"))?;
        Ok(embedding.forward(ids))
    }

    /// Forward pass, loss and prediction for one batch.
    pub fn forward_loss(&self, batch: &Batch, device: &B::Device) -> Result<StepOutput<B>> {
        let (sequence, candidates) = self.encode(batch, device)?;

        match &batch.target {
            BatchTarget::Final(target) => {
                let embedding = self.gate_embed.forward(&sequence.final_hidden());
                let out = self.head.compute_loss_and_prediction(
                    embedding,
                    array2_tensor(target, device),
                    candidates,
                )?;
                Ok(StepOutput {
                    loss: out.loss,
                    prediction: Prediction::Final(out.prediction),
                    boundaries: sequence.boundaries,
                })
            }
            BatchTarget::PerStep(target) => {
                let (timesteps, batch_size, output_size) = target.dim();
                let (embedding, candidates) = self.per_step_embedding(&sequence, candidates)?;
                let target =
                    array3_tensor(target, device).reshape([timesteps * batch_size, output_size]);

                let out = self
                    .head
                    .compute_loss_and_prediction(embedding, target, candidates)?;
                let prediction = out.prediction.reshape([timesteps, batch_size, output_size]);
                Ok(StepOutput {
                    loss: out.loss,
                    prediction: Prediction::PerStep(prediction),
                    boundaries: sequence.boundaries,
                })
            }
        }
    }

    /// Prediction without loss. The batch target only selects whether one
    /// prediction per sequence or per step is produced.
    pub fn predict(&self, batch: &Batch, device: &B::Device) -> Result<Prediction<B>> {
        let (sequence, candidates) = self.encode(batch, device)?;

        match &batch.target {
            BatchTarget::Final(_) => {
                let embedding = self.gate_embed.forward(&sequence.final_hidden());
                Ok(Prediction::Final(self.head.predict(embedding, candidates)?))
            }
            BatchTarget::PerStep(_) => {
                let timesteps = sequence.history.len();
                let batch_size = batch.batch_size();
                let (embedding, candidates) = self.per_step_embedding(&sequence, candidates)?;
                let prediction = self.head.predict(embedding, candidates)?;
                let [_, output_size] = prediction.dims();
                Ok(Prediction::PerStep(
                    prediction.reshape([timesteps, batch_size, output_size]),
                ))
            }
        }
    }

    /// Boundary trace of the batch input, `[batch, layers, time]`.
    pub fn predict_boundaries(&self, batch: &Batch, device: &B::Device) -> Result<BoundaryTrace> {
        let input = self.input_tensor(batch, device)?;
        Ok(self.driver.forward(input, None).boundaries)
    }

    fn input_tensor(&self, batch: &Batch, device: &B::Device) -> Result<Tensor<B, 3>> {
        if let Some(vocab_size) = self.vocab_size {
            batch.check_vocab(vocab_size)?;
        }

        match &batch.input {
            BatchInput::Dense(x) => {
                let features = x.dim().2;
                if features != self.driver.input_size() {
                    return Err(HmlstmError::data(format!(
                        "input has {features} features, network expects {}",
                        self.driver.input_size()
                    )));
                }
                Ok(array3_tensor(x, device))
            }
            BatchInput::Tokens(_) => {
                let ids = batch
                    .token_tensor::<B>(device)
                    .ok_or_else(|| HmlstmError::data("token batch without token ids"))?;
                self.embed_tokens(ids)
            }
        }
    }

    /// Unroll the driver and embed the answer candidates, if any.
    fn encode(
        &self,
        batch: &Batch,
        device: &B::Device,
    ) -> Result<(SequenceOutput<B>, Option<Tensor<B, 3>>)> {
        let input = self.input_tensor(batch, device)?;
        let candidates = match batch.candidate_tensor::<B>(device) {
            Some(ids) => Some(self.embed_tokens(ids)?),
            None => None,
        };
        // Only per-step readout needs the states of every step.
        let keep_history = matches!(batch.target, BatchTarget::PerStep(_));
        Ok((self.driver.unroll(input, None, keep_history), candidates))
    }

    /// Embeddings of every step, rows ordered `t * batch + b`. Candidates are
    /// repeated per step to line up.
    fn per_step_embedding(
        &self,
        sequence: &SequenceOutput<B>,
        candidates: Option<Tensor<B, 3>>,
    ) -> Result<(Tensor<B, 2>, Option<Tensor<B, 3>>)> {
        let timesteps = sequence.history.len();
        if timesteps == 0 {
            return Err(HmlstmError::data("per-step targets need at least one timestep"));
        }

        let hidden: Vec<Tensor<B, 2>> = (0..self.driver.num_layers())
            .map(|l| {
                let steps = sequence
                    .history
                    .iter()
                    .map(|states| states[l].hidden.clone())
                    .collect();
                Tensor::cat(steps, 0)
            })
            .collect();
        let candidates = candidates.map(|c| Tensor::cat(vec![c; timesteps], 0));

        Ok((self.gate_embed.forward(&hidden), candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskKind;
    use burn::backend::NdArray;
    use ndarray::{array, Array2, Array3};

    type TestBackend = NdArray<f32>;

    fn regression_config() -> NetworkConfig {
        NetworkConfig::new(3, 2, 4.into(), 2, TaskKind::Regression)
            .with_embed_size(6)
            .with_out_hidden_size(5)
    }

    #[test]
    fn test_final_target_forward() {
        let device = Default::default();
        let net = regression_config().init::<TestBackend>(&device).unwrap();

        let batch = Batch::dense(Array3::ones((4, 2, 3)), Array2::zeros((2, 2))).unwrap();
        let out = net.forward_loss(&batch, &device).unwrap();

        assert!(matches!(out.prediction, Prediction::Final(ref p) if p.dims() == [2, 2]));
        assert_eq!(out.boundaries.as_array().dim(), (2, 2, 4));
        assert!(out.loss.into_scalar().is_finite());
    }

    #[test]
    fn test_per_step_target_forward() {
        let device = Default::default();
        let net = regression_config().init::<TestBackend>(&device).unwrap();

        let batch = Batch::dense_per_step(Array3::ones((4, 2, 3)), Array3::zeros((4, 2, 2))).unwrap();
        let prediction = net.forward_loss(&batch, &device).unwrap().prediction;

        assert!(matches!(prediction, Prediction::PerStep(ref p) if p.dims() == [4, 2, 2]));
        assert_eq!(prediction.flatten().dims(), [8, 2]);
    }

    #[test]
    fn test_history_kept_only_for_per_step_targets() {
        let device = Default::default();
        let net = regression_config().init::<TestBackend>(&device).unwrap();

        let batch = Batch::dense(Array3::ones((4, 2, 3)), Array2::zeros((2, 2))).unwrap();
        let (sequence, _) = net.encode(&batch, &device).unwrap();
        assert!(sequence.history.is_empty());
        assert_eq!(sequence.len(), 4);

        let batch = Batch::dense_per_step(Array3::ones((4, 2, 3)), Array3::zeros((4, 2, 2))).unwrap();
        let (sequence, _) = net.encode(&batch, &device).unwrap();
        assert_eq!(sequence.history.len(), 4);
    }

    #[test]
    fn test_feature_mismatch_is_data_error() {
        let device = Default::default();
        let net = regression_config().init::<TestBackend>(&device).unwrap();

        let batch = Batch::dense(Array3::ones((4, 2, 5)), Array2::zeros((2, 2))).unwrap();
        assert!(matches!(
            net.forward_loss(&batch, &device),
            Err(HmlstmError::Data(_))
        ));
    }

    #[test]
    fn test_tokens_without_vocabulary() {
        let device = Default::default();
        let net = regression_config().init::<TestBackend>(&device).unwrap();
        let ids = Tensor::<TestBackend, 2, Int>::zeros([2, 2], &device);
        assert!(matches!(net.embed_tokens(ids), Err(HmlstmError::Configuration(_))));
    }

    #[test]
    fn test_answer_scoring_forward() {
        let device = Default::default();
        let net = NetworkConfig::new(4, 2, 4.into(), 3, TaskKind::AnswerScoring)
            .with_embed_size(4)
            .with_vocab_size(Some(10))
            .init::<TestBackend>(&device)
            .unwrap();

        let batch = Batch::answer_scoring(
            array![[1, 2], [3, 4], [5, 6]],
            array![[7, 8, 9], [9, 8, 7]],
            &[8, 7],
        )
        .unwrap();
        let out = net.forward_loss(&batch, &device).unwrap();

        assert!(matches!(out.prediction, Prediction::Final(ref p) if p.dims() == [2, 3]));
        assert!(out.loss.into_scalar().is_finite());
    }

    #[test]
    fn test_out_of_vocabulary_id_rejected() {
        let device = Default::default();
        let net = NetworkConfig::new(4, 1, 4.into(), 2, TaskKind::AnswerScoring)
            .with_embed_size(4)
            .with_vocab_size(Some(5))
            .init::<TestBackend>(&device)
            .unwrap();

        let batch = Batch::answer_scoring(array![[1], [7]], array![[1, 2]], &[2]).unwrap();
        assert!(matches!(
            net.predict_boundaries(&batch, &device),
            Err(HmlstmError::Data(_))
        ));
    }
}
