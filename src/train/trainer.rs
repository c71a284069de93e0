//! Training loop.
//!
//! `Uninitialized --initialize--> Ready --save--> Saved`, and training from
//! `Saved` goes back to `Ready`. One step is forward, loss, backward and one
//! Adam update on the autodiff backend; validation runs on the inner backend
//! through `model.valid()`.

use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::CheckpointStore;
use super::metrics::{argmax_matches, ValidationReport, ValidationTally};
use super::observer::{TracingObserver, TrainingObserver};
use crate::config::NetworkConfig;
use crate::data::{Batch, BatchSource};
use crate::error::{HmlstmError, Result};
use crate::network::{HmlstmNetwork, Prediction};
use crate::rnn::BoundaryTrace;

/// What to do when a step produces a non-finite loss. The update of that
/// step is never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergencePolicy {
    /// Stop and return [`HmlstmError::NumericalDivergence`].
    #[default]
    Abort,
    /// Skip the update and keep training.
    Continue,
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 3)]
    pub epochs: usize,
    /// Validate every this many steps (and always at epoch end).
    pub valid_interval: Option<usize>,
    /// Save a checkpoint every this many epochs.
    pub checkpoint_interval: Option<usize>,
    /// Where interval checkpoints go.
    pub checkpoint_path: Option<PathBuf>,
    /// Slope increase per epoch.
    pub slope_annealing_rate: Option<f64>,
    #[config(default = 5.0)]
    pub max_slope: f64,
    #[config(default = "DivergencePolicy::Abort")]
    pub divergence_policy: DivergencePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Uninitialized,
    Ready,
    Saved,
}

/// Where initial parameters come from.
#[derive(Debug, Clone)]
pub enum Init {
    Fresh,
    Resume(PathBuf),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingReport {
    /// Mean training loss of every epoch run, NaN for an epoch without
    /// applied steps.
    pub epoch_losses: Vec<f64>,
    pub steps: usize,
    /// Steps whose update was skipped because the loss was non-finite.
    pub skipped_steps: usize,
    pub validations: Vec<ValidationReport>,
    pub final_slope: f64,
}

impl TrainingReport {
    pub fn last_validation(&self) -> Option<&ValidationReport> {
        self.validations.last()
    }
}

pub struct Trainer<B: AutodiffBackend, O: TrainingObserver = TracingObserver> {
    network_config: NetworkConfig,
    config: TrainingConfig,
    device: B::Device,
    model: Option<HmlstmNetwork<B>>,
    phase: TrainerPhase,
    store: CheckpointStore,
    observer: O,
    epochs_done: usize,
    steps_done: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(network_config: NetworkConfig, config: TrainingConfig, device: B::Device) -> Self {
        Self::with_observer(network_config, config, device, TracingObserver)
    }
}

impl<B: AutodiffBackend, O: TrainingObserver> Trainer<B, O> {
    pub fn with_observer(
        network_config: NetworkConfig,
        config: TrainingConfig,
        device: B::Device,
        observer: O,
    ) -> Self {
        Self {
            network_config,
            config,
            device,
            model: None,
            phase: TrainerPhase::Uninitialized,
            store: CheckpointStore::new(),
            observer,
            epochs_done: 0,
            steps_done: 0,
        }
    }

    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = store;
        self
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn model(&self) -> Result<&HmlstmNetwork<B>> {
        self.model
            .as_ref()
            .ok_or_else(|| HmlstmError::config("trainer is not initialized"))
    }

    /// Build fresh parameters or restore them from a checkpoint.
    pub fn initialize(&mut self, init: Init) -> Result<()> {
        let model = match init {
            Init::Fresh => self.network_config.init::<B>(&self.device)?,
            Init::Resume(path) => {
                let (config, model) = self.store.load::<B>(&path, &self.device)?;
                info!(path = %path.display(), slope = config.slope, "resumed from checkpoint");
                self.network_config = config;
                model
            }
        };

        self.model = Some(model);
        self.phase = TrainerPhase::Ready;
        self.epochs_done = 0;
        self.steps_done = 0;
        Ok(())
    }

    /// Run `epochs` epochs over `train`, validating on `valid` when given.
    pub fn train(
        &mut self,
        train: &mut dyn BatchSource,
        mut valid: Option<&mut dyn BatchSource>,
    ) -> Result<TrainingReport> {
        self.model()?;
        let checkpoint_path = match (self.config.checkpoint_interval, &self.config.checkpoint_path) {
            (Some(0), _) => return Err(HmlstmError::config("checkpoint interval must be positive")),
            (Some(_), None) => {
                return Err(HmlstmError::config("checkpoint interval set without a checkpoint path"))
            }
            (_, path) => path.clone(),
        };
        if self.config.valid_interval == Some(0) {
            return Err(HmlstmError::config("validation interval must be positive"));
        }
        self.phase = TrainerPhase::Ready;

        let mut optim = AdamConfig::new().init();
        let learning_rate = self.network_config.learning_rate;
        let initial_slope = self.network_config.slope;
        let mut report = TrainingReport::default();

        for _ in 0..self.config.epochs {
            let epoch = self.epochs_done;

            if let Some(rate) = self.config.slope_annealing_rate {
                let slope = (initial_slope + rate * epoch as f64).min(self.config.max_slope);
                if let Some(model) = self.model.as_mut() {
                    model.set_slope(slope);
                }
            }
            self.observer.on_epoch_start(epoch, self.model()?.slope());

            train.reset()?;
            let mut loss_sum = 0.0;
            let mut applied = 0usize;

            while let Some(batch) = train.next_batch()? {
                let step = self.steps_done;
                self.steps_done += 1;
                report.steps += 1;

                let output = self.model()?.forward_loss(&batch, &self.device)?;
                let loss: f64 = output.loss.clone().into_scalar().elem::<f64>();

                if loss.is_finite() {
                    let grads = output.loss.backward();
                    let model = self
                        .model
                        .take()
                        .ok_or_else(|| HmlstmError::config("trainer is not initialized"))?;
                    let grads = GradientsParams::from_grads(grads, &model);
                    self.model = Some(optim.step(learning_rate, model, grads));

                    loss_sum += loss;
                    applied += 1;
                    self.observer.on_step(epoch, step, loss);
                } else {
                    let policy = self.config.divergence_policy;
                    self.observer.on_divergence(epoch, step, loss, policy);
                    if policy == DivergencePolicy::Abort {
                        return Err(HmlstmError::NumericalDivergence { epoch, step, loss });
                    }
                    report.skipped_steps += 1;
                }

                // Counted in steps taken, applied or skipped.
                if let (Some(interval), Some(source)) = (self.config.valid_interval, valid.as_deref_mut()) {
                    if (step + 1) % interval == 0 {
                        let validation = self.validate_on(source, epoch, step + 1)?;
                        report.validations.push(validation);
                    }
                }
            }

            let mean_loss = if applied > 0 {
                loss_sum / applied as f64
            } else {
                f64::NAN
            };
            self.observer.on_epoch_end(epoch, mean_loss);
            report.epoch_losses.push(mean_loss);

            if let Some(source) = valid.as_deref_mut() {
                let validation = self.validate_on(source, epoch, self.steps_done)?;
                report.validations.push(validation);
            }

            self.epochs_done += 1;

            if let (Some(interval), Some(path)) = (self.config.checkpoint_interval, &checkpoint_path) {
                if self.epochs_done % interval == 0 {
                    self.store.save(path, self.model()?, &self.network_config)?;
                    self.observer.on_checkpoint(epoch, path);
                }
            }
        }

        report.final_slope = self.model()?.slope();
        Ok(report)
    }

    /// Forward-only pass over a whole source.
    pub fn validate(&mut self, source: &mut dyn BatchSource) -> Result<ValidationReport> {
        let (epoch, step) = (self.epochs_done, self.steps_done);
        self.validate_on(source, epoch, step)
    }

    fn validate_on(
        &mut self,
        source: &mut dyn BatchSource,
        epoch: usize,
        step: usize,
    ) -> Result<ValidationReport> {
        let model = self.model()?.valid();
        let categorical = self.network_config.task.is_categorical();
        let mut tally = ValidationTally::default();

        source.reset()?;
        while let Some(batch) = source.next_batch()? {
            let output = model.forward_loss(&batch, &self.device)?;
            tally.add_loss(output.loss.into_scalar().elem::<f64>());

            if categorical {
                let prediction = output.prediction.flatten();
                let [rows, _] = prediction.dims();
                let correct = argmax_matches(prediction, batch.target_tensor(&self.device));
                tally.add_rows(correct, rows);
            }
        }

        let report = tally.finish(epoch, step, categorical);
        self.observer.on_validation(&report);
        Ok(report)
    }

    /// Predictions of the current parameters, without gradients.
    pub fn predict(&self, batch: &Batch) -> Result<Prediction<B::InnerBackend>> {
        self.model()?.valid().predict(batch, &self.device)
    }

    pub fn predict_boundaries(&self, batch: &Batch) -> Result<BoundaryTrace> {
        self.model()?.valid().predict_boundaries(batch, &self.device)
    }

    /// Persist parameters and config; the trainer becomes `Saved`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.store.save(path, self.model()?, &self.network_config)?;
        self.phase = TrainerPhase::Saved;
        self.observer.on_checkpoint(self.epochs_done, path);
        Ok(())
    }

    /// Hand out the trained network.
    pub fn into_model(self) -> Result<HmlstmNetwork<B>> {
        self.model
            .ok_or_else(|| HmlstmError::config("trainer is not initialized"))
    }
}
