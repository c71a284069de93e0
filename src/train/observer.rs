use std::path::Path;

use tracing::{debug, info, warn};

use super::metrics::ValidationReport;
use super::trainer::DivergencePolicy;

/// Training progress hooks. Every method defaults to doing nothing.
pub trait TrainingObserver {
    fn on_epoch_start(&mut self, _epoch: usize, _slope: f64) {}

    fn on_step(&mut self, _epoch: usize, _step: usize, _loss: f64) {}

    fn on_epoch_end(&mut self, _epoch: usize, _mean_loss: f64) {}

    fn on_validation(&mut self, _report: &ValidationReport) {}

    fn on_divergence(&mut self, _epoch: usize, _step: usize, _loss: f64, _policy: DivergencePolicy) {
    }

    fn on_checkpoint(&mut self, _epoch: usize, _path: &Path) {}
}

/// Emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TrainingObserver for TracingObserver {
    fn on_epoch_start(&mut self, epoch: usize, slope: f64) {
        info!(epoch, slope, "epoch started");
    }

    fn on_step(&mut self, epoch: usize, step: usize, loss: f64) {
        debug!(epoch, step, loss, "step");
    }

    fn on_epoch_end(&mut self, epoch: usize, mean_loss: f64) {
        info!(epoch, mean_loss, "epoch finished");
    }

    fn on_validation(&mut self, report: &ValidationReport) {
        match report.accuracy {
            Some(accuracy) => info!(
                epoch = report.epoch,
                step = report.step,
                loss = report.loss,
                accuracy,
                "validation"
            ),
            None => info!(
                epoch = report.epoch,
                step = report.step,
                loss = report.loss,
                "validation"
            ),
        }
    }

    fn on_divergence(&mut self, epoch: usize, step: usize, loss: f64, policy: DivergencePolicy) {
        warn!(epoch, step, loss, ?policy, "non-finite loss");
    }

    fn on_checkpoint(&mut self, epoch: usize, path: &Path) {
        info!(epoch, path = %path.display(), "checkpoint saved");
    }
}

impl<O: TrainingObserver + ?Sized> TrainingObserver for &mut O {
    fn on_epoch_start(&mut self, epoch: usize, slope: f64) {
        (**self).on_epoch_start(epoch, slope);
    }

    fn on_step(&mut self, epoch: usize, step: usize, loss: f64) {
        (**self).on_step(epoch, step, loss);
    }

    fn on_epoch_end(&mut self, epoch: usize, mean_loss: f64) {
        (**self).on_epoch_end(epoch, mean_loss);
    }

    fn on_validation(&mut self, report: &ValidationReport) {
        (**self).on_validation(report);
    }

    fn on_divergence(&mut self, epoch: usize, step: usize, loss: f64, policy: DivergencePolicy) {
        (**self).on_divergence(epoch, step, loss, policy);
    }

    fn on_checkpoint(&mut self, epoch: usize, path: &Path) {
        (**self).on_checkpoint(epoch, path);
    }
}
