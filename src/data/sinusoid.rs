//! Synthetic two-frequency sinusoid regression.
//!
//! Each signal is
//!
//! ```text
//! s(x) = N(0, noise_std) + 2 sin(0.6 x + 10 r1) + 5 sin(0.1 x + 10 r2),   x ∈ linspace(0, 50π, signal_length)
//! ```
//!
//! with fresh `r1, r2 ~ U[0, 1)` per signal. The network sees `s[t]` and is
//! asked for `s[t + steps_ahead]` at every step.

use burn::config::Config;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::batch::Batch;
use super::source::BatchSource;
use crate::error::{HmlstmError, Result};

#[derive(Config, Debug)]
pub struct SinusoidConfig {
    #[config(default = 300)]
    pub num_signals: usize,
    #[config(default = 400)]
    pub signal_length: usize,
    #[config(default = 10)]
    pub batch_size: usize,
    #[config(default = 3)]
    pub steps_ahead: usize,
    #[config(default = 0.5)]
    pub noise_std: f64,
    #[config(default = 42)]
    pub seed: u64,
}

impl SinusoidConfig {
    pub fn init(&self) -> Result<SinusoidSource> {
        SinusoidSource::new(self)
    }
}

/// Pre-generated sinusoid batches, `[time, batch, 1]` input and per-step
/// targets. The final batch may be smaller than `batch_size`.
#[derive(Debug, Clone)]
pub struct SinusoidSource {
    batches: Vec<Batch>,
    cursor: usize,
}

impl SinusoidSource {
    pub fn new(config: &SinusoidConfig) -> Result<Self> {
        if config.batch_size == 0 || config.num_signals == 0 {
            return Err(HmlstmError::config("sinusoid source needs signals and a batch size"));
        }
        if config.signal_length <= config.steps_ahead {
            return Err(HmlstmError::config(format!(
                "signal length {} leaves nothing to predict {} steps ahead",
                config.signal_length, config.steps_ahead
            )));
        }
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| HmlstmError::config(format!("noise distribution: {e}")))?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let signals: Vec<Vec<f32>> = (0..config.num_signals)
            .map(|_| generate_signal(config.signal_length, &noise, &mut rng))
            .collect();

        let timesteps = config.signal_length - config.steps_ahead;
        let batches = signals
            .chunks(config.batch_size)
            .map(|chunk| {
                let input = Array3::from_shape_fn((timesteps, chunk.len(), 1), |(t, b, _)| {
                    chunk[b][t]
                });
                let target = Array3::from_shape_fn((timesteps, chunk.len(), 1), |(t, b, _)| {
                    chunk[b][t + config.steps_ahead]
                });
                Batch::dense_per_step(input, target)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { batches, cursor: 0 })
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    /// Split off the last `count` batches, e.g. as a validation set.
    pub fn split_off(&mut self, count: usize) -> Self {
        let at = self.batches.len().saturating_sub(count);
        let tail = self.batches.split_off(at);
        self.cursor = self.cursor.min(self.batches.len());
        Self {
            batches: tail,
            cursor: 0,
        }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }
}

impl BatchSource for SinusoidSource {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let batch = self.batches.get(self.cursor).cloned();
        if batch.is_some() {
            self.cursor += 1;
        }
        Ok(batch)
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

fn generate_signal(length: usize, noise: &Normal<f64>, rng: &mut StdRng) -> Vec<f32> {
    let fast_phase = rng.gen::<f64>() * 10.0;
    let slow_phase = rng.gen::<f64>() * 10.0;
    let span = 50.0 * std::f64::consts::PI;
    let step = if length > 1 { span / (length - 1) as f64 } else { 0.0 };

    (0..length)
        .map(|i| {
            let x = i as f64 * step;
            let value = noise.sample(rng)
                + 2.0 * (0.6 * x + fast_phase).sin()
                + 5.0 * (0.1 * x + slow_phase).sin();
            value as f32
        })
        .collect()
}
