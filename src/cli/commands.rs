use std::path::PathBuf;

use clap::{Args, Subcommand};
use hmlstm::config::{NetworkConfig, TaskKind};
use hmlstm::data::SinusoidConfig;
use hmlstm::train::TrainingConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a regression network on synthetic noisy sinusoids
    Sinusoid(SinusoidArgs),

    /// Print the boundary trace of a checkpoint on a fresh sinusoid
    Boundaries(BoundariesArgs),

    /// Write a default network config as JSON
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
pub struct SinusoidArgs {
    /// Network config JSON; the flags below build one when absent
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Hidden width of every layer
    #[arg(long, default_value_t = 30)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 50)]
    pub embed_size: usize,

    #[arg(long, default_value_t = 30)]
    pub out_hidden_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Increase the boundary slope by this much every epoch
    #[arg(long)]
    pub slope_annealing_rate: Option<f64>,

    #[arg(long, default_value_t = 300)]
    pub num_signals: usize,

    #[arg(long, default_value_t = 400)]
    pub signal_length: usize,

    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// How far ahead every step predicts
    #[arg(long, default_value_t = 3)]
    pub steps_ahead: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Batches held out for validation
    #[arg(long, default_value_t = 1)]
    pub valid_batches: usize,

    /// Save the trained network here
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Characters per printed boundary row
    #[arg(long, default_value_t = 100)]
    pub row_len: usize,
}

impl SinusoidArgs {
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig::new(
            1,
            self.num_layers,
            self.hidden_size.into(),
            1,
            TaskKind::Regression,
        )
        .with_embed_size(self.embed_size)
        .with_out_hidden_size(self.out_hidden_size)
        .with_learning_rate(self.learning_rate)
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new()
            .with_epochs(self.epochs)
            .with_slope_annealing_rate(self.slope_annealing_rate)
    }

    pub fn sinusoid_config(&self) -> SinusoidConfig {
        SinusoidConfig::new()
            .with_num_signals(self.num_signals)
            .with_signal_length(self.signal_length)
            .with_batch_size(self.batch_size)
            .with_steps_ahead(self.steps_ahead)
            .with_seed(self.seed)
    }
}

#[derive(Args, Debug)]
pub struct BoundariesArgs {
    #[arg(long)]
    pub checkpoint: PathBuf,

    #[arg(long, default_value_t = 400)]
    pub signal_length: usize,

    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    #[arg(long, default_value_t = 100)]
    pub row_len: usize,
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    #[arg(long)]
    pub out: PathBuf,

    /// regression, classification or answer_scoring
    #[arg(long, default_value = "regression")]
    pub task: TaskKind,

    #[arg(long, default_value_t = 1)]
    pub input_size: usize,

    #[arg(long, default_value_t = 3)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 100)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 1)]
    pub output_size: usize,

    #[arg(long)]
    pub vocab_size: Option<usize>,
}

impl From<&InitConfigArgs> for NetworkConfig {
    fn from(a: &InitConfigArgs) -> Self {
        NetworkConfig::new(
            a.input_size,
            a.num_layers,
            a.hidden_size.into(),
            a.output_size,
            a.task,
        )
        .with_vocab_size(a.vocab_size)
    }
}
