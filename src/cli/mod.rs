//! Command line driver. Routes subcommands to the library and prints results.

pub mod commands;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use commands::{BoundariesArgs, Commands, InitConfigArgs, SinusoidArgs};
use hmlstm::config::NetworkConfig;
use hmlstm::data::{BatchSource, SinusoidConfig};
use hmlstm::train::{CheckpointStore, Init, Trainer};

type TrainBackend = Autodiff<NdArray<f32>>;
type InferBackend = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(
    name = "hmlstm",
    version,
    about = "Hierarchical multiscale LSTM: train, checkpoint and inspect boundary traces."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Sinusoid(args) => run_sinusoid(args),
            Commands::Boundaries(args) => run_boundaries(args),
            Commands::InitConfig(args) => run_init_config(args),
        }
    }
}

fn run_sinusoid(args: SinusoidArgs) -> Result<()> {
    let network_config = match &args.config {
        Some(path) => load_network_config(path)?,
        None => args.network_config(),
    };
    network_config.validate()?;

    let mut train_source = args.sinusoid_config().init()?;
    let mut valid_source = train_source.split_off(args.valid_batches);
    tracing::info!(
        train_batches = train_source.num_batches(),
        valid_batches = valid_source.num_batches(),
        "generated sinusoids"
    );

    let device = Default::default();
    let mut trainer = Trainer::<TrainBackend>::new(network_config, args.training_config(), device);
    trainer.initialize(Init::Fresh)?;

    let valid = (valid_source.num_batches() > 0).then_some(&mut valid_source as &mut dyn BatchSource);
    let report = trainer.train(&mut train_source, valid)?;
    for (epoch, loss) in report.epoch_losses.iter().enumerate() {
        println!("epoch {epoch}: train loss {loss:.4}");
    }
    if let Some(validation) = report.last_validation() {
        println!("validation loss {:.4}", validation.loss);
    }

    if let Some(path) = &args.save {
        trainer.save(path)?;
        println!("saved checkpoint to {}", path.display());
    }

    valid_source.reset()?;
    if let Some(batch) = valid_source.next_batch()? {
        let boundaries = trainer.predict_boundaries(&batch)?;
        println!("{}", boundaries.render(0, args.row_len));
    }
    Ok(())
}

fn run_boundaries(args: BoundariesArgs) -> Result<()> {
    let device = Default::default();
    let (config, network) = CheckpointStore::new()
        .load::<InferBackend>(&args.checkpoint, &device)
        .with_context(|| format!("cannot load checkpoint '{}'", args.checkpoint.display()))?;
    tracing::info!(layers = config.num_layers, slope = network.slope(), "checkpoint loaded");

    let mut source = SinusoidConfig::new()
        .with_num_signals(1)
        .with_batch_size(1)
        .with_signal_length(args.signal_length)
        .with_seed(args.seed)
        .init()?;
    let batch = source
        .next_batch()?
        .context("sinusoid source produced no batch")?;

    let boundaries = network.predict_boundaries(&batch, &device)?;
    println!("{}", boundaries.render(0, args.row_len));
    for layer in 0..boundaries.num_layers() {
        println!("layer {layer}: boundary rate {:.3}", boundaries.boundary_rate(layer));
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let config = NetworkConfig::from(&args);
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(&args.out, json)
        .with_context(|| format!("cannot write config to '{}'", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn load_network_config(path: &Path) -> Result<NetworkConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("cannot read config from '{}'", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}
