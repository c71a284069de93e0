//! Save and load a network through a checkpoint
//!
//! The checkpoint file carries both the parameters and the config, so a
//! network can be rebuilt from the path alone.

use burn::backend::NdArray;
use hmlstm::config::{NetworkConfig, TaskKind};
use hmlstm::data::Batch;
use hmlstm::train::CheckpointStore;
use ndarray::{Array2, Array3};

fn main() -> anyhow::Result<()> {
    println!("=== Checkpoint Save/Load Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    let config = NetworkConfig::new(1, 2, vec![16, 8].into(), 1, TaskKind::Regression)
        .with_embed_size(16)
        .with_out_hidden_size(16)
        .with_slope(1.5);
    let network = config.init::<Backend>(&device)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hmlstm.mpk");
    let store = CheckpointStore::new();
    store.save(&path, &network, &config)?;
    println!("Saved to {}", path.display());

    let (restored_config, restored) = store.load::<Backend>(&path, &device)?;
    println!("  Layers: {}", restored_config.num_layers);
    println!("  Slope:  {}", restored.slope());

    let input = Array3::from_shape_fn((12, 1, 1), |(t, _, _)| (t as f32 * 0.5).sin());
    let batch = Batch::dense(input, Array2::zeros((1, 1)))?;
    let before = network.predict_boundaries(&batch, &device)?;
    let after = restored.predict_boundaries(&batch, &device)?;
    println!("  Same boundaries after reload: {}", before == after);
    Ok(())
}
