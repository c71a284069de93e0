//! Basic usage of the HM-LSTM sequence layer
//!
//! Unrolls a three-layer stack over random input and prints the boundary
//! trace it produced.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use hmlstm::rnn::Hmlstm;

fn main() -> hmlstm::error::Result<()> {
    println!("=== HM-LSTM Basic Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    // Example 1: sequence-first input
    println!("Example 1: Sequence-first input");
    let layer = Hmlstm::<Backend>::new(8, &[32, 24, 16], &device)?.with_slope(2.0);

    // Input shape: [seq=20, batch=2, features=8]
    let input = Tensor::<Backend, 3>::random([20, 2, 8], Distribution::Uniform(-1.0, 1.0), &device);
    let output = layer.forward(input, None);

    println!("  Layers: {}", layer.num_layers());
    println!("  Final hidden concat: {:?}", output.final_hidden_concat().dims());
    for l in 0..layer.num_layers() {
        println!("  Layer {l} boundary rate: {:.2}", output.boundaries.boundary_rate(l));
    }
    println!();
    println!("{}", output.boundaries.render(0, 20));

    // Example 2: batch-first input with per-step history
    println!("Example 2: Batch-first input, history kept");
    let layer = Hmlstm::<Backend>::new(8, &[16, 16], &device)?
        .with_batch_first(true)
        .with_return_sequences(true);

    // Input shape: [batch=4, seq=10, features=8]
    let input = Tensor::<Backend, 3>::random([4, 10, 8], Distribution::Uniform(-1.0, 1.0), &device);
    let output = layer.forward(input, None);

    println!("  Steps kept: {}", output.history.len());
    println!("  Boundaries [batch, layers, time]: {:?}", output.boundaries.as_array().dim());
    Ok(())
}
