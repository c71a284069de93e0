use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Gated compression of all layers' hidden states into one embedding.
///
/// - g_l = σ(w_l · [h_0; …; h_{L-1}])      one scalar gate per layer
/// - e   = relu(W_e · [g_0 h_0; …; g_{L-1} h_{L-1}])
///
/// Every gate sees the full concatenation, so layers compete for relevance.
#[derive(Module, Debug)]
pub struct GateEmbed<B: Backend> {
    gates: Vec<Linear<B>>, // sum(hidden_sizes) -> 1 each, no bias
    embed: Linear<B>,      // sum(hidden_sizes) -> embed_size, no bias
    #[module(skip)]
    hidden_sizes: Vec<usize>,
    #[module(skip)]
    embed_size: usize,
}

impl<B: Backend> GateEmbed<B> {
    pub fn new(hidden_sizes: &[usize], embed_size: usize, device: &B::Device) -> Self {
        let total: usize = hidden_sizes.iter().sum();
        let gates = hidden_sizes
            .iter()
            .map(|_| LinearConfig::new(total, 1).with_bias(false).init(device))
            .collect();
        let embed = LinearConfig::new(total, embed_size)
            .with_bias(false)
            .init(device);

        Self {
            gates,
            embed,
            hidden_sizes: hidden_sizes.to_vec(),
            embed_size,
        }
    }

    pub fn embed_size(&self) -> usize {
        self.embed_size
    }

    pub fn hidden_sizes(&self) -> &[usize] {
        &self.hidden_sizes
    }

    /// Per-layer gate values `[batch, layers]`.
    pub fn gate_values(&self, hidden: &[Tensor<B, 2>]) -> Tensor<B, 2> {
        let all = Tensor::cat(hidden.to_vec(), 1);
        let gates = self
            .gates
            .iter()
            .map(|gate| activation::sigmoid(gate.forward(all.clone())))
            .collect();
        Tensor::cat(gates, 1)
    }

    /// # Arguments
    /// * `hidden` - one `[batch, h_l]` tensor per layer, bottom first
    ///
    /// # Returns
    /// `[batch, embed_size]`
    pub fn forward(&self, hidden: &[Tensor<B, 2>]) -> Tensor<B, 2> {
        assert_eq!(hidden.len(), self.gates.len(), "expected one hidden state per layer");
        let all = Tensor::cat(hidden.to_vec(), 1);

        let gated = self
            .gates
            .iter()
            .zip(hidden)
            .map(|(gate, h)| {
                let g = activation::sigmoid(gate.forward(all.clone())); // [batch, 1]
                g.expand(h.dims()) * h.clone()
            })
            .collect();

        activation::relu(self.embed.forward(Tensor::cat(gated, 1)))
    }
}
