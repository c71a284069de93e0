//! Boundary indicators collected over one unroll.

use ndarray::{Array3, ArrayView1, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{HmlstmError, Result};

/// Per-layer, per-timestep boundary values of a batch, shaped `[batch, layers, time]`.
///
/// The driver hands this out by value; it is never aliased by the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryTrace {
    values: Array3<f32>,
}

/// Precision/recall of predicted boundaries against a gold 0/1 sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of gold boundaries in the scored span.
    pub support: usize,
}

impl BoundaryTrace {
    /// Wrap an existing `[batch, layers, time]` array.
    pub fn new(values: Array3<f32>) -> Self {
        Self { values }
    }

    /// Trace with no timesteps.
    pub fn empty(batch_size: usize, num_layers: usize) -> Self {
        Self {
            values: Array3::zeros((batch_size, num_layers, 0)),
        }
    }

    /// Build from timestep-major values `[time][batch][layer]` flattened.
    pub(crate) fn from_time_major(
        flat: Vec<f32>,
        timesteps: usize,
        batch_size: usize,
        num_layers: usize,
    ) -> Self {
        let time_major = Array3::from_shape_vec((timesteps, batch_size, num_layers), flat)
            .expect("boundary buffer length matches [time, batch, layers]");
        let values = time_major.permuted_axes([1, 2, 0]).as_standard_layout().to_owned();
        Self { values }
    }

    pub fn batch_size(&self) -> usize {
        self.values.dim().0
    }

    pub fn num_layers(&self) -> usize {
        self.values.dim().1
    }

    /// Number of timesteps.
    pub fn len(&self) -> usize {
        self.values.dim().2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, batch: usize, layer: usize, t: usize) -> Option<f32> {
        self.values.get((batch, layer, t)).copied()
    }

    /// Boundaries of one layer of one batch element across time.
    pub fn layer(&self, batch: usize, layer: usize) -> ArrayView1<'_, f32> {
        self.values.index_axis(Axis(0), batch).index_axis_move(Axis(0), layer)
    }

    pub fn as_array(&self) -> ArrayView3<'_, f32> {
        self.values.view()
    }

    pub fn into_array(self) -> Array3<f32> {
        self.values
    }

    /// Every value is exactly 0.0 or 1.0.
    pub fn is_binary(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0 || v == 1.0)
    }

    /// Fraction of (batch, timestep) positions where `layer` fired.
    pub fn boundary_rate(&self, layer: usize) -> f64 {
        if self.is_empty() || self.batch_size() == 0 {
            return 0.0;
        }
        let fired = self
            .values
            .index_axis(Axis(1), layer)
            .iter()
            .filter(|&&v| v >= 0.5)
            .count();
        fired as f64 / (self.batch_size() * self.len()) as f64
    }

    /// Text rendering of one batch element: one line of 0/1 per layer,
    /// top layer first, wrapped every `row_len` timesteps.
    pub fn render(&self, batch: usize, row_len: usize) -> String {
        let row_len = row_len.max(1);
        let rows: Vec<String> = (0..self.num_layers())
            .rev()
            .map(|l| {
                self.layer(batch, l)
                    .iter()
                    .map(|&v| if v >= 0.5 { '1' } else { '0' })
                    .collect()
            })
            .collect();

        let mut out = String::new();
        let mut start = 0;
        while start < self.len() {
            let end = (start + row_len).min(self.len());
            for row in &rows {
                out.push_str(&row[start..end]);
                out.push('\n');
            }
            out.push('\n');
            start = end;
        }
        out
    }

    /// Score positive boundaries of `layer` (batch element 0) against `gold`.
    ///
    /// Only the first `len()` gold positions are used; a trace longer than
    /// the gold sequence is an error.
    pub fn score_against(&self, layer: usize, gold: &[u8]) -> Result<BoundaryScore> {
        if self.len() > gold.len() {
            return Err(HmlstmError::data(format!(
                "{} predicted boundaries but only {} gold labels",
                self.len(),
                gold.len()
            )));
        }
        if layer >= self.num_layers() || self.batch_size() == 0 {
            return Err(HmlstmError::data(format!(
                "no layer {layer} in a trace of {} layers",
                self.num_layers()
            )));
        }

        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (&p, &g) in self.layer(0, layer).iter().zip(gold) {
            match (p >= 0.5, g == 1) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Ok(BoundaryScore {
            precision,
            recall,
            f1,
            support: tp + fn_,
        })
    }
}
