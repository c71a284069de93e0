use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use serde::Serialize;

/// Forward-only evaluation over a validation source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub epoch: usize,
    pub step: usize,
    /// Mean batch loss.
    pub loss: f64,
    /// Fraction of rows whose argmax matches the target argmax. `None` for
    /// regression.
    pub accuracy: Option<f64>,
    pub batches: usize,
}

/// Running sums behind a [`ValidationReport`].
#[derive(Debug, Default)]
pub(crate) struct ValidationTally {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    rows: usize,
}

impl ValidationTally {
    pub fn add_loss(&mut self, loss: f64) {
        self.loss_sum += loss;
        self.batches += 1;
    }

    pub fn add_rows(&mut self, correct: usize, rows: usize) {
        self.correct += correct;
        self.rows += rows;
    }

    pub fn finish(self, epoch: usize, step: usize, categorical: bool) -> ValidationReport {
        let loss = if self.batches > 0 {
            self.loss_sum / self.batches as f64
        } else {
            f64::NAN
        };
        let accuracy = categorical.then(|| {
            if self.rows > 0 {
                self.correct as f64 / self.rows as f64
            } else {
                0.0
            }
        });
        ValidationReport {
            epoch,
            step,
            loss,
            accuracy,
            batches: self.batches,
        }
    }
}

/// Count rows of two `[rows, width]` tensors whose argmax agree.
pub fn argmax_matches<B: Backend>(prediction: Tensor<B, 2>, target: Tensor<B, 2>) -> usize {
    let correct: i64 = prediction
        .argmax(1)
        .equal(target.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_argmax_matches() {
        let device = Default::default();
        let prediction = Tensor::<NdArray<f32>, 2>::from_floats(
            [[0.1, 0.9, 0.0], [2.0, 1.0, 0.0], [0.0, 0.2, 0.7]],
            &device,
        );
        let target = Tensor::<NdArray<f32>, 2>::from_floats(
            [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            &device,
        );
        assert_eq!(argmax_matches(prediction, target), 2);
    }

    #[test]
    fn test_tally_report() {
        let mut tally = ValidationTally::default();
        tally.add_loss(1.0);
        tally.add_loss(3.0);
        tally.add_rows(3, 4);

        let report = tally.finish(1, 10, true);
        assert_eq!(report.loss, 2.0);
        assert_eq!(report.accuracy, Some(0.75));
        assert_eq!(report.batches, 2);

        let report = ValidationTally::default().finish(0, 0, false);
        assert!(report.loss.is_nan());
        assert_eq!(report.accuracy, None);
    }
}
