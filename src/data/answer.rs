use ndarray::{Array2, ArrayView2};

use crate::error::{HmlstmError, Result};

/// One-hot answer targets built by exact id match.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerTargets {
    /// `[batch, num_candidates]`, one 1.0 per valid row.
    pub distribution: Array2<f32>,
    /// Rows whose answer id does not appear among the candidates; these rows
    /// are all zero.
    pub missing: Vec<usize>,
}

impl AnswerTargets {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }

    /// The distribution, or an error naming every row without its answer.
    pub fn into_checked(self) -> Result<Array2<f32>> {
        if self.missing.is_empty() {
            Ok(self.distribution)
        } else {
            Err(HmlstmError::AnswerNotInCandidates { rows: self.missing })
        }
    }
}

/// Mark, for every row, the first candidate equal to that row's answer.
///
/// `candidates = [cat, dog, turtle, rhino]`, `answer = dog` → `[0, 1, 0, 0]`.
pub fn answer_distribution(candidates: ArrayView2<'_, i64>, answers: &[i64]) -> Result<AnswerTargets> {
    let (batch_size, num_candidates) = candidates.dim();
    if answers.len() != batch_size {
        return Err(HmlstmError::data(format!(
            "{} answers for {batch_size} candidate rows",
            answers.len()
        )));
    }

    let mut distribution = Array2::zeros((batch_size, num_candidates));
    let mut missing = Vec::new();
    for (row, (cands, &answer)) in candidates.outer_iter().zip(answers).enumerate() {
        match cands.iter().position(|&c| c == answer) {
            Some(col) => distribution[[row, col]] = 1.0,
            None => missing.push(row),
        }
    }

    Ok(AnswerTargets {
        distribution,
        missing,
    })
}
