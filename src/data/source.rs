use super::batch::Batch;
use crate::error::Result;

/// A restartable stream of batches.
///
/// `Ok(None)` marks the end of an epoch; `Err` is a data error. The trainer
/// calls [`reset`](BatchSource::reset) before every epoch.
pub trait BatchSource {
    fn next_batch(&mut self) -> Result<Option<Batch>>;

    fn reset(&mut self) -> Result<()>;
}

/// In-memory batches replayed in order.
#[derive(Debug, Clone, Default)]
pub struct VecBatchSource {
    batches: Vec<Batch>,
    cursor: usize,
}

impl VecBatchSource {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }
}

impl From<Vec<Batch>> for VecBatchSource {
    fn from(batches: Vec<Batch>) -> Self {
        Self::new(batches)
    }
}

impl BatchSource for VecBatchSource {
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
