//! Contiguous partition of a page's rows into batches

/// Splits records into order-preserving batches of at most `batch_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSplitter {
    batch_size: usize,
}

impl BatchSplitter {
    /// A zero batch size is treated as one
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Partitions `records`; only the last batch may be short
    pub fn split<T>(&self, records: Vec<T>) -> Vec<Vec<T>> {
        let mut batches = Vec::with_capacity(self.batch_count(records.len()));
        let mut rows = records.into_iter();
        loop {
            let batch: Vec<T> = rows.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batches.push(batch);
        }
        batches
    }

    /// `ceil(n / batch_size)`
    pub fn batch_count(&self, n: usize) -> usize {
        n.div_ceil(self.batch_size)
    }
}
