use std::collections::VecDeque;

use crate::strategy::Accumulation;

/// Bounded FIFO history of probability vectors, oldest first.
///
/// Owned by the accumulator; nothing outside it gets mutable access to the
/// stored vectors.
#[derive(Clone, Debug)]
pub struct EvidenceBuffer {
    items: VecDeque<Vec<f64>>,
    capacity: usize,
}

impl EvidenceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        EvidenceBuffer {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a vector, evicting the oldest one once the buffer is over capacity.
    pub fn push(&mut self, v: Vec<f64>) {
        self.items.push_back(v);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Change the hard cap. Lowering it evicts the oldest entries right away.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.items.iter().map(Vec::as_slice)
    }

    /// Fold the whole buffer (not normalized).
    pub fn fold(&self, method: Accumulation) -> Vec<f64> {
        method.fold(self.iter())
    }
}
