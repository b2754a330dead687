//! Bounded rolling signal buffers

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ordered FIFO window over one signal.
///
/// Holds at most `capacity` samples; appending past capacity drops the oldest
/// samples first. An unbounded buffer (`capacity == None`) only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBuffer<T> {
    values: VecDeque<T>,
    capacity: Option<usize>,
}

impl<T> SignalBuffer<T> {
    /// Create a buffer holding at most `capacity` samples
    pub fn bounded(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Create a buffer that never trims
    pub fn unbounded() -> Self {
        Self {
            values: VecDeque::new(),
            capacity: None,
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::unbounded(),
        }
    }

    /// Append one sample, trimming from the front if over capacity
    pub fn push(&mut self, value: T) {
        self.values.push_back(value);
        self.trim();
    }

    /// Append samples in order, trimming from the front if over capacity
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        self.values.extend(values);
        self.trim();
    }

    fn trim(&mut self) {
        if let Some(capacity) = self.capacity {
            while self.values.len() > capacity {
                self.values.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<T: Clone> SignalBuffer<T> {
    /// Copy of the samples from oldest to newest
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}
