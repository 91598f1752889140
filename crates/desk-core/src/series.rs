//! Bounded time-series buffer for streamed samples.
//!
//! `BoundedSeries` caps memory for live data: once capacity is exceeded
//! the oldest item is evicted (FIFO). `push` has by-value semantics and
//! returns a new series, so a snapshot handed to a consumer is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single price sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Wall-clock time the sample was observed.
    pub timestamp: DateTime<Utc>,
    /// Observed price.
    pub value: f64,
}

impl PricePoint {
    /// Create a price point stamped with the current wall-clock time.
    pub fn now(value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            value,
        }
    }

    /// Create a price point with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Fixed-capacity, insertion-ordered buffer.
///
/// Invariant: `len() <= capacity()` after every push; iteration order is
/// arrival order. Deduplication rules belong to the caller, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedSeries<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedSeries<T> {
    /// Create an empty series with the given capacity.
    ///
    /// A zero capacity is clamped to one so that a push always retains
    /// at least the newest item.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append an item, returning the resulting series.
    ///
    /// Evicts from the front until the capacity bound holds again.
    #[must_use]
    pub fn push(&self, item: T) -> Self {
        let mut next = self.clone();
        next.items.push_back(item);
        while next.items.len() > next.capacity {
            next.items.pop_front();
        }
        next
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the series holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Construction-time capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended item.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Copy out the items in arrival order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
