//! Bounded newest-first cache of accepted raw pitches.

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// PitchHistory
// ---------------------------------------------------------------------------

/// Fixed-capacity history, newest entry first.
///
/// Pushing onto a full history evicts the oldest entry, so `len()` never
/// exceeds `capacity()`.
///
/// ```
/// use voice_paddle::normalize::PitchHistory;
///
/// let mut h = PitchHistory::new(2);
/// h.push(1.0);
/// h.push(2.0);
/// h.push(3.0); // evicts 1.0
/// assert_eq!(h.iter().collect::<Vec<_>>(), vec![3.0, 2.0]);
/// assert_eq!(h.mean(), Some(2.5));
/// ```
#[derive(Debug, Clone)]
pub struct PitchHistory {
    entries: VecDeque<f64>,
    capacity: usize,
}

impl PitchHistory {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PitchHistory capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert `pitch` as the newest entry, evicting the oldest if full.
    pub fn push(&mut self, pitch: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(pitch);
    }

    /// Arithmetic mean, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.iter().sum::<f64>() / self.entries.len() as f64)
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
