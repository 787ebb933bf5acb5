//! Fixed-size audio frames and the re-chunker that produces them.
//!
//! Audio backends deliver whatever chunk size suits the hardware (often 441,
//! 480 or 512 frames), while the pitch estimator wants exactly one hop per
//! call.  [`HopBuffer`] bridges the two: it collects incoming samples and
//! hands out complete hops in arrival order, keeping any remainder for the
//! next chunk.
//!
//! # Example
//!
//! ```rust
//! use voice_paddle::audio::HopBuffer;
//!
//! let mut hops = HopBuffer::new(4);
//! let mut seen = Vec::new();
//! hops.push(&[1.0, 2.0, 3.0], |hop| seen.push(hop.to_vec()));
//! hops.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0], |hop| seen.push(hop.to_vec()));
//! assert_eq!(seen, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
//! assert_eq!(hops.pending(), 1); // 9.0 waits for the next chunk
//! ```

use std::ops::Deref;

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// One hop of mono `f32` samples, as returned by a blocking read.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer(Vec<f32>);

impl AudioBuffer {
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for AudioBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self(samples)
    }
}

impl Deref for AudioBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// HopBuffer
// ---------------------------------------------------------------------------

/// Re-chunks an arbitrary sample stream into hop-sized slices.
///
/// The internal vector never holds more than `hop + chunk` samples, and after
/// warm-up it stops allocating, which keeps it usable inside an audio
/// callback.
pub struct HopBuffer {
    buf: Vec<f32>,
    hop: usize,
}

impl HopBuffer {
    /// Create a re-chunker emitting `hop` samples at a time.
    ///
    /// # Panics
    ///
    /// Panics if `hop == 0`.
    pub fn new(hop: usize) -> Self {
        assert!(hop > 0, "HopBuffer hop size must be > 0");
        Self {
            buf: Vec::with_capacity(hop * 2),
            hop,
        }
    }

    /// Append `samples` and call `on_hop` once for every complete hop, oldest
    /// first.
    pub fn push<F: FnMut(&[f32])>(&mut self, samples: &[f32], mut on_hop: F) {
        self.buf.extend_from_slice(samples);

        let mut start = 0;
        while self.buf.len() - start >= self.hop {
            on_hop(&self.buf[start..start + self.hop]);
            start += self.hop;
        }
        self.buf.drain(..start);
    }

    /// Samples held back waiting for a complete hop.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn hop_size(&self) -> usize {
        self.hop
    }

    /// Drop any partial hop.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(hops: &mut HopBuffer, chunk: &[f32]) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        hops.push(chunk, |hop| out.push(hop.to_vec()));
        out
    }

    // ---- Re-chunking -------------------------------------------------------

    #[test]
    fn short_chunks_accumulate() {
        let mut hops = HopBuffer::new(4);
        assert!(collect(&mut hops, &[1.0, 2.0]).is_empty());
        assert!(collect(&mut hops, &[3.0]).is_empty());
        assert_eq!(collect(&mut hops, &[4.0]), vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(hops.pending(), 0);
    }

    #[test]
    fn exact_chunk_passes_straight_through() {
        let mut hops = HopBuffer::new(3);
        assert_eq!(collect(&mut hops, &[1.0, 2.0, 3.0]), vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn long_chunk_yields_several_hops_in_order() {
        let mut hops = HopBuffer::new(2);
        let chunk: Vec<f32> = (0..7).map(|i| i as f32).collect();
        assert_eq!(
            collect(&mut hops, &chunk),
            vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]
        );
        assert_eq!(hops.pending(), 1);
        assert_eq!(collect(&mut hops, &[7.0]), vec![vec![6.0, 7.0]]);
    }

    #[test]
    fn every_hop_has_exact_length() {
        let mut hops = HopBuffer::new(1024);
        let mut lengths = Vec::new();
        for _ in 0..50 {
            hops.push(&[0.0; 441], |hop| lengths.push(hop.len()));
        }
        assert_eq!(lengths.len(), 50 * 441 / 1024);
        assert!(lengths.iter().all(|&l| l == 1024));
        assert!(hops.pending() < 1024);
    }

    #[test]
    fn clear_drops_partial_hop() {
        let mut hops = HopBuffer::new(4);
        collect(&mut hops, &[1.0, 2.0, 3.0]);
        hops.clear();
        assert_eq!(hops.pending(), 0);
        assert!(collect(&mut hops, &[4.0]).is_empty());
    }

    #[test]
    #[should_panic(expected = "HopBuffer hop size must be > 0")]
    fn zero_hop_panics() {
        let _ = HopBuffer::new(0);
    }

    // ---- AudioBuffer -------------------------------------------------------

    #[test]
    fn audio_buffer_derefs_to_slice() {
        let buf = AudioBuffer::from(vec![0.5_f32; 8]);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf[3], 0.5);
        assert_eq!(buf.into_inner().len(), 8);
    }
}
