//! Pitch estimation: one `(frequency, confidence)` pair per hop-sized buffer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 PitchEstimate (trait)                │
//! │                                                      │
//! │   hop buffer ──▶ sliding window ──▶ pitch_detection  │
//! │                  (window_size)      McLeod / YIN /   │
//! │                                     autocorrelation  │
//! │                                          │           │
//! │                                          ▼           │
//! │                              PitchSample { unit }    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use voice_paddle::pitch::{PitchEstimate, PitchEstimator, PitchMethod, PitchUnit};
//!
//! let mut estimator = PitchEstimator::new(PitchMethod::McLeod, 2048, 1024, 44_100).unwrap();
//! estimator.set_unit(PitchUnit::Midi);
//! estimator.set_tolerance(0.8).unwrap();
//!
//! let silence = vec![0.0_f32; 1024];
//! let sample = estimator.estimate(&silence).unwrap();
//! assert_eq!(sample.confidence, 0.0);
//! ```

pub mod estimator;
pub mod types;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use estimator::{PitchEstimate, PitchEstimator};
pub use types::{PitchMethod, PitchSample, PitchUnit};

#[cfg(test)]
pub(crate) use estimator::ScriptedEstimator;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PitchError
// ---------------------------------------------------------------------------

/// Errors raised by the pitch estimator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PitchError {
    /// Rejected at construction: sizes, sample rate or tolerance are unusable.
    #[error("invalid pitch estimator configuration: {0}")]
    InvalidConfig(String),

    /// The buffer handed to `estimate` does not match the configured hop size.
    #[error("buffer has {got} samples, estimator expects exactly {expected}")]
    BufferSize { expected: usize, got: usize },
}
