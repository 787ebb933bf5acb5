//! Range-adaptive normalization of raw pitch into a paddle position.
//!
//! # Pipeline
//!
//! ```text
//! (pitch, confidence) ─▶ gate: confidence ≥ threshold
//!                            && 0.8·min ≤ pitch ≤ 1.2·max
//!                     ─▶ widen PitchEnvelope [min, max]
//!                     ─▶ push into PitchHistory (newest first, bounded)
//!
//! current_position() = clamp((mean(history) − min) / (max − min), 0, 1)
//! ```
//!
//! The envelope only ever widens.  Averaging over a short history trades a
//! few hops of latency for a steady paddle.

pub mod history;
pub mod normalizer;
pub mod position;

pub use history::PitchHistory;
pub use normalizer::{Normalizer, PitchEnvelope, SampleOutcome};
pub use position::NormalizedPosition;
