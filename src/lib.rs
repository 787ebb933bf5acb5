//! Voice-driven paddle control.
//!
//! Turns a live microphone stream into a smoothed, normalized control value
//! in `[0, 1]` that a game loop can poll every frame without blocking.
//!
//! ```text
//! Microphone → cpal → HopBuffer → PitchEstimator → Normalizer
//!            → PositionWriter ──atomic──▶ PositionReader ← game loop
//! ```

pub mod audio;
pub mod config;
pub mod controller;
pub mod normalize;
pub mod pitch;
pub mod publish;
