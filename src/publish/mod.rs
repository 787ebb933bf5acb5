//! Cross-thread handoff of the latest [`NormalizedPosition`].
//!
//! ```text
//! worker / audio thread                       game loop (every frame)
//!   PositionWriter::publish(pos) ──▶ AtomicU64 ──▶ PositionReader::latest()
//!                                   (f64 bits)
//! ```
//!
//! One writer, any number of readers, no locks.  A reader sees whichever
//! value was stored last; values published between two reads are simply
//! overwritten.
//!
//! [`NormalizedPosition`]: crate::normalize::NormalizedPosition

pub mod slot;

pub use slot::{position_channel, PositionReader, PositionWriter};
