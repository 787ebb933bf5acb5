//! Atomic single-slot publisher.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::normalize::NormalizedPosition;

/// Bit pattern reserved for "absent".  It is a NaN, and a present
/// [`NormalizedPosition`] is never NaN.
const ABSENT_BITS: u64 = u64::MAX;

fn encode(pos: NormalizedPosition) -> u64 {
    pos.value().map_or(ABSENT_BITS, f64::to_bits)
}

fn decode(bits: u64) -> NormalizedPosition {
    if bits == ABSENT_BITS {
        NormalizedPosition::ABSENT
    } else {
        NormalizedPosition::new(f64::from_bits(bits))
    }
}

#[derive(Debug)]
struct Slot {
    bits: AtomicU64,
    publishes: AtomicU64,
}

/// Create a connected writer/reader pair.  The slot starts out absent.
///
/// ```
/// use voice_paddle::normalize::NormalizedPosition;
/// use voice_paddle::publish::position_channel;
///
/// let (writer, reader) = position_channel();
/// assert!(reader.latest().is_absent());
///
/// writer.publish(NormalizedPosition::new(0.25));
/// writer.publish(NormalizedPosition::new(0.75));
/// assert_eq!(reader.latest().value(), Some(0.75)); // last value wins
/// ```
pub fn position_channel() -> (PositionWriter, PositionReader) {
    let slot = Arc::new(Slot {
        bits: AtomicU64::new(ABSENT_BITS),
        publishes: AtomicU64::new(0),
    });
    (
        PositionWriter {
            slot: Arc::clone(&slot),
        },
        PositionReader { slot },
    )
}

// ---------------------------------------------------------------------------
// PositionWriter
// ---------------------------------------------------------------------------

/// Producer half.  Not `Clone`: there is at most one writer per slot.
#[derive(Debug)]
pub struct PositionWriter {
    slot: Arc<Slot>,
}

impl PositionWriter {
    /// Overwrite the slot.  Never blocks.
    pub fn publish(&self, pos: NormalizedPosition) {
        self.slot.bits.store(encode(pos), Ordering::Release);
        self.slot.publishes.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// PositionReader
// ---------------------------------------------------------------------------

/// Consumer half.  Cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct PositionReader {
    slot: Arc<Slot>,
}

impl PositionReader {
    /// Most recently published position, or absent if nothing was published.
    pub fn latest(&self) -> NormalizedPosition {
        decode(self.slot.bits.load(Ordering::Acquire))
    }

    /// Number of `publish` calls so far.  Lets a consumer tell whether the
    /// producer is still delivering.
    pub fn publish_count(&self) -> u64 {
        self.slot.publishes.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
