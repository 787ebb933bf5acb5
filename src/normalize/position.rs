//! The value handed from the audio side to the game loop.

// ---------------------------------------------------------------------------
// NormalizedPosition
// ---------------------------------------------------------------------------

/// A paddle position in `[0.0, 1.0]`, or "absent" when there is no usable
/// signal yet.
///
/// The inner value can only be built through [`NormalizedPosition::new`],
/// which clamps, so a present position is never NaN and never out of range.
///
/// ```
/// use voice_paddle::normalize::NormalizedPosition;
///
/// assert_eq!(NormalizedPosition::new(0.25).value(), Some(0.25));
/// assert_eq!(NormalizedPosition::new(1.7).value(), Some(1.0));
/// assert!(NormalizedPosition::new(f64::NAN).is_absent());
/// assert_eq!(NormalizedPosition::ABSENT.to_legacy(), -1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPosition(Option<f64>);

impl NormalizedPosition {
    /// No usable signal.
    pub const ABSENT: NormalizedPosition = NormalizedPosition(None);

    /// Clamp `value` into `[0.0, 1.0]`.  NaN becomes [`ABSENT`](Self::ABSENT).
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ABSENT
        } else {
            Self(Some(value.clamp(0.0, 1.0)))
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_absent(self) -> bool {
        self.0.is_none()
    }

    /// Float rendition with `-1.0` standing in for "absent".
    pub fn to_legacy(self) -> f64 {
        self.0.unwrap_or(-1.0)
    }

    /// Inverse of [`to_legacy`](Self::to_legacy): any negative or NaN value
    /// reads as absent.
    pub fn from_legacy(value: f64) -> Self {
        if value.is_nan() || value < 0.0 {
            Self::ABSENT
        } else {
            Self::new(value)
        }
    }
}

impl From<NormalizedPosition> for Option<f64> {
    fn from(pos: NormalizedPosition) -> Self {
        pos.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_absent() {
        assert!(NormalizedPosition::default().is_absent());
    }

    #[test]
    fn clamps_both_ends() {
        assert_eq!(NormalizedPosition::new(-0.3).value(), Some(0.0));
        assert_eq!(NormalizedPosition::new(3.0).value(), Some(1.0));
        assert_eq!(NormalizedPosition::new(f64::INFINITY).value(), Some(1.0));
    }

    #[test]
    fn legacy_sentinel() {
        assert!(NormalizedPosition::from_legacy(-1.0).is_absent());
        assert!(NormalizedPosition::from_legacy(f64::NAN).is_absent());
        assert_eq!(NormalizedPosition::from_legacy(0.5).value(), Some(0.5));
        assert_eq!(NormalizedPosition::new(0.5).to_legacy(), 0.5);
    }
}
