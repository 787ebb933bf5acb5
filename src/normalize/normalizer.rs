//! [`Normalizer`]: confidence gating, envelope tracking and smoothing.

use crate::config::NormalizerConfig;

use super::history::PitchHistory;
use super::position::NormalizedPosition;

// ---------------------------------------------------------------------------
// PitchEnvelope
// ---------------------------------------------------------------------------

/// Observed pitch range used as the normalization domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEnvelope {
    pub min_pitch: f64,
    pub max_pitch: f64,
}

impl PitchEnvelope {
    /// Stretch the envelope so it contains `pitch`.  Never narrows it.
    fn widen(&mut self, pitch: f64) {
        self.min_pitch = self.min_pitch.min(pitch);
        self.max_pitch = self.max_pitch.max(pitch);
    }

    /// Width of the range, or `None` when it cannot be divided by.
    fn span(&self) -> Option<f64> {
        let span = self.max_pitch - self.min_pitch;
        (span.is_finite() && span > 0.0).then_some(span)
    }
}

// ---------------------------------------------------------------------------
// SampleOutcome
// ---------------------------------------------------------------------------

/// What [`Normalizer::accept`] did with a sample.
///
/// Rejections are the normal filtering path for silence and noise, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Accepted,
    /// Confidence below the configured threshold.
    LowConfidence,
    /// Pitch outside the sanity band around the envelope, or not finite.
    OutOfRange,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Turns a stream of `(pitch, confidence)` pairs into a paddle position.
///
/// # Example
///
/// ```rust
/// use voice_paddle::config::NormalizerConfig;
/// use voice_paddle::normalize::Normalizer;
///
/// let mut n = Normalizer::new(&NormalizerConfig::default()); // envelope [40, 60]
/// assert!(n.current_position().is_absent());
///
/// n.accept(50.0, 0.9);
/// assert_eq!(n.current_position().value(), Some(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct Normalizer {
    envelope: PitchEnvelope,
    history: PitchHistory,
    min_confidence: f64,
    lower_band: f64,
    upper_band: f64,
}

impl Normalizer {
    /// # Panics
    ///
    /// Panics if `config.history_capacity == 0`; [`AppConfig::validate`]
    /// rejects such configs up front.
    ///
    /// [`AppConfig::validate`]: crate::config::AppConfig::validate
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            envelope: PitchEnvelope {
                min_pitch: config.initial_min_pitch,
                max_pitch: config.initial_max_pitch,
            },
            history: PitchHistory::new(config.history_capacity),
            min_confidence: config.min_confidence,
            lower_band: config.lower_band,
            upper_band: config.upper_band,
        }
    }

    /// Offer one raw estimate.  Accepted samples widen the envelope and enter
    /// the history; rejected samples change nothing.
    pub fn accept(&mut self, raw_pitch: f64, confidence: f64) -> SampleOutcome {
        if confidence.is_nan() || confidence < self.min_confidence {
            log::trace!("reject {raw_pitch:.2}: confidence {confidence:.2}");
            return SampleOutcome::LowConfidence;
        }
        if !raw_pitch.is_finite()
            || raw_pitch < self.lower_band * self.envelope.min_pitch
            || raw_pitch > self.upper_band * self.envelope.max_pitch
        {
            log::trace!(
                "reject {raw_pitch:.2}: outside [{:.2}, {:.2}]",
                self.lower_band * self.envelope.min_pitch,
                self.upper_band * self.envelope.max_pitch
            );
            return SampleOutcome::OutOfRange;
        }

        self.envelope.widen(raw_pitch);
        self.history.push(raw_pitch);
        SampleOutcome::Accepted
    }

    /// Smoothed position of the recent history inside the envelope.
    ///
    /// Absent while the history is empty or the envelope has zero width.
    pub fn current_position(&self) -> NormalizedPosition {
        let (Some(mean), Some(span)) = (self.history.mean(), self.envelope.span()) else {
            return NormalizedPosition::ABSENT;
        };
        NormalizedPosition::new((mean - self.envelope.min_pitch) / span)
    }

    pub fn envelope(&self) -> PitchEnvelope {
        self.envelope
    }

    pub fn history(&self) -> &PitchHistory {
        &self.history
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn default_normalizer() -> Normalizer {
        Normalizer::new(&NormalizerConfig::default())
    }

    fn position(n: &Normalizer) -> f64 {
        n.current_position().value().expect("position present")
    }

    // ---- Worked scenarios --------------------------------------------------

    #[test]
    fn fresh_normalizer_is_absent() {
        assert!(default_normalizer().current_position().is_absent());
    }

    #[test]
    fn scenario_walkthrough() {
        let mut n = default_normalizer();

        // Mid-range sample lands in the middle of [40, 60].
        assert_eq!(n.accept(50.0, 0.9), SampleOutcome::Accepted);
        assert_eq!(n.history().iter().collect::<Vec<_>>(), vec![50.0]);
        assert!((position(&n) - 0.5).abs() < 1e-12);

        // 65 widens the top of the envelope.
        assert_eq!(n.accept(65.0, 0.9), SampleOutcome::Accepted);
        assert_eq!(n.envelope().max_pitch, 65.0);
        assert_eq!(n.history().iter().collect::<Vec<_>>(), vec![65.0, 50.0]);
        assert!((position(&n) - 0.7).abs() < 1e-12);

        // 100 is beyond 1.2 × 65 = 78.
        let before = (n.envelope(), n.history().iter().collect::<Vec<_>>());
        assert_eq!(n.accept(100.0, 0.9), SampleOutcome::OutOfRange);
        assert_eq!(before, (n.envelope(), n.history().iter().collect::<Vec<_>>()));
        assert!((position(&n) - 0.7).abs() < 1e-12);

        // Below the 0.8 confidence threshold.
        assert_eq!(n.accept(55.0, 0.5), SampleOutcome::LowConfidence);
        assert_eq!(n.history().len(), 2);
    }

    #[test]
    fn history_keeps_most_recent_capacity() {
        let mut n = default_normalizer();
        for p in [45.0, 47.0, 49.0, 51.0, 53.0] {
            assert_eq!(n.accept(p, 0.95), SampleOutcome::Accepted);
        }
        assert_eq!(
            n.history().iter().collect::<Vec<_>>(),
            vec![53.0, 51.0, 49.0, 47.0]
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut n = default_normalizer();
        assert_eq!(n.accept(50.0, 0.8), SampleOutcome::Accepted);
    }

    #[test]
    fn below_lower_band_rejected() {
        let mut n = default_normalizer();
        // 0.8 × 40 = 32
        assert_eq!(n.accept(31.9, 0.9), SampleOutcome::OutOfRange);
        assert_eq!(n.accept(32.0, 0.9), SampleOutcome::Accepted);
        assert_eq!(n.envelope().min_pitch, 32.0);
    }

    #[test]
    fn unvoiced_sample_is_rejected() {
        let mut n = default_normalizer();
        assert_eq!(n.accept(0.0, 0.0), SampleOutcome::LowConfidence);
        assert_eq!(n.accept(f64::NAN, 0.9), SampleOutcome::OutOfRange);
        assert_eq!(n.accept(50.0, f64::NAN), SampleOutcome::LowConfidence);
        assert!(n.current_position().is_absent());
    }

    #[test]
    fn degenerate_envelope_is_absent() {
        let cfg = NormalizerConfig {
            initial_min_pitch: 50.0,
            initial_max_pitch: 50.0,
            ..NormalizerConfig::default()
        };
        let mut n = Normalizer::new(&cfg);
        assert_eq!(n.accept(50.0, 0.9), SampleOutcome::Accepted);
        assert!(n.current_position().is_absent());

        // A second, different pitch opens the range up.
        assert_eq!(n.accept(55.0, 0.9), SampleOutcome::Accepted);
        assert!(n.current_position().value().is_some());
    }

    #[test]
    fn boundaries_map_to_zero_and_one() {
        let cfg = NormalizerConfig {
            history_capacity: 1,
            ..NormalizerConfig::default()
        };
        let mut n = Normalizer::new(&cfg);
        n.accept(40.0, 0.9);
        assert_eq!(position(&n), 0.0);
        n.accept(60.0, 0.9);
        assert_eq!(position(&n), 1.0);
    }

    // ---- Randomised properties ---------------------------------------------

    #[test]
    fn fuzz_position_range_and_monotonic_envelope() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for round in 0..50 {
            let lo: f64 = rng.gen_range(20.0..70.0);
            let width: f64 = if round % 5 == 0 { 0.0 } else { rng.gen_range(0.0..30.0) };
            let cfg = NormalizerConfig {
                initial_min_pitch: lo,
                initial_max_pitch: lo + width,
                history_capacity: rng.gen_range(1..6),
                ..NormalizerConfig::default()
            };
            let mut n = Normalizer::new(&cfg);

            for _ in 0..500 {
                let env = n.envelope();
                let pos = n.current_position();
                let pitch = match rng.gen_range(0..10) {
                    0 => env.min_pitch,
                    1 => env.max_pitch,
                    2 => f64::NAN,
                    _ => rng.gen_range(-20.0..150.0),
                };
                let confidence: f64 = rng.gen_range(0.0..1.0);

                let outcome = n.accept(pitch, confidence);

                let after = n.envelope();
                assert!(after.min_pitch <= env.min_pitch);
                assert!(after.max_pitch >= env.max_pitch);
                assert!(n.history().len() <= cfg.history_capacity);

                if outcome != SampleOutcome::Accepted {
                    assert_eq!(after, env);
                    assert_eq!(n.current_position(), pos);
                }
                if confidence < cfg.min_confidence {
                    assert_eq!(outcome, SampleOutcome::LowConfidence);
                }

                if let Some(v) = n.current_position().value() {
                    assert!(!v.is_nan());
                    assert!((0.0..=1.0).contains(&v), "out of range: {v}");
                }
            }
        }
    }
}
