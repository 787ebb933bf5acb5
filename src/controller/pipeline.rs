//! Estimator → normalizer → publisher, run once per hop.

use crate::normalize::{NormalizedPosition, Normalizer};
use crate::pitch::{PitchError, PitchEstimate};
use crate::publish::PositionWriter;

// ---------------------------------------------------------------------------
// PitchPipeline
// ---------------------------------------------------------------------------

/// The per-controller processing chain.
///
/// Owned by exactly one background context (worker thread or audio
/// callback); only the published position is visible outside it.
pub struct PitchPipeline {
    estimator: Box<dyn PitchEstimate>,
    normalizer: Normalizer,
    writer: PositionWriter,
}

impl PitchPipeline {
    pub fn new(
        estimator: Box<dyn PitchEstimate>,
        normalizer: Normalizer,
        writer: PositionWriter,
    ) -> Self {
        Self {
            estimator,
            normalizer,
            writer,
        }
    }

    /// Run one hop through the chain and publish the resulting position.
    ///
    /// # Errors
    ///
    /// [`PitchError::BufferSize`] when `buffer` is not exactly one hop; in
    /// that case nothing is published and no state changes.
    pub fn process(&mut self, buffer: &[f32]) -> Result<NormalizedPosition, PitchError> {
        let sample = self.estimator.estimate(buffer)?;
        self.normalizer.accept(sample.frequency, sample.confidence);

        let pos = self.normalizer.current_position();
        self.writer.publish(pos);
        Ok(pos)
    }

    pub fn hop_size(&self) -> usize {
        self.estimator.hop_size()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::pitch::ScriptedEstimator;
    use crate::publish::position_channel;

    const HOP: usize = 8;

    fn pipeline(script: &[(f64, f64)]) -> (PitchPipeline, crate::publish::PositionReader) {
        let (writer, reader) = position_channel();
        let p = PitchPipeline::new(
            Box::new(ScriptedEstimator::new(HOP, script)),
            Normalizer::new(&NormalizerConfig::default()),
            writer,
        );
        (p, reader)
    }

    #[test]
    fn publishes_after_every_hop() {
        let (mut p, reader) = pipeline(&[(50.0, 0.9), (65.0, 0.9), (100.0, 0.9), (55.0, 0.5)]);
        let hop = [0.0_f32; HOP];

        let expected = [0.5, 0.7, 0.7, 0.7];
        for (i, want) in expected.iter().enumerate() {
            let pos = p.process(&hop).unwrap();
            assert_eq!(reader.latest(), pos);
            assert!((pos.value().unwrap() - want).abs() < 1e-12);
            assert_eq!(reader.publish_count(), i as u64 + 1);
        }
    }

    #[test]
    fn unvoiced_start_publishes_absent() {
        let (mut p, reader) = pipeline(&[]);
        let pos = p.process(&[0.0; HOP]).unwrap();
        assert!(pos.is_absent());
        assert!(reader.latest().is_absent());
        assert_eq!(reader.publish_count(), 1);
    }

    #[test]
    fn wrong_size_publishes_nothing() {
        let (mut p, reader) = pipeline(&[(50.0, 0.9)]);
        assert!(p.process(&[0.0; HOP - 1]).is_err());
        assert_eq!(reader.publish_count(), 0);
        assert!(p.normalizer().history().is_empty());

        // The scripted sample is still next in line.
        assert_eq!(p.process(&[0.0; HOP]).unwrap().value(), Some(0.5));
    }

    #[test]
    fn hop_size_comes_from_estimator() {
        let (p, _) = pipeline(&[]);
        assert_eq!(p.hop_size(), HOP);
    }
}
