//! Pitch estimator trait and the `pitch-detection` backed implementation.
//!
//! # Overview
//!
//! [`PitchEstimate`] is the interface the controller pipeline drives.  It is
//! object-safe and `Send` so a boxed estimator can move onto the worker
//! thread or into the audio callback.
//!
//! [`PitchEstimator`] is the production implementation.  It keeps a sliding
//! analysis window of `window_size` samples; every call shifts in exactly one
//! hop and runs the detector over the whole window.  With
//! `window_size > hop_size` consecutive windows overlap, which is why the
//! result of one call depends on the buffers that came before it.

use pitch_detection::detector::autocorrelation::AutocorrelationDetector;
use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::yin::YINDetector;
use pitch_detection::detector::PitchDetector;

use super::types::{PitchMethod, PitchSample, PitchUnit};
use super::PitchError;
use crate::config::PitchConfig;

/// Default clarity threshold handed to the detector.
pub const DEFAULT_TOLERANCE: f64 = 0.8;

/// Default silence gate in dB relative to full scale.  Windows whose mean
/// power is below it are reported as unvoiced; anything louder is left to the
/// clarity threshold.
pub const DEFAULT_SILENCE_THRESHOLD_DB: f64 = -90.0;

// ---------------------------------------------------------------------------
// PitchEstimate trait
// ---------------------------------------------------------------------------

/// Object-safe interface for per-buffer pitch estimation.
///
/// # Contract
///
/// - `buffer.len()` must equal [`hop_size`](Self::hop_size); otherwise
///   `Err(PitchError::BufferSize)` is returned and no state changes.
/// - Calls must be made in arrival order: implementations may carry state
///   from one buffer to the next.
pub trait PitchEstimate: Send {
    /// Estimate the pitch of the next hop of audio.
    fn estimate(&mut self, buffer: &[f32]) -> Result<PitchSample, PitchError>;

    /// Number of samples expected per call.
    fn hop_size(&self) -> usize;
}

// Compile-time assertion: Box<dyn PitchEstimate> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PitchEstimate>) {}
};

// ---------------------------------------------------------------------------
// OwnedDetector
// ---------------------------------------------------------------------------

/// A detector that is owned by exactly one estimator.
///
/// The `pitch-detection` detectors keep their scratch buffers in an
/// `Rc`-based pool, which makes them `!Send` even though nothing outside the
/// detector can reach those buffers.
struct OwnedDetector(Box<dyn PitchDetector<f64>>);

// SAFETY: every `Rc` in the detector's buffer pool is created and held by the
// detector itself and none is ever handed out, so all reference counts move
// between threads together with their single owner.
unsafe impl Send for OwnedDetector {}

// ---------------------------------------------------------------------------
// PitchEstimator
// ---------------------------------------------------------------------------

/// Sliding-window pitch estimator over the `pitch-detection` crate.
pub struct PitchEstimator {
    detector: OwnedDetector,
    method: PitchMethod,
    window: Vec<f64>,
    hop_size: usize,
    sample_rate: u32,
    unit: PitchUnit,
    tolerance: f64,
    silence_threshold_db: f64,
}

impl PitchEstimator {
    /// Create an estimator.
    ///
    /// The unit defaults to [`PitchUnit::Hz`] and the tolerance to
    /// [`DEFAULT_TOLERANCE`]; adjust them with [`set_unit`](Self::set_unit)
    /// and [`set_tolerance`](Self::set_tolerance).
    ///
    /// # Errors
    ///
    /// [`PitchError::InvalidConfig`] when `sample_rate` or `hop_size` is zero
    /// or when `window_size < hop_size`.
    pub fn new(
        method: PitchMethod,
        window_size: usize,
        hop_size: usize,
        sample_rate: u32,
    ) -> Result<Self, PitchError> {
        if sample_rate == 0 {
            return Err(PitchError::InvalidConfig("sample rate must be > 0".into()));
        }
        if hop_size == 0 {
            return Err(PitchError::InvalidConfig("hop size must be > 0".into()));
        }
        if window_size < hop_size {
            return Err(PitchError::InvalidConfig(format!(
                "window size {window_size} is smaller than hop size {hop_size}"
            )));
        }

        let padding = window_size / 2;
        let detector: Box<dyn PitchDetector<f64>> = match method {
            PitchMethod::McLeod => Box::new(McLeodDetector::new(window_size, padding)),
            PitchMethod::Yin => Box::new(YINDetector::new(window_size, padding)),
            PitchMethod::Autocorrelation => {
                Box::new(AutocorrelationDetector::new(window_size, padding))
            }
        };

        Ok(Self {
            detector: OwnedDetector(detector),
            method,
            window: vec![0.0; window_size],
            hop_size,
            sample_rate,
            unit: PitchUnit::Hz,
            tolerance: DEFAULT_TOLERANCE,
            silence_threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
        })
    }

    /// Build an estimator from the `[pitch]` settings, for a stream running at
    /// `sample_rate` and delivering `hop_size` samples per buffer.
    pub fn from_config(
        config: &PitchConfig,
        hop_size: usize,
        sample_rate: u32,
    ) -> Result<Self, PitchError> {
        let mut estimator = Self::new(config.method, config.window_size, hop_size, sample_rate)?;
        estimator.set_unit(config.unit);
        estimator.set_tolerance(config.tolerance)?;
        estimator.set_silence_threshold_db(config.silence_threshold_db)?;
        Ok(estimator)
    }

    /// Select the unit in which frequencies are reported.
    pub fn set_unit(&mut self, unit: PitchUnit) {
        self.unit = unit;
    }

    /// Set the detector's clarity threshold.
    ///
    /// # Errors
    ///
    /// [`PitchError::InvalidConfig`] unless `tolerance` is in `[0.0, 1.0]`.
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), PitchError> {
        if !(0.0..=1.0).contains(&tolerance) {
            return Err(PitchError::InvalidConfig(format!(
                "tolerance {tolerance} is outside [0, 1]"
            )));
        }
        self.tolerance = tolerance;
        Ok(())
    }

    /// Set the silence gate, in dB relative to a full-scale signal.
    ///
    /// The gate compares the mean power of the analysis window, so it does
    /// not depend on the window size.
    ///
    /// # Errors
    ///
    /// [`PitchError::InvalidConfig`] unless `db` is finite and `<= 0`.
    pub fn set_silence_threshold_db(&mut self, db: f64) -> Result<(), PitchError> {
        if !db.is_finite() || db > 0.0 {
            return Err(PitchError::InvalidConfig(format!(
                "silence threshold {db} dB must be finite and <= 0"
            )));
        }
        self.silence_threshold_db = db;
        Ok(())
    }

    pub fn silence_threshold_db(&self) -> f64 {
        self.silence_threshold_db
    }

    /// The gate as the detector wants it: a sum of squares over the window.
    fn power_threshold(&self) -> f64 {
        self.window.len() as f64 * 10f64.powf(self.silence_threshold_db / 10.0)
    }

    pub fn method(&self) -> PitchMethod {
        self.method
    }

    pub fn unit(&self) -> PitchUnit {
        self.unit
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shift the window left by one hop and append `buffer` at the tail.
    fn slide_in(&mut self, buffer: &[f32]) {
        let tail = self.window.len() - self.hop_size;
        self.window.copy_within(self.hop_size.., 0);
        for (dst, &src) in self.window[tail..].iter_mut().zip(buffer) {
            *dst = f64::from(src);
        }
    }
}

impl PitchEstimate for PitchEstimator {
    fn estimate(&mut self, buffer: &[f32]) -> Result<PitchSample, PitchError> {
        if buffer.len() != self.hop_size {
            return Err(PitchError::BufferSize {
                expected: self.hop_size,
                got: buffer.len(),
            });
        }

        self.slide_in(buffer);

        let power_threshold = self.power_threshold();
        let detected = self.detector.0.get_pitch(
            &self.window,
            self.sample_rate as usize,
            power_threshold,
            self.tolerance,
        );

        let sample = match detected {
            Some(pitch) if pitch.frequency.is_finite() && pitch.frequency > 0.0 => {
                let confidence = if pitch.clarity.is_finite() {
                    pitch.clarity.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                PitchSample {
                    frequency: self.unit.convert_hz(pitch.frequency),
                    confidence,
                }
            }
            _ => PitchSample::UNVOICED,
        };

        log::trace!("pitch {:.2} / {:.2}", sample.frequency, sample.confidence);
        Ok(sample)
    }

    fn hop_size(&self) -> usize {
        self.hop_size
    }
}

// ---------------------------------------------------------------------------
// ScriptedEstimator  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a fixed list of samples, one per call, then
/// reports unvoiced forever.  Records every buffer length it was handed.
#[cfg(test)]
pub(crate) struct ScriptedEstimator {
    script: std::collections::VecDeque<PitchSample>,
    hop_size: usize,
    pub(crate) seen: std::sync::Arc<std::sync::Mutex<Vec<f32>>>,
}

#[cfg(test)]
impl ScriptedEstimator {
    pub(crate) fn new(hop_size: usize, script: &[(f64, f64)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|&(frequency, confidence)| PitchSample {
                    frequency,
                    confidence,
                })
                .collect(),
            hop_size,
            seen: Default::default(),
        }
    }
}

#[cfg(test)]
impl PitchEstimate for ScriptedEstimator {
    fn estimate(&mut self, buffer: &[f32]) -> Result<PitchSample, PitchError> {
        if buffer.len() != self.hop_size {
            return Err(PitchError::BufferSize {
                expected: self.hop_size,
                got: buffer.len(),
            });
        }
        // First sample of each buffer identifies it in ordering tests.
        self.seen.lock().unwrap().push(buffer[0]);
        Ok(self.script.pop_front().unwrap_or(PitchSample::UNVOICED))
    }

    fn hop_size(&self) -> usize {
        self.hop_size
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
