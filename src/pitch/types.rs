//! Value types shared by the estimator and its callers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PitchSample
// ---------------------------------------------------------------------------

/// One estimate per buffer.
///
/// `frequency` is expressed in the estimator's configured [`PitchUnit`].
/// A buffer with no detectable pitch yields `frequency == 0.0` and
/// `confidence == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSample {
    pub frequency: f64,
    /// Quality score in `[0.0, 1.0]`.
    pub confidence: f64,
}

impl PitchSample {
    /// The "nothing heard" sample: silence, noise or an ambiguous period.
    pub const UNVOICED: PitchSample = PitchSample {
        frequency: 0.0,
        confidence: 0.0,
    };
}

// ---------------------------------------------------------------------------
// PitchMethod
// ---------------------------------------------------------------------------

/// Which detector from the `pitch-detection` crate runs over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchMethod {
    /// McLeod pitch method (normalized square difference). Robust on voice.
    #[default]
    McLeod,
    /// YIN cumulative mean normalized difference.
    Yin,
    /// Plain autocorrelation; cheapest and least robust.
    Autocorrelation,
}

// ---------------------------------------------------------------------------
// PitchUnit
// ---------------------------------------------------------------------------

/// Unit in which [`PitchSample::frequency`] is reported.
///
/// `Midi` and `Cent` are logarithmic, so an octave is the same distance
/// anywhere in the range. The normalizer relies on that to map a singer's
/// range linearly onto the paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchUnit {
    Hz,
    /// MIDI note number: A4 = 440 Hz = 69.
    #[default]
    Midi,
    /// MIDI note number × 100.
    Cent,
}

impl PitchUnit {
    /// Convert a frequency in Hz to this unit.
    ///
    /// Non-positive or non-finite input maps to `0.0`, the unvoiced value.
    ///
    /// ```
    /// use voice_paddle::pitch::PitchUnit;
    ///
    /// assert!((PitchUnit::Midi.convert_hz(440.0) - 69.0).abs() < 1e-9);
    /// assert!((PitchUnit::Midi.convert_hz(880.0) - 81.0).abs() < 1e-9);
    /// assert!((PitchUnit::Cent.convert_hz(440.0) - 6_900.0).abs() < 1e-6);
    /// assert_eq!(PitchUnit::Hz.convert_hz(-1.0), 0.0);
    /// ```
    pub fn convert_hz(self, hz: f64) -> f64 {
        if !hz.is_finite() || hz <= 0.0 {
            return 0.0;
        }
        let midi = 69.0 + 12.0 * (hz / 440.0).log2();
        match self {
            PitchUnit::Hz => hz,
            PitchUnit::Midi => midi,
            PitchUnit::Cent => midi * 100.0,
        }
    }

    /// Convert a MIDI note number to this unit.
    ///
    /// ```
    /// use voice_paddle::pitch::PitchUnit;
    ///
    /// assert!((PitchUnit::Hz.convert_midi(69.0) - 440.0).abs() < 1e-9);
    /// assert!((PitchUnit::Hz.convert_midi(57.0) - 220.0).abs() < 1e-9);
    /// assert_eq!(PitchUnit::Cent.convert_midi(40.0), 4_000.0);
    /// assert_eq!(PitchUnit::Midi.convert_midi(60.0), 60.0);
    /// ```
    pub fn convert_midi(self, midi: f64) -> f64 {
        match self {
            PitchUnit::Hz => 440.0 * ((midi - 69.0) / 12.0).exp2(),
            PitchUnit::Midi => midi,
            PitchUnit::Cent => midi * 100.0,
        }
    }
}
