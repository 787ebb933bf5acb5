//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the
//! per-microphone controllers.  Every section is `#[serde(default)]`, so a
//! settings file only needs to list the values it changes.

use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::{CaptureMode, DeviceId};
use crate::pitch::{PitchMethod, PitchUnit};

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Microphone stream settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Blocking pull on a worker thread, or push from the audio callback.
    pub mode: CaptureMode,
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis hop (one estimate per hop).
    pub hop_size: usize,
    /// Backend chunks buffered for the blocking reader before new chunks are
    /// dropped.
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            sample_rate: 44_100,
            hop_size: 1024,
            queue_depth: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// PitchConfig
// ---------------------------------------------------------------------------

/// Pitch estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub method: PitchMethod,
    /// Analysis window in samples; must be at least `capture.hop_size`.
    pub window_size: usize,
    /// Unit of the reported pitch.  `midi`/`cent` map octaves linearly onto
    /// the paddle; `hz` favours high notes.
    pub unit: PitchUnit,
    /// Detector clarity threshold in `[0, 1]`.
    pub tolerance: f64,
    /// Silence gate in dBFS (mean window power); quieter windows are
    /// unvoiced.
    pub silence_threshold_db: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            method: PitchMethod::default(),
            window_size: 2048,
            unit: PitchUnit::Midi,
            tolerance: 0.8,
            silence_threshold_db: -90.0,
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizerConfig
// ---------------------------------------------------------------------------

/// Range-adaptive normalizer settings.
///
/// The initial envelope is written in MIDI note numbers whatever
/// `pitch.unit` is; [`AppConfig::controller_config`] converts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Estimates with lower confidence are ignored.
    pub min_confidence: f64,
    /// Envelope the normalizer starts from before any voice is heard, as
    /// MIDI note numbers.
    pub initial_min_pitch: f64,
    pub initial_max_pitch: f64,
    /// Number of accepted pitches averaged into the position.
    pub history_capacity: usize,
    /// Pitches below `lower_band × min` are treated as outliers.
    pub lower_band: f64,
    /// Pitches above `upper_band × max` are treated as outliers.
    pub upper_band: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            initial_min_pitch: 40.0,
            initial_max_pitch: 60.0,
            history_capacity: 4,
            lower_band: 0.8,
            upper_band: 1.2,
        }
    }
}

impl NormalizerConfig {
    /// The same settings with the initial envelope expressed in `unit`.
    pub fn in_unit(&self, unit: PitchUnit) -> Self {
        Self {
            initial_min_pitch: unit.convert_midi(self.initial_min_pitch),
            initial_max_pitch: unit.convert_midi(self.initial_max_pitch),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Which microphones drive which paddle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Microphone of the right-hand player (always present).
    pub right_device: DeviceId,
    /// Microphone of the left-hand player; `None` for single-player.
    pub left_device: Option<DeviceId>,
    /// How long teardown waits for a worker thread before detaching it.
    pub shutdown_timeout_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            right_device: DeviceId::Default,
            left_device: None,
            shutdown_timeout_secs: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Everything one microphone controller needs, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub device: DeviceId,
    pub capture: CaptureConfig,
    pub pitch: PitchConfig,
    pub normalizer: NormalizerConfig,
    pub shutdown_timeout: Duration,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_paddle::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub pitch: PitchConfig,
    pub normalizer: NormalizerConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the cross-field invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let c = &self.capture;
        ensure!(c.sample_rate > 0, "capture.sample_rate must be > 0");
        ensure!(c.hop_size > 0, "capture.hop_size must be > 0");
        ensure!(c.queue_depth > 0, "capture.queue_depth must be > 0");

        let p = &self.pitch;
        ensure!(
            p.window_size >= c.hop_size,
            "pitch.window_size ({}) must be >= capture.hop_size ({})",
            p.window_size,
            c.hop_size
        );
        ensure!(
            (0.0..=1.0).contains(&p.tolerance),
            "pitch.tolerance must be within [0, 1]"
        );
        ensure!(
            p.silence_threshold_db.is_finite() && p.silence_threshold_db <= 0.0,
            "pitch.silence_threshold_db must be finite and <= 0"
        );

        let n = &self.normalizer;
        ensure!(
            (0.0..=1.0).contains(&n.min_confidence),
            "normalizer.min_confidence must be within [0, 1]"
        );
        ensure!(
            n.initial_min_pitch.is_finite()
                && n.initial_max_pitch.is_finite()
                && n.initial_min_pitch <= n.initial_max_pitch,
            "normalizer initial envelope must be finite with min <= max"
        );
        ensure!(
            n.history_capacity > 0,
            "normalizer.history_capacity must be > 0"
        );
        ensure!(
            n.lower_band > 0.0 && n.lower_band <= 1.0 && n.upper_band >= 1.0,
            "normalizer bands must satisfy 0 < lower_band <= 1 <= upper_band"
        );

        let s = &self.session;
        ensure!(
            s.shutdown_timeout_secs.is_finite() && s.shutdown_timeout_secs > 0.0,
            "session.shutdown_timeout_secs must be > 0"
        );
        Ok(())
    }

    /// Freeze the settings for one microphone.  The normalizer envelope is
    /// converted into `pitch.unit`.
    pub fn controller_config(&self, device: DeviceId) -> ControllerConfig {
        ControllerConfig {
            device,
            capture: self.capture.clone(),
            pitch: self.pitch.clone(),
            normalizer: self.normalizer.in_unit(self.pitch.unit),
            shutdown_timeout: Duration::from_secs_f64(self.session.shutdown_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
