//! One microphone, end to end.
//!
//! [`MicController`] opens the capture device, builds the
//! [`PitchPipeline`](super::PitchPipeline) and wires it to the capture
//! delivery path chosen by [`CaptureMode`]:
//!
//! * `Blocking`: a [`PollingWorker`] thread named `pitch-worker-<label>`
//!   pulls hops from the [`BlockingReader`](crate::audio::BlockingReader).
//! * `Callback`: the pipeline runs inside the cpal audio callback.
//!
//! The game loop only ever touches [`MicController::get_normalized_position`].

use std::time::Duration;

use super::pipeline::PitchPipeline;
use super::worker::{PollingWorker, ShutdownOutcome};
use super::ControllerError;
use crate::audio::{CaptureMode, MicCapture, StreamHandle};
use crate::config::ControllerConfig;
use crate::normalize::{NormalizedPosition, Normalizer};
use crate::pitch::PitchEstimator;
use crate::publish::{position_channel, PositionReader};

// ---------------------------------------------------------------------------
// MicController
// ---------------------------------------------------------------------------

/// Handle to a running microphone controller.
///
/// Dropping it runs [`cleanup`](Self::cleanup).
pub struct MicController {
    label: String,
    reader: PositionReader,
    stream: Option<StreamHandle>,
    worker: Option<PollingWorker>,
    shutdown_timeout: Duration,
}

impl MicController {
    /// Open `config.device` and start processing immediately.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::Config`]: the settings cannot produce a pipeline.
    /// * [`ControllerError::Capture`]: the device cannot be opened or started.
    /// * [`ControllerError::Pitch`]: the estimator rejects the settings.
    /// * [`ControllerError::Spawn`]: the worker thread cannot be created.
    ///
    /// Anything already started is shut down before the error is returned.
    pub fn new(label: &str, config: &ControllerConfig) -> Result<Self, ControllerError> {
        check_config(config)?;

        let capture = MicCapture::open(&config.device, &config.capture)?;
        let (pipeline, reader) = build_pipeline(config, capture.sample_rate())?;

        let (stream, worker) = match config.capture.mode {
            CaptureMode::Blocking => {
                let (stream, source) = capture.start_blocking()?;
                // On spawn failure `stream` drops here and closes the device.
                let worker = PollingWorker::spawn(format!("pitch-worker-{label}"), source, pipeline)?;
                (stream, Some(worker))
            }
            CaptureMode::Callback => {
                let mut pipeline = pipeline;
                let tag = label.to_owned();
                let stream = capture.start_callback(move |hop| {
                    if let Err(e) = pipeline.process(hop) {
                        log::warn!("{tag}: skipped buffer: {e}");
                    }
                })?;
                (stream, None)
            }
        };

        log::info!(
            "{label}: listening on '{}' ({:?} mode, {} Hz, hop {})",
            capture.device_name(),
            config.capture.mode,
            capture.sample_rate(),
            config.capture.hop_size
        );

        Ok(Self {
            label: label.to_owned(),
            reader,
            stream: Some(stream),
            worker,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Latest published position.  Never blocks.
    ///
    /// `0.0` is the bottom of the observed pitch range and `1.0` the top;
    /// flipping that for screen coordinates is up to the caller.
    pub fn get_normalized_position(&self) -> NormalizedPosition {
        self.reader.latest()
    }

    /// A reader that can be handed to another thread.
    pub fn reader(&self) -> PositionReader {
        self.reader.clone()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Capture chunks dropped because the worker fell behind.
    pub fn overflow_count(&self) -> u64 {
        self.stream.as_ref().map_or(0, StreamHandle::overflow_count)
    }

    /// `true` until [`cleanup`](Self::cleanup) has run.
    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Stop capture, release the device, and wait for the worker.
    ///
    /// The wait is bounded by the configured shutdown timeout; a worker still
    /// running after that is detached.  Safe to call more than once.
    pub fn cleanup(&mut self) {
        if let Some(worker) = &self.worker {
            worker.request_stop();
        }
        // Closing drops the queue sender, which unblocks a pending read.
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        if let Some(mut worker) = self.worker.take() {
            match worker.shutdown(self.shutdown_timeout) {
                ShutdownOutcome::Joined | ShutdownOutcome::AlreadyStopped => {
                    log::debug!("{}: worker stopped", self.label)
                }
                ShutdownOutcome::Panicked => log::error!("{}: worker panicked", self.label),
                ShutdownOutcome::TimedOut => {
                    log::warn!("{}: worker abandoned after timeout", self.label)
                }
            }
        }
    }
}

impl Drop for MicController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Reject settings that would otherwise panic or misbehave once running.
fn check_config(config: &ControllerConfig) -> Result<(), ControllerError> {
    if config.capture.hop_size == 0 {
        return Err(ControllerError::Config("capture.hop_size must be > 0".into()));
    }
    if config.normalizer.history_capacity == 0 {
        return Err(ControllerError::Config(
            "normalizer.history_capacity must be > 0".into(),
        ));
    }
    Ok(())
}

/// Estimator → normalizer → publisher for a stream running at `sample_rate`.
fn build_pipeline(
    config: &ControllerConfig,
    sample_rate: u32,
) -> Result<(PitchPipeline, PositionReader), ControllerError> {
    let estimator = PitchEstimator::from_config(&config.pitch, config.capture.hop_size, sample_rate)?;
    let normalizer = Normalizer::new(&config.normalizer);
    let (writer, reader) = position_channel();
    Ok((PitchPipeline::new(Box::new(estimator), normalizer, writer), reader))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceId;
    use crate::config::AppConfig;
    use crate::pitch::{PitchError, PitchUnit};

    const RATE: u32 = 44_100;

    fn config() -> ControllerConfig {
        config_in(PitchUnit::Midi)
    }

    fn config_in(unit: PitchUnit) -> ControllerConfig {
        let mut app = AppConfig::default();
        app.pitch.unit = unit;
        app.controller_config(DeviceId::Name("no such microphone".into()))
    }

    /// Feed `hops` consecutive hops of a sine through the pipeline and return
    /// the last published position.
    fn sing(cfg: &ControllerConfig, amplitude: f64, freq: f64, hops: usize) -> NormalizedPosition {
        let (mut pipeline, reader) = build_pipeline(cfg, RATE).unwrap();
        let hop = cfg.capture.hop_size;
        for h in 0..hops {
            let buf: Vec<f32> = (h * hop..(h + 1) * hop)
                .map(|i| {
                    let t = i as f64 / f64::from(RATE);
                    (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
                })
                .collect();
            pipeline.process(&buf).unwrap();
        }
        reader.latest()
    }

    fn assert_near(pos: NormalizedPosition, want: f64) {
        let got = pos.value().expect("voiced input should move the paddle");
        assert!((got - want).abs() < 0.05, "expected ~{want}, got {got}");
    }

    #[test]
    fn zero_history_rejected_before_opening_device() {
        let mut cfg = config();
        cfg.normalizer.history_capacity = 0;
        let err = MicController::new("right", &cfg).err().unwrap();
        assert!(matches!(err, ControllerError::Config(_)));
    }

    #[test]
    fn zero_hop_rejected_before_opening_device() {
        let mut cfg = config();
        cfg.capture.hop_size = 0;
        let err = MicController::new("right", &cfg).err().unwrap();
        assert!(matches!(err, ControllerError::Config(_)));
    }

    #[test]
    fn pipeline_uses_stream_rate_and_hop() {
        let cfg = config();
        let (pipeline, reader) = build_pipeline(&cfg, 48_000).unwrap();
        assert_eq!(pipeline.hop_size(), cfg.capture.hop_size);
        assert!(reader.latest().is_absent());
        assert_eq!(reader.publish_count(), 0);
    }

    #[test]
    fn pipeline_rejects_window_smaller_than_hop() {
        let mut cfg = config();
        cfg.pitch.window_size = 512;
        cfg.capture.hop_size = 1024;
        let err = build_pipeline(&cfg, 44_100).err().unwrap();
        assert!(matches!(err, ControllerError::Pitch(PitchError::InvalidConfig(_))));
    }

    #[test]
    fn built_pipeline_publishes_silence_as_absent() {
        let cfg = config();
        let (mut pipeline, reader) = build_pipeline(&cfg, 44_100).unwrap();
        let pos = pipeline.process(&vec![0.0; cfg.capture.hop_size]).unwrap();
        assert!(pos.is_absent());
        assert_eq!(reader.publish_count(), 1);
    }

    // ---- Units and levels --------------------------------------------------

    #[test]
    fn midi_unit_tracks_a_sung_note() {
        // A3 = MIDI 57 inside the default [40, 60] envelope.
        assert_near(sing(&config(), 0.5, 220.0, 20), 0.85);
    }

    #[test]
    fn cent_unit_tracks_a_sung_note() {
        // 5700 cents inside [4000, 6000].
        assert_near(sing(&config_in(PitchUnit::Cent), 0.5, 220.0, 20), 0.85);
    }

    #[test]
    fn hz_unit_tracks_a_sung_note() {
        // 220 Hz inside [82.4, 261.6] Hz.
        assert_near(sing(&config_in(PitchUnit::Hz), 0.5, 220.0, 20), 0.768);
    }

    #[test]
    fn quiet_singing_moves_the_paddle() {
        // 110 Hz = MIDI 45 at amplitude 0.05.
        assert_near(sing(&config(), 0.05, 110.0, 20), 0.25);
    }
}
