//! Dedicated polling thread for blocking-mode capture.
//!
//! [`PollingWorker`] owns a named OS thread that loops
//! `source.read(hop) → pipeline.process(..)` until the stop flag is set or
//! the source reports that its stream has closed.
//!
//! # Shutdown
//!
//! [`PollingWorker::shutdown`] sets the stop flag and waits for the thread's
//! exit signal for a bounded time.  A thread that is still blocked after the
//! timeout is detached: Rust threads cannot be killed, so the caller is
//! expected to close the audio stream first, which unblocks any pending read.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, RecvTimeoutError},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::pipeline::PitchPipeline;
use crate::audio::{AudioBuffer, BlockingReader, CaptureError};

// ---------------------------------------------------------------------------
// SampleSource
// ---------------------------------------------------------------------------

/// Something the worker can pull exact-size buffers from.
pub trait SampleSource: Send {
    /// Block until `n` samples are available.
    fn read(&mut self, n: usize) -> Result<AudioBuffer, CaptureError>;
}

impl SampleSource for BlockingReader {
    fn read(&mut self, n: usize) -> Result<AudioBuffer, CaptureError> {
        BlockingReader::read(self, n)
    }
}

// ---------------------------------------------------------------------------
// ShutdownOutcome
// ---------------------------------------------------------------------------

/// How a [`PollingWorker::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The thread exited in time and was joined.
    Joined,
    /// The thread died from a panic.
    Panicked,
    /// The thread did not exit within the timeout and was detached.
    TimedOut,
    /// `shutdown` had already run.
    AlreadyStopped,
}

// ---------------------------------------------------------------------------
// PollingWorker
// ---------------------------------------------------------------------------

/// Handle to a running polling thread.
pub struct PollingWorker {
    name: String,
    stop: Arc<AtomicBool>,
    exited: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl PollingWorker {
    /// Spawn a thread named `name` that feeds `source` into `pipeline`, one
    /// hop at a time, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn<S>(name: String, mut source: S, mut pipeline: PitchPipeline) -> std::io::Result<Self>
    where
        S: SampleSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = Arc::clone(&stop);
        // Dropped without a send if the thread panics.
        let (exit_tx, exited) = mpsc::channel::<()>();
        let thread_name = name.clone();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            run_loop(&thread_name, &mut source, &mut pipeline, &stop_worker);
            let _ = exit_tx.send(());
        })?;

        log::debug!("{name}: started");
        Ok(Self {
            name,
            stop,
            exited,
            handle: Some(handle),
        })
    }

    /// Ask the loop to finish after the buffer it is currently reading.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// `true` until [`shutdown`](Self::shutdown) has run.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the loop and wait up to `timeout` for the thread to exit.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownOutcome {
        let Some(handle) = self.handle.take() else {
            return ShutdownOutcome::AlreadyStopped;
        };
        self.request_stop();

        match self.exited.recv_timeout(timeout) {
            Ok(()) => match handle.join() {
                Ok(()) => ShutdownOutcome::Joined,
                Err(_) => ShutdownOutcome::Panicked,
            },
            Err(RecvTimeoutError::Disconnected) => {
                // The sender only disappears unsent when the thread unwound.
                let _ = handle.join();
                ShutdownOutcome::Panicked
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "{}: did not exit within {:.1}s, detaching",
                    self.name,
                    timeout.as_secs_f64()
                );
                drop(handle);
                ShutdownOutcome::TimedOut
            }
        }
    }
}

impl Drop for PollingWorker {
    /// Never blocks: a worker that was not shut down is told to stop and
    /// left to finish on its own.
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
        }
    }
}

fn run_loop<S: SampleSource>(
    name: &str,
    source: &mut S,
    pipeline: &mut PitchPipeline,
    stop: &AtomicBool,
) {
    let hop = pipeline.hop_size();
    while !stop.load(Ordering::SeqCst) {
        match source.read(hop) {
            Ok(buffer) => {
                if let Err(e) = pipeline.process(&buffer) {
                    log::warn!("{name}: skipped buffer: {e}");
                }
            }
            Err(CaptureError::Disconnected) => {
                log::debug!("{name}: input closed");
                break;
            }
            Err(e) => {
                log::error!("{name}: capture failed: {e}");
                break;
            }
        }
    }
    log::debug!("{name}: exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    use crate::config::NormalizerConfig;
    use crate::normalize::Normalizer;
    use crate::pitch::ScriptedEstimator;
    use crate::publish::{position_channel, PositionReader};

    const HOP: usize = 4;

    /// Replays queued buffers, then reports the stream as closed.
    struct QueueSource(VecDeque<Vec<f32>>);

    impl SampleSource for QueueSource {
        fn read(&mut self, n: usize) -> Result<AudioBuffer, CaptureError> {
            let buf = self.0.pop_front().ok_or(CaptureError::Disconnected)?;
            assert_eq!(buf.len(), n);
            Ok(AudioBuffer::from(buf))
        }
    }

    /// Produces silence forever, slowly.
    struct EndlessSource;

    impl SampleSource for EndlessSource {
        fn read(&mut self, n: usize) -> Result<AudioBuffer, CaptureError> {
            thread::sleep(Duration::from_millis(2));
            Ok(AudioBuffer::from(vec![0.0; n]))
        }
    }

    /// Signals `entered`, then blocks on a channel nobody sends on.
    struct StuckSource {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl SampleSource for StuckSource {
        fn read(&mut self, _n: usize) -> Result<AudioBuffer, CaptureError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Err(CaptureError::Disconnected)
        }
    }

    /// Signals `entered`, then panics.
    struct PanickingSource {
        entered: mpsc::Sender<()>,
    }

    impl SampleSource for PanickingSource {
        fn read(&mut self, _n: usize) -> Result<AudioBuffer, CaptureError> {
            let _ = self.entered.send(());
            panic!("device vanished");
        }
    }

    fn pipeline(
        script: &[(f64, f64)],
    ) -> (PitchPipeline, PositionReader, Arc<Mutex<Vec<f32>>>) {
        let estimator = ScriptedEstimator::new(HOP, script);
        let seen = Arc::clone(&estimator.seen);
        let (writer, reader) = position_channel();
        let p = PitchPipeline::new(
            Box::new(estimator),
            Normalizer::new(&NormalizerConfig::default()),
            writer,
        );
        (p, reader, seen)
    }

    fn wait_for_exit(worker: &mut PollingWorker) -> ShutdownOutcome {
        worker.shutdown(Duration::from_secs(5))
    }

    #[test]
    fn processes_buffers_in_arrival_order() {
        let (p, reader, seen) = pipeline(&[(50.0, 0.9), (65.0, 0.9)]);
        let source = QueueSource((0..5).map(|i| vec![i as f32; HOP]).collect());

        let mut worker = PollingWorker::spawn("pitch-worker-test".into(), source, p).unwrap();
        // Wait for the source to run dry, then reap the thread.
        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().unwrap().len() < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(wait_for_exit(&mut worker), ShutdownOutcome::Joined);

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reader.publish_count(), 5);
        assert!((reader.latest().value().unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn stop_flag_ends_endless_source() {
        let (p, reader, _) = pipeline(&[]);
        let mut worker = PollingWorker::spawn("pitch-worker-endless".into(), EndlessSource, p).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while reader.publish_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.is_running());
        assert_eq!(wait_for_exit(&mut worker), ShutdownOutcome::Joined);
        assert!(!worker.is_running());
    }

    #[test]
    fn stuck_source_times_out() {
        let (p, _, _) = pipeline(&[]);
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (tx, rx) = mpsc::channel::<()>();
        let source = StuckSource {
            entered: entered_tx,
            release: rx,
        };
        let mut worker = PollingWorker::spawn("pitch-worker-stuck".into(), source, p).unwrap();

        // Only shut down once the thread is inside `read`.
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let started = Instant::now();
        let outcome = worker.shutdown(Duration::from_millis(50));
        assert_eq!(outcome, ShutdownOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));

        // Let the detached thread finish.
        drop(tx);
    }

    #[test]
    fn panicking_source_is_reported() {
        let (p, _, _) = pipeline(&[]);
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let source = PanickingSource { entered: entered_tx };
        let mut worker = PollingWorker::spawn("pitch-worker-panic".into(), source, p).unwrap();

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(wait_for_exit(&mut worker), ShutdownOutcome::Panicked);
    }

    #[test]
    fn second_shutdown_is_a_no_op() {
        let (p, _, _) = pipeline(&[]);
        let source = QueueSource(VecDeque::new());
        let mut worker = PollingWorker::spawn("pitch-worker-twice".into(), source, p).unwrap();
        assert_eq!(wait_for_exit(&mut worker), ShutdownOutcome::Joined);
        assert_eq!(wait_for_exit(&mut worker), ShutdownOutcome::AlreadyStopped);
    }
}
