//! Microphone capture via `cpal`.
//!
//! [`MicCapture`] resolves a [`DeviceId`] and picks a stream configuration.
//! Audio then reaches the pipeline in one of two ways ([`CaptureMode`]):
//!
//! * [`MicCapture::start_blocking`]: the cpal callback forwards mono chunks
//!   over a bounded queue and a worker thread pulls exact-size buffers with
//!   [`BlockingReader::read`].  A full queue drops the incoming chunk rather
//!   than build up a backlog.  Consumed chunks travel back to the callback
//!   for reuse, so the audio thread stops allocating once warmed up.
//! * [`MicCapture::start_callback`]: the cpal callback itself re-chunks the
//!   audio into hops and calls the registered closure on the audio thread.
//!
//! Both return a [`StreamHandle`], an RAII guard: closing or dropping it
//! stops the stream and releases the device.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, Receiver, SyncSender, TrySendError},
    Arc,
};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::buffer::{AudioBuffer, HopBuffer};
use super::devices::{device_name, resolve_input_device, DeviceId};
use super::mix::downmix_into;
use crate::config::CaptureConfig;

/// Overflow drops are logged once per this many.
const OVERFLOW_LOG_EVERY: u64 = 64;

// ---------------------------------------------------------------------------
// CaptureMode
// ---------------------------------------------------------------------------

/// How captured audio is delivered to the pitch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// A dedicated worker thread blocks on [`BlockingReader::read`].
    #[default]
    Blocking,
    /// The pipeline runs inside the backend's audio callback.
    Callback,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or reading a microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("input device '{device}' unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The stream feeding a [`BlockingReader`] has been closed.
    #[error("input stream closed")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// [`close`](Self::close) is idempotent; dropping the handle closes it too.
pub struct StreamHandle {
    stream: Option<cpal::Stream>,
    overflows: Arc<AtomicU64>,
    device_name: String,
}

impl StreamHandle {
    fn new(stream: cpal::Stream, overflows: Arc<AtomicU64>, device_name: String) -> Self {
        Self {
            stream: Some(stream),
            overflows,
            device_name,
        }
    }

    /// Stop the stream and release the device.  Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("pausing '{}' before close failed: {e}", self.device_name);
            }
            drop(stream);
            log::info!("closed input stream '{}'", self.device_name);
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Backend chunks dropped because the blocking reader fell behind.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// BlockingReader
// ---------------------------------------------------------------------------

/// Pull side of a blocking-mode stream.  `Send`, so it can move onto the
/// worker thread while the [`StreamHandle`] stays with its owner.
pub struct BlockingReader {
    rx: Receiver<Vec<f32>>,
    recycle: SyncSender<Vec<f32>>,
    pending: Vec<f32>,
}

impl BlockingReader {

    /// Block until exactly `n` samples are available and return them.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Disconnected`] once the stream is closed and the
    /// remaining queued audio cannot fill a buffer.
    pub fn read(&mut self, n: usize) -> Result<AudioBuffer, CaptureError> {
        while self.pending.len() < n {
            let chunk = self.rx.recv().map_err(|_| CaptureError::Disconnected)?;
            self.pending.extend_from_slice(&chunk);
            // Pool full or callback gone: let the chunk drop.
            let _ = self.recycle.try_send(chunk);
        }
        let rest = self.pending.split_off(n);
        Ok(AudioBuffer::from(std::mem::replace(&mut self.pending, rest)))
    }
}

// ---------------------------------------------------------------------------
// MicCapture
// ---------------------------------------------------------------------------

/// An opened (but not yet streaming) microphone.
///
/// # Example
///
/// ```rust,no_run
/// use voice_paddle::audio::{DeviceId, MicCapture};
/// use voice_paddle::config::CaptureConfig;
///
/// let capture = MicCapture::open(&DeviceId::Default, &CaptureConfig::default()).unwrap();
/// let (mut handle, mut reader) = capture.start_blocking().unwrap();
/// let hop = reader.read(1024).unwrap();
/// assert_eq!(hop.len(), 1024);
/// handle.close();
/// ```
pub struct MicCapture {
    device: cpal::Device,
    device_name: String,
    config: cpal::StreamConfig,
    sample_format: SampleFormat,
    hop_size: usize,
    queue_depth: usize,
}

impl MicCapture {
    /// Resolve `device` and choose a stream configuration.
    ///
    /// Prefers a config that supports `config.sample_rate` with the fewest
    /// channels, `f32` first.  If the device cannot run at that rate its
    /// default config is used instead; check [`sample_rate`](Self::sample_rate)
    /// for the rate actually in effect.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceUnavailable`] when the device cannot be found,
    /// [`CaptureError::DefaultConfig`] when it reports no usable config.
    pub fn open(device: &DeviceId, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let dev = resolve_input_device(&host, device)?;
        let name = device_name(&dev);

        let chosen = match preferred_config(&dev, config.sample_rate) {
            Some(chosen) => chosen,
            None => {
                let fallback = dev.default_input_config()?;
                log::warn!(
                    "'{name}' cannot capture at {} Hz; using {} Hz",
                    config.sample_rate,
                    fallback.sample_rate().0
                );
                fallback
            }
        };

        let sample_format = chosen.sample_format();
        if !is_supported_format(sample_format) {
            return Err(CaptureError::UnsupportedFormat(sample_format));
        }

        log::info!(
            "opened '{name}' ({} Hz, {} ch, {:?})",
            chosen.sample_rate().0,
            chosen.channels(),
            sample_format
        );

        Ok(Self {
            device: dev,
            device_name: name,
            config: chosen.config(),
            sample_format,
            hop_size: config.hop_size,
            queue_depth: config.queue_depth.max(1),
        })
    }

    /// Start streaming into a bounded queue read by a [`BlockingReader`].
    pub fn start_blocking(&self) -> Result<(StreamHandle, BlockingReader), CaptureError> {
        let overflows = Arc::new(AtomicU64::new(0));
        let (mut queue, reader) =
            chunk_queue(self.queue_depth, Arc::clone(&overflows), self.device_name.clone());

        let stream = self.build_stream(move |mono: &[f32]| queue.push(mono))?;
        stream.play()?;

        Ok((
            StreamHandle::new(stream, overflows, self.device_name.clone()),
            reader,
        ))
    }

    /// Start streaming, calling `on_hop` with every complete hop on the
    /// audio thread.  `on_hop` must not block.
    pub fn start_callback<F>(&self, mut on_hop: F) -> Result<StreamHandle, CaptureError>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let mut hops = HopBuffer::new(self.hop_size);
        let stream = self.build_stream(move |mono: &[f32]| hops.push(mono, &mut on_hop))?;
        stream.play()?;

        Ok(StreamHandle::new(
            stream,
            Arc::new(AtomicU64::new(0)),
            self.device_name.clone(),
        ))
    }

    /// Sample rate in Hz the stream runs at.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Channels the device delivers before down-mixing.
    pub fn device_channels(&self) -> u16 {
        self.config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn build_stream<F>(&self, on_mono: F) -> Result<cpal::Stream, CaptureError>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        match self.sample_format {
            SampleFormat::F32 => self.build_typed::<f32, F>(on_mono),
            SampleFormat::I16 => self.build_typed::<i16, F>(on_mono),
            SampleFormat::U16 => self.build_typed::<u16, F>(on_mono),
            other => Err(CaptureError::UnsupportedFormat(other)),
        }
    }

    fn build_typed<T, F>(&self, mut on_mono: F) -> Result<cpal::Stream, CaptureError>
    where
        T: SizedSample,
        f32: FromSample<T>,
        F: FnMut(&[f32]) + Send + 'static,
    {
        let channels = self.config.channels;
        let name = self.device_name.clone();
        let mut scratch: Vec<f32> = Vec::new();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                downmix_into(data, channels, &mut scratch);
                on_mono(&scratch);
            },
            move |err: cpal::StreamError| {
                log::error!("input stream error on '{name}': {err}");
            },
            None, // no timeout
        )?;
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// ChunkQueue
// ---------------------------------------------------------------------------

/// Callback side of the blocking-mode queue.  Never waits.
struct ChunkQueue {
    tx: SyncSender<Vec<f32>>,
    recycled: Receiver<Vec<f32>>,
    /// A chunk refused by a full queue, kept for the next callback.
    spare: Option<Vec<f32>>,
    overflows: Arc<AtomicU64>,
    device_name: String,
}

/// A bounded queue of `depth` chunks plus the return path for spent ones.
fn chunk_queue(
    depth: usize,
    overflows: Arc<AtomicU64>,
    device_name: String,
) -> (ChunkQueue, BlockingReader) {
    let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(depth);
    // One extra slot covers the chunk the reader holds between reads.
    let (recycle, recycled) = mpsc::sync_channel::<Vec<f32>>(depth + 1);

    let queue = ChunkQueue {
        tx,
        recycled,
        spare: None,
        overflows,
        device_name,
    };
    let reader = BlockingReader {
        rx,
        recycle,
        pending: Vec::new(),
    };
    (queue, reader)
}

impl ChunkQueue {
    fn push(&mut self, mono: &[f32]) {
        let mut chunk = self
            .spare
            .take()
            .or_else(|| self.recycled.try_recv().ok())
            .unwrap_or_default();
        chunk.clear();
        chunk.extend_from_slice(mono);

        match self.tx.try_send(chunk) {
            Ok(()) => {}
            Err(TrySendError::Full(chunk)) => {
                self.spare = Some(chunk);
                let dropped = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % OVERFLOW_LOG_EVERY == 0 {
                    log::debug!(
                        "'{}': reader behind, {dropped} chunks dropped",
                        self.device_name
                    );
                }
            }
            // Reader gone; the owner is about to close the stream.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

/// Best supported config at `sample_rate`: fewest channels, then `f32`.
fn preferred_config(device: &cpal::Device, sample_rate: u32) -> Option<cpal::SupportedStreamConfig> {
    let rate = cpal::SampleRate(sample_rate);
    let ranges = match device.supported_input_configs() {
        Ok(ranges) => ranges,
        Err(e) => {
            log::debug!("cannot list input configs: {e}");
            return None;
        }
    };

    ranges
        .filter(|r| is_supported_format(r.sample_format()))
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .min_by_key(|r| (r.channels(), r.sample_format() != SampleFormat::F32))
        .map(|r| r.with_sample_rate(rate))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(depth: usize) -> (ChunkQueue, BlockingReader, Arc<AtomicU64>) {
        let overflows = Arc::new(AtomicU64::new(0));
        let (q, r) = chunk_queue(depth, Arc::clone(&overflows), "test".into());
        (q, r, overflows)
    }

    #[test]
    fn reader_assembles_exact_reads_across_chunks() {
        let (mut q, mut reader, _) = queue(8);

        q.push(&[1.0, 2.0, 3.0]);
        q.push(&[4.0, 5.0, 6.0]);

        assert_eq!(&*reader.read(4).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        q.push(&[7.0]);
        assert_eq!(&*reader.read(3).unwrap(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn reader_reports_disconnect() {
        let (mut q, mut reader, _) = queue(8);

        q.push(&[0.0; 3]);
        drop(q);
        assert!(matches!(reader.read(4), Err(CaptureError::Disconnected)));
    }

    #[test]
    fn reader_drains_queue_before_disconnect() {
        let (mut q, mut reader, _) = queue(8);

        q.push(&[0.25; 4]);
        drop(q);
        assert_eq!(reader.read(4).unwrap().len(), 4);
        assert!(matches!(reader.read(4), Err(CaptureError::Disconnected)));
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (mut q, mut reader, overflows) = queue(2);

        for i in 0..5 {
            q.push(&[i as f32]);
        }

        assert_eq!(overflows.load(Ordering::Relaxed), 3);
        // The oldest two chunks made it through; later ones were dropped.
        assert_eq!(&*reader.read(2).unwrap(), &[0.0, 1.0]);
        drop(q);
        assert!(matches!(reader.read(1), Err(CaptureError::Disconnected)));
    }

    #[test]
    fn spent_chunks_return_to_the_callback() {
        let (mut q, mut reader, _) = queue(4);

        q.push(&[1.0; 256]);
        reader.read(256).unwrap();

        // The next callback fills the same allocation.
        let reused = q.recycled.try_recv().expect("chunk handed back");
        assert!(reused.capacity() >= 256);
        let ptr = reused.as_ptr();
        q.spare = Some(reused);

        q.push(&[2.0; 16]);
        let queued = reader.rx.try_recv().unwrap();
        assert_eq!(queued.as_ptr(), ptr);
        assert_eq!(queued, vec![2.0; 16]);
    }

    #[test]
    fn callback_after_reader_dropped_is_silent() {
        let (mut q, reader, overflows) = queue(1);
        drop(reader);

        q.push(&[0.0; 16]);
        assert_eq!(overflows.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn reader_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BlockingReader>();
    }

    #[test]
    fn mode_serialises_lowercase() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            mode: CaptureMode,
        }
        let text = toml::to_string(&Wrap {
            mode: CaptureMode::Callback,
        })
        .unwrap();
        assert_eq!(text.trim(), "mode = \"callback\"");
        let back: Wrap = toml::from_str("mode = \"blocking\"").unwrap();
        assert_eq!(back.mode, CaptureMode::Blocking);
    }
}
