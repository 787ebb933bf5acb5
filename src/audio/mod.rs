//! Audio capture: microphone → mono `f32` → hop-sized buffers.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_into (mono)
//!   ├─ Blocking: sync_channel (drop when full) → BlockingReader::read(hop)
//!   └─ Callback: HopBuffer → on_hop(&[f32]) on the audio thread
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_paddle::audio::{list_input_devices, DeviceId, MicCapture};
//! use voice_paddle::config::CaptureConfig;
//!
//! for dev in list_input_devices().unwrap() {
//!     println!("{}: {} ({} ch)", dev.index, dev.name, dev.max_input_channels);
//! }
//!
//! let capture = MicCapture::open(&DeviceId::Index(0), &CaptureConfig::default()).unwrap();
//! let _handle = capture
//!     .start_callback(|hop| println!("{} samples", hop.len()))
//!     .unwrap(); // drops handle → stops stream
//! ```

pub mod buffer;
pub mod capture;
pub mod devices;
pub mod mix;

pub use buffer::{AudioBuffer, HopBuffer};
pub use capture::{BlockingReader, CaptureError, CaptureMode, MicCapture, StreamHandle};
pub use devices::{list_input_devices, resolve_input_device, DeviceId, InputDeviceInfo};
pub use mix::downmix_into;
