//! Per-microphone controllers and the player session that owns them.
//!
//! # Architecture
//!
//! ```text
//! PitchSession::initialize(&AppConfig)
//!        │
//!        ├─ MicController (right)          ┐ one per microphone,
//!        └─ MicController (left, optional) ┘ fully independent
//!
//! MicController
//!        │
//!        ├─ Blocking mode:  PollingWorker thread
//!        │     loop { BlockingReader::read(hop) → PitchPipeline::process }
//!        │
//!        └─ Callback mode:  cpal audio thread
//!              HopBuffer → PitchPipeline::process
//!
//! PitchPipeline::process = PitchEstimate → Normalizer → PositionWriter
//!
//! game loop ── PitchSession::position(Player) ── PositionReader::latest()
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_paddle::config::AppConfig;
//! use voice_paddle::controller::{PitchSession, Player};
//!
//! let mut session = PitchSession::initialize(&AppConfig::default()).unwrap();
//!
//! // Every frame:
//! if let Some(y) = session.position(Player::Right).value() {
//!     // 0.0 = lowest note heard so far, 1.0 = highest.
//!     println!("paddle at {y:.2}");
//! }
//!
//! session.cleanup();
//! ```

pub mod mic;
pub mod pipeline;
pub mod session;
pub mod worker;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use mic::MicController;
pub use pipeline::PitchPipeline;
pub use session::{PitchSession, Player};
pub use worker::{PollingWorker, SampleSource, ShutdownOutcome};

use thiserror::Error;

use crate::audio::CaptureError;
use crate::pitch::PitchError;

// ---------------------------------------------------------------------------
// ControllerError
// ---------------------------------------------------------------------------

/// Errors raised while setting up a controller or session.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Pitch(#[from] PitchError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
