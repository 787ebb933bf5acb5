//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for capture, pitch
//! estimation, normalization and the player session, `ControllerConfig` (the
//! frozen per-microphone view), `AppPaths` for the platform settings
//! location, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, CaptureConfig, ControllerConfig, NormalizerConfig, PitchConfig, SessionConfig,
};
