//! # screen-recorder-synthetic
//!
//! Test-pattern capture backend for screen-recorder-core.
//!
//! Provides:
//! - `SyntheticStream`: a `CaptureStream` delivering a moving bar pattern and
//!   sine-tone audio on real-time paced threads, with optional duplicate,
//!   idle-frame and failure injection
//! - `generator`: the pattern and tone generators
//!
//! ## Usage
//! ```ignore
//! use screen_recorder_core::{EngineConfig, RecordingOptions, StreamSessionController};
//! use screen_recorder_synthetic::SyntheticStream;
//!
//! let controller = StreamSessionController::new(SyntheticStream::new(), EngineConfig::default());
//! controller.begin(RecordingOptions::default())?;
//! // ...
//! let manifest = controller.stop()?;
//! ```

pub mod generator;
pub mod stream;

pub use stream::{DeliveryStats, SyntheticHandle, SyntheticStream};
