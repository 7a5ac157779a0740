//! # screen-recorder-core
//!
//! Platform-agnostic recording session engine for a screen recorder.
//!
//! Owns the recording state machine, filters and retimes delivered frames,
//! and drives one writer per output track. Platform capture backends
//! implement the `CaptureStream` trait and plug into the generic
//! `StreamSessionController`.
//!
//! ## Architecture
//!
//! ```text
//! screen-recorder-core (this crate)
//! ├── traits/       ← CaptureStream, AuthorizationGate, SessionObserver, TrackWriter
//! ├── models/       ← SessionPhase, RecordingState, Sample, RecordingOptions, errors, manifest
//! ├── processing/   ← SampleIngestPipeline, TimestampHistory, AudioConverter, LevelMeter, WAV headers
//! ├── session/      ← StreamSessionController, RecordingStateStore, EventBus, DurationTicker
//! └── storage/      ← MediaWriterCoordinator, WAV and frame file writers, manifest sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::config::{EngineConfig, FormatHints, PartialFilePolicy, RecordingOptions};
pub use models::diagnostics::{AudioLevels, ProgressUpdate, SessionDiagnostics, SinkStats};
pub use models::error::{SessionError, StateError, StreamError, WriterError};
pub use models::manifest::{OutputManifest, TrackOutput};
pub use models::phase::SessionPhase;
pub use models::sample::{FrameStatus, MediaKind, Sample, SamplePayload};
pub use models::state::{OutputPaths, RecordingState};
pub use processing::ingest::{IngestOutcome, SampleIngestPipeline};
pub use session::clock::{Clock, ManualClock, SystemClock};
pub use session::controller::{SessionComponents, StreamSessionController};
pub use session::events::{EventBus, SessionEvent};
pub use session::store::RecordingStateStore;
pub use storage::coordinator::{AppendOutcome, MediaWriterCoordinator};
pub use storage::file_factory::FileWriterFactory;
pub use traits::authorization::{AlwaysAuthorized, AuthorizationGate};
pub use traits::capture_stream::{CaptureStream, FailureCallback, SampleCallback, StreamCallbacks, StreamConfiguration};
pub use traits::observer::SessionObserver;
pub use traits::track_writer::{FinishedTrack, TrackWriter, WriterFactory};
