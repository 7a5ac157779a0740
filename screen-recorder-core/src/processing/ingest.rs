use std::sync::Arc;
use std::time::Duration;

use crate::models::error::WriterError;
use crate::models::phase::SessionPhase;
use crate::models::sample::{MediaKind, Sample, SamplePayload};
use crate::models::state::Admission;
use crate::processing::levels::LevelMeter;
use crate::session::store::RecordingStateStore;
use crate::storage::coordinator::{AppendOutcome, MediaWriterCoordinator};

/// What the ingest path did with one delivered sample.
///
/// Everything except `WriterFailed { systemic: true, .. }` is routine
/// filtering and needs no action from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Written,
    /// Not marked complete by the capture layer.
    Incomplete,
    /// Same presentation timestamp seen recently for this kind.
    Duplicate,
    /// Delivered while the session was not recording (paused, preparing, stopping).
    NotRecording(SessionPhase),
    /// Behind the sink's last written timestamp after pause correction.
    OutOfOrder,
    /// Sink not started yet or already finishing.
    NotAccepting,
    /// No track was requested for this kind.
    NoTrack,
    WriterFailed { error: WriterError, systemic: bool },
}

impl IngestOutcome {
    /// The writer error the controller must escalate, if any.
    pub fn systemic_failure(&self) -> Option<&WriterError> {
        match self {
            Self::WriterFailed { error, systemic: true } => Some(error),
            _ => None,
        }
    }
}

/// The per-sample hot path between capture callbacks and the writers.
///
/// Called concurrently from the capture layer's delivery threads. Never
/// blocks longer than one store critical section plus one bounded sink
/// append, and never returns an error.
pub struct SampleIngestPipeline {
    store: Arc<RecordingStateStore>,
    coordinator: Arc<MediaWriterCoordinator>,
    meter: Arc<LevelMeter>,
}

impl SampleIngestPipeline {
    pub fn new(store: Arc<RecordingStateStore>, coordinator: Arc<MediaWriterCoordinator>, meter: Arc<LevelMeter>) -> Self {
        Self {
            store,
            coordinator,
            meter,
        }
    }

    pub fn ingest(&self, kind: MediaKind, sample: Sample) -> IngestOutcome {
        let timeline_offset = match self.store.admit(kind, &sample) {
            Admission::Incomplete => return IngestOutcome::Incomplete,
            Admission::Duplicate => return IngestOutcome::Duplicate,
            Admission::NotRecording(phase) => return IngestOutcome::NotRecording(phase),
            Admission::Accepted { timeline_offset } => timeline_offset,
        };

        if let SamplePayload::Audio { samples, .. } = &sample.payload {
            self.meter.update(kind, samples);
        }

        let Some(adjusted) = retime(&sample, timeline_offset) else {
            return IngestOutcome::OutOfOrder;
        };

        match self.coordinator.append(kind, &adjusted) {
            AppendOutcome::Written => IngestOutcome::Written,
            AppendOutcome::NoSink => IngestOutcome::NoTrack,
            AppendOutcome::NotAccepting => IngestOutcome::NotAccepting,
            AppendOutcome::OutOfOrder { .. } => IngestOutcome::OutOfOrder,
            AppendOutcome::Failed { error, systemic } => {
                if systemic {
                    log::error!("{} sink keeps failing: {}", kind, error);
                }
                IngestOutcome::WriterFailed { error, systemic }
            }
        }
    }
}

/// Subtract the pause correction. `None` when the sample predates the
/// offset, which can only happen for stale pre-pause deliveries.
fn retime(sample: &Sample, timeline_offset: Duration) -> Option<Sample> {
    if timeline_offset.is_zero() {
        return Some(sample.clone());
    }
    sample
        .pts
        .checked_sub(timeline_offset)
        .map(|pts| sample.retimed(pts))
}
