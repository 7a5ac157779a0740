use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StateError, StreamError};
use super::phase::SessionPhase;
use super::sample::{MediaKind, Sample};
use crate::processing::timestamp_history::TimestampHistory;

/// Track file locations for one session. Assigned while preparing and
/// never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPaths {
    pub video: Option<PathBuf>,
    pub system_audio: Option<PathBuf>,
    pub microphone: Option<PathBuf>,
}

impl OutputPaths {
    pub fn get(&self, kind: MediaKind) -> Option<&Path> {
        match kind {
            MediaKind::Video => self.video.as_deref(),
            MediaKind::SystemAudio => self.system_audio.as_deref(),
            MediaKind::Microphone => self.microphone.as_deref(),
        }
    }

    pub fn set(&mut self, kind: MediaKind, path: PathBuf) {
        match kind {
            MediaKind::Video => self.video = Some(path),
            MediaKind::SystemAudio => self.system_audio = Some(path),
            MediaKind::Microphone => self.microphone = Some(path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.system_audio.is_none() && self.microphone.is_none()
    }

    /// `(kind, path)` pairs for every assigned track, in track order.
    pub fn iter(&self) -> impl Iterator<Item = (MediaKind, &Path)> + '_ {
        MediaKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|path| (kind, path)))
    }
}

/// Ingest filtering counters for one media kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackCounters {
    pub delivered: u64,
    pub incomplete: u64,
    pub duplicates: u64,
    pub not_recording: u64,
    pub admitted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounters {
    tracks: [TrackCounters; 3],
}

impl IngestCounters {
    pub fn track(&self, kind: MediaKind) -> &TrackCounters {
        &self.tracks[kind.index()]
    }

    pub fn track_mut(&mut self, kind: MediaKind) -> &mut TrackCounters {
        &mut self.tracks[kind.index()]
    }
}

/// Result of checking a delivered sample against the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The capture layer did not mark the frame complete.
    Incomplete,
    /// The timestamp is already in the recent history.
    Duplicate,
    /// The session is not in `recording`.
    NotRecording(SessionPhase),
    /// Forward the sample after subtracting `timeline_offset`.
    Accepted { timeline_offset: Duration },
}

/// The complete mutable state of one recording session.
///
/// Only the state store holds this by mutable reference; everything else
/// sees snapshots.
#[derive(Debug, Clone)]
pub struct RecordingState {
    pub phase: SessionPhase,
    pub started_at: Option<Instant>,
    pub started_at_utc: Option<DateTime<Utc>>,
    pub accumulated_pause_duration: Duration,
    pub pause_entered_at: Option<Instant>,
    pub timeline_offset: Duration,
    pub pause_count: u32,
    pub output_paths: OutputPaths,
    pub recent_timestamps: [TimestampHistory; 3],
    pub counters: IngestCounters,
    pub last_error: Option<StreamError>,
    /// Count of applied phase transitions over the store's lifetime.
    /// Survives the reset to `idle`.
    pub transition_seq: u64,
}

impl RecordingState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            phase: SessionPhase::Idle,
            started_at: None,
            started_at_utc: None,
            accumulated_pause_duration: Duration::ZERO,
            pause_entered_at: None,
            timeline_offset: Duration::ZERO,
            pause_count: 0,
            output_paths: OutputPaths::default(),
            recent_timestamps: std::array::from_fn(|_| TimestampHistory::new(history_capacity)),
            counters: IngestCounters::default(),
            last_error: None,
            transition_seq: 0,
        }
    }

    /// Validate and apply `self.phase -> to`, including its pause bookkeeping.
    ///
    /// On error nothing is modified.
    pub fn apply_transition(&mut self, to: SessionPhase, now: Instant) -> Result<(), StateError> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from, to });
        }

        match (from, to) {
            (SessionPhase::Preparing, SessionPhase::Recording) => {
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                    self.started_at_utc = Some(Utc::now());
                }
            }
            (SessionPhase::Recording, SessionPhase::Paused) => {
                self.pause_entered_at = Some(now);
                self.pause_count += 1;
            }
            (SessionPhase::Paused, SessionPhase::Recording) => {
                self.close_pause(now);
                self.timeline_offset = self.accumulated_pause_duration;
            }
            (SessionPhase::Paused, _) => self.close_pause(now),
            (_, SessionPhase::Idle) => {
                let seq = self.transition_seq;
                *self = Self::new(self.history_capacity());
                self.transition_seq = seq + 1;
                return Ok(());
            }
            _ => {}
        }

        self.phase = to;
        self.transition_seq += 1;
        Ok(())
    }

    /// Record the output locations. Only legal once, while preparing.
    pub fn assign_output_paths(&mut self, paths: OutputPaths) -> Result<(), StateError> {
        if self.phase != SessionPhase::Preparing {
            return Err(StateError::NotPreparing(self.phase));
        }
        if !self.output_paths.is_empty() {
            return Err(StateError::OutputPathsAlreadyAssigned);
        }
        self.output_paths = paths;
        Ok(())
    }

    /// Insert into the kind's recent history; `false` means duplicate.
    pub fn record_presentation_timestamp(&mut self, kind: MediaKind, pts: Duration) -> bool {
        self.recent_timestamps[kind.index()].insert(pts)
    }

    /// Completeness, duplicate and phase checks for one delivered sample,
    /// applied as a single atomic step.
    pub fn admit(&mut self, kind: MediaKind, sample: &Sample) -> Admission {
        self.counters.track_mut(kind).delivered += 1;

        if !sample.is_complete() {
            self.counters.track_mut(kind).incomplete += 1;
            return Admission::Incomplete;
        }
        if !self.record_presentation_timestamp(kind, sample.pts) {
            self.counters.track_mut(kind).duplicates += 1;
            return Admission::Duplicate;
        }
        if self.phase != SessionPhase::Recording {
            self.counters.track_mut(kind).not_recording += 1;
            return Admission::NotRecording(self.phase);
        }

        self.counters.track_mut(kind).admitted += 1;
        Admission::Accepted {
            timeline_offset: self.timeline_offset,
        }
    }

    /// Time spent recording since start, excluding pauses.
    pub fn active_duration(&self, now: Instant) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let open_pause = self
            .pause_entered_at
            .map(|entered| now.saturating_duration_since(entered))
            .unwrap_or_default();
        now.saturating_duration_since(start)
            .saturating_sub(self.accumulated_pause_duration)
            .saturating_sub(open_pause)
    }

    pub fn history_capacity(&self) -> usize {
        self.recent_timestamps[0].capacity()
    }

    fn close_pause(&mut self, now: Instant) {
        if let Some(entered) = self.pause_entered_at.take() {
            self.accumulated_pause_duration += now.saturating_duration_since(entered);
        }
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::new(30)
    }
}
