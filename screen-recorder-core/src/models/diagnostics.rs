use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::phase::SessionPhase;
use super::sample::MediaKind;
use super::state::IngestCounters;

/// Real-time audio level metering (RMS and peak, 0.0–1.0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioLevels {
    pub system_level: f32,
    pub mic_level: f32,
    pub peak_system_level: f32,
    pub peak_mic_level: f32,
}

/// Periodic progress report while a session is live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub phase: SessionPhase,
    /// Active recording time, pauses excluded.
    pub elapsed: Duration,
    pub levels: AudioLevels,
}

/// Write-side statistics for one sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkStats {
    pub written: u64,
    pub out_of_order: u64,
    pub not_accepting: u64,
    pub append_failures: u64,
    pub bytes_in: u64,
}

/// Diagnostics for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDiagnostics {
    pub phase: SessionPhase,
    pub ingest: IngestCounters,
    pub sinks: Vec<(MediaKind, SinkStats)>,
    pub levels: AudioLevels,
    pub pause_count: u32,
    pub timeline_offset_ms: u64,
}

impl SessionDiagnostics {
    pub fn sink(&self, kind: MediaKind) -> Option<&SinkStats> {
        self.sinks.iter().find(|(k, _)| *k == kind).map(|(_, stats)| stats)
    }
}
