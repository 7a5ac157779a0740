use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::sample::MediaKind;

/// A finalized track file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOutput {
    pub kind: MediaKind,
    pub file_path: PathBuf,
    pub samples_written: u64,
    pub bytes_written: u64,
    /// First and last written presentation timestamps, in seconds on the
    /// pause-corrected timeline.
    pub first_pts_secs: f64,
    pub last_pts_secs: f64,
    /// SHA-256 hex digest of the finished file.
    pub checksum: String,
}

/// The files a session actually produced. Tracks that never received a
/// sample are omitted.
///
/// Serializable for the JSON sidecar consumed by packaging/UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputManifest {
    pub session_id: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub pause_count: u32,
    pub paused_secs: f64,
    pub tracks: Vec<TrackOutput>,
}

impl OutputManifest {
    pub fn new(tracks: Vec<TrackOutput>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_secs: 0.0,
            pause_count: 0,
            paused_secs: 0.0,
            tracks,
        }
    }

    pub fn track(&self, kind: MediaKind) -> Option<&TrackOutput> {
        self.tracks.iter().find(|track| track.kind == kind)
    }
}
