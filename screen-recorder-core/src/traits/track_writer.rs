use std::path::{Path, PathBuf};

use crate::models::config::FormatHints;
use crate::models::error::WriterError;
use crate::models::sample::{MediaKind, Sample};

/// A track file that was finalized successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTrack {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// SHA-256 hex digest of the finished file.
    pub checksum: String,
}

/// Writer handle for one output track.
///
/// Lifecycle: created (file exists, nothing accepted) → `start` → any
/// number of `append` → `finish` or `discard`. The coordinator serializes
/// calls per handle and enforces timestamp ordering; implementations only
/// deal with encoding and I/O.
pub trait TrackWriter: Send {
    fn kind(&self) -> MediaKind;

    fn path(&self) -> &Path;

    /// Begin accepting samples.
    fn start(&mut self) -> Result<(), WriterError>;

    /// Encode and write one retimed sample.
    fn append(&mut self, sample: &Sample) -> Result<(), WriterError>;

    /// Flush, finalize headers and close the file.
    fn finish(&mut self) -> Result<FinishedTrack, WriterError>;

    /// Close without finalizing and remove the file. Must be safe to call
    /// in any state, including after a failed `finish`.
    fn discard(&mut self);
}

/// Creates writer handles for the requested tracks.
pub trait WriterFactory: Send + Sync {
    fn create(
        &self,
        kind: MediaKind,
        path: &Path,
        hints: &FormatHints,
    ) -> Result<Box<dyn TrackWriter>, WriterError>;
}
