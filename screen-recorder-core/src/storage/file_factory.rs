use std::path::Path;

use crate::models::config::FormatHints;
use crate::models::error::WriterError;
use crate::models::sample::MediaKind;
use crate::storage::frame_writer::FrameFileWriter;
use crate::storage::wav_writer::WavTrackWriter;
use crate::traits::track_writer::{TrackWriter, WriterFactory};

/// Default factory: raw frame file for video, PCM WAV for each audio track.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileWriterFactory;

impl FileWriterFactory {
    /// File extension used for each track kind.
    pub fn extension(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Video => "frames",
            MediaKind::SystemAudio | MediaKind::Microphone => "wav",
        }
    }
}

impl WriterFactory for FileWriterFactory {
    fn create(
        &self,
        kind: MediaKind,
        path: &Path,
        hints: &FormatHints,
    ) -> Result<Box<dyn TrackWriter>, WriterError> {
        let writer: Box<dyn TrackWriter> = match kind {
            MediaKind::Video => Box::new(FrameFileWriter::create(path, hints)?),
            MediaKind::SystemAudio | MediaKind::Microphone => Box::new(WavTrackWriter::create(kind, path, hints)?),
        };
        log::debug!("Created {} writer at {}", kind, path.display());
        Ok(writer)
    }
}
