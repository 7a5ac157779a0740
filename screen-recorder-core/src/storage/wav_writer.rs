use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::config::FormatHints;
use crate::models::error::WriterError;
use crate::models::sample::{MediaKind, Sample, SamplePayload};
use crate::processing::audio_convert::AudioConverter;
use crate::processing::wav_format::{WavSpec, MAX_DATA_SIZE, WAV_HEADER_SIZE};
use crate::storage::checksum::sha256_file;
use crate::traits::track_writer::{FinishedTrack, TrackWriter};

/// Streaming 16-bit PCM WAV writer for one audio track.
///
/// ## File Format
/// ```text
/// [44-byte WAV header, sizes patched on finish]
/// [raw 16-bit PCM data...]
/// ```
///
/// Delivered buffers are converted to the track's sample rate and channel
/// count before writing, so one file never mixes formats.
pub struct WavTrackWriter {
    kind: MediaKind,
    file_path: PathBuf,
    spec: WavSpec,
    converter: AudioConverter,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
    data_limit: u64,
    started: bool,
}

impl WavTrackWriter {
    /// Create the file and write a placeholder header.
    pub fn create(kind: MediaKind, file_path: &Path, hints: &FormatHints) -> Result<Self, WriterError> {
        let spec = WavSpec::pcm16(hints.sample_rate, hints.channels).ok_or_else(|| {
            WriterError::CannotCreate(format!(
                "unsupported audio format: {} Hz, {} channel(s)",
                hints.sample_rate, hints.channels
            ))
        })?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WriterError::CannotCreate(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(file_path)
            .map_err(|e| WriterError::CannotCreate(format!("{}: {}", file_path.display(), e)))?;

        let mut writer = Self {
            kind,
            file_path: file_path.to_path_buf(),
            spec,
            converter: AudioConverter::new(hints.sample_rate, hints.channels),
            file: Some(BufWriter::new(file)),
            data_bytes: 0,
            data_limit: MAX_DATA_SIZE,
            started: false,
        };

        if let Err(e) = writer.write_raw(&spec.header(0)) {
            writer.discard();
            return Err(WriterError::CannotCreate(e.to_string()));
        }
        writer.data_bytes = 0;
        Ok(writer)
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Bytes of PCM data written so far (header excluded).
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), WriterError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WriterError::AppendFailed("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| WriterError::AppendFailed(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    fn patch_header(file: &mut File, spec: WavSpec, data_bytes: u64) -> std::io::Result<()> {
        let data_size = u32::try_from(data_bytes)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "data exceeds the WAV size limit"))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&spec.header(data_size))?;
        file.sync_all()
    }
}

impl TrackWriter for WavTrackWriter {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn path(&self) -> &Path {
        &self.file_path
    }

    fn start(&mut self) -> Result<(), WriterError> {
        if self.file.is_none() {
            return Err(WriterError::StartFailed("file is not open".into()));
        }
        self.started = true;
        Ok(())
    }

    fn append(&mut self, sample: &Sample) -> Result<(), WriterError> {
        if !self.started {
            return Err(WriterError::AppendFailed("writer not started".into()));
        }
        let SamplePayload::Audio {
            samples,
            sample_rate,
            channels,
        } = &sample.payload
        else {
            return Err(WriterError::AppendFailed(format!("{} track received a video frame", self.kind)));
        };

        let pcm = self.converter.convert(samples, *sample_rate, *channels);
        if self.data_bytes + pcm.len() as u64 > self.data_limit {
            return Err(WriterError::AppendFailed(format!(
                "{} track reached the WAV size limit ({} bytes)",
                self.kind, self.data_limit
            )));
        }
        self.write_raw(&pcm)
    }

    fn finish(&mut self) -> Result<FinishedTrack, WriterError> {
        let writer = self
            .file
            .take()
            .ok_or_else(|| WriterError::FinishFailed("file is not open".into()))?;
        self.started = false;

        let mut file = writer
            .into_inner()
            .map_err(|e| WriterError::FinishFailed(format!("flush failed: {}", e.error())))?;
        Self::patch_header(&mut file, self.spec, self.data_bytes)
            .map_err(|e| WriterError::FinishFailed(format!("failed to patch header: {}", e)))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        Ok(FinishedTrack {
            path: self.file_path.clone(),
            bytes_written: self.data_bytes + WAV_HEADER_SIZE as u64,
            checksum,
        })
    }

    fn discard(&mut self) {
        self.started = false;
        drop(self.file.take());
        if let Err(e) = fs::remove_file(&self.file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", self.file_path.display(), e);
            }
        }
    }
}
