use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::config::FormatHints;
use crate::models::error::WriterError;
use crate::models::sample::{MediaKind, Sample, SamplePayload};
use crate::storage::checksum::sha256_file;
use crate::traits::track_writer::{FinishedTrack, TrackWriter};

pub const FRAME_FILE_MAGIC: &[u8; 8] = b"SRFRAMES";
pub const FRAME_FILE_VERSION: u32 = 1;
pub const FRAME_FILE_HEADER_SIZE: usize = 36;
const FRAME_COUNT_OFFSET: u64 = 28;

/// Raw video track writer.
///
/// Frames are stored uncompressed; encoding into a delivery codec is done
/// downstream from the finished file.
///
/// ## File Format
/// ```text
/// [0-7]   "SRFRAMES"
/// [8-11]  version (u32 LE)
/// [12-15] nominal width      [16-19] nominal height
/// [20-27] frame rate (f64 LE)
/// [28-35] frame count (u64 LE, patched on finish)
/// then per frame:
///   [pts µs u64] [width u32] [height u32] [length u32] [pixel data]
/// ```
pub struct FrameFileWriter {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    frames: u64,
    bytes_written: u64,
    started: bool,
}

impl FrameFileWriter {
    pub fn create(file_path: &Path, hints: &FormatHints) -> Result<Self, WriterError> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WriterError::CannotCreate(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(file_path)
            .map_err(|e| WriterError::CannotCreate(format!("{}: {}", file_path.display(), e)))?;

        let mut header = Vec::with_capacity(FRAME_FILE_HEADER_SIZE);
        header.extend_from_slice(FRAME_FILE_MAGIC);
        header.extend_from_slice(&FRAME_FILE_VERSION.to_le_bytes());
        header.extend_from_slice(&hints.width.to_le_bytes());
        header.extend_from_slice(&hints.height.to_le_bytes());
        header.extend_from_slice(&hints.frame_rate.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());

        let mut writer = Self {
            file_path: file_path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            frames: 0,
            bytes_written: 0,
            started: false,
        };
        if let Err(e) = writer.write_raw(&header) {
            writer.discard();
            return Err(WriterError::CannotCreate(e.to_string()));
        }
        Ok(writer)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), WriterError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WriterError::AppendFailed("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| WriterError::AppendFailed(format!("write failed: {}", e)))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

impl TrackWriter for FrameFileWriter {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
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
        let SamplePayload::Video { width, height, data } = &sample.payload else {
            return Err(WriterError::AppendFailed("video track received an audio buffer".into()));
        };

        let data_len = u32::try_from(data.len())
            .map_err(|_| WriterError::AppendFailed(format!("frame of {} bytes is too large", data.len())))?;

        let mut record = Vec::with_capacity(20);
        record.extend_from_slice(&(sample.pts.as_micros() as u64).to_le_bytes());
        record.extend_from_slice(&width.to_le_bytes());
        record.extend_from_slice(&height.to_le_bytes());
        record.extend_from_slice(&data_len.to_le_bytes());
        self.write_raw(&record)?;
        self.write_raw(data)?;
        self.frames += 1;
        Ok(())
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
        file.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))
            .and_then(|_| file.write_all(&self.frames.to_le_bytes()))
            .and_then(|_| file.sync_all())
            .map_err(|e| WriterError::FinishFailed(format!("failed to patch frame count: {}", e)))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        Ok(FinishedTrack {
            path: self.file_path.clone(),
            bytes_written: self.bytes_written,
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
