//! In-memory writer doubles shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::FormatHints;
use crate::models::error::WriterError;
use crate::models::sample::{MediaKind, Sample};
use crate::traits::track_writer::{FinishedTrack, TrackWriter, WriterFactory};

/// What the in-memory writers saw, in call order.
#[derive(Default)]
pub struct Journal {
    pub created: Mutex<Vec<MediaKind>>,
    pub appended: Mutex<Vec<(MediaKind, Duration)>>,
    pub finished: Mutex<Vec<MediaKind>>,
    pub discarded: Mutex<Vec<MediaKind>>,
}

impl Journal {
    pub fn appended_for(&self, kind: MediaKind) -> Vec<Duration> {
        self.appended
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, pts)| *pts)
            .collect()
    }
}

/// Which kind, if any, fails at each lifecycle step.
#[derive(Clone, Default)]
pub struct Faults {
    pub create: Option<MediaKind>,
    pub start: Option<MediaKind>,
    pub append: Option<MediaKind>,
    pub finish: Option<MediaKind>,
}

pub struct MemoryWriter {
    kind: MediaKind,
    path: PathBuf,
    journal: Arc<Journal>,
    faults: Faults,
    entered: Option<mpsc::Sender<()>>,
    hold: Duration,
}

impl TrackWriter for MemoryWriter {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn start(&mut self) -> Result<(), WriterError> {
        if self.faults.start == Some(self.kind) {
            return Err(WriterError::StartFailed("refused".into()));
        }
        Ok(())
    }

    fn append(&mut self, sample: &Sample) -> Result<(), WriterError> {
        if let Some(tx) = &self.entered {
            tx.send(()).ok();
            thread::sleep(self.hold);
        }
        if self.faults.append == Some(self.kind) {
            return Err(WriterError::AppendFailed("disk full".into()));
        }
        self.journal.appended.lock().push((self.kind, sample.pts));
        Ok(())
    }

    fn finish(&mut self) -> Result<FinishedTrack, WriterError> {
        if self.faults.finish == Some(self.kind) {
            return Err(WriterError::FinishFailed("io".into()));
        }
        self.journal.finished.lock().push(self.kind);
        Ok(FinishedTrack {
            path: self.path.clone(),
            bytes_written: 1,
            checksum: "00".into(),
        })
    }

    fn discard(&mut self) {
        self.journal.discarded.lock().push(self.kind);
    }
}

pub struct MemoryFactory {
    pub journal: Arc<Journal>,
    pub faults: Faults,
    /// Signalled on every append, which then sleeps for `hold`.
    pub entered: Option<mpsc::Sender<()>>,
    pub hold: Duration,
}

impl MemoryFactory {
    pub fn new(faults: Faults) -> (Arc<Self>, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let factory = Arc::new(Self {
            journal: journal.clone(),
            faults,
            entered: None,
            hold: Duration::ZERO,
        });
        (factory, journal)
    }
}

impl WriterFactory for MemoryFactory {
    fn create(&self, kind: MediaKind, path: &Path, _hints: &FormatHints) -> Result<Box<dyn TrackWriter>, WriterError> {
        if self.faults.create == Some(kind) {
            return Err(WriterError::CannotCreate(format!("{} unwritable", path.display())));
        }
        self.journal.created.lock().push(kind);
        Ok(Box::new(MemoryWriter {
            kind,
            path: path.to_path_buf(),
            journal: self.journal.clone(),
            faults: self.faults.clone(),
            entered: self.entered.clone(),
            hold: self.hold,
        }))
    }
}

pub fn video_frame(pts: Duration) -> Sample {
    Sample::video(pts, 2, 2, vec![0u8; 16])
}

pub fn audio_buffer(pts: Duration, frames: usize) -> Sample {
    Sample::audio(pts, vec![0.25f32; frames * 2], 48000.0, 2)
}
