use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::models::config::{FormatHints, PartialFilePolicy};
use crate::models::diagnostics::SinkStats;
use crate::models::error::WriterError;
use crate::models::manifest::{OutputManifest, TrackOutput};
use crate::models::sample::{MediaKind, Sample};
use crate::models::state::OutputPaths;
use crate::traits::track_writer::{TrackWriter, WriterFactory};

/// What happened to one sample handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Written,
    /// No track was prepared for this kind.
    NoSink,
    /// The sink is not started yet or is already finishing.
    NotAccepting,
    /// Older than the last written timestamp; dropped to keep the file valid.
    OutOfOrder { last_written: Duration },
    /// The writer rejected the sample. `systemic` is set once the sink has
    /// failed too many times in a row.
    Failed { error: WriterError, systemic: bool },
}

/// One output track: the writer handle plus its ordering bookkeeping.
struct MediaSink {
    writer: Box<dyn TrackWriter>,
    first_written: Option<Duration>,
    last_written: Option<Duration>,
    stats: SinkStats,
}

/// A sink and the flags that can be read without taking its lock.
struct SinkSlot {
    kind: MediaKind,
    accepting: AtomicBool,
    not_accepting: AtomicU64,
    consecutive_failures: AtomicU32,
    sink: Mutex<MediaSink>,
}

impl SinkSlot {
    fn stats(&self) -> SinkStats {
        let mut stats = self.sink.lock().stats;
        stats.not_accepting = self.not_accepting.load(Ordering::Relaxed);
        stats
    }
}

/// Owns the per-track writers of a session and their
/// prepare → start → append → finish lifecycle.
///
/// Appends for different kinds run in parallel; appends for one kind are
/// serialized by that sink's lock, which is only ever waited on for
/// `append_timeout`.
pub struct MediaWriterCoordinator {
    factory: Arc<dyn WriterFactory>,
    slots: RwLock<Vec<Arc<SinkSlot>>>,
    append_timeout: Duration,
    max_consecutive_failures: u32,
}

impl MediaWriterCoordinator {
    pub fn new(factory: Arc<dyn WriterFactory>, append_timeout: Duration, max_consecutive_failures: u32) -> Self {
        Self {
            factory,
            slots: RwLock::new(Vec::new()),
            append_timeout,
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    /// Create one writer per assigned path. Either every track is created
    /// or none is: on failure, already-created files are removed.
    pub fn prepare(&self, paths: &OutputPaths, hints: &FormatHints) -> Result<(), WriterError> {
        let mut slots = self.slots.write();
        if !slots.is_empty() {
            return Err(WriterError::AlreadyPrepared);
        }

        let mut created: Vec<Arc<SinkSlot>> = Vec::new();
        for (kind, path) in paths.iter() {
            match self.factory.create(kind, path, hints) {
                Ok(writer) => created.push(Arc::new(SinkSlot {
                    kind,
                    accepting: AtomicBool::new(false),
                    not_accepting: AtomicU64::new(0),
                    consecutive_failures: AtomicU32::new(0),
                    sink: Mutex::new(MediaSink {
                        writer,
                        first_written: None,
                        last_written: None,
                        stats: SinkStats::default(),
                    }),
                })),
                Err(e) => {
                    log::error!("Failed to create {} writer at {}: {}", kind, path.display(), e);
                    for slot in &created {
                        slot.sink.lock().writer.discard();
                    }
                    return Err(e);
                }
            }
        }

        if created.is_empty() {
            return Err(WriterError::CannotCreate("no tracks requested".into()));
        }
        *slots = created;
        Ok(())
    }

    /// Move every sink from created to accepting. If any sink fails to
    /// start, all sinks are discarded.
    pub fn start(&self) -> Result<(), WriterError> {
        let slots = self.slots.read().clone();
        if slots.is_empty() {
            return Err(WriterError::NotPrepared);
        }

        for slot in &slots {
            let started = slot.sink.lock().writer.start();
            if let Err(e) = started {
                log::error!("Failed to start {} writer: {}", slot.kind, e);
                self.abort(PartialFilePolicy::Delete);
                return Err(match e {
                    WriterError::StartFailed(_) => e,
                    other => WriterError::StartFailed(other.to_string()),
                });
            }
        }
        for slot in &slots {
            slot.accepting.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Route a retimed sample to its sink.
    pub fn append(&self, kind: MediaKind, sample: &Sample) -> AppendOutcome {
        let Some(slot) = self.slot(kind) else {
            return AppendOutcome::NoSink;
        };
        if !slot.accepting.load(Ordering::SeqCst) {
            slot.not_accepting.fetch_add(1, Ordering::Relaxed);
            return AppendOutcome::NotAccepting;
        }

        let Some(mut sink) = slot.sink.try_lock_for(self.append_timeout) else {
            return self.record_failure(&slot, WriterError::AppendTimedOut);
        };

        // finish() may have flipped the flag while we waited for the lock.
        if !slot.accepting.load(Ordering::SeqCst) {
            slot.not_accepting.fetch_add(1, Ordering::Relaxed);
            return AppendOutcome::NotAccepting;
        }
        if let Some(last_written) = sink.last_written {
            if sample.pts < last_written {
                sink.stats.out_of_order += 1;
                return AppendOutcome::OutOfOrder { last_written };
            }
        }

        match sink.writer.append(sample) {
            Ok(()) => {
                sink.last_written = Some(sample.pts);
                sink.first_written.get_or_insert(sample.pts);
                sink.stats.written += 1;
                sink.stats.bytes_in += sample.payload.byte_len() as u64;
                slot.consecutive_failures.store(0, Ordering::Relaxed);
                AppendOutcome::Written
            }
            Err(e) => {
                sink.stats.append_failures += 1;
                drop(sink);
                self.record_failure(&slot, e)
            }
        }
    }

    /// Stop accepting, finalize every sink that received data, and discard
    /// the rest. Sinks with zero samples are left out of the manifest.
    pub fn finish(&self) -> Result<OutputManifest, WriterError> {
        let slots = std::mem::take(&mut *self.slots.write());
        if slots.is_empty() {
            return Err(WriterError::NotPrepared);
        }
        for slot in &slots {
            slot.accepting.store(false, Ordering::SeqCst);
        }

        let mut tracks = Vec::new();
        let mut first_error = None;
        for slot in &slots {
            let mut sink = slot.sink.lock();
            if sink.stats.written == 0 {
                log::info!("No {} samples recorded; omitting track", slot.kind);
                sink.writer.discard();
                continue;
            }

            match sink.writer.finish() {
                Ok(finished) => tracks.push(TrackOutput {
                    kind: slot.kind,
                    file_path: finished.path,
                    samples_written: sink.stats.written,
                    bytes_written: finished.bytes_written,
                    first_pts_secs: sink.first_written.unwrap_or_default().as_secs_f64(),
                    last_pts_secs: sink.last_written.unwrap_or_default().as_secs_f64(),
                    checksum: finished.checksum,
                }),
                Err(e) => {
                    log::error!("Failed to finish {} track: {}", slot.kind, e);
                    sink.writer.discard();
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(OutputManifest::new(tracks)),
        }
    }

    /// Tear down after a failure. Never leaves a writer handle open.
    /// Calling it with nothing prepared is a no-op.
    pub fn abort(&self, policy: PartialFilePolicy) {
        let slots = std::mem::take(&mut *self.slots.write());
        for slot in &slots {
            slot.accepting.store(false, Ordering::SeqCst);
        }

        for slot in &slots {
            let mut sink = slot.sink.lock();
            match policy {
                PartialFilePolicy::Keep if sink.stats.written > 0 => {
                    if let Err(e) = sink.writer.finish() {
                        log::warn!("Could not finalize partial {} track: {}", slot.kind, e);
                        sink.writer.discard();
                    }
                }
                _ => sink.writer.discard(),
            }
        }
        if !slots.is_empty() {
            log::info!("Aborted {} writer(s) ({:?})", slots.len(), policy);
        }
    }

    pub fn is_prepared(&self) -> bool {
        !self.slots.read().is_empty()
    }

    pub fn is_accepting(&self, kind: MediaKind) -> bool {
        self.slot(kind)
            .map(|slot| slot.accepting.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> Vec<(MediaKind, SinkStats)> {
        let slots = self.slots.read().clone();
        slots.iter().map(|slot| (slot.kind, slot.stats())).collect()
    }

    fn slot(&self, kind: MediaKind) -> Option<Arc<SinkSlot>> {
        self.slots.read().iter().find(|slot| slot.kind == kind).cloned()
    }

    fn record_failure(&self, slot: &SinkSlot, error: WriterError) -> AppendOutcome {
        let failures = slot.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        AppendOutcome::Failed {
            error,
            systemic: failures >= self.max_consecutive_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::storage::file_factory::FileWriterFactory;
    use crate::test_support::{Faults, Journal, MemoryFactory};

    fn all_paths() -> OutputPaths {
        OutputPaths {
            video: Some(PathBuf::from("v.frames")),
            system_audio: Some(PathBuf::from("s.wav")),
            microphone: Some(PathBuf::from("m.wav")),
        }
    }

    fn frame(ms: u64) -> Sample {
        Sample::video(Duration::from_millis(ms), 1, 1, vec![0u8; 4])
    }

    fn started(faults: Faults) -> (MediaWriterCoordinator, Arc<Journal>) {
        let (factory, journal) = MemoryFactory::new(faults);
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);
        coordinator.prepare(&all_paths(), &FormatHints::default()).unwrap();
        coordinator.start().unwrap();
        (coordinator, journal)
    }

    #[test]
    fn prepare_rolls_back_on_partial_failure() {
        let (factory, journal) = MemoryFactory::new(Faults {
            create: Some(MediaKind::SystemAudio),
            ..Default::default()
        });
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);

        let err = coordinator.prepare(&all_paths(), &FormatHints::default()).unwrap_err();

        assert!(matches!(err, WriterError::CannotCreate(_)));
        assert_eq!(*journal.discarded.lock(), vec![MediaKind::Video]);
        assert!(!coordinator.is_prepared());
    }

    #[test]
    fn prepare_twice_is_rejected() {
        let (coordinator, _journal) = started(Faults::default());
        assert_eq!(
            coordinator.prepare(&all_paths(), &FormatHints::default()),
            Err(WriterError::AlreadyPrepared)
        );
    }

    #[test]
    fn start_failure_aborts_all_sinks() {
        let (factory, journal) = MemoryFactory::new(Faults {
            start: Some(MediaKind::Microphone),
            ..Default::default()
        });
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);
        coordinator.prepare(&all_paths(), &FormatHints::default()).unwrap();

        assert!(matches!(coordinator.start(), Err(WriterError::StartFailed(_))));
        assert_eq!(journal.discarded.lock().len(), 3);
        assert!(!coordinator.is_prepared());
    }

    #[test]
    fn append_before_start_is_not_accepting() {
        let (factory, _journal) = MemoryFactory::new(Faults::default());
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);
        coordinator.prepare(&all_paths(), &FormatHints::default()).unwrap();

        assert_eq!(coordinator.append(MediaKind::Video, &frame(0)), AppendOutcome::NotAccepting);
        assert_eq!(coordinator.stats()[0].1.not_accepting, 1);
    }

    #[test]
    fn append_to_unprepared_kind_has_no_sink() {
        let (factory, _journal) = MemoryFactory::new(Faults::default());
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);
        let paths = OutputPaths {
            video: Some(PathBuf::from("v.frames")),
            ..Default::default()
        };
        coordinator.prepare(&paths, &FormatHints::default()).unwrap();
        coordinator.start().unwrap();

        let audio = Sample::audio(Duration::ZERO, vec![0.0f32; 2], 48000.0, 1);
        assert_eq!(coordinator.append(MediaKind::Microphone, &audio), AppendOutcome::NoSink);
    }

    #[test]
    fn timestamps_written_are_non_decreasing() {
        let (coordinator, journal) = started(Faults::default());

        for ms in [0, 33, 33, 20, 66, 50, 100] {
            coordinator.append(MediaKind::Video, &frame(ms));
        }

        let written: Vec<u64> = journal
            .appended
            .lock()
            .iter()
            .map(|(_, pts)| pts.as_millis() as u64)
            .collect();
        assert_eq!(written, vec![0, 33, 33, 66, 100]);
        assert_eq!(coordinator.stats()[0].1.out_of_order, 2);
    }

    #[test]
    fn kinds_track_order_independently() {
        let (coordinator, _journal) = started(Faults::default());
        coordinator.append(MediaKind::Video, &frame(500));

        let audio = Sample::audio(Duration::from_millis(10), vec![0.0f32; 2], 48000.0, 1);
        assert_eq!(coordinator.append(MediaKind::SystemAudio, &audio), AppendOutcome::Written);
    }

    #[test]
    fn finish_omits_empty_tracks() {
        let (coordinator, journal) = started(Faults::default());
        coordinator.append(MediaKind::Video, &frame(0));
        coordinator.append(MediaKind::Video, &frame(33));
        let audio = Sample::audio(Duration::from_millis(5), vec![0.0f32; 2], 48000.0, 1);
        coordinator.append(MediaKind::SystemAudio, &audio);

        let manifest = coordinator.finish().unwrap();

        assert_eq!(manifest.tracks.len(), 2);
        assert!(manifest.track(MediaKind::Microphone).is_none());
        let video = manifest.track(MediaKind::Video).unwrap();
        assert_eq!(video.samples_written, 2);
        assert!((video.last_pts_secs - 0.033).abs() < 1e-9);
        assert_eq!(*journal.discarded.lock(), vec![MediaKind::Microphone]);
        assert!(!coordinator.is_accepting(MediaKind::Video));
    }

    #[test]
    fn finish_without_prepare_is_an_error() {
        let (factory, _journal) = MemoryFactory::new(Faults::default());
        let coordinator = MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3);
        assert_eq!(coordinator.finish(), Err(WriterError::NotPrepared));
    }

    #[test]
    fn finish_failure_still_closes_every_sink() {
        let (coordinator, journal) = started(Faults {
            finish: Some(MediaKind::Video),
            ..Default::default()
        });
        coordinator.append(MediaKind::Video, &frame(0));
        let audio = Sample::audio(Duration::ZERO, vec![0.0f32; 2], 48000.0, 1);
        coordinator.append(MediaKind::Microphone, &audio);

        assert!(matches!(coordinator.finish(), Err(WriterError::FinishFailed(_))));
        assert_eq!(*journal.finished.lock(), vec![MediaKind::Microphone]);
        assert!(journal.discarded.lock().contains(&MediaKind::Video));
        assert!(!coordinator.is_prepared());
    }

    #[test]
    fn repeated_append_failures_become_systemic() {
        let (coordinator, _journal) = started(Faults {
            append: Some(MediaKind::Video),
            ..Default::default()
        });

        let outcomes: Vec<_> = (0..3).map(|i| coordinator.append(MediaKind::Video, &frame(i))).collect();

        assert!(matches!(outcomes[0], AppendOutcome::Failed { systemic: false, .. }));
        assert!(matches!(outcomes[1], AppendOutcome::Failed { systemic: false, .. }));
        assert!(matches!(outcomes[2], AppendOutcome::Failed { systemic: true, .. }));
    }

    #[test]
    fn busy_sink_fails_fast() {
        let (tx, rx) = mpsc::channel();
        let journal = Arc::new(Journal::default());
        let factory = Arc::new(MemoryFactory {
            journal,
            faults: Faults::default(),
            entered: Some(tx),
            hold: Duration::from_millis(300),
        });
        let coordinator = Arc::new(MediaWriterCoordinator::new(factory, Duration::from_millis(20), 3));
        coordinator.prepare(&all_paths(), &FormatHints::default()).unwrap();
        coordinator.start().unwrap();

        let slow = {
            let coordinator = coordinator.clone();
            thread::spawn(move || coordinator.append(MediaKind::Video, &frame(0)))
        };
        rx.recv().unwrap();

        let outcome = coordinator.append(MediaKind::Video, &frame(33));
        assert_eq!(
            outcome,
            AppendOutcome::Failed {
                error: WriterError::AppendTimedOut,
                systemic: false
            }
        );
        assert_eq!(slow.join().unwrap(), AppendOutcome::Written);
    }

    #[test]
    fn abort_keep_finalizes_written_tracks_only() {
        let (coordinator, journal) = started(Faults::default());
        coordinator.append(MediaKind::Video, &frame(0));

        coordinator.abort(PartialFilePolicy::Keep);

        assert_eq!(*journal.finished.lock(), vec![MediaKind::Video]);
        assert_eq!(journal.discarded.lock().len(), 2);
        // Idempotent.
        coordinator.abort(PartialFilePolicy::Keep);
        assert_eq!(journal.finished.lock().len(), 1);
    }

    #[test]
    fn abort_delete_removes_real_files() {
        let dir = std::env::temp_dir().join(format!("screen_recorder_coord_{}", uuid::Uuid::new_v4()));
        let paths = OutputPaths {
            video: Some(dir.join("a.frames")),
            system_audio: Some(dir.join("a.system.wav")),
            microphone: None,
        };
        let coordinator = MediaWriterCoordinator::new(Arc::new(FileWriterFactory), Duration::from_millis(20), 3);
        coordinator.prepare(&paths, &FormatHints::default()).unwrap();
        coordinator.start().unwrap();
        coordinator.append(MediaKind::Video, &frame(0));

        coordinator.abort(PartialFilePolicy::Delete);

        assert!(!dir.join("a.frames").exists());
        assert!(!dir.join("a.system.wav").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
