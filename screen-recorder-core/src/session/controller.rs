use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::models::config::{EngineConfig, PartialFilePolicy, RecordingOptions};
use crate::models::diagnostics::{AudioLevels, ProgressUpdate, SessionDiagnostics};
use crate::models::error::{SessionError, StateError, StreamError};
use crate::models::manifest::OutputManifest;
use crate::models::phase::SessionPhase;
use crate::models::sample::{MediaKind, Sample};
use crate::models::state::{OutputPaths, RecordingState};
use crate::processing::ingest::SampleIngestPipeline;
use crate::processing::levels::LevelMeter;
use crate::session::clock::{Clock, SystemClock};
use crate::session::events::{EventBus, SessionEvent};
use crate::session::store::RecordingStateStore;
use crate::session::ticker::DurationTicker;
use crate::storage::coordinator::MediaWriterCoordinator;
use crate::storage::file_factory::FileWriterFactory;
use crate::storage::manifest_io;
use crate::traits::authorization::{AlwaysAuthorized, AuthorizationGate};
use crate::traits::capture_stream::{CaptureStream, StreamCallbacks, StreamConfiguration};
use crate::traits::observer::SessionObserver;
use crate::traits::track_writer::WriterFactory;

/// Pluggable collaborators of a controller.
pub struct SessionComponents {
    pub writer_factory: Arc<dyn WriterFactory>,
    pub authorization: Arc<dyn AuthorizationGate>,
    pub clock: Arc<dyn Clock>,
}

impl Default for SessionComponents {
    fn default() -> Self {
        Self {
            writer_factory: Arc::new(FileWriterFactory),
            authorization: Arc::new(AlwaysAuthorized),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Where the current session writes, kept for the manifest sidecar.
struct ActiveOutput {
    directory: PathBuf,
    stem: String,
    max_duration: Option<Duration>,
}

/// Track file locations for a session: `{dir}/{stem}.{kind}.{ext}`.
pub fn output_paths_for(options: &RecordingOptions, stem: &str) -> OutputPaths {
    let mut paths = OutputPaths::default();
    for kind in options.requested_kinds() {
        let file_name = format!("{}.{}.{}", stem, kind, FileWriterFactory::extension(kind));
        paths.set(kind, options.output_directory.join(file_name));
    }
    paths
}

/// Top-level recording lifecycle: the only component that talks to the
/// capture stream.
///
/// ```text
/// begin ─→ [store: preparing] → [coordinator: prepare, start]
///        → [stream: configure, start] → [store: recording]
///
/// [stream threads] ─→ SampleIngestPipeline ─→ MediaWriterCoordinator
///
/// stop ──→ [store: stopping] → [stream: stop] → [coordinator: finish] → [store: idle]
/// stream failure ─→ [store: failed] → [stream: stop] → [coordinator: abort]
/// ```
///
/// All methods take `&self` and may be called from any thread. Stop and
/// stream failure race through the store's transition check, so exactly
/// one of them tears the session down.
pub struct StreamSessionController<S: CaptureStream> {
    inner: Arc<Inner<S>>,
}

impl<S: CaptureStream> Clone for StreamSessionController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: CaptureStream> {
    stream: S,
    config: EngineConfig,
    authorization: Arc<dyn AuthorizationGate>,
    events: Arc<EventBus>,
    store: Arc<RecordingStateStore>,
    coordinator: Arc<MediaWriterCoordinator>,
    pipeline: Arc<SampleIngestPipeline>,
    meter: Arc<LevelMeter>,
    handle: Mutex<Option<S::Handle>>,
    ticker: Mutex<Option<DurationTicker>>,
    output: Mutex<Option<ActiveOutput>>,
}

impl<S: CaptureStream> StreamSessionController<S> {
    /// Controller writing real files, with no permission check and the system clock.
    pub fn new(stream: S, config: EngineConfig) -> Self {
        Self::with_components(stream, config, SessionComponents::default())
    }

    pub fn with_components(stream: S, config: EngineConfig, components: SessionComponents) -> Self {
        let events = Arc::new(EventBus::new());
        let store = Arc::new(RecordingStateStore::new(
            config.duplicate_history_capacity,
            components.clock,
            Arc::clone(&events),
        ));
        let coordinator = Arc::new(MediaWriterCoordinator::new(
            components.writer_factory,
            config.append_timeout,
            config.max_consecutive_append_failures,
        ));
        let meter = Arc::new(LevelMeter::new());
        let pipeline = Arc::new(SampleIngestPipeline::new(
            Arc::clone(&store),
            Arc::clone(&coordinator),
            Arc::clone(&meter),
        ));

        Self {
            inner: Arc::new(Inner {
                stream,
                config,
                authorization: components.authorization,
                events,
                store,
                coordinator,
                pipeline,
                meter,
                handle: Mutex::new(None),
                ticker: Mutex::new(None),
                output: Mutex::new(None),
            }),
        }
    }

    /// Start a recording. On any failure every completed step is undone
    /// and the session is back in `idle`.
    pub fn begin(&self, options: RecordingOptions) -> Result<(), SessionError> {
        self.inner.begin(options)
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.inner.store.transition(SessionPhase::Paused)?;
        log::info!("Recording paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), SessionError> {
        self.inner.transition_from(SessionPhase::Paused, SessionPhase::Recording)?;
        log::info!("Recording resumed (timeline offset {:?})", self.inner.store.snapshot().timeline_offset);
        Ok(())
    }

    /// Stop and finalize. Returns `Ok(None)` if a stop is already in
    /// progress, which makes a second call a no-op.
    pub fn stop(&self) -> Result<Option<OutputManifest>, SessionError> {
        self.inner.stop()
    }

    /// Entry point for asynchronous capture failures. Safe to call from any
    /// thread, including the stream's own delivery threads.
    pub fn handle_stream_failure(&self, error: StreamError) {
        self.inner.handle_stream_failure(error);
    }

    /// Return a failed session to `idle` so it can be reused.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.inner.transition_from(SessionPhase::Failed, SessionPhase::Idle)?;
        log::info!("Session reset");
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.store.phase()
    }

    pub fn snapshot(&self) -> RecordingState {
        self.inner.store.snapshot()
    }

    pub fn levels(&self) -> AudioLevels {
        self.inner.meter.levels()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let state = self.inner.store.snapshot();
        SessionDiagnostics {
            phase: state.phase,
            ingest: state.counters,
            sinks: self.inner.coordinator.stats(),
            levels: self.inner.meter.levels(),
            pause_count: state.pause_count,
            timeline_offset_ms: state.timeline_offset.as_millis() as u64,
        }
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.inner.events.add_observer(observer);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

impl<S: CaptureStream> Inner<S> {
    fn begin(self: &Arc<Self>, options: RecordingOptions) -> Result<(), SessionError> {
        options.validate().map_err(SessionError::InvalidOptions)?;
        if self.store.phase() != SessionPhase::Idle {
            return Err(SessionError::AlreadyActive);
        }
        if !self.authorization.is_authorized(&options) {
            log::warn!("Capture not authorized");
            return Err(SessionError::NotAuthorized);
        }
        self.store
            .transition(SessionPhase::Preparing)
            .map_err(|_| SessionError::AlreadyActive)?;

        match self.start_session(&options) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Failed to begin recording: {}", e);
                self.rollback();
                Err(e)
            }
        }
    }

    fn start_session(self: &Arc<Self>, options: &RecordingOptions) -> Result<(), SessionError> {
        let stem = options
            .file_stem
            .clone()
            .unwrap_or_else(|| format!("recording_{}", uuid::Uuid::new_v4().simple()));
        let paths = output_paths_for(options, &stem);
        self.store.assign_output_paths(paths.clone())?;

        self.coordinator
            .prepare(&paths, &options.format)
            .map_err(SessionError::WriterPrepareFailed)?;
        self.coordinator.start().map_err(SessionError::WriterPrepareFailed)?;
        self.meter.reset();
        *self.output.lock() = Some(ActiveOutput {
            directory: options.output_directory.clone(),
            stem,
            max_duration: options.max_duration_secs.and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        });

        let config = StreamConfiguration::from_options(options);
        let mut handle = self
            .stream
            .configure(&config)
            .map_err(SessionError::StreamStartFailed)?;
        self.stream
            .start(&mut handle, self.callbacks())
            .map_err(SessionError::StreamStartFailed)?;
        *self.handle.lock() = Some(handle);

        if let Err(e) = self.store.transition(SessionPhase::Recording) {
            // A stream failure during startup already moved us to `failed`.
            let cause = self.store.snapshot().last_error;
            return Err(match cause {
                Some(error) => SessionError::StreamStartFailed(error),
                None => SessionError::InvalidTransition(e),
            });
        }

        self.start_ticker();
        log::info!(
            "Recording started: {} track(s) in {}",
            config.kinds.len(),
            options.output_directory.display()
        );
        Ok(())
    }

    fn rollback(&self) {
        self.stop_ticker();
        self.stop_stream();
        self.coordinator.abort(PartialFilePolicy::Delete);
        self.output.lock().take();
        if self.store.phase() == SessionPhase::Preparing {
            let _ = self.store.transition(SessionPhase::Failed);
        }
        if self.store.phase() == SessionPhase::Failed {
            let _ = self.store.transition(SessionPhase::Idle);
        }
    }

    fn callbacks(self: &Arc<Self>) -> StreamCallbacks {
        let on_sample = {
            let weak: Weak<Self> = Arc::downgrade(self);
            Arc::new(move |kind: MediaKind, sample: Sample| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let outcome = inner.pipeline.ingest(kind, sample);
                if let Some(error) = outcome.systemic_failure() {
                    inner.handle_stream_failure(StreamError::Writer(error.clone()));
                }
            })
        };
        let on_failure = {
            let weak: Weak<Self> = Arc::downgrade(self);
            Arc::new(move |error: StreamError| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_stream_failure(error);
                }
            })
        };
        StreamCallbacks { on_sample, on_failure }
    }

    fn stop(self: &Arc<Self>) -> Result<Option<OutputManifest>, SessionError> {
        if self.store.phase() == SessionPhase::Stopping {
            return Ok(None);
        }
        match self.store.transition(SessionPhase::Stopping) {
            Ok(()) => {}
            Err(StateError::InvalidTransition {
                from: SessionPhase::Stopping,
                ..
            }) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        self.stop_ticker();
        self.stop_stream();

        let state = self.store.snapshot();
        let active = self.store.active_duration();
        let output = self.output.lock().take();
        let result = self.coordinator.finish();
        self.store.transition(SessionPhase::Idle)?;

        let mut manifest = result.map_err(|e| {
            log::error!("Failed to finalize recording: {}", e);
            SessionError::WriterFinishFailed(e)
        })?;
        manifest.duration_secs = active.as_secs_f64();
        manifest.pause_count = state.pause_count;
        manifest.paused_secs = state.accumulated_pause_duration.as_secs_f64();

        if let Some(output) = output.filter(|_| self.config.write_manifest_sidecar) {
            match manifest_io::write_manifest(&manifest, &output.directory, &output.stem) {
                Ok(path) => log::debug!("Wrote manifest {}", path.display()),
                Err(e) => log::warn!("Could not write manifest sidecar: {}", e),
            }
        }

        log::info!(
            "Recording stopped: {} track(s), {:.2}s",
            manifest.tracks.len(),
            manifest.duration_secs
        );
        self.events.publish(SessionEvent::Finished(manifest.clone()));
        Ok(Some(manifest))
    }

    fn handle_stream_failure(&self, error: StreamError) {
        match self.store.fail(error.clone()) {
            Ok(from) => log::error!("Capture stream failed while {}: {}", from, error),
            Err(_) => {
                log::warn!("Ignoring stream failure in phase {}: {}", self.store.phase(), error);
                return;
            }
        }

        self.stop_ticker();
        self.stop_stream();
        self.coordinator.abort(self.config.partial_file_policy);
        self.output.lock().take();
        self.events.publish(SessionEvent::Failed(error));
    }

    /// Apply `to` only if the session is currently in `expected`.
    fn transition_from(&self, expected: SessionPhase, to: SessionPhase) -> Result<(), StateError> {
        let now = self.store.now();
        self.store
            .mutate(|state| {
                if state.phase != expected {
                    return Err(StateError::InvalidTransition { from: state.phase, to });
                }
                state.apply_transition(to, now)
            })
            .inspect_err(|e| log::warn!("Rejected session transition: {}", e))
    }

    fn stop_stream(&self) {
        let handle = self.handle.lock().take();
        if let Some(mut handle) = handle {
            if let Err(e) = self.stream.stop(&mut handle) {
                log::warn!("Error stopping capture stream: {}", e);
            }
        }
    }

    fn start_ticker(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let spawned = DurationTicker::spawn("session-progress", self.config.progress_interval, move || {
            weak.upgrade().is_some_and(|inner| inner.tick())
        });
        match spawned {
            Ok(ticker) => *self.ticker.lock() = Some(ticker),
            Err(e) => log::warn!("Progress ticker unavailable: {}", e),
        }
    }

    fn stop_ticker(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }
    }

    /// One progress tick. Returns `false` once the ticker should exit.
    fn tick(self: &Arc<Self>) -> bool {
        let phase = self.store.phase();
        if !matches!(phase, SessionPhase::Recording | SessionPhase::Paused) {
            return false;
        }

        let elapsed = self.store.active_duration();
        self.events.publish(SessionEvent::Progress(ProgressUpdate {
            phase,
            elapsed,
            levels: self.meter.levels(),
        }));

        let limit = self.output.lock().as_ref().and_then(|output| output.max_duration);
        match limit {
            Some(limit) if elapsed >= limit => {
                log::info!("Maximum duration of {:?} reached; stopping", limit);
                if let Err(e) = self.stop() {
                    log::error!("Automatic stop failed: {}", e);
                }
                false
            }
            _ => true,
        }
    }
}

impl<S: CaptureStream> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.stop();
        }
        if let Some(mut handle) = self.handle.get_mut().take() {
            log::warn!("Controller dropped with a live capture stream; stopping it");
            if let Err(e) = self.stream.stop(&mut handle) {
                log::warn!("Error stopping capture stream: {}", e);
            }
        }
        self.coordinator.abort(self.config.partial_file_policy);
    }
}
