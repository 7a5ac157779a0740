//! Synthetic capture stream.
//!
//! Delivers a moving test pattern and sine-tone audio on dedicated threads,
//! paced in real time, the way a platform stream delivers frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use screen_recorder_core::models::sample::{FrameStatus, MediaKind, Sample};
use screen_recorder_core::models::error::StreamError;
use screen_recorder_core::traits::capture_stream::{CaptureStream, StreamCallbacks, StreamConfiguration};

use crate::generator::{test_pattern, SineGenerator};

/// Audio is delivered in 10 ms buffers.
const AUDIO_BUFFER: Duration = Duration::from_millis(10);

/// Delivery counters, shared with whoever built the stream.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    pub video_frames: AtomicU64,
    pub audio_buffers: AtomicU64,
    pub redelivered: AtomicU64,
}

/// Capture stream backed by generated media.
#[derive(Debug, Clone, Default)]
pub struct SyntheticStream {
    duplicate_every: Option<u64>,
    idle_every: Option<u64>,
    failure: Option<(Duration, StreamError)>,
    stats: Arc<DeliveryStats>,
}

/// One running (or configured) synthetic stream.
pub struct SyntheticHandle {
    config: StreamConfiguration,
    running: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl SyntheticStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every `n`th video frame twice, as some capture layers do.
    pub fn with_duplicate_every(mut self, n: u64) -> Self {
        self.duplicate_every = Some(n.max(1));
        self
    }

    /// Mark every `n`th video frame as idle (surface unchanged).
    pub fn with_idle_every(mut self, n: u64) -> Self {
        self.idle_every = Some(n.max(1));
        self
    }

    /// Report `error` through the failure callback `after` the stream starts.
    pub fn with_failure_after(mut self, after: Duration, error: StreamError) -> Self {
        self.failure = Some((after, error));
        self
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    fn spawn_video(&self, handle: &SyntheticHandle, callbacks: &StreamCallbacks, epoch: Instant) -> Result<thread::JoinHandle<()>, StreamError> {
        let running = Arc::clone(&handle.running);
        let on_sample = Arc::clone(&callbacks.on_sample);
        let stats = Arc::clone(&self.stats);
        let (width, height, interval) = (handle.config.width, handle.config.height, handle.config.frame_interval);
        let duplicate_every = self.duplicate_every;
        let idle_every = self.idle_every;

        spawn("synthetic-video", move || {
            let mut index = 0u64;
            while running.load(Ordering::SeqCst) {
                let pts = epoch.elapsed();
                let mut frame = Sample::video(pts, width, height, test_pattern(width, height, index));
                if idle_every.is_some_and(|n| index % n == n - 1) {
                    frame = frame.with_status(FrameStatus::Idle);
                }
                if duplicate_every.is_some_and(|n| index % n == n - 1) {
                    on_sample(MediaKind::Video, frame.clone());
                    stats.redelivered.fetch_add(1, Ordering::Relaxed);
                }
                on_sample(MediaKind::Video, frame);
                stats.video_frames.fetch_add(1, Ordering::Relaxed);

                index += 1;
                sleep_until(epoch + interval * index as u32, &running);
            }
        })
    }

    fn spawn_audio(&self, kind: MediaKind, handle: &SyntheticHandle, callbacks: &StreamCallbacks, epoch: Instant) -> Result<thread::JoinHandle<()>, StreamError> {
        let running = Arc::clone(&handle.running);
        let on_sample = Arc::clone(&callbacks.on_sample);
        let stats = Arc::clone(&self.stats);
        let (sample_rate, channels) = (handle.config.sample_rate, handle.config.channels);
        let (frequency, name) = match kind {
            MediaKind::Microphone => (220.0, "synthetic-mic"),
            _ => (440.0, "synthetic-system-audio"),
        };

        spawn(name, move || {
            let mut tone = SineGenerator::new(frequency, 0.3, sample_rate, channels);
            let frames_per_buffer = (sample_rate * AUDIO_BUFFER.as_secs_f64()).round() as usize;
            let mut frames_sent = 0u64;
            while running.load(Ordering::SeqCst) {
                let pts = Duration::from_secs_f64(frames_sent as f64 / sample_rate);
                let samples = tone.next_buffer(frames_per_buffer);
                on_sample(kind, Sample::audio(pts, samples, sample_rate, channels));
                stats.audio_buffers.fetch_add(1, Ordering::Relaxed);

                frames_sent += frames_per_buffer as u64;
                sleep_until(epoch + Duration::from_secs_f64(frames_sent as f64 / sample_rate), &running);
            }
        })
    }

    /// Spawn every delivery thread, collecting them in the handle as they
    /// start so a partial start can be stopped.
    fn spawn_all(&self, handle: &mut SyntheticHandle, callbacks: &StreamCallbacks, epoch: Instant) -> Result<(), StreamError> {
        if handle.config.delivers(MediaKind::Video) {
            let worker = self.spawn_video(handle, callbacks, epoch)?;
            handle.threads.push(worker);
        }
        for kind in [MediaKind::SystemAudio, MediaKind::Microphone] {
            if handle.config.delivers(kind) {
                let worker = self.spawn_audio(kind, handle, callbacks, epoch)?;
                handle.threads.push(worker);
            }
        }
        if let Some(worker) = self.spawn_fault(handle, callbacks, epoch)? {
            handle.threads.push(worker);
        }
        Ok(())
    }

    fn spawn_fault(&self, handle: &SyntheticHandle, callbacks: &StreamCallbacks, epoch: Instant) -> Result<Option<thread::JoinHandle<()>>, StreamError> {
        let Some((after, error)) = self.failure.clone() else {
            return Ok(None);
        };
        let running = Arc::clone(&handle.running);
        let on_failure = Arc::clone(&callbacks.on_failure);

        spawn("synthetic-fault", move || {
            // A deadline past what Instant can represent never fires.
            let Some(deadline) = epoch.checked_add(after) else {
                return;
            };
            sleep_until(deadline, &running);
            if running.load(Ordering::SeqCst) {
                log::warn!("Injecting synthetic stream failure: {}", error);
                on_failure(error);
            }
        })
        .map(Some)
    }
}

impl CaptureStream for SyntheticStream {
    type Handle = SyntheticHandle;

    fn configure(&self, config: &StreamConfiguration) -> Result<SyntheticHandle, StreamError> {
        if config.kinds.is_empty() {
            return Err(StreamError::ConfigurationFailed("nothing to capture".into()));
        }
        if config.delivers(MediaKind::Video) && (config.width == 0 || config.height == 0) {
            return Err(StreamError::ConfigurationFailed(format!(
                "invalid frame size {}x{}",
                config.width, config.height
            )));
        }
        log::debug!(
            "Configured synthetic stream for {:?} (source {:?})",
            config.kinds,
            config.source
        );
        Ok(SyntheticHandle {
            config: config.clone(),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        })
    }

    fn start(&self, handle: &mut SyntheticHandle, callbacks: StreamCallbacks) -> Result<(), StreamError> {
        if handle.running.load(Ordering::SeqCst) {
            return Err(StreamError::StartFailed("synthetic stream already running".into()));
        }
        handle.running.store(true, Ordering::SeqCst);
        let epoch = Instant::now();

        let result = self.spawn_all(handle, &callbacks, epoch);
        if let Err(e) = result {
            let _ = self.stop(handle);
            return Err(e);
        }
        log::info!("Synthetic stream started with {} thread(s)", handle.threads.len());
        Ok(())
    }

    fn stop(&self, handle: &mut SyntheticHandle) -> Result<(), StreamError> {
        handle.running.store(false, Ordering::SeqCst);
        let current = thread::current().id();
        for worker in handle.threads.drain(..) {
            // A failure callback may stop the stream from its own thread.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::warn!("Synthetic delivery thread panicked");
            }
        }
        Ok(())
    }
}

fn spawn(name: &str, body: impl FnOnce() + Send + 'static) -> Result<thread::JoinHandle<()>, StreamError> {
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|e| StreamError::StartFailed(format!("failed to spawn {} thread: {}", name, e)))
}

/// Sleep until `deadline` in short slices so a stop is noticed promptly.
fn sleep_until(deadline: Instant, running: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(5);
    loop {
        let now = Instant::now();
        if now >= deadline || !running.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn config(kinds: Vec<MediaKind>) -> StreamConfiguration {
        StreamConfiguration {
            kinds,
            width: 16,
            height: 8,
            frame_interval: Duration::from_millis(10),
            sample_rate: 48000.0,
            channels: 2,
            source: None,
        }
    }

    fn counting_callbacks(samples: Arc<AtomicUsize>, failures: Arc<AtomicUsize>) -> StreamCallbacks {
        StreamCallbacks {
            on_sample: Arc::new(move |_, _| {
                samples.fetch_add(1, Ordering::SeqCst);
            }),
            on_failure: Arc::new(move |_| {
                failures.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    #[test]
    fn configure_rejects_empty_selection() {
        assert!(matches!(
            SyntheticStream::new().configure(&config(vec![])),
            Err(StreamError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn delivers_until_stopped() {
        let stream = SyntheticStream::new();
        let stats = stream.stats();
        let samples = Arc::new(AtomicUsize::new(0));
        let mut handle = stream
            .configure(&config(vec![MediaKind::Video, MediaKind::SystemAudio]))
            .unwrap();

        stream
            .start(&mut handle, counting_callbacks(samples.clone(), Arc::new(AtomicUsize::new(0))))
            .unwrap();
        thread::sleep(Duration::from_millis(100));
        stream.stop(&mut handle).unwrap();

        let delivered = samples.load(Ordering::SeqCst);
        assert!(stats.video_frames.load(Ordering::SeqCst) >= 3);
        assert!(stats.audio_buffers.load(Ordering::SeqCst) >= 3);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(samples.load(Ordering::SeqCst), delivered);
    }

    #[test]
    fn injected_failure_is_reported_once() {
        let stream = SyntheticStream::new().with_failure_after(Duration::from_millis(20), StreamError::SourceDisconnected);
        let failures = Arc::new(AtomicUsize::new(0));
        let mut handle = stream.configure(&config(vec![MediaKind::Microphone])).unwrap();

        stream
            .start(&mut handle, counting_callbacks(Arc::new(AtomicUsize::new(0)), failures.clone()))
            .unwrap();
        thread::sleep(Duration::from_millis(80));
        stream.stop(&mut handle).unwrap();

        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unreachable_failure_deadline_never_fires() {
        let stream = SyntheticStream::new().with_failure_after(Duration::MAX, StreamError::SourceDisconnected);
        let failures = Arc::new(AtomicUsize::new(0));
        let mut handle = stream.configure(&config(vec![MediaKind::SystemAudio])).unwrap();

        stream
            .start(&mut handle, counting_callbacks(Arc::new(AtomicUsize::new(0)), failures.clone()))
            .unwrap();
        thread::sleep(Duration::from_millis(30));
        stream.stop(&mut handle).unwrap();

        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_twice_is_rejected() {
        let stream = SyntheticStream::new();
        let mut handle = stream.configure(&config(vec![MediaKind::Video])).unwrap();
        let callbacks = counting_callbacks(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));

        stream.start(&mut handle, callbacks.clone()).unwrap();
        assert!(stream.start(&mut handle, callbacks).is_err());
        stream.stop(&mut handle).unwrap();
    }
}
