use std::sync::Arc;
use std::time::Duration;

use crate::models::config::RecordingOptions;
use crate::models::error::StreamError;
use crate::models::sample::{MediaKind, Sample};

/// Invoked for every delivered sample, on a capture delivery thread.
///
/// Video and audio may arrive concurrently on different threads. Keep
/// processing minimal.
pub type SampleCallback = Arc<dyn Fn(MediaKind, Sample) + Send + Sync + 'static>;

/// Invoked when the stream fails after a successful start.
pub type FailureCallback = Arc<dyn Fn(StreamError) + Send + Sync + 'static>;

/// Callbacks handed to the capture stream on start.
#[derive(Clone)]
pub struct StreamCallbacks {
    pub on_sample: SampleCallback,
    pub on_failure: FailureCallback,
}

/// What the capture stream should deliver, derived from `RecordingOptions`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfiguration {
    pub kinds: Vec<MediaKind>,
    pub width: u32,
    pub height: u32,
    /// Minimum spacing between delivered video frames.
    pub frame_interval: Duration,
    pub sample_rate: f64,
    pub channels: u16,
    pub source: Option<String>,
}

impl StreamConfiguration {
    pub fn from_options(options: &RecordingOptions) -> Self {
        Self {
            kinds: options.requested_kinds(),
            width: options.format.width,
            height: options.format.height,
            frame_interval: options.format.frame_interval(),
            sample_rate: options.format.sample_rate,
            channels: options.format.channels,
            source: options.source.clone(),
        }
    }

    pub fn delivers(&self, kind: MediaKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// The platform capture capability: a live source of video and audio
/// samples for a display, window or application.
///
/// Only the session controller calls these methods. `stop` may be invoked
/// from one of the stream's own delivery threads (a failure callback that
/// tears the session down), so implementations must not join the calling
/// thread.
pub trait CaptureStream: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Validate the configuration and allocate a stream handle.
    fn configure(&self, config: &StreamConfiguration) -> Result<Self::Handle, StreamError>;

    /// Begin delivering samples through `callbacks`.
    fn start(&self, handle: &mut Self::Handle, callbacks: StreamCallbacks) -> Result<(), StreamError>;

    /// Stop delivery and release the stream. Called at most once per handle.
    fn stop(&self, handle: &mut Self::Handle) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::FormatHints;

    #[test]
    fn configuration_follows_options() {
        let options = RecordingOptions {
            capture_video: false,
            capture_microphone: true,
            format: FormatHints {
                frame_rate: 60.0,
                sample_rate: 44100.0,
                channels: 1,
                ..Default::default()
            },
            source: Some("display:1".into()),
            ..Default::default()
        };

        let config = StreamConfiguration::from_options(&options);

        assert_eq!(config.kinds, vec![MediaKind::SystemAudio, MediaKind::Microphone]);
        assert!(!config.delivers(MediaKind::Video));
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.source.as_deref(), Some("display:1"));
        assert_eq!(config.frame_interval, Duration::from_secs_f64(1.0 / 60.0));
    }
}
