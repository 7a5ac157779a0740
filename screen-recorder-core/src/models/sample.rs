use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The track a delivered sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Video,
    SystemAudio,
    Microphone,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::SystemAudio, MediaKind::Microphone];

    /// Stable index for per-kind tables.
    pub fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::SystemAudio => 1,
            Self::Microphone => 2,
        }
    }

    pub fn is_audio(self) -> bool {
        !matches!(self, Self::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::SystemAudio => "system",
            Self::Microphone => "mic",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame status attached by the capture layer.
///
/// Only `Complete` frames carry new content. The other statuses are
/// delivered while the captured surface is unchanged, hidden, or the
/// stream is winding up/down, and are dropped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    Complete,
    Idle,
    Blank,
    Suspended,
    Started,
    Stopped,
}

/// Sample content. Payloads are reference counted so that retiming a
/// sample never copies pixel or audio data.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePayload {
    /// Packed 4-byte-per-pixel frame (BGRA as delivered by the capture layer).
    Video {
        width: u32,
        height: u32,
        data: Arc<[u8]>,
    },
    /// Interleaved f32 samples.
    Audio {
        samples: Arc<[f32]>,
        sample_rate: f64,
        channels: u16,
    },
}

impl SamplePayload {
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Video { data, .. } => data.len(),
            Self::Audio { samples, .. } => samples.len() * std::mem::size_of::<f32>(),
        }
    }
}

/// One frame or audio buffer as delivered by the capture stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Presentation timestamp relative to stream start.
    pub pts: Duration,
    /// Nominal duration, if the capture layer reports one.
    pub duration: Option<Duration>,
    pub status: FrameStatus,
    pub payload: SamplePayload,
}

impl Sample {
    pub fn video(pts: Duration, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            pts,
            duration: None,
            status: FrameStatus::Complete,
            payload: SamplePayload::Video {
                width,
                height,
                data: data.into(),
            },
        }
    }

    pub fn audio(pts: Duration, samples: impl Into<Arc<[f32]>>, sample_rate: f64, channels: u16) -> Self {
        let samples: Arc<[f32]> = samples.into();
        let frames = samples.len() / channels.max(1) as usize;
        let duration = if sample_rate > 0.0 {
            Some(Duration::from_secs_f64(frames as f64 / sample_rate))
        } else {
            None
        };
        Self {
            pts,
            duration,
            status: FrameStatus::Complete,
            payload: SamplePayload::Audio {
                samples,
                sample_rate,
                channels,
            },
        }
    }

    pub fn with_status(mut self, status: FrameStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == FrameStatus::Complete
    }

    /// Copy of this sample with a new presentation timestamp; the payload is shared.
    pub fn retimed(&self, pts: Duration) -> Self {
        Self {
            pts,
            duration: self.duration,
            status: self.status,
            payload: self.payload.clone(),
        }
    }
}
