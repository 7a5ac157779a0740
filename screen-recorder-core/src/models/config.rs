use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::sample::MediaKind;

/// Accepted video frame rates, in frames per second.
pub const FRAME_RATE_RANGE: std::ops::RangeInclusive<f64> = 0.1..=1000.0;

/// Accepted audio sample rates, in Hz.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<f64> = 8_000.0..=384_000.0;

/// Quality and format hints for the output tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatHints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Audio track sample rate in Hz.
    pub sample_rate: f64,
    /// Audio track channel count (1 or 2).
    pub channels: u16,
    /// PCM bit depth. Only 16-bit output is written.
    pub bit_depth: u16,
}

impl FormatHints {
    /// Nominal spacing between video frames. Rates outside
    /// `FRAME_RATE_RANGE` are clamped; a NaN rate falls back to 30 fps.
    pub fn frame_interval(&self) -> Duration {
        let rate = self.frame_rate.clamp(*FRAME_RATE_RANGE.start(), *FRAME_RATE_RANGE.end());
        Duration::try_from_secs_f64(1.0 / rate).unwrap_or(Duration::from_nanos(33_333_333))
    }
}

impl Default for FormatHints {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            sample_rate: 48000.0,
            channels: 2,
            bit_depth: 16,
        }
    }
}

/// Options for one recording, supplied by the settings layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingOptions {
    pub capture_video: bool,
    pub capture_system_audio: bool,
    pub capture_microphone: bool,

    /// Directory where track files are written.
    pub output_directory: PathBuf,

    /// File name stem; a unique `recording_<uuid>` stem is used when absent.
    pub file_stem: Option<String>,

    pub format: FormatHints,

    /// Maximum active recording duration in seconds (None = unlimited).
    pub max_duration_secs: Option<f64>,

    /// Display, window or application to capture. Opaque to the engine.
    pub source: Option<String>,
}

impl RecordingOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.capture_video && !self.capture_system_audio && !self.capture_microphone {
            return Err("no track selected".into());
        }
        if self.capture_video {
            if self.format.width == 0 || self.format.height == 0 {
                return Err(format!(
                    "invalid video dimensions: {}x{}",
                    self.format.width, self.format.height
                ));
            }
            if !FRAME_RATE_RANGE.contains(&self.format.frame_rate) {
                return Err(format!("invalid frame rate: {}", self.format.frame_rate));
            }
        }
        if self.capture_system_audio || self.capture_microphone {
            if !SAMPLE_RATE_RANGE.contains(&self.format.sample_rate) {
                return Err(format!("unsupported sample rate: {}", self.format.sample_rate));
            }
            if self.format.bit_depth != 16 {
                return Err(format!("unsupported bit depth: {}", self.format.bit_depth));
            }
            if ![1, 2].contains(&self.format.channels) {
                return Err(format!("unsupported channel count: {}", self.format.channels));
            }
        }
        if let Some(max) = self.max_duration_secs {
            if !(max > 0.0 && Duration::try_from_secs_f64(max).is_ok()) {
                return Err(format!("invalid max duration: {}", max));
            }
        }
        if let Some(ref stem) = self.file_stem {
            if stem.is_empty() || stem.contains(['/', '\\']) {
                return Err(format!("invalid file stem: {:?}", stem));
            }
        }
        Ok(())
    }

    /// Media kinds this recording requests, in track order.
    pub fn requested_kinds(&self) -> Vec<MediaKind> {
        MediaKind::ALL
            .into_iter()
            .filter(|kind| self.wants(*kind))
            .collect()
    }

    pub fn wants(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.capture_video,
            MediaKind::SystemAudio => self.capture_system_audio,
            MediaKind::Microphone => self.capture_microphone,
        }
    }
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            capture_video: true,
            capture_system_audio: true,
            capture_microphone: false,
            output_directory: PathBuf::from("."),
            file_stem: None,
            format: FormatHints::default(),
            max_duration_secs: None,
            source: None,
        }
    }
}

/// What to do with track files when a session fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialFilePolicy {
    /// Finalize whatever was written so far.
    Keep,
    /// Remove the partial files.
    #[default]
    Delete,
}

/// Engine tuning, independent of any one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Recent presentation timestamps kept per media kind for duplicate detection.
    pub duplicate_history_capacity: usize,

    /// Longest an append waits for a busy sink before failing fast.
    #[serde(with = "duration_millis")]
    pub append_timeout: Duration,

    /// Consecutive append failures on one sink before the session is failed.
    pub max_consecutive_append_failures: u32,

    pub partial_file_policy: PartialFilePolicy,

    /// Interval between progress events while recording.
    #[serde(with = "duration_millis")]
    pub progress_interval: Duration,

    /// Write `<stem>.manifest.json` next to the tracks on a successful stop.
    pub write_manifest_sidecar: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_history_capacity: 30,
            append_timeout: Duration::from_millis(50),
            max_consecutive_append_failures: 10,
            partial_file_policy: PartialFilePolicy::Delete,
            progress_interval: Duration::from_millis(250),
            write_manifest_sidecar: true,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(RecordingOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_track_selection() {
        let options = RecordingOptions {
            capture_video: false,
            capture_system_audio: false,
            capture_microphone: false,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err("no track selected".to_string()));
    }

    #[test]
    fn audio_format_checked_only_when_audio_requested() {
        let mut options = RecordingOptions {
            capture_system_audio: false,
            ..Default::default()
        };
        options.format.bit_depth = 24;
        assert!(options.validate().is_ok());

        options.capture_microphone = true;
        assert!(options.validate().unwrap_err().contains("bit depth"));
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let mut options = RecordingOptions::default();
        options.format.frame_rate = 0.0;
        assert!(options.validate().unwrap_err().contains("frame rate"));
    }

    #[test]
    fn rejects_out_of_range_frame_rates() {
        for rate in [1e-20, -1.0, 1e6, f64::INFINITY, f64::NAN] {
            let mut options = RecordingOptions::default();
            options.format.frame_rate = rate;
            assert!(options.validate().unwrap_err().contains("frame rate"), "rate {}", rate);
        }
    }

    #[test]
    fn rejects_out_of_range_sample_rates() {
        for rate in [0.0, 100.0, 1e12, f64::INFINITY, f64::NAN] {
            let mut options = RecordingOptions::default();
            options.format.sample_rate = rate;
            assert!(options.validate().unwrap_err().contains("sample rate"), "rate {}", rate);
        }
    }

    #[test]
    fn range_edges_are_accepted() {
        let mut options = RecordingOptions::default();
        options.format.frame_rate = 1000.0;
        options.format.sample_rate = 384_000.0;
        assert!(options.validate().is_ok());
        options.format.frame_rate = 0.1;
        options.format.sample_rate = 8_000.0;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_unrepresentable_max_duration() {
        for max in [1e30, f64::INFINITY, f64::NAN, 0.0] {
            let options = RecordingOptions {
                max_duration_secs: Some(max),
                ..Default::default()
            };
            assert!(options.validate().unwrap_err().contains("max duration"), "max {}", max);
        }
    }

    #[test]
    fn frame_interval_never_panics() {
        let mut hints = FormatHints::default();
        assert_eq!(hints.frame_interval(), Duration::from_secs_f64(1.0 / 30.0));
        hints.frame_rate = 1e-20;
        assert_eq!(hints.frame_interval(), Duration::from_secs(10));
        hints.frame_rate = f64::NAN;
        assert_eq!(hints.frame_interval(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn rejects_path_like_stem() {
        let options = RecordingOptions {
            file_stem: Some("../escape".into()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn requested_kinds_follow_track_order() {
        let options = RecordingOptions {
            capture_video: true,
            capture_system_audio: false,
            capture_microphone: true,
            ..Default::default()
        };
        assert_eq!(options.requested_kinds(), vec![MediaKind::Video, MediaKind::Microphone]);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: RecordingOptions =
            serde_json::from_str(r#"{"captureMicrophone": true, "outputDirectory": "/tmp/rec"}"#).unwrap();
        assert!(options.capture_video);
        assert!(options.capture_microphone);
        assert_eq!(options.output_directory, PathBuf::from("/tmp/rec"));
        assert_eq!(options.format, FormatHints::default());
    }

    #[test]
    fn engine_config_round_trips_durations_as_millis() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["appendTimeout"], 50);
        assert_eq!(json["partialFilePolicy"], "delete");

        let config: EngineConfig = serde_json::from_str(r#"{"duplicateHistoryCapacity": 4}"#).unwrap();
        assert_eq!(config.duplicate_history_capacity, 4);
        assert_eq!(config.progress_interval, Duration::from_millis(250));
    }
}
