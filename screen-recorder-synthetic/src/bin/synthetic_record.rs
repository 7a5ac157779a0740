//! Synthetic Recorder
//!
//! Drives a complete recording session against the synthetic capture
//! stream and prints the resulting manifest.
//!
//! Usage:
//!   cargo run -p screen-recorder-synthetic --bin synthetic-record [-- [OPTIONS]]

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use screen_recorder_core::{
    EngineConfig, FormatHints, OutputManifest, ProgressUpdate, RecordingOptions, SessionObserver, SessionPhase,
    StreamError, StreamSessionController,
};
use screen_recorder_synthetic::SyntheticStream;

const DEFAULT_DURATION_SECS: f64 = 3.0;

fn print_help() {
    println!(
        "\n\
Synthetic Recorder

Records a generated test pattern and tone through the full session engine.

USAGE:
    cargo run -p screen-recorder-synthetic --bin synthetic-record [-- [OPTIONS]]

OPTIONS:
    --duration <secs>    Active recording time (default: {DEFAULT_DURATION_SECS}s)
    --output <dir>       Output directory (default: ./recordings)
    --stem <name>        File name stem (default: recording_<uuid>)
    --size <WxH>         Video frame size (default: 640x360)
    --fps <rate>         Video frame rate (default: 30)
    --mic                Also record the microphone track
    --no-video           Audio only
    --pause-at <secs>    Pause once after this much recording
    --pause-for <secs>   Length of that pause (default: 1)
    --fail-after <secs>  Inject a stream failure
    --verbose            Debug logging
    --help               Show this help message
"
    );
}

fn parse_arg_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

/// Seconds given for `flag` as a `Duration`, or a usage error for values
/// that are negative, not finite or too large.
fn parse_secs(args: &[String], flag: &str) -> Result<Option<Duration>, String> {
    match parse_arg_value::<f64>(args, flag) {
        None => Ok(None),
        Some(secs) if secs < 0.0 => Err(format!("{} must not be negative", flag)),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| format!("{} {} is not a usable number of seconds", flag, secs)),
    }
}

/// When to pause, fail and stop, relative to the start of recording.
#[derive(Debug, PartialEq)]
struct Timing {
    total: Duration,
    pause_at: Option<Duration>,
    pause_for: Duration,
    fail_after: Option<Duration>,
}

impl Timing {
    fn from_args(args: &[String]) -> Result<Self, String> {
        Ok(Self {
            total: parse_secs(args, "--duration")?.unwrap_or(Duration::from_secs_f64(DEFAULT_DURATION_SECS)),
            pause_at: parse_secs(args, "--pause-at")?,
            pause_for: parse_secs(args, "--pause-for")?.unwrap_or(Duration::from_secs(1)),
            fail_after: parse_secs(args, "--fail-after")?,
        })
    }
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Prints session notifications as they arrive.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_phase_changed(&self, from: SessionPhase, to: SessionPhase) {
        println!("phase: {} -> {}", from, to);
    }

    fn on_progress(&self, progress: &ProgressUpdate) {
        log::debug!(
            "{:>6.2}s  system {:.3}  mic {:.3}",
            progress.elapsed.as_secs_f64(),
            progress.levels.system_level,
            progress.levels.mic_level
        );
    }

    fn on_failure(&self, error: &StreamError) {
        eprintln!("capture failed: {}", error);
    }

    fn on_session_finished(&self, manifest: &OutputManifest) {
        println!("finished: {} track(s)", manifest.tracks.len());
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    let verbose = args.iter().any(|a| a == "--verbose");
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let timing = match Timing::from_args(&args) {
        Ok(timing) => timing,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Run with --help for usage.");
            process::exit(2);
        }
    };
    let (width, height) = parse_arg_value::<String>(&args, "--size")
        .and_then(|s| parse_size(&s))
        .unwrap_or((640, 360));

    let options = RecordingOptions {
        capture_video: !args.iter().any(|a| a == "--no-video"),
        capture_microphone: args.iter().any(|a| a == "--mic"),
        output_directory: parse_arg_value::<PathBuf>(&args, "--output").unwrap_or_else(|| PathBuf::from("recordings")),
        file_stem: parse_arg_value::<String>(&args, "--stem"),
        format: FormatHints {
            width,
            height,
            frame_rate: parse_arg_value::<f64>(&args, "--fps").unwrap_or(30.0),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut stream = SyntheticStream::new();
    if let Some(after) = timing.fail_after {
        stream = stream.with_failure_after(after, StreamError::Interrupted("injected".into()));
    }

    let controller = StreamSessionController::new(stream, EngineConfig::default());
    controller.add_observer(Arc::new(ConsoleObserver));

    if let Err(e) = controller.begin(options) {
        eprintln!("Failed to begin recording: {}", e);
        process::exit(1);
    }

    match timing.pause_at {
        Some(at) if at < timing.total => {
            thread::sleep(at);
            report(controller.pause());
            thread::sleep(timing.pause_for);
            report(controller.resume());
            thread::sleep(timing.total - at);
        }
        _ => thread::sleep(timing.total),
    }

    if controller.phase() == SessionPhase::Failed {
        let diagnostics = controller.diagnostics();
        eprintln!("Session failed; diagnostics:");
        eprintln!("{}", serde_json::to_string_pretty(&diagnostics).unwrap_or_default());
        process::exit(2);
    }

    match controller.stop() {
        Ok(Some(manifest)) => match serde_json::to_string_pretty(&manifest) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render manifest: {}", e),
        },
        Ok(None) => println!("Session was already stopping"),
        Err(e) => {
            eprintln!("Failed to stop recording: {}", e);
            process::exit(1);
        }
    }
}

fn report<E: std::fmt::Display>(result: Result<(), E>) {
    if let Err(e) = result {
        eprintln!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("synthetic-record").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn timing_defaults() {
        let timing = Timing::from_args(&args(&[])).unwrap();
        assert_eq!(timing.total, Duration::from_secs(3));
        assert_eq!(timing.pause_for, Duration::from_secs(1));
        assert_eq!(timing.pause_at, None);
    }

    #[test]
    fn unusable_seconds_are_usage_errors() {
        assert!(Timing::from_args(&args(&["--duration", "inf"])).is_err());
        assert!(Timing::from_args(&args(&["--fail-after", "1e30"])).is_err());
        assert!(Timing::from_args(&args(&["--pause-at", "-2"])).is_err());
    }

    #[test]
    fn parses_fractional_seconds() {
        let timing = Timing::from_args(&args(&["--pause-at", "0.5", "--fail-after", "2"])).unwrap();
        assert_eq!(timing.pause_at, Some(Duration::from_millis(500)));
        assert_eq!(timing.fail_after, Some(Duration::from_secs(2)));
    }
}
