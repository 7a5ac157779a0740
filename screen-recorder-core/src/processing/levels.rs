use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::diagnostics::AudioLevels;
use crate::models::sample::MediaKind;

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Latest audio levels, written from the audio delivery threads without locking.
#[derive(Debug, Default)]
pub struct LevelMeter {
    system_rms: AtomicU32,
    system_peak: AtomicU32,
    mic_rms: AtomicU32,
    mic_peak: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, kind: MediaKind, samples: &[f32]) {
        let (rms, peak) = match kind {
            MediaKind::SystemAudio => (&self.system_rms, &self.system_peak),
            MediaKind::Microphone => (&self.mic_rms, &self.mic_peak),
            MediaKind::Video => return,
        };
        rms.store(rms_level(samples).to_bits(), Ordering::Relaxed);
        peak.store(peak_level(samples).to_bits(), Ordering::Relaxed);
    }

    pub fn levels(&self) -> AudioLevels {
        let load = |value: &AtomicU32| f32::from_bits(value.load(Ordering::Relaxed));
        AudioLevels {
            system_level: load(&self.system_rms),
            mic_level: load(&self.mic_rms),
            peak_system_level: load(&self.system_peak),
            peak_mic_level: load(&self.mic_peak),
        }
    }

    pub fn reset(&self) {
        for value in [&self.system_rms, &self.system_peak, &self.mic_rms, &self.mic_peak] {
            value.store(0f32.to_bits(), Ordering::Relaxed);
        }
    }
}
