use std::f64::consts::TAU;

/// BGRA test pattern: a dark gradient with a white vertical bar that moves
/// one step per frame.
pub fn test_pattern(width: u32, height: u32, frame_index: u64) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let bar_width = (w / 16).max(1);
    let bar_x = (frame_index as usize * bar_width / 4) % w.max(1);

    let mut data = vec![0u8; w * h * 4];
    for (y, row) in data.chunks_exact_mut(w * 4).enumerate() {
        let shade = (y * 255 / h.max(1)) as u8 / 4;
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let lit = x >= bar_x && x < bar_x + bar_width;
            let value = if lit { 255 } else { shade };
            pixel.copy_from_slice(&[value, value, value, 255]);
        }
    }
    data
}

/// Continuous sine tone, interleaved across `channels`.
#[derive(Debug, Clone)]
pub struct SineGenerator {
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    channels: u16,
    phase: f64,
}

impl SineGenerator {
    pub fn new(frequency: f64, amplitude: f32, sample_rate: f64, channels: u16) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            channels: channels.max(1),
            phase: 0.0,
        }
    }

    /// Next `frames` frames of audio.
    pub fn next_buffer(&mut self, frames: usize) -> Vec<f32> {
        let step = TAU * self.frequency / self.sample_rate;
        let mut out = Vec::with_capacity(frames * self.channels as usize);
        for _ in 0..frames {
            let value = (self.phase.sin() as f32) * self.amplitude;
            out.extend(std::iter::repeat(value).take(self.channels as usize));
            self.phase = (self.phase + step) % TAU;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_has_one_byte_per_channel() {
        let frame = test_pattern(32, 8, 0);
        assert_eq!(frame.len(), 32 * 8 * 4);
        // The bar starts at the left edge.
        assert_eq!(&frame[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn bar_moves_between_frames() {
        assert_ne!(test_pattern(64, 4, 0), test_pattern(64, 4, 8));
    }

    #[test]
    fn sine_stays_within_amplitude() {
        let mut tone = SineGenerator::new(440.0, 0.5, 48000.0, 2);
        let buffer = tone.next_buffer(480);

        assert_eq!(buffer.len(), 960);
        assert!(buffer.iter().all(|s| s.abs() <= 0.5));
        assert_eq!(buffer[0], buffer[1]);
        assert!(buffer.iter().any(|s| s.abs() > 0.4));
    }

    #[test]
    fn phase_continues_across_buffers() {
        let mut split = SineGenerator::new(1000.0, 1.0, 8000.0, 1);
        let mut whole = split.clone();

        let mut joined = split.next_buffer(5);
        joined.extend(split.next_buffer(5));

        let expected = whole.next_buffer(10);
        for (a, b) in joined.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
