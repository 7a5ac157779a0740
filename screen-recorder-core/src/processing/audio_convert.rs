/// Converts delivered audio buffers into a track's PCM layout.
///
/// Capture layers deliver interleaved f32 audio at whatever rate and channel
/// count the device negotiated. Each audio track is written at a fixed rate
/// and channel count, so buffers are adapted in three steps: channel layout,
/// linear-interpolation resampling, then 16-bit PCM.
#[derive(Debug, Clone)]
pub struct AudioConverter {
    pub target_sample_rate: f64,
    pub target_channels: u16,
}

impl AudioConverter {
    pub fn new(target_sample_rate: f64, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels: target_channels.max(1),
        }
    }

    /// Full conversion of one delivered buffer to little-endian PCM16 bytes.
    pub fn convert(&self, samples: &[f32], sample_rate: f64, channels: u16) -> Vec<u8> {
        let laid_out = self.match_channels(samples, channels);
        to_pcm16(&self.resample(&laid_out, sample_rate))
    }

    /// Adapt interleaved `samples` with `channels` channels to the target count.
    pub fn match_channels(&self, samples: &[f32], channels: u16) -> Vec<f32> {
        let channels = channels.max(1);
        match (channels, self.target_channels) {
            (from, to) if from == to => samples.to_vec(),
            (1, to) => samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(to as usize))
                .collect(),
            (from, 1) => downmix_to_mono(samples, from as usize),
            // More than two source channels into stereo: keep the front pair.
            (from, _) => samples
                .chunks_exact(from as usize)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect(),
        }
    }

    /// Resample interleaved audio already laid out with `target_channels`
    /// channels, interpolating linearly between neighbouring frames.
    ///
    /// Near-equal rates pass through untouched.
    pub fn resample(&self, samples: &[f32], source_sample_rate: f64) -> Vec<f32> {
        let channels = self.target_channels as usize;
        if samples.is_empty() || source_sample_rate <= 0.0 || (source_sample_rate - self.target_sample_rate).abs() < 0.01
        {
            return samples.to_vec();
        }

        let frames: Vec<&[f32]> = samples.chunks_exact(channels).collect();
        let step = source_sample_rate / self.target_sample_rate;
        let out_frames = (frames.len() as f64 / step) as usize;

        let mut out = Vec::with_capacity(out_frames * channels);
        for n in 0..out_frames {
            let position = n as f64 * step;
            let Some(current) = frames.get(position as usize) else {
                break;
            };
            let next = frames.get(position as usize + 1).unwrap_or(current);
            let t = position.fract() as f32;
            out.extend(current.iter().zip(next.iter()).map(|(a, b)| a + (b - a) * t));
        }
        out
    }
}

/// Average each interleaved frame down to one channel.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 | 1 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Convert f32 samples in `[-1.0, 1.0]` to little-endian 16-bit PCM,
/// clamping anything outside that range.
pub fn to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
        .collect()
}
