//! RIFF/WAVE header for the 16-bit PCM audio tracks.
//!
//! The header is written with a zero data size when a track is created and
//! rewritten in place once the track is finished.

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest PCM payload a RIFF header can describe (the RIFF size field is
/// `36 + data_size` in a `u32`).
pub const MAX_DATA_SIZE: u64 = (u32::MAX - 36) as u64;

/// PCM layout of one audio track file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl WavSpec {
    /// 16-bit PCM layout for a track, or `None` when the rate or channel
    /// count cannot be encoded in the header fields.
    pub fn pcm16(sample_rate: f64, channels: u16) -> Option<Self> {
        if !sample_rate.is_finite() || sample_rate < 1.0 || sample_rate > u32::MAX as f64 || channels == 0 {
            return None;
        }
        let spec = Self {
            sample_rate: sample_rate.round() as u32,
            channels,
            bit_depth: 16,
        };
        let block_align = channels.checked_mul(2)?;
        spec.sample_rate.checked_mul(block_align as u32)?;
        Some(spec)
    }

    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bit_depth) / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align() as u32)
    }

    /// Build the header for `data_size` bytes of sample data. Sizes above
    /// `MAX_DATA_SIZE` saturate the RIFF size field.
    ///
    /// ```text
    /// [0-3]   "RIFF"        [4-7]   36 + data_size
    /// [8-11]  "WAVE"        [12-15] "fmt "
    /// [16-19] 16            [20-21] 1 (PCM)
    /// [22-23] channels      [24-27] sample_rate
    /// [28-31] byte_rate     [32-33] block_align
    /// [34-35] bit_depth     [36-39] "data"
    /// [40-43] data_size
    /// ```
    pub fn header(&self, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
        let mut header = [0u8; WAV_HEADER_SIZE];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&data_size.saturating_add(36).to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bit_depth.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&data_size.to_le_bytes());
        header
    }
}

/// Read back the `(spec, data_size)` encoded in a header.
pub fn parse_header(header: &[u8]) -> Option<(WavSpec, u32)> {
    if header.len() < WAV_HEADER_SIZE || &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return None;
    }
    let u16_at = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);
    let u32_at = |at: usize| u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);

    let spec = WavSpec {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bit_depth: u16_at(34),
    };
    Some((spec, u32_at(40)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEREO_48K: WavSpec = WavSpec {
        sample_rate: 48000,
        channels: 2,
        bit_depth: 16,
    };

    #[test]
    fn header_layout() {
        let header = STEREO_48K.header(9600);

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 36 + 9600);
    }

    #[test]
    fn derived_rates() {
        assert_eq!(STEREO_48K.block_align(), 4);
        assert_eq!(STEREO_48K.byte_rate(), 192000);

        let mono = WavSpec {
            channels: 1,
            ..STEREO_48K
        };
        assert_eq!(mono.byte_rate(), 96000);
    }

    #[test]
    fn riff_size_at_the_data_limit() {
        let header = STEREO_48K.header(MAX_DATA_SIZE as u32);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), u32::MAX);

        let over = STEREO_48K.header(u32::MAX);
        assert_eq!(u32::from_le_bytes([over[4], over[5], over[6], over[7]]), u32::MAX);
    }

    #[test]
    fn pcm16_rejects_unencodable_layouts() {
        assert_eq!(WavSpec::pcm16(48000.0, 2), Some(STEREO_48K));
        assert_eq!(WavSpec::pcm16(f64::INFINITY, 2), None);
        assert_eq!(WavSpec::pcm16(f64::NAN, 2), None);
        assert_eq!(WavSpec::pcm16(0.0, 2), None);
        assert_eq!(WavSpec::pcm16(48000.0, 0), None);
        // Fits in u32, but the byte rate does not.
        assert_eq!(WavSpec::pcm16(4_000_000_000.0, 2), None);
    }

    #[test]
    fn parse_reads_back_spec() {
        let header = STEREO_48K.header(128);
        assert_eq!(parse_header(&header), Some((STEREO_48K, 128)));
        assert_eq!(parse_header(&header[..20]), None);
        assert_eq!(parse_header(&[0u8; 44]), None);
    }
}
