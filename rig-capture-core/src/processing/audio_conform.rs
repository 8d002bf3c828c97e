//! Pure-math audio conforming for the muxed audio track.
//!
//! Captured audio arrives at whatever rate and layout the microphone session
//! negotiated. Before it is appended to the container it is resampled to the
//! track's sample rate, remixed to the track's channel count, and converted
//! to 16-bit little-endian PCM. All operations work on interleaved `&[f32]`.

use crate::models::capture_models::AudioSampleBuffer;

#[derive(Debug, Clone)]
pub struct AudioConformer {
    pub target_sample_rate: f64,
    pub target_channels: u16,
}

impl AudioConformer {
    pub fn new(target_sample_rate: f64, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels,
        }
    }

    /// Conform one captured buffer, returning PCM16 bytes and the number of
    /// frames they hold.
    pub fn conform(&self, buffer: &AudioSampleBuffer) -> (Vec<u8>, usize) {
        let channels = buffer.channels.max(1) as usize;
        let resampled = self.resample_interleaved(&buffer.samples, channels, buffer.sample_rate);
        let mixed = self.remix(&resampled, channels);
        let frames = mixed.len() / self.target_channels.max(1) as usize;
        (convert_to_int16_pcm(&mixed), frames)
    }

    /// Remix interleaved audio from `channels` to the target channel count.
    ///
    /// Mono is duplicated into every output channel; anything else is averaged
    /// down to mono first.
    pub fn remix(&self, samples: &[f32], channels: usize) -> Vec<f32> {
        let target = self.target_channels.max(1) as usize;
        if channels == target {
            return samples.to_vec();
        }
        let mono = downmix_to_mono(samples, channels);
        if target == 1 {
            return mono;
        }
        let mut out = Vec::with_capacity(mono.len() * target);
        for sample in mono {
            out.extend(std::iter::repeat(sample).take(target));
        }
        out
    }

    /// Linear interpolation resampling for interleaved audio with any number
    /// of channels. Returns input unchanged if rates match.
    pub fn resample_interleaved(&self, samples: &[f32], channels: usize, source_sample_rate: f64) -> Vec<f32> {
        if (source_sample_rate - self.target_sample_rate).abs() < 0.01 || samples.is_empty() || channels == 0 {
            return samples.to_vec();
        }

        let frame_count = samples.len() / channels;
        let ratio = self.target_sample_rate / source_sample_rate;
        let output_frames = (frame_count as f64 * ratio) as usize;
        if output_frames == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0f32; output_frames * channels];
        for i in 0..output_frames {
            let source_index = i as f64 / ratio;
            let index = source_index as usize;
            let fraction = (source_index - index as f64) as f32;

            for ch in 0..channels {
                if index + 1 < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch] * (1.0 - fraction)
                        + samples[(index + 1) * channels + ch] * fraction;
                } else if index < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch];
                }
            }
        }
        output
    }
}

/// Downmix interleaved multi-channel audio to mono by averaging each frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media_time::MediaTime;
    use approx::assert_relative_eq;

    fn pcm_at(pcm: &[u8], index: usize) -> i16 {
        i16::from_le_bytes([pcm[index * 2], pcm[index * 2 + 1]])
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let conformer = AudioConformer::new(48000.0, 2);
        assert_eq!(conformer.remix(&[0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let conformer = AudioConformer::new(48000.0, 1);
        let mono = conformer.remix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn downmix_ignores_trailing_partial_frame() {
        assert_eq!(downmix_to_mono(&[1.0, 1.0, 1.0, 1.0, 0.5], 2), vec![1.0, 1.0]);
    }

    #[test]
    fn int16_conversion_clamps() {
        let pcm = convert_to_int16_pcm(&[0.0, 1.0, -1.0, 2.0, -3.0]);
        assert_eq!(pcm.len(), 10);
        assert_eq!(pcm_at(&pcm, 0), 0);
        assert_eq!(pcm_at(&pcm, 1), i16::MAX);
        assert_eq!(pcm_at(&pcm, 2), -i16::MAX);
        assert_eq!(pcm_at(&pcm, 3), i16::MAX);
        assert_eq!(pcm_at(&pcm, 4), -i16::MAX);
    }

    #[test]
    fn same_rate_is_passthrough() {
        let conformer = AudioConformer::new(44100.0, 2);
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(conformer.resample_interleaved(&samples, 2, 44100.0), samples);
    }

    #[test]
    fn stereo_upsample_interpolates_each_channel() {
        let conformer = AudioConformer::new(48000.0, 2);
        // two frames at 24 kHz: L ramps 0→1, R stays at -1
        let out = conformer.resample_interleaved(&[0.0, -1.0, 1.0, -1.0], 2, 24000.0);
        assert_eq!(out.len(), 8);
        assert_relative_eq!(out[2], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out[3], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn downsample_halves_frame_count() {
        let conformer = AudioConformer::new(24000.0, 1);
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        assert_eq!(conformer.resample_interleaved(&samples, 1, 48000.0).len(), 50);
    }

    #[test]
    fn conform_reports_output_frames() {
        let conformer = AudioConformer::new(44100.0, 2);
        let buffer = AudioSampleBuffer {
            presentation_time: MediaTime::ZERO,
            sample_rate: 44100.0,
            channels: 1,
            samples: vec![0.5; 441],
        };
        let (pcm, frames) = conformer.conform(&buffer);
        assert_eq!(frames, 441);
        assert_eq!(pcm.len(), 441 * 2 * 2);
        assert_eq!(pcm_at(&pcm, 0), pcm_at(&pcm, 1));
    }
}
