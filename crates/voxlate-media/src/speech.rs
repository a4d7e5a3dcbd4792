//! Energy-based speech presence check.

use crate::codec::DecodedAudio;

/// Default RMS threshold on the 16-bit scale.
pub const DEFAULT_SPEECH_THRESHOLD: f64 = 300.0;

/// Scale a sample of any supported bit depth to the 16-bit range.
fn to_16bit(sample: i32, bits: u16) -> f64 {
    match bits {
        0..=16 => (sample as f64) * f64::from(1u32 << (16 - bits.min(16))),
        _ => (sample as f64) / f64::from(1u32 << (bits.min(32) - 16)),
    }
}

/// Compute RMS energy of a frame of 16-bit-scaled samples.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Whether any 20ms frame of the audio rises above `threshold` RMS.
pub fn contains_speech(audio: &DecodedAudio, threshold: f64) -> bool {
    let frame_len = (audio.format.sample_rate as usize / 50).max(1) * audio.format.channels.max(1) as usize;
    audio.samples.chunks(frame_len).any(|frame| {
        let scaled: Vec<f64> = frame
            .iter()
            .map(|&s| to_16bit(s, audio.format.bits_per_sample))
            .collect();
        rms(&scaled) > threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AudioFormat;

    #[test]
    fn test_rms_calculation() {
        assert_eq!(rms(&[0.0; 320]), 0.0);
        assert!((rms(&[100.0; 320]) - 100.0).abs() < 0.01);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_silence_has_no_speech() {
        let audio = DecodedAudio::new(AudioFormat::SPEECH_16K, vec![0; 16_000]);
        assert!(!contains_speech(&audio, DEFAULT_SPEECH_THRESHOLD));

        let empty = DecodedAudio::new(AudioFormat::SPEECH_16K, vec![]);
        assert!(!contains_speech(&empty, DEFAULT_SPEECH_THRESHOLD));
    }

    #[test]
    fn test_single_loud_frame_counts_as_speech() {
        let mut samples = vec![0; 16_000];
        for s in &mut samples[8_000..8_320] {
            *s = 2_000;
        }
        let audio = DecodedAudio::new(AudioFormat::SPEECH_16K, samples);
        assert!(contains_speech(&audio, DEFAULT_SPEECH_THRESHOLD));
    }

    #[test]
    fn test_bit_depth_normalization() {
        // 24-bit sample 512_000 is 2_000 on the 16-bit scale
        let format = AudioFormat {
            bits_per_sample: 24,
            ..AudioFormat::SPEECH_16K
        };
        let audio = DecodedAudio::new(format, vec![512_000; 320]);
        assert!(contains_speech(&audio, 1_999.0));
        assert!(!contains_speech(&audio, 2_001.0));

        // 8-bit sample 8 is 2_048 on the 16-bit scale
        let format = AudioFormat {
            bits_per_sample: 8,
            ..AudioFormat::SPEECH_16K
        };
        let audio = DecodedAudio::new(format, vec![8; 320]);
        assert!(contains_speech(&audio, 2_000.0));
    }
}
