//! Base64 WAV/PCM codec adapter.
//!
//! Only linear integer PCM is accepted. Float and compressed WAV variants are
//! rejected before any audio leaves the process.

use std::io::Cursor;

use base64::Engine;
use thiserror::Error;
use tracing::debug;

/// Smallest possible RIFF/WAVE file: RIFF header, 16-byte fmt chunk, data header.
pub const MIN_WAV_LEN: usize = 44;

/// PCM format metadata taken from (or written to) the WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl AudioFormat {
    /// 16 kHz 16-bit mono, as consumed and emitted by the speech services.
    pub const SPEECH_16K: AudioFormat = AudioFormat {
        sample_rate: 16_000,
        bits_per_sample: 16,
        channels: 1,
    };

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

/// Raw interleaved PCM samples plus their format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub format: AudioFormat,
    pub samples: Vec<i32>,
}

impl DecodedAudio {
    pub fn new(format: AudioFormat, samples: Vec<i32>) -> Self {
        Self { format, samples }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        match self.format.channels {
            0 => 0,
            ch => self.samples.len() / ch as usize,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self.format.sample_rate {
            0 => 0,
            rate => self.frames() as u64 * 1000 / rate as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Re-encode as a WAV byte buffer.
    pub fn to_wav(&self) -> Result<Vec<u8>, EncodeError> {
        encode(&self.samples, self.format)
    }

    /// Convert to [`AudioFormat::SPEECH_16K`]: scale to 16-bit, average the
    /// channels down to mono, then resample to 16 kHz.
    pub fn into_speech_format(self) -> DecodedAudio {
        let target = AudioFormat::SPEECH_16K;
        if self.format == target {
            return self;
        }

        let bits = self.format.bits_per_sample;
        let channels = self.format.channels.max(1) as usize;
        let mono: Vec<i32> = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i64 = frame.iter().map(|&s| to_16_bit(s, bits) as i64).sum();
                (sum / channels as i64) as i32
            })
            .collect();

        let samples = resample(&mono, self.format.sample_rate, target.sample_rate);
        debug!(
            from_rate = self.format.sample_rate,
            from_bits = bits,
            from_channels = self.format.channels,
            frames = samples.len(),
            "Converted audio to 16 kHz mono"
        );
        DecodedAudio::new(target, samples)
    }
}

fn to_16_bit(sample: i32, bits: u16) -> i32 {
    match bits {
        0..=15 => sample << (16 - bits),
        16 => sample,
        _ => sample >> (bits - 16),
    }
}

/// Linear interpolation resampling.
fn resample(samples: &[i32], from_rate: u32, to_rate: u32) -> Vec<i32> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(last);
            let fraction = source_pos - source_idx as f64;

            if source_idx >= last {
                samples[last]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction).round() as i32
            }
        })
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("audio_data is not valid base64: {0}")]
    Base64(String),

    #[error("audio_data decoded to an empty buffer")]
    Empty,

    #[error("audio buffer is {len} bytes, shorter than a minimal WAV header ({MIN_WAV_LEN} bytes)")]
    TooShort { len: usize },

    #[error("malformed WAV container: {0}")]
    Malformed(String),

    #[error("unsupported audio codec: {0} (only linear PCM is accepted)")]
    UnsupportedCodec(String),

    #[error("WAV header is inconsistent with the buffer: {0}")]
    InconsistentLength(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot encode {bits}-bit PCM with {channels} channel(s) at {sample_rate} Hz")]
    UnsupportedFormat {
        bits: u16,
        channels: u16,
        sample_rate: u32,
    },

    #[error("sample count {samples} is not a multiple of {channels} channels")]
    PartialFrame { samples: usize, channels: u16 },

    #[error("WAV write failed: {0}")]
    Write(String),
}

/// Decode base64 text into PCM samples.
///
/// ASCII whitespace inside the base64 (line-wrapped payloads) is ignored.
pub fn decode(base64_text: &str) -> Result<DecodedAudio, DecodeError> {
    let compact: String;
    let text = if base64_text.bytes().any(|b| b.is_ascii_whitespace()) {
        compact = base64_text.split_ascii_whitespace().collect();
        compact.as_str()
    } else {
        base64_text
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    decode_wav(&bytes)
}

/// Parse a WAV byte buffer into PCM samples.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() < MIN_WAV_LEN {
        return Err(DecodeError::TooShort { len: bytes.len() });
    }

    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(header_error)?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int {
        return Err(DecodeError::UnsupportedCodec("IEEE float".into()));
    }
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(DecodeError::Malformed(format!(
            "{} channel(s) at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let declared = reader.len() as usize;
    let samples = reader
        .into_samples::<i32>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| match e {
            hound::Error::IoError(io) => DecodeError::InconsistentLength(format!(
                "header declares {declared} samples but the data ends early ({io})"
            )),
            other => DecodeError::Malformed(other.to_string()),
        })?;

    if samples.len() % spec.channels as usize != 0 {
        return Err(DecodeError::InconsistentLength(format!(
            "{} samples do not divide into {} channels",
            samples.len(),
            spec.channels
        )));
    }

    let format = AudioFormat {
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        channels: spec.channels,
    };
    debug!(
        bytes = bytes.len(),
        samples = samples.len(),
        sample_rate = format.sample_rate,
        bits = format.bits_per_sample,
        channels = format.channels,
        "Decoded WAV"
    );

    Ok(DecodedAudio { format, samples })
}

fn header_error(err: hound::Error) -> DecodeError {
    match err {
        hound::Error::Unsupported => DecodeError::UnsupportedCodec("non-PCM format tag".into()),
        hound::Error::FormatError(msg) => DecodeError::Malformed(msg.to_string()),
        hound::Error::IoError(io) => DecodeError::Malformed(format!("truncated header ({io})")),
        other => DecodeError::Malformed(other.to_string()),
    }
}

/// Write samples into a WAV byte buffer.
pub fn encode(samples: &[i32], format: AudioFormat) -> Result<Vec<u8>, EncodeError> {
    let supported_bits = matches!(format.bits_per_sample, 8 | 16 | 24 | 32);
    if !supported_bits || format.channels == 0 || format.sample_rate == 0 {
        return Err(EncodeError::UnsupportedFormat {
            bits: format.bits_per_sample,
            channels: format.channels,
            sample_rate: format.sample_rate,
        });
    }
    if samples.len() % format.channels as usize != 0 {
        return Err(EncodeError::PartialFrame {
            samples: samples.len(),
            channels: format.channels,
        });
    }

    let bytes_per_sample = format.bits_per_sample as usize / 8;
    let mut cursor = Cursor::new(Vec::with_capacity(MIN_WAV_LEN + samples.len() * bytes_per_sample));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, format.wav_spec())
            .map_err(|e| EncodeError::Write(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| EncodeError::Write(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| EncodeError::Write(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// A header-only WAV with zero samples.
pub fn silence(format: AudioFormat) -> Result<Vec<u8>, EncodeError> {
    encode(&[], format)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(format: AudioFormat, frames: usize, amplitude: i32) -> Vec<i32> {
        (0..frames * format.channels as usize)
            .map(|i| if (i / 8) % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_roundtrip_supported_formats() {
        for (bits, amplitude) in [(8u16, 100), (16, 12_000), (24, 4_000_000), (32, 1_000_000_000)] {
            for channels in [1u16, 2] {
                let format = AudioFormat {
                    sample_rate: 16_000,
                    bits_per_sample: bits,
                    channels,
                };
                let samples = tone(format, 320, amplitude);
                let wav = encode(&samples, format).unwrap();
                let decoded = decode(&encode_base64(&wav)).unwrap();
                assert_eq!(decoded.format, format, "{bits}-bit {channels}ch");
                assert_eq!(decoded.samples, samples, "{bits}-bit {channels}ch");
            }
        }
    }

    #[test]
    fn test_wav_header_layout() {
        let samples = vec![0i32; 16_000];
        let wav = encode(&samples, AudioFormat::SPEECH_16K).unwrap();

        assert_eq!(wav.len(), MIN_WAV_LEN + 16_000 * 2);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 16_000);
    }

    #[test]
    fn test_silence_is_header_only() {
        let wav = silence(AudioFormat::SPEECH_16K).unwrap();
        assert_eq!(wav.len(), MIN_WAV_LEN);
        let decoded = decode_wav(&wav).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.duration_ms(), 0);
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode("not base64!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_decode_accepts_wrapped_base64() {
        let wav = encode(&[1, 2, 3, 4], AudioFormat::SPEECH_16K).unwrap();
        let b64 = encode_base64(&wav);
        let wrapped = format!("{}\n{}\r\n", &b64[..20], &b64[20..]);
        assert_eq!(decode(&wrapped).unwrap().samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_rejects_empty_and_short() {
        assert_eq!(decode(""), Err(DecodeError::Empty));
        assert_eq!(
            decode_wav(b"RIFF\x00\x00"),
            Err(DecodeError::TooShort { len: 6 })
        );
    }

    #[test]
    fn test_decode_rejects_non_riff() {
        let junk = vec![0x55u8; 128];
        assert!(matches!(decode_wav(&junk), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..32 {
                writer.write_sample(0.25f32).unwrap();
            }
            writer.finalize().unwrap();
        }
        assert!(matches!(
            decode_wav(&cursor.into_inner()),
            Err(DecodeError::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn test_decode_rejects_compressed_format_tag() {
        let mut wav = encode(&[0; 64], AudioFormat::SPEECH_16K).unwrap();
        // fmt audio_format at offset 20: 0x11 = IMA ADPCM
        wav[20] = 0x11;
        wav[21] = 0x00;
        assert!(matches!(
            decode_wav(&wav),
            Err(DecodeError::UnsupportedCodec(_)) | Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let wav = encode(&[7; 1_000], AudioFormat::SPEECH_16K).unwrap();
        let truncated = &wav[..wav.len() - 500];
        assert!(matches!(
            decode_wav(truncated),
            Err(DecodeError::InconsistentLength(_))
        ));
    }

    #[test]
    fn test_encode_rejects_partial_frame_and_bad_format() {
        let stereo = AudioFormat {
            channels: 2,
            ..AudioFormat::SPEECH_16K
        };
        assert!(matches!(
            encode(&[1, 2, 3], stereo),
            Err(EncodeError::PartialFrame { .. })
        ));

        let odd = AudioFormat {
            bits_per_sample: 12,
            ..AudioFormat::SPEECH_16K
        };
        assert!(matches!(
            encode(&[], odd),
            Err(EncodeError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_speech_format_is_untouched() {
        let audio = DecodedAudio::new(AudioFormat::SPEECH_16K, vec![1, -2, 3]);
        assert_eq!(audio.clone().into_speech_format(), audio);
    }

    #[test]
    fn test_cd_quality_stereo_converts_to_speech_format() {
        let format = AudioFormat {
            sample_rate: 44_100,
            bits_per_sample: 24,
            channels: 2,
        };
        // one second, left channel loud and right channel silent
        let samples: Vec<i32> = (0..44_100).flat_map(|_| [2_000_000, 0]).collect();
        let wav = encode(&samples, format).unwrap();

        let converted = decode_wav(&wav).unwrap().into_speech_format();

        assert_eq!(converted.format, AudioFormat::SPEECH_16K);
        assert_eq!(converted.frames(), 16_000);
        assert_eq!(converted.duration_ms(), 1_000);
        // 24-bit 2_000_000 is 7_812 at 16 bits, halved by the downmix
        assert!(converted.samples.iter().all(|&s| s == 3_906));
    }

    #[test]
    fn test_upsamples_8_bit_8k() {
        let format = AudioFormat {
            sample_rate: 8_000,
            bits_per_sample: 8,
            channels: 1,
        };
        let audio = DecodedAudio::new(format, vec![0, 100, 0, -100]);
        let converted = audio.into_speech_format();
        assert_eq!(converted.frames(), 8);
        assert_eq!(converted.samples[..4], [0, 12_800, 25_600, 12_800]);
        assert_eq!(converted.samples[7], -25_600);
    }

    #[test]
    fn test_duration() {
        let audio = DecodedAudio::new(AudioFormat::SPEECH_16K, vec![0; 8_000]);
        assert_eq!(audio.frames(), 8_000);
        assert_eq!(audio.duration_ms(), 500);
    }
}
