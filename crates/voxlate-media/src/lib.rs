//! Media handling: WAV/PCM codec adapter and speech-energy detection.

pub mod codec;
pub mod speech;

pub use codec::{AudioFormat, DecodeError, DecodedAudio, EncodeError};
