//! Inbound audio frame decoding.
//!
//! Devices send one encoded packet per binary frame. A [`FrameDecoder`] turns
//! a packet into 16-bit little-endian linear PCM for voice-activity analysis.
//! Decoders are created per connection because codec state (Opus) is carried
//! from packet to packet.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

/// Encoding of inbound binary frames.
///
/// Defaults to Opus only when the `opus` feature can decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[cfg_attr(feature = "opus", default)]
    Opus,
    /// Already linear 16-bit little-endian PCM
    #[cfg_attr(not(feature = "opus"), default)]
    Pcm16,
}

impl AudioFormat {
    /// Whether this build can decode the format
    pub fn is_supported(&self) -> bool {
        match self {
            AudioFormat::Opus => cfg!(feature = "opus"),
            AudioFormat::Pcm16 => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Opus => "opus",
            AudioFormat::Pcm16 => "pcm16",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "opus" => Ok(AudioFormat::Opus),
            "pcm16" | "pcm" | "linear16" => Ok(AudioFormat::Pcm16),
            other => Err(format!(
                "Unsupported audio format '{other}'. Expected 'opus' or 'pcm16'"
            )),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioDecodeError {
    #[error("Opus decode failed: {0}")]
    Opus(String),
    #[error("Decoder unavailable: {0}")]
    Unavailable(String),
}

/// Turns one encoded packet into linear PCM bytes.
pub trait FrameDecoder: Send {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<u8>, AudioDecodeError>;

    fn format(&self) -> AudioFormat;
}

/// Decode a frame, falling back to the raw bytes when decoding fails.
pub fn decode_lenient(decoder: &mut dyn FrameDecoder, frame: &[u8]) -> Vec<u8> {
    match decoder.decode(frame) {
        Ok(pcm) => pcm,
        Err(e) => {
            debug!(
                "{} decode failed ({}), treating {} bytes as linear audio",
                decoder.format(),
                e,
                frame.len()
            );
            frame.to_vec()
        }
    }
}

/// Decoder for frames that already carry linear PCM.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pcm16Passthrough;

impl FrameDecoder for Pcm16Passthrough {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<u8>, AudioDecodeError> {
        Ok(frame.to_vec())
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Pcm16
    }
}

/// Stateful mono Opus decoder.
#[cfg(feature = "opus")]
pub struct OpusFrameDecoder {
    decoder: opus::Decoder,
    pcm: Vec<i16>,
}

#[cfg(feature = "opus")]
impl OpusFrameDecoder {
    /// Largest packet Opus can produce: 120 ms at 48 kHz
    const MAX_FRAME_SAMPLES: usize = 5760;

    pub fn new(sample_rate: u32) -> Result<Self, AudioDecodeError> {
        let decoder = opus::Decoder::new(sample_rate, opus::Channels::Mono)
            .map_err(|e| AudioDecodeError::Unavailable(e.to_string()))?;
        Ok(Self {
            decoder,
            pcm: vec![0i16; Self::MAX_FRAME_SAMPLES],
        })
    }
}

#[cfg(feature = "opus")]
impl FrameDecoder for OpusFrameDecoder {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<u8>, AudioDecodeError> {
        let samples = self
            .decoder
            .decode(frame, &mut self.pcm, false)
            .map_err(|e| AudioDecodeError::Opus(e.to_string()))?;
        Ok(samples_to_le_bytes(&self.pcm[..samples]))
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Opus
    }
}

/// Serialize samples as 16-bit little-endian bytes
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Create the decoder for a connection.
///
/// Never fails: when the requested codec cannot be built the connection
/// falls back to passthrough, which the segmenter tolerates.
pub fn create_frame_decoder(format: AudioFormat, sample_rate: u32) -> Box<dyn FrameDecoder> {
    match format {
        AudioFormat::Pcm16 => Box::new(Pcm16Passthrough),
        AudioFormat::Opus => build_opus_decoder(sample_rate),
    }
}

#[cfg(feature = "opus")]
fn build_opus_decoder(sample_rate: u32) -> Box<dyn FrameDecoder> {
    match OpusFrameDecoder::new(sample_rate) {
        Ok(decoder) => Box::new(decoder),
        Err(e) => {
            warn!("Failed to create Opus decoder at {sample_rate} Hz: {e}; using passthrough");
            Box::new(Pcm16Passthrough)
        }
    }
}

#[cfg(not(feature = "opus"))]
fn build_opus_decoder(sample_rate: u32) -> Box<dyn FrameDecoder> {
    warn!(
        "Opus input configured at {sample_rate} Hz but the `opus` feature is disabled; using passthrough"
    );
    Box::new(Pcm16Passthrough)
}
