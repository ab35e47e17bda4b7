//! WAV reading and writing
//!
//! Decodes RIFF/WAVE clips into mono `f32` samples in `[-1, 1]` and encodes
//! reconstructed waveforms back to 16-bit PCM.

use std::path::Path;

use thiserror::Error;

use crate::error::{SpectralError, SpectralResult};

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

const RIFF_HEADER_LEN: usize = 12;
const CANONICAL_HEADER_LEN: usize = 44;

/// WAV decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    /// Input shorter than a canonical header
    #[error("WAV data too small ({0} bytes)")]
    TooSmall(usize),
    /// First four bytes are not `RIFF`
    #[error("invalid WAV: missing RIFF header")]
    MissingRiff,
    /// Bytes 8..12 are not `WAVE`
    #[error("invalid WAV: missing WAVE marker")]
    MissingWave,
    /// `fmt ` chunk runs past the end of the data
    #[error("invalid WAV: fmt chunk truncated")]
    FmtTruncated,
    /// `data` chunk appears before any `fmt ` chunk
    #[error("invalid WAV: data chunk before fmt chunk")]
    MissingFmt,
    /// Encoding not handled
    #[error("unsupported WAV encoding: format {format}, {bits} bits")]
    UnsupportedFormat {
        /// Format tag (1 = PCM, 3 = float)
        format: u16,
        /// Bits per sample
        bits: u16,
    },
    /// Only mono and stereo are handled
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u16),
    /// No `data` chunk present
    #[error("invalid WAV: no data chunk found")]
    NoDataChunk,
}

impl From<WavError> for SpectralError {
    fn from(e: WavError) -> Self {
        Self::Audio(e.to_string())
    }
}

/// Sample encodings the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleEncoding {
    Unsigned8,
    Signed16,
    Signed24,
    Signed32,
    Float32,
}

impl SampleEncoding {
    fn from_tag(format: u16, bits: u16) -> Option<Self> {
        match (format, bits) {
            (FORMAT_PCM, 8) => Some(Self::Unsigned8),
            (FORMAT_PCM, 16) => Some(Self::Signed16),
            (FORMAT_PCM, 24) => Some(Self::Signed24),
            (FORMAT_PCM, 32) => Some(Self::Signed32),
            (FORMAT_IEEE_FLOAT, 32) => Some(Self::Float32),
            _ => None,
        }
    }

    const fn width(self) -> usize {
        match self {
            Self::Unsigned8 => 1,
            Self::Signed16 => 2,
            Self::Signed24 => 3,
            Self::Signed32 | Self::Float32 => 4,
        }
    }

    fn decode(self, b: &[u8]) -> f32 {
        match self {
            Self::Unsigned8 => (f32::from(b[0]) - 128.0) / 128.0,
            Self::Signed16 => f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0,
            Self::Signed24 => {
                let sign = if b[2] & 0x80 == 0 { 0x00 } else { 0xFF };
                i32::from_le_bytes([b[0], b[1], b[2], sign]) as f32 / 8_388_608.0
            }
            Self::Signed32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0,
            Self::Float32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        }
    }
}

/// Decoded clip
#[derive(Debug, Clone, PartialEq)]
pub struct WavData {
    /// Mono samples in `[-1, 1]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count before downmixing
    pub original_channels: u16,
    /// Bits per sample in the file
    pub bits_per_sample: u16,
}

impl WavData {
    /// Duration in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Parsed `fmt ` chunk
#[derive(Debug, Clone, Copy)]
struct FormatChunk {
    format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

impl FormatChunk {
    /// Parse a `fmt ` body, resolving extensible sub-formats
    fn parse(body: &[u8]) -> Result<Self, WavError> {
        if body.len() < 16 {
            return Err(WavError::FmtTruncated);
        }
        let le16 = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
        let mut format = le16(0);
        // Extensible layout keeps the real tag in the first two bytes of the
        // sub-format GUID at offset 24
        if format == FORMAT_EXTENSIBLE && body.len() >= 26 {
            format = le16(24);
        }
        Ok(Self {
            format,
            channels: le16(2),
            sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
            bits_per_sample: le16(14),
        })
    }
}

/// Decode WAV bytes to mono `f32` samples
///
/// Handles 8-bit unsigned, 16/24/32-bit signed PCM and 32-bit float, in
/// plain or extensible format, mono or stereo (averaged to mono).
///
/// # Errors
/// Returns a [`WavError`] for malformed or unsupported data.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(data), fields(data_len = data.len()))
)]
pub fn decode_wav(data: &[u8]) -> Result<WavData, WavError> {
    if data.len() < CANONICAL_HEADER_LEN {
        return Err(WavError::TooSmall(data.len()));
    }
    if &data[0..4] != b"RIFF" {
        return Err(WavError::MissingRiff);
    }
    if &data[8..12] != b"WAVE" {
        return Err(WavError::MissingWave);
    }

    let mut fmt: Option<FormatChunk> = None;
    let mut pos = RIFF_HEADER_LEN;
    while data.len().saturating_sub(pos) >= 8 {
        let id = &data[pos..pos + 4];
        let size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]) as usize;
        let body_start = pos + 8;

        match id {
            b"fmt " => {
                let end = body_start.checked_add(size).ok_or(WavError::FmtTruncated)?;
                if end > data.len() {
                    return Err(WavError::FmtTruncated);
                }
                fmt = Some(FormatChunk::parse(&data[body_start..end])?);
            }
            b"data" => {
                let fmt = fmt.ok_or(WavError::MissingFmt)?;
                let end = body_start.saturating_add(size).min(data.len());
                return decode_samples(&data[body_start..end], fmt);
            }
            _ => {}
        }
        // Chunks are word aligned
        pos = body_start.saturating_add(size).saturating_add(size % 2);
    }

    Err(WavError::NoDataChunk)
}

fn decode_samples(body: &[u8], fmt: FormatChunk) -> Result<WavData, WavError> {
    let encoding = SampleEncoding::from_tag(fmt.format, fmt.bits_per_sample).ok_or(
        WavError::UnsupportedFormat {
            format: fmt.format,
            bits: fmt.bits_per_sample,
        },
    )?;
    let interleaved: Vec<f32> = body
        .chunks_exact(encoding.width())
        .map(|b| encoding.decode(b))
        .collect();
    let samples = match fmt.channels {
        1 => interleaved,
        2 => interleaved
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect(),
        n => return Err(WavError::UnsupportedChannels(n)),
    };
    Ok(WavData {
        samples,
        sample_rate: fmt.sample_rate,
        original_channels: fmt.channels,
        bits_per_sample: fmt.bits_per_sample,
    })
}

/// Read and decode a WAV file
///
/// # Errors
/// Returns [`SpectralError::Io`] if the file cannot be read and
/// [`SpectralError::Audio`] if it cannot be decoded.
pub fn read_wav(path: impl AsRef<Path>) -> SpectralResult<WavData> {
    let bytes = std::fs::read(path)?;
    Ok(decode_wav(&bytes)?)
}

/// Encode mono samples as a canonical 16-bit PCM WAV
///
/// Samples are clamped to `[-1, 1]` before quantization.
#[must_use]
pub fn encode_wav_16bit(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(CANONICAL_HEADER_LEN + samples.len() * 2);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16_u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2_u16.to_le_bytes());
    out.extend_from_slice(&16_u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        let q = (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
        out.extend_from_slice(&q.to_le_bytes());
    }
    out
}

/// Write mono samples to `path` as 16-bit PCM
///
/// # Errors
/// Returns [`SpectralError::Io`] if the file cannot be written.
pub fn write_wav_16bit(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> SpectralResult<()> {
    std::fs::write(path, encode_wav_16bit(samples, sample_rate))?;
    Ok(())
}

/// Zero-pad or truncate `samples` to exactly `length`
///
/// Clips are taken from the start; padding goes at the end.
#[must_use]
pub fn fit_length(mut samples: Vec<f32>, length: usize) -> Vec<f32> {
    samples.resize(length, 0.0);
    samples
}
