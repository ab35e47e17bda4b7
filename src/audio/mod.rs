//! Signal-processing primitives
//!
//! Mel filterbanks, STFT/iSTFT, phase unwrapping and WAV I/O. The
//! [`crate::transform`] module chains these into the full pipeline.

pub mod batch;
pub mod mel;
pub mod phase;
pub mod stft;
pub mod wav;

pub use batch::WaveformBatch;
pub use mel::{
    cached_filterbank, hz_to_mel, linear_to_mel_weights, mel_to_hz, mel_to_linear_weights,
    MelFilterbank, MelParams, MelWeightMatrix,
};
pub use phase::{instantaneous_frequency, integrate_instantaneous_frequency, unwrap, unwrap_phase};
pub use stft::{hann_window, inverse_stft_window, ComplexSpectrogram, StftPlan};
pub use wav::{decode_wav, fit_length, read_wav, write_wav_16bit, WavData, WavError};

/// Default sample rate (16 kHz, the NSynth rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default frame length for the default spectrogram shape (`2 * 1024`)
pub const DEFAULT_FRAME_LENGTH: usize = 2 * crate::config::DEFAULT_NUM_FREQ_BINS;

/// Default hop for the default shape and overlap
pub const DEFAULT_FRAME_STEP: usize = 512;
