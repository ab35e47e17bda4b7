//! Command-line argument parsing for the gansynth-spectral CLI
//!
//! Uses clap derive macros; every structure here is unit-testable.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::config::{PaddingMode, SpectralConfig, SpectrogramShape};

/// gansynth-spectral: log-mel / instantaneous-frequency spectral transforms
#[derive(Parser, Debug, Clone)]
#[command(name = "gansynth-spectral")]
#[command(version)]
#[command(about = "GANSynth spectral transforms for fixed-length audio", long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (timing and config details on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long, global = true)]
    pub json: bool,

    /// JSON transform config (defaults to the NSynth setup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of worker threads (default: auto)
    #[arg(long, global = true)]
    pub threads: Option<usize>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert a WAV file to a spectrogram pair and report statistics
    Encode(EncodeArgs),

    /// Round-trip WAV files and score the reconstructions
    Roundtrip(RoundtripArgs),

    /// Summarize the mel filterbank for the current config
    Filterbank(FilterbankArgs),
}

/// Config overrides shared by every command
#[derive(ClapArgs, Debug, Clone, Default, PartialEq)]
pub struct TransformArgs {
    /// Samples per waveform
    #[arg(long)]
    pub waveform_length: Option<usize>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Spectrogram frames
    #[arg(long)]
    pub time_steps: Option<usize>,

    /// Spectrogram frequency bins
    #[arg(long)]
    pub num_freq_bins: Option<usize>,

    /// Frame overlap fraction in [0, 1)
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Where padding goes
    #[arg(long)]
    pub padding: Option<PaddingArg>,
}

impl TransformArgs {
    /// Apply the overrides on top of `config`
    #[must_use]
    pub fn apply(&self, mut config: SpectralConfig) -> SpectralConfig {
        if let Some(length) = self.waveform_length {
            config.waveform_length = length;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        let shape = config.spectrogram_shape;
        config.spectrogram_shape = SpectrogramShape::new(
            self.time_steps.unwrap_or(shape.time_steps),
            self.num_freq_bins.unwrap_or(shape.num_freq_bins),
        );
        if let Some(overlap) = self.overlap {
            config.overlap = overlap;
        }
        if let Some(padding) = self.padding {
            config.padding = padding.into();
        }
        config
    }
}

/// Padding placement argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingArg {
    /// All padding before the waveform
    Front,
    /// All padding after the waveform
    Back,
    /// Split evenly
    Symmetric,
}

impl From<PaddingArg> for PaddingMode {
    fn from(arg: PaddingArg) -> Self {
        match arg {
            PaddingArg::Front => Self::Front,
            PaddingArg::Back => Self::Back,
            PaddingArg::Symmetric => Self::Symmetric,
        }
    }
}

/// Arguments for encode command
#[derive(Parser, Debug, Clone)]
pub struct EncodeArgs {
    /// Input WAV file (padded or trimmed to the waveform length)
    pub input: PathBuf,

    /// Write both channels as little-endian f32 (log-magnitude first)
    #[arg(long)]
    pub raw: Option<PathBuf>,

    /// Transform overrides
    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Arguments for roundtrip command
#[derive(Parser, Debug, Clone)]
pub struct RoundtripArgs {
    /// Input WAV files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for reconstructed WAV files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Histogram bins for correlation scores
    #[arg(long, default_value = "10")]
    pub bins: usize,

    /// Transform overrides
    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Arguments for filterbank command
#[derive(Parser, Debug, Clone)]
pub struct FilterbankArgs {
    /// List every filter's edges
    #[arg(long)]
    pub bands: bool,

    /// Transform overrides
    #[command(flatten)]
    pub transform: TransformArgs,
}

impl Command {
    /// Transform overrides of whichever command was chosen
    #[must_use]
    pub const fn transform_args(&self) -> &TransformArgs {
        match self {
            Self::Encode(a) => &a.transform,
            Self::Roundtrip(a) => &a.transform,
            Self::Filterbank(a) => &a.transform,
        }
    }
}
