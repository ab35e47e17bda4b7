//! Report formatting for the CLI
//!
//! Every command produces a report that renders either as aligned text or
//! as pretty-printed JSON.

use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::audio::mel::MelFilterbank;
use crate::config::{FramingParams, SpectralConfig};
use crate::correlation::Histogram;
use crate::spectrogram::{linear_map, MelSpectrogramPair, SpectrogramStats};

use super::commands::CliResult;

/// A command outcome that can be printed
pub trait Report: Serialize {
    /// Human-readable rendering
    fn to_text(&self) -> String;
}

/// Render `report` as text or JSON
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render<R: Report>(report: &R, json: bool) -> CliResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(report).map_err(crate::SpectralError::from)?)
    } else {
        Ok(report.to_text())
    }
}

/// Framing summary shared by reports
#[derive(Debug, Clone, Serialize)]
pub struct FramingSummary {
    /// Samples per frame
    pub frame_length: usize,
    /// Hop between frames
    pub frame_step: usize,
    /// Padded signal length
    pub num_samples: usize,
}

impl From<FramingParams> for FramingSummary {
    fn from(f: FramingParams) -> Self {
        Self {
            frame_length: f.frame_length,
            frame_step: f.frame_step,
            num_samples: f.num_samples,
        }
    }
}

/// Statistics of one channel plus its mean in display range
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    /// Raw statistics
    pub stats: SpectrogramStats,
    /// Mean mapped from `[-1, 1]` to `[0, 255]`
    pub display_mean: f32,
}

impl ChannelSummary {
    fn new(stats: SpectrogramStats) -> Self {
        Self {
            stats,
            display_mean: linear_map(stats.mean, -1.0, 1.0, 0.0, 255.0),
        }
    }
}

/// Result of `encode`
#[derive(Debug, Clone, Serialize)]
pub struct EncodeReport {
    /// Input file
    pub input: PathBuf,
    /// Samples read before fitting
    pub input_samples: usize,
    /// `[time_steps, num_freq_bins]`
    pub shape: [usize; 2],
    /// Framing used
    pub framing: FramingSummary,
    /// Log-magnitude channel
    pub log_magnitude: ChannelSummary,
    /// Instantaneous-frequency channel
    pub instantaneous_frequency: ChannelSummary,
    /// Raw dump path, when written
    pub raw: Option<PathBuf>,
}

impl EncodeReport {
    /// Summarize `pair`
    #[must_use]
    pub fn new(input: PathBuf, input_samples: usize, framing: FramingParams, pair: &MelSpectrogramPair) -> Self {
        Self {
            input,
            input_samples,
            shape: pair.dims(),
            framing: framing.into(),
            log_magnitude: ChannelSummary::new(pair.log_magnitude.stats()),
            instantaneous_frequency: ChannelSummary::new(pair.instantaneous_frequency.stats()),
            raw: None,
        }
    }
}

fn write_stats(out: &mut String, label: &str, c: &ChannelSummary) {
    let s = c.stats;
    let _ = writeln!(
        out,
        "  {label:<24} min {:>9.4}  max {:>9.4}  mean {:>9.4}  std {:>9.4}",
        s.min, s.max, s.mean, s.std
    );
}

impl Report for EncodeReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.input.display());
        let _ = writeln!(
            out,
            "  samples {} -> spectrogram {}x{} (frame {}, step {}, padded {})",
            self.input_samples,
            self.shape[0],
            self.shape[1],
            self.framing.frame_length,
            self.framing.frame_step,
            self.framing.num_samples
        );
        write_stats(&mut out, "log-magnitude", &self.log_magnitude);
        write_stats(&mut out, "instantaneous frequency", &self.instantaneous_frequency);
        if let Some(raw) = &self.raw {
            let _ = writeln!(out, "  raw channels written to {}", raw.display());
        }
        out
    }
}

/// Per-file round-trip score
#[derive(Debug, Clone, Serialize)]
pub struct FileScore {
    /// Input file
    pub input: PathBuf,
    /// Normalized zero-lag correlation with the reconstruction
    pub score: f32,
    /// Reconstruction path, when written
    pub output: Option<PathBuf>,
}

/// Result of `roundtrip`
#[derive(Debug, Clone, Serialize)]
pub struct RoundtripReport {
    /// Scores in input order
    pub files: Vec<FileScore>,
    /// Mean score
    pub mean_score: f32,
    /// Score distribution over `[-1, 1]`
    pub histogram: Histogram,
}

impl RoundtripReport {
    /// Collect scores and build the histogram
    #[must_use]
    pub fn new(files: Vec<FileScore>, bins: usize) -> Self {
        let scores: Vec<f32> = files.iter().map(|f| f.score).collect();
        let mean_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };
        Self {
            histogram: Histogram::of_scores(&scores, bins),
            files,
            mean_score,
        }
    }
}

impl Report for RoundtripReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for f in &self.files {
            let _ = write!(out, "{:>8.4}  {}", f.score, f.input.display());
            if let Some(path) = &f.output {
                let _ = write!(out, " -> {}", path.display());
            }
            out.push('\n');
        }
        let _ = writeln!(out, "mean score {:.4} over {} file(s)", self.mean_score, self.files.len());

        let edges = self.histogram.bin_edges();
        let peak = self.histogram.counts().iter().copied().max().unwrap_or(0).max(1);
        for (i, &count) in self.histogram.counts().iter().enumerate() {
            let bar = "#".repeat((count * 40 / peak) as usize);
            let _ = writeln!(out, "[{:>5.2}, {:>5.2}) {count:>5} {bar}", edges[i], edges[i + 1]);
        }
        out
    }
}

/// One filter's edges in Hz
#[derive(Debug, Clone, Serialize)]
pub struct BandSummary {
    /// Lower edge
    pub lower_hz: f64,
    /// Peak
    pub center_hz: f64,
    /// Upper edge
    pub upper_hz: f64,
}

/// Result of `filterbank`
#[derive(Debug, Clone, Serialize)]
pub struct FilterbankReport {
    /// Mel bins
    pub num_mel_bins: usize,
    /// Linear bins
    pub num_spectrogram_bins: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Lower edge in Hz
    pub lower_edge_hz: f64,
    /// Upper edge in Hz
    pub upper_edge_hz: f64,
    /// Minimum filter width in Hz
    pub min_bandwidth_hz: f64,
    /// Filters widened to the minimum width
    pub widened: usize,
    /// Non-zero forward weights
    pub nonzero_weights: usize,
    /// Every filter, when requested
    pub bands: Option<Vec<BandSummary>>,
}

impl FilterbankReport {
    /// Summarize `bank`
    #[must_use]
    pub fn new(bank: &MelFilterbank, list_bands: bool) -> Self {
        let p = bank.params();
        let bands = list_bands.then(|| {
            bank.bands()
                .iter()
                .map(|b| BandSummary {
                    lower_hz: b.lower_hz,
                    center_hz: b.center_hz,
                    upper_hz: b.upper_hz,
                })
                .collect()
        });
        Self {
            num_mel_bins: p.num_mel_bins,
            num_spectrogram_bins: p.num_spectrogram_bins,
            sample_rate: p.sample_rate,
            lower_edge_hz: p.lower_edge_hz,
            upper_edge_hz: p.upper_edge_hz,
            min_bandwidth_hz: p.min_bandwidth_hz(),
            widened: bank.widened_count(),
            nonzero_weights: bank.forward().as_slice().iter().filter(|&&w| w != 0.0).count(),
            bands,
        }
    }
}

impl Report for FilterbankReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} mel x {} linear bins at {} Hz, {:.1}-{:.1} Hz",
            self.num_mel_bins, self.num_spectrogram_bins, self.sample_rate, self.lower_edge_hz, self.upper_edge_hz
        );
        let _ = writeln!(
            out,
            "min bandwidth {:.2} Hz, {} filter(s) widened, {} non-zero weights",
            self.min_bandwidth_hz, self.widened, self.nonzero_weights
        );
        if let Some(bands) = &self.bands {
            for (i, b) in bands.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{i:>5}  {:>10.2} {:>10.2} {:>10.2}",
                    b.lower_hz, b.center_hz, b.upper_hz
                );
            }
        }
        out
    }
}

/// Effective config echoed in verbose mode
#[must_use]
pub fn describe_config(config: &SpectralConfig) -> String {
    format!(
        "waveform {} samples @ {} Hz, spectrogram {}x{}, overlap {}, padding {:?}",
        config.waveform_length,
        config.sample_rate,
        config.spectrogram_shape.time_steps,
        config.spectrogram_shape.num_freq_bins,
        config.overlap,
        config.padding
    )
}
