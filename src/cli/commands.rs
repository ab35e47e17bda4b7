//! Command implementations for the gansynth-spectral CLI
//!
//! Each command is a plain function returning a [`CommandResult`]; `run`
//! dispatches to them. Nothing here prints except through the result.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::audio::batch::WaveformBatch;
use crate::audio::mel::{cached_filterbank, MelParams};
use crate::audio::wav::{fit_length, read_wav, write_wav_16bit};
use crate::config::SpectralConfig;
use crate::correlation::{cross_correlation, Padding};
use crate::parallel::configure_thread_pool;
use crate::spectrogram::MelSpectrogramPair;
use crate::transform::SpectralTransform;
use crate::SpectralError;

use super::args::{Args, Command, EncodeArgs, FilterbankArgs, RoundtripArgs};
use super::output::{
    describe_config, render, EncodeReport, FileScore, FilterbankReport, RoundtripReport,
};

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Transform error
    #[error("{0}")]
    Spectral(#[from] SpectralError),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// Command execution result
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded
    pub success: bool,
    /// Rendered report for stdout
    pub message: String,
    /// Wall-clock time in milliseconds
    pub elapsed_ms: Option<f64>,
}

impl CommandResult {
    /// Create a success result
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            elapsed_ms: None,
        }
    }

    /// Create a failure result
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            elapsed_ms: None,
        }
    }

    /// Attach elapsed time
    #[must_use]
    pub fn with_elapsed(mut self, started: Instant) -> Self {
        self.elapsed_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
        self
    }
}

/// Run CLI with parsed arguments
///
/// # Errors
/// Returns the first error raised while loading config, reading audio or
/// transforming it.
pub fn run(args: Args) -> CliResult<CommandResult> {
    let started = Instant::now();
    let threads = configure_thread_pool(args.threads)?;
    let config = load_config(&args)?;
    if args.verbose {
        eprintln!("[INFO] {} ({threads} thread(s))", describe_config(&config));
    }

    let result = match &args.command {
        Command::Encode(e) => run_encode(e, config, &args),
        Command::Roundtrip(r) => run_roundtrip(r, config, &args),
        Command::Filterbank(f) => run_filterbank(f, &config, &args),
    }?;
    Ok(result.with_elapsed(started))
}

/// Config file (or defaults) with command-line overrides applied
///
/// # Errors
/// Returns an error if the config file cannot be read or parsed.
pub fn load_config(args: &Args) -> CliResult<SpectralConfig> {
    let base = match &args.config {
        Some(path) => SpectralConfig::from_json_file(path)?,
        None => SpectralConfig::default(),
    };
    Ok(args.command.transform_args().apply(base))
}

/// Run encode command
///
/// # Errors
/// Fails on unreadable audio, a sample-rate mismatch or an invalid config.
pub fn run_encode(args: &EncodeArgs, config: SpectralConfig, global: &Args) -> CliResult<CommandResult> {
    let wav = read_wav(&args.input)?;
    check_sample_rate(&args.input, wav.sample_rate, config.sample_rate)?;
    let input_samples = wav.samples.len();

    let transform = SpectralTransform::new(config)?;
    let waveform = fit_length(wav.samples, transform.waveform_length());
    let pair = transform.to_spectrograms(&waveform)?;

    let mut report = EncodeReport::new(args.input.clone(), input_samples, transform.framing(), &pair);
    if let Some(raw) = &args.raw {
        write_raw(raw, &pair)?;
        report.raw = Some(raw.clone());
    }
    Ok(CommandResult::success(render(&report, global.json)?))
}

/// Run roundtrip command
///
/// # Errors
/// Fails on unreadable audio, a sample-rate mismatch, an invalid config or
/// an unwritable output directory.
pub fn run_roundtrip(args: &RoundtripArgs, config: SpectralConfig, global: &Args) -> CliResult<CommandResult> {
    if args.inputs.is_empty() {
        return Err(CliError::InvalidArgument("no input files specified".to_string()));
    }
    if args.bins == 0 {
        return Err(CliError::InvalidArgument("--bins must be positive".to_string()));
    }

    let sample_rate = config.sample_rate;
    let transform = SpectralTransform::new(config)?;
    let batch = WaveformBatch::from_wav_files(&args.inputs, transform.waveform_length(), sample_rate)?;

    let pairs = transform.encode_batch(&batch)?;
    let reconstructed = transform.to_waveforms_batch(&pairs)?;
    let scores = cross_correlation(batch.examples(), &reconstructed, Padding::Valid, true)?;

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    let mut files = Vec::with_capacity(args.inputs.len());
    for ((input, wave), score) in args.inputs.iter().zip(&reconstructed).zip(&scores) {
        let output = match &args.output_dir {
            Some(dir) => {
                let path = reconstruction_path(dir, input);
                write_wav_16bit(&path, wave, sample_rate)?;
                Some(path)
            }
            None => None,
        };
        if global.verbose {
            eprintln!("[INFO] {} scored {:.4}", input.display(), score[0]);
        }
        files.push(FileScore {
            input: input.clone(),
            score: score[0],
            output,
        });
    }

    let report = RoundtripReport::new(files, args.bins);
    Ok(CommandResult::success(render(&report, global.json)?))
}

/// Run filterbank command
///
/// # Errors
/// Fails if the config describes an invalid filterbank.
pub fn run_filterbank(args: &FilterbankArgs, config: &SpectralConfig, global: &Args) -> CliResult<CommandResult> {
    config.validate()?;
    let bins = config.spectrogram_shape.num_freq_bins;
    let bank = cached_filterbank(MelParams::new(
        bins,
        bins,
        config.sample_rate,
        config.lower_edge_hz,
        config.upper_edge(),
    ))?;
    let report = FilterbankReport::new(&bank, args.bands);
    Ok(CommandResult::success(render(&report, global.json)?))
}

fn check_sample_rate(path: &Path, actual: u32, expected: u32) -> CliResult<()> {
    if actual == expected {
        return Ok(());
    }
    Err(CliError::InvalidArgument(format!(
        "{} is sampled at {actual} Hz, config expects {expected} Hz",
        path.display()
    )))
}

/// `<dir>/<stem>_recon.wav`
fn reconstruction_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    dir.join(format!("{stem}_recon.wav"))
}

/// Both channels as little-endian f32, log-magnitude first
fn write_raw(path: &Path, pair: &MelSpectrogramPair) -> CliResult<()> {
    let bytes: Vec<u8> = pair
        .log_magnitude
        .as_slice()
        .iter()
        .chain(pair.instantaneous_frequency.as_slice())
        .flat_map(|v| v.to_le_bytes())
        .collect();
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SMALL: [&str; 8] = [
        "--waveform-length",
        "600",
        "--time-steps",
        "16",
        "--num-freq-bins",
        "64",
        "--sample-rate",
        "16000",
    ];

    fn parse(head: &[&str]) -> Args {
        let mut argv = vec!["gansynth-spectral"];
        argv.extend_from_slice(head);
        argv.extend_from_slice(&SMALL);
        Args::try_parse_from(argv).expect("parse")
    }

    fn tone_file(dir: &Path, name: &str, rate: u32) -> PathBuf {
        let path = dir.join(name);
        let samples: Vec<f32> = (0..600).map(|i| (i as f32 * 0.2).sin() * 0.5).collect();
        write_wav_16bit(&path, &samples, rate).expect("write wav");
        path
    }

    #[test]
    fn test_encode_text_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = tone_file(dir.path(), "tone.wav", 16_000);
        let args = parse(&["encode", input.to_str().expect("utf8")]);
        let result = run(args).expect("encode");
        assert!(result.success);
        assert!(result.message.contains("spectrogram 16x64"));
        assert!(result.elapsed_ms.is_some());
    }

    #[test]
    fn test_encode_writes_raw_channels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = tone_file(dir.path(), "tone.wav", 16_000);
        let raw = dir.path().join("pair.f32");
        let args = parse(&[
            "encode",
            input.to_str().expect("utf8"),
            "--raw",
            raw.to_str().expect("utf8"),
            "--json",
        ]);
        let result = run(args).expect("encode");
        let value: serde_json::Value = serde_json::from_str(&result.message).expect("json");
        assert_eq!(value["shape"][0], 16);
        assert_eq!(fs::metadata(&raw).expect("raw file").len(), 2 * 16 * 64 * 4);
    }

    #[test]
    fn test_encode_rejects_sample_rate_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = tone_file(dir.path(), "hi.wav", 22_050);
        let err = run(parse(&["encode", input.to_str().expect("utf8")])).expect_err("rate");
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn test_roundtrip_writes_reconstructions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = tone_file(dir.path(), "a.wav", 16_000);
        let b = tone_file(dir.path(), "b.wav", 16_000);
        let out = dir.path().join("recon");
        let args = parse(&[
            "roundtrip",
            a.to_str().expect("utf8"),
            b.to_str().expect("utf8"),
            "-o",
            out.to_str().expect("utf8"),
            "--json",
        ]);
        let result = run(args).expect("roundtrip");
        let value: serde_json::Value = serde_json::from_str(&result.message).expect("json");
        assert_eq!(value["files"].as_array().map(Vec::len), Some(2));
        assert!(out.join("a_recon.wav").exists());

        let recon = read_wav(out.join("b_recon.wav")).expect("read back");
        assert_eq!(recon.samples.len(), 600);
    }

    #[test]
    fn test_filterbank_command() {
        let args = parse(&["filterbank", "--bands"]);
        let result = run(args).expect("filterbank");
        assert!(result.message.starts_with("64 mel x 64 linear bins"));
        assert_eq!(result.message.lines().count(), 2 + 64);
    }

    #[test]
    fn test_config_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let config = SpectralConfig::new(600, 16_000, (16, 64).into(), 0.5);
        fs::write(&path, config.to_json().expect("json")).expect("write config");

        let args = Args::try_parse_from([
            "gansynth-spectral",
            "filterbank",
            "--config",
            path.to_str().expect("utf8"),
        ])
        .expect("parse");
        assert_eq!(load_config(&args).expect("load"), config);
    }

    #[test]
    fn test_invalid_config_surfaces_error() {
        let args = parse(&["filterbank", "--overlap", "1.5"]);
        assert!(matches!(run(args), Err(CliError::Spectral(SpectralError::Config(_)))));
    }

    #[test]
    fn test_reconstruction_path() {
        let path = reconstruction_path(Path::new("out"), Path::new("clips/note.wav"));
        assert_eq!(path, PathBuf::from("out/note_recon.wav"));
    }
}
