//! Spectral transform benchmarks
//!
//! Measures each stage of the NSynth-sized pipeline (64000 samples at
//! 16 kHz, 128 x 1024 spectrograms, 75% overlap) plus batch throughput.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench transform
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gansynth_spectral::audio::mel::{MelFilterbank, MelParams};
use gansynth_spectral::audio::phase::instantaneous_frequency;
use gansynth_spectral::audio::stft::StftPlan;
use gansynth_spectral::{cross_correlation, Axis, Padding, SpectralConfig, SpectralTransform, Spectrogram};
use std::hint::black_box;

/// Generate a decaying two-partial tone (16kHz mono f32)
fn generate_audio(num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / 16_000.0;
            let phase = 2.0 * std::f32::consts::PI * 440.0 * t;
            (-2.0 * t).exp() * (0.5 * phase.sin() + 0.2 * (3.0 * phase).sin())
        })
        .collect()
}

fn nsynth() -> SpectralTransform {
    SpectralTransform::new(SpectralConfig::default()).expect("default config")
}

/// Filterbank construction (uncached)
fn bench_filterbank(c: &mut Criterion) {
    let mut group = c.benchmark_group("filterbank");
    for bins in [256_usize, 1024] {
        let params = MelParams::new(bins, bins, 16_000, 0.0, 8_000.0);
        group.bench_with_input(BenchmarkId::new("build", bins), &params, |b, params| {
            b.iter(|| black_box(MelFilterbank::new(*params).expect("filterbank")));
        });
    }
    group.finish();
}

/// STFT and inverse STFT at 2048 / 512
fn bench_stft(c: &mut Criterion) {
    let plan = StftPlan::new(2048, 512).expect("plan");
    let signal = generate_audio(67_072);
    let spectrum = plan.stft(&signal);

    let mut group = c.benchmark_group("stft");
    group.throughput(Throughput::Elements(signal.len() as u64));
    group.bench_function("forward", |b| b.iter(|| black_box(plan.stft(black_box(&signal)))));
    group.bench_function("inverse", |b| {
        b.iter(|| black_box(plan.istft(black_box(&spectrum)).expect("istft")));
    });
    group.finish();
}

/// Phase differencing over a full spectrogram
fn bench_phase(c: &mut Criterion) {
    let phases = Spectrogram::from_fn(128, 1024, |t, k| ((t * 31 + k * 7) % 628) as f32 / 100.0 - std::f32::consts::PI);
    c.bench_function("instantaneous_frequency_128x1024", |b| {
        b.iter(|| black_box(instantaneous_frequency(black_box(&phases), Axis::Time)));
    });
}

/// Full forward and inverse transforms
fn bench_transform(c: &mut Criterion) {
    let transform = nsynth();
    let waveform = generate_audio(64_000);
    let pair = transform.to_spectrograms(&waveform).expect("forward");

    let mut group = c.benchmark_group("transform");
    group.sample_size(20);
    group.throughput(Throughput::Elements(waveform.len() as u64));
    group.bench_function("to_spectrograms", |b| {
        b.iter(|| black_box(transform.to_spectrograms(black_box(&waveform)).expect("forward")));
    });
    group.bench_function("to_waveform", |b| {
        b.iter(|| black_box(transform.to_waveform(black_box(&pair)).expect("inverse")));
    });
    group.finish();
}

/// Batch conversion and scoring
fn bench_batch(c: &mut Criterion) {
    let transform = nsynth();
    let mut group = c.benchmark_group("batch");
    group.sample_size(10);

    for size in [1_usize, 4, 8] {
        let waveforms: Vec<Vec<f32>> = (0..size).map(|_| generate_audio(64_000)).collect();
        group.throughput(Throughput::Elements((size * 64_000) as u64));
        group.bench_with_input(BenchmarkId::new("round_trip", size), &waveforms, |b, waves| {
            b.iter(|| {
                let pairs = transform.to_spectrograms_batch(waves).expect("forward");
                let back = transform.to_waveforms_batch(&pairs).expect("inverse");
                black_box(cross_correlation(waves, &back, Padding::Valid, true).expect("scores"))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_filterbank,
    bench_stft,
    bench_phase,
    bench_transform,
    bench_batch
);
criterion_main!(benches);
