//! Fixed-length waveform batches
//!
//! The transform works on batches of equal-length examples. A
//! [`WaveformBatch`] enforces that length on insertion so batch conversion
//! never has to re-check individual clips.

use std::path::Path;

use super::wav::{fit_length, read_wav};
use crate::error::{SpectralError, SpectralResult};

/// Batch of waveforms that all have the same length
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBatch {
    waveform_length: usize,
    examples: Vec<Vec<f32>>,
}

impl WaveformBatch {
    /// Create an empty batch for clips of `waveform_length` samples
    #[must_use]
    pub fn new(waveform_length: usize) -> Self {
        Self {
            waveform_length,
            examples: Vec::new(),
        }
    }

    /// Build a batch from clips that already have the right length
    ///
    /// # Errors
    /// Returns a shape mismatch naming the first clip with a different length.
    pub fn from_examples(waveform_length: usize, examples: Vec<Vec<f32>>) -> SpectralResult<Self> {
        let mut batch = Self::new(waveform_length);
        batch.examples.reserve(examples.len());
        for example in examples {
            batch.push(example)?;
        }
        Ok(batch)
    }

    /// Build a batch, zero-padding or truncating every clip to `waveform_length`
    #[must_use]
    pub fn from_clips(waveform_length: usize, clips: Vec<Vec<f32>>) -> Self {
        Self {
            waveform_length,
            examples: clips
                .into_iter()
                .map(|clip| fit_length(clip, waveform_length))
                .collect(),
        }
    }

    /// Load WAV files into a batch, fitting each clip to `waveform_length`
    ///
    /// # Errors
    /// Returns an I/O or audio error for unreadable files, and a config error
    /// if a file's sample rate differs from `sample_rate`.
    pub fn from_wav_files<P: AsRef<Path>>(
        paths: &[P],
        waveform_length: usize,
        sample_rate: u32,
    ) -> SpectralResult<Self> {
        let mut clips = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let wav = read_wav(path)?;
            if wav.sample_rate != sample_rate {
                return Err(SpectralError::config(format!(
                    "{} is sampled at {} Hz, expected {sample_rate} Hz",
                    path.display(),
                    wav.sample_rate
                )));
            }
            clips.push(wav.samples);
        }
        Ok(Self::from_clips(waveform_length, clips))
    }

    /// Append one clip
    ///
    /// # Errors
    /// Returns a shape mismatch if the clip is not `waveform_length` long.
    pub fn push(&mut self, example: Vec<f32>) -> SpectralResult<()> {
        if example.len() != self.waveform_length {
            return Err(SpectralError::shape(&[self.waveform_length], &[example.len()]));
        }
        self.examples.push(example);
        Ok(())
    }

    /// Samples per clip
    #[must_use]
    pub const fn waveform_length(&self) -> usize {
        self.waveform_length
    }

    /// Number of clips
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the batch holds no clips
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Clip at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.examples.get(index).map(Vec::as_slice)
    }

    /// All clips
    #[must_use]
    pub fn examples(&self) -> &[Vec<f32>] {
        &self.examples
    }

    /// Iterate over clips
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.examples.iter().map(Vec::as_slice)
    }

    /// Consume into the clips
    #[must_use]
    pub fn into_examples(self) -> Vec<Vec<f32>> {
        self.examples
    }

    /// Remove every clip
    pub fn clear(&mut self) {
        self.examples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::write_wav_16bit;

    #[test]
    fn test_new_batch_is_empty() {
        let batch = WaveformBatch::new(16);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.waveform_length(), 16);
    }

    #[test]
    fn test_push_checks_length() {
        let mut batch = WaveformBatch::new(4);
        assert!(batch.push(vec![0.0; 4]).is_ok());
        let err = batch.push(vec![0.0; 5]).expect_err("wrong length");
        assert!(matches!(err, SpectralError::ShapeMismatch { .. }));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_from_examples_rejects_ragged() {
        assert!(WaveformBatch::from_examples(3, vec![vec![0.0; 3], vec![1.0; 3]]).is_ok());
        assert!(WaveformBatch::from_examples(3, vec![vec![0.0; 3], vec![1.0; 2]]).is_err());
    }

    #[test]
    fn test_from_clips_fits_length() {
        let batch = WaveformBatch::from_clips(3, vec![vec![1.0], vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(batch.get(0), Some(&[1.0, 0.0, 0.0][..]));
        assert_eq!(batch.get(1), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(batch.get(2), None);
    }

    #[test]
    fn test_iter_and_clear() {
        let mut batch = WaveformBatch::from_clips(2, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let sums: Vec<f32> = batch.iter().map(|c| c.iter().sum()).collect();
        assert_eq!(sums, vec![2.0, 4.0]);
        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_from_wav_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_wav_16bit(&a, &[0.5; 10], 16_000).expect("write a");
        write_wav_16bit(&b, &[0.25; 30], 16_000).expect("write b");

        let batch = WaveformBatch::from_wav_files(&[&a, &b], 20, 16_000).expect("load");
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|c| c.len() == 20));
        assert!(batch.examples()[0][15].abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_wav_files_rate_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hi.wav");
        write_wav_16bit(&path, &[0.0; 10], 44_100).expect("write");
        let err = WaveformBatch::from_wav_files(&[&path], 10, 16_000).expect_err("rate");
        assert!(matches!(err, SpectralError::Config(_)));
    }
}
