//! Derived metrics
//!
//! This module computes secondary metrics from buffered signals:
//! - RMSSD heart-rate variability from inter-beat intervals
//! - Respiration rate from the accelerometer z-axis via spectral peak picking

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Root mean square of successive differences, rounded to 0.1 ms.
///
/// Returns `None` for fewer than two intervals.
pub fn rmssd<'a, I>(ibis: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a u32>,
{
    let mut prev: Option<f64> = None;
    let mut sum_sq = 0.0;
    let mut count = 0usize;

    for &ibi in ibis {
        let ibi = f64::from(ibi);
        if let Some(p) = prev {
            let diff = ibi - p;
            sum_sq += diff * diff;
            count += 1;
        }
        prev = Some(ibi);
    }

    if count == 0 {
        return None;
    }
    let value = (sum_sq / count as f64).sqrt();
    Some((value * 10.0).round() / 10.0)
}

/// Symmetric Hamming window of length `n`
pub fn hamming_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
            .collect(),
    }
}

/// Index of the largest value, first one wins on ties
pub fn dominant_bin(spectrum: &[f64]) -> Option<usize> {
    spectrum
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Frequency (Hz) of the strongest bin in the non-negative half of a
/// `padding`-point spectrum
pub fn dominant_frequency(spectrum: &[f64], sample_rate_hz: f64, padding: usize) -> Option<f64> {
    let bin = dominant_bin(spectrum)?;
    Some(bin as f64 * sample_rate_hz / padding as f64)
}

/// Dominant-frequency respiration estimator.
///
/// Mean removal, Hamming window, zero padding to a fixed FFT length, then the
/// largest bin of the non-negative half of the magnitude spectrum.
pub struct RespirationEstimator {
    fft: Arc<dyn Fft<f64>>,
    padding: usize,
    sample_rate_hz: f64,
    range_bpm: Option<(f64, f64)>,
}

impl fmt::Debug for RespirationEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RespirationEstimator")
            .field("padding", &self.padding)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("range_bpm", &self.range_bpm)
            .finish()
    }
}

impl RespirationEstimator {
    /// Plan an estimator for `padding`-point FFTs of a signal sampled at
    /// `sample_rate_hz`
    pub fn new(padding: usize, sample_rate_hz: f64) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(padding),
            padding,
            sample_rate_hz,
            range_bpm: None,
        }
    }

    /// Only report estimates inside `[min, max]` breaths per minute
    pub fn with_range(mut self, range_bpm: Option<(f64, f64)>) -> Self {
        self.range_bpm = range_bpm;
        self
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Width of one frequency bin in breaths per minute
    pub fn resolution_bpm(&self) -> f64 {
        self.sample_rate_hz / self.padding as f64 * 60.0
    }

    /// Magnitude spectrum over non-negative frequencies, normalised to a peak
    /// of 1.0. `None` for an empty or constant signal.
    pub fn normalized_spectrum(&self, samples: &[f64]) -> Option<Vec<f64>> {
        if samples.is_empty() || samples.len() > self.padding {
            return None;
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let window = hamming_window(samples.len());

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(window.iter())
            .map(|(&x, &w)| Complex::new((x - mean) * w, 0.0))
            .collect();
        buffer.resize(self.padding, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let mut spectrum: Vec<f64> = buffer
            .iter()
            .take(self.padding / 2)
            .map(|c| c.norm())
            .collect();

        let max = spectrum.iter().cloned().fold(0.0, f64::max);
        if max <= f64::EPSILON {
            return None;
        }
        spectrum.iter_mut().for_each(|v| *v /= max);
        Some(spectrum)
    }

    /// Respiration rate of `samples` in breaths per minute, ignoring the
    /// plausibility range
    pub fn estimate_raw(&self, samples: &[f64]) -> Option<f64> {
        let spectrum = self.normalized_spectrum(samples)?;
        let hz = dominant_frequency(&spectrum, self.sample_rate_hz, self.padding)?;
        Some(hz * 60.0)
    }

    /// Respiration rate in breaths per minute, withheld when outside the
    /// configured range
    pub fn estimate(&self, samples: &[f64]) -> Option<f64> {
        let bpm = self.estimate_raw(samples)?;
        if !self.is_plausible(bpm) {
            log::debug!("Respiration estimate {:.1} BPM outside plausible range", bpm);
            return None;
        }
        Some(bpm)
    }

    pub fn is_plausible(&self, bpm: f64) -> bool {
        self.range_bpm
            .map_or(true, |(min, max)| bpm >= min && bpm <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinusoid(freq_hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 1.0 + 0.05 * (2.0 * PI * freq_hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_rmssd_known_value() {
        // diffs 100, -100
        assert_eq!(rmssd(&[1000, 1100, 1000]), Some(100.0));
    }

    #[test]
    fn test_rmssd_rounds_to_one_decimal() {
        // diffs 0, 100 -> sqrt(5000) = 70.71
        assert_eq!(rmssd(&[1000, 1000, 1100]), Some(70.7));
    }

    #[test]
    fn test_rmssd_degenerate() {
        assert_eq!(rmssd(&[]), None);
        assert_eq!(rmssd(&[850]), None);
    }

    #[test]
    fn test_rmssd_idempotent_and_order_sensitive() {
        let ibis = [812, 845, 790, 901, 860];
        assert_eq!(rmssd(&ibis), rmssd(&ibis));

        let reordered = [790, 812, 845, 860, 901];
        assert_ne!(rmssd(&ibis), rmssd(&reordered));
    }

    #[test]
    fn test_hamming_window() {
        let w = hamming_window(5);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!((w[4] - 0.08).abs() < 1e-12);
        assert_eq!(hamming_window(1), vec![1.0]);
        assert!(hamming_window(0).is_empty());
    }

    #[test]
    fn test_dominant_bin() {
        assert_eq!(dominant_bin(&[0.1, 0.9, 0.3, 0.9]), Some(1));
        assert_eq!(dominant_bin(&[]), None);
        assert_eq!(dominant_frequency(&[0.0, 0.2, 1.0], 200.0, 400), Some(1.0));
    }

    #[test]
    fn test_respiration_recovers_sinusoid() {
        let estimator = RespirationEstimator::new(15_000, 200.0);
        let samples = sinusoid(0.3, 200.0, 4200);
        let bpm = estimator.estimate_raw(&samples).unwrap();
        assert!(
            (bpm - 18.0).abs() <= estimator.resolution_bpm(),
            "estimated {bpm}"
        );
    }

    #[test]
    fn test_respiration_bin_mapping() {
        // bin_index * 100 / (padding / 2) * 60 at 200 Hz
        let estimator = RespirationEstimator::new(15_000, 200.0);
        assert!((estimator.resolution_bpm() - 100.0 / 7500.0 * 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_spectrum_is_normalized() {
        let estimator = RespirationEstimator::new(4096, 200.0);
        let spectrum = estimator
            .normalized_spectrum(&sinusoid(0.25, 200.0, 2000))
            .unwrap();
        assert_eq!(spectrum.len(), 2048);
        let max = spectrum.iter().cloned().fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_signal_unavailable() {
        let estimator = RespirationEstimator::new(1024, 200.0);
        assert_eq!(estimator.estimate_raw(&[1.0; 500]), None);
        assert_eq!(estimator.estimate_raw(&[]), None);
    }

    #[test]
    fn test_plausibility_range() {
        let estimator =
            RespirationEstimator::new(15_000, 200.0).with_range(Some((4.0, 40.0)));
        // 1.5 Hz = 90 BPM, outside range
        let fast = sinusoid(1.5, 200.0, 4200);
        assert!(estimator.estimate_raw(&fast).is_some());
        assert_eq!(estimator.estimate(&fast), None);

        let normal = sinusoid(0.3, 200.0, 4200);
        assert!(estimator.estimate(&normal).is_some());
        assert!(estimator.is_plausible(12.0));
        assert!(!estimator.is_plausible(2.0));
    }
}
