//! Welch power spectral density and band power.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

/// One-sided power spectral density estimate.
#[derive(Debug, Clone)]
pub struct Psd {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl Psd {
    pub fn resolution(&self) -> f64 {
        if self.freqs.len() > 1 {
            self.freqs[1] - self.freqs[0]
        } else {
            0.0
        }
    }

    /// Integrated power in `[low, high)` Hz.
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        let df = self.resolution();
        self.freqs
            .iter()
            .zip(&self.power)
            .filter(|(f, _)| **f >= low && **f < high)
            .map(|(_, p)| p * df)
            .sum()
    }
}

fn hann(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    // Periodic window, as used for spectral estimation.
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Welch's method: Hann window, 50 % overlap, per-segment mean removal,
/// density scaling. `nperseg` is clamped to the signal length.
pub fn welch(signal: &[f64], sample_rate: f64, nperseg: usize) -> Psd {
    let n = signal.len();
    let nperseg = nperseg.min(n).max(1);
    let step = (nperseg / 2).max(1);
    let window = hann(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_power);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let n_freqs = nperseg / 2 + 1;
    let mut accum = vec![0.0; n_freqs];
    let mut segments = 0usize;

    let mut start = 0;
    while start + nperseg <= n {
        let segment = &signal[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        let mut buffer: Vec<Complex<f64>> = segment
            .iter()
            .zip(&window)
            .map(|(&x, &w)| Complex::new((x - mean) * w, 0.0))
            .collect();
        fft.process(&mut buffer);
        for (k, acc) in accum.iter_mut().enumerate() {
            let mut p = buffer[k].norm_sqr() * scale;
            // Fold negative frequencies, except DC and Nyquist.
            if k != 0 && !(nperseg % 2 == 0 && k == nperseg / 2) {
                p *= 2.0;
            }
            *acc += p;
        }
        segments += 1;
        start += step;
    }

    if segments > 0 {
        for acc in accum.iter_mut() {
            *acc /= segments as f64;
        }
    }

    let freqs = (0..n_freqs)
        .map(|k| k as f64 * sample_rate / nperseg as f64)
        .collect();
    Psd {
        freqs,
        power: accum,
    }
}
