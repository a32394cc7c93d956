//! Sampling-rate conversion.
//!
//! Integer down-sampling factors use a zero-phase anti-alias lowpass followed
//! by decimation, which keeps memory flat for overnight recordings. Any other
//! ratio goes through FFT resampling of the whole signal.

use super::filters::ButterworthFilter;
use crate::error::{Result, TmrError};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const ANTI_ALIAS_ORDER: usize = 8;
const ANTI_ALIAS_FRACTION: f64 = 0.45;

/// Number of output samples when converting `n` samples from `from` Hz to `to` Hz.
pub fn resampled_len(n: usize, from: f64, to: f64) -> usize {
    (n as f64 * to / from).round() as usize
}

pub fn resample(signal: &[f64], from: f64, to: f64) -> Result<Vec<f64>> {
    if from <= 0.0 || to <= 0.0 {
        return Err(TmrError::InvalidParameter(format!(
            "Sampling rates must be positive (from {} Hz to {} Hz)",
            from, to
        )));
    }
    if (from - to).abs() < 1e-9 || signal.is_empty() {
        return Ok(signal.to_vec());
    }

    let ratio = from / to;
    if ratio > 1.0 && (ratio - ratio.round()).abs() < 1e-9 {
        Ok(decimate(signal, ratio.round() as usize, to))
    } else {
        Ok(fft_resample(signal, resampled_len(signal.len(), from, to)))
    }
}

fn decimate(signal: &[f64], factor: usize, to: f64) -> Vec<f64> {
    let from = to * factor as f64;
    let mut lowpass = ButterworthFilter::lowpass(ANTI_ALIAS_FRACTION * to, from, ANTI_ALIAS_ORDER);
    let smoothed = lowpass.filtfilt(signal);
    smoothed.into_iter().step_by(factor).collect()
}

/// Fourier-domain resampling (periodic signal assumption).
pub fn fft_resample(signal: &[f64], n_out: usize) -> Vec<f64> {
    let n = signal.len();
    if n_out == n || n == 0 {
        return signal.to_vec();
    }
    if n_out == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum: Vec<Complex<f64>> =
        signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let m = n.min(n_out);
    let mut out = vec![Complex::new(0.0, 0.0); n_out];
    out[0] = spectrum[0];
    for k in 1..=(m - 1) / 2 {
        out[k] = spectrum[k];
        out[n_out - k] = spectrum[n - k];
    }
    if m % 2 == 0 {
        let k = m / 2;
        if n_out > n {
            out[k] = spectrum[k] * 0.5;
            out[n_out - k] = spectrum[k] * 0.5;
        } else {
            out[k] = spectrum[k] + spectrum[n - k];
        }
    }

    planner.plan_fft_inverse(n_out).process(&mut out);
    let scale = 1.0 / n as f64;
    out.into_iter().map(|c| c.re * scale).collect()
}
