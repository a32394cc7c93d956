//! Digital Filter Implementations
//!
//! IIR filters built from second-order sections (biquads) for numerical stability.
//! Supports Butterworth lowpass/highpass/bandpass designs and zero-phase
//! (forward-backward) application.

use crate::error::{Result, TmrError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Filter type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Configuration for a filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub filter_type: FilterType,
    /// Cutoff frequency in Hz (lowpass/highpass) or low cutoff (bandpass)
    pub frequency: f64,
    /// High cutoff for bandpass
    pub frequency_high: Option<f64>,
    /// Butterworth order per edge
    pub order: usize,
    /// Sampling rate in Hz
    pub sample_rate: f64,
}

impl FilterConfig {
    pub fn bandpass(low: f64, high: f64, order: usize, sample_rate: f64) -> Self {
        Self {
            filter_type: FilterType::Bandpass,
            frequency: low,
            frequency_high: Some(high),
            order,
            sample_rate,
        }
    }

    pub fn lowpass(cutoff: f64, order: usize, sample_rate: f64) -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            frequency: cutoff,
            frequency_high: None,
            order,
            sample_rate,
        }
    }
}

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain at DC (z = 1).
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Default)]
pub struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    /// Put the section in the state it would reach after a long constant
    /// input `level`. Returns the steady-state output.
    fn settle(&mut self, level: f64) -> f64 {
        let c = self.coeffs;
        let output = c.dc_gain() * level;
        self.state.z1 = output - c.b0 * level;
        self.state.z2 = c.b2 * level - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process an entire signal array in-place
    pub fn process_signal(&mut self, signal: &mut [f64]) {
        for sample in signal.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Process a signal and return a new array (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Initialise every section to its steady state for a constant input.
    pub fn settle(&mut self, level: f64) {
        let mut input = level * self.gain;
        for section in &mut self.sections {
            input = section.settle(input);
        }
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Zero-phase filtering: forward pass, then backward pass over the
    /// odd-extended signal, each pass starting from steady state.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return signal.to_vec();
        }

        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let first = signal[0];
        let last = signal[n - 1];

        let mut ext = Vec::with_capacity(n + 2 * padlen);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.reset();
        self.settle(ext[0]);
        self.process_signal(&mut ext);

        ext.reverse();
        self.reset();
        self.settle(ext[0]);
        self.process_signal(&mut ext);
        ext.reverse();

        self.reset();
        ext[padlen..padlen + n].to_vec()
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design a Butterworth lowpass filter
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_lowpass(wn, order), 1.0)
    }

    /// Design a Butterworth highpass filter
    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_highpass(wn, order), 1.0)
    }

    /// Design a Butterworth bandpass filter as a highpass/lowpass cascade
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        let mut sections = Self::design_highpass(Self::prewarp(low, sample_rate), order);
        sections.extend(Self::design_lowpass(Self::prewarp(high, sample_rate), order));
        SosFilter::new(sections, 1.0)
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    /// Damping term `1/Q` of the k-th conjugate pole pair.
    fn inverse_q(k: usize, order: usize) -> f64 {
        2.0 * (PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64)).sin()
    }

    fn design_lowpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                // Real pole: H(s) = wn / (s + wn)
                let k_coeff = wn / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let iq = Self::inverse_q(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + iq * wn + wn2;
                sections.push(BiquadCoeffs {
                    b0: wn2 / denom,
                    b1: 2.0 * wn2 / denom,
                    b2: wn2 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - iq * wn + wn2) / denom,
                });
            }
        }

        sections
    }

    fn design_highpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                // Real pole: H(s) = s / (s + wn)
                let k_coeff = 1.0 / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: -k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let iq = Self::inverse_q(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + iq * wn + wn2;
                sections.push(BiquadCoeffs {
                    b0: 1.0 / denom,
                    b1: -2.0 / denom,
                    b2: 1.0 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - iq * wn + wn2) / denom,
                });
            }
        }

        sections
    }
}

/// Create a filter from configuration
pub fn create_filter(config: &FilterConfig) -> Result<SosFilter> {
    let nyquist = config.sample_rate / 2.0;
    if config.order == 0 {
        return Err(TmrError::InvalidParameter(
            "Filter order must be at least 1".to_string(),
        ));
    }
    if config.frequency <= 0.0 {
        return Err(TmrError::InvalidParameter(format!(
            "Cutoff frequency ({} Hz) must be positive",
            config.frequency
        )));
    }

    match config.filter_type {
        FilterType::Lowpass | FilterType::Highpass => {
            if config.frequency >= nyquist {
                return Err(TmrError::InvalidParameter(format!(
                    "Cutoff frequency ({} Hz) must be less than Nyquist ({} Hz)",
                    config.frequency, nyquist
                )));
            }
            Ok(if config.filter_type == FilterType::Lowpass {
                ButterworthFilter::lowpass(config.frequency, config.sample_rate, config.order)
            } else {
                ButterworthFilter::highpass(config.frequency, config.sample_rate, config.order)
            })
        }
        FilterType::Bandpass => {
            let high = config.frequency_high.ok_or_else(|| {
                TmrError::InvalidParameter("Bandpass filter requires frequency_high".to_string())
            })?;
            if config.frequency >= high {
                return Err(TmrError::InvalidParameter(
                    "Low cutoff must be less than high cutoff".to_string(),
                ));
            }
            if high >= nyquist {
                return Err(TmrError::InvalidParameter(format!(
                    "High cutoff ({} Hz) must be less than Nyquist ({} Hz)",
                    high, nyquist
                )));
            }
            Ok(ButterworthFilter::bandpass(
                config.frequency,
                high,
                config.sample_rate,
                config.order,
            ))
        }
    }
}

/// Zero-phase Butterworth bandpass of a whole signal.
pub fn bandpass_filtfilt(
    signal: &[f64],
    sample_rate: f64,
    low: f64,
    high: f64,
    order: usize,
) -> Result<Vec<f64>> {
    let mut filter = create_filter(&FilterConfig::bandpass(low, high, order, sample_rate))?;
    Ok(filter.filtfilt(signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = ButterworthFilter::lowpass(10.0, 100.0, 2);
        let mut out = 0.0;
        for _ in 0..500 {
            out = filter.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sections_are_stable() {
        for order in 1..=8 {
            let filter = ButterworthFilter::bandpass(0.1, 40.0, 1000.0, order);
            for s in &filter.sections {
                assert!(s.coeffs.a2.abs() < 1.0, "order {} unstable", order);
            }
        }
    }

    #[test]
    fn test_bandpass_attenuates_out_of_band() {
        let sr = 100.0;
        let mut filter = ButterworthFilter::bandpass(0.5, 5.0, sr, 4);
        let in_band = filter.filtfilt(&sine(2.0, sr, 4000));
        let mut filter = ButterworthFilter::bandpass(0.5, 5.0, sr, 4);
        let out_band = filter.filtfilt(&sine(30.0, sr, 4000));
        assert!(rms(&in_band[500..3500]) > 0.6);
        assert!(rms(&out_band[500..3500]) < 0.01);
    }

    #[test]
    fn test_filtfilt_has_no_phase_shift() {
        let sr = 200.0;
        let x = sine(1.0, sr, 2000);
        let mut filter = ButterworthFilter::lowpass(20.0, sr, 4);
        let y = filter.filtfilt(&x);
        // Peak of the first full cycle stays at the same sample.
        let argmax = |v: &[f64]| {
            v.iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap()
        };
        assert_eq!(argmax(&x[400..600]), argmax(&y[400..600]));
    }

    #[test]
    fn test_create_filter_validation() {
        assert!(create_filter(&FilterConfig::bandpass(5.0, 1.0, 2, 100.0)).is_err());
        assert!(create_filter(&FilterConfig::bandpass(0.1, 60.0, 2, 100.0)).is_err());
        assert!(create_filter(&FilterConfig::lowpass(10.0, 0, 100.0)).is_err());
        assert!(create_filter(&FilterConfig::bandpass(0.1, 40.0, 2, 100.0)).is_ok());
    }
}
