//! Respiration signal processing and respiration-rate variability (RRV).
//!
//! A respiration trace is cleaned with a zero-phase band-pass, breaths are
//! delimited by troughs (start of inspiration) and peaks (start of
//! expiration) found between zero crossings, and per-sample amplitude, rate
//! and phase signals are derived from them. RRV measures are computed from
//! the breath-to-breath intervals and from the instantaneous breathing period.

use crate::error::{Result, TmrError};
use crate::signal::{bandpass_filtfilt, welch};
use crate::stats::descriptive::{diff, mad, mean, median, nanmean, std_dev};

pub const CLEAN_LOW_HZ: f64 = 0.05;
pub const CLEAN_HIGH_HZ: f64 = 3.0;
pub const CLEAN_ORDER: usize = 2;
/// Extrema closer than this fraction of the median extremum-to-extremum
/// amplitude are treated as noise.
pub const AMPLITUDE_MIN: f64 = 0.3;

/// Welch segment length for the period spectrum.
pub const PSD_WINDOW_SECONDS: f64 = 50.0;
pub const VLF_BAND: (f64, f64) = (0.0, 0.04);
pub const LF_BAND: (f64, f64) = (0.04, 0.15);
pub const HF_BAND: (f64, f64) = (0.15, 0.4);

pub const SIGNAL_COLUMNS: [&str; 8] = [
    "RSP_Raw",
    "RSP_Clean",
    "RSP_Amplitude",
    "RSP_Rate",
    "RSP_Phase",
    "RSP_Phase_Completion",
    "RSP_Peaks",
    "RSP_Troughs",
];

pub const RRV_MEASURES: [&str; 20] = [
    "RRV_RMSSD",
    "RRV_MeanBB",
    "RRV_SDBB",
    "RRV_SDSD",
    "RRV_CVBB",
    "RRV_CVSD",
    "RRV_MedianBB",
    "RRV_MadBB",
    "RRV_MCVBB",
    "RRV_VLF",
    "RRV_LF",
    "RRV_HF",
    "RRV_LFHF",
    "RRV_LFn",
    "RRV_HFn",
    "RRV_SD1",
    "RRV_SD2",
    "RRV_SD2SD1",
    "RRV_ApEn",
    "RRV_SampEn",
];

/// Per-sample respiration signals of one segment.
#[derive(Debug, Clone)]
pub struct ProcessedRsp {
    pub sampling_rate: f64,
    pub raw: Vec<f64>,
    pub clean: Vec<f64>,
    pub amplitude: Vec<f64>,
    /// Breaths per minute.
    pub rate: Vec<f64>,
    /// 1 during inspiration, 0 during expiration.
    pub phase: Vec<f64>,
    pub phase_completion: Vec<f64>,
    pub peaks: Vec<usize>,
    pub troughs: Vec<usize>,
}

impl ProcessedRsp {
    fn indicator(&self, indices: &[usize]) -> Vec<f64> {
        let mut v = vec![0.0; self.raw.len()];
        for &i in indices {
            v[i] = 1.0;
        }
        v
    }

    /// Mean of every signal column, NaN samples skipped, in [`SIGNAL_COLUMNS`] order.
    pub fn signal_means(&self) -> Vec<f64> {
        vec![
            nanmean(&self.raw),
            nanmean(&self.clean),
            nanmean(&self.amplitude),
            nanmean(&self.rate),
            nanmean(&self.phase),
            nanmean(&self.phase_completion),
            nanmean(&self.indicator(&self.peaks)),
            nanmean(&self.indicator(&self.troughs)),
        ]
    }

    /// Breath-to-breath intervals (trough to trough) in milliseconds.
    pub fn breath_intervals_ms(&self) -> Vec<f64> {
        self.troughs
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 / self.sampling_rate * 1000.0)
            .collect()
    }
}

pub fn clean(signal: &[f64], sampling_rate: f64) -> Result<Vec<f64>> {
    bandpass_filtfilt(signal, sampling_rate, CLEAN_LOW_HZ, CLEAN_HIGH_HZ, CLEAN_ORDER)
}

fn argmax(x: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in x.iter().enumerate() {
        if *v > x[best] {
            best = i;
        }
    }
    best
}

fn argmin(x: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in x.iter().enumerate() {
        if *v < x[best] {
            best = i;
        }
    }
    best
}

/// Extrema between consecutive zero crossings: a maximum between a rising
/// and the next falling crossing, a minimum between a falling and the next
/// rising crossing.
pub fn find_extrema(clean: &[f64]) -> Vec<usize> {
    let mut crossings: Vec<(usize, bool)> = Vec::new();
    for i in 0..clean.len().saturating_sub(1) {
        if clean[i] < 0.0 && clean[i + 1] > 0.0 {
            crossings.push((i, true));
        } else if clean[i] > 0.0 && clean[i + 1] < 0.0 {
            crossings.push((i, false));
        }
    }

    crossings
        .windows(2)
        .map(|w| {
            let (beg, rising) = w[0];
            let end = w[1].0;
            let segment = &clean[beg..end];
            if rising {
                beg + argmax(segment)
            } else {
                beg + argmin(segment)
            }
        })
        .collect()
}

/// Drop low-amplitude extrema and restore strict peak/trough alternation.
pub fn remove_outlier_extrema(clean: &[f64], extrema: &[usize], amplitude_min: f64) -> Vec<usize> {
    if extrema.len() < 3 {
        return extrema.to_vec();
    }
    let values: Vec<f64> = extrema.iter().map(|&i| clean[i]).collect();
    let vertical: Vec<f64> = diff(&values).iter().map(|d| d.abs()).collect();
    let threshold = median(&vertical) * amplitude_min;
    let kept: Vec<usize> = vertical
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > threshold)
        .map(|(i, _)| extrema[i])
        .collect();
    if kept.len() < 3 {
        return kept;
    }

    let amps: Vec<f64> = kept.iter().map(|&i| clean[i]).collect();
    let signs: Vec<f64> = diff(&amps).iter().map(|d| sign(*d)).collect();
    let broken: Vec<usize> = signs
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] + w[1] != 0.0)
        .map(|(i, _)| i + 1)
        .collect();
    kept.into_iter()
        .enumerate()
        .filter(|(i, _)| !broken.contains(i))
        .map(|(_, e)| e)
        .collect()
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Split alternating extrema into `(peaks, troughs)`, starting with a trough
/// and ending with a peak.
pub fn split_peaks_troughs(clean: &[f64], extrema: &[usize]) -> (Vec<usize>, Vec<usize>) {
    if extrema.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let start = if clean[extrema[0]] <= clean[extrema[1]] { 0 } else { 1 };
    let ordered = &extrema[start..];
    let pairs = ordered.len() / 2;
    let troughs = (0..pairs).map(|k| ordered[2 * k]).collect();
    let peaks = (0..pairs).map(|k| ordered[2 * k + 1]).collect();
    (peaks, troughs)
}

/// Linear interpolation of `(x, y)` onto `0..n`, constant beyond the ends.
fn interpolate(x: &[usize], y: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; n];
    if x.is_empty() {
        return out;
    }
    let mut k = 0;
    for (i, v) in out.iter_mut().enumerate() {
        if i <= x[0] {
            *v = y[0];
        } else if i >= x[x.len() - 1] {
            *v = y[y.len() - 1];
        } else {
            while x[k + 1] < i {
                k += 1;
            }
            let t = (i - x[k]) as f64 / (x[k + 1] - x[k]) as f64;
            *v = y[k] + t * (y[k + 1] - y[k]);
        }
    }
    out
}

fn instantaneous_rate(troughs: &[usize], sampling_rate: f64, n: usize) -> Vec<f64> {
    let mut periods: Vec<f64> = troughs
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / sampling_rate)
        .collect();
    if periods.is_empty() {
        return vec![f64::NAN; n];
    }
    // The first trough has no predecessor; use the mean of the others.
    periods.insert(0, mean(&periods));
    let rate: Vec<f64> = periods.iter().map(|p| 60.0 / p).collect();
    interpolate(troughs, &rate, n)
}

fn phase_signals(peaks: &[usize], troughs: &[usize], n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut marks: Vec<(usize, f64)> = troughs
        .iter()
        .map(|&t| (t, 1.0))
        .chain(peaks.iter().map(|&p| (p, 0.0)))
        .collect();
    marks.sort_by_key(|m| m.0);

    let mut phase = vec![f64::NAN; n];
    let mut completion = vec![f64::NAN; n];
    for w in marks.windows(2) {
        let ((a, value), (b, _)) = (w[0], w[1]);
        for i in a..b {
            phase[i] = value;
            completion[i] = (i - a) as f64 / (b - a) as f64;
        }
    }
    if let Some(&(last, value)) = marks.last() {
        phase[last] = value;
        completion[last] = 0.0;
    }
    (phase, completion)
}

/// Clean a respiration segment and derive its per-sample signals.
pub fn process(signal: &[f64], sampling_rate: f64) -> Result<ProcessedRsp> {
    let clean = clean(signal, sampling_rate)?;
    let extrema = find_extrema(&clean);
    let extrema = remove_outlier_extrema(&clean, &extrema, AMPLITUDE_MIN);
    let (peaks, troughs) = split_peaks_troughs(&clean, &extrema);
    if troughs.len() < 2 {
        return Err(TmrError::InsufficientData(format!(
            "only {} breath(s) detected in {:.1} s of respiration signal",
            troughs.len(),
            signal.len() as f64 / sampling_rate
        )));
    }

    let n = signal.len();
    let amplitudes: Vec<f64> = peaks
        .iter()
        .zip(&troughs)
        .map(|(&p, &t)| clean[p] - clean[t])
        .collect();
    let amplitude = interpolate(&peaks, &amplitudes, n);
    let rate = instantaneous_rate(&troughs, sampling_rate, n);
    let (phase, phase_completion) = phase_signals(&peaks, &troughs, n);

    log::debug!(
        "Respiration segment: {} breaths, mean rate {:.2}/min",
        troughs.len(),
        nanmean(&rate)
    );

    Ok(ProcessedRsp {
        sampling_rate,
        raw: signal.to_vec(),
        clean,
        amplitude,
        rate,
        phase,
        phase_completion,
        peaks,
        troughs,
    })
}

/// Chebyshev-distance match counts of every embedding vector (self included).
fn embedding_counts(x: &[f64], dimension: usize, tolerance: f64, n_vectors: usize) -> Vec<f64> {
    (0..n_vectors)
        .map(|i| {
            (0..n_vectors)
                .filter(|&j| (0..dimension).all(|k| (x[i + k] - x[j + k]).abs() <= tolerance))
                .count() as f64
        })
        .collect()
}

pub fn approximate_entropy(x: &[f64], dimension: usize, tolerance: f64) -> f64 {
    if x.len() <= dimension + 1 {
        return f64::NAN;
    }
    let phi = |m: usize| {
        let n = x.len() - m + 1;
        let counts = embedding_counts(x, m, tolerance, n);
        mean(&counts.iter().map(|c| (c / n as f64).ln()).collect::<Vec<_>>())
    };
    phi(dimension) - phi(dimension + 1)
}

pub fn sample_entropy(x: &[f64], dimension: usize, tolerance: f64) -> f64 {
    if x.len() <= dimension + 1 {
        return f64::NAN;
    }
    // Both dimensions use the same number of vectors.
    let n = x.len() - dimension;
    let matches = |m: usize| {
        let counts = embedding_counts(x, m, tolerance, n);
        mean(&counts.iter().map(|c| (c - 1.0) / (n as f64 - 1.0)).collect::<Vec<_>>())
    };
    -(matches(dimension + 1) / matches(dimension)).ln()
}

fn nan_if_zero(v: f64) -> f64 {
    if v == 0.0 {
        f64::NAN
    } else {
        v
    }
}

/// RRV measures in [`RRV_MEASURES`] order.
pub fn rrv(processed: &ProcessedRsp) -> Vec<f64> {
    let bbi = processed.breath_intervals_ms();
    let diff_bbi = diff(&bbi);

    let rmssd = if diff_bbi.is_empty() {
        f64::NAN
    } else {
        mean(&diff_bbi.iter().map(|d| d * d).collect::<Vec<_>>()).sqrt()
    };
    let mean_bb = mean(&bbi);
    let sdbb = std_dev(&bbi);
    let sdsd = std_dev(&diff_bbi);
    let median_bb = median(&bbi);
    let mad_bb = mad(&bbi);

    let sf = processed.sampling_rate;
    let period: Vec<f64> = processed.rate.iter().map(|r| 60.0 / r).collect();
    let (vlf, lf, hf) = if period.iter().any(|p| !p.is_finite()) {
        (f64::NAN, f64::NAN, f64::NAN)
    } else {
        let nperseg = (PSD_WINDOW_SECONDS * sf).round() as usize;
        let psd = welch(&period, sf, nperseg);
        (
            nan_if_zero(psd.band_power(VLF_BAND.0, VLF_BAND.1)),
            nan_if_zero(psd.band_power(LF_BAND.0, LF_BAND.1)),
            nan_if_zero(psd.band_power(HF_BAND.0, HF_BAND.1)),
        )
    };
    let total: f64 = [vlf, lf, hf].iter().filter(|v| !v.is_nan()).sum();

    let sd1 = (sdsd.powi(2) * 0.5).sqrt();
    let sd2 = (2.0 * sdbb.powi(2) - 0.5 * sdsd.powi(2)).sqrt();
    let tolerance = 0.2 * sdbb;

    vec![
        rmssd,
        mean_bb,
        sdbb,
        sdsd,
        sdbb / mean_bb,
        rmssd / mean_bb,
        median_bb,
        mad_bb,
        mad_bb / median_bb,
        vlf,
        lf,
        hf,
        lf / hf,
        lf / total,
        hf / total,
        sd1,
        sd2,
        sd2 / sd1,
        approximate_entropy(&bbi, 2, tolerance),
        sample_entropy(&bbi, 2, tolerance),
    ]
}
