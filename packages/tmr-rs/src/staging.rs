//! Sleep staging.
//!
//! Every 30-second epoch is described by spectral features of one EEG, one
//! EOG and one EMG channel. Features are log-scaled and robustly z-scored
//! over the night, scored per stage with a fixed linear model, turned into
//! probabilities with a softmax and smoothed over the neighbouring epochs.

use crate::error::{Result, TmrError};
use crate::signal::welch;
use crate::stats::descriptive::{mad, median};
use serde::{Deserialize, Serialize};

pub const EPOCH_SECONDS: f64 = 30.0;
/// Welch segment length inside an epoch.
const PSD_SECONDS: f64 = 4.0;
const LOG_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    #[serde(rename = "W")]
    Wake,
    N1,
    N2,
    N3,
    #[serde(rename = "R")]
    Rem,
}

impl SleepStage {
    /// Probability column order.
    pub const ALL: [SleepStage; 5] = [
        SleepStage::N1,
        SleepStage::N2,
        SleepStage::N3,
        SleepStage::Rem,
        SleepStage::Wake,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SleepStage::Wake => "W",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::Rem => "R",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            SleepStage::Wake => 0,
            SleepStage::N1 => 1,
            SleepStage::N2 => 2,
            SleepStage::N3 => 3,
            SleepStage::Rem => 4,
        }
    }
}

/// Hypnogram code for a stage label. Artefact and unscored epochs map to
/// -1 and -2.
pub fn stage_code(label: &str) -> Result<i32> {
    match label {
        "W" | "WAKE" => Ok(0),
        "N1" => Ok(1),
        "N2" => Ok(2),
        "N3" => Ok(3),
        "R" | "REM" => Ok(4),
        "Art" => Ok(-1),
        "Uns" => Ok(-2),
        other => Err(TmrError::Parse(format!("unknown sleep stage '{}'", other))),
    }
}

pub fn hypno_str_to_int<S: AsRef<str>>(labels: &[S]) -> Result<Vec<i32>> {
    labels.iter().map(|l| stage_code(l.as_ref().trim())).collect()
}

/// Expand a per-epoch hypnogram to one value per data sample, padding with
/// the last stage or cropping to `n_samples`.
pub fn upsample_to_data(hypno: &[i32], epoch_seconds: f64, n_samples: usize, sfreq: f64) -> Vec<i32> {
    let repeats = (epoch_seconds * sfreq).round() as usize;
    let mut up: Vec<i32> = hypno
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(repeats))
        .collect();
    if up.len() > n_samples {
        up.truncate(n_samples);
    } else if let Some(&last) = up.last() {
        up.resize(n_samples, last);
    }
    up
}

/// Spectral description of one epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochFeatures {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub sigma: f64,
    pub beta: f64,
    pub eog: f64,
    pub emg: f64,
}

impl EpochFeatures {
    const N: usize = 7;

    fn to_array(self) -> [f64; Self::N] {
        [
            self.delta, self.theta, self.alpha, self.sigma, self.beta, self.eog, self.emg,
        ]
    }

    fn from_array(a: [f64; Self::N]) -> Self {
        Self {
            delta: a[0],
            theta: a[1],
            alpha: a[2],
            sigma: a[3],
            beta: a[4],
            eog: a[5],
            emg: a[6],
        }
    }

    /// Unnormalised stage scores in [`SleepStage::ALL`] order.
    fn scores(&self) -> [f64; 5] {
        let f = self;
        [
            // N1
            f.theta - 0.5 * f.alpha - 0.5 * f.sigma - 0.5 * f.delta,
            // N2
            0.5 + 1.5 * f.sigma + 0.5 * f.delta - 0.5 * f.emg - 0.5 * f.beta,
            // N3
            2.0 * f.delta - 0.5 * f.alpha - 0.5 * f.beta - 0.5 * f.emg - 0.5 * f.sigma,
            // R
            f.eog + 0.5 * f.theta - 1.5 * f.emg - 0.5 * f.delta - 0.5 * f.sigma,
            // W
            f.alpha + f.beta + f.emg + 0.5 * f.eog - f.delta,
        ]
    }
}

fn log_power(x: f64) -> f64 {
    (x.max(0.0) + LOG_FLOOR).log10()
}

/// Raw (log-scaled, not yet normalised) features of one epoch.
pub fn epoch_features(eeg: &[f64], eog: &[f64], emg: &[f64], sfreq: f64) -> EpochFeatures {
    let nperseg = (PSD_SECONDS * sfreq).round() as usize;
    let eeg_psd = welch(eeg, sfreq, nperseg);
    let total = eeg_psd.band_power(0.5, 30.0);
    let rel = |lo: f64, hi: f64| {
        if total > 0.0 {
            eeg_psd.band_power(lo, hi) / total
        } else {
            0.0
        }
    };
    let eog_psd = welch(eog, sfreq, nperseg);
    let emg_psd = welch(emg, sfreq, nperseg);
    let emg_high = (sfreq / 2.0 - 1.0).min(40.0);

    EpochFeatures {
        delta: log_power(rel(0.5, 4.0)),
        theta: log_power(rel(4.0, 8.0)),
        alpha: log_power(rel(8.0, 12.0)),
        sigma: log_power(rel(12.0, 16.0)),
        beta: log_power(rel(16.0, 30.0)),
        eog: log_power(eog_psd.band_power(0.3, 2.0)),
        emg: log_power(emg_psd.band_power(20.0, emg_high)),
    }
}

/// Robust z-score of every feature over all epochs.
fn normalise(features: &[EpochFeatures]) -> Vec<EpochFeatures> {
    let columns: Vec<Vec<f64>> = (0..EpochFeatures::N)
        .map(|k| features.iter().map(|f| f.to_array()[k]).collect())
        .collect();
    let centres: Vec<(f64, f64)> = columns
        .iter()
        .map(|c| {
            let spread = mad(c);
            (median(c), if spread > 0.0 { spread } else { 1.0 })
        })
        .collect();

    features
        .iter()
        .map(|f| {
            let mut a = f.to_array();
            for (v, (m, s)) in a.iter_mut().zip(&centres) {
                *v = (*v - m) / s;
            }
            EpochFeatures::from_array(a)
        })
        .collect()
}

fn softmax(scores: [f64; 5]) -> [f64; 5] {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out = scores.map(|s| (s - max).exp());
    let sum: f64 = out.iter().sum();
    for v in out.iter_mut() {
        *v /= sum;
    }
    out
}

/// Average every epoch with its direct neighbours.
fn smooth(proba: &[[f64; 5]]) -> Vec<[f64; 5]> {
    (0..proba.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(proba.len() - 1);
            let mut acc = [0.0; 5];
            for p in &proba[lo..=hi] {
                for (a, v) in acc.iter_mut().zip(p) {
                    *a += v;
                }
            }
            let sum: f64 = acc.iter().sum();
            acc.map(|a| a / sum)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Hypnogram {
    pub stages: Vec<SleepStage>,
    /// Per-epoch probabilities in [`SleepStage::ALL`] order.
    pub proba: Vec<[f64; 5]>,
}

impl Hypnogram {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn confidence(&self) -> Vec<f64> {
        self.proba
            .iter()
            .map(|p| p.iter().cloned().fold(0.0, f64::max))
            .collect()
    }

    pub fn codes(&self) -> Vec<i32> {
        self.stages.iter().map(|s| s.code()).collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.label()).collect()
    }
}

pub struct SleepStager<'a> {
    eeg: &'a [f64],
    eog: &'a [f64],
    emg: &'a [f64],
    sfreq: f64,
}

impl<'a> SleepStager<'a> {
    pub fn new(eeg: &'a [f64], eog: &'a [f64], emg: &'a [f64], sfreq: f64) -> Result<Self> {
        if eeg.len() != eog.len() || eeg.len() != emg.len() {
            return Err(TmrError::InvalidParameter(
                "EEG, EOG and EMG channels differ in length".to_string(),
            ));
        }
        Ok(Self {
            eeg,
            eog,
            emg,
            sfreq,
        })
    }

    pub fn epoch_len(&self) -> usize {
        (EPOCH_SECONDS * self.sfreq).round() as usize
    }

    /// Number of complete epochs; a trailing partial epoch is ignored.
    pub fn n_epochs(&self) -> usize {
        self.eeg.len() / self.epoch_len().max(1)
    }

    pub fn features(&self) -> Vec<EpochFeatures> {
        let len = self.epoch_len();
        (0..self.n_epochs())
            .map(|e| {
                let r = e * len..(e + 1) * len;
                epoch_features(
                    &self.eeg[r.clone()],
                    &self.eog[r.clone()],
                    &self.emg[r],
                    self.sfreq,
                )
            })
            .collect()
    }

    pub fn predict(&self) -> Result<Hypnogram> {
        let n = self.n_epochs();
        if n == 0 {
            return Err(TmrError::InsufficientData(format!(
                "recording shorter than one {} s epoch",
                EPOCH_SECONDS
            )));
        }
        let features = normalise(&self.features());
        let raw: Vec<[f64; 5]> = features.iter().map(|f| softmax(f.scores())).collect();
        let proba = smooth(&raw);
        let stages = proba
            .iter()
            .map(|p| {
                let mut best = 0;
                for k in 1..p.len() {
                    if p[k] > p[best] {
                        best = k;
                    }
                }
                SleepStage::ALL[best]
            })
            .collect();
        log::info!("Staged {} epochs", n);
        Ok(Hypnogram { stages, proba })
    }
}
