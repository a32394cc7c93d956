//! Rapid eye movement detection on the left and right EOG channels.
//!
//! Eye movements deflect LOC and ROC in opposite directions, so the negative
//! product of the band-passed channels peaks during a movement. Peaks of that
//! product are kept when their amplitude, prominence and width fall inside
//! physiological ranges and, if a hypnogram is given, when they occur in one
//! of the included stages.

use crate::error::{Result, TmrError};
use crate::signal::{bandpass_filtfilt, find_peaks, PeakOptions};
use serde::Serialize;
use std::path::Path;

const REM_FILTER_ORDER: usize = 2;

#[derive(Debug, Clone)]
pub struct RemOptions {
    /// Hypnogram codes in which detection is allowed.
    pub include: Vec<i32>,
    /// Band-pass applied to both channels before the product, in Hz.
    pub freq_rem: (f64, f64),
    /// Single-channel amplitude range in µV.
    pub amplitude: (f64, f64),
    /// Accepted movement duration in seconds, `[min, max)`.
    pub duration: (f64, f64),
}

impl Default for RemOptions {
    fn default() -> Self {
        Self {
            include: vec![4],
            freq_rem: (0.5, 5.0),
            amplitude: (50.0, 325.0),
            duration: (0.3, 1.2),
        }
    }
}

/// One detected eye movement. Times are in seconds from the recording start.
#[derive(Debug, Clone, Serialize)]
pub struct RemEvent {
    #[serde(rename = "Start")]
    pub start: f64,
    #[serde(rename = "Peak")]
    pub peak: f64,
    #[serde(rename = "End")]
    pub end: f64,
    #[serde(rename = "Duration")]
    pub duration: f64,
    #[serde(rename = "LOCAbsValPeak")]
    pub loc_abs_val_peak: f64,
    #[serde(rename = "ROCAbsValPeak")]
    pub roc_abs_val_peak: f64,
    #[serde(rename = "LOCAbsRiseSlope")]
    pub loc_abs_rise_slope: f64,
    #[serde(rename = "ROCAbsRiseSlope")]
    pub roc_abs_rise_slope: f64,
    #[serde(rename = "LOCAbsFallSlope")]
    pub loc_abs_fall_slope: f64,
    #[serde(rename = "ROCAbsFallSlope")]
    pub roc_abs_fall_slope: f64,
    #[serde(rename = "Stage")]
    pub stage: Option<i32>,
    #[serde(skip)]
    pub start_sample: usize,
    #[serde(skip)]
    pub end_sample: usize,
}

#[derive(Debug, Clone)]
pub struct RemResults {
    pub events: Vec<RemEvent>,
    pub sfreq: f64,
}

impl RemResults {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Per-sample flag, true from each event's start to its end inclusive.
    pub fn mask(&self, n_samples: usize) -> Vec<bool> {
        let mut mask = vec![false; n_samples];
        for ev in &self.events {
            let end = ev.end_sample.min(n_samples.saturating_sub(1));
            for m in mask.iter_mut().take(end + 1).skip(ev.start_sample) {
                *m = true;
            }
        }
        mask
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for ev in &self.events {
            writer.serialize(ev)?;
        }
        writer.flush()?;
        log::info!("Wrote {} REM events to {}", self.len(), path.display());
        Ok(())
    }
}

/// Detect rapid eye movements. Returns `None` when nothing is found.
pub fn rem_detect(
    loc: &[f64],
    roc: &[f64],
    sfreq: f64,
    hypno: Option<&[i32]>,
    options: &RemOptions,
) -> Result<Option<RemResults>> {
    if loc.len() != roc.len() {
        return Err(TmrError::InvalidParameter(format!(
            "LOC and ROC differ in length ({} vs {})",
            loc.len(),
            roc.len()
        )));
    }
    if let Some(h) = hypno {
        if h.len() != loc.len() {
            return Err(TmrError::InvalidParameter(format!(
                "hypnogram has {} samples, EOG has {}",
                h.len(),
                loc.len()
            )));
        }
        if !h.iter().any(|s| options.include.contains(s)) {
            log::warn!("None of the included stages are present in the hypnogram");
            return Ok(None);
        }
    }

    let (lo, hi) = options.freq_rem;
    let loc_f = bandpass_filtfilt(loc, sfreq, lo, hi, REM_FILTER_ORDER)?;
    let roc_f = bandpass_filtfilt(roc, sfreq, lo, hi, REM_FILTER_ORDER)?;
    let negp: Vec<f64> = loc_f.iter().zip(&roc_f).map(|(l, r)| -l * r).collect();

    let (amp_min, amp_max) = options.amplitude;
    let peaks = find_peaks(
        &negp,
        &PeakOptions {
            height: Some((amp_min * amp_min, amp_max * amp_max)),
            distance: Some(options.duration.0 * sfreq),
            prominence: Some(0.8 * amp_min * amp_min),
            wlen: Some(options.duration.1 * sfreq),
        },
    );
    log::debug!("{} candidate eye movements", peaks.len());

    let mut events = Vec::new();
    for i in 0..peaks.len() {
        let p = peaks.indices[i];
        if let Some(h) = hypno {
            if !options.include.contains(&h[p]) {
                continue;
            }
        }
        let (left, right) = (peaks.left_bases[i], peaks.right_bases[i]);
        let duration = (right - left) as f64 / sfreq;
        if duration < options.duration.0 || duration >= options.duration.1 {
            continue;
        }
        let rise = (p - left).max(1) as f64 / sfreq;
        let fall = (right - p).max(1) as f64 / sfreq;
        events.push(RemEvent {
            start: left as f64 / sfreq,
            peak: p as f64 / sfreq,
            end: right as f64 / sfreq,
            duration,
            loc_abs_val_peak: loc[p].abs(),
            roc_abs_val_peak: roc[p].abs(),
            loc_abs_rise_slope: (loc[p] - loc[left]).abs() / rise,
            roc_abs_rise_slope: (roc[p] - roc[left]).abs() / rise,
            loc_abs_fall_slope: (loc[right] - loc[p]).abs() / fall,
            roc_abs_fall_slope: (roc[right] - roc[p]).abs() / fall,
            stage: hypno.map(|h| h[p]),
            start_sample: left,
            end_sample: right,
        });
    }

    if events.is_empty() {
        return Ok(None);
    }
    log::info!("Detected {} rapid eye movements", events.len());
    Ok(Some(RemResults { events, sfreq }))
}
