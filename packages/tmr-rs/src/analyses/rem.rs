//! Rapid eye movements during REM sleep, with zoomed EOG figures.

use super::recording_path;
use super::staging::read_hypnogram;
use crate::config::AnalysisPaths;
use crate::error::Result;
use crate::plot::{self, Trace};
use crate::recording::Recording;
use crate::rem::{rem_detect, RemOptions};
use crate::staging::{upsample_to_data, EPOCH_SECONDS};
use crate::types::TimeRange;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RemAnalysisOptions {
    pub recording: Option<PathBuf>,
    /// Hypnogram CSV; the subject's staging output when unset.
    pub hypnogram: Option<PathBuf>,
    pub loc: String,
    pub roc: String,
    pub emg: String,
    pub l_freq: f64,
    pub h_freq: f64,
    pub detection: RemOptions,
    /// Stretches of the night drawn as zoomed EOG figures.
    pub windows: Vec<TimeRange>,
    pub plot: bool,
}

impl Default for RemAnalysisOptions {
    fn default() -> Self {
        Self {
            recording: None,
            hypnogram: None,
            loc: "L-VEOG".to_string(),
            roc: "R-HEOG".to_string(),
            emg: "EMG".to_string(),
            l_freq: 0.1,
            h_freq: 40.0,
            detection: RemOptions::default(),
            windows: vec![
                TimeRange::new("wake", 2182.0, 2192.0),
                TimeRange::new("lucid", 6455.0, 6465.0),
                TimeRange::new("rem", 5992.0, 6002.0),
            ],
            plot: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemSummary {
    pub subject: String,
    pub events: usize,
    pub events_file: Option<PathBuf>,
    pub figures: Vec<PathBuf>,
}

pub fn run(paths: &AnalysisPaths, subject: &str, options: &RemAnalysisOptions) -> Result<RemSummary> {
    let path = recording_path(paths, subject, options.recording.as_deref());
    let hypnogram_path = options
        .hypnogram
        .clone()
        .unwrap_or_else(|| paths.hypnogram_csv(subject));

    let picks = [options.loc.as_str(), options.roc.as_str(), options.emg.as_str()];
    let mut recording = Recording::load(&path, Some(&picks[..]))?;
    recording.filter(options.l_freq, options.h_freq)?;
    let n = recording.n_samples();
    let sf = recording.sfreq;

    let hypno = read_hypnogram(&hypnogram_path)?;
    let hypno = upsample_to_data(&hypno, EPOCH_SECONDS, n, sf);
    let loc = recording.channel(&options.loc)?;
    let roc = recording.channel(&options.roc)?;
    let emg = recording.channel(&options.emg)?;

    let mut summary = RemSummary {
        subject: subject.to_string(),
        ..Default::default()
    };
    let rem = match rem_detect(loc, roc, sf, Some(&hypno), &options.detection)? {
        Some(rem) => rem,
        None => {
            log::info!("No REM found. Not making a plot.");
            return Ok(summary);
        }
    };

    paths.ensure_results_dir()?;
    let events_file = paths.rem_events_csv(subject);
    rem.write_csv(&events_file)?;
    summary.events = rem.len();
    summary.events_file = Some(events_file);

    if options.plot {
        let mask = rem.mask(n);
        let times = recording.times();
        for window in &options.windows {
            let range = match window.to_samples(sf).checked_range(n) {
                Ok(range) => range,
                Err(e) => {
                    log::warn!("Skipping window '{}': {}", window.name, e);
                    continue;
                }
            };
            let figure = paths.eog_events_graph(subject, &window.name);
            plot::eog_chart(
                &figure,
                &format!("eye_movements_during_{}", window.name),
                &times[range.clone()],
                &[
                    Trace {
                        name: "LOC",
                        values: &loc[range.clone()],
                        highlight: Some(&mask[range.clone()]),
                    },
                    Trace {
                        name: "ROC",
                        values: &roc[range.clone()],
                        highlight: Some(&mask[range.clone()]),
                    },
                    Trace {
                        name: "EMG",
                        values: &emg[range],
                        highlight: None,
                    },
                ],
            )?;
            summary.figures.push(figure);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::cnt::tests::write_cnt;

    #[test]
    fn test_default_windows() {
        let names: Vec<String> = RemAnalysisOptions::default()
            .windows
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["wake", "lucid", "rem"]);
    }

    #[test]
    fn test_no_rem_is_success() {
        let tmp = tempfile::TempDir::new().unwrap();
        let data = vec![vec![0i16; 6000]; 3];
        write_cnt(
            &tmp.path().join("sub-001_ses-001_eeg.cnt"),
            &["L-VEOG", "R-HEOG", "EMG"],
            100,
            &data,
            &[],
        );
        std::fs::write(
            tmp.path().join("001hypnogram_data.csv"),
            ",Stage,Confidence\n0,R,0.9\n1,R,0.9\n",
        )
        .unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());

        let summary = run(&paths, "001", &RemAnalysisOptions::default()).unwrap();
        assert_eq!(summary.events, 0);
        assert!(summary.events_file.is_none());
        assert!(!paths.rem_events_csv("001").exists());
    }

    #[test]
    fn test_missing_hypnogram_is_input_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let data = vec![vec![0i16; 3000]; 3];
        write_cnt(
            &tmp.path().join("sub-001_ses-001_eeg.cnt"),
            &["L-VEOG", "R-HEOG", "EMG"],
            100,
            &data,
            &[],
        );
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        let err = run(&paths, "001", &RemAnalysisOptions::default()).unwrap_err();
        assert!(err.is_input_error());
    }
}
