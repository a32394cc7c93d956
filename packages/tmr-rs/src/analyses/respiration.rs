//! Per-trial respiration tables for every subject recording.
//!
//! For each cue trial the task baseline, post-cue and pre-cue windows of the
//! respiration channel are processed. Two tables are written per trial: the
//! mean of every per-sample respiration signal and the RRV measures, both
//! with one column per window.

use crate::config::AnalysisPaths;
use crate::error::{Result, TmrError};
use crate::plot;
use crate::recording::{file_name_of, Recording, RecordingReaderFactory};
use crate::respiration::{self, ProcessedRsp, RRV_MEASURES, SIGNAL_COLUMNS};
use crate::segments::{plan_cue_windows, CueWindowOptions, TrialWindows, WindowLabel};
use crate::table::WideTable;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Characters of a recording file name that identify the subject.
pub const SUBJECT_ID_LEN: usize = 7;

#[derive(Debug, Clone)]
pub struct RespirationOptions {
    /// Process one recording instead of discovering every subject.
    pub recording: Option<PathBuf>,
    pub channel: String,
    pub l_freq: f64,
    pub h_freq: f64,
    pub windows: CueWindowOptions,
    pub continue_on_error: bool,
    pub plot: bool,
}

impl Default for RespirationOptions {
    fn default() -> Self {
        Self {
            recording: None,
            channel: "RESP".to_string(),
            l_freq: 0.1,
            h_freq: 40.0,
            windows: CueWindowOptions::default(),
            continue_on_error: false,
            plot: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectTrials {
    pub subject: String,
    pub recording: PathBuf,
    pub trials: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RespirationSummary {
    pub subjects: Vec<SubjectTrials>,
    pub failed: Vec<String>,
}

/// Supported recordings in `data_dir` whose name starts with `sub`, sorted.
pub fn discover_recordings(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.is_dir() {
        return Err(TmrError::FileNotFound(data_dir.display().to_string()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if !file_name_of(&path).starts_with("sub") || !path.is_file() {
            continue;
        }
        if RecordingReaderFactory::is_supported(&path) {
            files.push(path);
        } else {
            log::warn!("Skipping {}: not a supported recording", path.display());
        }
    }
    files.sort();
    Ok(files)
}

pub fn subject_id(path: &Path) -> String {
    file_name_of(path).chars().take(SUBJECT_ID_LEN).collect()
}

/// Processed windows of one trial in [`WindowLabel::ALL`] order.
fn process_trial(
    recording: &Recording,
    channel: &str,
    trial: &TrialWindows,
) -> Result<Vec<ProcessedRsp>> {
    WindowLabel::ALL
        .iter()
        .map(|&label| {
            let segment = recording.window(channel, trial.window(label))?;
            respiration::process(segment, recording.sfreq)
        })
        .collect()
}

/// Measures as rows, windows as columns.
fn window_table(names: &[&str], columns: &[Vec<f64>]) -> Result<WideTable> {
    let mut table = WideTable::new(
        WindowLabel::ALL
            .iter()
            .map(|l| l.as_str().to_string())
            .collect(),
    );
    for (k, name) in names.iter().enumerate() {
        table.push_row(name, columns.iter().map(|c| c[k]).collect())?;
    }
    Ok(table)
}

pub fn run_subject(
    paths: &AnalysisPaths,
    path: &Path,
    options: &RespirationOptions,
) -> Result<SubjectTrials> {
    let subject = subject_id(path);
    let mut recording = Recording::load(path, Some(&[options.channel.as_str()][..]))?;
    recording.filter(options.l_freq, options.h_freq)?;
    let events = recording.events();
    let trials = plan_cue_windows(&events, recording.sfreq, &options.windows)?;
    log::info!("{}: {} cue trials", subject, trials.len());

    for trial in &trials {
        log::info!("{} trial {} (cue at sample {})", subject, trial.trial, trial.cue_sample);
        let processed = process_trial(&recording, &options.channel, trial)?;

        let means: Vec<Vec<f64>> = processed.iter().map(|p| p.signal_means()).collect();
        let rrv: Vec<Vec<f64>> = processed.iter().map(respiration::rrv).collect();
        window_table(&SIGNAL_COLUMNS, &means)?
            .write_csv(paths.signal_table(&subject, trial.trial), "measure")?;
        window_table(&RRV_MEASURES, &rrv)?
            .write_csv(paths.rrv_table(&subject, trial.trial), "measure")?;

        if options.plot {
            let title = format!("{} trial {}: cue", subject, trial.trial);
            plot::respiration_chart(
                &paths.respiration_graph(&subject, trial.trial),
                &title,
                &processed[1],
            )?;
        }
    }

    Ok(SubjectTrials {
        subject,
        recording: path.to_path_buf(),
        trials: trials.len(),
    })
}

pub fn run(paths: &AnalysisPaths, options: &RespirationOptions) -> Result<RespirationSummary> {
    let recordings = match &options.recording {
        Some(path) => vec![path.clone()],
        None => discover_recordings(&paths.data_dir)?,
    };
    if recordings.is_empty() {
        return Err(TmrError::FileNotFound(format!(
            "no subject recordings in {}",
            paths.data_dir.display()
        )));
    }
    paths.ensure_results_dir()?;

    let mut summary = RespirationSummary::default();
    for path in &recordings {
        match run_subject(paths, path, options) {
            Ok(done) => summary.subjects.push(done),
            Err(e) if options.continue_on_error => {
                log::warn!("{}: {}", path.display(), e);
                summary.failed.push(subject_id(path));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}
