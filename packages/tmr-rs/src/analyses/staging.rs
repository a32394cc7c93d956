//! Automatic sleep staging of one subject's night.

use super::recording_path;
use crate::config::AnalysisPaths;
use crate::error::Result;
use crate::plot;
use crate::recording::Recording;
use crate::staging::{hypno_str_to_int, Hypnogram, SleepStage, SleepStager, EPOCH_SECONDS};
use crate::table::{format_float, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StagingOptions {
    pub recording: Option<PathBuf>,
    pub eeg: String,
    pub eog: String,
    pub emg: String,
    /// Rate the recording is resampled to before staging.
    pub sfreq: f64,
    pub l_freq: f64,
    pub h_freq: f64,
    /// Event code drawn as cue markers on the hypnogram.
    pub cue_code: i32,
    pub plot: bool,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            recording: None,
            eeg: "Cz".to_string(),
            eog: "R-HEOG".to_string(),
            emg: "EMG".to_string(),
            sfreq: 100.0,
            l_freq: 0.1,
            h_freq: 40.0,
            cue_code: 22,
            plot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StagingSummary {
    pub subject: String,
    pub epochs: usize,
    pub stage_counts: BTreeMap<String, usize>,
    pub hypnogram_file: PathBuf,
}

/// Write `,Stage,Confidence` with the epoch number as index.
pub fn write_hypnogram<P: AsRef<Path>>(path: P, hypno: &Hypnogram) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["", "Stage", "Confidence"])?;
    for (i, (stage, confidence)) in hypno.stages.iter().zip(hypno.confidence()).enumerate() {
        writer.write_record([i.to_string(), stage.label().to_string(), format_float(confidence)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_probabilities<P: AsRef<Path>>(path: P, hypno: &Hypnogram) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    let mut header = vec!["epoch".to_string()];
    header.extend(SleepStage::ALL.iter().map(|s| s.label().to_string()));
    writer.write_record(&header)?;
    for (i, p) in hypno.proba.iter().enumerate() {
        let mut record = vec![i.to_string()];
        record.extend(p.iter().map(|v| format_float(*v)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Stage codes from the `Stage` column of a hypnogram CSV.
pub fn read_hypnogram<P: AsRef<Path>>(path: P) -> Result<Vec<i32>> {
    let table = Table::read_csv(path)?;
    hypno_str_to_int(&table.column("Stage")?)
}

pub fn run(
    paths: &AnalysisPaths,
    subject: &str,
    options: &StagingOptions,
) -> Result<StagingSummary> {
    let path = recording_path(paths, subject, options.recording.as_deref());
    let picks = [options.eeg.as_str(), options.eog.as_str(), options.emg.as_str()];
    let mut recording = Recording::load(&path, Some(&picks[..]))?;
    recording.resample(options.sfreq)?;
    recording.filter(options.l_freq, options.h_freq)?;

    let stager = SleepStager::new(
        recording.channel(&options.eeg)?,
        recording.channel(&options.eog)?,
        recording.channel(&options.emg)?,
        recording.sfreq,
    )?;
    let hypno = stager.predict()?;

    let mut stage_counts = BTreeMap::new();
    for stage in &hypno.stages {
        *stage_counts.entry(stage.label().to_string()).or_insert(0) += 1;
    }
    log::info!("{}: {} epochs, {:?}", subject, hypno.len(), stage_counts);

    paths.ensure_results_dir()?;
    let hypnogram_file = paths.hypnogram_csv(subject);
    write_hypnogram(&hypnogram_file, &hypno)?;
    write_probabilities(paths.hypnogram_proba_csv(subject), &hypno)?;

    if options.plot {
        let events = recording.events().times_in_hours(recording.sfreq);
        let cues: Vec<f64> = events
            .iter()
            .filter(|(_, code)| *code == options.cue_code)
            .map(|(t, _)| *t)
            .collect();
        if cues.is_empty() {
            log::warn!("No events with code {} to mark on the hypnogram", options.cue_code);
        }
        plot::hypnogram_chart(&paths.hypnogram_graph(subject), &hypno.stages, EPOCH_SECONDS, &cues)?;
        plot::probability_chart(&paths.probability_graph(subject), &hypno.proba, EPOCH_SECONDS)?;
        if events.is_empty() {
            log::warn!("{} has no events; skipping the event figure", subject);
        } else {
            plot::events_chart(&paths.events_graph(subject), &events)?;
        }
    }

    Ok(StagingSummary {
        subject: subject.to_string(),
        epochs: hypno.len(),
        stage_counts,
        hypnogram_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypnogram() -> Hypnogram {
        Hypnogram {
            stages: vec![SleepStage::Wake, SleepStage::N2, SleepStage::Rem],
            proba: vec![
                [0.1, 0.1, 0.0, 0.0, 0.8],
                [0.2, 0.5, 0.1, 0.1, 0.1],
                [0.0, 0.25, 0.0, 0.75, 0.0],
            ],
        }
    }

    #[test]
    fn test_hypnogram_csv_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("hypno.csv");
        write_hypnogram(&path, &hypnogram()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",Stage,Confidence");
        assert_eq!(lines[1], "0,W,0.8");
        assert_eq!(lines[3], "2,R,0.75");
        assert_eq!(read_hypnogram(&path).unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_probability_csv() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("proba.csv");
        write_probabilities(&path, &hypnogram()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("epoch,N1,N2,N3,R,W"));
        assert_eq!(lines.next(), Some("0,0.1,0.1,0.0,0.0,0.8"));
    }

    #[test]
    fn test_missing_recording_is_input_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        let err = run(&paths, "001", &StagingOptions::default()).unwrap_err();
        assert!(err.is_input_error());
    }
}
