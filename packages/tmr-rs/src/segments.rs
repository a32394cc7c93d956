//! Cue-relative segment planning.
//!
//! For every cue of a recording three equally long windows are compared:
//! a baseline taken from the middle of the breath-counting task, the window
//! right after the cue and the window right before it. The first cue of a
//! recording is never used as a trial: it is dropped from the cue list before
//! any window is planned.

use crate::error::{Result, TmrError};
use crate::events::EventTable;
use crate::types::SampleWindow;
use serde::{Deserialize, Serialize};

/// Raw event code marking the start of the breath-counting task.
pub const DEFAULT_TASK_START_CODE: i32 = 23;
/// Annotation labels of the cue stimuli.
pub const DEFAULT_CUE_LABELS: [&str; 2] = ["227", "228"];
pub const DEFAULT_WINDOW_SECONDS: f64 = 100.0;
/// Delay between task start and the task baseline window.
pub const DEFAULT_TASK_OFFSET_SECONDS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowLabel {
    Bct,
    Cue,
    Uncued,
}

impl WindowLabel {
    pub const ALL: [WindowLabel; 3] = [WindowLabel::Bct, WindowLabel::Cue, WindowLabel::Uncued];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowLabel::Bct => "bct",
            WindowLabel::Cue => "cue",
            WindowLabel::Uncued => "uncued",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueWindowOptions {
    pub task_start_code: i32,
    /// The first label must be present; the others are used when they are.
    pub cue_labels: Vec<String>,
    pub window_seconds: f64,
    pub task_offset_seconds: f64,
}

impl Default for CueWindowOptions {
    fn default() -> Self {
        Self {
            task_start_code: DEFAULT_TASK_START_CODE,
            cue_labels: DEFAULT_CUE_LABELS.iter().map(|s| s.to_string()).collect(),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            task_offset_seconds: DEFAULT_TASK_OFFSET_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialWindows {
    /// Per-recording trial counter, starting at 0.
    pub trial: usize,
    pub cue_sample: i64,
    pub task: SampleWindow,
    pub cue: SampleWindow,
    pub control: SampleWindow,
}

impl TrialWindows {
    pub fn window(&self, label: WindowLabel) -> SampleWindow {
        match label {
            WindowLabel::Bct => self.task,
            WindowLabel::Cue => self.cue,
            WindowLabel::Uncued => self.control,
        }
    }
}

/// Plan the windows for a task onset and the cue onsets in event order.
/// The first cue is discarded.
pub fn plan_windows(
    task_start: i64,
    cues: &[i64],
    sfreq: f64,
    options: &CueWindowOptions,
) -> Vec<TrialWindows> {
    let length = (options.window_seconds * sfreq).round() as i64;
    let task_offset = (options.task_offset_seconds * sfreq).round() as i64;
    let task = SampleWindow::starting_at(task_start + task_offset, length);

    cues.iter()
        .skip(1)
        .enumerate()
        .map(|(trial, &cue)| TrialWindows {
            trial,
            cue_sample: cue,
            task,
            cue: SampleWindow::starting_at(cue, length),
            control: SampleWindow::ending_at(cue, length),
        })
        .collect()
}

/// Resolve task and cue events from an event table and plan the trials.
pub fn plan_cue_windows(
    events: &EventTable,
    sfreq: f64,
    options: &CueWindowOptions,
) -> Result<Vec<TrialWindows>> {
    let task_start = events
        .samples_with_code(options.task_start_code)
        .first()
        .copied()
        .ok_or_else(|| {
            TmrError::MissingEvent(format!(
                "task start code {} not present",
                options.task_start_code
            ))
        })?;

    let (required, optional) = options.cue_labels.split_first().ok_or_else(|| {
        TmrError::InvalidParameter("at least one cue label is required".to_string())
    })?;
    let mut codes = vec![events.code_for(required)?];
    codes.extend(
        optional
            .iter()
            .filter_map(|label| events.code_map.get(label).copied()),
    );

    let cues = events.samples_with_codes(&codes);
    log::debug!(
        "Task start at sample {}, {} cue events (codes {:?})",
        task_start,
        cues.len(),
        codes
    );
    Ok(plan_windows(task_start, &cues, sfreq, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::collections::BTreeMap;

    fn table() -> EventTable {
        let mut code_map = BTreeMap::new();
        code_map.insert("227".to_string(), 5);
        code_map.insert("task".to_string(), 23);
        let event = |sample, code| Event {
            sample,
            duration: 0,
            code,
        };
        EventTable {
            events: vec![
                event(1000, 23),
                event(5000, 5),
                event(9000, 5),
                event(13000, 5),
            ],
            code_map,
        }
    }

    #[test]
    fn test_first_cue_is_dropped() {
        let trials = plan_cue_windows(&table(), 100.0, &CueWindowOptions::default()).unwrap();
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].trial, 0);
        assert_eq!(trials[0].cue_sample, 9000);
        assert_eq!(trials[1].cue_sample, 13000);
    }

    #[test]
    fn test_window_placement() {
        let trials = plan_cue_windows(&table(), 100.0, &CueWindowOptions::default()).unwrap();
        let t = &trials[0];
        assert_eq!(t.task, SampleWindow::new(31000, 41000));
        assert_eq!(t.cue, SampleWindow::new(9000, 19000));
        assert_eq!(t.control, SampleWindow::new(-1000, 9000));
        assert_eq!(t.window(WindowLabel::Uncued).len(), 10000);
    }

    #[test]
    fn test_control_before_recording_start_fails_on_extraction() {
        let trials = plan_cue_windows(&table(), 100.0, &CueWindowOptions::default()).unwrap();
        assert!(trials[0].control.checked_range(100_000).is_err());
        // Past the end of a recording of 15000 samples.
        assert!(trials[1].cue.checked_range(15_000).is_err());
        assert!(trials[1].control.checked_range(15_000).is_ok());
    }

    #[test]
    fn test_missing_codes() {
        let mut events = table();
        events.events.retain(|e| e.code != 23);
        assert!(matches!(
            plan_cue_windows(&events, 100.0, &CueWindowOptions::default()),
            Err(TmrError::MissingEvent(_))
        ));

        let options = CueWindowOptions {
            cue_labels: vec!["228".to_string()],
            ..Default::default()
        };
        assert!(plan_cue_windows(&table(), 100.0, &options).is_err());
    }

    #[test]
    fn test_second_cue_label_merges_in_event_order() {
        let mut events = table();
        events.code_map.insert("228".to_string(), 6);
        events.events.insert(
            2,
            Event {
                sample: 7000,
                duration: 0,
                code: 6,
            },
        );
        let trials = plan_cue_windows(&events, 100.0, &CueWindowOptions::default()).unwrap();
        let cues: Vec<i64> = trials.iter().map(|t| t.cue_sample).collect();
        assert_eq!(cues, vec![7000, 9000, 13000]);
    }
}
