//! Breath-counting task accuracy before and after sleep.
//!
//! A counting cycle is scored by the accuracy of its last button press.
//! Cycle scores are averaged per participant and acquisition, and the
//! post-sleep accuracy is compared with the pre-sleep accuracy.

use crate::config::AnalysisPaths;
use crate::error::{Result, TmrError};
use crate::plot;
use crate::stats::{ttest_paired, wilcoxon, TTestResult, WilcoxonResult};
use crate::table::{write_ttest, write_wilcoxon, Table, WideTable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BctAccuracyOptions {
    pub input: Option<PathBuf>,
    pub participant_column: String,
    pub acquisition_column: String,
    pub cycle_column: String,
    pub accuracy_column: String,
    /// Accuracy value counted as a correct cycle.
    pub correct_value: String,
    pub pre_label: String,
    pub post_label: String,
    pub plot: bool,
}

impl Default for BctAccuracyOptions {
    fn default() -> Self {
        Self {
            input: None,
            participant_column: "participant_id".to_string(),
            acquisition_column: "acquisition_id".to_string(),
            cycle_column: "cycle".to_string(),
            accuracy_column: "accuracy".to_string(),
            correct_value: "correct".to_string(),
            pre_label: "acq-pre".to_string(),
            post_label: "acq-post".to_string(),
            plot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BctAccuracySummary {
    pub participants: usize,
    pub accuracy: WideTable,
    pub ttest: TTestResult,
    pub wilcoxon: WilcoxonResult,
}

/// Share of correct cycles per participant (rows) and acquisition (columns
/// `[pre, post]`). Participants missing either acquisition are dropped.
pub fn cycle_accuracy(table: &Table, options: &BctAccuracyOptions) -> Result<WideTable> {
    let participants = table.column(&options.participant_column)?;
    let acquisitions = table.column(&options.acquisition_column)?;
    let cycles = table.column(&options.cycle_column)?;
    let accuracy = table.column(&options.accuracy_column)?;

    // Last non-empty accuracy per cycle, in file order.
    let mut last: BTreeMap<(&str, &str, &str), bool> = BTreeMap::new();
    for i in 0..table.len() {
        let key = (participants[i], acquisitions[i], cycles[i]);
        let entry = last.entry(key).or_insert(false);
        if !accuracy[i].is_empty() {
            *entry = accuracy[i] == options.correct_value;
        }
    }

    let mut scores: BTreeMap<&str, BTreeMap<&str, (f64, usize)>> = BTreeMap::new();
    for ((participant, acquisition, _), correct) in last {
        let cell = scores
            .entry(participant)
            .or_default()
            .entry(acquisition)
            .or_insert((0.0, 0));
        cell.0 += if correct { 1.0 } else { 0.0 };
        cell.1 += 1;
    }

    let mut wide = WideTable::new(vec![options.pre_label.clone(), options.post_label.clone()]);
    for (participant, by_acq) in &scores {
        let mean_of = |label: &str| by_acq.get(label).map(|(s, n)| s / *n as f64);
        match (mean_of(&options.pre_label), mean_of(&options.post_label)) {
            (Some(pre), Some(post)) => wide.push_row(participant, vec![pre, post])?,
            _ => log::warn!(
                "Participant {} lacks one of {} / {}; skipped",
                participant,
                options.pre_label,
                options.post_label
            ),
        }
    }
    Ok(wide)
}

pub fn run(paths: &AnalysisPaths, options: &BctAccuracyOptions) -> Result<BctAccuracySummary> {
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| paths.bct_accuracy_table());
    let table = Table::read_csv(&input)?;
    log::info!("Read {} button presses from {}", table.len(), input.display());

    let accuracy = cycle_accuracy(&table, options)?;
    if accuracy.len() < 2 {
        return Err(TmrError::InsufficientData(format!(
            "{} participant(s) with both {} and {}",
            accuracy.len(),
            options.pre_label,
            options.post_label
        )));
    }
    let pre = accuracy.column(&options.pre_label)?;
    let post = accuracy.column(&options.post_label)?;

    let ttest = ttest_paired(&post, &pre)?;
    let wilcoxon = wilcoxon(&post, &pre)?;
    log::info!(
        "{} participants: T = {:.4}, p = {:.4}; W = {}, p = {:.4}",
        accuracy.len(),
        ttest.t,
        ttest.p_value,
        wilcoxon.w,
        wilcoxon.p_value
    );

    paths.ensure_results_dir()?;
    write_ttest(paths.bct_ttest_results(), &ttest)?;
    write_wilcoxon(paths.bct_wilcoxon_results(), &wilcoxon)?;

    if options.plot {
        plot::mean_bar_chart(
            &paths.bct_graph(),
            "TMR Results",
            "Acquisition",
            "Accuracy",
            &[
                (options.pre_label.clone(), pre),
                (options.post_label.clone(), post),
            ],
        )?;
    }

    Ok(BctAccuracySummary {
        participants: accuracy.len(),
        accuracy,
        ttest,
        wilcoxon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presses() -> Table {
        let rows = [
            // p1 pre: cycle 1 ends correct, cycle 2 ends wrong -> 0.5
            ["p1", "acq-pre", "1", "undershoot"],
            ["p1", "acq-pre", "1", "correct"],
            ["p1", "acq-pre", "2", "correct"],
            ["p1", "acq-pre", "2", "overshoot"],
            // p1 post: 1.0
            ["p1", "acq-post", "1", "correct"],
            // p2 pre: 0.0, post: 1.0, with an empty trailing press
            ["p2", "acq-pre", "1", "overshoot"],
            ["p2", "acq-post", "1", "correct"],
            ["p2", "acq-post", "1", ""],
            // p3 has no post acquisition
            ["p3", "acq-pre", "1", "correct"],
        ];
        Table::from_records(
            "presses",
            ["participant_id", "acquisition_id", "cycle", "accuracy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_cycle_accuracy() {
        let wide = cycle_accuracy(&presses(), &BctAccuracyOptions::default()).unwrap();
        assert_eq!(wide.index, vec!["p1", "p2"]);
        assert_eq!(wide.values, vec![vec![0.5, 1.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_too_few_participants() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("task-bct_agg.csv"),
            "participant_id,acquisition_id,cycle,accuracy\n\
             p1,acq-pre,1,correct\np1,acq-post,1,correct\n",
        )
        .unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        assert!(matches!(
            run(&paths, &BctAccuracyOptions::default()),
            Err(TmrError::InsufficientData(_))
        ));
    }
}
