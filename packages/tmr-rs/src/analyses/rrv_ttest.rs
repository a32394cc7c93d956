//! Group-level comparison of respiration variability after cues and before them.
//!
//! Reads every per-trial RRV table written by the respiration analysis,
//! averages one measure per subject and condition, and runs a paired t-test
//! of the cued against the uncued windows.

use crate::config::AnalysisPaths;
use crate::error::{Result, TmrError};
use crate::plot;
use crate::recording::file_name_of;
use crate::stats::{nanmean, ttest_paired, TTestResult};
use crate::table::{write_ttest, Table, WideTable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RrvTTestOptions {
    /// Measure row to compare; the first row of each table when unset.
    pub measure: Option<String>,
    pub cue_column: String,
    pub control_column: String,
    pub plot: bool,
}

impl Default for RrvTTestOptions {
    fn default() -> Self {
        Self {
            measure: None,
            cue_column: "cue".to_string(),
            control_column: "uncued".to_string(),
            plot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RrvTTestSummary {
    pub measure: String,
    pub tables: usize,
    pub subjects: WideTable,
    pub ttest: TTestResult,
}

/// Subject number embedded in a table name such as `rrv_table_sub-007_2.csv`.
pub fn subject_number(file_name: &str) -> Result<u32> {
    file_name
        .split('-')
        .nth(1)
        .and_then(|rest| rest.split('_').next())
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| TmrError::Parse(format!("subject number from file name '{}'", file_name)))
}

/// `rrv_table*.csv` files in the results directory, sorted by name.
pub fn discover_tables(results_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = results_dir.join("rrv_table*.csv");
    let pattern = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| TmrError::InvalidParameter(format!("bad search pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    Ok(files)
}

/// Row of `table` holding `measure`, or the first row.
fn measure_row<'t>(table: &'t Table, measure: Option<&str>) -> Result<(String, &'t [String])> {
    let label_col = 0;
    let mut rows = table.rows();
    let row = match measure {
        Some(name) => rows.find(|r| r.get(label_col).map(String::as_str) == Some(name)),
        None => rows.next(),
    }
    .ok_or_else(|| {
        TmrError::InvalidParameter(format!(
            "measure '{}' not found in {}",
            measure.unwrap_or("<first row>"),
            table.source()
        ))
    })?;
    let name = row.get(label_col).cloned().unwrap_or_default();
    Ok((name, row))
}

pub fn run(paths: &AnalysisPaths, options: &RrvTTestOptions) -> Result<RrvTTestSummary> {
    let files = discover_tables(&paths.results_dir)?;
    if files.is_empty() {
        return Err(TmrError::FileNotFound(format!(
            "no rrv_table*.csv files in {}",
            paths.results_dir.display()
        )));
    }
    log::info!("Found {} RRV tables", files.len());

    let mut measure_name: Option<String> = None;
    let mut per_subject: BTreeMap<u32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for file in &files {
        let table = Table::read_csv(file)?;
        let cue_idx = table.column_index(&options.cue_column)?;
        let control_idx = table.column_index(&options.control_column)?;
        let (name, row) = measure_row(&table, options.measure.as_deref())?;
        let parse = |idx: usize, column: &str| {
            crate::table::parse_float(
                row.get(idx).map(String::as_str).unwrap_or(""),
                column,
                table.source(),
            )
        };
        let cue = parse(cue_idx, &options.cue_column)?;
        let control = parse(control_idx, &options.control_column)?;

        let subject = subject_number(&file_name_of(file))?;
        let entry = per_subject.entry(subject).or_default();
        entry.0.push(cue);
        entry.1.push(control);
        if measure_name.is_none() {
            measure_name = Some(name);
        }
    }
    let measure = measure_name.unwrap_or_default();

    let mut subjects = WideTable::new(vec![
        options.cue_column.clone(),
        options.control_column.clone(),
    ]);
    for (subject, (cue, control)) in &per_subject {
        subjects.push_row(&subject.to_string(), vec![nanmean(cue), nanmean(control)])?;
    }
    let cue = subjects.column(&options.cue_column)?;
    let control = subjects.column(&options.control_column)?;
    let ttest = ttest_paired(&cue, &control)?;
    log::info!(
        "{} over {} subjects: T = {:.4}, p = {:.4}",
        measure,
        subjects.len(),
        ttest.t,
        ttest.p_value
    );

    write_ttest(paths.rrv_ttest_results(), &ttest)?;

    if options.plot {
        let long = subjects.melt(&[
            options.cue_column.as_str(),
            options.control_column.as_str(),
        ])?;
        let groups: Vec<(String, Vec<f64>)> = [&options.cue_column, &options.control_column]
            .iter()
            .map(|condition| {
                let values = long
                    .iter()
                    .filter(|r| &r.condition == *condition)
                    .map(|r| r.value)
                    .collect();
                (condition.to_string(), values)
            })
            .collect();
        plot::mean_bar_chart(&paths.rrv_ttest_graph(), "Results", "Condition", &measure, &groups)?;
    }

    Ok(RrvTTestSummary {
        measure,
        tables: files.len(),
        subjects,
        ttest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_rrv(dir: &Path, name: &str, cue: f64, uncued: f64) {
        fs::write(
            dir.join(name),
            format!(
                "measure,bct,cue,uncued\nRRV_RMSSD,1.0,{},{}\nRRV_MeanBB,4000.0,4100.0,3900.0\n",
                cue, uncued
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_subject_number() {
        assert_eq!(subject_number("rrv_table_sub-007_2.csv").unwrap(), 7);
        assert_eq!(subject_number("rrv_table_sub-112_0.csv").unwrap(), 112);
        assert!(subject_number("rrv_table.csv").is_err());
    }

    #[test]
    fn test_subject_means_and_ttest() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rrv(tmp.path(), "rrv_table_sub-001_0.csv", 2.0, 1.0);
        write_rrv(tmp.path(), "rrv_table_sub-001_1.csv", 4.0, 1.0);
        write_rrv(tmp.path(), "rrv_table_sub-002_0.csv", 2.0, 2.0);
        write_rrv(tmp.path(), "rrv_table_sub-003_0.csv", 5.0, 2.5);
        fs::write(tmp.path().join("other.csv"), "x\n1\n").unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        let options = RrvTTestOptions {
            plot: false,
            ..Default::default()
        };

        let summary = run(&paths, &options).unwrap();
        assert_eq!(summary.measure, "RRV_RMSSD");
        assert_eq!(summary.tables, 4);
        assert_eq!(summary.subjects.index, vec!["1", "2", "3"]);
        assert_eq!(summary.subjects.column("cue").unwrap(), vec![3.0, 2.0, 5.0]);
        assert_eq!(summary.subjects.column("uncued").unwrap(), vec![1.0, 2.0, 2.5]);
        // differences [2, 0, 2.5]
        let d = [2.0, 0.0, 2.5];
        let m = d.iter().sum::<f64>() / 3.0;
        let sd = (d.iter().map(|v| (v - m).powi(2)).sum::<f64>() / 2.0).sqrt();
        assert!((summary.ttest.t - m / (sd / 3f64.sqrt())).abs() < 1e-9);
        assert!(paths.rrv_ttest_results().exists());
    }

    #[test]
    fn test_named_measure() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rrv(tmp.path(), "rrv_table_sub-001_0.csv", 2.0, 1.0);
        write_rrv(tmp.path(), "rrv_table_sub-002_0.csv", 3.0, 1.0);
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        let options = RrvTTestOptions {
            measure: Some("RRV_MeanBB".to_string()),
            plot: false,
            ..Default::default()
        };
        // Identical differences give zero variance.
        assert!(run(&paths, &options).is_err());

        let options = RrvTTestOptions {
            measure: Some("RRV_Nope".to_string()),
            plot: false,
            ..Default::default()
        };
        assert!(run(&paths, &options).unwrap_err().is_input_error());
    }

    #[test]
    fn test_no_tables_is_input_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        assert!(run(&paths, &RrvTTestOptions::default())
            .unwrap_err()
            .is_input_error());
    }
}
