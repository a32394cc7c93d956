//! Does the pre-sleep task change how many participants have a lucid dream?
//!
//! Cross-tabulates lucidity against task condition and runs a chi-square
//! test of independence.

use crate::config::AnalysisPaths;
use crate::error::Result;
use crate::plot;
use crate::stats::{chi2_contingency, ChiSquareResult};
use crate::table::{write_statistic_table, CrossTab, Table};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ChiSquareOptions {
    /// Overrides the default participant table.
    pub input: Option<PathBuf>,
    pub outcome_column: String,
    pub condition_column: String,
    pub participant_column: String,
    /// Yates' continuity correction for 2x2 tables.
    pub correction: bool,
    pub plot: bool,
}

impl Default for ChiSquareOptions {
    fn default() -> Self {
        Self {
            input: None,
            outcome_column: "had_lucid".to_string(),
            condition_column: "tmr_condition".to_string(),
            participant_column: "participant_id".to_string(),
            correction: true,
            plot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChiSquareSummary {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub sample_size: usize,
    pub table: CrossTab,
    pub results_file: PathBuf,
}

/// Display name of a task condition code.
fn condition_name(code: &str) -> String {
    match code {
        "bct" => "Mindfulness Task".to_string(),
        "svp" => "Attention Task".to_string(),
        other => other.to_string(),
    }
}

pub fn run(paths: &AnalysisPaths, options: &ChiSquareOptions) -> Result<ChiSquareSummary> {
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| paths.lucidity_table());
    let table = Table::read_csv(&input)?;
    log::info!("Read {} rows from {}", table.len(), input.display());

    let crosstab = table.crosstab(&options.outcome_column, &options.condition_column)?;
    let ChiSquareResult {
        statistic,
        p_value,
        dof,
        ..
    } = chi2_contingency(&crosstab.counts, options.correction)?;
    let sample_size = table.unique_count(&options.participant_column)?;
    log::info!(
        "chi2 = {:.4}, dof = {}, p = {:.4}, n = {}",
        statistic,
        dof,
        p_value,
        sample_size
    );

    paths.ensure_results_dir()?;
    let results_file = paths.chi_square_results();
    write_statistic_table(
        &results_file,
        &[
            ("DOF", dof as f64),
            ("Sample Size", sample_size as f64),
            ("P Value", p_value),
        ],
    )?;

    if options.plot {
        render(&crosstab, &paths.chi_square_graph())?;
    }

    Ok(ChiSquareSummary {
        statistic,
        p_value,
        dof,
        sample_size,
        table: crosstab,
        results_file,
    })
}

/// Heading of the condition legend; the chart itself has no caption.
pub const LEGEND_TITLE: &str = "TMR Condition";

/// Outcome categories and one count series per condition, as drawn.
fn chart_series(crosstab: &CrossTab) -> (Vec<String>, Vec<(String, Vec<f64>)>) {
    let categories: Vec<String> = if crosstab.row_labels.len() == 2 {
        vec!["No Lucid Dream".to_string(), "Lucid Dream".to_string()]
    } else {
        crosstab.row_labels.clone()
    };
    let series = crosstab
        .col_labels
        .iter()
        .enumerate()
        .map(|(j, label)| {
            let counts = crosstab.counts.iter().map(|row| row[j]).collect();
            (condition_name(label), counts)
        })
        .collect();
    (categories, series)
}

fn render(crosstab: &CrossTab, path: &std::path::Path) -> Result<()> {
    let (categories, series) = chart_series(crosstab);
    plot::grouped_bar_chart(
        path,
        LEGEND_TITLE,
        " ",
        "Number of Participants",
        &categories,
        &series,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_table(dir: &std::path::Path) {
        let mut text = String::from("participant_id,had_lucid,tmr_condition\n");
        let rows = [(10, 0, "bct"), (5, 1, "bct"), (3, 0, "svp"), (12, 1, "svp")];
        let mut id = 0;
        for (n, lucid, cond) in rows {
            for _ in 0..n {
                text.push_str(&format!("{},{},{}\n", id, lucid, cond));
                id += 1;
            }
        }
        fs::write(dir.join("bct_tmr_data.csv"), text).unwrap();
    }

    #[test]
    fn test_chi_square_results_table() {
        let tmp = tempfile::TempDir::new().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        write_table(&data);
        let paths = AnalysisPaths::new(&data, tmp.path().join("results"));
        let options = ChiSquareOptions {
            plot: false,
            ..Default::default()
        };

        let summary = run(&paths, &options).unwrap();
        assert_eq!(summary.dof, 1);
        assert_eq!(summary.sample_size, 30);
        assert_eq!(summary.table.counts, vec![vec![10.0, 3.0], vec![5.0, 12.0]]);

        let text = fs::read_to_string(paths.chi_square_results()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Statistic,Value");
        assert_eq!(lines[1], "DOF,1.000000");
        assert_eq!(lines[2], "Sample Size,30.000000");
        assert!(lines[3].starts_with("P Value,0.0"));
    }

    #[test]
    fn test_sample_size_ignores_blank_participants() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_table(tmp.path());
        let mut text = fs::read_to_string(tmp.path().join("bct_tmr_data.csv")).unwrap();
        text.push_str(",1,bct\n,0,svp\n");
        fs::write(tmp.path().join("bct_tmr_data.csv"), text).unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path().join("results"));
        let options = ChiSquareOptions {
            plot: false,
            ..Default::default()
        };

        let summary = run(&paths, &options).unwrap();
        assert_eq!(summary.sample_size, 30);
        let text = fs::read_to_string(paths.chi_square_results()).unwrap();
        assert!(text.contains("Sample Size,30.000000\n"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("bct_tmr_data.csv"), "participant_id,x\n1,2\n").unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path());
        let err = run(&paths, &ChiSquareOptions::default()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_chart_series_follow_conditions() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_table(tmp.path());
        let table = Table::read_csv(tmp.path().join("bct_tmr_data.csv")).unwrap();
        let crosstab = table.crosstab("had_lucid", "tmr_condition").unwrap();

        let (categories, series) = chart_series(&crosstab);
        assert_eq!(categories, vec!["No Lucid Dream", "Lucid Dream"]);
        assert_eq!(series[0], ("Mindfulness Task".to_string(), vec![10.0, 5.0]));
        assert_eq!(series[1], ("Attention Task".to_string(), vec![3.0, 12.0]));
        assert_eq!(LEGEND_TITLE, "TMR Condition");
    }

    #[test]
    fn test_condition_names() {
        assert_eq!(condition_name("bct"), "Mindfulness Task");
        assert_eq!(condition_name("svp"), "Attention Task");
        assert_eq!(condition_name("other"), "other");
    }
}
