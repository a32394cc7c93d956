//! Input/output locations for every analysis.
//!
//! The study keeps raw inputs under one data directory and writes every
//! derived table and figure to one results directory. All file names used by
//! the analyses are built here so the commands never assemble paths on their own.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "../data";
pub const DEFAULT_RESULTS_DIR: &str = "../results";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPaths {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for AnalysisPaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR, DEFAULT_RESULTS_DIR)
    }
}

impl AnalysisPaths {
    pub fn new<D: AsRef<Path>, R: AsRef<Path>>(data_dir: D, results_dir: R) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            results_dir: results_dir.as_ref().to_path_buf(),
        }
    }

    /// Create the results directory if it does not exist yet.
    pub fn ensure_results_dir(&self) -> Result<()> {
        if !self.results_dir.exists() {
            log::info!("Creating results directory {}", self.results_dir.display());
            std::fs::create_dir_all(&self.results_dir)?;
        }
        Ok(())
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn result_file(&self, name: &str) -> PathBuf {
        self.results_dir.join(name)
    }

    // Chi-square analysis

    pub fn lucidity_table(&self) -> PathBuf {
        self.data_file("bct_tmr_data.csv")
    }

    pub fn chi_square_results(&self) -> PathBuf {
        self.result_file("ChiSquareAnalysisResults.csv")
    }

    pub fn chi_square_graph(&self) -> PathBuf {
        self.result_file("chi2graph.png")
    }

    // Per-subject EEG recordings

    pub fn subject_recording(&self, subject: &str) -> PathBuf {
        self.data_file(&format!("sub-{}_ses-001_eeg.cnt", subject))
    }

    pub fn hypnogram_csv(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}hypnogram_data.csv", subject))
    }

    pub fn hypnogram_proba_csv(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}hypnogram_proba.csv", subject))
    }

    pub fn hypnogram_graph(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}hypno_graph.png", subject))
    }

    pub fn probability_graph(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}prob_graph.png", subject))
    }

    pub fn events_graph(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}events_graph.png", subject))
    }

    pub fn rem_events_csv(&self, subject: &str) -> PathBuf {
        self.result_file(&format!("{}rem_events.csv", subject))
    }

    pub fn eog_events_graph(&self, subject: &str, window: &str) -> PathBuf {
        self.result_file(&format!("{}eog_events-{}.png", subject, window))
    }

    // Respiration analysis

    pub fn signal_table(&self, subject: &str, trial: usize) -> PathBuf {
        self.result_file(&format!("signal_table_{}_{}.csv", subject, trial))
    }

    pub fn rrv_table(&self, subject: &str, trial: usize) -> PathBuf {
        self.result_file(&format!("rrv_table_{}_{}.csv", subject, trial))
    }

    pub fn respiration_graph(&self, subject: &str, trial: usize) -> PathBuf {
        self.result_file(&format!("rsp_plot_{}_{}.png", subject, trial))
    }

    pub fn rrv_ttest_results(&self) -> PathBuf {
        self.result_file("rrv_t-test_results.csv")
    }

    pub fn rrv_ttest_graph(&self) -> PathBuf {
        self.result_file("rrv_t-test_graph.png")
    }

    // Breath-counting task accuracy

    pub fn bct_accuracy_table(&self) -> PathBuf {
        self.data_file("task-bct_agg.csv")
    }

    pub fn bct_ttest_results(&self) -> PathBuf {
        self.result_file("tmr_t-test_results.csv")
    }

    pub fn bct_wilcoxon_results(&self) -> PathBuf {
        self.result_file("tmr_wilcoxon_results.csv")
    }

    pub fn bct_graph(&self) -> PathBuf {
        self.result_file("tmr_t-test_graph.png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locations() {
        let paths = AnalysisPaths::default();
        assert_eq!(paths.lucidity_table(), Path::new("../data/bct_tmr_data.csv"));
        assert_eq!(
            paths.chi_square_results(),
            Path::new("../results/ChiSquareAnalysisResults.csv")
        );
    }

    #[test]
    fn test_subject_file_names() {
        let paths = AnalysisPaths::new("/d", "/r");
        assert_eq!(
            paths.subject_recording("007"),
            Path::new("/d/sub-007_ses-001_eeg.cnt")
        );
        assert_eq!(
            paths.hypnogram_csv("007"),
            Path::new("/r/007hypnogram_data.csv")
        );
        assert_eq!(
            paths.rrv_table("sub-007", 2),
            Path::new("/r/rrv_table_sub-007_2.csv")
        );
    }

    #[test]
    fn test_ensure_results_dir_creates_nested() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AnalysisPaths::new(tmp.path(), tmp.path().join("a/b"));
        paths.ensure_results_dir().unwrap();
        assert!(tmp.path().join("a/b").is_dir());
    }
}
