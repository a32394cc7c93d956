//! The study analyses.
//!
//! Each analysis is one linear pass over a static input: resolve paths from
//! [`AnalysisPaths`], load a table or recording, run its transform and
//! persist a CSV table and figures to the results directory. Options are
//! plain structs whose `Default` holds the study constants.

pub mod bct_accuracy;
pub mod chi_square;
pub mod rem;
pub mod respiration;
pub mod rrv_ttest;
pub mod staging;

pub use bct_accuracy::{BctAccuracyOptions, BctAccuracySummary};
pub use chi_square::{ChiSquareOptions, ChiSquareSummary};
pub use rem::{RemAnalysisOptions, RemSummary};
pub use respiration::{RespirationOptions, RespirationSummary};
pub use rrv_ttest::{RrvTTestOptions, RrvTTestSummary};
pub use staging::{StagingOptions, StagingSummary};

use crate::config::AnalysisPaths;
use std::path::{Path, PathBuf};

/// Explicit recording path, or the subject's default recording.
fn recording_path(paths: &AnalysisPaths, subject: &str, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.subject_recording(subject))
}
