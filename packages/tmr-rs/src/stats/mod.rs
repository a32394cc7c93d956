//! Statistical tests used by the analyses.
//!
//! - Chi-square test of independence with Yates' correction
//! - Paired t-test with Cohen's d, JZS Bayes factor and achieved power
//! - Wilcoxon signed-rank test with rank-biserial correlation and CLES
//!
//! Distribution functions come from `statrs`.

pub mod contingency;
pub mod descriptive;
pub mod integrate;
pub mod ttest;
pub mod wilcoxon;

pub use contingency::{chi2_contingency, expected_freq, ChiSquareResult};
pub use descriptive::{mad, mean, median, nanmean, std_dev, variance};
pub use ttest::{ttest_paired, TTestResult};
pub use wilcoxon::{wilcoxon, WilcoxonResult};
