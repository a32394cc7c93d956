//! Chi-square test of independence on an r x c contingency table.

use crate::error::{Result, TmrError};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

#[derive(Debug, Clone, Serialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub expected: Vec<Vec<f64>>,
}

/// Expected frequencies under independence: `row_sum * col_sum / total`.
pub fn expected_freq(observed: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let total: f64 = observed.iter().flatten().sum();
    let n_cols = observed.first().map(|r| r.len()).unwrap_or(0);
    let row_sums: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..n_cols)
        .map(|j| observed.iter().map(|r| r[j]).sum())
        .collect();
    row_sums
        .iter()
        .map(|rs| col_sums.iter().map(|cs| rs * cs / total).collect())
        .collect()
}

/// Chi-square test of independence.
///
/// With one degree of freedom and `correction` set, Yates' continuity
/// correction moves every observed count towards its expectation by at most
/// 0.5. A table with zero degrees of freedom yields statistic 0 and p = 1.
pub fn chi2_contingency(observed: &[Vec<f64>], correction: bool) -> Result<ChiSquareResult> {
    let n_rows = observed.len();
    let n_cols = observed.first().map(|r| r.len()).unwrap_or(0);
    if n_rows == 0 || n_cols == 0 {
        return Err(TmrError::InsufficientData(
            "contingency table is empty".to_string(),
        ));
    }
    if observed.iter().any(|r| r.len() != n_cols) {
        return Err(TmrError::InvalidParameter(
            "contingency table rows differ in length".to_string(),
        ));
    }
    if observed.iter().flatten().any(|&v| v < 0.0 || !v.is_finite()) {
        return Err(TmrError::InvalidParameter(
            "contingency table must hold non-negative counts".to_string(),
        ));
    }

    let expected = expected_freq(observed);
    if expected.iter().flatten().any(|&e| e == 0.0) {
        return Err(TmrError::InvalidParameter(
            "contingency table has a zero expected frequency".to_string(),
        ));
    }

    let dof = (n_rows - 1) * (n_cols - 1);
    if dof == 0 {
        return Ok(ChiSquareResult {
            statistic: 0.0,
            p_value: 1.0,
            dof,
            expected,
        });
    }

    let mut statistic = 0.0;
    for (obs_row, exp_row) in observed.iter().zip(&expected) {
        for (&o, &e) in obs_row.iter().zip(exp_row) {
            let mut o = o;
            if dof == 1 && correction {
                let diff = e - o;
                o += diff.signum() * diff.abs().min(0.5);
            }
            statistic += (o - e).powi(2) / e;
        }
    }

    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| TmrError::InvalidParameter(format!("chi-square distribution: {}", e)))?;
    let p_value = dist.sf(statistic).clamp(0.0, 1.0);

    Ok(ChiSquareResult {
        statistic,
        p_value,
        dof,
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::function::erf::erfc;

    #[test]
    fn test_yates_corrected_2x2() {
        let table = vec![vec![10.0, 5.0], vec![3.0, 12.0]];
        let result = chi2_contingency(&table, true).unwrap();
        assert_eq!(result.dof, 1);
        assert!((result.expected[0][0] - 6.5).abs() < 1e-12);
        assert!((result.expected[0][1] - 8.5).abs() < 1e-12);
        // Every |o - e| is 3.5, corrected to 3.0.
        let expected_stat = 9.0 * (2.0 / 6.5 + 2.0 / 8.5);
        assert!((result.statistic - expected_stat).abs() < 1e-9);
        let p = erfc((result.statistic / 2.0).sqrt());
        assert!((result.p_value - p).abs() < 1e-6);
    }

    #[test]
    fn test_uncorrected_statistic() {
        let table = vec![vec![10.0, 5.0], vec![3.0, 12.0]];
        let result = chi2_contingency(&table, false).unwrap();
        let expected_stat = 12.25 * (2.0 / 6.5 + 2.0 / 8.5);
        assert!((result.statistic - expected_stat).abs() < 1e-9);
    }

    #[test]
    fn test_single_row_has_no_dof() {
        let result = chi2_contingency(&[vec![4.0, 6.0]], true).unwrap();
        assert_eq!(result.dof, 0);
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_larger_table_uses_no_correction() {
        let table = vec![vec![10.0, 5.0, 7.0], vec![3.0, 12.0, 8.0]];
        let a = chi2_contingency(&table, true).unwrap();
        let b = chi2_contingency(&table, false).unwrap();
        assert_eq!(a.dof, 2);
        assert_eq!(a.statistic, b.statistic);
    }

    #[test]
    fn test_zero_expected_rejected() {
        let table = vec![vec![0.0, 0.0], vec![3.0, 12.0]];
        assert!(chi2_contingency(&table, true).is_err());
    }
}
