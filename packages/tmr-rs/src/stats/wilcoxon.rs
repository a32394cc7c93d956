//! Wilcoxon signed-rank test for paired samples.
//!
//! Zero differences are discarded before ranking. Small samples without ties
//! use the exact null distribution; otherwise the normal approximation with
//! tie correction (and no continuity correction) is used.

use super::descriptive::{drop_nan_pairs, rank_average, tie_counts};
use crate::error::{Result, TmrError};
use serde::Serialize;
use statrs::function::erf::erfc;

/// Largest sample for which the exact distribution is computed.
pub const EXACT_MAX_N: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct WilcoxonResult {
    #[serde(rename = "W-val")]
    pub w: f64,
    pub alternative: String,
    #[serde(rename = "p-val")]
    pub p_value: f64,
    /// Matched-pairs rank-biserial correlation.
    #[serde(rename = "RBC")]
    pub rbc: f64,
    /// Common-language effect size.
    #[serde(rename = "CLES")]
    pub cles: f64,
}

pub fn wilcoxon(x: &[f64], y: &[f64]) -> Result<WilcoxonResult> {
    if x.len() != y.len() {
        return Err(TmrError::InvalidParameter(format!(
            "paired samples differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let (x, y) = drop_nan_pairs(x, y);

    let d: Vec<f64> = x
        .iter()
        .zip(&y)
        .map(|(a, b)| a - b)
        .filter(|v| *v != 0.0)
        .collect();
    let had_zeros = d.len() != x.len();
    let n = d.len();
    if n == 0 {
        return Err(TmrError::InsufficientData(
            "all paired differences are zero".to_string(),
        ));
    }

    let abs: Vec<f64> = d.iter().map(|v| v.abs()).collect();
    let ranks = rank_average(&abs);
    let r_plus: f64 = d.iter().zip(&ranks).filter(|(v, _)| **v > 0.0).map(|(_, r)| r).sum();
    let r_minus: f64 = d.iter().zip(&ranks).filter(|(v, _)| **v < 0.0).map(|(_, r)| r).sum();
    let w = r_plus.min(r_minus);

    let ties = tie_counts(&abs);
    let p_value = if n <= EXACT_MAX_N && ties.is_empty() && !had_zeros {
        exact_p_value(n, w)
    } else {
        normal_p_value(n, w, &ties)
    };

    let rank_sum = r_plus + r_minus;
    Ok(WilcoxonResult {
        w,
        alternative: "two-sided".to_string(),
        p_value,
        rbc: r_plus / rank_sum - r_minus / rank_sum,
        cles: common_language_effect_size(&x, &y),
    })
}

/// Two-sided p-value from the exact null distribution of the signed-rank sum.
fn exact_p_value(n: usize, w: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0.0f64; max_sum + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for s in (rank..=max_sum).rev() {
            counts[s] += counts[s - rank];
        }
    }
    let total = 2f64.powi(n as i32);
    let w = w.floor() as usize;
    let lower: f64 = counts[..=w.min(max_sum)].iter().sum();
    (2.0 * lower / total).min(1.0)
}

fn normal_p_value(n: usize, w: f64, ties: &[usize]) -> f64 {
    let n = n as f64;
    let mean = n * (n + 1.0) / 4.0;
    let tie_term: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let var = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_term / 48.0;
    if var <= 0.0 {
        return f64::NAN;
    }
    let z = (w - mean) / var.sqrt();
    // 2 * P(Z > |z|)
    erfc(z.abs() / 2f64.sqrt()).min(1.0)
}

/// Share of all `(x_i, y_j)` pairs with `x_i > y_j`, ties counting one half.
pub fn common_language_effect_size(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || y.is_empty() {
        return f64::NAN;
    }
    let mut score = 0.0;
    for a in x {
        for b in y {
            if a > b {
                score += 1.0;
            } else if a == b {
                score += 0.5;
            }
        }
    }
    score / (x.len() * y.len()) as f64
}
