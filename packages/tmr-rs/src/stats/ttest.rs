//! Paired two-sided t-test with effect size, Bayes factor and power.

use super::descriptive::{drop_nan_pairs, mean, variance};
use super::integrate::adaptive_simpson;
use crate::error::{Result, TmrError};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erfc;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

pub const ALPHA: f64 = 0.05;
/// Cauchy prior scale of the JZS Bayes factor.
pub const JZS_PRIOR_SCALE: f64 = 0.707;

const INTEGRATION_PIECES: usize = 16;

#[derive(Debug, Clone, Serialize)]
pub struct TTestResult {
    #[serde(rename = "T")]
    pub t: f64,
    pub dof: f64,
    pub alternative: String,
    #[serde(rename = "p-val")]
    pub p_value: f64,
    /// 95 % confidence interval of the mean difference.
    pub ci95: (f64, f64),
    #[serde(rename = "cohen-d")]
    pub cohen_d: f64,
    #[serde(rename = "BF10")]
    pub bf10: f64,
    pub power: f64,
}

impl TTestResult {
    /// Interval rounded to two decimals, e.g. `[-0.12 0.34]`.
    pub fn ci95_label(&self) -> String {
        format!("[{:.2} {:.2}]", self.ci95.0, self.ci95.1)
    }

    /// Three significant digits, or scientific notation from 10^4 upwards.
    pub fn bf10_label(&self) -> String {
        format_bayes_factor(self.bf10)
    }
}

fn distribution_error<E: std::fmt::Display>(e: E) -> TmrError {
    TmrError::InvalidParameter(format!("distribution: {}", e))
}

/// Two-sided paired t-test of `x` against `y`. Pairs with a NaN are dropped.
pub fn ttest_paired(x: &[f64], y: &[f64]) -> Result<TTestResult> {
    if x.len() != y.len() {
        return Err(TmrError::InvalidParameter(format!(
            "paired samples differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let (x, y) = drop_nan_pairs(x, y);
    let n = x.len();
    if n < 2 {
        return Err(TmrError::InsufficientData(format!(
            "paired t-test needs at least 2 pairs, got {}",
            n
        )));
    }

    let d: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a - b).collect();
    let dof = (n - 1) as f64;
    let se = (variance(&d, 1) / n as f64).sqrt();
    if se == 0.0 {
        return Err(TmrError::InsufficientData(
            "paired differences have zero variance".to_string(),
        ));
    }
    let mean_diff = mean(&d);
    let t = mean_diff / se;

    let dist = StudentsT::new(0.0, 1.0, dof).map_err(distribution_error)?;
    let p_value = (2.0 * dist.sf(t.abs())).min(1.0);
    let tcrit = dist.inverse_cdf(1.0 - ALPHA / 2.0);
    let ci95 = (mean_diff - tcrit * se, mean_diff + tcrit * se);

    let cohen_d = (mean(&x) - mean(&y)).abs() / ((variance(&x, 1) + variance(&y, 1)) / 2.0).sqrt();
    let bf10 = bayes_factor_one_sample(t, n, JZS_PRIOR_SCALE);
    let power = power_paired(cohen_d, n, ALPHA)?;

    Ok(TTestResult {
        t,
        dof,
        alternative: "two-sided".to_string(),
        p_value,
        ci95,
        cohen_d,
        bf10,
        power,
    })
}

/// JZS Bayes factor for a one-sample (or paired) t statistic.
pub fn bayes_factor_one_sample(t: f64, n: usize, r: f64) -> f64 {
    let n = n as f64;
    let df = n - 1.0;
    let exponent = -(df + 1.0) / 2.0;
    let integrand = |g: f64| {
        let ngr = 1.0 + n * g * r * r;
        ngr.powf(-0.5)
            * (1.0 + t * t / (ngr * df)).powf(exponent)
            * (2.0 * PI).powf(-0.5)
            * g.powf(-1.5)
            * (-1.0 / (2.0 * g)).exp()
    };
    // g = u / (1 - u) maps (0, inf) onto (0, 1).
    let tail = (n * r * r).powf(-0.5) * (2.0 * PI).powf(-0.5);
    let mapped = |u: f64| {
        if u <= 0.0 {
            0.0
        } else if u >= 1.0 {
            tail
        } else {
            let g = u / (1.0 - u);
            integrand(g) / (1.0 - u).powi(2)
        }
    };
    let integral = piecewise(mapped, 0.0, 1.0);
    integral / (1.0 + t * t / df).powf(exponent)
}

fn piecewise<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> f64 {
    let h = (b - a) / INTEGRATION_PIECES as f64;
    (0..INTEGRATION_PIECES)
        .map(|i| {
            let lo = a + i as f64 * h;
            adaptive_simpson(&f, lo, lo + h, 1e-12)
        })
        .sum()
}

/// CDF of the non-central t distribution,
/// `P(T <= t) = E[Phi(t * sqrt(V / df) - nc)]` with `V ~ chi2(df)`.
pub fn noncentral_t_cdf(t: f64, df: f64, nc: f64) -> f64 {
    let phi = |z: f64| 0.5 * erfc(-z / 2f64.sqrt());
    let ln_norm = (df / 2.0) * 2f64.ln() + ln_gamma(df / 2.0);
    // Density of s = sqrt(V).
    let density = |s: f64| {
        if s <= 0.0 {
            if df == 1.0 {
                (2.0 / PI).sqrt()
            } else {
                0.0
            }
        } else {
            (2f64.ln() + (df - 1.0) * s.ln() - s * s / 2.0 - ln_norm).exp()
        }
    };
    let upper = df.sqrt() + 12.0;
    piecewise(
        |s| phi(t * s / df.sqrt() - nc) * density(s),
        0.0,
        upper,
    )
    .clamp(0.0, 1.0)
}

/// Achieved power of a two-sided paired t-test.
pub fn power_paired(d: f64, n: usize, alpha: f64) -> Result<f64> {
    let df = (n - 1) as f64;
    let nc = d.abs() * (n as f64).sqrt();
    let tcrit = StudentsT::new(0.0, 1.0, df)
        .map_err(distribution_error)?
        .inverse_cdf(1.0 - alpha / 2.0);
    let power = 1.0 - noncentral_t_cdf(tcrit, df, nc) + noncentral_t_cdf(-tcrit, df, nc);
    Ok(power.clamp(0.0, 1.0))
}

pub fn format_bayes_factor(bf: f64) -> String {
    if bf.is_nan() {
        return String::new();
    }
    if bf < 1e4 {
        format_general(bf, 3)
    } else {
        format_scientific(bf, 3)
    }
}

/// Exponent written with sign and at least two digits, e.g. `e+04`.
fn exponent_suffix(exp: i32) -> String {
    format!("e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs())
}

fn format_scientific(v: f64, decimals: usize) -> String {
    let s = format!("{:.*e}", decimals, v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            format!("{}{}", mantissa, exponent_suffix(exp.parse().unwrap_or(0)))
        }
        None => s,
    }
}

fn strip_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// `%g`-style formatting with `sig` significant digits.
fn format_general(v: f64, sig: usize) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let rounded = format!("{:.*e}", sig - 1, v);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exp < -4 || exp >= sig as i32 {
        let (mantissa, _) = rounded.split_once('e').unwrap_or((rounded.as_str(), ""));
        format!("{}{}", strip_zeros(mantissa), exponent_suffix(exp))
    } else {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> (Vec<f64>, Vec<f64>) {
        (
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 2.0, 5.0, 3.0, 8.0],
        )
    }

    #[test]
    fn test_paired_ttest_matches_hand_computation() {
        let (x, y) = samples();
        let r = ttest_paired(&x, &y).unwrap();
        // Differences [-1, 0, -2, 1, -3]: mean -1, variance 2.5, se sqrt(0.5).
        assert!((r.t + 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(r.dof, 4.0);
        // Closed-form t CDF for 4 degrees of freedom.
        let t2: f64 = 2.0;
        let a = t2.sqrt() / (1.0 + t2 / 4.0).sqrt();
        let b = t2 / (1.0 + t2 / 4.0);
        let p = 1.0 - 0.75 * a * (1.0 - b / 12.0);
        assert!((r.p_value - p).abs() < 1e-9);
        assert!((r.cohen_d - 1.0 / 4.5f64.sqrt()).abs() < 1e-12);
        assert!(r.ci95.0 < -1.0 && r.ci95.1 > -1.0);
        assert_eq!(r.alternative, "two-sided");
    }

    #[test]
    fn test_swapping_samples_negates_t() {
        let (x, y) = samples();
        let a = ttest_paired(&x, &y).unwrap();
        let b = ttest_paired(&y, &x).unwrap();
        assert!((a.t + b.t).abs() < 1e-12);
        assert!((a.p_value - b.p_value).abs() < 1e-12);
        assert!((a.cohen_d - b.cohen_d).abs() < 1e-12);
    }

    #[test]
    fn test_nan_pairs_dropped() {
        let (mut x, mut y) = samples();
        x.push(f64::NAN);
        y.push(10.0);
        let r = ttest_paired(&x, &y).unwrap();
        assert_eq!(r.dof, 4.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(ttest_paired(&[1.0], &[2.0]).is_err());
        assert!(ttest_paired(&[1.0, 2.0], &[0.0, 1.0]).is_err());
        assert!(ttest_paired(&[1.0, 2.0], &[0.0]).is_err());
    }

    #[test]
    fn test_central_case_matches_students_t() {
        let dist = StudentsT::new(0.0, 1.0, 5.0).unwrap();
        for t in [-2.0, -0.3, 0.0, 1.5] {
            assert!((noncentral_t_cdf(t, 5.0, 0.0) - dist.cdf(t)).abs() < 1e-8);
        }
        assert!((noncentral_t_cdf(0.5, 1.0, 0.0) - dist_cdf_df1(0.5)).abs() < 1e-6);
    }

    fn dist_cdf_df1(t: f64) -> f64 {
        0.5 + t.atan() / PI
    }

    #[test]
    fn test_power_without_effect_is_alpha() {
        let p = power_paired(0.0, 12, ALPHA).unwrap();
        assert!((p - ALPHA).abs() < 1e-6);
        assert!(power_paired(1.0, 12, ALPHA).unwrap() > 0.8);
    }

    #[test]
    fn test_bayes_factor() {
        let bf = bayes_factor_one_sample(3.5, 20, JZS_PRIOR_SCALE);
        assert!((bf - 17.185).abs() < 0.01);
        let null = bayes_factor_one_sample(0.0, 20, JZS_PRIOR_SCALE);
        assert!(null < 1.0);
        assert!((bayes_factor_one_sample(-3.5, 20, JZS_PRIOR_SCALE) - bf).abs() < 1e-9);
    }

    #[test]
    fn test_bayes_factor_labels() {
        assert_eq!(format_bayes_factor(0.45678), "0.457");
        assert_eq!(format_bayes_factor(1.0), "1");
        assert_eq!(format_bayes_factor(17.185), "17.2");
        assert_eq!(format_bayes_factor(1234.0), "1.23e+03");
        assert_eq!(format_bayes_factor(0.0000123), "1.23e-05");
        assert_eq!(format_bayes_factor(123456.0), "1.235e+05");
    }
}
