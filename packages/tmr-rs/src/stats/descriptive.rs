//! Descriptive statistics over `f64` slices.

use std::cmp::Ordering;

/// Scale factor making the MAD a consistent estimator of the standard deviation.
pub const MAD_NORMAL_SCALE: f64 = 1.4826;

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Mean ignoring NaN values; NaN when nothing is left.
pub fn nanmean(x: &[f64]) -> f64 {
    let (sum, n) = x
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Variance with `ddof` delta degrees of freedom.
pub fn variance(x: &[f64], ddof: usize) -> f64 {
    if x.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (x.len() - ddof) as f64
}

/// Sample standard deviation (ddof = 1).
pub fn std_dev(x: &[f64]) -> f64 {
    variance(x, 1).sqrt()
}

pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median absolute deviation, scaled by [`MAD_NORMAL_SCALE`].
pub fn mad(x: &[f64]) -> f64 {
    let m = median(x);
    let deviations: Vec<f64> = x.iter().map(|v| (v - m).abs()).collect();
    MAD_NORMAL_SCALE * median(&deviations)
}

/// Successive differences `x[i+1] - x[i]`.
pub fn diff(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

/// 1-based ranks with ties sharing their average rank.
pub fn rank_average(x: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; x.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Sizes of the groups of tied values (only groups larger than one).
pub fn tie_counts(x: &[f64]) -> Vec<usize> {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut counts = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > 1 {
            counts.push(j - i);
        }
        i = j;
    }
    counts
}

/// Keep only the pairs where both values are finite numbers.
pub fn drop_nan_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_moments() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&x), 5.0);
        assert_eq!(variance(&x, 0), 4.0);
        assert!((std_dev(&x) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(median(&x), 4.5);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_nanmean_skips_nan() {
        assert_eq!(nanmean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nanmean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_mad() {
        let x = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        // median 2, deviations [1,1,0,0,2,4,7] -> median 1
        assert!((mad(&x) - MAD_NORMAL_SCALE).abs() < 1e-12);
    }

    #[test]
    fn test_average_ranks_and_ties() {
        let x = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rank_average(&x), vec![3.0, 1.5, 4.0, 1.5, 5.0]);
        assert_eq!(tie_counts(&x), vec![2]);
    }
}
