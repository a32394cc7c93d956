//! Peak finding with the conditions used by the REM detector.
//!
//! Candidates are local maxima (flat tops resolve to their midpoint). They are
//! then filtered by height, by minimum distance (taller peaks win), and by
//! prominence computed inside an optional window, in that order.

#[derive(Debug, Clone, Default)]
pub struct PeakOptions {
    /// Inclusive `(min, max)` height.
    pub height: Option<(f64, f64)>,
    /// Minimum distance between neighbouring peaks, in samples.
    pub distance: Option<f64>,
    /// Minimum prominence.
    pub prominence: Option<f64>,
    /// Window length (samples) bounding the search for peak bases.
    pub wlen: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Peaks {
    pub indices: Vec<usize>,
    pub prominences: Vec<f64>,
    pub left_bases: Vec<usize>,
    pub right_bases: Vec<usize>,
}

impl Peaks {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Keep only the peaks for which `keep(i)` holds, `i` indexing this set.
    pub fn retain_by<F: Fn(usize) -> bool>(&mut self, keep: F) {
        let mask: Vec<bool> = (0..self.len()).map(keep).collect();
        let filter = |v: &mut Vec<usize>| {
            let mut it = mask.iter();
            v.retain(|_| *it.next().unwrap_or(&false));
        };
        filter(&mut self.indices);
        filter(&mut self.left_bases);
        filter(&mut self.right_bases);
        let mut it = mask.iter();
        self.prominences.retain(|_| *it.next().unwrap_or(&false));
    }
}

/// Indices of local maxima; plateaus report their (rounded-down) midpoint.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(peaks: &[usize], x: &[f64], distance: f64) -> Vec<usize> {
    let distance = distance.ceil() as usize;
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    // Highest first; stable sort keeps the earlier peak on ties.
    order.sort_by(|&a, &b| {
        x[peaks[b]]
            .partial_cmp(&x[peaks[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for &j in &order {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Prominence and bases of one peak, searching at most `wlen / 2` samples
/// to each side when `wlen` is given.
pub fn peak_prominence(x: &[f64], peak: usize, wlen: Option<f64>) -> (f64, usize, usize) {
    let mut i_min = 0usize;
    let mut i_max = x.len() - 1;
    if let Some(w) = wlen {
        let half = (w.ceil() as usize) / 2;
        if half >= 1 {
            i_min = peak.saturating_sub(half);
            i_max = (peak + half).min(i_max);
        }
    }

    let height = x[peak];

    let mut left_base = peak;
    let mut left_min = height;
    let mut i = peak as isize;
    while i >= i_min as isize && x[i as usize] <= height {
        if x[i as usize] < left_min {
            left_min = x[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let mut right_base = peak;
    let mut right_min = height;
    let mut i = peak;
    while i <= i_max && x[i] <= height {
        if x[i] < right_min {
            right_min = x[i];
            right_base = i;
        }
        i += 1;
    }

    (height - left_min.max(right_min), left_base, right_base)
}

pub fn find_peaks(x: &[f64], options: &PeakOptions) -> Peaks {
    let mut candidates = local_maxima(x);

    if let Some((hmin, hmax)) = options.height {
        candidates.retain(|&p| x[p] >= hmin && x[p] <= hmax);
    }

    if let Some(distance) = options.distance {
        if distance > 1.0 && candidates.len() > 1 {
            candidates = select_by_distance(&candidates, x, distance);
        }
    }

    let mut peaks = Peaks::default();
    for &p in &candidates {
        let (prominence, left, right) = peak_prominence(x, p, options.wlen);
        peaks.indices.push(p);
        peaks.prominences.push(prominence);
        peaks.left_bases.push(left);
        peaks.right_bases.push(right);
    }

    if let Some(pmin) = options.prominence {
        let prominences = peaks.prominences.clone();
        peaks.retain_by(|i| prominences[i] >= pmin);
    }

    peaks
}
