use crate::error::{Result, TmrError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Half-open range of sample indices `[start, end)`.
///
/// Windows are planned in signed sample space so that a window reaching
/// before the start of a recording can be represented and rejected when it
/// is extracted, instead of being silently clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub start: i64,
    pub end: i64,
}

impl SampleWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window of `length` samples beginning at `start`.
    pub fn starting_at(start: i64, length: i64) -> Self {
        Self::new(start, start + length)
    }

    /// Window of `length` samples ending (exclusive) at `end`.
    pub fn ending_at(end: i64, length: i64) -> Self {
        Self::new(end - length, end)
    }

    pub fn len(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve to a `usize` range, failing when any part lies outside `0..n_samples`.
    pub fn checked_range(&self, n_samples: usize) -> Result<std::ops::Range<usize>> {
        if self.start < 0 || self.end < self.start || self.end as u64 > n_samples as u64 {
            return Err(TmrError::WindowOutOfBounds {
                start: self.start,
                end: self.end,
                len: n_samples,
            });
        }
        Ok(self.start as usize..self.end as usize)
    }
}

/// Named time range in seconds, used for zoomed plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(name: &str, start: f64, end: f64) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// Convert to sample indices, truncating like an integer cast.
    pub fn to_samples(&self, sfreq: f64) -> SampleWindow {
        SampleWindow::new((self.start * sfreq) as i64, (self.end * sfreq) as i64)
    }
}

impl FromStr for TimeRange {
    type Err = String;

    /// Parse `name:start:end` (seconds).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(format!(
                "Invalid window '{}': expected 'name:start:end' in seconds",
                s
            ));
        }
        let name = parts[0].trim();
        if name.is_empty() {
            return Err(format!("Invalid window '{}': name is empty", s));
        }
        let start = parts[1]
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid window '{}': '{}' is not a number", s, parts[1]))?;
        let end = parts[2]
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid window '{}': '{}' is not a number", s, parts[2]))?;
        if end <= start {
            return Err(format!("Invalid window '{}': end must be after start", s));
        }
        Ok(Self::new(name, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_range() {
        let w = SampleWindow::starting_at(10, 5);
        assert_eq!(w.checked_range(15).unwrap(), 10..15);
        assert!(w.checked_range(14).is_err());
        assert!(SampleWindow::ending_at(3, 5).checked_range(100).is_err());
    }

    #[test]
    fn test_parse_time_range() {
        let r: TimeRange = "wake:2182:2192".parse().unwrap();
        assert_eq!(r, TimeRange::new("wake", 2182.0, 2192.0));
        assert!("wake:10".parse::<TimeRange>().is_err());
        assert!("wake:10:5".parse::<TimeRange>().is_err());
        assert!(":1:2".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_time_range_to_samples() {
        let r = TimeRange::new("rem", 5992.0, 6002.0);
        assert_eq!(r.to_samples(100.0), SampleWindow::new(599_200, 600_200));
    }
}
