//! Event tables derived from recording annotations.
//!
//! Each unique annotation description gets an integer code. Codes are
//! assigned in sorted description order starting at 1, so the same set of
//! descriptions always yields the same codes.

use crate::error::{Result, TmrError};
use crate::recording::Annotation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Onset in samples.
    pub sample: i64,
    /// Duration in samples.
    pub duration: i64,
    pub code: i32,
}

#[derive(Debug, Clone, Default)]
pub struct EventTable {
    pub events: Vec<Event>,
    /// Annotation description -> event code.
    pub code_map: BTreeMap<String, i32>,
}

impl EventTable {
    pub fn from_annotations(annotations: &[Annotation], sfreq: f64) -> Self {
        let mut code_map = BTreeMap::new();
        for a in annotations {
            code_map.entry(a.description.clone()).or_insert(0);
        }
        for (code, value) in code_map.values_mut().enumerate() {
            *value = code as i32 + 1;
        }

        let events = annotations
            .iter()
            .map(|a| Event {
                sample: (a.onset * sfreq).floor() as i64,
                duration: (a.duration * sfreq).round() as i64,
                code: code_map[&a.description],
            })
            .collect();

        Self { events, code_map }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Code assigned to an annotation description.
    pub fn code_for(&self, description: &str) -> Result<i32> {
        self.code_map.get(description).copied().ok_or_else(|| {
            TmrError::MissingEvent(format!("no annotation labelled '{}'", description))
        })
    }

    pub fn with_code(&self, code: i32) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.code == code)
    }

    pub fn samples_with_code(&self, code: i32) -> Vec<i64> {
        self.with_code(code).map(|e| e.sample).collect()
    }

    /// Onsets of events matching any of `codes`, in event order.
    pub fn samples_with_codes(&self, codes: &[i32]) -> Vec<i64> {
        self.events
            .iter()
            .filter(|e| codes.contains(&e.code))
            .map(|e| e.sample)
            .collect()
    }

    /// `(hours, code)` for every event.
    pub fn times_in_hours(&self, sfreq: f64) -> Vec<(f64, i32)> {
        self.events
            .iter()
            .map(|e| (e.sample as f64 / sfreq / 3600.0, e.code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(onset: f64, description: &str) -> Annotation {
        Annotation {
            onset,
            duration: 0.0,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_codes_follow_sorted_descriptions() {
        let annotations = vec![ann(1.0, "23"), ann(2.0, "227"), ann(3.0, "1"), ann(4.0, "227")];
        let table = EventTable::from_annotations(&annotations, 100.0);
        assert_eq!(table.code_for("1").unwrap(), 1);
        assert_eq!(table.code_for("227").unwrap(), 2);
        assert_eq!(table.code_for("23").unwrap(), 3);
        assert_eq!(table.samples_with_code(2), vec![200, 400]);
        assert!(matches!(table.code_for("99"), Err(TmrError::MissingEvent(_))));
    }

    #[test]
    fn test_sample_onsets_are_floored() {
        let table = EventTable::from_annotations(&[ann(0.0149, "x")], 100.0);
        assert_eq!(table.events[0].sample, 1);
    }

    #[test]
    fn test_merged_codes_keep_event_order() {
        let annotations = vec![ann(3.0, "a"), ann(1.0, "b"), ann(2.0, "a"), ann(4.0, "c")];
        let table = EventTable::from_annotations(&annotations, 10.0);
        let a = table.code_for("a").unwrap();
        let b = table.code_for("b").unwrap();
        assert_eq!(table.samples_with_codes(&[a, b]), vec![30, 10, 20]);
    }
}
