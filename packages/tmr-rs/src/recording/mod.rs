//! EEG recordings.
//!
//! Readers for the supported file formats implement [`RecordingReader`];
//! [`RecordingReaderFactory`] picks one from the file extension. A loaded
//! [`Recording`] holds the selected channels in µV together with the
//! annotation stream.

use crate::error::{Result, TmrError};
use crate::events::EventTable;
use crate::signal::{self, FilterConfig};
use crate::types::SampleWindow;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod cnt;
pub mod edf;

pub use cnt::CntReader;
pub use edf::EdfReader;

/// Butterworth order per edge for the broadband recording filter.
pub const RECORDING_FILTER_ORDER: usize = 4;

/// A timestamped marker from the recording's annotation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Seconds from the start of the recording.
    pub onset: f64,
    /// Seconds.
    pub duration: f64,
    pub description: String,
}

/// Common metadata for all file formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub sample_rate: f64,
    pub num_channels: usize,
    pub num_samples: usize,
    pub duration: f64,
    pub channels: Vec<String>,
    pub start_time: Option<String>,
    pub file_type: String,
    pub num_annotations: usize,
}

/// Trait that all recording readers implement.
pub trait RecordingReader {
    /// Metadata without loading the signal data.
    fn metadata(&self) -> Result<RecordingInfo>;

    /// Read whole channels in µV.
    ///
    /// `channels` selects by name and sets the output order; `None` reads all
    /// data channels. Unknown names are an error.
    fn read_channels(&self, channels: Option<&[String]>) -> Result<(Vec<String>, Vec<Vec<f64>>)>;

    /// Annotation stream in file order.
    fn annotations(&self) -> Result<Vec<Annotation>>;

    /// Format name, e.g. "EDF" or "CNT".
    fn format_name(&self) -> &str;
}

/// Resolve requested channel names against the available labels.
pub(crate) fn resolve_channel_indices(
    available: &[String],
    requested: Option<&[String]>,
) -> Result<Vec<usize>> {
    match requested {
        Some(names) => names
            .iter()
            .map(|name| {
                available
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| TmrError::MissingChannel(name.clone()))
            })
            .collect(),
        None => Ok((0..available.len()).collect()),
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Factory for creating recording readers based on file extension
pub struct RecordingReaderFactory;

impl RecordingReaderFactory {
    pub fn create_reader(path: &Path) -> Result<Box<dyn RecordingReader>> {
        if !path.exists() {
            return Err(TmrError::FileNotFound(path.display().to_string()));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension.to_lowercase().as_str() {
            "cnt" => Ok(Box::new(CntReader::new(path)?)),
            "edf" => Ok(Box::new(EdfReader::new(path)?)),
            _ => Err(TmrError::UnsupportedFileType(format!(
                "Unsupported recording extension '{}'. Supported: {}",
                extension,
                Self::supported_extensions().join(", ")
            ))),
        }
    }

    pub fn supported_extensions() -> Vec<&'static str> {
        vec!["cnt", "edf"]
    }

    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| Self::supported_extensions().contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Multichannel recording held in memory, `[channel][sample]` in µV.
#[derive(Debug, Clone)]
pub struct Recording {
    pub source: PathBuf,
    pub sfreq: f64,
    pub channel_names: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub annotations: Vec<Annotation>,
    pub start_time: Option<String>,
}

impl Recording {
    /// Load a recording, optionally keeping only `picks`.
    pub fn load<P: AsRef<Path>>(path: P, picks: Option<&[&str]>) -> Result<Self> {
        let path = path.as_ref();
        let reader = RecordingReaderFactory::create_reader(path)?;
        let info = reader.metadata()?;
        log::info!(
            "Loading {} recording {} ({} channels, {} Hz, {:.1} s)",
            reader.format_name(),
            info.file_name,
            info.num_channels,
            info.sample_rate,
            info.duration
        );

        let picks: Option<Vec<String>> =
            picks.map(|p| p.iter().map(|s| s.to_string()).collect());
        let (channel_names, data) = reader.read_channels(picks.as_deref())?;
        let annotations = reader.annotations()?;
        log::debug!("Read {} annotations", annotations.len());

        let mut recording = Self::from_parts(info.sample_rate, channel_names, data, annotations)?;
        recording.source = path.to_path_buf();
        recording.start_time = info.start_time;
        Ok(recording)
    }

    pub fn from_parts(
        sfreq: f64,
        channel_names: Vec<String>,
        data: Vec<Vec<f64>>,
        annotations: Vec<Annotation>,
    ) -> Result<Self> {
        if sfreq <= 0.0 {
            return Err(TmrError::InvalidParameter(format!(
                "Sampling rate must be positive, got {}",
                sfreq
            )));
        }
        if channel_names.len() != data.len() {
            return Err(TmrError::InvalidParameter(format!(
                "{} channel names for {} channels",
                channel_names.len(),
                data.len()
            )));
        }
        if let Some(first) = data.first() {
            if data.iter().any(|c| c.len() != first.len()) {
                return Err(TmrError::InvalidParameter(
                    "All channels must have the same number of samples".to_string(),
                ));
            }
        }
        Ok(Self {
            source: PathBuf::new(),
            sfreq,
            channel_names,
            data,
            annotations,
            start_time: None,
        })
    }

    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    pub fn n_samples(&self) -> usize {
        self.data.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn duration(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    pub fn channel_index(&self, name: &str) -> Result<usize> {
        self.channel_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TmrError::MissingChannel(name.to_string()))
    }

    pub fn channel(&self, name: &str) -> Result<&[f64]> {
        Ok(&self.data[self.channel_index(name)?])
    }

    /// Slice of one channel; fails when the window leaves the recording.
    pub fn window(&self, channel: &str, window: SampleWindow) -> Result<&[f64]> {
        let data = self.channel(channel)?;
        Ok(&data[window.checked_range(data.len())?])
    }

    /// Time of every sample in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.n_samples())
            .map(|i| i as f64 / self.sfreq)
            .collect()
    }

    /// Zero-phase Butterworth band-pass applied to every channel in place.
    pub fn filter(&mut self, l_freq: f64, h_freq: f64) -> Result<()> {
        let config = FilterConfig::bandpass(l_freq, h_freq, RECORDING_FILTER_ORDER, self.sfreq);
        let design = signal::create_filter(&config)?;
        log::info!(
            "Band-pass filtering {} channels at {}-{} Hz",
            self.n_channels(),
            l_freq,
            h_freq
        );
        self.data.par_iter_mut().for_each(|channel| {
            let mut filter = design.clone();
            *channel = filter.filtfilt(channel);
        });
        Ok(())
    }

    /// Change the sampling rate of every channel. Annotations are kept in
    /// seconds and need no adjustment.
    pub fn resample(&mut self, sfreq: f64) -> Result<()> {
        if (sfreq - self.sfreq).abs() < 1e-9 {
            return Ok(());
        }
        log::info!("Resampling from {} Hz to {} Hz", self.sfreq, sfreq);
        let from = self.sfreq;
        self.data = self
            .data
            .par_iter()
            .map(|channel| signal::resample(channel, from, sfreq))
            .collect::<Result<Vec<_>>>()?;
        self.sfreq = sfreq;
        Ok(())
    }

    /// Event table derived from the annotations at the current sampling rate.
    pub fn events(&self) -> EventTable {
        EventTable::from_annotations(&self.annotations, self.sfreq)
    }
}
