// Neuroscan CNT (continuous) reader
//
// Layout: a 900-byte SETUP header, one 75-byte ELECTLOC record per channel,
// the sample data, then the event table.

use super::{file_name_of, resolve_channel_indices, Annotation, RecordingInfo, RecordingReader};
use crate::error::{Result, TmrError};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub const SETUP_SIZE: usize = 900;
pub const ELECTRODE_SIZE: usize = 75;

const DATE_OFFSET: usize = 225;
const TIME_OFFSET: usize = 235;
const SAMPLES_OFFSET: usize = 864;
const NCHANNELS_OFFSET: usize = 370;
const RATE_OFFSET: usize = 376;
const EVENT_TABLE_OFFSET: usize = 886;
const CHANNEL_OFFSET_OFFSET: usize = 894;

const TYPE1_EVENT_SIZE: usize = 8;
const TYPE23_EVENT_SIZE: usize = 19;

#[derive(Debug, Clone)]
pub struct CntElectrode {
    pub label: String,
    pub baseline: i16,
    pub sensitivity: f32,
    pub calibration: f32,
}

impl CntElectrode {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            label: fixed_string(&bytes[0..10]),
            baseline: i16::from_le_bytes([bytes[47], bytes[48]]),
            sensitivity: f32::from_le_bytes([bytes[59], bytes[60], bytes[61], bytes[62]]),
            calibration: f32::from_le_bytes([bytes[71], bytes[72], bytes[73], bytes[74]]),
        }
    }

    /// Raw sample to µV.
    pub fn scale(&self, raw: i32) -> f64 {
        (raw as f64 - self.baseline as f64) * self.sensitivity as f64 * self.calibration as f64
            / 204.8
    }
}

/// One entry of the event table.
#[derive(Debug, Clone, PartialEq)]
pub struct CntEvent {
    pub stim_type: u16,
    pub sample: usize,
    /// Seconds; only type 2/3 tables carry a latency.
    pub latency: f64,
}

#[derive(Debug, Clone)]
pub struct CntHeader {
    pub date: String,
    pub time: String,
    pub num_channels: usize,
    pub sample_rate: f64,
    pub event_table_pos: usize,
    pub channel_offset: usize,
    pub bytes_per_sample: usize,
    pub num_samples: usize,
}

fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub struct CntReader {
    path: PathBuf,
    bytes: Vec<u8>,
    pub header: CntHeader,
    pub electrodes: Vec<CntElectrode>,
}

impl CntReader {
    pub fn new(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < SETUP_SIZE {
            return Err(TmrError::Parse(format!(
                "CNT file {}: shorter than the {}-byte header",
                path.display(),
                SETUP_SIZE
            )));
        }

        let num_channels = read_u16(&bytes, NCHANNELS_OFFSET) as usize;
        let sample_rate = read_u16(&bytes, RATE_OFFSET) as f64;
        if num_channels == 0 || sample_rate <= 0.0 {
            return Err(TmrError::Parse(format!(
                "CNT file {}: {} channels at {} Hz",
                path.display(),
                num_channels,
                sample_rate
            )));
        }

        let data_start = SETUP_SIZE + ELECTRODE_SIZE * num_channels;
        let event_table_pos = read_i32(&bytes, EVENT_TABLE_OFFSET).max(0) as usize;
        if event_table_pos < data_start || event_table_pos > bytes.len() {
            return Err(TmrError::Parse(format!(
                "CNT file {}: event table offset {} outside the file",
                path.display(),
                event_table_pos
            )));
        }

        // 32-bit files are recognised by the header sample count matching
        // the data size; everything else is 16-bit.
        let data_size = event_table_pos - data_start;
        let header_samples = read_i32(&bytes, SAMPLES_OFFSET).max(0) as usize;
        let bytes_per_sample =
            if header_samples > 0 && data_size == header_samples * num_channels * 4 {
                4
            } else {
                2
            };
        let num_samples = data_size / (num_channels * bytes_per_sample);

        let header = CntHeader {
            date: fixed_string(&bytes[DATE_OFFSET..DATE_OFFSET + 10]),
            time: fixed_string(&bytes[TIME_OFFSET..TIME_OFFSET + 12]),
            num_channels,
            sample_rate,
            event_table_pos,
            channel_offset: read_i32(&bytes, CHANNEL_OFFSET_OFFSET).max(0) as usize,
            bytes_per_sample,
            num_samples,
        };

        let electrodes = (0..num_channels)
            .map(|i| {
                let at = SETUP_SIZE + i * ELECTRODE_SIZE;
                CntElectrode::parse(&bytes[at..at + ELECTRODE_SIZE])
            })
            .collect();

        log::debug!(
            "CNT header parsed: channels={}, rate={}, samples={}, bytes_per_sample={}",
            num_channels,
            sample_rate,
            num_samples,
            bytes_per_sample
        );

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            header,
            electrodes,
        })
    }

    fn data_start(&self) -> usize {
        SETUP_SIZE + ELECTRODE_SIZE * self.header.num_channels
    }

    /// Samples per channel in one multiplexed block.
    fn block_samples(&self) -> usize {
        (self.header.channel_offset / self.header.bytes_per_sample).max(1)
    }

    fn raw_sample(&self, at: usize) -> i32 {
        if self.header.bytes_per_sample == 4 {
            read_i32(&self.bytes, at)
        } else {
            i16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]) as i32
        }
    }

    fn read_channel(&self, channel: usize) -> Vec<f64> {
        let h = &self.header;
        let nb = h.bytes_per_sample;
        let block = self.block_samples();
        let electrode = &self.electrodes[channel];
        let mut out = Vec::with_capacity(h.num_samples);

        let mut block_start = 0;
        while block_start < h.num_samples {
            let len = block.min(h.num_samples - block_start);
            let base = self.data_start() + block_start * h.num_channels * nb + channel * len * nb;
            out.extend((0..len).map(|j| electrode.scale(self.raw_sample(base + j * nb))));
            block_start += len;
        }
        out
    }

    fn file_sample(&self, offset: i64) -> usize {
        let h = &self.header;
        let frame = (h.num_channels * h.bytes_per_sample) as i64;
        ((offset - self.data_start() as i64) / frame - 1).max(0) as usize
    }

    pub fn events(&self) -> Result<Vec<CntEvent>> {
        let pos = self.header.event_table_pos;
        if pos + 9 > self.bytes.len() {
            return Ok(Vec::new());
        }
        let table_type = self.bytes[pos];
        let size = read_i32(&self.bytes, pos + 1).max(0) as usize;
        let offset = read_i32(&self.bytes, pos + 5).max(0) as usize;
        let record_size = match table_type {
            1 => TYPE1_EVENT_SIZE,
            2 | 3 => TYPE23_EVENT_SIZE,
            other => {
                return Err(TmrError::Parse(format!(
                    "CNT file {}: unknown event table type {}",
                    self.path.display(),
                    other
                )))
            }
        };

        let start = pos + 9 + offset;
        let end = (start + size).min(self.bytes.len());
        if start >= end {
            return Ok(Vec::new());
        }

        let frame = (self.header.num_channels * self.header.bytes_per_sample) as i64;
        Ok(self.bytes[start..end]
            .chunks_exact(record_size)
            .map(|r| {
                let mut file_offset = read_i32(r, 4) as i64;
                if table_type == 3 {
                    file_offset *= frame;
                }
                let latency = if record_size == TYPE23_EVENT_SIZE {
                    f32::from_le_bytes([r[12], r[13], r[14], r[15]]) as f64
                } else {
                    0.0
                };
                CntEvent {
                    stim_type: read_u16(r, 0),
                    sample: self.file_sample(file_offset),
                    latency,
                }
            })
            .collect())
    }

    fn start_time(&self) -> Option<String> {
        let stamp = format!("{} {}", self.header.date, self.header.time);
        NaiveDateTime::parse_from_str(&stamp, "%m/%d/%y %H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc().to_rfc3339())
    }

    fn labels(&self) -> Vec<String> {
        self.electrodes.iter().map(|e| e.label.clone()).collect()
    }
}

impl RecordingReader for CntReader {
    fn metadata(&self) -> Result<RecordingInfo> {
        let h = &self.header;
        Ok(RecordingInfo {
            file_path: self.path.display().to_string(),
            file_name: file_name_of(&self.path),
            file_size: self.bytes.len() as u64,
            sample_rate: h.sample_rate,
            num_channels: h.num_channels,
            num_samples: h.num_samples,
            duration: h.num_samples as f64 / h.sample_rate,
            channels: self.labels(),
            start_time: self.start_time(),
            file_type: "CNT".to_string(),
            num_annotations: self.events()?.len(),
        })
    }

    fn read_channels(&self, channels: Option<&[String]>) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
        let labels = self.labels();
        let selected = resolve_channel_indices(&labels, channels)?;
        let data = selected.par_iter().map(|&c| self.read_channel(c)).collect();
        let names = selected.iter().map(|&c| labels[c].clone()).collect();
        Ok((names, data))
    }

    fn annotations(&self) -> Result<Vec<Annotation>> {
        let sf = self.header.sample_rate;
        Ok(self
            .events()?
            .into_iter()
            .map(|e| Annotation {
                onset: e.sample as f64 / sf,
                duration: e.latency,
                description: e.stim_type.to_string(),
            })
            .collect())
    }

    fn format_name(&self) -> &str {
        "CNT"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a 16-bit, sample-multiplexed CNT file with a type-2 event table.
    /// `data` is `[channel][sample]` raw values; events are `(stim_type, sample)`.
    pub(crate) fn write_cnt(
        path: &Path,
        labels: &[&str],
        sample_rate: u16,
        data: &[Vec<i16>],
        events: &[(u16, usize)],
    ) {
        let nch = labels.len();
        let n = data[0].len();
        let data_start = SETUP_SIZE + ELECTRODE_SIZE * nch;
        let event_pos = data_start + n * nch * 2;

        let mut out = vec![0u8; SETUP_SIZE];
        out[DATE_OFFSET..DATE_OFFSET + 8].copy_from_slice(b"03/02/21");
        out[TIME_OFFSET..TIME_OFFSET + 8].copy_from_slice(b"22:30:00");
        out[NCHANNELS_OFFSET..NCHANNELS_OFFSET + 2].copy_from_slice(&(nch as u16).to_le_bytes());
        out[RATE_OFFSET..RATE_OFFSET + 2].copy_from_slice(&sample_rate.to_le_bytes());
        out[SAMPLES_OFFSET..SAMPLES_OFFSET + 4].copy_from_slice(&(n as i32).to_le_bytes());
        out[EVENT_TABLE_OFFSET..EVENT_TABLE_OFFSET + 4]
            .copy_from_slice(&(event_pos as i32).to_le_bytes());
        out[CHANNEL_OFFSET_OFFSET..CHANNEL_OFFSET_OFFSET + 4].copy_from_slice(&2i32.to_le_bytes());

        for label in labels {
            let mut e = vec![0u8; ELECTRODE_SIZE];
            e[..label.len()].copy_from_slice(label.as_bytes());
            e[47..49].copy_from_slice(&0i16.to_le_bytes());
            e[59..63].copy_from_slice(&1.0f32.to_le_bytes());
            e[71..75].copy_from_slice(&204.8f32.to_le_bytes());
            out.extend(e);
        }

        for i in 0..n {
            for channel in data {
                out.extend(channel[i].to_le_bytes());
            }
        }

        out.push(2);
        out.extend(((events.len() * TYPE23_EVENT_SIZE) as i32).to_le_bytes());
        out.extend(0i32.to_le_bytes());
        for &(stim, sample) in events {
            let mut r = vec![0u8; TYPE23_EVENT_SIZE];
            r[0..2].copy_from_slice(&stim.to_le_bytes());
            let offset = data_start + (sample + 1) * nch * 2;
            r[4..8].copy_from_slice(&(offset as i32).to_le_bytes());
            out.extend(r);
        }

        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_read_synthetic_cnt() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sub-001_ses-001_eeg.cnt");
        let a: Vec<i16> = (0..500).map(|i| i as i16).collect();
        let b: Vec<i16> = (0..500).map(|i| -(i as i16)).collect();
        write_cnt(&path, &["Cz", "RESP"], 100, &[a, b], &[(23, 10), (227, 250)]);

        let reader = CntReader::new(&path).unwrap();
        let info = reader.metadata().unwrap();
        assert_eq!(info.channels, vec!["Cz".to_string(), "RESP".to_string()]);
        assert_eq!(info.sample_rate, 100.0);
        assert_eq!(info.num_samples, 500);
        assert_eq!(info.start_time.as_deref(), Some("2021-03-02T22:30:00+00:00"));

        let (names, data) = reader
            .read_channels(Some(&["RESP".to_string()]))
            .unwrap();
        assert_eq!(names, vec!["RESP".to_string()]);
        assert!((data[0][42] + 42.0).abs() < 1e-3);

        let ann = reader.annotations().unwrap();
        assert_eq!(ann.len(), 2);
        assert_eq!(ann[0].description, "23");
        assert!((ann[0].onset - 0.10).abs() < 1e-9);
        assert!((ann[1].onset - 2.50).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_file_is_parse_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![0u8; 100]).unwrap();
        assert!(matches!(
            CntReader::new(tmp.path()),
            Err(TmrError::Parse(_))
        ));
    }

    #[test]
    fn test_electrode_scaling() {
        let e = CntElectrode {
            label: "Cz".to_string(),
            baseline: 10,
            sensitivity: 2.0,
            calibration: 204.8,
        };
        assert!((e.scale(15) - 10.0).abs() < 1e-4);
    }
}
