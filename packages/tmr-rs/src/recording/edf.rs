// EDF / EDF+ (European Data Format) reader
// Specification: https://www.edfplus.info/specs/edf.html

use super::{file_name_of, resolve_channel_indices, Annotation, RecordingInfo, RecordingReader};
use crate::error::{Result, TmrError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const ANNOTATION_LABEL: &str = "EDF Annotations";

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,              // 8 bytes: version of this data format (0)
    pub patient_id: String,           // 80 bytes: local patient identification
    pub recording_id: String,         // 80 bytes: local recording identification
    pub start_date: String,           // 8 bytes: startdate of recording (dd.mm.yy)
    pub start_time: String,           // 8 bytes: starttime of recording (hh.mm.ss)
    pub header_bytes: usize,          // 8 bytes: number of bytes in header record
    pub reserved: String,             // 44 bytes: "EDF+C"/"EDF+D" for EDF+
    pub num_data_records: i64,        // 8 bytes: number of data records (-1 if unknown)
    pub duration_of_data_record: f64, // 8 bytes: duration of a data record, in seconds
    pub num_signals: usize,           // 4 bytes: number of signals (channels)
}

#[derive(Debug, Clone)]
pub struct EdfSignalHeader {
    pub label: String,
    pub transducer_type: String,
    pub physical_dimension: String,
    pub physical_minimum: f64,
    pub physical_maximum: f64,
    pub digital_minimum: i64,
    pub digital_maximum: i64,
    pub prefiltering: String,
    pub num_samples_per_record: usize,
}

impl EdfSignalHeader {
    pub fn sample_frequency(&self, record_duration: f64) -> f64 {
        self.num_samples_per_record as f64 / record_duration
    }

    pub fn gain(&self) -> f64 {
        (self.physical_maximum - self.physical_minimum)
            / (self.digital_maximum - self.digital_minimum) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_maximum - self.gain() * self.digital_maximum as f64
    }

    /// Factor converting the physical unit to µV.
    pub fn to_microvolts(&self) -> f64 {
        match self.physical_dimension.trim() {
            "V" => 1e6,
            "mV" => 1e3,
            "nV" => 1e-3,
            _ => 1.0,
        }
    }

    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }
}

/// Convert EDF `dd.mm.yy` + `hh.mm.ss` to RFC 3339 (years 85-99 map to 19xx).
pub fn parse_edf_datetime(date: &str, time: &str) -> Option<String> {
    let d: Vec<u32> = date
        .split('.')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    let t: Vec<u32> = time
        .split('.')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if d.len() != 3 || t.len() != 3 {
        return None;
    }
    let year = if d[2] >= 85 { 1900 + d[2] } else { 2000 + d[2] };
    let date = NaiveDate::from_ymd_opt(year as i32, d[1], d[0])?;
    let time = NaiveTime::from_hms_opt(t[0], t[1], t[2])?;
    Some(NaiveDateTime::new(date, time).and_utc().to_rfc3339())
}

pub struct EdfReader {
    path: PathBuf,
    pub header: EdfHeader,
    pub signal_headers: Vec<EdfSignalHeader>,
}

impl EdfReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = Self::read_header(&mut reader)?;
        let signal_headers = Self::read_signal_headers(&mut reader, header.num_signals)?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            signal_headers,
        })
    }

    fn read_fixed_string<R: Read>(reader: &mut R, size: usize) -> Result<String> {
        let mut buffer = vec![0u8; size];
        reader.read_exact(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).trim().to_string())
    }

    fn read_number<R: Read, T: std::str::FromStr>(
        reader: &mut R,
        size: usize,
        field: &str,
    ) -> Result<T> {
        let s = Self::read_fixed_string(reader, size)?;
        s.parse::<T>()
            .map_err(|_| TmrError::Parse(format!("EDF header: invalid {} '{}'", field, s)))
    }

    fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader> {
        let version = Self::read_fixed_string(reader, 8)?;
        let patient_id = Self::read_fixed_string(reader, 80)?;
        let recording_id = Self::read_fixed_string(reader, 80)?;
        let start_date = Self::read_fixed_string(reader, 8)?;
        let start_time = Self::read_fixed_string(reader, 8)?;
        let header_bytes = Self::read_number(reader, 8, "header size")?;
        let reserved = Self::read_fixed_string(reader, 44)?;
        let num_data_records = Self::read_number(reader, 8, "number of data records")?;
        let duration_of_data_record: f64 = Self::read_number(reader, 8, "record duration")?;
        let num_signals = Self::read_number(reader, 4, "number of signals")?;

        if duration_of_data_record <= 0.0 {
            return Err(TmrError::Parse(format!(
                "EDF header: record duration must be positive, got {}",
                duration_of_data_record
            )));
        }

        log::debug!(
            "EDF header parsed: num_data_records={}, duration_of_data_record={}, num_signals={}",
            num_data_records,
            duration_of_data_record,
            num_signals
        );

        Ok(EdfHeader {
            version,
            patient_id,
            recording_id,
            start_date,
            start_time,
            header_bytes,
            reserved,
            num_data_records,
            duration_of_data_record,
            num_signals,
        })
    }

    fn read_signal_headers<R: Read>(reader: &mut R, ns: usize) -> Result<Vec<EdfSignalHeader>> {
        // Fields are stored column-wise: every signal's label, then every
        // signal's transducer, and so on.
        let strings = |reader: &mut R, size: usize| -> Result<Vec<String>> {
            (0..ns).map(|_| Self::read_fixed_string(reader, size)).collect()
        };
        let labels = strings(reader, 16)?;
        let transducers = strings(reader, 80)?;
        let dimensions = strings(reader, 8)?;
        let physical_minimums: Vec<f64> = (0..ns)
            .map(|_| Self::read_number(reader, 8, "physical minimum"))
            .collect::<Result<_>>()?;
        let physical_maximums: Vec<f64> = (0..ns)
            .map(|_| Self::read_number(reader, 8, "physical maximum"))
            .collect::<Result<_>>()?;
        let digital_minimums: Vec<i64> = (0..ns)
            .map(|_| Self::read_number(reader, 8, "digital minimum"))
            .collect::<Result<_>>()?;
        let digital_maximums: Vec<i64> = (0..ns)
            .map(|_| Self::read_number(reader, 8, "digital maximum"))
            .collect::<Result<_>>()?;
        let prefilterings = strings(reader, 80)?;
        let samples: Vec<usize> = (0..ns)
            .map(|_| Self::read_number(reader, 8, "samples per record"))
            .collect::<Result<_>>()?;
        let _reserved = strings(reader, 32)?;

        Ok((0..ns)
            .map(|i| EdfSignalHeader {
                label: labels[i].clone(),
                transducer_type: transducers[i].clone(),
                physical_dimension: dimensions[i].clone(),
                physical_minimum: physical_minimums[i],
                physical_maximum: physical_maximums[i],
                digital_minimum: digital_minimums[i],
                digital_maximum: digital_maximums[i],
                prefiltering: prefilterings[i].clone(),
                num_samples_per_record: samples[i],
            })
            .collect())
    }

    fn data_signal_indices(&self) -> Vec<usize> {
        (0..self.signal_headers.len())
            .filter(|&i| !self.signal_headers[i].is_annotation())
            .collect()
    }

    fn record_size_bytes(&self) -> usize {
        self.signal_headers
            .iter()
            .map(|sh| sh.num_samples_per_record * 2)
            .sum()
    }

    /// Byte offset of every signal inside one data record.
    fn signal_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.signal_headers.len());
        let mut acc = 0;
        for sh in &self.signal_headers {
            offsets.push(acc);
            acc += sh.num_samples_per_record * 2;
        }
        offsets
    }

    /// Number of complete records, also when the header says -1.
    fn num_records(&self) -> Result<usize> {
        if self.header.num_data_records >= 0 {
            return Ok(self.header.num_data_records as usize);
        }
        let file_size = std::fs::metadata(&self.path)?.len() as usize;
        let record_size = self.record_size_bytes().max(1);
        Ok(file_size.saturating_sub(self.header.header_bytes) / record_size)
    }

    /// Visit every data record as raw bytes.
    fn for_each_record<F: FnMut(&[u8]) -> Result<()>>(&self, mut visit: F) -> Result<()> {
        let mut file = BufReader::new(File::open(&self.path)?);
        file.seek(SeekFrom::Start(self.header.header_bytes as u64))?;
        let mut record = vec![0u8; self.record_size_bytes()];
        for _ in 0..self.num_records()? {
            file.read_exact(&mut record)?;
            visit(&record)?;
        }
        Ok(())
    }

    fn sample_rate(&self) -> Result<f64> {
        let data = self.data_signal_indices();
        let first = data
            .first()
            .ok_or_else(|| TmrError::Parse("EDF file has no data signals".to_string()))?;
        Ok(self.signal_headers[*first].sample_frequency(self.header.duration_of_data_record))
    }
}

/// Parse the time-stamped annotation lists of one record.
fn parse_tal(bytes: &[u8]) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    for tal in bytes.split(|&b| b == 0).filter(|t| !t.is_empty()) {
        let mut fields = tal.split(|&b| b == 0x14);
        let Some(timing) = fields.next() else {
            continue;
        };
        let timing = String::from_utf8_lossy(timing);
        let mut timing = timing.split('\u{15}');
        let Some(onset) = timing.next().and_then(|s| s.trim().parse::<f64>().ok()) else {
            continue;
        };
        let duration = timing
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        for text in fields.filter(|f| !f.is_empty()) {
            annotations.push(Annotation {
                onset,
                duration,
                description: String::from_utf8_lossy(text).trim().to_string(),
            });
        }
    }
    annotations
}

impl RecordingReader for EdfReader {
    fn metadata(&self) -> Result<RecordingInfo> {
        let data = self.data_signal_indices();
        let channels: Vec<String> = data
            .iter()
            .map(|&i| self.signal_headers[i].label.clone())
            .collect();
        let num_records = self.num_records()?;
        let num_samples = data
            .first()
            .map(|&i| num_records * self.signal_headers[i].num_samples_per_record)
            .unwrap_or(0);

        Ok(RecordingInfo {
            file_path: self.path.display().to_string(),
            file_name: file_name_of(&self.path),
            file_size: std::fs::metadata(&self.path)?.len(),
            sample_rate: self.sample_rate()?,
            num_channels: channels.len(),
            num_samples,
            duration: num_records as f64 * self.header.duration_of_data_record,
            channels,
            start_time: parse_edf_datetime(&self.header.start_date, &self.header.start_time),
            file_type: if self.header.reserved.starts_with("EDF+") {
                "EDF+".to_string()
            } else {
                "EDF".to_string()
            },
            num_annotations: self.annotations()?.len(),
        })
    }

    fn read_channels(&self, channels: Option<&[String]>) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
        let data_signals = self.data_signal_indices();
        let labels: Vec<String> = data_signals
            .iter()
            .map(|&i| self.signal_headers[i].label.clone())
            .collect();
        let selected: Vec<usize> = resolve_channel_indices(&labels, channels)?
            .into_iter()
            .map(|i| data_signals[i])
            .collect();

        let sample_rate = self.sample_rate()?;
        for &i in &selected {
            let sf = self.signal_headers[i].sample_frequency(self.header.duration_of_data_record);
            if (sf - sample_rate).abs() > 1e-9 {
                return Err(TmrError::InvalidParameter(format!(
                    "Channel '{}' is sampled at {} Hz, expected {} Hz",
                    self.signal_headers[i].label, sf, sample_rate
                )));
            }
        }

        let offsets = self.signal_offsets();
        let mut digital: Vec<Vec<i16>> = vec![Vec::new(); selected.len()];
        self.for_each_record(|record| {
            for (out, &sig) in digital.iter_mut().zip(&selected) {
                let start = offsets[sig];
                let n = self.signal_headers[sig].num_samples_per_record;
                out.extend(
                    record[start..start + 2 * n]
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]])),
                );
            }
            Ok(())
        })?;

        // Parallel conversion of digital to physical values across channels
        let data: Vec<Vec<f64>> = digital
            .par_iter()
            .zip(selected.par_iter())
            .map(|(samples, &sig)| {
                let sh = &self.signal_headers[sig];
                let gain = sh.gain();
                let offset = sh.offset();
                let scale = sh.to_microvolts();
                samples
                    .iter()
                    .map(|&d| (gain * d as f64 + offset) * scale)
                    .collect()
            })
            .collect();

        let names = selected
            .iter()
            .map(|&i| self.signal_headers[i].label.clone())
            .collect();
        Ok((names, data))
    }

    fn annotations(&self) -> Result<Vec<Annotation>> {
        let Some(sig) = self.signal_headers.iter().position(|sh| sh.is_annotation()) else {
            return Ok(Vec::new());
        };
        let start = self.signal_offsets()[sig];
        let len = self.signal_headers[sig].num_samples_per_record * 2;
        let mut annotations = Vec::new();
        self.for_each_record(|record| {
            annotations.extend(parse_tal(&record[start..start + len]));
            Ok(())
        })?;
        Ok(annotations)
    }

    fn format_name(&self) -> &str {
        "EDF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_edf;

    #[test]
    fn test_signal_header_calculations() {
        let header = EdfSignalHeader {
            label: "Test".to_string(),
            transducer_type: "".to_string(),
            physical_dimension: "uV".to_string(),
            physical_minimum: -100.0,
            physical_maximum: 100.0,
            digital_minimum: -32768,
            digital_maximum: 32767,
            prefiltering: "".to_string(),
            num_samples_per_record: 256,
        };

        assert_eq!(header.sample_frequency(1.0), 256.0);
        assert!((header.gain() - 0.00305).abs() < 0.001);
        assert_eq!(header.to_microvolts(), 1.0);
    }

    #[test]
    fn test_parse_edf_datetime() {
        assert_eq!(
            parse_edf_datetime("02.03.21", "22.30.00").as_deref(),
            Some("2021-03-02T22:30:00+00:00")
        );
        assert!(parse_edf_datetime("99.99.99", "00.00.00").is_none());
    }

    #[test]
    fn test_parse_tal() {
        let bytes = b"+0\x14\x14\x00+12.5\x1530\x14Stimulus 227\x14\x00\x00\x00";
        let ann = parse_tal(bytes);
        assert_eq!(ann.len(), 1);
        assert_eq!(ann[0].onset, 12.5);
        assert_eq!(ann[0].duration, 30.0);
        assert_eq!(ann[0].description, "Stimulus 227");
    }

    #[test]
    fn test_read_synthetic_edf() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("night.edf");
        let samples: Vec<i16> = (0..300).map(|i| i as i16).collect();
        write_edf(&path, 100, &[("RESP", &samples[..])], &[(1.5, "23"), (2.25, "227")]).unwrap();

        let reader = EdfReader::new(&path).unwrap();
        let info = reader.metadata().unwrap();
        assert_eq!(info.channels, vec!["RESP".to_string()]);
        assert_eq!(info.sample_rate, 100.0);
        assert_eq!(info.num_samples, 300);
        assert_eq!(info.file_type, "EDF+");
        assert_eq!(info.num_annotations, 2);

        let (names, data) = reader.read_channels(None).unwrap();
        assert_eq!(names, vec!["RESP".to_string()]);
        // Digital and physical ranges coincide, so values pass through.
        assert!((data[0][123] - 123.0).abs() < 1e-6);

        let ann = reader.annotations().unwrap();
        assert_eq!(ann[1].onset, 2.25);
        assert_eq!(ann[1].description, "227");

        let missing = reader.read_channels(Some(&["EMG".to_string()]));
        assert!(matches!(missing, Err(TmrError::MissingChannel(_))));
    }
}
