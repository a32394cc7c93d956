//! Synthetic recordings for tests of this crate and of the command line.

use std::path::Path;

const ANNOTATION_LABEL: &str = "EDF Annotations";
/// Bytes per record reserved for the annotation channel.
const TAL_BYTES: usize = 64;

fn field(s: &str, size: usize) -> Vec<u8> {
    let mut buf = vec![b' '; size];
    let n = s.len().min(size);
    buf[..n].copy_from_slice(&s.as_bytes()[..n]);
    buf
}

/// Write an EDF file with one-second records and µV channels whose digital
/// range equals the physical range.
///
/// All channels must hold the same whole number of seconds. With
/// `annotations` (onset in seconds, text) the file becomes EDF+ with an
/// annotation channel; without, it is plain EDF.
pub fn write_edf(
    path: &Path,
    sample_rate: usize,
    channels: &[(&str, &[i16])],
    annotations: &[(f64, &str)],
) -> std::io::Result<()> {
    let with_tal = !annotations.is_empty();
    let n_records = channels.first().map_or(0, |(_, s)| s.len() / sample_rate);
    let ns = channels.len() + with_tal as usize;

    let mut out = Vec::new();
    out.extend(field("0", 8));
    out.extend(field("X X X X", 80));
    out.extend(field("Startdate X X X X", 80));
    out.extend(field("02.03.21", 8));
    out.extend(field("22.30.00", 8));
    out.extend(field(&(256 * (ns + 1)).to_string(), 8));
    out.extend(field(if with_tal { "EDF+C" } else { "" }, 44));
    out.extend(field(&n_records.to_string(), 8));
    out.extend(field("1", 8));
    out.extend(field(&ns.to_string(), 4));

    for (label, _) in channels {
        out.extend(field(label, 16));
    }
    if with_tal {
        out.extend(field(ANNOTATION_LABEL, 16));
    }
    // Per-signal fields: data channels first, then the annotation channel.
    let mut signal_field = |data: &str, tal: &str, size: usize| {
        for _ in channels {
            out.extend(field(data, size));
        }
        if with_tal {
            out.extend(field(tal, size));
        }
    };
    signal_field("", "", 80);
    signal_field("uV", "", 8);
    signal_field("-32768", "-1", 8);
    signal_field("32767", "1", 8);
    signal_field("-32768", "-32768", 8);
    signal_field("32767", "32767", 8);
    signal_field("", "", 80);
    signal_field(&sample_rate.to_string(), &(TAL_BYTES / 2).to_string(), 8);
    signal_field("", "", 32);

    for r in 0..n_records {
        for (_, samples) in channels {
            for s in &samples[r * sample_rate..(r + 1) * sample_rate] {
                out.extend(s.to_le_bytes());
            }
        }
        if with_tal {
            let mut tal = format!("+{}\u{14}\u{14}\u{0}", r).into_bytes();
            for (onset, text) in annotations {
                if onset.floor() as usize == r {
                    tal.extend(format!("+{}\u{14}{}\u{14}\u{0}", onset, text).into_bytes());
                }
            }
            tal.resize(TAL_BYTES, 0);
            out.extend(tal);
        }
    }

    std::fs::write(path, out)
}
