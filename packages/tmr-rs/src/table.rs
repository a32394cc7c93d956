//! CSV tables: string-keyed input tables and the result tables written by
//! the analyses.

use crate::error::{Result, TmrError};
use crate::stats::{TTestResult, WilcoxonResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

/// In-memory CSV table with string cells.
#[derive(Debug, Clone)]
pub struct Table {
    source: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TmrError::FileNotFound(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new().flexible(false).from_path(path)?;
        let headers = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(|c| c.trim().to_string()).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        let table = Self {
            source: crate::recording::file_name_of(path),
            headers,
            rows,
        };
        log::debug!(
            "Read {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            table.source
        );
        Ok(table)
    }

    pub fn from_records(source: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.to_string(),
            headers,
            rows,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TmrError::MissingColumn {
                column: name.to_string(),
                source_name: self.source.clone(),
            })
    }

    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Numeric column; empty cells become NaN.
    pub fn float_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .map(|cell| parse_float(cell, name, &self.source))
            .collect()
    }

    /// Number of distinct non-empty values in a column.
    pub fn unique_count(&self, name: &str) -> Result<usize> {
        Ok(self
            .column(name)?
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect::<BTreeSet<_>>()
            .len())
    }

    /// Count rows per `(index, columns)` level pair. Levels are sorted,
    /// numerically when every level is a number.
    pub fn crosstab(&self, index: &str, columns: &str) -> Result<CrossTab> {
        let rows = self.column(index)?;
        let cols = self.column(columns)?;
        let row_labels = sorted_levels(&rows);
        let col_labels = sorted_levels(&cols);

        let mut counts = vec![vec![0.0; col_labels.len()]; row_labels.len()];
        for (r, c) in rows.iter().zip(&cols) {
            let i = row_labels.iter().position(|l| l == r);
            let j = col_labels.iter().position(|l| l == c);
            if let (Some(i), Some(j)) = (i, j) {
                counts[i][j] += 1.0;
            }
        }

        Ok(CrossTab {
            row_name: index.to_string(),
            col_name: columns.to_string(),
            row_labels,
            col_labels,
            counts,
        })
    }
}

pub(crate) fn parse_float(cell: &str, column: &str, source: &str) -> Result<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        TmrError::Parse(format!(
            "{}: value '{}' in column '{}' is not a number",
            source, cell, column
        ))
    })
}

fn sorted_levels(values: &[&str]) -> Vec<String> {
    let mut levels: Vec<String> = values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.parse::<f64>().ok()).collect();
    if let Some(keys) = numeric {
        let mut pairs: Vec<(f64, String)> = keys.into_iter().zip(levels).collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        levels = pairs.into_iter().map(|(_, l)| l).collect();
    }
    levels
}

/// Contingency table of counts.
#[derive(Debug, Clone, Serialize)]
pub struct CrossTab {
    pub row_name: String,
    pub col_name: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// `counts[row][col]`
    pub counts: Vec<Vec<f64>>,
}

/// Numeric table with a labelled row index, e.g. measures x conditions or
/// subjects x conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable {
    pub index: Vec<String>,
    pub columns: Vec<String>,
    /// `values[row][column]`
    pub values: Vec<Vec<f64>>,
}

/// One row of a melted table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRecord {
    pub id: String,
    pub condition: String,
    pub value: f64,
}

impl WideTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            index: Vec::new(),
            columns,
            values: Vec::new(),
        }
    }

    pub fn push_row(&mut self, label: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(TmrError::InvalidParameter(format!(
                "row '{}' has {} values for {} columns",
                label,
                values.len(),
                self.columns.len()
            )));
        }
        self.index.push(label.to_string());
        self.values.push(values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TmrError::MissingColumn {
                column: name.to_string(),
                source_name: "table".to_string(),
            })?;
        Ok(self.values.iter().map(|row| row[j]).collect())
    }

    /// Wide to long: one record per `(row, condition)`, grouped by condition
    /// in the order given.
    pub fn melt(&self, value_vars: &[&str]) -> Result<Vec<LongRecord>> {
        let mut records = Vec::with_capacity(self.len() * value_vars.len());
        for var in value_vars {
            let values = self.column(var)?;
            records.extend(self.index.iter().zip(values).map(|(id, value)| LongRecord {
                id: id.clone(),
                condition: var.to_string(),
                value,
            }));
        }
        Ok(records)
    }

    /// Write with `index_label` heading the index column. NaN cells are empty.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, index_label: &str) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header = vec![index_label.to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for (label, row) in self.index.iter().zip(&self.values) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| format_float(*v)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Shortest round-trip representation; integral values keep a trailing
/// `.0`, NaN is written as an empty cell.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// `Statistic,Value` table with fixed six-decimal values.
pub fn write_statistic_table<P: AsRef<Path>>(path: P, rows: &[(&str, f64)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["Statistic", "Value"])?;
    for (name, value) in rows {
        writer.write_record([name.to_string(), format!("{:.6}", value)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ttest<P: AsRef<Path>>(path: P, result: &TTestResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "", "T", "dof", "alternative", "p-val", "CI95%", "cohen-d", "BF10", "power",
    ])?;
    writer.write_record([
        "T-test".to_string(),
        format_float(result.t),
        format!("{}", result.dof),
        result.alternative.clone(),
        format_float(result.p_value),
        result.ci95_label(),
        format_float(result.cohen_d),
        result.bf10_label(),
        format_float(result.power),
    ])?;
    writer.flush()?;
    Ok(())
}

pub fn write_wilcoxon<P: AsRef<Path>>(path: P, result: &WilcoxonResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["", "W-val", "alternative", "p-val", "RBC", "CLES"])?;
    writer.write_record([
        "Wilcoxon".to_string(),
        format_float(result.w),
        result.alternative.clone(),
        format_float(result.p_value),
        format_float(result.rbc),
        format_float(result.cles),
    ])?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn test_crosstab_counts_sorted_levels() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "t.csv",
            "participant_id,had_lucid,tmr_condition\n1,1,svp\n2,0,bct\n3,0,svp\n4,1,bct\n5,1,bct\n",
        );
        let table = Table::read_csv(&path).unwrap();
        let ct = table.crosstab("had_lucid", "tmr_condition").unwrap();
        assert_eq!(ct.row_labels, vec!["0", "1"]);
        assert_eq!(ct.col_labels, vec!["bct", "svp"]);
        assert_eq!(ct.counts, vec![vec![1.0, 1.0], vec![2.0, 1.0]]);
        assert_eq!(table.unique_count("participant_id").unwrap(), 5);
    }

    #[test]
    fn test_unique_count_skips_blank_cells() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "t.csv",
            "participant_id,had_lucid,tmr_condition\n1,1,svp\n2,0,bct\n,0,svp\n3,1,bct\n,1,bct\n4,0,svp\n2,1,svp\n",
        );
        let table = Table::read_csv(&path).unwrap();
        assert_eq!(table.unique_count("participant_id").unwrap(), 4);
    }

    #[test]
    fn test_numeric_levels_sort_numerically() {
        assert_eq!(sorted_levels(&["10", "9", "2"]), vec!["2", "9", "10"]);
        assert_eq!(sorted_levels(&["b", "a", ""]), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_column() {
        let table = Table::from_records("x.csv", vec!["a".to_string()], vec![vec!["1".to_string()]]);
        assert!(matches!(
            table.column("b"),
            Err(TmrError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_melt_emits_every_value_once() {
        let mut wide = WideTable::new(vec!["cue".to_string(), "uncued".to_string()]);
        wide.push_row("1", vec![0.1, 0.2]).unwrap();
        wide.push_row("2", vec![0.3, 0.4]).unwrap();
        wide.push_row("3", vec![0.5, 0.6]).unwrap();

        let long = wide.melt(&["cue", "uncued"]).unwrap();
        assert_eq!(long.len(), 6);
        assert!(long[..3].iter().all(|r| r.condition == "cue"));
        assert!(long[3..].iter().all(|r| r.condition == "uncued"));
        let mut values: Vec<f64> = long.iter().map(|r| r.value).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_wide_table_csv_writes_nan_as_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut wide = WideTable::new(vec!["bct".to_string(), "cue".to_string()]);
        wide.push_row("RRV_SDBB", vec![1.5, f64::NAN]).unwrap();
        let path = tmp.path().join("out.csv");
        wide.write_csv(&path, "measure").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "measure,bct,cue\nRRV_SDBB,1.5,\n");
    }

    #[test]
    fn test_statistic_table_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("chi.csv");
        write_statistic_table(&path, &[("DOF", 1.0), ("P Value", 0.0271)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Statistic,Value\nDOF,1.000000\nP Value,0.027100\n");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::NAN), "");
    }
}
