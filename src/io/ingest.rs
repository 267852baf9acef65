//! CSV ingest and centering.
//!
//! Turns the two long-format quantity-change CSVs into centered observations:
//!
//! - input changes: `industry, commodity, year, value`
//! - output changes: `industry, year, quantity_change`
//!
//! Values in the files are ratios around one; they are stored as `ratio - 1`.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **No modelling logic here**

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{InputChange, OUTPUT_COLUMN, OutputChange, SectorCode};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed records plus what was dropped along the way.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl<T> Ingested<T> {
    pub fn rows_used(&self) -> usize {
        self.records.len()
    }
}

/// Row errors logged individually before switching to a count.
const ROW_ERRORS_LOGGED: usize = 10;

pub fn load_input_changes(path: &Path) -> Result<Ingested<InputChange>, AppError> {
    load_csv(path, &["industry", "commodity", "year", "value"], |record, header_map| {
        Ok(InputChange {
            industry: parse_code(record, header_map, "industry")?,
            commodity: parse_code(record, header_map, "commodity")?,
            year: parse_year(get_required(record, header_map, "year")?)?,
            value: parse_ratio(get_required(record, header_map, "value")?)? - 1.0,
        })
    })
}

pub fn load_output_changes(path: &Path) -> Result<Ingested<OutputChange>, AppError> {
    load_csv(path, &["industry", "year", OUTPUT_COLUMN], |record, header_map| {
        Ok(OutputChange {
            industry: parse_code(record, header_map, "industry")?,
            year: parse_year(get_required(record, header_map, "year")?)?,
            value: parse_ratio(get_required(record, header_map, OUTPUT_COLUMN)?)? - 1.0,
        })
    })
}

fn load_csv<T, F>(path: &Path, required: &[&str], parse: F) -> Result<Ingested<T>, AppError>
where
    F: Fn(&StringRecord, &HashMap<String, usize>) -> Result<T, String>,
{
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of '{}': {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    for column in required {
        if !header_map.contains_key(*column) {
            return Err(AppError::new(
                2,
                format!("Missing required column `{column}` in '{}'.", path.display()),
            ));
        }
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse(&record, &header_map));
        match parsed {
            Ok(record) => records.push(record),
            Err(message) => {
                if row_errors.len() < ROW_ERRORS_LOGGED {
                    tracing::warn!(file = %path.display(), line, "{message}");
                }
                row_errors.push(RowError { line, message });
            }
        }
    }

    if row_errors.len() > ROW_ERRORS_LOGGED {
        tracing::warn!(
            file = %path.display(),
            suppressed = row_errors.len() - ROW_ERRORS_LOGGED,
            "further row errors not shown"
        );
    }

    if records.is_empty() {
        return Err(AppError::new(
            3,
            format!("No valid rows in '{}' ({rows_read} read).", path.display()),
        ));
    }

    tracing::info!(
        file = %path.display(),
        rows_read,
        rows_used = records.len(),
        row_errors = row_errors.len(),
        "loaded CSV"
    );

    Ok(Ingested {
        records,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    column: &str,
) -> Result<&'a str, String> {
    header_map
        .get(column)
        .and_then(|&idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{column}` value."))
}

fn parse_code(record: &StringRecord, header_map: &HashMap<String, usize>, column: &str) -> Result<SectorCode, String> {
    get_required(record, header_map, column).map(SectorCode::new)
}

/// Years may come through as `1964` or `1964.0` depending on the exporter.
fn parse_year(s: &str) -> Result<i32, String> {
    if let Ok(year) = s.parse::<i32>() {
        return Ok(year);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i32::MAX as f64 => Ok(v as i32),
        _ => Err(format!("Invalid year '{s}'.")),
    }
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid quantity-change ratio '{s}'.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::is_sentinel;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn input_changes_are_centered() {
        let file = write_temp(
            "\u{feff}Industry,Commodity,Year,Value\n\
             325,211,1964,1.25\n\
             325,331,1964.0,0\n",
        );
        let ingested = load_input_changes(file.path()).unwrap();
        assert_eq!(ingested.rows_used(), 2);

        let first = &ingested.records[0];
        assert_eq!(first.industry.as_str(), "325");
        assert_eq!(first.year, 1964);
        assert!((first.value - 0.25).abs() < 1e-12);
        assert!(is_sentinel(ingested.records[1].value));
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let file = write_temp(
            "industry,year,quantity_change\n\
             325,1964,1.02\n\
             325,,1.01\n\
             331,1965,abc\n",
        );
        let ingested = load_output_changes(file.path()).unwrap();
        assert_eq!(ingested.rows_read, 3);
        assert_eq!(ingested.rows_used(), 1);
        assert_eq!(ingested.row_errors.len(), 2);
        assert_eq!(ingested.row_errors[0].line, 3);
        assert!((ingested.records[0].value - 0.02).abs() < 1e-12);
    }

    #[test]
    fn missing_column_is_a_config_error() {
        let file = write_temp("industry,year,value\n325,1964,1.0\n");
        let err = load_output_changes(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("quantity_change"));
    }

    #[test]
    fn empty_file_is_a_no_data_error() {
        let file = write_temp("industry,commodity,year,value\n");
        assert_eq!(load_input_changes(file.path()).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = load_input_changes(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
