//! Result tables and synthetic panels as CSV.
//!
//! Both result tables share one layout: `industry, year_range, rmse`, then one
//! column per commodity code, then `quantity_change`. The coefficient table can
//! be read back so a run can be re-categorized without retraining.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{InputChange, LabelSet, OUTPUT_COLUMN, OutputChange, Predictor, SectorCode};
use crate::error::AppError;
use crate::report::{CategorizedRow, ResultRow, ResultTable};

const KEY_COLUMNS: [&str; 3] = ["industry", "year_range", "rmse"];

/// Output file locations for one focus commodity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub coefficients: PathBuf,
    pub categorization: PathBuf,
    pub manifest: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, focus: &SectorCode) -> Self {
        Self {
            coefficients: dir.join(format!("coefficient_results_focus{focus}.csv")),
            categorization: dir.join(format!("categorization_results_focus{focus}.csv")),
            manifest: dir.join(format!("run_focus{focus}.json")),
        }
    }
}

fn create_writer(path: &Path, what: &str) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_err(path: &Path) -> impl Fn(csv::Error) -> AppError + '_ {
    move |e| AppError::new(2, format!("Failed to write '{}': {e}", path.display()))
}

fn header(columns: &[Predictor]) -> Vec<String> {
    KEY_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(columns.iter().map(|c| c.column_name().to_string()))
        .collect()
}

pub fn write_coefficient_table(path: &Path, table: &ResultTable) -> Result<(), AppError> {
    let mut writer = create_writer(path, "coefficient table")?;
    writer.write_record(header(table.columns())).map_err(write_err(path))?;

    for row in table.rows() {
        let mut record = vec![row.industry.to_string(), row.year_range.clone(), row.rmse.to_string()];
        record.extend(row.slopes.iter().map(f64::to_string));
        writer.write_record(&record).map_err(write_err(path))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))
}

pub fn write_categorization_table(
    path: &Path,
    columns: &[Predictor],
    rows: &[CategorizedRow],
    labels: &LabelSet,
) -> Result<(), AppError> {
    let mut writer = create_writer(path, "categorization table")?;
    writer.write_record(header(columns)).map_err(write_err(path))?;

    for row in rows {
        let mut record = vec![row.industry.to_string(), row.year_range.clone(), row.rmse.to_string()];
        record.extend(row.labels.iter().map(|&l| labels.render(l).to_string()));
        writer.write_record(&record).map_err(write_err(path))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))
}

/// Read a coefficient table written by [`write_coefficient_table`].
pub fn read_coefficient_table(path: &Path) -> Result<ResultTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to open coefficient table '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read headers of '{}': {e}", path.display())))?
        .clone();
    let names: Vec<&str> = headers.iter().map(|h| h.trim_start_matches('\u{feff}')).collect();
    if names.len() <= KEY_COLUMNS.len() || names[..KEY_COLUMNS.len()] != KEY_COLUMNS {
        return Err(AppError::new(
            2,
            format!(
                "'{}' is not a coefficient table (expected columns {} followed by predictors).",
                path.display(),
                KEY_COLUMNS.join(", ")
            ),
        ));
    }
    if names.last() != Some(&OUTPUT_COLUMN) {
        tracing::warn!(file = %path.display(), "coefficient table does not end with `{OUTPUT_COLUMN}`");
    }

    let columns: Vec<Predictor> = names[KEY_COLUMNS.len()..]
        .iter()
        .map(|n| Predictor::from_column_name(n))
        .collect();
    let mut table = ResultTable::with_columns(columns);

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::new(2, format!("{}:{line}: CSV parse error: {e}", path.display())))?;
        let number = |i: usize| -> Result<f64, AppError> {
            let raw = record.get(i).unwrap_or("");
            raw.parse::<f64>().map_err(|_| {
                AppError::new(2, format!("{}:{line}: invalid number '{raw}'.", path.display()))
            })
        };

        let slopes = (KEY_COLUMNS.len()..record.len()).map(number).collect::<Result<Vec<_>, _>>()?;
        table.push_row(ResultRow {
            industry: SectorCode::new(record.get(0).unwrap_or("")),
            year_range: record.get(1).unwrap_or("").to_string(),
            rmse: number(2)?,
            slopes,
        })?;
    }

    if table.is_empty() {
        return Err(AppError::new(3, format!("Coefficient table '{}' has no rows.", path.display())));
    }
    Ok(table)
}

/// Write input observations in the on-disk ratio form (`value + 1`).
pub fn write_input_changes(path: &Path, inputs: &[InputChange]) -> Result<(), AppError> {
    let mut writer = create_writer(path, "input CSV")?;
    writer
        .write_record(["industry", "commodity", "year", "value"])
        .map_err(write_err(path))?;
    for obs in inputs {
        writer
            .write_record([
                obs.industry.to_string(),
                obs.commodity.to_string(),
                obs.year.to_string(),
                (obs.value + 1.0).to_string(),
            ])
            .map_err(write_err(path))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))
}

/// Write output observations in the on-disk ratio form (`value + 1`).
pub fn write_output_changes(path: &Path, outputs: &[OutputChange]) -> Result<(), AppError> {
    let mut writer = create_writer(path, "output CSV")?;
    writer
        .write_record(["industry", "year", OUTPUT_COLUMN])
        .map_err(write_err(path))?;
    for obs in outputs {
        writer
            .write_record([obs.industry.to_string(), obs.year.to_string(), (obs.value + 1.0).to_string()])
            .map_err(write_err(path))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))
}
