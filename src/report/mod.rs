//! Result accumulation and terminal formatting.
//!
//! `ResultTable` is the append-only record of every unit that trained: one row
//! per (industry, year-range) in processing order, with one slope per column.
//! The column set is fixed for the run (every commodity code, then the output
//! change), so predictors a unit could not use are written as 0.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Label, Predictor, SectorCode};
use crate::error::{AppError, UnitError};
use crate::fit::Threshold;

pub mod format;

pub use format::*;

/// Slopes for one trained unit, aligned with `ResultTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub industry: SectorCode,
    /// Range label, `first:last`.
    pub year_range: String,
    pub rmse: f64,
    pub slopes: Vec<f64>,
}

/// Labels for one row, aligned with `ResultTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedRow {
    pub industry: SectorCode,
    pub year_range: String,
    pub rmse: f64,
    pub labels: Vec<Label>,
}

impl CategorizedRow {
    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|l| **l == label).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<Predictor>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Empty table whose columns are `commodities` (sorted) followed by the output change.
    pub fn new(commodities: &BTreeSet<SectorCode>) -> Self {
        let mut columns: Vec<Predictor> = commodities.iter().cloned().map(Predictor::Commodity).collect();
        columns.push(Predictor::OutputChange);
        Self::with_columns(columns)
    }

    pub fn with_columns(columns: Vec<Predictor>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Predictor] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a unit's slopes. Columns without a slope are filled with 0.
    pub fn push(&mut self, industry: &SectorCode, year_range: &str, rmse: f64, slopes: &BTreeMap<Predictor, f64>) {
        debug_assert!(slopes.keys().all(|p| self.columns.contains(p)));
        let slopes = self
            .columns
            .iter()
            .map(|c| slopes.get(c).copied().unwrap_or(0.0))
            .collect();
        self.rows.push(ResultRow {
            industry: industry.clone(),
            year_range: year_range.to_string(),
            rmse,
            slopes,
        });
    }

    /// Append a fully formed row (e.g. read back from disk).
    pub fn push_row(&mut self, row: ResultRow) -> Result<(), AppError> {
        if row.slopes.len() != self.columns.len() {
            return Err(AppError::new(
                2,
                format!(
                    "Row for industry {} ({}) has {} slopes; expected {}.",
                    row.industry,
                    row.year_range,
                    row.slopes.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Label every slope of every row against that row's `rmse / divisor`.
    pub fn categorize(&self, divisor: f64) -> Result<Vec<CategorizedRow>, AppError> {
        self.rows
            .iter()
            .map(|row| {
                categorize_row(row, divisor).map_err(|e| {
                    AppError::new(
                        4,
                        format!("Cannot categorize industry {} ({}): {e}", row.industry, row.year_range),
                    )
                })
            })
            .collect()
    }
}

pub fn categorize_row(row: &ResultRow, divisor: f64) -> Result<CategorizedRow, UnitError> {
    let threshold = Threshold::from_rmse(row.rmse, divisor)?;
    Ok(CategorizedRow {
        industry: row.industry.clone(),
        year_range: row.year_range.clone(),
        rmse: row.rmse,
        labels: row.slopes.iter().map(|&s| threshold.classify(s)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commodities() -> BTreeSet<SectorCode> {
        ["331", "211", "324"].into_iter().map(SectorCode::new).collect()
    }

    #[test]
    fn columns_are_sorted_commodities_then_output() {
        let table = ResultTable::new(&commodities());
        let names: Vec<&str> = table.columns().iter().map(Predictor::column_name).collect();
        assert_eq!(names, vec!["211", "324", "331", "quantity_change"]);
    }

    #[test]
    fn push_zero_fills_unused_predictors() {
        let mut table = ResultTable::new(&commodities());
        let slopes = BTreeMap::from([
            (Predictor::Commodity("211".into()), -0.3),
            (Predictor::OutputChange, 0.05),
        ]);
        table.push(&"325".into(), "1964:2016", 0.2, &slopes);

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].slopes, vec![-0.3, 0.0, 0.0, 0.05]);
    }

    #[test]
    fn categorize_applies_the_row_threshold() {
        let mut table = ResultTable::new(&commodities());
        let slopes = BTreeMap::from([
            (Predictor::Commodity("211".into()), -0.3),
            (Predictor::Commodity("331".into()), 0.05),
            (Predictor::OutputChange, 0.01),
        ]);
        table.push(&"325".into(), "2000:2010", 0.2, &slopes);

        let rows = table.categorize(4.0).unwrap();
        assert_eq!(
            rows[0].labels,
            vec![Label::Substitute, Label::Neither, Label::Complement, Label::Neither]
        );
        assert_eq!(rows[0].count(Label::Complement), 1);
        assert_eq!(rows[0].count(Label::Substitute), 1);
    }

    #[test]
    fn degenerate_rows_cannot_be_categorized() {
        let mut table = ResultTable::new(&commodities());
        table.push(&"325".into(), "2000:2010", 0.0, &BTreeMap::new());
        let err = table.categorize(4.0).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn push_row_checks_width() {
        let mut table = ResultTable::new(&commodities());
        let row = ResultRow {
            industry: "325".into(),
            year_range: "2000:2010".to_string(),
            rmse: 0.1,
            slopes: vec![0.0; 3],
        };
        assert!(table.push_row(row).is_err());
    }
}
