//! Per-unit eligibility and usable predictor selection.
//!
//! A unit is one (industry, year-range). It is trained only if the industry is
//! not the focus commodity itself, has at least one row in the range, and used
//! the focus commodity (with a known output change) in every one of those rows.

use std::collections::BTreeSet;

use crate::data::{Panel, PanelRow};
use crate::domain::{Predictor, SectorCode, YearRange, is_sentinel};
use crate::error::UnitError;

/// Range-local rows for one eligible unit.
///
/// Invariant: non-empty, and every row has a non-sentinel focus value and an
/// output change.
#[derive(Debug, Clone)]
pub struct UnitExtract<'a> {
    pub industry: SectorCode,
    pub rows: Vec<&'a PanelRow>,
}

/// Apply the eligibility rules for `industry` over `range`.
pub fn extract_unit<'a>(
    panel: &'a Panel,
    industry: &SectorCode,
    range: &YearRange,
    focus: &SectorCode,
) -> Result<UnitExtract<'a>, UnitError> {
    if industry == focus {
        return Err(UnitError::FocusIndustry);
    }

    let rows = panel.rows_for(industry, range);
    if rows.is_empty() {
        return Err(UnitError::NoObservations);
    }

    for row in &rows {
        match row.value(focus) {
            Some(v) if !is_sentinel(v) => {}
            _ => return Err(UnitError::FocusUnused { year: row.year }),
        }
        if row.output_change.is_none() {
            return Err(UnitError::MissingOutput { year: row.year });
        }
    }

    Ok(UnitExtract {
        industry: industry.clone(),
        rows,
    })
}

impl UnitExtract<'_> {
    /// Commodities observed (non-sentinel) in every row, minus the focus
    /// commodity, plus the output change.
    ///
    /// Recomputed per unit: which inputs an industry uses differs industry to
    /// industry and range to range.
    pub fn usable_predictors(
        &self,
        commodities: &BTreeSet<SectorCode>,
        focus: &SectorCode,
    ) -> BTreeSet<Predictor> {
        let mut out: BTreeSet<Predictor> = commodities
            .iter()
            .filter(|c| *c != focus)
            .filter(|c| {
                self.rows
                    .iter()
                    .all(|row| row.value(c).is_some_and(|v| !is_sentinel(v)))
            })
            .map(|c| Predictor::Commodity(c.clone()))
            .collect();
        out.insert(Predictor::OutputChange);
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
