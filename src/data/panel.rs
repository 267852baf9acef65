//! Wide panel assembly.
//!
//! Pivots the long-format observations into one row per (industry, year) with
//! one value per commodity, and joins the industry output change onto each row.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{InputChange, OutputChange, SectorCode, YearRange};

/// One (industry, year) row of centered quantity changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub year: i32,
    /// Commodity → centered value (may be the sentinel). Missing keys mean the
    /// commodity had no observation for this industry-year.
    pub values: BTreeMap<SectorCode, f64>,
    pub output_change: Option<f64>,
}

impl PanelRow {
    pub fn value(&self, commodity: &SectorCode) -> Option<f64> {
        self.values.get(commodity).copied()
    }
}

/// All rows, grouped by industry and sorted by year within each industry.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    commodities: BTreeSet<SectorCode>,
    industries: BTreeMap<SectorCode, Vec<PanelRow>>,
}

impl Panel {
    /// Build the panel, discarding any commodity listed in `drop`.
    ///
    /// Output observations for industry-years without input observations are
    /// ignored (left join onto the input rows).
    pub fn assemble(inputs: &[InputChange], outputs: &[OutputChange], drop: &[SectorCode]) -> Self {
        let mut commodities = BTreeSet::new();
        let mut cells: BTreeMap<(SectorCode, i32), BTreeMap<SectorCode, f64>> = BTreeMap::new();

        for obs in inputs {
            if drop.contains(&obs.commodity) {
                continue;
            }
            commodities.insert(obs.commodity.clone());
            let row = cells.entry((obs.industry.clone(), obs.year)).or_default();
            if row.insert(obs.commodity.clone(), obs.value).is_some() {
                tracing::warn!(
                    industry = %obs.industry,
                    commodity = %obs.commodity,
                    year = obs.year,
                    "duplicate input observation; keeping the last value"
                );
            }
        }

        let mut output_by_key: BTreeMap<(SectorCode, i32), f64> = BTreeMap::new();
        for obs in outputs {
            if output_by_key.insert((obs.industry.clone(), obs.year), obs.value).is_some() {
                tracing::warn!(
                    industry = %obs.industry,
                    year = obs.year,
                    "duplicate output observation; keeping the last value"
                );
            }
        }

        let mut industries: BTreeMap<SectorCode, Vec<PanelRow>> = BTreeMap::new();
        for ((industry, year), values) in cells {
            let output_change = output_by_key.get(&(industry.clone(), year)).copied();
            // BTreeMap iteration is ordered by (industry, year), so rows arrive sorted.
            industries.entry(industry).or_default().push(PanelRow {
                year,
                values,
                output_change,
            });
        }

        Self {
            commodities,
            industries,
        }
    }

    /// Every commodity code present after dropping; this is also the column set
    /// of the result tables.
    pub fn commodities(&self) -> &BTreeSet<SectorCode> {
        &self.commodities
    }

    pub fn industries(&self) -> impl Iterator<Item = &SectorCode> {
        self.industries.keys()
    }

    pub fn row_count(&self) -> usize {
        self.industries.values().map(Vec::len).sum()
    }

    /// Rows for `industry` whose year falls in `range`, in year order.
    pub fn rows_for(&self, industry: &SectorCode, range: &YearRange) -> Vec<&PanelRow> {
        self.industries
            .get(industry)
            .map(|rows| rows.iter().filter(|r| range.contains(r.year)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(industry: &str, commodity: &str, year: i32, value: f64) -> InputChange {
        InputChange {
            industry: industry.into(),
            commodity: commodity.into(),
            year,
            value,
        }
    }

    #[test]
    fn assemble_pivots_and_joins_output() {
        let inputs = vec![
            input("325", "211", 2001, 0.1),
            input("325", "324", 2001, -0.2),
            input("325", "211", 2000, 0.05),
            input("331", "211", 2000, 0.0),
            input("331", "531", 2000, 0.3),
        ];
        let outputs = vec![
            OutputChange {
                industry: "325".into(),
                year: 2000,
                value: 0.01,
            },
            OutputChange {
                industry: "999".into(),
                year: 2000,
                value: 0.5,
            },
        ];

        let panel = Panel::assemble(&inputs, &outputs, &[SectorCode::new("531")]);
        let codes: Vec<&str> = panel.commodities().iter().map(SectorCode::as_str).collect();
        assert_eq!(codes, vec!["211", "324"]);
        assert_eq!(panel.row_count(), 3);

        let all = YearRange::span(2000, 2001).unwrap();
        let rows = panel.rows_for(&"325".into(), &all);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2000);
        assert_eq!(rows[0].output_change, Some(0.01));
        assert_eq!(rows[1].output_change, None);
        assert_eq!(rows[1].value(&"324".into()), Some(-0.2));
        assert_eq!(rows[0].value(&"324".into()), None);

        let only_2001 = YearRange::new(vec![2001]).unwrap();
        assert_eq!(panel.rows_for(&"325".into(), &only_2001).len(), 1);
        assert!(panel.rows_for(&"999".into(), &all).is_empty());
    }
}
