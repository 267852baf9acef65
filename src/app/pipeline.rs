//! The categorization run over a whole panel.
//!
//! Units are (industry, year-range) pairs, visited industry-major in a fixed
//! order. Each unit either appends exactly one result row or records exactly
//! one skip; a unit's failure never stops the run. Only configuration problems
//! that would fail every unit identically abort before the first unit.
//!
//! Per unit:
//! eligibility -> usable predictors -> demeaned training set -> CV grid search
//! -> threshold from CV RMSE -> perturbation sweep -> slopes

use std::collections::BTreeMap;

use crate::data::Panel;
use crate::domain::{CategorizeConfig, Label, Predictor, SectorCode, SkippedUnit, YearRange};
use crate::error::{AppError, UnitError};
use crate::fit::{
    GridFamily, Threshold, TrainerSettings, TrainingSet, extract_unit, grid_families, mix_seed, sweep_slopes, test_values,
    train,
};
use crate::report::ResultTable;

/// Everything a run produces, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: ResultTable,
    pub skipped: Vec<SkippedUnit>,
}

/// Successful outcome of one unit.
#[derive(Debug, Clone)]
struct UnitResult {
    rmse: f64,
    slopes: BTreeMap<Predictor, f64>,
    complements: usize,
    substitutes: usize,
}

/// Run every unit of `config` against `panel`.
pub fn categorize_panel(panel: &Panel, config: &CategorizeConfig) -> Result<RunOutput, AppError> {
    config.validate()?;
    if !panel.commodities().contains(&config.focus) {
        return Err(AppError::new(
            2,
            format!(
                "Focus commodity {} is not among the {} commodity codes in the data.",
                config.focus,
                panel.commodities().len()
            ),
        ));
    }

    let grid = test_values(&config.test_grid)?;
    let families = grid_families(&config.hyper_grid);
    let settings = TrainerSettings::from(config);
    let industries = config.industry_list(panel.commodities());

    tracing::info!(
        focus = %config.focus,
        industries = industries.len(),
        year_ranges = config.year_ranges.len(),
        grid_families = families.len(),
        test_points = grid.len(),
        "starting categorization"
    );

    let mut table = ResultTable::new(panel.commodities());
    let mut skipped = Vec::new();

    for industry in &industries {
        for range in &config.year_ranges {
            let years = range.label();
            tracing::info!(industry = %industry, years = %years, "processing unit");

            match process_unit(panel, industry, range, config, &families, &settings, &grid) {
                Ok(result) => {
                    tracing::info!(
                        industry = %industry,
                        years = %years,
                        rmse = result.rmse,
                        complements = result.complements,
                        substitutes = result.substitutes,
                        "unit categorized"
                    );
                    table.push(industry, &years, result.rmse, &result.slopes);
                }
                Err(err) => {
                    tracing::warn!(industry = %industry, years = %years, reason = %err, "skipping unit");
                    skipped.push(SkippedUnit {
                        industry: industry.clone(),
                        year_range: years,
                        reason: err.to_string(),
                        training_failure: !err.is_ineligible(),
                    });
                }
            }
        }
    }

    tracing::info!(rows = table.len(), skipped = skipped.len(), "categorization finished");
    Ok(RunOutput { table, skipped })
}

fn process_unit(
    panel: &Panel,
    industry: &SectorCode,
    range: &YearRange,
    config: &CategorizeConfig,
    families: &[GridFamily],
    settings: &TrainerSettings,
    grid: &[f64],
) -> Result<UnitResult, UnitError> {
    let extract = extract_unit(panel, industry, range, &config.focus)?;
    let usable = extract.usable_predictors(panel.commodities(), &config.focus);
    let set = TrainingSet::from_extract(&extract, &usable, &config.focus)?;

    let model = train(&set, families, settings, unit_seed(config.seed, industry, range))?;
    tracing::debug!(
        industry = %industry,
        observations = model.n_obs,
        predictors = model.predictors.len(),
        n_estimators = model.params.n_estimators,
        max_depth = model.params.max_depth,
        eta = model.params.eta,
        gamma = model.params.gamma,
        cv_rmse = model.cv_rmse,
        "selected hyperparameters"
    );

    // Checked before the sweep so a degenerate unit never produces slopes.
    let threshold = Threshold::from_rmse(model.cv_rmse, config.rmse_divisor)?;
    let slopes = sweep_slopes(&model, grid)?;

    let count = |label: Label| slopes.values().filter(|&&s| threshold.classify(s) == label).count();
    Ok(UnitResult {
        rmse: model.cv_rmse,
        complements: count(Label::Complement),
        substitutes: count(Label::Substitute),
        slopes,
    })
}

/// Seed for one unit, stable for a given (run seed, industry, years) across
/// builds and platforms.
fn unit_seed(seed: u64, industry: &SectorCode, range: &YearRange) -> u64 {
    let mut h = seed;
    for &b in industry.as_str().as_bytes() {
        h = mix_seed(h, u64::from(b));
    }
    // Separator so the code bytes and the years cannot run together.
    h = mix_seed(h, u64::MAX);
    for &year in range.years() {
        h = mix_seed(h, i64::from(year) as u64);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_panel};
    use crate::domain::{HyperGrid, InputChange, OutputChange};

    fn simulated(spec: &SimulationSpec) -> Panel {
        let sim = simulate_panel(spec).unwrap();
        Panel::assemble(&sim.inputs, &sim.outputs, &[])
    }

    fn config(industries: &[&str], first: i32, last: i32) -> CategorizeConfig {
        CategorizeConfig {
            year_ranges: vec![YearRange::span(first, last).unwrap()],
            hyper_grid: HyperGrid {
                n_estimators: vec![50, 100, 200],
                eta: vec![0.1],
                ..HyperGrid::default()
            },
            industries: Some(industries.iter().map(|c| SectorCode::new(*c)).collect()),
            ..CategorizeConfig::default()
        }
    }

    fn slope(table: &ResultTable, row: usize, code: &str) -> f64 {
        let col = table
            .columns()
            .iter()
            .position(|p| p.column_name() == code)
            .unwrap();
        table.rows()[row].slopes[col]
    }

    #[test]
    fn recovers_substitute_and_complement_effects() {
        let panel = simulated(&SimulationSpec::default());
        let config = config(&["325"], 1900, 2019);
        let run = categorize_panel(&panel, &config).unwrap();

        assert_eq!(run.table.len(), 1);
        assert!(run.skipped.is_empty());
        let row = &run.table.rows()[0];
        assert_eq!(row.industry.as_str(), "325");
        assert_eq!(row.year_range, "1900:2019");
        assert!(row.rmse > 0.0);

        let s211 = slope(&run.table, 0, "211");
        let s331 = slope(&run.table, 0, "331");
        let s221 = slope(&run.table, 0, "221");
        assert!((s211 + 0.3).abs() < 0.08, "211 slope {s211}");
        assert!((s331 - 0.4).abs() < 0.1, "331 slope {s331}");
        assert!(s221.abs() < 0.1, "221 slope {s221}");
        // The focus commodity is never its own predictor.
        assert_eq!(slope(&run.table, 0, "324"), 0.0);

        let labels = run.table.categorize(config.rmse_divisor).unwrap();
        let col = |code: &str| run.table.columns().iter().position(|p| p.column_name() == code).unwrap();
        assert_eq!(labels[0].labels[col("211")], Label::Substitute);
        assert_eq!(labels[0].labels[col("331")], Label::Complement);
        assert_eq!(labels[0].labels[col("324")], Label::Neither);
    }

    #[test]
    fn every_unit_yields_one_row_or_one_skip() {
        let panel = simulated(&SimulationSpec {
            first_year: 1950,
            last_year: 1989,
            ..SimulationSpec::default()
        });
        let mut config = config(&[], 1950, 1989);
        // Default industry list: commodity codes 211, 221, 324, 331.
        config.industries = None;
        config.year_ranges.push(YearRange::span(1950, 1952).unwrap());
        config.year_ranges.push(YearRange::span(1800, 1810).unwrap());

        let run = categorize_panel(&panel, &config).unwrap();
        assert_eq!(run.table.len() + run.skipped.len(), 4 * 3);
        assert_eq!(run.table.len(), 2);

        let reason = |industry: &str, years: &str| {
            run.skipped
                .iter()
                .find(|s| s.industry.as_str() == industry && s.year_range == years)
                .unwrap()
                .clone()
        };
        assert_eq!(reason("324", "1950:1989").reason, UnitError::FocusIndustry.to_string());
        assert_eq!(reason("221", "1950:1989").reason, UnitError::NoObservations.to_string());
        assert_eq!(reason("211", "1800:1810").reason, UnitError::NoObservations.to_string());

        let short = reason("211", "1950:1952");
        assert!(short.training_failure);
        assert_eq!(
            short.reason,
            UnitError::InsufficientObservations {
                observations: 3,
                folds: 4
            }
            .to_string()
        );

        assert!(run.table.rows().iter().all(|r| r.industry.as_str() != "324"));
    }

    #[test]
    fn unused_commodities_get_exactly_zero_slope() {
        let panel = simulated(&SimulationSpec {
            first_year: 1950,
            last_year: 1989,
            unused_prob: 1.0,
            ..SimulationSpec::default()
        });
        let run = categorize_panel(&panel, &config(&["325"], 1950, 1989)).unwrap();

        assert_eq!(run.table.len(), 1);
        for code in ["211", "221", "324", "331"] {
            assert_eq!(slope(&run.table, 0, code), 0.0, "{code}");
        }
    }

    #[test]
    fn runs_are_deterministic_for_a_seed() {
        let panel = simulated(&SimulationSpec {
            first_year: 1950,
            last_year: 1999,
            ..SimulationSpec::default()
        });
        let config = config(&["211", "325"], 1950, 1999);
        let a = categorize_panel(&panel, &config).unwrap();
        let b = categorize_panel(&panel, &config).unwrap();
        assert_eq!(a.table, b.table);
        assert_eq!(a.skipped, b.skipped);
    }

    #[test]
    fn unknown_focus_is_fatal() {
        let panel = simulated(&SimulationSpec {
            first_year: 1950,
            last_year: 1959,
            ..SimulationSpec::default()
        });
        let mut config = config(&["325"], 1950, 1959);
        config.focus = SectorCode::new("999");
        assert_eq!(categorize_panel(&panel, &config).unwrap_err().exit_code(), 2);

        let mut config = self::config(&["325"], 1950, 1959);
        config.rmse_divisor = 0.0;
        assert_eq!(categorize_panel(&panel, &config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn constant_focus_response_is_skipped_as_degenerate() {
        // The focus change always equals the output change, so the demeaned
        // target is identically zero and every fold fits it exactly.
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for t in 0..40 {
            let year = 1950 + t;
            let qc = 0.01 * ((t % 7) as f64 - 3.0);
            let d211 = (t as f64 / 39.0) - 0.5;
            let d331 = ((t * 11) % 40) as f64 / 40.0 - 0.5;
            for (commodity, value) in [("211", d211), ("331", d331), ("324", qc)] {
                inputs.push(InputChange {
                    industry: "325".into(),
                    commodity: commodity.into(),
                    year,
                    value,
                });
            }
            outputs.push(OutputChange {
                industry: "325".into(),
                year,
                value: qc,
            });
        }
        let panel = Panel::assemble(&inputs, &outputs, &[]);

        let run = categorize_panel(&panel, &config(&["325"], 1950, 1989)).unwrap();
        assert!(run.table.is_empty());
        assert_eq!(run.skipped.len(), 1);
        let skip = &run.skipped[0];
        assert!(skip.training_failure);
        assert_eq!(skip.year_range, "1950:1989");
        assert_eq!(skip.reason, UnitError::DegenerateFit { rmse: 0.0 }.to_string());
    }

    #[test]
    fn unit_seeds_depend_on_industry_and_years() {
        let range = YearRange::span(1950, 1960).unwrap();
        let other = YearRange::span(1950, 1961).unwrap();
        let a = unit_seed(42, &"325".into(), &range);
        assert_eq!(a, unit_seed(42, &"325".into(), &range));
        assert_ne!(a, unit_seed(42, &"331".into(), &range));
        assert_ne!(a, unit_seed(42, &"325".into(), &other));
        assert_ne!(a, unit_seed(43, &"325".into(), &range));
    }

    #[test]
    fn unit_seed_is_a_fixed_mix_chain() {
        let range = YearRange::parse("1990,1995").unwrap();
        let mut expected = 7;
        for b in [b'3', b'2', b'5'] {
            expected = mix_seed(expected, u64::from(b));
        }
        expected = mix_seed(expected, u64::MAX);
        expected = mix_seed(expected, 1990);
        expected = mix_seed(expected, 1995);
        assert_eq!(unit_seed(7, &"325".into(), &range), expected);
    }
}
