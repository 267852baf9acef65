//! Sensitivity model training.
//!
//! Given an eligible unit:
//!
//! 1. build the design matrix: every usable commodity minus the row's output
//!    change, plus the output change itself; the target is the focus commodity
//!    minus the output change
//! 2. score every grid configuration by repeated k-fold cross-validation
//!    (mean of per-fold validation RMSE)
//! 3. refit the best configuration on all rows
//!
//! The (family × fold) fits are independent and run in parallel; scores are
//! reduced in a fixed order so the selection does not depend on scheduling.

use std::collections::BTreeSet;

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{BoostParams, CategorizeConfig, Predictor, SectorCode};
use crate::error::UnitError;
use crate::fit::eligibility::UnitExtract;
use crate::fit::folds::{Fold, repeated_kfold};
use crate::fit::grid::GridFamily;
use crate::math::{mean, rmse};
use crate::models::BoostedEnsemble;

/// Demeaned design matrix and target for one unit.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// Column order of `x`.
    pub predictors: Vec<Predictor>,
    pub x: DMatrix<f64>,
    pub y: Vec<f64>,
}

impl TrainingSet {
    pub fn from_extract(
        extract: &UnitExtract<'_>,
        predictors: &BTreeSet<Predictor>,
        focus: &SectorCode,
    ) -> Result<Self, UnitError> {
        let predictors: Vec<Predictor> = predictors.iter().cloned().collect();
        let n = extract.rows.len();
        let mut x = DMatrix::<f64>::zeros(n, predictors.len());
        let mut y = Vec::with_capacity(n);

        for (i, row) in extract.rows.iter().enumerate() {
            let missing = |what: &str| {
                UnitError::NumericalFailure(format!("missing {what} in year {}", row.year))
            };
            let qc = row.output_change.ok_or_else(|| missing("output change"))?;

            for (j, predictor) in predictors.iter().enumerate() {
                x[(i, j)] = match predictor {
                    Predictor::Commodity(code) => {
                        row.value(code).ok_or_else(|| missing(code.as_str()))? - qc
                    }
                    Predictor::OutputChange => qc,
                };
            }
            y.push(row.value(focus).ok_or_else(|| missing(focus.as_str()))? - qc);
        }

        Ok(Self {
            predictors,
            x,
            y,
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Cross-validation and boosting settings shared by every unit of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerSettings {
    pub folds: usize,
    pub repeats: usize,
    pub reg_lambda: f64,
}

impl From<&CategorizeConfig> for TrainerSettings {
    fn from(config: &CategorizeConfig) -> Self {
        Self {
            folds: config.folds,
            repeats: config.repeats,
            reg_lambda: config.reg_lambda,
        }
    }
}

/// The selected, refitted model for one unit.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub predictors: Vec<Predictor>,
    pub ensemble: BoostedEnsemble,
    pub params: BoostParams,
    /// Mean validation RMSE of `params` across all folds and repeats.
    pub cv_rmse: f64,
    pub n_obs: usize,
}

/// Grid-search `families` by repeated k-fold CV and refit the winner.
pub fn train(
    set: &TrainingSet,
    families: &[GridFamily],
    settings: &TrainerSettings,
    seed: u64,
) -> Result<TrainedModel, UnitError> {
    if families.is_empty() {
        return Err(UnitError::NumericalFailure("empty hyperparameter grid".to_string()));
    }
    let folds = repeated_kfold(set.len(), settings.folds, settings.repeats, seed)?;

    let tasks: Vec<(usize, usize)> = (0..families.len())
        .flat_map(|f| (0..folds.len()).map(move |k| (f, k)))
        .collect();

    // Indexed collect keeps task order regardless of which thread ran what.
    let scores: Vec<Vec<f64>> = tasks
        .par_iter()
        .map(|&(f, k)| {
            let task_seed = mix_seed(seed, (f * folds.len() + k) as u64);
            score_fold(set, &families[f], &folds[k], settings.reg_lambda, task_seed)
        })
        .collect();

    let mut best: Option<(f64, usize, usize)> = None;
    for (f, family) in families.iter().enumerate() {
        for (c, &count) in family.n_estimators.iter().enumerate() {
            let per_fold: Vec<f64> = (0..folds.len())
                .map(|k| scores[f * folds.len() + k][c])
                .collect();
            let Some(cv) = mean(&per_fold).filter(|v| v.is_finite()) else {
                return Err(UnitError::NumericalFailure(format!(
                    "non-finite cross-validation RMSE for {count} trees"
                )));
            };
            // Strict `<` keeps the earliest grid point on ties.
            if best.is_none_or(|(b, _, _)| cv < b) {
                best = Some((cv, f, c));
            }
        }
    }

    let Some((cv_rmse, f, c)) = best else {
        return Err(UnitError::NumericalFailure("no grid point was scored".to_string()));
    };
    let params = families[f].params(families[f].n_estimators[c]);

    let all_rows: Vec<usize> = (0..set.len()).collect();
    let ensemble = BoostedEnsemble::fit(&set.x, &set.y, &all_rows, &params, settings.reg_lambda, seed);

    Ok(TrainedModel {
        predictors: set.predictors.clone(),
        ensemble,
        params,
        cv_rmse,
        n_obs: set.len(),
    })
}

/// Validation RMSE of one family on one fold, at each of the family's tree counts.
fn score_fold(set: &TrainingSet, family: &GridFamily, fold: &Fold, reg_lambda: f64, seed: u64) -> Vec<f64> {
    let counts = &family.n_estimators;
    let params = family.params(family.max_trees());
    let valid_y: Vec<f64> = fold.valid.iter().map(|&i| set.y[i]).collect();

    let mut valid_pred = vec![0.0; fold.valid.len()];
    let mut out = Vec::with_capacity(counts.len());
    let mut next = 0;

    BoostedEnsemble::fit_with_monitor(&set.x, &set.y, &fold.train, &params, reg_lambda, seed, |m| {
        let trees = m.n_trees();
        for (j, &i) in fold.valid.iter().enumerate() {
            if trees == 1 {
                valid_pred[j] = m.base_score();
            }
            valid_pred[j] += m.last_tree_contribution(&set.x, i);
        }
        while next < counts.len() && counts[next] == trees {
            out.push(rmse(&valid_y, &valid_pred).unwrap_or(f64::NAN));
            next += 1;
        }
    });

    // Only reachable with a zero tree count, which config validation rejects.
    out.resize(counts.len(), f64::NAN);
    out
}

/// SplitMix64 step: decorrelates per-task seeds derived from one run seed.
pub fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Panel;
    use crate::domain::{HyperGrid, InputChange, OutputChange, YearRange};
    use crate::fit::eligibility::extract_unit;
    use crate::fit::grid::grid_families;

    fn settings() -> TrainerSettings {
        TrainerSettings {
            folds: 4,
            repeats: 2,
            reg_lambda: 1.0,
        }
    }

    fn small_grid() -> Vec<GridFamily> {
        grid_families(&HyperGrid {
            n_estimators: vec![50, 100, 200],
            eta: vec![0.1],
            ..HyperGrid::default()
        })
    }

    /// Industry "325": focus "324" responds to "211" with slope -0.5 after demeaning.
    fn panel(years: i32) -> Panel {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for t in 0..years {
            let year = 1950 + t;
            let qc = 0.01 * ((t % 5) as f64 - 2.0);
            let d211 = (t as f64 / (years - 1) as f64) - 0.5;
            let d331 = ((t * 7) % years) as f64 / years as f64 - 0.5;
            let focus = -0.5 * d211;
            for (commodity, value) in [("211", d211 + qc), ("331", d331 + qc), ("324", focus + qc)] {
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
        Panel::assemble(&inputs, &outputs, &[])
    }

    fn training_set(p: &Panel, years: i32) -> TrainingSet {
        let range = YearRange::span(1950, 1950 + years - 1).unwrap();
        let focus = SectorCode::new("324");
        let extract = extract_unit(p, &"325".into(), &range, &focus).unwrap();
        let usable = extract.usable_predictors(p.commodities(), &focus);
        TrainingSet::from_extract(&extract, &usable, &focus).unwrap()
    }

    #[test]
    fn training_set_demeans_by_output_change() {
        let p = panel(20);
        let set = training_set(&p, 20);
        assert_eq!(set.predictors.len(), 3);
        assert_eq!(set.predictors[2], Predictor::OutputChange);
        assert_eq!(set.len(), 20);

        // Row 0: qc = -0.02, d211 = -0.5.
        assert!((set.x[(0, 0)] + 0.5).abs() < 1e-12);
        assert!((set.x[(0, 2)] + 0.02).abs() < 1e-12);
        assert!((set.y[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn train_selects_a_grid_point_and_reports_cv_rmse() {
        let p = panel(40);
        let set = training_set(&p, 40);
        let model = train(&set, &small_grid(), &settings(), 42).unwrap();

        assert!(model.cv_rmse.is_finite() && model.cv_rmse > 0.0);
        assert!([50, 100, 200].contains(&model.params.n_estimators));
        assert_eq!(model.ensemble.n_trees(), model.params.n_estimators);
        assert_eq!(model.n_obs, 40);
    }

    #[test]
    fn train_is_deterministic_for_a_seed() {
        let p = panel(30);
        let set = training_set(&p, 30);
        let a = train(&set, &small_grid(), &settings(), 9).unwrap();
        let b = train(&set, &small_grid(), &settings(), 9).unwrap();
        assert_eq!(a.cv_rmse, b.cv_rmse);
        assert_eq!(a.params, b.params);
        assert_eq!(a.ensemble, b.ensemble);
    }

    #[test]
    fn too_few_observations_fail_training() {
        let p = panel(3);
        let set = training_set(&p, 3);
        let err = train(&set, &small_grid(), &settings(), 0).unwrap_err();
        assert!(matches!(err, UnitError::InsufficientObservations { observations: 3, folds: 4 }));
    }

    #[test]
    fn mixed_seeds_differ() {
        assert_ne!(mix_seed(1, 0), mix_seed(1, 1));
        assert_eq!(mix_seed(7, 3), mix_seed(7, 3));
    }
}
