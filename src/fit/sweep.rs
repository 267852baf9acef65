//! Perturbation sweeps.
//!
//! For each predictor, hold every other predictor at zero (the "no change"
//! point after centering), move that one predictor through the test grid, and
//! summarise the model's response by the slope of an OLS line through
//! (value, prediction).

use std::collections::BTreeMap;

use crate::domain::Predictor;
use crate::error::UnitError;
use crate::fit::trainer::TrainedModel;
use crate::math::fit_line;

/// Model predictions with predictor `index` set to each grid value and all others at zero.
pub fn sweep_predictor(model: &TrainedModel, index: usize, grid: &[f64]) -> Vec<f64> {
    let mut row = vec![0.0; model.predictors.len()];
    grid.iter()
        .map(|&v| {
            row[index] = v;
            model.ensemble.predict(&row)
        })
        .collect()
}

/// Slopes below machine epsilon in magnitude are reported as exactly zero.
pub fn clamp_epsilon(slope: f64) -> f64 {
    if slope.abs() < f64::EPSILON { 0.0 } else { slope }
}

/// Fitted response slope for one predictor.
pub fn predictor_slope(model: &TrainedModel, index: usize, grid: &[f64]) -> Result<f64, UnitError> {
    let preds = sweep_predictor(model, index, grid);
    let line = fit_line(grid, &preds).ok_or_else(|| {
        UnitError::NumericalFailure(format!(
            "could not fit a response line for {}",
            model.predictors[index]
        ))
    })?;
    if !line.slope.is_finite() {
        return Err(UnitError::NumericalFailure(format!(
            "non-finite slope for {}",
            model.predictors[index]
        )));
    }
    Ok(clamp_epsilon(line.slope))
}

/// Slopes for every predictor of the model.
pub fn sweep_slopes(model: &TrainedModel, grid: &[f64]) -> Result<BTreeMap<Predictor, f64>, UnitError> {
    model
        .predictors
        .iter()
        .enumerate()
        .map(|(j, predictor)| Ok((predictor.clone(), predictor_slope(model, j, grid)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoostParams;
    use crate::fit::grid::linspace;
    use crate::models::BoostedEnsemble;
    use nalgebra::DMatrix;

    fn params(n_estimators: usize) -> BoostParams {
        BoostParams {
            n_estimators,
            max_depth: 2,
            eta: 0.1,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
        }
    }

    /// y = -0.8 * x0; x1 is noise the target ignores.
    fn model(n_estimators: usize) -> TrainedModel {
        let n = 80;
        let x = DMatrix::from_fn(n, 2, |i, j| {
            if j == 0 {
                i as f64 / (n as f64 - 1.0) - 0.5
            } else {
                ((i * 13) % n) as f64 / n as f64 - 0.5
            }
        });
        let y: Vec<f64> = (0..n).map(|i| -0.8 * x[(i, 0)]).collect();
        let rows: Vec<usize> = (0..n).collect();
        let p = params(n_estimators);
        TrainedModel {
            predictors: vec![Predictor::Commodity("211".into()), Predictor::OutputChange],
            ensemble: BoostedEnsemble::fit(&x, &y, &rows, &p, 1.0, 1),
            params: p,
            cv_rmse: 0.05,
            n_obs: n,
        }
    }

    #[test]
    fn sweep_recovers_the_sign_and_size_of_the_response() {
        let grid = linspace(-0.5, 0.5, 51).unwrap();
        let slopes = sweep_slopes(&model(300), &grid).unwrap();

        let s = slopes[&Predictor::Commodity("211".into())];
        assert!((s + 0.8).abs() < 0.15, "slope {s}");
        assert!(slopes[&Predictor::OutputChange].abs() < 0.1);
    }

    #[test]
    fn constant_model_has_exactly_zero_slope() {
        let grid = linspace(-0.5, 0.5, 11).unwrap();
        let slopes = sweep_slopes(&model(0), &grid).unwrap();
        assert!(slopes.values().all(|&s| s == 0.0));
    }

    #[test]
    fn sweep_length_matches_grid() {
        let grid = [-0.2, 0.0, 0.2];
        assert_eq!(sweep_predictor(&model(10), 0, &grid).len(), 3);
    }

    #[test]
    fn tiny_slopes_clamp_to_zero() {
        assert_eq!(clamp_epsilon(1e-17), 0.0);
        assert_eq!(clamp_epsilon(-1e-17), 0.0);
        assert_eq!(clamp_epsilon(0.25), 0.25);
    }
}
