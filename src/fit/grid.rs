//! Search grids.
//!
//! Two grids drive a run:
//!
//! - the perturbation test values swept through each predictor
//! - the hyperparameter grid searched by cross-validation
//!
//! The hyperparameter grid is expanded into *families*: every axis except the
//! tree count. Within a family the tree counts are nested (an ensemble of 100
//! trees is the first 100 rounds of an ensemble of 1500), so one boosting pass
//! per family and fold scores every tree count.

use crate::domain::{BoostParams, GridSpec, HyperGrid};
use crate::error::AppError;

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn linspace(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid test grid range: min={min}, max={max} (must be finite and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Test grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps - 1 {
        out.push(min + step * i as f64);
    }
    out.push(max);
    Ok(out)
}

/// Round a perturbation value to hundredths, ties to even.
pub fn round_test_value(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

/// Resolve the configured perturbation grid to concrete values.
///
/// Values are rounded to hundredths; the sweep feeds the rounded values to the
/// model and regresses on them, so two values that round together count once.
pub fn test_values(spec: &GridSpec) -> Result<Vec<f64>, AppError> {
    let values: Vec<f64> = match spec {
        GridSpec::Range { min, max, steps } => linspace(*min, *max, *steps)?,
        GridSpec::Values(values) => values.clone(),
    }
    .into_iter()
    .map(round_test_value)
    .collect();

    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(2, "Test grid values must be finite."));
    }
    let first = values.first().copied();
    if values.len() < 2 || values.iter().all(|v| Some(*v) == first) {
        return Err(AppError::new(
            2,
            "Test grid needs at least two distinct values to estimate a slope.",
        ));
    }
    Ok(values)
}

/// Grid axes other than the tree count.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFamily {
    pub max_depth: usize,
    pub eta: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Tree counts to score, ascending and de-duplicated.
    pub n_estimators: Vec<usize>,
}

impl GridFamily {
    pub fn max_trees(&self) -> usize {
        self.n_estimators.last().copied().unwrap_or(0)
    }

    pub fn params(&self, n_estimators: usize) -> BoostParams {
        BoostParams {
            n_estimators,
            max_depth: self.max_depth,
            eta: self.eta,
            gamma: self.gamma,
            min_child_weight: self.min_child_weight,
            subsample: self.subsample,
            colsample_bytree: self.colsample_bytree,
        }
    }
}

/// Expand the grid into families, in a fixed order (axis order of `HyperGrid`).
pub fn grid_families(grid: &HyperGrid) -> Vec<GridFamily> {
    let mut n_estimators = grid.n_estimators.clone();
    n_estimators.sort_unstable();
    n_estimators.dedup();

    let mut out = Vec::new();
    for &max_depth in &grid.max_depth {
        for &eta in &grid.eta {
            for &gamma in &grid.gamma {
                for &min_child_weight in &grid.min_child_weight {
                    for &subsample in &grid.subsample {
                        for &colsample_bytree in &grid.colsample_bytree {
                            out.push(GridFamily {
                                max_depth,
                                eta,
                                gamma,
                                min_child_weight,
                                subsample,
                                colsample_bytree,
                                n_estimators: n_estimators.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

/// Parse a tree-count list: `start:end:step` (inclusive) or `a,b,c`.
pub fn parse_count_list(s: &str) -> Result<Vec<usize>, AppError> {
    let s = s.trim();
    let bad = || AppError::new(2, format!("Invalid count list '{s}'. Expected e.g. 50:1500:50 or 100,200."));

    if s.contains(':') {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [start, end, step] = parts.as_slice() else {
            return Err(bad());
        };
        let start: usize = start.parse().map_err(|_| bad())?;
        let end: usize = end.parse().map_err(|_| bad())?;
        let step: usize = step.parse().map_err(|_| bad())?;
        if step == 0 || end < start {
            return Err(bad());
        }
        return Ok((start..=end).step_by(step).collect());
    }

    s.split(',')
        .map(|part| part.trim().parse::<usize>().map_err(|_| bad()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(-0.5, 0.5, 51).unwrap();
        assert_eq!(v.len(), 51);
        assert_eq!(v[0], -0.5);
        assert_eq!(v[50], 0.5);
        assert!((v[1] - v[0] - 0.02).abs() < 1e-12);
        assert!(v[25].abs() < 1e-12);
    }

    #[test]
    fn test_values_rejects_degenerate_grids() {
        assert!(test_values(&GridSpec::Values(vec![0.1, 0.1])).is_err());
        assert!(test_values(&GridSpec::Values(vec![0.1])).is_err());
        assert!(test_values(&GridSpec::Range { min: 0.5, max: -0.5, steps: 5 }).is_err());
        assert_eq!(test_values(&GridSpec::Values(vec![-0.1, 0.1])).unwrap(), vec![-0.1, 0.1]);
    }

    #[test]
    fn test_values_are_rounded_to_hundredths() {
        let values = test_values(&GridSpec::Values(vec![-0.123, 0.0, 0.456, 0.125])).unwrap();
        assert_eq!(values, vec![-0.12, 0.0, 0.46, 0.12]);

        let values = test_values(&GridSpec::Range { min: -0.5, max: 0.5, steps: 51 }).unwrap();
        assert_eq!(values[1], -0.48);
        assert_eq!(values[25], 0.0);
        assert_eq!(values[37], 0.24);

        // Distinct before rounding, identical after.
        assert!(test_values(&GridSpec::Values(vec![0.001, 0.004])).is_err());
    }

    #[test]
    fn default_grid_is_one_family_of_thirty_counts() {
        let families = grid_families(&HyperGrid::default());
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].n_estimators.len(), 30);
        assert_eq!(families[0].max_trees(), 1500);
        assert_eq!(families[0].params(100).max_depth, 2);
    }

    #[test]
    fn families_multiply_across_axes() {
        let grid = HyperGrid {
            n_estimators: vec![200, 100, 200],
            eta: vec![0.01, 0.05],
            gamma: vec![0.0, 0.01],
            ..HyperGrid::default()
        };
        let families = grid_families(&grid);
        assert_eq!(families.len(), 4);
        assert_eq!(families[0].n_estimators, vec![100, 200]);
        assert_eq!((families[1].eta, families[1].gamma), (0.01, 0.01));
    }

    #[test]
    fn count_lists_parse() {
        assert_eq!(parse_count_list("50:200:50").unwrap(), vec![50, 100, 150, 200]);
        assert_eq!(parse_count_list("10, 20").unwrap(), vec![10, 20]);
        assert!(parse_count_list("50:10:5").is_err());
        assert!(parse_count_list("1:2").is_err());
    }
}
