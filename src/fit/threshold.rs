//! Slope classification.
//!
//! A slope is significant when its magnitude reaches `rmse / divisor`, the
//! unit's cross-validation error scaled down: positive significant slopes are
//! complements, negative ones substitutes.

use crate::domain::Label;
use crate::error::UnitError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    /// `rmse / divisor`; a non-positive or non-finite RMSE cannot separate
    /// significant slopes and is rejected.
    pub fn from_rmse(rmse: f64, divisor: f64) -> Result<Self, UnitError> {
        if !(rmse.is_finite() && rmse > 0.0) {
            return Err(UnitError::DegenerateFit { rmse });
        }
        if !(divisor.is_finite() && divisor > 0.0) {
            return Err(UnitError::NumericalFailure(format!("invalid RMSE divisor {divisor}")));
        }
        Ok(Self(rmse / divisor))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn classify(&self, slope: f64) -> Label {
        classify(slope, self.0)
    }
}

/// Three-way split at `±threshold` (inclusive on both sides).
pub fn classify(slope: f64, threshold: f64) -> Label {
    if slope >= threshold {
        Label::Complement
    } else if slope <= -threshold {
        Label::Substitute
    } else {
        Label::Neither
    }
}
