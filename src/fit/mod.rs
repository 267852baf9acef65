//! Per-unit categorization engine.
//!
//! Responsibilities:
//!
//! - decide whether an (industry, year-range) unit can be trained (`eligibility`)
//! - build CV folds and search grids (`folds`, `grid`)
//! - train the sensitivity model with repeated k-fold CV (`trainer`)
//! - sweep each predictor and extract response slopes (`sweep`)
//! - turn slopes into labels relative to the CV error (`threshold`)

pub mod eligibility;
pub mod folds;
pub mod grid;
pub mod sweep;
pub mod threshold;
pub mod trainer;

pub use eligibility::*;
pub use folds::*;
pub use grid::*;
pub use sweep::*;
pub use threshold::*;
pub use trainer::*;
