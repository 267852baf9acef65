//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - IO codes and centered observations (`SectorCode`, `InputChange`, `OutputChange`)
//! - typed model inputs (`Predictor`) and year regimes (`YearRange`)
//! - run configuration (`CategorizeConfig`, `HyperGrid`, `GridSpec`)

pub mod types;

pub use types::*;
