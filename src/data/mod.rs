//! Panel data: the wide (industry, year) view the engine trains on, and a
//! synthetic generator for panels with known effects.

pub mod panel;
pub mod sample;

pub use panel::*;
pub use sample::*;
