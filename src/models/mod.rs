//! Regression models used by the trainer.
//!
//! - `tree`: a single depth-limited tree grown on gradient statistics
//! - `boosting`: the gradient-boosted ensemble built from those trees

pub mod boosting;
pub mod tree;

pub use boosting::*;
pub use tree::*;
