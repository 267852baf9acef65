//! Input/output helpers.
//!
//! - CSV ingest + centering (`ingest`)
//! - result tables and synthetic panels as CSV (`export`)
//! - JSON config files (`config`) and run manifests (`manifest`)

pub mod config;
pub mod export;
pub mod ingest;
pub mod manifest;

pub use config::*;
pub use export::*;
pub use ingest::*;
pub use manifest::*;
