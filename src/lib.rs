//! `input-pairs` library crate.
//!
//! The binary (`pairs`) is a thin wrapper around this library so that:
//!
//! - the engine is testable without spawning processes
//! - the pipeline can be driven from other front ends (notebooks, services)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
