//! Command-line parsing for the input-pair categorizer.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! engine. Flags mirror the JSON config fields; anything left unset falls back
//! to the config file, then to the built-in defaults.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::YearRange;
use crate::error::AppError;
use crate::logging::LogFormat;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "pairs",
    version,
    about = "Classify production input pairs as complements or substitutes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (ignored when RUST_LOG is set).
    #[arg(long, global = true, env = "PAIRS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, env = "PAIRS_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Worker threads for cross-validation (defaults to the number of CPUs).
    #[arg(short = 'j', long, global = true, env = "PAIRS_JOBS")]
    pub jobs: Option<usize>,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train per-industry models and categorize every input paired with the focus commodity.
    Categorize(CategorizeArgs),
    /// Re-categorize a saved coefficient table with a different divisor or labels.
    Classify(ClassifyArgs),
    /// Write synthetic input/output quantity-change CSVs with known effects.
    Simulate(SimulateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CategorizeArgs {
    /// Long-format input quantity changes (industry, commodity, year, value).
    #[arg(
        long,
        value_name = "CSV",
        env = "PAIRS_INPUTS",
        default_value = "processed_data/input_quantity_changes.csv"
    )]
    pub inputs: PathBuf,

    /// Long-format output quantity changes (industry, year, quantity_change).
    #[arg(
        long,
        value_name = "CSV",
        env = "PAIRS_OUTPUTS",
        default_value = "processed_data/output_quantity_changes.csv"
    )]
    pub outputs: PathBuf,

    /// Directory for the result tables and run manifest.
    #[arg(long, value_name = "DIR", env = "PAIRS_OUT_DIR", default_value = "results")]
    pub out_dir: PathBuf,

    /// JSON file with any subset of the run configuration.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Focus commodity code [default: 324].
    #[arg(long)]
    pub focus: Option<String>,

    /// Year range, e.g. 1964-2016 or 1990,1995,2000. Repeat for several ranges.
    #[arg(long = "years", value_name = "RANGE", value_parser = parse_year_range)]
    pub year_ranges: Vec<YearRange>,

    /// Lower end of the perturbation grid [default: -0.5].
    #[arg(long, allow_negative_numbers = true)]
    pub test_min: Option<f64>,

    /// Upper end of the perturbation grid [default: 0.5].
    #[arg(long, allow_negative_numbers = true)]
    pub test_max: Option<f64>,

    /// Number of perturbation grid points [default: 51].
    #[arg(long)]
    pub test_steps: Option<usize>,

    /// A slope counts when |slope| >= RMSE / divisor [default: 4].
    #[arg(long)]
    pub rmse_divisor: Option<f64>,

    /// Label written for complements [default: C].
    #[arg(long)]
    pub complement_label: Option<String>,

    /// Label written for substitutes [default: S].
    #[arg(long)]
    pub substitute_label: Option<String>,

    /// Tree counts to search, `start:end:step` or a list [default: 50:1500:50].
    #[arg(long, value_name = "COUNTS")]
    pub n_estimators: Option<String>,

    /// Tree depths to search [default: 2].
    #[arg(long, value_delimiter = ',')]
    pub max_depth: Vec<usize>,

    /// Learning rates to search [default: 0.01].
    #[arg(long, value_delimiter = ',')]
    pub eta: Vec<f64>,

    /// Minimum split gains to search [default: 0].
    #[arg(long, value_delimiter = ',')]
    pub gamma: Vec<f64>,

    /// Minimum child hessian sums to search [default: 1].
    #[arg(long, value_delimiter = ',')]
    pub min_child_weight: Vec<f64>,

    /// Row subsampling ratios to search [default: 1].
    #[arg(long, value_delimiter = ',')]
    pub subsample: Vec<f64>,

    /// Per-tree column sampling ratios to search [default: 1].
    #[arg(long, value_delimiter = ',')]
    pub colsample_bytree: Vec<f64>,

    /// Cross-validation folds [default: 4].
    #[arg(long)]
    pub folds: Option<usize>,

    /// Cross-validation repeats [default: 2].
    #[arg(long)]
    pub repeats: Option<usize>,

    /// Random seed for fold shuffling and sampling [default: 42].
    #[arg(long, env = "PAIRS_SEED")]
    pub seed: Option<u64>,

    /// Industries to process (defaults to every commodity code except Other/Used).
    #[arg(long, value_delimiter = ',')]
    pub industries: Vec<String>,

    /// Commodity columns to drop before training.
    #[arg(long, value_delimiter = ',')]
    pub drop: Vec<String>,

    /// Drop the commodity codes whose definitions changed across IO vintages.
    #[arg(long)]
    pub drop_split_codes: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    /// Coefficient table written by `pairs categorize`.
    #[arg(long, value_name = "CSV")]
    pub coefficients: PathBuf,

    /// Output path [default: the categorization file next to the coefficient table].
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// A slope counts when |slope| >= RMSE / divisor.
    #[arg(long, default_value_t = 4.0)]
    pub rmse_divisor: f64,

    #[arg(long, default_value = "C")]
    pub complement_label: String,

    #[arg(long, default_value = "S")]
    pub substitute_label: String,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Directory to write input_quantity_changes.csv and output_quantity_changes.csv into.
    #[arg(long, value_name = "DIR", default_value = "processed_data")]
    pub out_dir: PathBuf,

    #[arg(long, value_delimiter = ',', default_value = "211,324,325,331")]
    pub industries: Vec<String>,

    /// Commodity codes (must include the focus commodity).
    #[arg(long, value_delimiter = ',', default_value = "211,221,324,331")]
    pub commodities: Vec<String>,

    #[arg(long, default_value = "324")]
    pub focus: String,

    #[arg(long, default_value_t = 1900)]
    pub first_year: i32,

    #[arg(long, default_value_t = 2019)]
    pub last_year: i32,

    /// Response of the focus commodity to each commodity, `code=effect,...`.
    #[arg(long, default_value = "211=-0.3,331=0.4")]
    pub effects: String,

    /// Half-width of the uniform commodity change distribution.
    #[arg(long, default_value_t = 0.5)]
    pub input_spread: f64,

    /// Standard deviation of the output change.
    #[arg(long, default_value_t = 0.02)]
    pub output_sd: f64,

    /// Standard deviation of the focus response noise.
    #[arg(long, default_value_t = 0.01)]
    pub noise_sd: f64,

    /// Probability that a commodity is unused by an industry in one random year.
    #[arg(long, default_value_t = 0.0)]
    pub unused_prob: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

fn parse_year_range(s: &str) -> Result<YearRange, AppError> {
    YearRange::parse(s)
}
