//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging and the worker pool
//! - resolves the run configuration (defaults < config file < flags)
//! - runs the categorization pipeline and writes its outputs

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{CategorizeArgs, ClassifyArgs, Cli, Command, SimulateArgs};
use crate::data::{Panel, SimulationSpec, parse_effects, simulate_panel};
use crate::domain::{CategorizeConfig, ConfigOverrides, GridSpec, HyperGrid, LabelSet, SPLIT_CODES, SectorCode};
use crate::error::AppError;
use crate::fit::parse_count_list;
use crate::io::{
    OutputPaths, RunManifest, load_input_changes, load_output_changes, read_coefficient_table, read_config_file,
    write_categorization_table, write_coefficient_table, write_input_changes, write_manifest, write_output_changes,
};
use crate::logging::init_logging;

pub mod pipeline;

/// Entry point for the `pairs` binary.
pub fn run() -> Result<(), AppError> {
    // Missing .env is fine; it only pre-populates env-backed flags.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| AppError::new(2, format!("Failed to configure {jobs} worker threads: {e}")))?;
    }

    match cli.command {
        Command::Categorize(args) => handle_categorize(&args),
        Command::Classify(args) => handle_classify(&args),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

fn handle_categorize(args: &CategorizeArgs) -> Result<(), AppError> {
    let config = resolve_config(args)?;

    let inputs = load_input_changes(&args.inputs)?;
    let outputs = load_output_changes(&args.outputs)?;
    let panel = Panel::assemble(&inputs.records, &outputs.records, &config.drop_commodities);
    tracing::info!(
        industries = panel.industries().count(),
        commodities = panel.commodities().len(),
        rows = panel.row_count(),
        "assembled panel"
    );

    let run = pipeline::categorize_panel(&panel, &config)?;
    let categorized = run.table.categorize(config.rmse_divisor)?;

    ensure_dir(&args.out_dir)?;
    let paths = OutputPaths::new(&args.out_dir, &config.focus);
    write_coefficient_table(&paths.coefficients, &run.table)?;
    write_categorization_table(&paths.categorization, run.table.columns(), &categorized, &config.labels)?;
    let manifest = RunManifest::new(&args.inputs, &args.outputs, &config, run.table.len(), &run.skipped);
    write_manifest(&paths.manifest, &manifest)?;

    println!(
        "{}",
        crate::report::format_run_summary(&config, &categorized, &run.skipped)
    );
    println!("Coefficients:   {}", paths.coefficients.display());
    println!("Categorization: {}", paths.categorization.display());
    println!("Manifest:       {}", paths.manifest.display());
    Ok(())
}

fn handle_classify(args: &ClassifyArgs) -> Result<(), AppError> {
    let labels = LabelSet {
        complement: args.complement_label.clone(),
        substitute: args.substitute_label.clone(),
    };
    labels.validate()?;
    if !(args.rmse_divisor.is_finite() && args.rmse_divisor > 0.0) {
        return Err(AppError::new(
            2,
            format!("rmse_divisor must be finite and > 0 (got {}).", args.rmse_divisor),
        ));
    }

    let table = read_coefficient_table(&args.coefficients)?;
    let rows = table.categorize(args.rmse_divisor)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| categorization_path_for(&args.coefficients));
    write_categorization_table(&output, table.columns(), &rows, &labels)?;

    tracing::info!(rows = rows.len(), divisor = args.rmse_divisor, "re-categorized coefficient table");
    println!("{}", crate::report::format_results_table(&rows));
    println!("Categorization: {}", output.display());
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let spec = SimulationSpec {
        industries: codes(&args.industries),
        commodities: codes(&args.commodities),
        focus: SectorCode::new(args.focus.as_str()),
        first_year: args.first_year,
        last_year: args.last_year,
        effects: parse_effects(&args.effects)?,
        input_spread: args.input_spread,
        output_sd: args.output_sd,
        noise_sd: args.noise_sd,
        unused_prob: args.unused_prob,
        seed: args.seed,
    };
    let sim = simulate_panel(&spec)?;

    ensure_dir(&args.out_dir)?;
    let inputs = args.out_dir.join("input_quantity_changes.csv");
    let outputs = args.out_dir.join("output_quantity_changes.csv");
    write_input_changes(&inputs, &sim.inputs)?;
    write_output_changes(&outputs, &sim.outputs)?;

    tracing::info!(
        inputs = sim.inputs.len(),
        outputs = sim.outputs.len(),
        seed = spec.seed,
        "wrote simulated panel"
    );
    println!("Inputs:  {}", inputs.display());
    println!("Outputs: {}", outputs.display());
    Ok(())
}

/// Defaults, then the optional config file, then CLI flags.
pub fn resolve_config(args: &CategorizeArgs) -> Result<CategorizeConfig, AppError> {
    let mut config = CategorizeConfig::default();
    if let Some(path) = &args.config {
        config = config.apply(read_config_file(path)?);
        tracing::debug!(path = %path.display(), "applied config file");
    }
    let overrides = overrides_from_args(args, &config)?;
    Ok(config.apply(overrides))
}

/// Collect the flags that were actually given. `base` fills in unset parts of
/// partially specified groups (grid axes, labels, test grid bounds).
pub fn overrides_from_args(args: &CategorizeArgs, base: &CategorizeConfig) -> Result<ConfigOverrides, AppError> {
    let test_grid = if args.test_min.is_some() || args.test_max.is_some() || args.test_steps.is_some() {
        let (min, max, steps) = match &base.test_grid {
            GridSpec::Range { min, max, steps } => (*min, *max, *steps),
            GridSpec::Values(_) => (-0.5, 0.5, 51),
        };
        Some(GridSpec::Range {
            min: args.test_min.unwrap_or(min),
            max: args.test_max.unwrap_or(max),
            steps: args.test_steps.unwrap_or(steps),
        })
    } else {
        None
    };

    let labels = if args.complement_label.is_some() || args.substitute_label.is_some() {
        Some(LabelSet {
            complement: args
                .complement_label
                .clone()
                .unwrap_or_else(|| base.labels.complement.clone()),
            substitute: args
                .substitute_label
                .clone()
                .unwrap_or_else(|| base.labels.substitute.clone()),
        })
    } else {
        None
    };

    let n_estimators = args.n_estimators.as_deref().map(parse_count_list).transpose()?;
    let grid_given = n_estimators.is_some()
        || !args.max_depth.is_empty()
        || !args.eta.is_empty()
        || !args.gamma.is_empty()
        || !args.min_child_weight.is_empty()
        || !args.subsample.is_empty()
        || !args.colsample_bytree.is_empty();
    let hyper_grid = grid_given.then(|| {
        let pick = |given: &Vec<f64>, current: &Vec<f64>| {
            if given.is_empty() { current.clone() } else { given.clone() }
        };
        let current = &base.hyper_grid;
        HyperGrid {
            n_estimators: n_estimators.unwrap_or_else(|| current.n_estimators.clone()),
            max_depth: if args.max_depth.is_empty() {
                current.max_depth.clone()
            } else {
                args.max_depth.clone()
            },
            eta: pick(&args.eta, &current.eta),
            gamma: pick(&args.gamma, &current.gamma),
            min_child_weight: pick(&args.min_child_weight, &current.min_child_weight),
            subsample: pick(&args.subsample, &current.subsample),
            colsample_bytree: pick(&args.colsample_bytree, &current.colsample_bytree),
        }
    });

    let drop_commodities = if args.drop_split_codes || !args.drop.is_empty() {
        let mut list: Vec<SectorCode> = if args.drop_split_codes {
            base.drop_commodities
                .iter()
                .cloned()
                .chain(SPLIT_CODES.iter().map(|c| SectorCode::new(*c)))
                .collect()
        } else {
            base.drop_commodities.clone()
        };
        list.extend(codes(&args.drop));
        list.sort();
        list.dedup();
        Some(list)
    } else {
        None
    };

    Ok(ConfigOverrides {
        focus: args.focus.as_deref().map(SectorCode::new),
        year_ranges: (!args.year_ranges.is_empty()).then(|| args.year_ranges.clone()),
        test_grid,
        rmse_divisor: args.rmse_divisor,
        labels,
        hyper_grid,
        folds: args.folds,
        repeats: args.repeats,
        seed: args.seed,
        reg_lambda: None,
        industries: (!args.industries.is_empty()).then(|| codes(&args.industries)),
        non_industry_codes: None,
        drop_commodities,
    })
}

fn codes(list: &[String]) -> Vec<SectorCode> {
    list.iter()
        .map(|c| SectorCode::new(c.as_str()))
        .filter(|c| !c.as_str().is_empty())
        .collect()
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", dir.display())))
}

/// `coefficient_results_X.csv` -> `categorization_results_X.csv`; otherwise
/// `<stem>_categorization.csv` next to the input.
fn categorization_path_for(coefficients: &Path) -> PathBuf {
    let name = coefficients
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.strip_prefix("coefficient_results") {
        Some(rest) => format!("categorization_results{rest}"),
        None => {
            let stem = coefficients
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "results".to_string());
            format!("{stem}_categorization.csv")
        }
    };
    coefficients.with_file_name(renamed)
}
