//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - used in-memory during training and the perturbation sweep
//! - written to the result tables and the run manifest
//! - loaded back from a JSON config file

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Centered quantity-change value meaning "input not used in this year".
///
/// Quantity-change ratios are stored as `ratio - 1`, so a ratio of zero lands
/// exactly on `-1.0`.
pub const SENTINEL: f64 = -1.0;

/// Column name of the industry output quantity change (also a predictor).
pub const OUTPUT_COLUMN: &str = "quantity_change";

/// Commodity codes whose definition changed between the 1963-1996 and
/// 1997-2016 IO vintages. Dropping them keeps the predictor set consistent
/// over the whole period.
pub const SPLIT_CODES: [&str; 14] = [
    "44RT", "441", "445", "452", "4A0", "531", "HS", "ORE", "622HO", "622", "623", "GFG", "GFGD",
    "GFGN",
];

/// Commodity codes that are never industries.
pub const NON_INDUSTRY_CODES: [&str; 2] = ["Other", "Used"];

pub fn is_sentinel(value: f64) -> bool {
    value == SENTINEL
}

/// An IO code. Industries and commodities share one code space, which is what
/// makes "industry equals the focus commodity" a meaningful check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorCode(String);

impl SectorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectorCode {
    fn from(value: &str) -> Self {
        SectorCode::new(value)
    }
}

/// One long-format input observation, already centered (`ratio - 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct InputChange {
    pub industry: SectorCode,
    pub commodity: SectorCode,
    pub year: i32,
    pub value: f64,
}

/// One industry-level output observation, already centered.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChange {
    pub industry: SectorCode,
    pub year: i32,
    pub value: f64,
}

/// A model input: either another commodity's quantity change or the
/// industry's own output quantity change.
///
/// The derived ordering puts every commodity before the output change, which
/// is also the column order of the result tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predictor {
    Commodity(SectorCode),
    OutputChange,
}

impl Predictor {
    pub fn column_name(&self) -> &str {
        match self {
            Predictor::Commodity(code) => code.as_str(),
            Predictor::OutputChange => OUTPUT_COLUMN,
        }
    }

    pub fn from_column_name(name: &str) -> Self {
        if name == OUTPUT_COLUMN {
            Predictor::OutputChange
        } else {
            Predictor::Commodity(SectorCode::new(name))
        }
    }
}

impl fmt::Display for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// An ordered set of years treated as one stationarity regime.
///
/// Written as `1964-2016` (inclusive span) or `1990,1995,2000` (explicit set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearRange {
    years: Vec<i32>,
}

impl YearRange {
    pub fn new(mut years: Vec<i32>) -> Result<Self, AppError> {
        years.sort_unstable();
        years.dedup();
        if years.is_empty() {
            return Err(AppError::new(2, "A year range must contain at least one year."));
        }
        Ok(Self { years })
    }

    pub fn span(first: i32, last: i32) -> Result<Self, AppError> {
        if last < first {
            return Err(AppError::new(
                2,
                format!("Invalid year range {first}-{last} (end before start)."),
            ));
        }
        Self::new((first..=last).collect())
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        let s = s.trim();
        let bad = || AppError::new(2, format!("Invalid year range '{s}'. Expected e.g. 1964-2016 or 1990,2000."));

        if s.contains(',') {
            let years = s
                .split(',')
                .map(|part| part.trim().parse::<i32>().map_err(|_| bad()))
                .collect::<Result<Vec<_>, _>>()?;
            return Self::new(years);
        }

        if let Some((a, b)) = s.split_once(['-', ':']) {
            let first = a.trim().parse::<i32>().map_err(|_| bad())?;
            let last = b.trim().parse::<i32>().map_err(|_| bad())?;
            return Self::span(first, last);
        }

        let year = s.parse::<i32>().map_err(|_| bad())?;
        Self::new(vec![year])
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn first(&self) -> i32 {
        self.years[0]
    }

    pub fn last(&self) -> i32 {
        self.years[self.years.len() - 1]
    }

    pub fn contains(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    fn is_contiguous(&self) -> bool {
        (self.last() - self.first()) as usize + 1 == self.years.len()
    }

    /// Label used in the result tables (`first:last`).
    pub fn label(&self) -> String {
        format!("{}:{}", self.first(), self.last())
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_contiguous() {
            write!(f, "{}-{}", self.first(), self.last())
        } else {
            let parts: Vec<String> = self.years.iter().map(i32::to_string).collect();
            f.write_str(&parts.join(","))
        }
    }
}

impl TryFrom<String> for YearRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        YearRange::parse(&value).map_err(|e| e.to_string())
    }
}

impl From<YearRange> for String {
    fn from(value: YearRange) -> Self {
        value.to_string()
    }
}

/// Discrete outcome of the threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Complement,
    Substitute,
    Neither,
}

/// Strings written for each label. "Neither" is always the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    pub complement: String,
    pub substitute: String,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            complement: "C".to_string(),
            substitute: "S".to_string(),
        }
    }
}

impl LabelSet {
    pub fn render(&self, label: Label) -> &str {
        match label {
            Label::Complement => &self.complement,
            Label::Substitute => &self.substitute,
            Label::Neither => "",
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.complement.is_empty() || self.substitute.is_empty() {
            return Err(AppError::new(
                2,
                "Complement/substitute labels must be non-empty (the empty string means 'neither').",
            ));
        }
        if self.complement == self.substitute {
            return Err(AppError::new(2, "Complement and substitute labels must differ."));
        }
        Ok(())
    }
}

/// One fully specified gradient-boosting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub eta: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
}

/// Hyperparameter search space. The search is exhaustive over the cartesian
/// product of these axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub eta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub min_child_weight: Vec<f64>,
    pub subsample: Vec<f64>,
    pub colsample_bytree: Vec<f64>,
}

impl Default for HyperGrid {
    fn default() -> Self {
        Self {
            n_estimators: (50..=1500).step_by(50).collect(),
            max_depth: vec![2],
            eta: vec![0.01],
            gamma: vec![0.0],
            min_child_weight: vec![1.0],
            subsample: vec![1.0],
            colsample_bytree: vec![1.0],
        }
    }
}

impl HyperGrid {
    pub fn validate(&self) -> Result<(), AppError> {
        let axes = [
            ("n_estimators", self.n_estimators.len()),
            ("max_depth", self.max_depth.len()),
            ("eta", self.eta.len()),
            ("gamma", self.gamma.len()),
            ("min_child_weight", self.min_child_weight.len()),
            ("subsample", self.subsample.len()),
            ("colsample_bytree", self.colsample_bytree.len()),
        ];
        if let Some((name, _)) = axes.iter().find(|(_, len)| *len == 0) {
            return Err(AppError::new(2, format!("Hyperparameter grid axis `{name}` is empty.")));
        }
        if self.n_estimators.contains(&0) {
            return Err(AppError::new(2, "n_estimators values must be >= 1."));
        }
        if self.max_depth.contains(&0) {
            return Err(AppError::new(2, "max_depth values must be >= 1."));
        }
        if self.eta.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(AppError::new(2, "eta values must be finite and > 0."));
        }
        if self.gamma.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(AppError::new(2, "gamma values must be finite and >= 0."));
        }
        if self.min_child_weight.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(AppError::new(2, "min_child_weight values must be finite and >= 0."));
        }
        let unit_interval = |v: &f64| v.is_finite() && *v > 0.0 && *v <= 1.0;
        if !self.subsample.iter().all(unit_interval) || !self.colsample_bytree.iter().all(unit_interval) {
            return Err(AppError::new(2, "subsample/colsample_bytree values must be in (0, 1]."));
        }
        Ok(())
    }
}

/// Perturbation test values, either as an evenly spaced range or explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Range { min: f64, max: f64, steps: usize },
    Values(Vec<f64>),
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::Range {
            min: -0.5,
            max: 0.5,
            steps: 51,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Built from defaults, then an optional JSON file, then CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizeConfig {
    pub focus: SectorCode,
    pub year_ranges: Vec<YearRange>,
    pub test_grid: GridSpec,
    pub rmse_divisor: f64,
    pub labels: LabelSet,
    pub hyper_grid: HyperGrid,
    pub folds: usize,
    pub repeats: usize,
    pub seed: u64,
    /// L2 regularisation on leaf weights.
    pub reg_lambda: f64,
    /// Explicit industry list; `None` means "every commodity code that is an industry".
    pub industries: Option<Vec<SectorCode>>,
    pub non_industry_codes: Vec<SectorCode>,
    pub drop_commodities: Vec<SectorCode>,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            focus: SectorCode::new("324"),
            year_ranges: vec![YearRange {
                years: (1964..=2016).collect(),
            }],
            test_grid: GridSpec::default(),
            rmse_divisor: 4.0,
            labels: LabelSet::default(),
            hyper_grid: HyperGrid::default(),
            folds: 4,
            repeats: 2,
            seed: 42,
            reg_lambda: 1.0,
            industries: None,
            non_industry_codes: NON_INDUSTRY_CODES.iter().map(|c| SectorCode::new(*c)).collect(),
            drop_commodities: Vec::new(),
        }
    }
}

impl CategorizeConfig {
    /// Checks that do not depend on the data. Any failure here would make every
    /// unit fail identically, so it aborts the run.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.focus.as_str().is_empty() {
            return Err(AppError::new(2, "Focus commodity must not be empty."));
        }
        if self.year_ranges.is_empty() {
            return Err(AppError::new(2, "At least one year range is required."));
        }
        if !(self.rmse_divisor.is_finite() && self.rmse_divisor > 0.0) {
            return Err(AppError::new(
                2,
                format!("rmse_divisor must be finite and > 0 (got {}).", self.rmse_divisor),
            ));
        }
        if self.folds < 2 {
            return Err(AppError::new(2, "Cross-validation needs at least 2 folds."));
        }
        if self.repeats < 1 {
            return Err(AppError::new(2, "Cross-validation needs at least 1 repeat."));
        }
        if !(self.reg_lambda.is_finite() && self.reg_lambda >= 0.0) {
            return Err(AppError::new(2, "reg_lambda must be finite and >= 0."));
        }
        if self.industries.as_ref().is_some_and(Vec::is_empty) {
            return Err(AppError::new(2, "Explicit industry list is empty."));
        }
        self.labels.validate()?;
        self.hyper_grid.validate()?;
        Ok(())
    }

    /// Layer `overrides` on top of this config (set fields win).
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        let ConfigOverrides {
            focus,
            year_ranges,
            test_grid,
            rmse_divisor,
            labels,
            hyper_grid,
            folds,
            repeats,
            seed,
            reg_lambda,
            industries,
            non_industry_codes,
            drop_commodities,
        } = overrides;

        if let Some(v) = focus {
            self.focus = v;
        }
        if let Some(v) = year_ranges {
            self.year_ranges = v;
        }
        if let Some(v) = test_grid {
            self.test_grid = v;
        }
        if let Some(v) = rmse_divisor {
            self.rmse_divisor = v;
        }
        if let Some(v) = labels {
            self.labels = v;
        }
        if let Some(v) = hyper_grid {
            self.hyper_grid = v;
        }
        if let Some(v) = folds {
            self.folds = v;
        }
        if let Some(v) = repeats {
            self.repeats = v;
        }
        if let Some(v) = seed {
            self.seed = v;
        }
        if let Some(v) = reg_lambda {
            self.reg_lambda = v;
        }
        if let Some(v) = industries {
            self.industries = Some(v);
        }
        if let Some(v) = non_industry_codes {
            self.non_industry_codes = v;
        }
        if let Some(v) = drop_commodities {
            self.drop_commodities = v;
        }
        self
    }

    /// Industries to attempt, given the commodity codes present in the panel.
    pub fn industry_list(&self, commodities: &BTreeSet<SectorCode>) -> Vec<SectorCode> {
        if let Some(list) = &self.industries {
            return list.clone();
        }
        commodities
            .iter()
            .filter(|c| !self.non_industry_codes.contains(c))
            .cloned()
            .collect()
    }
}

/// Partial configuration, as read from a JSON file or collected from CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub focus: Option<SectorCode>,
    pub year_ranges: Option<Vec<YearRange>>,
    pub test_grid: Option<GridSpec>,
    pub rmse_divisor: Option<f64>,
    pub labels: Option<LabelSet>,
    pub hyper_grid: Option<HyperGrid>,
    pub folds: Option<usize>,
    pub repeats: Option<usize>,
    pub seed: Option<u64>,
    pub reg_lambda: Option<f64>,
    pub industries: Option<Vec<SectorCode>>,
    pub non_industry_codes: Option<Vec<SectorCode>>,
    pub drop_commodities: Option<Vec<SectorCode>>,
}

/// A unit that produced no result row, with the operator-facing reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub industry: SectorCode,
    pub year_range: String,
    pub reason: String,
    /// True when training was attempted (as opposed to an eligibility skip).
    pub training_failure: bool,
}
