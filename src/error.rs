//! Error types.
//!
//! Two tiers:
//!
//! - [`AppError`]: fatal, carries a process exit code. Configuration problems and
//!   unreadable inputs end the run before any unit is processed.
//! - [`UnitError`]: recoverable, scoped to one (industry, year-range) unit. The
//!   pipeline logs it, records a skip entry and moves on.

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single (industry, year-range) unit produced no result row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("industry matches the focus commodity")]
    FocusIndustry,

    #[error("industry is not present in the year range")]
    NoObservations,

    #[error("incomplete usage of the focus commodity (year {year})")]
    FocusUnused { year: i32 },

    #[error("missing output quantity change (year {year})")]
    MissingOutput { year: i32 },

    #[error("{observations} observation(s) cannot be split into {folds} folds")]
    InsufficientObservations { observations: usize, folds: usize },

    #[error("degenerate fit: cross-validated RMSE {rmse} is not positive")]
    DegenerateFit { rmse: f64 },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

impl UnitError {
    /// True for skips decided before any training was attempted.
    pub fn is_ineligible(&self) -> bool {
        matches!(
            self,
            UnitError::FocusIndustry
                | UnitError::NoObservations
                | UnitError::FocusUnused { .. }
                | UnitError::MissingOutput { .. }
        )
    }
}
