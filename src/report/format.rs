//! Formatted terminal output.
//!
//! Formatting lives in one place so the engine stays free of presentation
//! concerns and output changes stay localized.

use crate::domain::{CategorizeConfig, Label, SkippedUnit};
use crate::report::CategorizedRow;

/// Full run summary: configuration header, per-unit results, skipped units.
pub fn format_run_summary(
    config: &CategorizeConfig,
    rows: &[CategorizedRow],
    skipped: &[SkippedUnit],
) -> String {
    let mut out = String::new();

    out.push_str("=== pairs - input complement/substitute categorization ===\n");
    out.push_str(&format!("Focus commodity: {}\n", config.focus));
    let ranges: Vec<String> = config.year_ranges.iter().map(|r| r.label()).collect();
    out.push_str(&format!("Year ranges: {}\n", ranges.join(", ")));
    out.push_str(&format!(
        "Threshold: RMSE / {} | CV: {} folds x {} repeats | seed={}\n",
        config.rmse_divisor, config.folds, config.repeats, config.seed
    ));
    out.push_str(&format!(
        "Units: {} categorized, {} skipped\n",
        rows.len(),
        skipped.len()
    ));

    out.push_str("\nResults:\n");
    out.push_str(&format_results_table(rows));

    if !skipped.is_empty() {
        out.push_str("\nSkipped:\n");
        out.push_str(&format_skipped(skipped));
    }

    out
}

/// One line per categorized unit with complement/substitute counts.
pub fn format_results_table(rows: &[CategorizedRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<10} {:<12} {:>10} {:>4} {:>4}",
            "industry", "years", "rmse", "C", "S"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!("{:-<10} {:-<12} {:->10} {:->4} {:->4}\n", "", "", "", "", ""));

    for r in rows {
        out.push_str(&format!(
            "{:<10} {:<12} {:>10.6} {:>4} {:>4}\n",
            truncate(r.industry.as_str(), 10),
            truncate(&r.year_range, 12),
            r.rmse,
            r.count(Label::Complement),
            r.count(Label::Substitute),
        ));
    }
    out
}

fn format_skipped(skipped: &[SkippedUnit]) -> String {
    let mut out = String::new();
    for s in skipped {
        let kind = if s.training_failure { "training" } else { "ineligible" };
        out.push_str(&format!(
            "  {:<10} {:<12} [{kind}] {}\n",
            truncate(s.industry.as_str(), 10),
            truncate(&s.year_range, 12),
            s.reason
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
