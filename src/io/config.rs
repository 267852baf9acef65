//! JSON run-configuration files.
//!
//! A config file holds any subset of the run configuration; unset fields keep
//! their defaults and CLI flags override whatever the file sets.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::domain::ConfigOverrides;
use crate::error::AppError;

pub fn read_config_file(path: &Path) -> Result<ConfigOverrides, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategorizeConfig, GridSpec, YearRange};

    #[test]
    fn partial_config_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "focus": "211",
                "year_ranges": ["1964-1996", "1997-2016"],
                "test_grid": [-0.2, 0.0, 0.2],
                "hyper_grid": { "eta": [0.05] }
            }"#,
        )
        .unwrap();

        let config = CategorizeConfig::default().apply(read_config_file(&path).unwrap());
        assert_eq!(config.focus.as_str(), "211");
        assert_eq!(
            config.year_ranges,
            vec![YearRange::span(1964, 1996).unwrap(), YearRange::span(1997, 2016).unwrap()]
        );
        assert_eq!(config.test_grid, GridSpec::Values(vec![-0.2, 0.0, 0.2]));
        assert_eq!(config.hyper_grid.eta, vec![0.05]);
        assert_eq!(config.hyper_grid.max_depth, vec![2]);
        assert_eq!(config.rmse_divisor, 4.0);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "focuss": "211" }"#).unwrap();
        assert_eq!(read_config_file(&path).unwrap_err().exit_code(), 2);
    }
}
