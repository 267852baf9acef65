//! Synthetic quantity-change panels with known input effects.
//!
//! Every non-focus commodity change is drawn uniformly; the industry output
//! change is Gaussian. The focus commodity responds linearly to the other
//! commodities *after demeaning by the output change*, which is exactly the
//! relationship the categorization engine estimates:
//!
//! ```text
//! focus - qc = sum_c effect_c * (input_c - qc) + noise
//! ```
//!
//! so a run on the simulated panel should recover the configured effects as
//! slopes (and label them by sign).

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, Uniform};

use crate::domain::{InputChange, OutputChange, SENTINEL, SectorCode};
use crate::error::AppError;

/// Lowest centered value written for a used input; keeps draws off the sentinel.
const MIN_USED_VALUE: f64 = -0.99;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSpec {
    pub industries: Vec<SectorCode>,
    /// Commodity codes, including the focus commodity.
    pub commodities: Vec<SectorCode>,
    pub focus: SectorCode,
    pub first_year: i32,
    pub last_year: i32,
    /// Response of the demeaned focus change to each demeaned commodity change.
    pub effects: BTreeMap<SectorCode, f64>,
    /// Half-width of the uniform commodity change distribution.
    pub input_spread: f64,
    pub output_sd: f64,
    pub noise_sd: f64,
    /// Probability that an (industry, commodity) pair is marked unused in one random year.
    pub unused_prob: f64,
    pub seed: u64,
}

impl Default for SimulationSpec {
    fn default() -> Self {
        let codes = |list: &[&str]| list.iter().map(|c| SectorCode::new(*c)).collect::<Vec<_>>();
        Self {
            industries: codes(&["211", "324", "325", "331"]),
            commodities: codes(&["211", "221", "324", "331"]),
            focus: SectorCode::new("324"),
            first_year: 1900,
            last_year: 2019,
            effects: BTreeMap::from([(SectorCode::new("211"), -0.3), (SectorCode::new("331"), 0.4)]),
            input_spread: 0.5,
            output_sd: 0.02,
            noise_sd: 0.01,
            unused_prob: 0.0,
            seed: 42,
        }
    }
}

impl SimulationSpec {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.industries.is_empty() {
            return Err(AppError::new(2, "Simulation needs at least one industry."));
        }
        if !self.commodities.contains(&self.focus) {
            return Err(AppError::new(
                2,
                format!("Focus commodity {} is not among the simulated commodities.", self.focus),
            ));
        }
        if let Some(code) = self.effects.keys().find(|c| !self.commodities.contains(c) || **c == self.focus) {
            return Err(AppError::new(
                2,
                format!("Effect given for {code}, which is not a simulated non-focus commodity."),
            ));
        }
        if self.last_year < self.first_year {
            return Err(AppError::new(2, "Simulation year range is empty."));
        }
        if !(self.input_spread.is_finite() && self.input_spread > 0.0 && self.input_spread < 0.9) {
            return Err(AppError::new(2, "input_spread must be in (0, 0.9)."));
        }
        if !(self.output_sd.is_finite() && self.output_sd >= 0.0 && self.noise_sd.is_finite() && self.noise_sd >= 0.0) {
            return Err(AppError::new(2, "Standard deviations must be finite and >= 0."));
        }
        if !(0.0..=1.0).contains(&self.unused_prob) {
            return Err(AppError::new(2, "unused_prob must be in [0, 1]."));
        }
        Ok(())
    }
}

/// Long-format observations, centered, ready for `Panel::assemble` or export.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPanel {
    pub inputs: Vec<InputChange>,
    pub outputs: Vec<OutputChange>,
}

pub fn simulate_panel(spec: &SimulationSpec) -> Result<SimulatedPanel, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let output_dist = Normal::new(0.0, spec.output_sd)
        .map_err(|e| AppError::new(4, format!("Output distribution error: {e}")))?;
    let noise_dist = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let input_dist = Uniform::new_inclusive(-spec.input_spread, spec.input_spread);

    let others: Vec<&SectorCode> = spec.commodities.iter().filter(|c| **c != spec.focus).collect();
    let years: Vec<i32> = (spec.first_year..=spec.last_year).collect();
    let mut out = SimulatedPanel::default();

    for industry in &spec.industries {
        // (commodity, year) pairs forced to the sentinel for this industry.
        let mut unused: Vec<(&SectorCode, i32)> = Vec::new();
        for &commodity in &others {
            if rng.r#gen::<f64>() < spec.unused_prob {
                unused.push((commodity, years[rng.gen_range(0..years.len())]));
            }
        }

        for &year in &years {
            let qc = output_dist.sample(&mut rng);
            out.outputs.push(OutputChange {
                industry: industry.clone(),
                year,
                value: qc,
            });

            let mut response = noise_dist.sample(&mut rng);
            for &commodity in &others {
                let demeaned = input_dist.sample(&mut rng);
                let value = if unused.contains(&(commodity, year)) {
                    SENTINEL
                } else {
                    response += spec.effects.get(commodity).copied().unwrap_or(0.0) * demeaned;
                    (demeaned + qc).max(MIN_USED_VALUE)
                };
                out.inputs.push(InputChange {
                    industry: industry.clone(),
                    commodity: commodity.clone(),
                    year,
                    value,
                });
            }

            out.inputs.push(InputChange {
                industry: industry.clone(),
                commodity: spec.focus.clone(),
                year,
                value: (response + qc).max(MIN_USED_VALUE),
            });
        }
    }

    tracing::debug!(
        industries = spec.industries.len(),
        years = years.len(),
        inputs = out.inputs.len(),
        "simulated panel"
    );
    Ok(out)
}

/// Parse `code=effect` pairs, e.g. `211=-0.3,331=0.4`.
pub fn parse_effects(s: &str) -> Result<BTreeMap<SectorCode, f64>, AppError> {
    let bad = || AppError::new(2, format!("Invalid effect list '{s}'. Expected e.g. 211=-0.3,331=0.4."));
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (code, value) = part.split_once('=').ok_or_else(bad)?;
            let value: f64 = value.trim().parse().map_err(|_| bad())?;
            if !value.is_finite() {
                return Err(bad());
            }
            Ok((SectorCode::new(code), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::is_sentinel;

    fn small() -> SimulationSpec {
        SimulationSpec {
            first_year: 2000,
            last_year: 2009,
            ..SimulationSpec::default()
        }
    }

    #[test]
    fn panel_has_one_row_per_cell() {
        let sim = simulate_panel(&small()).unwrap();
        // 4 industries x 10 years x 4 commodities.
        assert_eq!(sim.inputs.len(), 160);
        assert_eq!(sim.outputs.len(), 40);
        assert!(sim.inputs.iter().all(|o| o.value > -1.0));
    }

    #[test]
    fn same_seed_same_panel() {
        let a = simulate_panel(&small()).unwrap();
        let b = simulate_panel(&small()).unwrap();
        assert_eq!(a.inputs, b.inputs);
        assert_eq!(a.outputs, b.outputs);
    }

    #[test]
    fn focus_follows_the_configured_effects_without_noise() {
        let spec = SimulationSpec {
            noise_sd: 0.0,
            ..small()
        };
        let sim = simulate_panel(&spec).unwrap();
        let qc = sim.outputs[0].value;
        let value = |c: &str| {
            sim.inputs
                .iter()
                .find(|o| o.industry.as_str() == "211" && o.year == 2000 && o.commodity.as_str() == c)
                .map(|o| o.value - qc)
                .unwrap()
        };
        let expected = -0.3 * value("211") + 0.4 * value("331");
        assert!((value("324") - expected).abs() < 1e-12);
    }

    #[test]
    fn unused_prob_one_marks_every_other_commodity_once() {
        let spec = SimulationSpec {
            unused_prob: 1.0,
            ..small()
        };
        let sim = simulate_panel(&spec).unwrap();
        let sentinels = sim.inputs.iter().filter(|o| is_sentinel(o.value)).count();
        assert_eq!(sentinels, 4 * 3);
        assert!(
            sim.inputs
                .iter()
                .filter(|o| o.commodity.as_str() == "324")
                .all(|o| !is_sentinel(o.value))
        );
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let spec = SimulationSpec {
            focus: "999".into(),
            ..small()
        };
        assert!(simulate_panel(&spec).is_err());

        let spec = SimulationSpec {
            effects: BTreeMap::from([(SectorCode::new("324"), 1.0)]),
            ..small()
        };
        assert!(simulate_panel(&spec).is_err());
    }

    #[test]
    fn effects_parse() {
        let effects = parse_effects("211=-0.3, 331=0.4").unwrap();
        assert_eq!(effects[&SectorCode::new("211")], -0.3);
        assert_eq!(effects[&SectorCode::new("331")], 0.4);
        assert!(parse_effects("211:-0.3").is_err());
    }
}
