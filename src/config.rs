//! TOML-based test-plan configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::curve::{Curve, CurvePoint, Extrapolation};
use crate::error::CurveError;
use crate::functions::{FwParams, Ratings, VvCharacteristicInputs};
use crate::ride_through::{
    Axis, CurvePair, CurveRole, EndPolicy, RideThroughCurves, RolePolicies, Side, TimingParams,
};
use crate::waveform::{EventDetector, RideThroughAnalysis};

/// Top-level test plan parsed from TOML.
///
/// Every section has defaults, but the default plan has no ride-through
/// curves and therefore does not validate. Load from TOML with
/// [`TestPlanConfig::from_toml_file`] or start from a preset with
/// [`TestPlanConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestPlanConfig {
    /// Test-point generation and pass/fail settings.
    #[serde(default)]
    pub plan: PlanConfig,
    /// Ride-through curves under test.
    #[serde(default)]
    pub ride_through: RideThroughConfig,
    /// Capture analysis settings.
    #[serde(default)]
    pub analysis: RideThroughAnalysis,
    /// Frequency-watt parameters.
    #[serde(default)]
    pub freq_watt: FwParams,
    /// Volt-var characteristic inputs.
    #[serde(default)]
    pub volt_var: VvCharacteristicInputs,
    /// Nameplate ratings, needed only for var screens.
    #[serde(default)]
    pub ratings: Option<Ratings>,
}

/// Test-point generation and pass/fail settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    /// Distance of each test point from its curve point (% of nominal).
    pub offset: f64,
    /// Timing measurement accuracy applied as a guard band (s).
    pub time_msa: f64,
    /// Failing points tolerated before the test fails.
    pub failure_count: usize,
    /// Extra recording time after the predicted response (s).
    pub verification_delay: f64,
    /// Settling time before each point (s).
    pub pretest_delay: f64,
    /// Recovery time after each point (s).
    pub posttest_delay: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            offset: 1.0,
            time_msa: 0.1,
            failure_count: 0,
            verification_delay: 5.0,
            pretest_delay: 10.0,
            posttest_delay: 10.0,
        }
    }
}

/// Curve set for one ride-through axis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RideThroughConfig {
    /// `"frequency"` or `"voltage"`.
    pub axis: Axis,
    /// Whether must-remain requirements are tested.
    pub ride_through: bool,
    /// Curves above nominal.
    pub high: Option<CurvePairConfig>,
    /// Curves below nominal.
    pub low: Option<CurvePairConfig>,
    /// Extrapolation beyond the curve ends.
    pub policies: RolePolicies,
}

impl Default for RideThroughConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Frequency,
            ride_through: true,
            high: None,
            low: None,
            policies: RolePolicies::default(),
        }
    }
}

/// Must-trip and optional must-remain curves for one side of nominal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurvePairConfig {
    /// Curve slot on the equipment under test.
    #[serde(default = "default_curve_num")]
    pub curve_num: u16,
    /// Latest allowed disconnect time versus stimulus.
    pub must_trip: CurveConfig,
    /// Shortest required connection time versus stimulus.
    #[serde(default)]
    pub must_remain: Option<CurveConfig>,
    /// Timing that accompanies the curve assignment.
    #[serde(default)]
    pub timing: TimingParams,
}

fn default_curve_num() -> u16 {
    1
}

/// A point table and the 1-based range of it that forms the curve.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveConfig {
    /// `[stimulus %, seconds]` pairs, numbered from 1.
    pub points: Vec<[f64; 2]>,
    /// First point of the curve.
    #[serde(default = "default_index_start")]
    pub index_start: usize,
    /// Number of points; defaults to the rest of the table.
    #[serde(default)]
    pub index_count: Option<usize>,
}

fn default_index_start() -> usize {
    1
}

impl CurveConfig {
    /// Configuration for a curve using every point of `points`.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        Self {
            points: points.iter().map(|&(x, y)| [x, y]).collect(),
            index_start: 1,
            index_count: None,
        }
    }

    /// Builds the curve.
    ///
    /// # Errors
    ///
    /// Returns a [`CurveError`] if the range is invalid or the points do not
    /// form a valid curve.
    pub fn build(&self, label: impl Into<String>) -> Result<Curve, CurveError> {
        let table: BTreeMap<usize, CurvePoint> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, &[x, y])| (i + 1, CurvePoint::new(x, y)))
            .collect();
        let count = self
            .index_count
            .unwrap_or_else(|| (self.points.len() + 1).saturating_sub(self.index_start));
        Curve::from_table(label, &table, self.index_start, count)
    }
}

impl CurvePairConfig {
    fn build(&self, axis: Axis, side: Side) -> Result<CurvePair, CurveError> {
        let must_trip = self.must_trip.build(CurveRole::must_trip(side).label(axis))?;
        let must_remain = self
            .must_remain
            .as_ref()
            .map(|c| c.build(CurveRole::must_remain(side).label(axis)))
            .transpose()?;
        Ok(CurvePair {
            curve_num: self.curve_num,
            must_trip,
            must_remain,
            timing: self.timing,
        })
    }
}

impl RideThroughConfig {
    /// Builds the curve set.
    ///
    /// # Errors
    ///
    /// Returns the first [`CurveError`] from any configured curve.
    pub fn curves(&self) -> Result<RideThroughCurves, CurveError> {
        let high = self
            .high
            .as_ref()
            .map(|p| p.build(self.axis, Side::High))
            .transpose()?;
        let low = self
            .low
            .as_ref()
            .map(|p| p.build(self.axis, Side::Low))
            .transpose()?;
        let mut curves = RideThroughCurves::new(self.axis, high, low, self.ride_through);
        curves.policies = self.policies;
        Ok(curves)
    }

    fn pair(&self, side: Side) -> Option<&CurvePairConfig> {
        match side {
            Side::High => self.high.as_ref(),
            Side::Low => self.low.as_ref(),
        }
    }
}

/// A configuration validation error with the offending field path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"ride_through.high.must_trip"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn pair(
    curve_num: u16,
    must_trip: &[(f64, f64)],
    must_remain: &[(f64, f64)],
) -> CurvePairConfig {
    CurvePairConfig {
        curve_num,
        must_trip: CurveConfig::from_points(must_trip),
        must_remain: Some(CurveConfig::from_points(must_remain)),
        timing: TimingParams::default(),
    }
}

impl TestPlanConfig {
    /// CA Rule 21 frequency ride-through: trips at 62 / 56.5 Hz within
    /// 0.16 s, at 61.2 / 58.5 Hz within 300 s.
    pub fn frt_rule21() -> Self {
        Self {
            plan: PlanConfig {
                time_msa: 0.02,
                ..PlanConfig::default()
            },
            ride_through: RideThroughConfig {
                axis: Axis::Frequency,
                high: Some(pair(
                    1,
                    &[(103.333, 0.16), (102.0, 300.0)],
                    &[(103.333, 0.0), (102.0, 299.0)],
                )),
                low: Some(pair(
                    1,
                    &[(94.167, 0.16), (97.5, 300.0)],
                    &[(94.167, 0.0), (97.5, 299.0)],
                )),
                ..RideThroughConfig::default()
            },
            analysis: RideThroughAnalysis::for_axis(Axis::Frequency),
            ..Self::default()
        }
    }

    /// CA Rule 21 voltage ride-through, with ratings for the volt-var screen.
    pub fn vrt_rule21() -> Self {
        Self {
            plan: PlanConfig {
                time_msa: 0.02,
                ..PlanConfig::default()
            },
            ride_through: RideThroughConfig {
                axis: Axis::Voltage,
                high: Some(pair(
                    2,
                    &[(120.0, 0.16), (110.0, 13.0)],
                    &[(120.0, 0.0), (110.0, 12.0)],
                )),
                low: Some(pair(
                    2,
                    &[(50.0, 1.5), (88.0, 21.0)],
                    &[(50.0, 0.0), (88.0, 20.0)],
                )),
                ..RideThroughConfig::default()
            },
            analysis: RideThroughAnalysis::for_axis(Axis::Voltage),
            ratings: Some(Ratings {
                w_max: 9000.0,
                va_max: 10000.0,
                var_max: 4400.0,
            }),
            ..Self::default()
        }
    }

    /// IEEE 1547 category II voltage trip settings, with RMS-deviation
    /// event detection.
    pub fn ieee1547_cat2() -> Self {
        Self {
            plan: PlanConfig {
                time_msa: 0.02,
                ..PlanConfig::default()
            },
            ride_through: RideThroughConfig {
                axis: Axis::Voltage,
                high: Some(pair(
                    3,
                    &[(120.0, 0.16), (110.0, 2.0)],
                    &[(120.0, 0.0), (110.0, 1.0)],
                )),
                low: Some(pair(
                    3,
                    &[(45.0, 0.16), (88.0, 10.0)],
                    &[(45.0, 0.0), (88.0, 9.0)],
                )),
                ..RideThroughConfig::default()
            },
            analysis: RideThroughAnalysis::voltage_deviation(),
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["frt_rule21", "vrt_rule21", "ieee1547_cat2"];

    /// Loads a test plan from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "frt_rule21" => Ok(Self::frt_rule21()),
            "vrt_rule21" => Ok(Self::vrt_rule21()),
            "ieee1547_cat2" => Ok(Self::ieee1547_cat2()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a test plan from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("plan", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a test plan from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Builds the ride-through curve set.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first curve that fails to build.
    pub fn curves(&self) -> Result<RideThroughCurves, ConfigError> {
        self.ride_through
            .curves()
            .map_err(|e| ConfigError::new("ride_through", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let p = &self.plan;
        for (name, value) in [
            ("time_msa", p.time_msa),
            ("verification_delay", p.verification_delay),
            ("pretest_delay", p.pretest_delay),
            ("posttest_delay", p.posttest_delay),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ConfigError::new(format!("plan.{name}"), "must be finite and >= 0"));
            }
        }
        if !(p.offset.is_finite() && p.offset > 0.0) {
            errors.push(ConfigError::new("plan.offset", "must be finite and > 0"));
        }

        self.validate_ride_through(&mut errors);
        self.validate_analysis(&mut errors);

        if let Err(e) = self.freq_watt.to_curve() {
            errors.push(ConfigError::new("freq_watt", e.to_string()));
        }
        if let Err(e) = self.volt_var.slopes() {
            errors.push(ConfigError::new("volt_var", e.to_string()));
        }
        if let Some(r) = &self.ratings {
            if let Err(e) = r.var_available() {
                errors.push(ConfigError::new("ratings", e.to_string()));
            }
        }

        errors
    }

    fn validate_ride_through(&self, errors: &mut Vec<ConfigError>) {
        let rt = &self.ride_through;
        if rt.high.is_none() && rt.low.is_none() {
            errors.push(ConfigError::new(
                "ride_through",
                "at least one of ride_through.high and ride_through.low is required",
            ));
            return;
        }

        let mut built = true;
        for side in [Side::High, Side::Low] {
            let Some(cfg) = rt.pair(side) else { continue };
            let path = format!("ride_through.{side}");
            if let Err(e) = cfg.must_trip.build(CurveRole::must_trip(side).label(rt.axis)) {
                errors.push(ConfigError::new(format!("{path}.must_trip"), e.to_string()));
                built = false;
            }
            match &cfg.must_remain {
                Some(c) => {
                    if let Err(e) = c.build(CurveRole::must_remain(side).label(rt.axis)) {
                        errors.push(ConfigError::new(format!("{path}.must_remain"), e.to_string()));
                        built = false;
                    }
                }
                None if rt.ride_through => errors.push(ConfigError::new(
                    format!("{path}.must_remain"),
                    "required when ride_through is enabled",
                )),
                None => {}
            }
        }

        for (name, policy) in [
            ("must_trip", rt.policies.must_trip),
            ("must_remain", rt.policies.must_remain),
        ] {
            if !policy_is_valid(policy) {
                errors.push(ConfigError::new(
                    format!("ride_through.policies.{name}"),
                    "fixed values must be finite and >= 0",
                ));
            }
        }

        if built {
            if let Ok(curves) = rt.curves() {
                for e in curves.validate() {
                    errors.push(ConfigError::new("ride_through", e.to_string()));
                }
            }
        }
    }

    fn validate_analysis(&self, errors: &mut Vec<ConfigError>) {
        let a = &self.analysis;
        if let Err(e) = a.window.validate() {
            errors.push(ConfigError::new("analysis.window", e.to_string()));
        }
        if !(a.trip_threshold.is_finite() && a.trip_threshold >= 0.0) {
            errors.push(ConfigError::new("analysis.trip_threshold", "must be finite and >= 0"));
        }
        let detector_ok = match a.detector {
            EventDetector::Trigger { threshold } => threshold.is_finite(),
            EventDetector::RmsDeviation { nominal, window } => {
                nominal.is_finite() && window.is_finite() && window > 0.0
            }
            EventDetector::FrequencyDeviation { nominal_hz, window_hz } => {
                nominal_hz > 0.0 && window_hz.is_finite() && window_hz > 0.0
            }
        };
        if !detector_ok {
            errors.push(ConfigError::new(
                "analysis.detector",
                "thresholds must be finite and windows > 0",
            ));
        }
        let est = &a.estimator;
        if !(est.nominal_hz.is_finite() && est.nominal_hz > 0.0) {
            errors.push(ConfigError::new("analysis.estimator.nominal_hz", "must be > 0"));
        }
        if est.order == 0 {
            errors.push(ConfigError::new("analysis.estimator.order", "must be >= 1"));
        }
        if let Some(wn) = est.cutoff {
            if !(wn > 0.0 && wn < 1.0) {
                errors.push(ConfigError::new("analysis.estimator.cutoff", "must be in (0, 1)"));
            }
        }
    }
}

fn policy_is_valid(policy: EndPolicy) -> bool {
    [policy.far, policy.near].iter().all(|e| match e {
        Extrapolation::Value(v) => v.is_finite() && *v >= 0.0,
        Extrapolation::Hold | Extrapolation::Unbounded => true,
    })
}
