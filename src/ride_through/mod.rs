//! Frequency and voltage ride-through: curve sets, response prediction,
//! test planning and verdicts.
//!
//! A ride-through test applies a stimulus (frequency or voltage in percent
//! of nominal) and checks that the equipment stays connected at least as long
//! as the must-remain-connected curve demands and disconnects no later than
//! the must-trip curve allows. Each side of nominal has its own pair of
//! curves; ride-through curves store the stimulus in x and the duration in
//! seconds in y.

pub mod plan;
pub mod predictor;
pub mod verdict;

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, Extrapolation, Interpolator};
use crate::error::CurveError;

pub use plan::{CaptureWindow, PlannedPoint, RideThroughPlan, capture_window, test_points};
pub use predictor::{PredictedResponse, predict_all, predict_response};
pub use verdict::{Verdict, VerdictTally, judge};

/// Nominal stimulus in percent.
pub const NOMINAL_PCT: f64 = 100.0;

/// Quantity disturbed during the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Frequency ride-through.
    Frequency,
    /// Voltage ride-through.
    Voltage,
}

impl Axis {
    fn prefix(self) -> &'static str {
        match self {
            Self::Frequency => "F",
            Self::Voltage => "V",
        }
    }
}

/// Side of nominal a stimulus falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Above nominal.
    High,
    /// At or below nominal.
    Low,
}

impl Side {
    /// Side selected by a stimulus; exactly nominal counts as low.
    pub fn of(stimulus_pct: f64) -> Self {
        if stimulus_pct > NOMINAL_PCT {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Role of a curve within a ride-through curve set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveRole {
    /// Latest allowed disconnect above nominal.
    MustTripHigh,
    /// Latest allowed disconnect below nominal.
    MustTripLow,
    /// Shortest allowed connection above nominal.
    MustRemainHigh,
    /// Shortest allowed connection below nominal.
    MustRemainLow,
}

impl CurveRole {
    /// Conventional short label, e.g. `HFRT must-trip`.
    pub fn label(self, axis: Axis) -> String {
        let (side, kind) = match self {
            Self::MustTripHigh => ("H", "must-trip"),
            Self::MustTripLow => ("L", "must-trip"),
            Self::MustRemainHigh => ("H", "must-remain"),
            Self::MustRemainLow => ("L", "must-remain"),
        };
        format!("{side}{}RT {kind}", axis.prefix())
    }

    /// Must-trip role for a side.
    pub fn must_trip(side: Side) -> Self {
        match side {
            Side::High => Self::MustTripHigh,
            Side::Low => Self::MustTripLow,
        }
    }

    /// Must-remain role for a side.
    pub fn must_remain(side: Side) -> Self {
        match side {
            Side::High => Self::MustRemainHigh,
            Side::Low => Self::MustRemainLow,
        }
    }
}

/// Device-side timing that accompanies a curve assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingParams {
    /// Time allowed to ramp to the new curve (s).
    pub ramp_time: f64,
    /// Window over which the device may randomly delay the change (s).
    pub time_window: f64,
    /// Time after which the device reverts to default behavior (s, 0 = never).
    pub timeout_period: f64,
}

/// Must-trip and optional must-remain curves for one side of nominal.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePair {
    /// Curve slot on the equipment under test.
    pub curve_num: u16,
    /// Latest allowed disconnect time versus stimulus.
    pub must_trip: Curve,
    /// Shortest required connection time versus stimulus.
    pub must_remain: Option<Curve>,
    /// Timing that accompanies the curve assignment.
    pub timing: TimingParams,
}

impl CurvePair {
    /// Pair with only a must-trip curve and default timing.
    pub fn trip_only(curve_num: u16, must_trip: Curve) -> Self {
        Self {
            curve_num,
            must_trip,
            must_remain: None,
            timing: TimingParams::default(),
        }
    }

    /// Adds a must-remain curve.
    pub fn with_must_remain(mut self, curve: Curve) -> Self {
        self.must_remain = Some(curve);
        self
    }

    /// Replaces the timing triple.
    pub fn with_timing(mut self, timing: TimingParams) -> Self {
        self.timing = timing;
        self
    }

    /// Largest duration on either curve.
    pub fn max_time(&self) -> f64 {
        let remain = self.must_remain.as_ref().map_or(f64::NEG_INFINITY, Curve::max_y);
        self.must_trip.max_y().max(remain)
    }
}

/// Extrapolation beyond the two ends of a ride-through curve.
///
/// The far end is the point furthest from nominal, the near end the point
/// closest to it. Curves may be stored in either order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndPolicy {
    /// Beyond the point furthest from nominal.
    pub far: Extrapolation,
    /// Between the point closest to nominal and nominal itself.
    pub near: Extrapolation,
}

impl EndPolicy {
    /// Evaluates `curve` at `stimulus`, mapping far/near onto the curve's
    /// first/last points.
    ///
    /// # Errors
    ///
    /// See [`Interpolator::evaluate`].
    pub fn evaluate(&self, curve: &Curve, stimulus: f64) -> Result<f64, CurveError> {
        let first = curve.first();
        let last = curve.last();
        if curve.len() == 1 {
            // One point: decide by which side of it the stimulus lies.
            return Ok(if stimulus == first.x {
                first.y
            } else if (stimulus - NOMINAL_PCT).abs() > (first.x - NOMINAL_PCT).abs() {
                self.far.resolve(first.y)
            } else {
                self.near.resolve(first.y)
            });
        }
        let first_is_far = (first.x - NOMINAL_PCT).abs() >= (last.x - NOMINAL_PCT).abs();
        let interp = if first_is_far {
            Interpolator::new(self.far, self.near)
        } else {
            Interpolator::new(self.near, self.far)
        };
        interp.evaluate(curve, stimulus)
    }
}

/// End policies for both curve kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolePolicies {
    /// Must-trip curves.
    pub must_trip: EndPolicy,
    /// Must-remain curves.
    pub must_remain: EndPolicy,
}

impl Default for RolePolicies {
    /// Deeper excursions than the far point keep the far point's (shortest)
    /// time; between the near point and nominal there is no trip requirement
    /// and connection must be kept indefinitely.
    fn default() -> Self {
        Self {
            must_trip: EndPolicy {
                far: Extrapolation::Hold,
                near: Extrapolation::Unbounded,
            },
            must_remain: EndPolicy {
                far: Extrapolation::Hold,
                near: Extrapolation::Unbounded,
            },
        }
    }
}

/// Complete ride-through curve set for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RideThroughCurves {
    /// Frequency or voltage.
    pub axis: Axis,
    /// Curves above nominal.
    pub high: Option<CurvePair>,
    /// Curves below nominal.
    pub low: Option<CurvePair>,
    /// Whether must-remain requirements are tested.
    pub ride_through: bool,
    /// Extrapolation per curve kind.
    pub policies: RolePolicies,
}

impl RideThroughCurves {
    /// Curve set with default policies.
    pub fn new(axis: Axis, high: Option<CurvePair>, low: Option<CurvePair>, ride_through: bool) -> Self {
        Self {
            axis,
            high,
            low,
            ride_through,
            policies: RolePolicies::default(),
        }
    }

    /// Pair for a side, if configured.
    pub fn pair(&self, side: Side) -> Option<&CurvePair> {
        match side {
            Side::High => self.high.as_ref(),
            Side::Low => self.low.as_ref(),
        }
    }

    /// Every configured curve with its role. Must-remain curves are listed
    /// only when ride-through is enabled.
    pub fn curves(&self) -> Vec<(CurveRole, &Curve)> {
        let mut out = Vec::with_capacity(4);
        for side in [Side::High, Side::Low] {
            if let Some(pair) = self.pair(side) {
                out.push((CurveRole::must_trip(side), &pair.must_trip));
                if self.ride_through {
                    if let Some(c) = &pair.must_remain {
                        out.push((CurveRole::must_remain(side), c));
                    }
                }
            }
        }
        out
    }

    /// Largest duration on any configured curve.
    pub fn max_time(&self) -> f64 {
        self.curves()
            .iter()
            .map(|(_, c)| c.max_y())
            .fold(0.0, f64::max)
    }

    /// Checks every configured curve for monotonic time and returns all
    /// violations.
    pub fn validate(&self) -> Vec<CurveError> {
        let errors: Vec<CurveError> = self
            .curves()
            .iter()
            .filter_map(|(_, c)| c.check_monotonic_y().err())
            .collect();
        if errors.is_empty() {
            debug!("{:?} ride-through curves validated", self.axis);
        }
        errors
    }
}
