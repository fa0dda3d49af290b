//! Predicted must-remain and must-trip durations for a stimulus.

use std::fmt;

use log::debug;
use serde::Serialize;

use super::{CurveRole, RideThroughCurves, Side};
use crate::error::PredictError;

/// Durations the equipment is expected to honor at one stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictedResponse {
    /// Stimulus in percent of nominal.
    pub stimulus: f64,
    /// Side of nominal the stimulus selected.
    pub side: Side,
    /// Shortest time the equipment must stay connected (s).
    pub must_remain: f64,
    /// Latest time by which the equipment must disconnect (s, may be infinite).
    pub must_trip: f64,
}

impl PredictedResponse {
    /// True when neither duration bounds the test.
    pub fn is_unbounded(&self) -> bool {
        !self.must_remain.is_finite() && !self.must_trip.is_finite()
    }
}

impl fmt::Display for PredictedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>8.3}% ({:<4}) must remain {:>10}  must trip {:>10}",
            self.stimulus,
            self.side,
            fmt_seconds(self.must_remain),
            fmt_seconds(self.must_trip)
        )
    }
}

pub(crate) fn fmt_seconds(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4} s")
    } else {
        "unbounded".to_string()
    }
}

/// Predicts the required response at `stimulus` (percent of nominal).
///
/// Stimuli above 100 % use the high-side curves; everything else, including
/// exactly 100 %, uses the low side.
///
/// # Arguments
///
/// * `curves` - Ride-through curve set for one axis
/// * `stimulus` - Applied frequency or voltage in percent of nominal
///
/// # Errors
///
/// * [`PredictError::InvalidStimulus`] if `stimulus` is not finite.
/// * [`PredictError::Curve`] if a configured curve has decreasing time or
///   the selected curve cannot be evaluated at `stimulus`.
/// * [`PredictError::MissingCurve`] if the selected side has no must-trip
///   curve, or ride-through is enabled without a must-remain curve.
///
/// # Examples
///
/// ```
/// use der_cert::curve::Curve;
/// use der_cert::ride_through::{Axis, CurvePair, RideThroughCurves, predict_response};
///
/// let low = Curve::new("lfrt", &[(50.0, 0.0), (57.0, 0.16), (59.0, 1.0)]).unwrap();
/// let curves = RideThroughCurves::new(Axis::Frequency, None, Some(CurvePair::trip_only(1, low)), false);
/// let r = predict_response(&curves, 55.0).unwrap();
/// assert!((r.must_trip - 0.16 * 5.0 / 7.0).abs() < 1e-12);
/// assert_eq!(r.must_remain, 0.0);
/// ```
pub fn predict_response(curves: &RideThroughCurves, stimulus: f64) -> Result<PredictedResponse, PredictError> {
    if !stimulus.is_finite() {
        return Err(PredictError::InvalidStimulus(stimulus));
    }
    for (_, curve) in curves.curves() {
        curve.check_monotonic_y()?;
    }

    let side = Side::of(stimulus);
    let trip_role = CurveRole::must_trip(side);
    let pair = curves
        .pair(side)
        .ok_or_else(|| PredictError::MissingCurve(trip_role.label(curves.axis)))?;

    let must_trip = curves.policies.must_trip.evaluate(&pair.must_trip, stimulus)?;
    let must_remain = if curves.ride_through {
        let curve = pair.must_remain.as_ref().ok_or_else(|| {
            PredictError::MissingCurve(CurveRole::must_remain(side).label(curves.axis))
        })?;
        curves.policies.must_remain.evaluate(curve, stimulus)?
    } else {
        0.0
    };

    let response = PredictedResponse {
        stimulus,
        side,
        must_remain,
        must_trip,
    };
    debug!("predicted {response}");
    Ok(response)
}

/// Predicts every stimulus independently; a failure affects only its own point.
pub fn predict_all(
    curves: &RideThroughCurves,
    stimuli: &[f64],
) -> Vec<(f64, Result<PredictedResponse, PredictError>)> {
    stimuli
        .iter()
        .map(|&s| (s, predict_response(curves, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Curve, Extrapolation};
    use crate::error::CurveError;
    use crate::ride_through::{Axis, CurvePair, EndPolicy};

    fn frt(ride_through: bool) -> RideThroughCurves {
        let high = CurvePair::trip_only(1, Curve::new("hfrt", &[(103.0, 0.16), (101.7, 300.0)]).expect("valid"))
            .with_must_remain(Curve::new("hfrt-c", &[(103.0, 0.0), (101.7, 299.0)]).expect("valid"));
        let low = CurvePair::trip_only(2, Curve::new("lfrt", &[(50.0, 0.0), (57.0, 0.16), (59.0, 1.0)]).expect("valid"))
            .with_must_remain(Curve::new("lfrt-c", &[(50.0, 0.0), (57.0, 0.1), (59.0, 0.9)]).expect("valid"));
        RideThroughCurves::new(Axis::Frequency, Some(high), Some(low), ride_through)
    }

    #[test]
    fn low_side_interpolates_must_trip() {
        let r = predict_response(&frt(false), 55.0).expect("prediction");
        assert_eq!(r.side, Side::Low);
        assert!((r.must_trip - 0.16 * (5.0 / 7.0)).abs() < 1e-12);
        assert_eq!(r.must_remain, 0.0);
    }

    #[test]
    fn nominal_has_no_trip_requirement() {
        let r = predict_response(&frt(true), 100.0).expect("prediction");
        assert_eq!(r.side, Side::Low);
        assert_eq!(r.must_trip, f64::INFINITY);
        assert_eq!(r.must_remain, f64::INFINITY);
        assert!(r.is_unbounded());
    }

    #[test]
    fn deep_excursion_holds_far_point() {
        let r = predict_response(&frt(true), 110.0).expect("prediction");
        assert_eq!(r.side, Side::High);
        assert_eq!(r.must_trip, 0.16);
        assert_eq!(r.must_remain, 0.0);
    }

    #[test]
    fn ride_through_uses_must_remain_curve() {
        let r = predict_response(&frt(true), 58.0).expect("prediction");
        assert!((r.must_remain - 0.5).abs() < 1e-12);
        assert!((r.must_trip - 0.58).abs() < 1e-12);
    }

    #[test]
    fn near_side_value_policy_reproduces_zero() {
        let mut curves = frt(false);
        curves.policies.must_trip = EndPolicy {
            far: Extrapolation::Hold,
            near: Extrapolation::Value(0.0),
        };
        let r = predict_response(&curves, 99.5).expect("prediction");
        assert_eq!(r.must_trip, 0.0);
    }

    #[test]
    fn missing_must_remain_is_reported() {
        let low = CurvePair::trip_only(2, Curve::new("lfrt", &[(50.0, 0.0), (59.0, 1.0)]).expect("valid"));
        let curves = RideThroughCurves::new(Axis::Frequency, None, Some(low), true);
        let err = predict_response(&curves, 55.0).unwrap_err();
        assert_eq!(err, PredictError::MissingCurve("LFRT must-remain".to_string()));
    }

    #[test]
    fn missing_side_is_reported() {
        let curves = RideThroughCurves::new(Axis::Voltage, None, None, false);
        let err = predict_response(&curves, 120.0).unwrap_err();
        assert_eq!(err, PredictError::MissingCurve("HVRT must-trip".to_string()));
    }

    #[test]
    fn non_monotonic_time_fails_every_point() {
        let bad = CurvePair::trip_only(2, Curve::new("lfrt", &[(50.0, 1.0), (59.0, 0.5)]).expect("valid x"));
        let curves = RideThroughCurves::new(Axis::Frequency, None, Some(bad), false);
        let results = predict_all(&curves, &[55.0, 58.0]);
        assert_eq!(results.len(), 2);
        for (_, r) in results {
            assert!(matches!(r, Err(PredictError::Curve(CurveError::NonMonotonic { .. }))));
        }
    }

    #[test]
    fn invalid_stimulus_affects_only_its_point() {
        let results = predict_all(&frt(false), &[f64::NAN, 55.0]);
        assert!(matches!(results[0].1, Err(PredictError::InvalidStimulus(_))));
        assert!(results[1].1.is_ok());
    }
}
