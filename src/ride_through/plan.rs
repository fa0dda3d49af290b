//! Test-point generation and capture sizing for a ride-through run.

use log::{debug, info, warn};
use serde::Serialize;

use super::predictor::{PredictedResponse, predict_response};
use super::RideThroughCurves;
use crate::error::PredictError;

/// Length of one 60 Hz line cycle as used for capture padding (s).
pub const LINE_CYCLE_S: f64 = 0.0166;

/// Stimuli just inside and just outside every curve point.
///
/// Each point `x` of every applicable curve contributes `x + offset` and
/// `x - offset`. Negative stimuli are dropped, the rest sorted ascending and
/// de-duplicated.
pub fn test_points(curves: &RideThroughCurves, offset: f64) -> Vec<f64> {
    let mut points: Vec<f64> = curves
        .curves()
        .into_iter()
        .flat_map(|(_, c)| c.points().iter().flat_map(move |p| [p.x + offset, p.x - offset]))
        .filter(|x| *x >= 0.0)
        .collect();
    points.sort_by(f64::total_cmp);
    points.dedup();
    debug!("{} test points at offset {offset}", points.len());
    points
}

/// How long to drive the stimulus and how long to record after the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureWindow {
    /// Time the stimulus is held (s).
    pub test_duration: f64,
    /// Post-trigger recording length (s).
    pub post_trigger: f64,
}

/// Sizes the capture for one prediction.
///
/// The stimulus is held for the longest finite predicted duration; when
/// both durations are unbounded the longest time on any curve is used
/// instead. Recording continues for at least three line cycles, or the
/// verification delay if that is longer.
pub fn capture_window(
    prediction: &PredictedResponse,
    curves: &RideThroughCurves,
    verification_delay: f64,
) -> CaptureWindow {
    let test_duration = [prediction.must_remain, prediction.must_trip]
        .into_iter()
        .filter(|t| t.is_finite())
        .reduce(f64::max)
        .unwrap_or_else(|| curves.max_time());
    let post_trigger = test_duration + verification_delay.max(3.0 * LINE_CYCLE_S);
    CaptureWindow {
        test_duration,
        post_trigger,
    }
}

/// One stimulus in a ride-through plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPoint {
    /// Stimulus in percent of nominal.
    pub stimulus: f64,
    /// Prediction, or why this point could not be predicted.
    pub prediction: Result<PredictedResponse, PredictError>,
    /// Capture sizing; present only for predicted points.
    pub window: Option<CaptureWindow>,
}

/// Every test point for one axis with its prediction and capture window.
#[derive(Debug, Clone, PartialEq)]
pub struct RideThroughPlan {
    /// Planned points in ascending stimulus order.
    pub points: Vec<PlannedPoint>,
}

impl RideThroughPlan {
    /// Generates test points around every curve point and predicts each.
    ///
    /// A point that fails to predict is kept with its error so the rest of
    /// the plan is still usable.
    pub fn build(curves: &RideThroughCurves, offset: f64, verification_delay: f64) -> Self {
        let points: Vec<PlannedPoint> = test_points(curves, offset)
            .into_iter()
            .map(|stimulus| {
                let prediction = predict_response(curves, stimulus);
                let window = prediction
                    .as_ref()
                    .ok()
                    .map(|p| capture_window(p, curves, verification_delay));
                if let Err(e) = &prediction {
                    warn!("stimulus {stimulus:.3}%: {e}");
                }
                PlannedPoint {
                    stimulus,
                    prediction,
                    window,
                }
            })
            .collect();
        let plan = Self { points };
        info!(
            "{:?} plan: {} points, {} failed to predict",
            curves.axis,
            plan.points.len(),
            plan.failed()
        );
        plan
    }

    /// Number of points whose prediction failed.
    pub fn failed(&self) -> usize {
        self.points.iter().filter(|p| p.prediction.is_err()).count()
    }

    /// Successful predictions in stimulus order.
    pub fn predictions(&self) -> impl Iterator<Item = &PredictedResponse> {
        self.points.iter().filter_map(|p| p.prediction.as_ref().ok())
    }

    /// Total stimulus time across all predicted points (s).
    pub fn total_test_time(&self) -> f64 {
        self.points
            .iter()
            .filter_map(|p| p.window)
            .map(|w| w.test_duration)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use crate::ride_through::{Axis, CurvePair, Side};

    fn lfrt(ride_through: bool) -> RideThroughCurves {
        let pair = CurvePair::trip_only(2, Curve::new("lfrt", &[(50.0, 0.0), (57.0, 0.16), (59.0, 1.0)]).expect("valid"))
            .with_must_remain(Curve::new("lfrt-c", &[(50.0, 0.0), (57.0, 0.1)]).expect("valid"));
        RideThroughCurves::new(Axis::Frequency, None, Some(pair), ride_through)
    }

    #[test]
    fn test_points_bracket_each_curve_point() {
        let pts = test_points(&lfrt(false), 0.5);
        assert_eq!(pts, vec![49.5, 50.5, 56.5, 57.5, 58.5, 59.5]);
    }

    #[test]
    fn test_points_include_must_remain_only_with_ride_through() {
        // The must-remain points coincide with must-trip points and dedup away.
        assert_eq!(test_points(&lfrt(true), 0.5), test_points(&lfrt(false), 0.5));

        let pair = CurvePair::trip_only(2, Curve::new("lfrt", &[(50.0, 0.0), (59.0, 1.0)]).expect("valid"))
            .with_must_remain(Curve::new("lfrt-c", &[(55.0, 0.1)]).expect("valid"));
        let on = RideThroughCurves::new(Axis::Frequency, None, Some(pair.clone()), true);
        let off = RideThroughCurves::new(Axis::Frequency, None, Some(pair), false);
        assert_eq!(test_points(&on, 1.0), vec![49.0, 51.0, 54.0, 56.0, 58.0, 60.0]);
        assert_eq!(test_points(&off, 1.0), vec![49.0, 51.0, 58.0, 60.0]);
    }

    #[test]
    fn test_points_drop_negatives() {
        let pair = CurvePair::trip_only(1, Curve::new("lvrt", &[(0.0, 1.0), (45.0, 2.0)]).expect("valid"));
        let curves = RideThroughCurves::new(Axis::Voltage, None, Some(pair), false);
        assert_eq!(test_points(&curves, 2.0), vec![2.0, 43.0, 47.0]);
    }

    #[test]
    fn capture_window_uses_longest_finite_duration() {
        let p = PredictedResponse {
            stimulus: 58.0,
            side: Side::Low,
            must_remain: 0.5,
            must_trip: 0.58,
        };
        let w = capture_window(&p, &lfrt(true), 0.0);
        assert_eq!(w.test_duration, 0.58);
        assert!((w.post_trigger - (0.58 + 3.0 * LINE_CYCLE_S)).abs() < 1e-12);

        let w = capture_window(&p, &lfrt(true), 2.0);
        assert!((w.post_trigger - 2.58).abs() < 1e-12);
    }

    #[test]
    fn capture_window_falls_back_to_curve_max() {
        let p = PredictedResponse {
            stimulus: 99.0,
            side: Side::Low,
            must_remain: f64::INFINITY,
            must_trip: f64::INFINITY,
        };
        let w = capture_window(&p, &lfrt(true), 0.0);
        assert_eq!(w.test_duration, 1.0);
    }

    #[test]
    fn plan_keeps_failed_points() {
        // High-side points have no curves to predict from.
        let pair = CurvePair::trip_only(1, Curve::new("lfrt", &[(99.5, 0.5), (100.5, 1.0)]).expect("valid"));
        let curves = RideThroughCurves::new(Axis::Frequency, None, Some(pair), false);
        let plan = RideThroughPlan::build(&curves, 1.0, 0.0);
        assert_eq!(plan.points.len(), 4);
        assert_eq!(plan.failed(), 2);
        assert_eq!(plan.predictions().count(), 2);
        assert!(plan.points.iter().all(|p| p.prediction.is_ok() == p.window.is_some()));
    }
}
