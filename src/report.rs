//! Plan and capture-analysis reports.
//!
//! Reports are plain data with a `Display` form for the terminal and a
//! `Serialize` form for JSON output. Unbounded durations serialize as `null`.

use std::fmt;

use serde::Serialize;

use crate::config::PlanConfig;
use crate::ride_through::{
    Axis, CaptureWindow, PredictedResponse, RideThroughCurves, RideThroughPlan, Verdict,
    VerdictTally, judge,
};
use crate::waveform::{Capture, RideThroughResult};

/// One planned stimulus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointReport {
    /// Stimulus in percent of nominal.
    pub stimulus: f64,
    /// Predicted response, if the point could be predicted.
    pub prediction: Option<PredictedResponse>,
    /// Capture sizing for predicted points.
    pub window: Option<CaptureWindow>,
    /// Why the point could not be predicted.
    pub error: Option<String>,
}

/// Summary of a ride-through test plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    /// Frequency or voltage.
    pub axis: Axis,
    /// Whether must-remain requirements are tested.
    pub ride_through: bool,
    /// Test-point offset (% of nominal).
    pub offset: f64,
    /// Every planned point in stimulus order.
    pub points: Vec<PointReport>,
    /// Points that failed to predict.
    pub failed: usize,
    /// Total stimulus time across predicted points (s).
    pub total_test_time: f64,
    /// Stimulus time plus pre- and post-test delays for every point (s).
    pub session_time: f64,
}

impl PlanReport {
    /// Builds a report for `plan`.
    pub fn new(plan: &RideThroughPlan, curves: &RideThroughCurves, settings: &PlanConfig) -> Self {
        let points: Vec<PointReport> = plan
            .points
            .iter()
            .map(|p| PointReport {
                stimulus: p.stimulus,
                prediction: p.prediction.as_ref().ok().copied(),
                window: p.window,
                error: p.prediction.as_ref().err().map(ToString::to_string),
            })
            .collect();
        let total_test_time = plan.total_test_time();
        let per_point = settings.pretest_delay + settings.posttest_delay;
        let predicted = points.len() - plan.failed();
        Self {
            axis: curves.axis,
            ride_through: curves.ride_through,
            offset: settings.offset,
            failed: plan.failed(),
            session_time: total_test_time + per_point * predicted as f64,
            total_test_time,
            points,
        }
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {:?} Ride-Through Plan ---", self.axis)?;
        writeln!(
            f,
            "Ride-through tested:   {}",
            if self.ride_through { "yes" } else { "no" }
        )?;
        writeln!(f, "Test point offset:     {:.3}%", self.offset)?;
        for p in &self.points {
            match (&p.prediction, &p.error) {
                (Some(r), _) => writeln!(f, "  {r}")?,
                (None, Some(e)) => writeln!(f, "  {:>8.3}% error: {e}", p.stimulus)?,
                (None, None) => writeln!(f, "  {:>8.3}%", p.stimulus)?,
            }
        }
        writeln!(f, "Test points:           {}", self.points.len())?;
        writeln!(f, "Failed predictions:    {}", self.failed)?;
        writeln!(f, "Total test time:       {:.2} s", self.total_test_time)?;
        write!(f, "Session time:          {:.2} s", self.session_time)
    }
}

/// Analysis of one capture, optionally judged against a prediction.
///
/// A capture that could not be read, analysed or predicted keeps its place
/// in the report with `error` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    /// Where the capture came from.
    pub source: String,
    /// Number of samples (0 if the capture could not be read).
    pub samples: usize,
    /// Sample rate (Hz).
    pub sample_rate: f64,
    /// Event location and trip outcome, if the capture was analysed.
    pub result: Option<RideThroughResult>,
    /// Prediction for the applied stimulus.
    pub prediction: Option<PredictedResponse>,
    /// Verdict against the prediction.
    pub verdict: Option<Verdict>,
    /// Why the capture could not be analysed or judged.
    pub error: Option<String>,
}

impl CaptureReport {
    /// Report without a verdict.
    pub fn new(source: impl Into<String>, capture: &Capture, result: RideThroughResult) -> Self {
        Self {
            source: source.into(),
            samples: capture.len(),
            sample_rate: capture.sample_rate,
            result: Some(result),
            prediction: None,
            verdict: None,
            error: None,
        }
    }

    /// Report for a capture that could not be read or analysed.
    pub fn failed(source: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            source: source.into(),
            samples: 0,
            sample_rate: 0.0,
            result: None,
            prediction: None,
            verdict: None,
            error: Some(error.to_string()),
        }
    }

    /// Judges the outcome against `prediction`.
    ///
    /// A capture without an analysis result is inconclusive.
    pub fn judged(mut self, prediction: PredictedResponse, time_msa: f64) -> Self {
        self.verdict = Some(match &self.result {
            Some(result) => judge(&prediction, result.outcome, time_msa),
            None => Verdict::Inconclusive,
        });
        self.prediction = Some(prediction);
        self
    }

    /// Marks a point that should have been judged but could not be.
    pub fn inconclusive(mut self, error: impl fmt::Display) -> Self {
        if self.error.is_none() {
            self.error = Some(error.to_string());
        }
        self.verdict = Some(Verdict::Inconclusive);
        self
    }
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--- {} ---", self.source)?;
        if let Some(result) = &self.result {
            write!(
                f,
                "\nSamples:               {} at {:.1} Hz",
                self.samples, self.sample_rate
            )?;
            match result.event_start {
                Some(t) => write!(f, "\nEvent start:           {t:.4} s")?,
                None => write!(f, "\nEvent start:           not found")?,
            }
            write!(f, "\nOutcome:               {}", result.outcome)?;
        }
        if let Some(e) = &self.error {
            write!(f, "\nError:                 {e}")?;
        }
        if let Some(p) = &self.prediction {
            write!(f, "\nPrediction:            {p}")?;
        }
        if let Some(v) = &self.verdict {
            write!(f, "\nVerdict:               {v}")?;
        }
        Ok(())
    }
}

/// Analyses of several captures with the overall result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Per-capture reports in input order.
    pub captures: Vec<CaptureReport>,
    /// Verdict counts over judged captures.
    pub tally: VerdictTally,
    /// Failing points tolerated.
    pub failure_count: usize,
    /// Captures that could not be read, analysed or predicted.
    pub errors: usize,
    /// Overall result; `None` when nothing was judged.
    pub passed: Option<bool>,
}

impl AnalysisReport {
    /// Tallies the verdicts of `captures`.
    pub fn new(captures: Vec<CaptureReport>, failure_count: usize) -> Self {
        let tally: VerdictTally = captures.iter().filter_map(|c| c.verdict).collect();
        let judged = captures.iter().any(|c| c.verdict.is_some());
        Self {
            errors: captures.iter().filter(|c| c.error.is_some()).count(),
            passed: judged.then(|| tally.passed(failure_count)),
            captures,
            tally,
            failure_count,
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.captures {
            writeln!(f, "{c}")?;
        }
        if self.errors > 0 {
            writeln!(f, "Errors:                {}", self.errors)?;
        }
        let Some(passed) = self.passed else {
            return write!(f, "No verdicts (no stimulus given)");
        };
        writeln!(
            f,
            "Verdicts:              {} pass, {} fail, {} inconclusive",
            self.tally.passes, self.tally.failures, self.tally.inconclusive
        )?;
        write!(
            f,
            "Result:                {} (failure count {})",
            if passed { "PASS" } else { "FAIL" },
            self.failure_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use crate::ride_through::{CurvePair, Side};
    use crate::waveform::TripOutcome;

    fn curves() -> RideThroughCurves {
        let low = Curve::new("lfrt", &[(50.0, 0.0), (57.0, 0.16), (59.0, 1.0)]).expect("valid");
        RideThroughCurves::new(Axis::Frequency, None, Some(CurvePair::trip_only(1, low)), false)
    }

    fn capture() -> Capture {
        Capture::new(vec![0.0, 0.001], vec![0.0, 1.0], vec![0.0, 1.0], None).expect("valid")
    }

    fn prediction(must_trip: f64) -> PredictedResponse {
        PredictedResponse {
            stimulus: 55.0,
            side: Side::Low,
            must_remain: 0.0,
            must_trip,
        }
    }

    #[test]
    fn plan_report_counts_failures_and_time() {
        let curves = curves();
        let settings = PlanConfig {
            offset: 1.0,
            pretest_delay: 1.0,
            posttest_delay: 2.0,
            ..PlanConfig::default()
        };
        let plan = RideThroughPlan::build(&curves, settings.offset, settings.verification_delay);
        let report = PlanReport::new(&plan, &curves, &settings);

        // 49, 51, 56, 58, 60: 60 % lands on the missing high side.
        assert_eq!(report.points.len(), 5);
        assert_eq!(report.failed, 1);
        let error = report.points.last().and_then(|p| p.error.clone()).unwrap_or_default();
        assert!(error.contains("HFRT must-trip"), "{error}");
        assert!((report.session_time - report.total_test_time - 3.0 * 4.0).abs() < 1e-9);

        let text = report.to_string();
        assert!(text.starts_with("--- Frequency Ride-Through Plan ---"));
        assert!(text.contains("Failed predictions:    1"));
    }

    #[test]
    fn analysis_report_applies_failure_count() {
        let passing = CaptureReport::new(
            "a",
            &capture(),
            RideThroughResult {
                event_start: Some(0.0),
                outcome: TripOutcome::TrippedAfter(0.1),
            },
        )
        .judged(prediction(0.16), 0.0);
        let failing = CaptureReport::new(
            "b",
            &capture(),
            RideThroughResult {
                event_start: Some(0.0),
                outcome: TripOutcome::RodeThrough,
            },
        )
        .judged(prediction(0.16), 0.0);
        assert_eq!(passing.verdict, Some(Verdict::Pass));

        let strict = AnalysisReport::new(vec![passing.clone(), failing.clone()], 0);
        assert_eq!(strict.passed, Some(false));
        let lenient = AnalysisReport::new(vec![passing, failing], 1);
        assert_eq!(lenient.passed, Some(true));
        assert!(lenient.to_string().contains("Result:                PASS"));
    }

    #[test]
    fn unjudged_captures_have_no_result() {
        let report = AnalysisReport::new(
            vec![CaptureReport::new(
                "a",
                &capture(),
                RideThroughResult {
                    event_start: None,
                    outcome: TripOutcome::NotStarted,
                },
            )],
            0,
        );
        assert_eq!(report.passed, None);
        assert!(report.to_string().contains("not found"));
    }

    #[test]
    fn unanalysed_capture_stays_in_report() {
        let passing = CaptureReport::new(
            "a",
            &capture(),
            RideThroughResult {
                event_start: Some(0.0),
                outcome: TripOutcome::TrippedAfter(0.1),
            },
        )
        .judged(prediction(0.16), 0.0);
        let unreadable = CaptureReport::failed("b", "failed to read b").judged(prediction(0.16), 0.0);
        let unpredicted = CaptureReport::new(
            "c",
            &capture(),
            RideThroughResult {
                event_start: Some(0.0),
                outcome: TripOutcome::TrippedAfter(0.1),
            },
        )
        .inconclusive("stimulus NaN is not a finite percentage");

        assert_eq!(unreadable.verdict, Some(Verdict::Inconclusive));
        assert_eq!(unpredicted.verdict, Some(Verdict::Inconclusive));
        assert!(unpredicted.prediction.is_none());

        let report = AnalysisReport::new(vec![passing, unreadable, unpredicted], 0);
        assert_eq!(report.errors, 2);
        assert_eq!((report.tally.passes, report.tally.inconclusive), (1, 2));
        assert_eq!(report.passed, Some(false));

        let text = report.to_string();
        assert!(text.contains("Verdict:               PASS"), "{text}");
        assert!(text.contains("Error:                 failed to read b"), "{text}");
        assert!(text.contains("Errors:                2"), "{text}");
    }
}
