//! Pass/fail judgement of a measured trip against its prediction.

use std::fmt;

use log::{info, warn};
use serde::Serialize;

use super::predictor::{PredictedResponse, fmt_seconds};
use crate::waveform::TripOutcome;

/// Judgement for one test point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Verdict {
    /// Timing within the allowed window.
    Pass,
    /// Disconnected before the must-remain time.
    TrippedEarly { measured: f64, must_remain: f64 },
    /// Disconnected after the must-trip time.
    TrippedLate { measured: f64, must_trip: f64 },
    /// Stayed connected where a trip was required.
    MissedTrip { must_trip: f64 },
    /// No event was found, so nothing can be judged.
    Inconclusive,
}

impl Verdict {
    /// True for [`Verdict::Pass`].
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// True for any of the failing verdicts.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Pass | Self::Inconclusive)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::TrippedEarly { measured, must_remain } => write!(
                f,
                "FAIL: tripped after {measured:.4} s, before must-remain time {}",
                fmt_seconds(*must_remain)
            ),
            Self::TrippedLate { measured, must_trip } => write!(
                f,
                "FAIL: tripped after {measured:.4} s, later than must-trip time {}",
                fmt_seconds(*must_trip)
            ),
            Self::MissedTrip { must_trip } => {
                write!(f, "FAIL: no trip, must trip within {}", fmt_seconds(*must_trip))
            }
            Self::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

/// Judges a measured outcome against the predicted response.
///
/// `time_msa` is the timing measurement accuracy. It is applied as a guard
/// band, so a trip must land at least `time_msa` inside both bounds.
pub fn judge(prediction: &PredictedResponse, outcome: TripOutcome, time_msa: f64) -> Verdict {
    let verdict = match outcome {
        TripOutcome::NotStarted => Verdict::Inconclusive,
        TripOutcome::RodeThrough if prediction.must_trip.is_infinite() => Verdict::Pass,
        TripOutcome::RodeThrough => Verdict::MissedTrip {
            must_trip: prediction.must_trip,
        },
        TripOutcome::TrippedAfter(t) if t - time_msa < prediction.must_remain => Verdict::TrippedEarly {
            measured: t,
            must_remain: prediction.must_remain,
        },
        TripOutcome::TrippedAfter(t) if t + time_msa > prediction.must_trip => Verdict::TrippedLate {
            measured: t,
            must_trip: prediction.must_trip,
        },
        TripOutcome::TrippedAfter(_) => Verdict::Pass,
    };
    if verdict.is_failure() {
        warn!("{:.3}%: {verdict}", prediction.stimulus);
    } else {
        info!("{:.3}%: {verdict}", prediction.stimulus);
    }
    verdict
}

/// Running count of verdicts for a test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictTally {
    /// Passing points.
    pub passes: usize,
    /// Failing points.
    pub failures: usize,
    /// Points without an event.
    pub inconclusive: usize,
}

impl VerdictTally {
    /// Counts one verdict.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passes += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
            _ => self.failures += 1,
        }
    }

    /// True when failures do not exceed `failure_count` and nothing was
    /// inconclusive.
    pub fn passed(&self, failure_count: usize) -> bool {
        self.failures <= failure_count && self.inconclusive == 0
    }
}

impl FromIterator<Verdict> for VerdictTally {
    fn from_iter<I: IntoIterator<Item = Verdict>>(iter: I) -> Self {
        let mut tally = Self::default();
        for v in iter {
            tally.record(v);
        }
        tally
    }
}
