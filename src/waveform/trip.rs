//! Event start and trip time extraction from a capture.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::crossings::FrequencyEstimator;
use super::rms::RmsWindow;
use super::{Capture, TripOutcome};
use crate::error::WaveformError;
use crate::ride_through::Axis;

/// How the start of the disturbance is located in a capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EventDetector {
    /// First sample where the trigger channel reaches `threshold`.
    Trigger { threshold: f64 },
    /// First RMS voltage outside `nominal ± window` (V).
    RmsDeviation { nominal: f64, window: f64 },
    /// First measured frequency outside `nominal_hz ± window_hz`.
    FrequencyDeviation { nominal_hz: f64, window_hz: f64 },
}

fn outside(value: f64, nominal: f64, window: f64) -> bool {
    value <= nominal - window || value >= nominal + window
}

/// Locates the start of the disturbance.
///
/// Returns `Ok(None)` when the capture holds no such event.
///
/// # Errors
///
/// * [`WaveformError::NoTrigger`] for [`EventDetector::Trigger`] on a capture
///   without a trigger channel.
/// * Analysis errors from the RMS or frequency stage.
pub fn find_event_start(
    capture: &Capture,
    detector: EventDetector,
    window: RmsWindow,
    estimator: &FrequencyEstimator,
) -> Result<Option<f64>, WaveformError> {
    let start = match detector {
        EventDetector::Trigger { threshold } => {
            let trigger = capture.trigger.as_ref().ok_or(WaveformError::NoTrigger)?;
            trigger
                .iter()
                .position(|v| *v >= threshold)
                .map(|i| capture.time[i])
        }
        EventDetector::RmsDeviation { nominal, window: band } => capture
            .voltage_rms(window)?
            .iter()
            .find(|(_, v)| outside(*v, nominal, band))
            .map(|(t, _)| t),
        EventDetector::FrequencyDeviation { nominal_hz, window_hz } => estimator
            .estimate(&capture.voltage, capture.sample_rate, capture.start_time())?
            .first_outside(nominal_hz, window_hz),
    };
    match start {
        Some(t) => debug!("event starts at {t:.6} s ({detector:?})"),
        None => warn!("no event found in capture ({detector:?})"),
    }
    Ok(start)
}

/// Time from `event_start` until the RMS current first falls to `threshold`.
///
/// Only samples at or after the event count.
///
/// # Errors
///
/// Returns [`WaveformError::LengthMismatch`] if `times` and `current_rms`
/// differ in length.
pub fn trip_time_from_series(
    times: &[f64],
    current_rms: &[f64],
    threshold: f64,
    event_start: f64,
) -> Result<TripOutcome, WaveformError> {
    if times.len() != current_rms.len() {
        return Err(WaveformError::LengthMismatch {
            channel: "current_rms",
            time: times.len(),
            len: current_rms.len(),
        });
    }
    let outcome = times
        .iter()
        .zip(current_rms)
        .find(|(t, i)| **t >= event_start && **i <= threshold)
        .map_or(TripOutcome::RodeThrough, |(t, _)| TripOutcome::TrippedAfter(t - event_start));
    Ok(outcome)
}

/// Settings for analysing one ride-through capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RideThroughAnalysis {
    /// RMS analysis window.
    pub window: RmsWindow,
    /// RMS current at or below which the equipment counts as tripped (A).
    pub trip_threshold: f64,
    /// Event start detection.
    pub detector: EventDetector,
    /// Frequency estimation for [`EventDetector::FrequencyDeviation`].
    pub estimator: FrequencyEstimator,
}

impl Default for RideThroughAnalysis {
    fn default() -> Self {
        Self::for_axis(Axis::Frequency)
    }
}

impl RideThroughAnalysis {
    /// Defaults for a frequency or voltage test: one 60 Hz cycle window,
    /// 3 A trip threshold, trigger threshold 0.01 (frequency) or 3.0 (voltage).
    pub fn for_axis(axis: Axis) -> Self {
        let threshold = match axis {
            Axis::Frequency => 0.01,
            Axis::Voltage => 3.0,
        };
        Self {
            window: RmsWindow::line_cycle(60.0),
            trip_threshold: 3.0,
            detector: EventDetector::Trigger { threshold },
            estimator: FrequencyEstimator::default(),
        }
    }

    /// Voltage-deviation detection: ±20 V around 240 V.
    pub fn voltage_deviation() -> Self {
        Self {
            detector: EventDetector::RmsDeviation {
                nominal: 240.0,
                window: 20.0,
            },
            ..Self::for_axis(Axis::Voltage)
        }
    }
}

/// What one capture showed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RideThroughResult {
    /// Start of the disturbance, if found (s, capture time base).
    pub event_start: Option<f64>,
    /// Trip outcome relative to the event.
    pub outcome: TripOutcome,
}

/// Locates the event and measures the trip time in a capture.
///
/// A capture without a detectable event yields [`TripOutcome::NotStarted`],
/// which is distinct from tripping immediately.
///
/// # Errors
///
/// See [`find_event_start`] and [`windowed_rms`](super::windowed_rms).
pub fn analyze_ride_through(capture: &Capture, analysis: &RideThroughAnalysis) -> Result<RideThroughResult, WaveformError> {
    let Some(event_start) = find_event_start(capture, analysis.detector, analysis.window, &analysis.estimator)? else {
        return Ok(RideThroughResult {
            event_start: None,
            outcome: TripOutcome::NotStarted,
        });
    };
    let current = capture.current_rms(analysis.window)?;
    let outcome = trip_time_from_series(&current.times, &current.values, analysis.trip_threshold, event_start)?;
    info!("event at {event_start:.4} s, {outcome}");
    Ok(RideThroughResult {
        event_start: Some(event_start),
        outcome,
    })
}
