//! Waveform analysis: windowed RMS, zero-crossing frequency and trip-time
//! extraction from recorded voltage and current channels.

pub mod crossings;
pub mod filter;
pub mod rms;
pub mod trip;

use std::fmt;

use serde::Serialize;

use crate::error::WaveformError;

pub use crossings::{Edge, FrequencyEstimate, FrequencyEstimator, zero_crossings};
pub use filter::Butterworth;
pub use rms::{RmsSeries, RmsWindow, rms, windowed_rms};
pub use trip::{
    EventDetector, RideThroughAnalysis, RideThroughResult, analyze_ride_through, find_event_start,
    trip_time_from_series,
};

/// Result of looking for a disconnect in a capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "seconds")]
pub enum TripOutcome {
    /// No event was found, so no trip time can be measured.
    NotStarted,
    /// The event started but current never fell to the trip threshold.
    RodeThrough,
    /// Current fell to the trip threshold this long after the event (s).
    TrippedAfter(f64),
}

impl fmt::Display for TripOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "no event found"),
            Self::RodeThrough => write!(f, "rode through"),
            Self::TrippedAfter(t) => write!(f, "tripped after {t:.4} s"),
        }
    }
}

/// A uniformly sampled recording of one ride-through test.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Sample times (s).
    pub time: Vec<f64>,
    /// AC voltage samples (V).
    pub voltage: Vec<f64>,
    /// AC current samples (A).
    pub current: Vec<f64>,
    /// Optional trigger channel marking the start of the event.
    pub trigger: Option<Vec<f64>>,
    /// Samples per second.
    pub sample_rate: f64,
}

impl Capture {
    /// Builds a capture and derives the sample rate from the median time step.
    ///
    /// # Errors
    ///
    /// * [`WaveformError::EmptySignal`] if there are fewer than two samples.
    /// * [`WaveformError::LengthMismatch`] if a channel length differs from
    ///   the time channel.
    /// * [`WaveformError::TimeNotIncreasing`] at the first time step that is
    ///   not positive.
    /// * [`WaveformError::SampleRate`] if the median time step gives no finite
    ///   sample rate.
    pub fn new(
        time: Vec<f64>,
        voltage: Vec<f64>,
        current: Vec<f64>,
        trigger: Option<Vec<f64>>,
    ) -> Result<Self, WaveformError> {
        if time.len() < 2 {
            return Err(WaveformError::EmptySignal);
        }
        let n = time.len();
        let channels = [
            ("ac_voltage", Some(voltage.len())),
            ("ac_current", Some(current.len())),
            ("trigger", trigger.as_ref().map(Vec::len)),
        ];
        for (channel, len) in channels {
            if let Some(len) = len
                && len != n
            {
                return Err(WaveformError::LengthMismatch { channel, time: n, len });
            }
        }

        if let Some(i) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(WaveformError::TimeNotIncreasing {
                index: i + 1,
                previous: time[i],
                time: time[i + 1],
            });
        }

        let mut steps: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
        steps.sort_by(f64::total_cmp);
        let median = steps[steps.len() / 2];
        let sample_rate = 1.0 / median;
        if !(median > 0.0 && sample_rate.is_finite()) {
            return Err(WaveformError::SampleRate(sample_rate));
        }

        Ok(Self {
            time,
            voltage,
            current,
            trigger,
            sample_rate,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// True if the capture holds no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time of the first sample (s).
    pub fn start_time(&self) -> f64 {
        self.time.first().copied().unwrap_or(0.0)
    }

    /// Duration covered by the samples (s).
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }

    /// Windowed RMS of the voltage channel on the capture's time base.
    ///
    /// # Errors
    ///
    /// See [`windowed_rms`].
    pub fn voltage_rms(&self, window: RmsWindow) -> Result<RmsSeries, WaveformError> {
        Ok(windowed_rms(&self.voltage, self.sample_rate, window)?.shifted(self.start_time()))
    }

    /// Windowed RMS of the current channel on the capture's time base.
    ///
    /// # Errors
    ///
    /// See [`windowed_rms`].
    pub fn current_rms(&self, window: RmsWindow) -> Result<RmsSeries, WaveformError> {
        Ok(windowed_rms(&self.current, self.sample_rate, window)?.shifted(self.start_time()))
    }
}
