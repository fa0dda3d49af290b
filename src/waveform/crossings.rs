//! Frequency from interpolated zero crossings of a lowpass-filtered signal.

use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};

use super::filter::Butterworth;
use crate::error::WaveformError;

/// Crossing direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Negative to non-negative.
    #[default]
    Rising,
    /// Positive to non-positive.
    Falling,
}

/// Fractional sample indices where `samples` crosses zero on `edge`.
///
/// Each crossing is linearly interpolated between the two samples that
/// straddle it.
pub fn zero_crossings(samples: &[f64], edge: Edge) -> Vec<f64> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| match edge {
            Edge::Rising => w[0] < 0.0 && w[1] >= 0.0,
            Edge::Falling => w[0] > 0.0 && w[1] <= 0.0,
        })
        .map(|(i, w)| i as f64 - w[0] / (w[1] - w[0]))
        .collect()
}

/// Frequency measured from successive crossings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyEstimate {
    /// `fs / mean(interval)` over all crossing intervals (Hz).
    pub average_hz: f64,
    /// Time of each crossing (s).
    pub crossings: Vec<f64>,
    /// Midpoint time of each crossing interval (s).
    pub times: Vec<f64>,
    /// Frequency over each crossing interval (Hz).
    pub freqs: Vec<f64>,
}

impl FrequencyEstimate {
    /// Builds the estimate from fractional crossing indices.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::NoCrossings`] for fewer than two crossings.
    pub fn from_crossings(indices: &[f64], sample_rate: f64, start_time: f64) -> Result<Self, WaveformError> {
        if indices.len() < 2 {
            return Err(WaveformError::NoCrossings);
        }
        let crossings: Vec<f64> = indices.iter().map(|i| start_time + i / sample_rate).collect();
        let steps: Vec<f64> = indices.windows(2).map(|w| w[1] - w[0]).collect();
        let mean_step = steps.iter().sum::<f64>() / steps.len() as f64;
        let freqs = steps.iter().map(|s| sample_rate / s).collect();
        let times = crossings.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        Ok(Self {
            average_hz: sample_rate / mean_step,
            crossings,
            times,
            freqs,
        })
    }

    /// First interval whose frequency lies outside `nominal ± window`, as
    /// its midpoint time.
    pub fn first_outside(&self, nominal_hz: f64, window_hz: f64) -> Option<f64> {
        self.times
            .iter()
            .zip(&self.freqs)
            .find(|(_, f)| **f <= nominal_hz - window_hz || **f >= nominal_hz + window_hz)
            .map(|(t, _)| *t)
    }
}

/// Lowpass-then-count frequency estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrequencyEstimator {
    /// Nominal line frequency (Hz).
    pub nominal_hz: f64,
    /// Butterworth order.
    pub order: usize,
    /// Cutoff normalized to Nyquist; `None` uses `2π·nominal/fs`.
    pub cutoff: Option<f64>,
    /// Crossing direction to count.
    pub edge: Edge,
}

impl Default for FrequencyEstimator {
    fn default() -> Self {
        Self {
            nominal_hz: 60.0,
            order: 4,
            cutoff: None,
            edge: Edge::Rising,
        }
    }
}

impl FrequencyEstimator {
    /// Cutoff used at `sample_rate`.
    pub fn cutoff_for(&self, sample_rate: f64) -> f64 {
        self.cutoff.unwrap_or(2.0 * PI * self.nominal_hz / sample_rate)
    }

    /// Estimates frequency of `samples`, the first taken at `start_time`.
    ///
    /// # Errors
    ///
    /// * [`WaveformError::SampleRate`] if `sample_rate` is not positive.
    /// * [`WaveformError::FilterDesign`] if the cutoff is outside (0, 1).
    /// * [`WaveformError::SignalTooShort`] if the signal cannot be filtered.
    /// * [`WaveformError::NoCrossings`] for fewer than two crossings.
    pub fn estimate(&self, samples: &[f64], sample_rate: f64, start_time: f64) -> Result<FrequencyEstimate, WaveformError> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(WaveformError::SampleRate(sample_rate));
        }
        let filter = Butterworth::lowpass(self.order, self.cutoff_for(sample_rate))?;
        let filtered = filter.filtfilt(samples)?;
        let indices = zero_crossings(&filtered, self.edge);
        let estimate = FrequencyEstimate::from_crossings(&indices, sample_rate, start_time)?;
        debug!(
            "frequency estimate: {:.4} Hz from {} crossings",
            estimate.average_hz,
            estimate.crossings.len()
        );
        Ok(estimate)
    }
}
