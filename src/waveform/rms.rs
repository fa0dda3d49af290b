//! Sliding-window AC RMS.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::WaveformError;

/// Sliding analysis window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RmsWindow {
    /// Window length (ms).
    pub size_ms: f64,
    /// Overlap between consecutive windows (ms).
    pub overlap_ms: f64,
}

impl Default for RmsWindow {
    fn default() -> Self {
        Self::line_cycle(60.0)
    }
}

impl RmsWindow {
    /// Creates a validated window.
    ///
    /// # Errors
    ///
    /// See [`RmsWindow::validate`].
    pub fn new(size_ms: f64, overlap_ms: f64) -> Result<Self, WaveformError> {
        let window = Self { size_ms, overlap_ms };
        window.validate()?;
        Ok(window)
    }

    /// One line cycle with a third of it, truncated to whole milliseconds,
    /// as overlap.
    pub fn line_cycle(line_hz: f64) -> Self {
        let size_ms = 1000.0 / line_hz;
        Self {
            size_ms,
            overlap_ms: (size_ms / 3.0).trunc(),
        }
    }

    /// Advance between window centres (s).
    pub fn step_s(&self) -> f64 {
        (self.size_ms - self.overlap_ms) / 1000.0
    }

    /// Checks the window geometry.
    ///
    /// # Errors
    ///
    /// * [`WaveformError::WindowTooSmall`] if the window is below 1 ms.
    /// * [`WaveformError::OverlapTooLarge`] if the overlap is not smaller than
    ///   the window.
    pub fn validate(&self) -> Result<(), WaveformError> {
        if self.size_ms.is_nan() || self.size_ms < 1.0 {
            return Err(WaveformError::WindowTooSmall(self.size_ms));
        }
        if self.overlap_ms.is_nan() || self.overlap_ms >= self.size_ms {
            return Err(WaveformError::OverlapTooLarge {
                size: self.size_ms,
                overlap: self.overlap_ms,
            });
        }
        Ok(())
    }
}

/// RMS values at window centre times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RmsSeries {
    /// Window centre times (s).
    pub times: Vec<f64>,
    /// RMS value of each window.
    pub values: Vec<f64>,
}

impl RmsSeries {
    /// Number of windows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no window was produced.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Moves the series onto another time base.
    pub fn shifted(mut self, offset: f64) -> Self {
        for t in &mut self.times {
            *t += offset;
        }
        self
    }

    /// (time, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }
}

/// RMS of a block about its own mean.
///
/// # Errors
///
/// Returns [`WaveformError::EmptySignal`] for an empty block.
pub fn rms(samples: &[f64]) -> Result<f64, WaveformError> {
    if samples.is_empty() {
        return Err(WaveformError::EmptySignal);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let power = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    Ok(power.sqrt())
}

/// Time-varying RMS of a uniformly sampled signal.
///
/// Window centres advance by `size - overlap`, starting at the first sample.
/// The window starting before the signal is clipped to the first sample and
/// windows running past the end are clipped to the last one. The first
/// output value is dropped because its window only partly covers the signal.
///
/// Times are relative to the first sample.
///
/// # Arguments
///
/// * `samples` - Signal values
/// * `sample_rate` - Samples per second
/// * `window` - Analysis window
///
/// # Errors
///
/// * Geometry errors from [`RmsWindow::validate`].
/// * [`WaveformError::SampleRate`] if `sample_rate` is not positive.
/// * [`WaveformError::EmptySignal`] for an empty signal.
/// * [`WaveformError::EmptyWindow`] if a window holds no samples.
pub fn windowed_rms(samples: &[f64], sample_rate: f64, window: RmsWindow) -> Result<RmsSeries, WaveformError> {
    window.validate()?;
    if !(sample_rate > 0.0 && sample_rate.is_finite()) {
        return Err(WaveformError::SampleRate(sample_rate));
    }
    if samples.is_empty() {
        return Err(WaveformError::EmptySignal);
    }

    let n = samples.len();
    let duration = n as f64 / sample_rate;
    let step = window.step_s();
    let count = (duration / step).floor() as usize;
    let half = window.size_ms / 2000.0;
    let width = (window.size_ms * sample_rate / 1000.0).floor() as usize;

    let mut series = RmsSeries {
        times: Vec::with_capacity(count.saturating_sub(1)),
        values: Vec::with_capacity(count.saturating_sub(1)),
    };
    for k in 0..count {
        let t = k as f64 * step;
        let left = ((t - half) * sample_rate).floor().max(0.0) as usize;
        let right = (left + width).min(n - 1);
        if right <= left {
            return Err(WaveformError::EmptyWindow { time: t });
        }
        if k == 0 {
            continue;
        }
        series.times.push(t);
        series.values.push(rms(&samples[left..right])?);
    }
    trace!("windowed rms: {} windows of {} samples", series.len(), width);
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{PI, SQRT_2};

    fn sine(amplitude: f64, hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn rms_removes_mean() {
        assert_eq!(rms(&[5.0, 5.0, 5.0]).ok(), Some(0.0));
        assert_eq!(rms(&[1.0, -1.0]).ok(), Some(1.0));
        assert_eq!(rms(&[]), Err(WaveformError::EmptySignal));
    }

    #[test]
    fn line_cycle_window() {
        let w = RmsWindow::line_cycle(60.0);
        assert!((w.size_ms - 16.666_666_666_666_668).abs() < 1e-12);
        assert_eq!(w.overlap_ms, 5.0);
        assert!((w.step_s() - 0.011_666_666_666_666_668).abs() < 1e-12);
    }

    #[test]
    fn full_cycle_windows_converge_to_peak_over_sqrt2() {
        let fs = 24_000.0;
        let x = sine(10.0, 60.0, fs, 24_000);
        let series = windowed_rms(&x, fs, RmsWindow::line_cycle(60.0)).expect("rms");
        // Interior windows only; the last ones are clipped at the end.
        for (_, v) in series.iter().take(series.len() - 3) {
            assert!((v - 10.0 / SQRT_2).abs() < 1e-2, "rms {v}");
        }
    }

    #[test]
    fn output_count_and_first_sample_dropped() {
        let fs = 1000.0;
        let x = vec![1.0; 1000];
        let w = RmsWindow::new(10.0, 0.0).expect("valid");
        let series = windowed_rms(&x, fs, w).expect("rms");
        // floor(1 s / 10 ms) windows minus the dropped first one.
        assert_eq!(series.len(), 99);
        assert!((series.times[0] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn invalid_windows_rejected() {
        assert_eq!(RmsWindow::new(0.5, 0.0), Err(WaveformError::WindowTooSmall(0.5)));
        assert!(matches!(
            RmsWindow::new(10.0, 10.0),
            Err(WaveformError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn bad_sample_rate_rejected() {
        let err = windowed_rms(&[0.0; 10], 0.0, RmsWindow::default()).unwrap_err();
        assert_eq!(err, WaveformError::SampleRate(0.0));
    }

    #[test]
    fn window_past_the_end_is_an_error() {
        // At 1 Hz the window centred at 1.5 s starts on the last sample.
        let w = RmsWindow::new(1000.0, 500.0).expect("valid");
        let err = windowed_rms(&[1.0, 2.0], 1.0, w).unwrap_err();
        assert_eq!(err, WaveformError::EmptyWindow { time: 1.5 });
    }

    #[test]
    fn shifted_series_moves_times() {
        let s = RmsSeries {
            times: vec![0.0, 1.0],
            values: vec![2.0, 3.0],
        }
        .shifted(10.0);
        assert_eq!(s.times, vec![10.0, 11.0]);
    }
}
