//! Deterministic synthetic ride-through captures.
//!
//! Produces sinusoidal voltage and current with a trigger channel that rises
//! when the disturbance starts. After the event the voltage amplitude and
//! frequency may change, and the current may drop to zero after a chosen
//! delay to mimic a trip.

use std::f64::consts::{PI, SQRT_2};

use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::error::WaveformError;
use crate::waveform::Capture;

/// Trigger channel level once the event has started.
pub const TRIGGER_HIGH: f64 = 5.0;

/// Parameters of a synthetic capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticCapture {
    /// Samples per second.
    pub sample_rate: f64,
    /// Line frequency before the event (Hz).
    pub line_hz: f64,
    /// RMS voltage before the event (V).
    pub voltage_rms: f64,
    /// RMS current while connected (A).
    pub current_rms: f64,
    /// Recording length after time zero (s).
    pub duration_s: f64,
    /// Recording length before time zero (s).
    pub pretrigger_s: f64,
    /// Time the disturbance starts (s).
    pub event_at_s: f64,
    /// Delay from the event to the trip; `None` rides through.
    pub trip_after_s: Option<f64>,
    /// Voltage during the event, percent of `voltage_rms`.
    pub event_voltage_pct: f64,
    /// Frequency during the event, percent of `line_hz`.
    pub event_freq_pct: f64,
    /// Standard deviation of additive noise on both channels.
    pub noise_std: f64,
    /// Random seed.
    pub seed: u64,
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self {
            sample_rate: 24_000.0,
            line_hz: 60.0,
            voltage_rms: 240.0,
            current_rms: 20.0,
            duration_s: 1.0,
            pretrigger_s: 0.1,
            event_at_s: 0.0,
            trip_after_s: Some(0.16),
            event_voltage_pct: 100.0,
            event_freq_pct: 100.0,
            noise_std: 0.0,
            seed: 42,
        }
    }
}

/// Standard normal sample scaled by `std_dev` (Box-Muller).
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}

impl SyntheticCapture {
    /// Time the current drops to zero, if it does.
    pub fn trip_at(&self) -> Option<f64> {
        self.trip_after_s.map(|d| self.event_at_s + d)
    }

    /// Generates the capture.
    ///
    /// # Errors
    ///
    /// Returns a [`WaveformError`] if the sample rate or length yields fewer
    /// than two samples.
    pub fn generate(&self) -> Result<Capture, WaveformError> {
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return Err(WaveformError::SampleRate(self.sample_rate));
        }
        let n = ((self.pretrigger_s + self.duration_s) * self.sample_rate).round() as usize;
        let dt = 1.0 / self.sample_rate;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let v_peak = self.voltage_rms * SQRT_2;
        let i_peak = self.current_rms * SQRT_2;
        let trip_at = self.trip_at();

        let mut time = Vec::with_capacity(n);
        let mut voltage = Vec::with_capacity(n);
        let mut current = Vec::with_capacity(n);
        let mut trigger = Vec::with_capacity(n);
        let mut phase = 0.0_f64;

        for i in 0..n {
            let t = -self.pretrigger_s + i as f64 * dt;
            let in_event = t >= self.event_at_s;
            let (v_scale, f_scale) = if in_event {
                (self.event_voltage_pct / 100.0, self.event_freq_pct / 100.0)
            } else {
                (1.0, 1.0)
            };
            let tripped = trip_at.is_some_and(|at| t >= at);

            time.push(t);
            voltage.push(v_peak * v_scale * phase.sin() + gaussian_noise(&mut rng, self.noise_std));
            let i_amp = if tripped { 0.0 } else { i_peak };
            current.push(i_amp * phase.sin() + gaussian_noise(&mut rng, self.noise_std));
            trigger.push(if in_event { TRIGGER_HIGH } else { 0.0 });

            phase = (phase + 2.0 * PI * self.line_hz * f_scale * dt) % (2.0 * PI);
        }

        debug!(
            "synthesized {n} samples at {} Hz, event at {} s, trip at {:?}",
            self.sample_rate, self.event_at_s, trip_at
        );
        Capture::new(time, voltage, current, Some(trigger))
    }
}
