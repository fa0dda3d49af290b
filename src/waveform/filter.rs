//! Butterworth lowpass as cascaded second-order sections, with zero-phase
//! forward-backward filtering.
//!
//! Poles of the analog prototype are pre-warped and mapped through the
//! bilinear transform one conjugate pair at a time; an odd order adds a
//! single first-order section. Every section has unity DC gain.

use std::f64::consts::PI;

use log::trace;

use crate::error::WaveformError;

/// One second-order section, `a0` normalized to 1.
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
    state: [f64; 2],
}

impl Biquad {
    /// Creates a section from numerator `[b0, b1, b2]` and denominator
    /// `[a1, a2]`.
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a, state: [0.0; 2] }
    }

    /// Numerator coefficients.
    pub fn numerator(&self) -> &[f64; 3] {
        &self.b
    }

    /// Denominator coefficients after the leading 1.
    pub fn denominator(&self) -> &[f64; 2] {
        &self.a
    }

    /// Gain at DC.
    pub fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Poles inside the unit circle (Jury conditions for a quadratic).
    pub fn is_stable(&self) -> bool {
        let [a1, a2] = self.a;
        a2.abs() < 1.0 && a1.abs() < 1.0 + a2
    }

    /// Loads the state a constant `input` would settle to.
    fn settle(&mut self, input: f64) {
        let g = self.dc_gain();
        self.state = [(g - self.b[0]) * input, (self.b[2] - self.a[1] * g) * input];
    }

    /// Processes one sample (Direct Form II Transposed).
    pub fn process_real(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state[0];
        self.state[0] = self.b[1] * input - self.a[0] * output + self.state[1];
        self.state[1] = self.b[2] * input - self.a[1] * output;
        output
    }
}

/// Digital Butterworth lowpass.
#[derive(Debug, Clone, PartialEq)]
pub struct Butterworth {
    order: usize,
    cutoff: f64,
    sections: Vec<Biquad>,
}

impl Butterworth {
    /// Designs a lowpass of `order` with cutoff `wn` normalized to Nyquist.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::FilterDesign`] unless `order >= 1` and
    /// `0 < wn < 1`.
    pub fn lowpass(order: usize, wn: f64) -> Result<Self, WaveformError> {
        if order == 0 || !(wn > 0.0 && wn < 1.0) {
            return Err(WaveformError::FilterDesign { order, cutoff: wn });
        }

        // Normalized sample rate of 2 puts Nyquist at 1.
        let fs = 2.0;
        let k = 2.0 * fs;
        let omega = prewarp(wn * fs / 2.0, fs);

        let mut sections = Vec::with_capacity(order.div_ceil(2));
        for i in 0..order / 2 {
            let theta = PI * (2 * i + order + 1) as f64 / (2 * order) as f64;
            let (re, im) = (omega * theta.cos(), omega * theta.sin());
            sections.push(bilinear_pair(re, re * re + im * im, k));
        }
        if order % 2 == 1 {
            sections.push(bilinear_real(-omega, k));
        }
        trace!("butterworth order {order}, wn {wn}: {} sections", sections.len());

        Ok(Self {
            order,
            cutoff: wn,
            sections,
        })
    }

    /// Filter order.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Cutoff normalized to Nyquist.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Second-order sections in processing order.
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Samples of odd extension added at each end by [`Butterworth::filtfilt`]:
    /// three times the length of the equivalent transfer-function polynomial.
    pub fn pad_len(&self) -> usize {
        3 * (self.order + 1)
    }

    /// Single forward pass with zero initial state.
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut sections = self.sections.clone();
        signal
            .iter()
            .map(|&x| sections.iter_mut().fold(x, |acc, s| s.process_real(acc)))
            .collect()
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// The signal is extended at both ends by point reflection about its end
    /// samples, and each pass starts from the steady state for its first
    /// sample, so a constant signal passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::SignalTooShort`] if the signal is not longer
    /// than [`Butterworth::pad_len`].
    pub fn filtfilt(&self, signal: &[f64]) -> Result<Vec<f64>, WaveformError> {
        let pad = self.pad_len();
        let n = signal.len();
        if n <= pad {
            return Err(WaveformError::SignalTooShort { len: n, needed: pad });
        }

        let first = signal[0];
        let last = signal[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend(signal[1..=pad].iter().rev().map(|x| 2.0 * first - x));
        extended.extend_from_slice(signal);
        extended.extend(signal[n - 1 - pad..n - 1].iter().rev().map(|x| 2.0 * last - x));

        let mut forward = self.settled_pass(&extended);
        forward.reverse();
        let mut backward = self.settled_pass(&forward);
        backward.reverse();

        Ok(backward[pad..pad + n].to_vec())
    }

    fn settled_pass(&self, signal: &[f64]) -> Vec<f64> {
        let mut sections = self.sections.clone();
        let mut level = signal.first().copied().unwrap_or(0.0);
        for s in &mut sections {
            s.settle(level);
            level *= s.dc_gain();
        }
        signal
            .iter()
            .map(|&x| sections.iter_mut().fold(x, |acc, s| s.process_real(acc)))
            .collect()
    }
}

/// Analog frequency for a digital cutoff `freq_hz` at sample rate `fs`.
fn prewarp(freq_hz: f64, fs: f64) -> f64 {
    2.0 * fs * (PI * freq_hz / fs).tan()
}

/// Lowpass section for the conjugate pole pair with real part `re` and
/// squared magnitude `mag_sq`.
fn bilinear_pair(re: f64, mag_sq: f64, k: f64) -> Biquad {
    let k2 = k * k;
    let d = k2 - 2.0 * k * re + mag_sq;
    let b0 = mag_sq / d;
    Biquad::new(
        [b0, 2.0 * b0, b0],
        [2.0 * (mag_sq - k2) / d, (k2 + 2.0 * k * re + mag_sq) / d],
    )
}

/// Lowpass section for a single real pole `p`.
fn bilinear_real(p: f64, k: f64) -> Biquad {
    let alpha = k - p;
    let b0 = -p / alpha;
    Biquad::new([b0, b0, 0.0], [-(k + p) / alpha, 0.0])
}
