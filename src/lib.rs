//! Curve evaluation and ride-through timing for DER certification testing.
//!
//! Piecewise-linear control curves, tolerance bands (including the signed
//! power-factor band), ride-through response prediction and the waveform
//! pipeline that measures trip times in captured voltage and current.

pub mod band;
pub mod config;
pub mod curve;
pub mod error;
/// Frequency-watt and volt-var screens.
pub mod functions;
pub mod io;
pub mod measurement;
pub mod report;
pub mod ride_through;
pub mod synth;
pub mod waveform;
