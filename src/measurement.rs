//! Where electrical measurements come from.
//!
//! A test bench usually has a data-acquisition system (DAS) and the
//! equipment's own telemetry. Readings are taken from the DAS when it can
//! provide them and from the equipment otherwise; a quantity neither can
//! provide is an error rather than a silent default.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::MeasurementError;
use crate::ride_through::TimingParams;

/// Quantity to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// Active power (W).
    Power,
    /// RMS current (A).
    Current,
    /// RMS voltage (V).
    Voltage,
    /// Frequency (Hz).
    Frequency,
    /// Power factor.
    PowerFactor,
    /// Reactive power (var).
    Var,
}

impl Measurement {
    /// Short name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Current => "current",
            Self::Voltage => "voltage",
            Self::Frequency => "frequency",
            Self::PowerFactor => "power factor",
            Self::Var => "reactive power",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can report a measurement.
pub trait MeasurementSource {
    /// Takes one reading of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a [`MeasurementError`] if the source cannot provide `kind`.
    fn read(&mut self, kind: Measurement) -> Result<f64, MeasurementError>;

    /// Human-readable source name.
    fn name(&self) -> &str;
}

/// Fixed readings, e.g. values entered by hand or replayed from a log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    name: String,
    values: BTreeMap<Measurement, f64>,
}

impl Readings {
    /// Creates an empty set of readings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Adds or replaces one reading.
    pub fn with(mut self, kind: Measurement, value: f64) -> Self {
        self.values.insert(kind, value);
        self
    }
}

impl MeasurementSource for Readings {
    fn read(&mut self, kind: Measurement) -> Result<f64, MeasurementError> {
        self.values.get(&kind).copied().ok_or_else(|| MeasurementError::Read {
            kind: kind.name(),
            source_name: self.name.clone(),
            reason: "not recorded".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads from `primary` first and falls back to `secondary`.
#[derive(Debug, Clone)]
pub struct Fallback<P, S> {
    /// Preferred source, usually the data-acquisition system.
    pub primary: Option<P>,
    /// Source used when the primary is absent or fails, usually the device.
    pub secondary: S,
}

impl<P: MeasurementSource, S: MeasurementSource> Fallback<P, S> {
    /// Creates a fallback chain; `primary` may be absent.
    pub fn new(primary: Option<P>, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: MeasurementSource, S: MeasurementSource> MeasurementSource for Fallback<P, S> {
    fn read(&mut self, kind: Measurement) -> Result<f64, MeasurementError> {
        if let Some(primary) = self.primary.as_mut() {
            match primary.read(kind) {
                Ok(v) => return Ok(v),
                Err(e) => debug!("{e}; trying {}", self.secondary.name()),
            }
        }
        self.secondary.read(kind).map_err(|e| {
            warn!("{e}");
            MeasurementError::Unavailable(kind.name())
        })
    }

    fn name(&self) -> &str {
        match &self.primary {
            Some(p) => p.name(),
            None => self.secondary.name(),
        }
    }
}

/// Device-reported power factor as a fraction.
///
/// Some devices report power factor in percent; anything above 1.0 in
/// magnitude is taken as percent.
pub fn normalize_device_pf(pf: f64) -> f64 {
    if pf.abs() > 1.0 { pf / 100.0 } else { pf }
}

/// Expected grid connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Exporting power.
    Connected,
    /// Ceased to energize.
    Disconnected,
}

impl ConnectionState {
    /// Whether measured power agrees with this state.
    ///
    /// Disconnected means at or below `threshold_w`; connected means at or
    /// above it.
    pub fn power_confirms(self, power_w: f64, threshold_w: f64) -> bool {
        match self {
            Self::Disconnected => power_w <= threshold_w,
            Self::Connected => power_w >= threshold_w,
        }
    }

    /// Reads power from `source` and checks it against this state.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`MeasurementError`].
    pub fn verify<M: MeasurementSource + ?Sized>(self, source: &mut M, threshold_w: f64) -> Result<bool, MeasurementError> {
        let power = source.read(Measurement::Power)?;
        let ok = self.power_confirms(power, threshold_w);
        debug!("{:?} check via {}: {power:.1} W against {threshold_w:.1} W -> {ok}", self, source.name());
        Ok(ok)
    }
}

/// How long to wait for a commanded state change to be confirmed (s).
///
/// A randomization window takes precedence over a timeout period; either
/// is extended by the verification delay.
pub fn verification_period(timing: &TimingParams, verification_delay: f64) -> f64 {
    if timing.time_window != 0.0 {
        timing.time_window + verification_delay
    } else if timing.timeout_period != 0.0 {
        timing.timeout_period + verification_delay
    } else {
        verification_delay
    }
}
