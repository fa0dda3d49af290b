//! Error types shared across the curve, band, ride-through and waveform modules.

use thiserror::Error;

/// Errors raised while building or evaluating a piecewise-linear curve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve \"{label}\" has no points")]
    Empty { label: String },

    #[error("curve \"{label}\": index_start must be >= 1 and index_count >= 1 (got {start}, {count})")]
    BadRange {
        label: String,
        start: usize,
        count: usize,
    },

    #[error("curve \"{label}\": point {index} is missing from the point table")]
    MissingPoint { label: String, index: usize },

    #[error("curve \"{label}\": point {index} is not finite")]
    NotFinite { label: String, index: usize },

    #[error("curve \"{label}\": {axis} values are not monotonic at point {index}")]
    NonMonotonic {
        label: String,
        axis: &'static str,
        index: usize,
    },

    #[error("curve \"{label}\": segment starting at point {index} has zero length (x = {x})")]
    DegenerateSegment { label: String, index: usize, x: f64 },

    #[error("curve \"{label}\": query value {x} is not finite")]
    InvalidQuery { label: String, x: f64 },
}

/// Errors raised by the tolerance-band calculators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("allowance must be >= 0, got {0}")]
    NegativeAllowance(f64),

    #[error("power factor target must be within [-1, 1] and non-zero, got {0}")]
    PowerFactorTarget(f64),

    #[error("allowance {allowance} around power factor {target} would cross zero power factor")]
    PowerFactorWrap { target: f64, allowance: f64 },

    #[error("{0}")]
    Rating(String),

    #[error("volt-var mode {0} requires a curve")]
    MissingCurve(&'static str),

    #[error(transparent)]
    Curve(#[from] CurveError),
}

/// Errors raised by the ride-through response predictor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("stimulus {0} is not a finite percentage")]
    InvalidStimulus(f64),

    #[error("no {0} curve is configured")]
    MissingCurve(String),

    #[error(transparent)]
    Curve(#[from] CurveError),
}

/// Errors raised by the waveform analysis pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaveformError {
    #[error("window size must not be below 1 ms, got {0} ms")]
    WindowTooSmall(f64),

    #[error("overlap ({overlap} ms) must be smaller than the window size ({size} ms)")]
    OverlapTooLarge { size: f64, overlap: f64 },

    #[error("sample rate must be positive, got {0}")]
    SampleRate(f64),

    #[error("signal is empty")]
    EmptySignal,

    #[error("time must be strictly increasing: sample {index} at {time} s follows {previous} s")]
    TimeNotIncreasing { index: usize, previous: f64, time: f64 },

    #[error("window centred at {time:.6} s contains no samples")]
    EmptyWindow { time: f64 },

    #[error("channel lengths differ: time has {time} samples, {channel} has {len}")]
    LengthMismatch {
        channel: &'static str,
        time: usize,
        len: usize,
    },

    #[error("signal of {len} samples is too short for filtering, need more than {needed}")]
    SignalTooShort { len: usize, needed: usize },

    #[error("filter order must be >= 1 and cutoff within (0, 1) of Nyquist, got order {order}, cutoff {cutoff}")]
    FilterDesign { order: usize, cutoff: f64 },

    #[error("fewer than two zero crossings found")]
    NoCrossings,

    #[error("capture has no trigger channel")]
    NoTrigger,
}

/// Errors raised while reading or writing waveform capture files.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error(transparent)]
    Waveform(#[from] WaveformError),
}

/// Errors raised when a measurement cannot be obtained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasurementError {
    #[error("{kind} unavailable from {source_name}: {reason}")]
    Read {
        kind: &'static str,
        source_name: String,
        reason: String,
    },

    #[error("{0} unavailable from every configured source")]
    Unavailable(&'static str),
}
