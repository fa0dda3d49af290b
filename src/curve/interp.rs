//! Linear interpolation with explicit per-end extrapolation.

use log::trace;
use serde::{Deserialize, Serialize};

use super::model::Curve;
use crate::error::CurveError;

/// What a query beyond one end of a curve evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Extrapolation {
    /// The y value of the end point.
    Hold,
    /// A fixed value.
    Value(f64),
    /// No finite bound, reported as `f64::INFINITY`.
    Unbounded,
}

impl Extrapolation {
    /// Value for a query beyond an end whose y is `end_y`.
    pub fn resolve(self, end_y: f64) -> f64 {
        match self {
            Self::Hold => end_y,
            Self::Value(v) => v,
            Self::Unbounded => f64::INFINITY,
        }
    }
}

/// Evaluates a [`Curve`] at a query point.
///
/// The two policies apply to queries strictly beyond the first and the last
/// point in index order. Inside the range, segments are scanned in index order
/// with inclusive bounds and the first containing segment wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interpolator {
    /// Policy beyond the first point.
    pub first: Extrapolation,
    /// Policy beyond the last point.
    pub last: Extrapolation,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::FLAT
    }
}

impl Interpolator {
    /// Flat extrapolation at both ends, used for power and var curves.
    pub const FLAT: Self = Self {
        first: Extrapolation::Hold,
        last: Extrapolation::Hold,
    };

    /// Creates an interpolator with the given end policies.
    pub const fn new(first: Extrapolation, last: Extrapolation) -> Self {
        Self { first, last }
    }

    /// Returns the y value of `curve` at `x`.
    ///
    /// # Errors
    ///
    /// * [`CurveError::InvalidQuery`] if `x` is not finite.
    /// * [`CurveError::DegenerateSegment`] if the first segment containing
    ///   `x` has zero length.
    pub fn evaluate(&self, curve: &Curve, x: f64) -> Result<f64, CurveError> {
        if !x.is_finite() {
            return Err(CurveError::InvalidQuery {
                label: curve.label().to_string(),
                x,
            });
        }

        let points = curve.points();
        let first = curve.first();
        let last = curve.last();
        let (lo, hi) = if first.x <= last.x {
            (first.x, last.x)
        } else {
            (last.x, first.x)
        };

        if x < lo || x > hi {
            // Closer to the first point's side means beyond the first point.
            let beyond_first = (x - first.x).abs() <= (x - last.x).abs();
            let y = if beyond_first {
                self.first.resolve(first.y)
            } else {
                self.last.resolve(last.y)
            };
            trace!("{}: x = {x} outside [{lo}, {hi}], extrapolated to {y}", curve.label());
            return Ok(y);
        }

        if points.len() == 1 {
            return Ok(first.y);
        }

        for (offset, seg) in points.windows(2).enumerate() {
            let (a, b) = (seg[0], seg[1]);
            if x < a.x.min(b.x) || x > a.x.max(b.x) {
                continue;
            }
            if a.x == b.x {
                return Err(CurveError::DegenerateSegment {
                    label: curve.label().to_string(),
                    index: curve.index_start() + offset,
                    x: a.x,
                });
            }
            if x == a.x {
                return Ok(a.y);
            }
            if x == b.x {
                return Ok(b.y);
            }
            return Ok(a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x));
        }

        // Monotonic x guarantees the segments cover [lo, hi].
        Ok(last.y)
    }
}

/// Evaluates `curve` at `x` with flat extrapolation at both ends.
///
/// # Errors
///
/// See [`Interpolator::evaluate`].
pub fn curve_lookup(curve: &Curve, x: f64) -> Result<f64, CurveError> {
    Interpolator::FLAT.evaluate(curve, x)
}
