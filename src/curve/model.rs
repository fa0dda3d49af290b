//! Piecewise-linear control curves with 1-based point indexing.

use std::collections::BTreeMap;
use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// One `(x, y)` sample of a control curve.
///
/// Both coordinates are percentages of the nominal or rated value of their
/// axis, except ride-through curves where `y` is a duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Input axis value (frequency %, voltage %, ...).
    pub x: f64,
    /// Output axis value (power %, VAr %, seconds, ...).
    pub y: f64,
}

impl CurvePoint {
    /// Creates a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for CurvePoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Walk direction of a curve's x values in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// x never decreases from one point to the next.
    Ascending,
    /// x never increases from one point to the next.
    Descending,
}

/// An immutable piecewise-linear curve.
///
/// Points keep the order they were configured in, which for ride-through
/// curves may run from far-from-nominal to near-nominal with x descending.
/// Construction guarantees at least one point, finite coordinates and x
/// values that are monotonic in one direction.
///
/// # Examples
///
/// ```
/// use der_cert::curve::{Curve, curve_lookup};
///
/// let fw = Curve::new("fw", &[(100.0, 100.0), (100.333, 100.0), (103.0, 0.0)]).unwrap();
/// assert_eq!(curve_lookup(&fw, 99.0).unwrap(), 100.0);
/// assert_eq!(curve_lookup(&fw, 104.0).unwrap(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    label: String,
    index_start: usize,
    points: Vec<CurvePoint>,
    direction: Direction,
}

impl Curve {
    /// Builds a curve from points numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns a [`CurveError`] if the slice is empty, a coordinate is not
    /// finite, or x is not monotonic.
    pub fn new<P>(label: impl Into<String>, points: &[P]) -> Result<Self, CurveError>
    where
        P: Copy + Into<CurvePoint>,
    {
        let points = points.iter().map(|&p| p.into()).collect();
        Self::build(label.into(), 1, points)
    }

    /// Builds a curve from a sub-range of a 1-based point table.
    ///
    /// Points `index_start ..= index_start + index_count - 1` are taken from
    /// `table`; other entries are ignored so one configured table can hold
    /// several curves.
    ///
    /// # Arguments
    ///
    /// * `label` - Name used in error and log messages
    /// * `table` - Mapping from 1-based index to point
    /// * `index_start` - First index of this curve (>= 1)
    /// * `index_count` - Number of points in this curve (>= 1)
    ///
    /// # Errors
    ///
    /// Returns a [`CurveError`] if the range is invalid, an index in the
    /// range is absent from the table, or the resulting curve is invalid.
    pub fn from_table(
        label: impl Into<String>,
        table: &BTreeMap<usize, CurvePoint>,
        index_start: usize,
        index_count: usize,
    ) -> Result<Self, CurveError> {
        let label = label.into();
        if index_start == 0 || index_count == 0 {
            return Err(CurveError::BadRange {
                label,
                start: index_start,
                count: index_count,
            });
        }

        let mut points = Vec::with_capacity(index_count);
        for index in index_start..index_start + index_count {
            match table.get(&index) {
                Some(p) => points.push(*p),
                None => return Err(CurveError::MissingPoint { label, index }),
            }
        }
        Self::build(label, index_start, points)
    }

    fn build(label: String, index_start: usize, points: Vec<CurvePoint>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty { label });
        }
        if let Some(pos) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(CurveError::NotFinite {
                label,
                index: index_start + pos,
            });
        }

        let first = points[0].x;
        let last = points[points.len() - 1].x;
        let direction = if last < first {
            Direction::Descending
        } else {
            Direction::Ascending
        };

        let curve = Self {
            label,
            index_start,
            points,
            direction,
        };
        curve.check_monotonic("x", |p| p.x, direction)?;
        Ok(curve)
    }

    /// Checks that y never decreases in index order.
    ///
    /// Ride-through curves store durations in y, which must grow toward
    /// nominal.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::NonMonotonic`] naming the first offending point.
    pub fn check_monotonic_y(&self) -> Result<(), CurveError> {
        self.check_monotonic("time", |p| p.y, Direction::Ascending)
    }

    fn check_monotonic(
        &self,
        axis: &'static str,
        value: impl Fn(&CurvePoint) -> f64,
        direction: Direction,
    ) -> Result<(), CurveError> {
        for (offset, pair) in self.points.windows(2).enumerate() {
            let (a, b) = (value(&pair[0]), value(&pair[1]));
            let ok = match direction {
                Direction::Ascending => b >= a,
                Direction::Descending => b <= a,
            };
            if !ok {
                let index = self.index_start + offset + 1;
                error!(
                    "curve \"{}\": {axis} value {b} at point {index} breaks monotonic order after {a}",
                    self.label
                );
                return Err(CurveError::NonMonotonic {
                    label: self.label.clone(),
                    axis,
                    index,
                });
            }
        }
        Ok(())
    }

    /// Name used in messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; an empty curve cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 1-based index of the first point.
    pub fn index_start(&self) -> usize {
        self.index_start
    }

    /// 1-based index of the last point.
    pub fn index_end(&self) -> usize {
        self.index_start + self.points.len() - 1
    }

    /// Returns the point at a 1-based index, if it belongs to this curve.
    pub fn point(&self, index: usize) -> Option<CurvePoint> {
        index
            .checked_sub(self.index_start)
            .and_then(|i| self.points.get(i))
            .copied()
    }

    /// All points in index order.
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// First point in index order.
    pub fn first(&self) -> CurvePoint {
        self.points[0]
    }

    /// Last point in index order.
    pub fn last(&self) -> CurvePoint {
        self.points[self.points.len() - 1]
    }

    /// Walk direction of x.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Largest y value on the curve.
    pub fn max_y(&self) -> f64 {
        self.points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Returns a copy scaled point-wise, e.g. to convert volts to percent.
    ///
    /// # Errors
    ///
    /// Returns a [`CurveError`] if the scaled points are not finite.
    pub fn scaled(&self, x_scale: f64, y_scale: f64) -> Result<Self, CurveError> {
        let points = self
            .points
            .iter()
            .map(|p| CurvePoint::new(p.x * x_scale, p.y * y_scale))
            .collect();
        Self::build(self.label.clone(), self.index_start, points)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.label)?;
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", p.x, p.y)?;
        }
        write!(f, "]")
    }
}
