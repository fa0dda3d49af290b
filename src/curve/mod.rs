//! Piecewise-linear control curves and their interpolation.

pub mod interp;
pub mod model;

pub use interp::{Extrapolation, Interpolator, curve_lookup};
pub use model::{Curve, CurvePoint, Direction};
