//! Pass/fail tolerance bands.
//!
//! [`ToleranceBand`] is the symmetric band used for power, frequency and var
//! screens. The signed power-factor band lives in [`power_factor`].

pub mod power_factor;

use std::fmt;

use serde::Serialize;

use crate::curve::{Curve, Interpolator};
use crate::error::BandError;

pub use power_factor::{PfBand, PfTargets, pf_band, pf_out_of_range};

/// Target value with inclusive lower and upper pass/fail bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceBand {
    /// Expected value.
    pub target: f64,
    /// Lowest passing value.
    pub lower: f64,
    /// Highest passing value.
    pub upper: f64,
}

impl ToleranceBand {
    /// Builds `target ± allowance`.
    ///
    /// # Errors
    ///
    /// Returns a [`BandError`] if either value is not finite or the
    /// allowance is negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use der_cert::band::ToleranceBand;
    ///
    /// let band = ToleranceBand::symmetric(50.0, 5.0).unwrap();
    /// assert_eq!((band.lower, band.upper), (45.0, 55.0));
    /// ```
    pub fn symmetric(target: f64, allowance: f64) -> Result<Self, BandError> {
        check_finite("target", target)?;
        check_finite("allowance", allowance)?;
        if allowance < 0.0 {
            return Err(BandError::NegativeAllowance(allowance));
        }
        Ok(Self {
            target,
            lower: target - allowance,
            upper: target + allowance,
        })
    }

    /// Evaluates `curve` at `x` and builds the symmetric band around it.
    ///
    /// # Errors
    ///
    /// Returns a [`BandError`] if the curve cannot be evaluated at `x` or the
    /// allowance is invalid.
    pub fn from_curve(
        curve: &Curve,
        interp: &Interpolator,
        x: f64,
        allowance: f64,
    ) -> Result<Self, BandError> {
        let target = interp.evaluate(curve, x)?;
        Self::symmetric(target, allowance)
    }

    /// Whether `value` lies within `[lower, upper]`.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl fmt::Display for ToleranceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {:.4} [{:.4}, {:.4}]",
            self.target, self.lower, self.upper
        )
    }
}

pub(crate) fn check_finite(field: &'static str, value: f64) -> Result<(), BandError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BandError::NotFinite { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_band_is_exact() {
        let band = ToleranceBand::symmetric(50.0, 5.0).expect("valid band");
        assert_eq!(band.lower, 45.0);
        assert_eq!(band.upper, 55.0);
        assert_eq!(band.target, 50.0);
    }

    #[test]
    fn contains_is_inclusive() {
        let band = ToleranceBand::symmetric(50.0, 5.0).expect("valid band");
        assert!(band.contains(45.0));
        assert!(band.contains(55.0));
        assert!(!band.contains(55.0001));
    }

    #[test]
    fn zero_allowance_collapses_to_target() {
        let band = ToleranceBand::symmetric(-12.5, 0.0).expect("valid band");
        assert_eq!((band.lower, band.upper), (-12.5, -12.5));
    }

    #[test]
    fn negative_allowance_rejected() {
        assert_eq!(
            ToleranceBand::symmetric(1.0, -0.1),
            Err(BandError::NegativeAllowance(-0.1))
        );
    }

    #[test]
    fn non_finite_target_rejected() {
        assert!(matches!(
            ToleranceBand::symmetric(f64::NAN, 1.0),
            Err(BandError::NotFinite { field: "target", .. })
        ));
    }

    #[test]
    fn band_from_curve() {
        let c = Curve::new("fw", &[(100.0, 100.0), (100.333, 100.0), (103.0, 0.0)]).expect("valid");
        let band = ToleranceBand::from_curve(&c, &Interpolator::FLAT, 104.0, 5.0).expect("band");
        assert_eq!((band.lower, band.upper), (-5.0, 5.0));
    }
}
