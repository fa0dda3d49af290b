//! Signed power-factor bands that wrap across unity.
//!
//! Power factor is signed: positive values are leading (capacitive,
//! quadrant 4) and negative values lagging (inductive, quadrant 1). Unity
//! (`1.0` / `-1.0`) joins the two halves, so a band that extends past unity
//! continues on the other sign.

use std::fmt;

use serde::Serialize;

use super::check_finite;
use crate::error::BandError;

/// A power-factor band whose bounds may lie on opposite signs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PfBand {
    /// Commanded power factor.
    pub target: f64,
    /// Lower bound on the signed scale.
    pub lower: f64,
    /// Upper bound on the signed scale, wrapped past unity when needed.
    pub upper: f64,
}

impl PfBand {
    /// Whether the band runs through unity onto the other sign.
    pub fn spans_unity(&self) -> bool {
        self.lower * self.upper < 0.0
    }

    /// Whether a measured power factor passes.
    pub fn contains(&self, pf: f64) -> bool {
        !pf_out_of_range(pf, self)
    }
}

impl fmt::Display for PfBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PF target {:.4}, lower {:.4}, upper {:.4}{}",
            self.target,
            self.lower,
            self.upper,
            if self.spans_unity() { " (wraps unity)" } else { "" }
        )
    }
}

/// Builds the band `target ± allowance` on the signed power-factor scale.
///
/// # Errors
///
/// Returns a [`BandError`] if a value is not finite, the target is zero or
/// outside `[-1, 1]`, the allowance is negative, or the allowance reaches
/// zero power factor on the far side of the target.
///
/// # Examples
///
/// ```
/// use der_cert::band::{pf_band, pf_out_of_range};
///
/// let band = pf_band(0.97, 0.05).unwrap();
/// assert!((band.upper - (-1.0 + (0.05 - 0.03))).abs() < 1e-12);
/// assert!(!pf_out_of_range(0.96, &band));
/// assert!(pf_out_of_range(0.80, &band));
/// ```
pub fn pf_band(target: f64, allowance: f64) -> Result<PfBand, BandError> {
    check_finite("power factor", target)?;
    check_finite("allowance", allowance)?;
    if target == 0.0 || target.abs() > 1.0 {
        return Err(BandError::PowerFactorTarget(target));
    }
    if allowance < 0.0 {
        return Err(BandError::NegativeAllowance(allowance));
    }
    if allowance >= target.abs() {
        return Err(BandError::PowerFactorWrap { target, allowance });
    }

    let (upper, lower) = if target < 0.0 && allowance - target >= 1.0 {
        (target + allowance, 1.0 - (allowance - (1.0 + target)))
    } else if target > 0.0 && allowance + target > 1.0 {
        ((allowance - (1.0 - target)) - 1.0, target - allowance)
    } else {
        (target + allowance, target - allowance)
    };

    Ok(PfBand {
        target,
        lower,
        upper,
    })
}

/// Returns `true` when `pf` falls outside `band`.
///
/// A band spanning unity is tested one-sided, picking the side from the sign
/// of `pf`; otherwise the test is two-sided and exclusive. The target itself
/// is always in range, so a zero allowance still accepts an exact match
/// (`1.0` and `-1.0` both being unity).
pub fn pf_out_of_range(pf: f64, band: &PfBand) -> bool {
    if pf == band.target || (pf.abs() == 1.0 && band.target.abs() == 1.0) {
        return false;
    }
    let in_range = if band.spans_unity() {
        (pf > 0.0 && pf > band.lower) || (pf <= 0.0 && pf < band.upper)
    } else {
        band.lower < pf && pf < band.upper
    };
    !in_range
}

/// Fixed power-factor test targets derived from the rated minimums.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PfTargets {
    /// Minimum injection (inductive) power factor.
    pub min_ind: f64,
    /// Midpoint between unity and the inductive minimum.
    pub mid_ind: f64,
    /// Minimum absorption (capacitive) power factor.
    pub min_cap: f64,
    /// Midpoint between unity and the capacitive minimum.
    pub mid_cap: f64,
}

impl PfTargets {
    /// Derives midpoints as `(1 + min_ind) / 2` and `(-1 + min_cap) / 2`.
    pub fn from_minimums(min_ind: f64, min_cap: f64) -> Self {
        Self {
            min_ind,
            mid_ind: (1.0 + min_ind) / 2.0,
            min_cap,
            mid_cap: (-1.0 + min_cap) / 2.0,
        }
    }

    /// Targets in test order.
    pub fn all(&self) -> [f64; 4] {
        [self.min_ind, self.mid_ind, self.min_cap, self.mid_cap]
    }
}
