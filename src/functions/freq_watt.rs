//! Frequency-watt target power and pass/fail band.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::band::ToleranceBand;
use crate::curve::{Curve, Interpolator};
use crate::error::BandError;

/// Parameterized frequency-watt settings (FW21 form).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FwParams {
    /// Frequency deviation above nominal where curtailment starts (Hz).
    pub hz_str: f64,
    /// Curtailment gradient (% rated power per Hz).
    pub w_gra: f64,
    /// Nominal frequency (Hz).
    pub freq_ref: f64,
}

impl Default for FwParams {
    fn default() -> Self {
        Self {
            hz_str: 0.2,
            w_gra: 65.0,
            freq_ref: 60.0,
        }
    }
}

impl FwParams {
    /// Converts the parameters into a three-point (frequency %, power %) curve.
    ///
    /// Full power is held from nominal up to the start frequency, then falls
    /// with the configured gradient to zero.
    ///
    /// # Errors
    ///
    /// Returns a [`BandError`] if the gradient or nominal frequency is not
    /// positive, or the resulting curve is invalid.
    pub fn to_curve(&self) -> Result<Curve, BandError> {
        if self.w_gra.is_nan() || self.w_gra <= 0.0 {
            return Err(BandError::Rating(format!("w_gra must be > 0, got {}", self.w_gra)));
        }
        if self.freq_ref.is_nan() || self.freq_ref <= 0.0 {
            return Err(BandError::Rating(format!(
                "freq_ref must be > 0, got {}",
                self.freq_ref
            )));
        }
        let knee = 100.0 + (self.hz_str / self.freq_ref) * 100.0;
        let zero = 100.0 + (self.hz_str + 100.0 / self.w_gra) * (100.0 / self.freq_ref);
        Ok(Curve::new(
            "fw21",
            &[(100.0, 100.0), (knee, 100.0), (zero, 0.0)],
        )?)
    }
}

/// How the frequency-watt curve is supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum FwCurve {
    /// Derived from [`FwParams`].
    Parameterized(FwParams),
    /// Explicit (frequency %, power %) points.
    Pointwise(Curve),
}

impl FwCurve {
    /// Resolves to a concrete curve.
    ///
    /// # Errors
    ///
    /// See [`FwParams::to_curve`].
    pub fn curve(&self) -> Result<Curve, BandError> {
        match self {
            Self::Parameterized(p) => p.to_curve(),
            Self::Pointwise(c) => Ok(c.clone()),
        }
    }
}

/// Converts a frequency in Hz to percent of nominal.
pub fn freq_pct(freq_hz: f64, freq_ref: f64) -> f64 {
    freq_hz / freq_ref * 100.0
}

/// Target power band (% rated) at a measured frequency.
///
/// # Arguments
///
/// * `curve` - (frequency %, power %) curve
/// * `freq_pct` - Measured frequency, percent of nominal
/// * `power_range` - Allowed deviation, % rated power
///
/// # Errors
///
/// Returns a [`BandError`] if the curve cannot be evaluated at `freq_pct`.
pub fn power_band(curve: &Curve, freq_pct: f64, power_range: f64) -> Result<ToleranceBand, BandError> {
    let band = ToleranceBand::from_curve(curve, &Interpolator::FLAT, freq_pct, power_range)?;
    debug!("fw: f = {freq_pct:.3}%, power {band}");
    Ok(band)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fw21_defaults_convert_to_points() {
        let c = FwParams::default().to_curve().expect("valid params");
        let p = c.points();
        assert_eq!(p[0].x, 100.0);
        assert!((p[1].x - (100.0 + 0.2 / 60.0 * 100.0)).abs() < 1e-12);
        assert!((p[2].x - (100.0 + (0.2 + 100.0 / 65.0) * (100.0 / 60.0))).abs() < 1e-12);
        assert_eq!((p[0].y, p[1].y, p[2].y), (100.0, 100.0, 0.0));
    }

    #[test]
    fn full_power_below_start_frequency() {
        let c = FwParams::default().to_curve().expect("valid params");
        let band = power_band(&c, freq_pct(59.9, 60.0), 5.0).expect("band");
        assert_eq!(band.target, 100.0);
        assert_eq!((band.lower, band.upper), (95.0, 105.0));
    }

    #[test]
    fn curtailment_on_the_slope() {
        let c = FwParams::default().to_curve().expect("valid params");
        // 1 Hz above the start frequency curtails 65 % of rated power.
        let band = power_band(&c, freq_pct(61.2, 60.0), 5.0).expect("band");
        assert!((band.target - 35.0).abs() < 1e-9, "target {}", band.target);
    }

    #[test]
    fn zero_power_beyond_curve() {
        let c = FwParams::default().to_curve().expect("valid params");
        let band = power_band(&c, freq_pct(63.0, 60.0), 5.0).expect("band");
        assert_eq!(band.target, 0.0);
    }

    #[test]
    fn pointwise_curve_used_as_is() {
        let c = Curve::new("fw22", &[(100.0, 100.0), (101.0, 50.0)]).expect("valid");
        let fw = FwCurve::Pointwise(c.clone());
        assert_eq!(fw.curve().ok(), Some(c));
    }

    #[test]
    fn zero_gradient_rejected() {
        let p = FwParams {
            w_gra: 0.0,
            ..FwParams::default()
        };
        assert!(matches!(p.to_curve(), Err(BandError::Rating(_))));
    }
}
