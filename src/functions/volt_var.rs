//! Volt-var reactive power targets and UL 1741 SA characteristic curves.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::band::ToleranceBand;
use crate::curve::{Curve, curve_lookup};
use crate::error::BandError;

/// Basis for a fixed reactive power setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedVarBasis {
    /// Percent of available vars, `sqrt(VA² - W²)`.
    VarAval,
    /// Percent of rated active power.
    WMax,
    /// Percent of rated vars.
    VarMax,
}

/// What the y axis of a volt-var curve is a percentage of.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VarReference {
    /// Watt priority: percent of vars left at rated power.
    WMax,
    /// Var priority: percent of rated vars.
    VarMax,
    /// A fixed setting independent of voltage.
    Fixed {
        /// Setting in percent of `basis`.
        pct: f64,
        /// Quantity the setting is a percentage of.
        basis: FixedVarBasis,
    },
}

impl VarReference {
    fn name(&self) -> &'static str {
        match self {
            Self::WMax => "wmax",
            Self::VarMax => "varmax",
            Self::Fixed { .. } => "fixed",
        }
    }
}

/// Nameplate ratings of the equipment under test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ratings {
    /// Rated active power (W).
    pub w_max: f64,
    /// Rated apparent power (VA).
    pub va_max: f64,
    /// Rated reactive power, quadrant 1 (var).
    pub var_max: f64,
}

impl Ratings {
    /// Reactive power available at rated active power.
    ///
    /// # Errors
    ///
    /// Returns [`BandError::Rating`] if `w_max` exceeds `va_max`.
    pub fn var_available(&self) -> Result<f64, BandError> {
        if self.w_max > self.va_max {
            return Err(BandError::Rating(format!(
                "w_max ({}) exceeds va_max ({})",
                self.w_max, self.va_max
            )));
        }
        Ok((self.va_max.powi(2) - self.w_max.powi(2)).sqrt())
    }
}

/// Reactive power band (var) at a measured voltage.
///
/// `var_range_pct` is a percentage of `var_max` applied on both sides.
///
/// # Errors
///
/// * [`BandError::MissingCurve`] if a curve-driven reference has no curve.
/// * [`BandError::Rating`] if the ratings are inconsistent.
/// * [`BandError::Curve`] if the curve cannot be evaluated at `volt_pct`.
pub fn var_band(
    reference: VarReference,
    curve: Option<&Curve>,
    volt_pct: f64,
    ratings: &Ratings,
    var_range_pct: f64,
) -> Result<ToleranceBand, BandError> {
    let target = match reference {
        VarReference::WMax => {
            let curve = curve.ok_or(BandError::MissingCurve(reference.name()))?;
            ratings.var_available()? * curve_lookup(curve, volt_pct)? / 100.0
        }
        VarReference::VarMax => {
            let curve = curve.ok_or(BandError::MissingCurve(reference.name()))?;
            ratings.var_max * curve_lookup(curve, volt_pct)? / 100.0
        }
        VarReference::Fixed { pct, basis } => {
            let base = match basis {
                FixedVarBasis::VarAval => ratings.var_available()?,
                FixedVarBasis::WMax => ratings.w_max,
                FixedVarBasis::VarMax => ratings.var_max,
            };
            base * pct / 100.0
        }
    };
    let band = ToleranceBand::symmetric(target, var_range_pct * ratings.var_max / 100.0)?;
    debug!("vv[{}]: v = {volt_pct:.3}%, vars {band}", reference.name());
    Ok(band)
}

/// The three UL 1741 SA volt-var characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VvTest {
    /// Characteristic 1: narrowest deadband, steepest slope, full vars.
    MostAggressive,
    /// Characteristic 2: average deadband and slope, half vars.
    Average,
    /// Characteristic 3: shallowest slope, quarter vars.
    LeastAggressive,
}

impl VvTest {
    /// All characteristics in test order.
    pub const ALL: [Self; 3] = [Self::MostAggressive, Self::Average, Self::LeastAggressive];
}

/// Equipment settings used to derive the characteristic curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VvCharacteristicInputs {
    /// Nominal voltage (V).
    pub v_nom: f64,
    /// Lowest voltage with the function enabled (V).
    pub v_min: f64,
    /// Highest voltage with the function enabled (V).
    pub v_max: f64,
    /// Maximum capacitive reactive power (var, positive).
    pub q_max_cap: f64,
    /// Maximum inductive reactive power (var, negative).
    pub q_max_ind: f64,
    /// Steepest supported slope (var/V).
    pub k_var_max: f64,
    /// Shallowest slope (var/V); derived when absent.
    pub k_var_min: Option<f64>,
    /// Narrowest deadband (V).
    pub deadband_min: f64,
    /// Widest deadband (V).
    pub deadband_max: f64,
}

impl Default for VvCharacteristicInputs {
    fn default() -> Self {
        Self {
            v_nom: 240.0,
            v_min: 211.2,
            v_max: 264.0,
            q_max_cap: 4400.0,
            q_max_ind: -4400.0,
            k_var_max: 800.0,
            k_var_min: None,
            deadband_min: 2.0,
            deadband_max: 10.0,
        }
    }
}

/// Resolved slopes and deadbands shared by the characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VvSlopes {
    /// Steepest slope (var/V).
    pub k_var_max: f64,
    /// Average slope (var/V).
    pub k_var_avg: f64,
    /// Shallowest slope (var/V).
    pub k_var_min: f64,
    /// Average deadband (V).
    pub deadband_avg: f64,
}

impl VvCharacteristicInputs {
    /// Validates the inputs and resolves the three slopes.
    ///
    /// When `k_var_min` is not supplied it is `(q_max_cap / 4) / (v_dev -
    /// deadband_max / 2)` with `v_dev = min(v_nom - v_min, v_max - v_nom)`.
    ///
    /// # Errors
    ///
    /// Returns [`BandError::Rating`] when the voltage range does not bracket
    /// nominal, a rating or deadband is out of range, or any slope is not
    /// finite and positive.
    pub fn slopes(&self) -> Result<VvSlopes, BandError> {
        let fail = |msg: String| Err(BandError::Rating(msg));
        if !(self.v_min < self.v_nom && self.v_nom < self.v_max) {
            return fail(format!(
                "voltage range must bracket nominal: {} < {} < {}",
                self.v_min, self.v_nom, self.v_max
            ));
        }
        if self.q_max_cap.is_nan() || self.q_max_cap <= 0.0 {
            return fail(format!("q_max_cap must be > 0, got {}", self.q_max_cap));
        }
        if self.q_max_ind.is_nan() || self.q_max_ind >= 0.0 {
            return fail(format!("q_max_ind must be < 0, got {}", self.q_max_ind));
        }
        if !(0.0 <= self.deadband_min && self.deadband_min <= self.deadband_max) {
            return fail(format!(
                "deadbands must satisfy 0 <= min <= max, got {} and {}",
                self.deadband_min, self.deadband_max
            ));
        }

        let k_var_min = match self.k_var_min {
            Some(k) => k,
            None => {
                let v_dev = (self.v_nom - self.v_min).min(self.v_max - self.v_nom);
                let span = v_dev - self.deadband_max / 2.0;
                if span <= 0.0 {
                    return fail(format!(
                        "half the widest deadband ({}) leaves no voltage range within {v_dev} V of nominal",
                        self.deadband_max / 2.0
                    ));
                }
                (self.q_max_cap / 4.0) / span
            }
        };
        for (name, k) in [("k_var_max", self.k_var_max), ("k_var_min", k_var_min)] {
            if !k.is_finite() || k <= 0.0 {
                return fail(format!("{name} must be finite and > 0, got {k}"));
            }
        }

        Ok(VvSlopes {
            k_var_max: self.k_var_max,
            k_var_avg: (k_var_min + self.k_var_max) / 2.0,
            k_var_min,
            deadband_avg: (self.deadband_min + self.deadband_max) / 2.0,
        })
    }

    /// Builds one characteristic curve.
    ///
    /// # Errors
    ///
    /// See [`VvCharacteristicInputs::slopes`].
    pub fn characteristic(&self, test: VvTest) -> Result<VvCharacteristic, BandError> {
        let s = self.slopes()?;
        let (deadband, k, q_scale) = match test {
            VvTest::MostAggressive => (self.deadband_min, s.k_var_max, 1.0),
            VvTest::Average => (s.deadband_avg, s.k_var_avg, 0.5),
            VvTest::LeastAggressive => (self.deadband_min, s.k_var_min, 0.25),
        };

        let q = [self.q_max_cap * q_scale, 0.0, 0.0, self.q_max_ind * q_scale];
        let v2 = self.v_nom - deadband / 2.0;
        let v3 = self.v_nom + deadband / 2.0;
        let v = [
            self.v_min,
            v2 - q[0].abs() / k,
            v2,
            v3,
            v3 + q[3].abs() / k,
            self.v_max,
        ];
        if v[1] < self.v_min || v[4] > self.v_max {
            warn!(
                "volt-var {test:?}: curve points {:.2} V / {:.2} V fall outside the enabled range",
                v[1], v[4]
            );
        }
        Ok(VvCharacteristic { test, v, q })
    }
}

/// One characteristic curve in volts and vars.
///
/// `v[1..=4]` with `q` are the points programmed into the equipment; `v[0]`
/// and `v[5]` are the enabled voltage limits bounding the outer segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VvCharacteristic {
    /// Which characteristic this is.
    pub test: VvTest,
    /// Voltages `v_min, V1, V2, V3, V4, v_max`.
    pub v: [f64; 6],
    /// Reactive power at V1..V4.
    pub q: [f64; 4],
}

impl VvCharacteristic {
    /// The four programmed points as a (volts, vars) curve.
    ///
    /// # Errors
    ///
    /// Returns [`BandError::Curve`] if the points are not monotonic.
    pub fn curve(&self) -> Result<Curve, BandError> {
        let points: Vec<(f64, f64)> = (0..4).map(|i| (self.v[i + 1], self.q[i])).collect();
        Ok(Curve::new(format!("vv {:?}", self.test), &points)?)
    }

    /// The curve in percent of nominal voltage and of `q_max_cap`.
    ///
    /// # Errors
    ///
    /// See [`VvCharacteristic::curve`].
    pub fn percent_curve(&self, v_nom: f64, q_max_cap: f64) -> Result<Curve, BandError> {
        Ok(self.curve()?.scaled(100.0 / v_nom, 100.0 / q_max_cap)?)
    }

    /// Test voltages along all five segments from `v_min` to `v_max`.
    ///
    /// Each segment contributes `count` interior points plus its end point;
    /// the final end point (`v_max`) is left out.
    pub fn sample_points(&self, count: usize) -> Vec<f64> {
        let mut points = Vec::with_capacity(5 * (count + 1));
        for seg in 0..5 {
            let pts = segment_points(self.v[seg], self.v[seg + 1], count);
            let end = if seg == 4 { pts.len() - 1 } else { pts.len() };
            points.extend_from_slice(&pts[1..end]);
        }
        points
    }
}

/// `count` evenly spaced points strictly between `start` and `end`, with both
/// ends included.
pub fn segment_points(start: f64, end: f64, count: usize) -> Vec<f64> {
    let interval = (end - start) / (count + 1) as f64;
    let mut points = Vec::with_capacity(count + 2);
    points.push(start);
    let mut last = start;
    for _ in 0..count {
        last += interval;
        points.push(last);
    }
    points.push(end);
    points
}

/// Test voltage (% nominal) part way along one line of a curve.
///
/// Line 1 runs from `v_min_pct` to the first point, line `n + 1` from the last
/// point to `v_max_pct`, and line `k` in between from point `k - 1` to point
/// `k`. Both ends are clamped to the enabled range before interpolating
/// `pct_along` percent of the way.
///
/// Returns `None` for a line outside `1..=n + 1`.
pub fn segment_test_voltage(
    curve: &Curve,
    line: usize,
    pct_along: f64,
    v_min_pct: f64,
    v_max_pct: f64,
) -> Option<f64> {
    let n = curve.len();
    let (start, end) = match line {
        0 => return None,
        1 => (v_min_pct, curve.first().x),
        l if l == n + 1 => (curve.last().x, v_max_pct),
        l if l <= n => (curve.points()[l - 2].x, curve.points()[l - 1].x),
        _ => return None,
    };
    let clamp = |v: f64| v.clamp(v_min_pct, v_max_pct);
    let (start, end) = (clamp(start), clamp(end));
    Some(start + (end - start) * pct_along / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> Ratings {
        Ratings {
            w_max: 3000.0,
            va_max: 5000.0,
            var_max: 4400.0,
        }
    }

    fn vv_curve() -> Curve {
        Curve::new("vv", &[(95.0, 100.0), (99.0, 0.0), (101.0, 0.0), (105.0, -100.0)])
            .expect("valid curve")
    }

    #[test]
    fn var_available_from_ratings() {
        assert_eq!(ratings().var_available().ok(), Some(4000.0));
    }

    #[test]
    fn var_priority_band() {
        let band = var_band(VarReference::VarMax, Some(&vv_curve()), 97.0, &ratings(), 10.0)
            .expect("band");
        assert!((band.target - 2200.0).abs() < 1e-9);
        assert!((band.upper - band.target - 440.0).abs() < 1e-9);
        assert!((band.target - band.lower - 440.0).abs() < 1e-9);
    }

    #[test]
    fn watt_priority_band_uses_available_vars() {
        let band = var_band(VarReference::WMax, Some(&vv_curve()), 90.0, &ratings(), 10.0)
            .expect("band");
        assert!((band.target - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_var_bases() {
        let r = ratings();
        let fixed = |basis| VarReference::Fixed { pct: 50.0, basis };
        let t = |basis| var_band(fixed(basis), None, 100.0, &r, 5.0).map(|b| b.target).ok();
        assert_eq!(t(FixedVarBasis::VarAval), Some(2000.0));
        assert_eq!(t(FixedVarBasis::WMax), Some(1500.0));
        assert_eq!(t(FixedVarBasis::VarMax), Some(2200.0));
    }

    #[test]
    fn curve_mode_without_curve_is_an_error() {
        let err = var_band(VarReference::VarMax, None, 100.0, &ratings(), 5.0).unwrap_err();
        assert_eq!(err, BandError::MissingCurve("varmax"));
    }

    #[test]
    fn watts_above_va_rejected() {
        let r = Ratings {
            w_max: 6000.0,
            ..ratings()
        };
        assert!(matches!(r.var_available(), Err(BandError::Rating(_))));
    }

    #[test]
    fn derived_k_var_min() {
        let inputs = VvCharacteristicInputs::default();
        let s = inputs.slopes().expect("valid inputs");
        // v_dev = min(28.8, 24.0) = 24, span = 24 - 5 = 19
        assert!((s.k_var_min - 1100.0 / 19.0).abs() < 1e-9);
        assert!((s.k_var_avg - (1100.0 / 19.0 + 800.0) / 2.0).abs() < 1e-9);
        assert_eq!(s.deadband_avg, 6.0);
    }

    #[test]
    fn zero_k_var_min_is_a_precondition_error() {
        let inputs = VvCharacteristicInputs {
            k_var_min: Some(0.0),
            ..VvCharacteristicInputs::default()
        };
        assert!(matches!(inputs.slopes(), Err(BandError::Rating(_))));
    }

    #[test]
    fn deadband_wider_than_range_rejected() {
        let inputs = VvCharacteristicInputs {
            deadband_max: 48.0,
            ..VvCharacteristicInputs::default()
        };
        assert!(matches!(inputs.slopes(), Err(BandError::Rating(_))));
    }

    #[test]
    fn most_aggressive_points() {
        let inputs = VvCharacteristicInputs::default();
        let c = inputs.characteristic(VvTest::MostAggressive).expect("valid");
        assert_eq!(c.v[2], 239.0);
        assert_eq!(c.v[3], 241.0);
        assert!((c.v[1] - (239.0 - 5.5)).abs() < 1e-12);
        assert!((c.v[4] - (241.0 + 5.5)).abs() < 1e-12);
        assert_eq!(c.q, [4400.0, 0.0, 0.0, -4400.0]);
        assert_eq!((c.v[0], c.v[5]), (211.2, 264.0));
    }

    #[test]
    fn least_aggressive_uses_quarter_vars() {
        let inputs = VvCharacteristicInputs::default();
        let c = inputs.characteristic(VvTest::LeastAggressive).expect("valid");
        assert_eq!(c.q, [1100.0, 0.0, 0.0, -1100.0]);
        // Quarter vars over the derived shallow slope spans 19 V.
        assert!((c.v[1] - (239.0 - 19.0)).abs() < 1e-9);
    }

    #[test]
    fn percent_curve_scales_axes() {
        let inputs = VvCharacteristicInputs::default();
        let c = inputs.characteristic(VvTest::Average).expect("valid");
        let pct = c.percent_curve(inputs.v_nom, inputs.q_max_cap).expect("valid");
        assert!((pct.first().y - 50.0).abs() < 1e-12);
        assert!((pct.last().y - (-50.0)).abs() < 1e-12);
        assert!(pct.points()[1].x < 100.0 && pct.points()[2].x > 100.0);
    }

    #[test]
    fn segment_points_include_ends() {
        let p = segment_points(0.0, 4.0, 3);
        assert_eq!(p, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn sample_points_cover_all_segments() {
        let c = VvCharacteristicInputs::default()
            .characteristic(VvTest::MostAggressive)
            .expect("valid");
        let pts = c.sample_points(3);
        // 4 points on each of the first four segments, 3 on the last.
        assert_eq!(pts.len(), 19);
        assert!(pts.windows(2).all(|w| w[1] >= w[0]));
        assert!(pts.iter().all(|&v| v > c.v[0] && v < c.v[5]));
    }

    #[test]
    fn segment_test_voltage_clamps_to_range() {
        let c = vv_curve();
        assert_eq!(segment_test_voltage(&c, 1, 50.0, 90.0, 110.0), Some(92.5));
        assert_eq!(segment_test_voltage(&c, 3, 50.0, 90.0, 110.0), Some(100.0));
        assert_eq!(segment_test_voltage(&c, 5, 100.0, 90.0, 110.0), Some(110.0));
        // First point below the enabled minimum is clamped.
        assert_eq!(segment_test_voltage(&c, 1, 100.0, 96.0, 110.0), Some(96.0));
        assert_eq!(segment_test_voltage(&c, 6, 0.0, 90.0, 110.0), None);
    }
}
