//! Grid-support function screens built on curves and tolerance bands.

pub mod freq_watt;
pub mod volt_var;

pub use freq_watt::{FwCurve, FwParams, freq_pct, power_band};
pub use volt_var::{
    FixedVarBasis, Ratings, VarReference, VvCharacteristic, VvCharacteristicInputs, VvTest,
    segment_points, segment_test_voltage, var_band,
};
