//! Shared test fixtures for integration tests.

use std::path::Path;

use der_cert::curve::Curve;
use der_cert::io::write_capture;
use der_cert::ride_through::{Axis, CurvePair, RideThroughCurves};
use der_cert::synth::SyntheticCapture;
use der_cert::waveform::Capture;

/// Low-frequency must-trip curve: 50 % at 0 s, 57 % at 0.16 s, 59 % at 1 s.
pub fn low_trip_curve() -> Curve {
    Curve::new("LFRT must-trip", &[(50.0, 0.0), (57.0, 0.16), (59.0, 1.0)])
        .expect("fixture curve is valid")
}

/// Frequency curve set with only the low must-trip curve, ride-through off.
pub fn low_only_curves() -> RideThroughCurves {
    RideThroughCurves::new(
        Axis::Frequency,
        None,
        Some(CurvePair::trip_only(1, low_trip_curve())),
        false,
    )
}

/// Default synthetic capture (24 kHz, 60 Hz, 240 V / 20 A, event at 0 s)
/// tripping `trip_after` seconds after the event.
pub fn synthetic(trip_after: Option<f64>) -> SyntheticCapture {
    SyntheticCapture {
        duration_s: 0.5,
        trip_after_s: trip_after,
        ..SyntheticCapture::default()
    }
}

/// Generates `synth` and writes it to `path`.
pub fn write_synthetic(synth: &SyntheticCapture, path: &Path) -> Capture {
    let capture = synth.generate().expect("synthetic capture generates");
    let file = std::fs::File::create(path).expect("capture file can be created");
    write_capture(&capture, std::io::BufWriter::new(file)).expect("capture writes");
    capture
}

/// Upper bound on how late a measured trip can be reported: the RMS window
/// reaches fully past the trip within half a window, then rounds up to the
/// next window step.
pub fn trip_lag_bound() -> f64 {
    let w = der_cert::waveform::RmsWindow::default();
    w.size_ms / 2000.0 + w.step_s() + 1e-3
}
