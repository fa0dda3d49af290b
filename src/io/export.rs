//! CSV export for ride-through plan predictions.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::ride_through::PlannedPoint;

/// Column header for prediction export.
const HEADER: &str = "stimulus_pct,side,must_remain_s,must_trip_s,error";

/// Exports plan predictions to a CSV file at the given path.
///
/// # Arguments
///
/// * `points` - Planned test points
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_predictions_csv(points: &[PlannedPoint], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_predictions_csv(points, buf)
}

/// Writes plan predictions as CSV to any writer.
///
/// One row per point. Unbounded durations are written as `inf`; a point
/// that could not be predicted has empty duration columns and its error
/// message in the last column.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_predictions_csv(points: &[PlannedPoint], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(','))?;

    for p in points {
        let stimulus = format!("{:.4}", p.stimulus);
        match &p.prediction {
            Ok(r) => wtr.write_record(&[
                stimulus,
                r.side.to_string(),
                format_duration(r.must_remain),
                format_duration(r.must_trip),
                String::new(),
            ])?,
            Err(e) => wtr.write_record(&[stimulus, String::new(), String::new(), String::new(), e.to_string()])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

fn format_duration(seconds: f64) -> String {
    if seconds.is_finite() {
        format!("{seconds:.6}")
    } else {
        "inf".to_string()
    }
}
