//! Tab-delimited waveform capture files.
//!
//! One header row naming the channels, then one row per sample. The
//! `time`, `ac_voltage` and `ac_current` columns are required; `trigger` is
//! optional. Column order is free and header names are case-insensitive.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use log::info;

use crate::error::CaptureError;
use crate::waveform::Capture;

const TIME: &str = "time";
const VOLTAGE: &str = "ac_voltage";
const CURRENT: &str = "ac_current";
const TRIGGER: &str = "trigger";

/// Reads a capture file from disk.
///
/// # Errors
///
/// Returns a [`CaptureError`] if the file cannot be opened or parsed.
pub fn read_capture(path: &Path) -> Result<Capture, CaptureError> {
    let file = File::open(path)?;
    let capture = parse_capture(io::BufReader::new(file))?;
    info!(
        "read {} samples at {:.1} Hz from {}",
        capture.len(),
        capture.sample_rate,
        path.display()
    );
    Ok(capture)
}

/// Parses a capture from any reader.
///
/// # Errors
///
/// * [`CaptureError::Malformed`] for a missing column or a value that is not
///   a number, naming the 1-based line.
/// * [`CaptureError::Csv`] for a structurally broken row.
/// * [`CaptureError::Waveform`] if the samples do not form a valid capture.
pub fn parse_capture(reader: impl Read) -> Result<Capture, CaptureError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let missing = |name: &str| CaptureError::Malformed {
        line: 1,
        message: format!("missing required column \"{name}\""),
    };
    let time_col = column(TIME).ok_or_else(|| missing(TIME))?;
    let volt_col = column(VOLTAGE).ok_or_else(|| missing(VOLTAGE))?;
    let curr_col = column(CURRENT).ok_or_else(|| missing(CURRENT))?;
    let trig_col = column(TRIGGER);

    let mut time = Vec::new();
    let mut voltage = Vec::new();
    let mut current = Vec::new();
    let mut trigger = trig_col.map(|_| Vec::new());

    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let value = |col: usize, name: &str| -> Result<f64, CaptureError> {
            let raw = record.get(col).ok_or_else(|| CaptureError::Malformed {
                line,
                message: format!("missing value for \"{name}\""),
            })?;
            raw.parse::<f64>().map_err(|_| CaptureError::Malformed {
                line,
                message: format!("\"{raw}\" in column \"{name}\" is not a number"),
            })
        };
        time.push(value(time_col, TIME)?);
        voltage.push(value(volt_col, VOLTAGE)?);
        current.push(value(curr_col, CURRENT)?);
        if let (Some(col), Some(values)) = (trig_col, trigger.as_mut()) {
            values.push(value(col, TRIGGER)?);
        }
    }

    Ok(Capture::new(time, voltage, current, trigger)?)
}

/// Writes a capture in the same tab-delimited format.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_capture(capture: &Capture, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    match &capture.trigger {
        Some(_) => wtr.write_record([TIME, VOLTAGE, CURRENT, TRIGGER])?,
        None => wtr.write_record([TIME, VOLTAGE, CURRENT])?,
    }

    for i in 0..capture.len() {
        let mut row = vec![
            capture.time[i].to_string(),
            capture.voltage[i].to_string(),
            capture.current[i].to_string(),
        ];
        if let Some(trigger) = &capture.trigger {
            row.push(trigger[i].to_string());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaveformError;

    const SAMPLE: &str = "time\tac_voltage\tac_current\ttrigger\n\
                          0.000\t0.0\t0.0\t0\n\
                          0.001\t10.0\t1.0\t0\n\
                          0.002\t-10.0\t-1.0\t5\n";

    #[test]
    fn parses_all_channels() {
        let c = parse_capture(SAMPLE.as_bytes()).expect("valid capture");
        assert_eq!(c.len(), 3);
        assert_eq!(c.voltage, vec![0.0, 10.0, -10.0]);
        assert_eq!(c.trigger, Some(vec![0.0, 0.0, 5.0]));
        assert!((c.sample_rate - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn trigger_is_optional_and_order_free() {
        let text = "AC_Current\tTime\tAC_Voltage\n1\t0\t2\n3\t0.5\t4\n";
        let c = parse_capture(text.as_bytes()).expect("valid capture");
        assert_eq!(c.time, vec![0.0, 0.5]);
        assert_eq!(c.current, vec![1.0, 3.0]);
        assert_eq!(c.trigger, None);
    }

    #[test]
    fn bad_number_reports_line() {
        let text = "time\tac_voltage\tac_current\n0\t1\t2\n0.1\tx\t2\n";
        match parse_capture(text.as_bytes()) {
            Err(CaptureError::Malformed { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("ac_voltage"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_column_reported() {
        let text = "time\tac_voltage\n0\t1\n";
        assert!(matches!(
            parse_capture(text.as_bytes()),
            Err(CaptureError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn too_few_samples() {
        let text = "time\tac_voltage\tac_current\n0\t1\t2\n";
        assert!(matches!(
            parse_capture(text.as_bytes()),
            Err(CaptureError::Waveform(WaveformError::EmptySignal))
        ));
    }

    #[test]
    fn written_capture_reads_back() {
        let c = parse_capture(SAMPLE.as_bytes()).expect("valid capture");
        let mut buf = Vec::new();
        write_capture(&c, &mut buf).expect("write");
        let back = parse_capture(buf.as_slice()).expect("re-read");
        assert_eq!(back, c);
    }
}
