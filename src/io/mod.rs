//! Capture file reading and writing, and CSV export of plan predictions.

pub mod capture;
pub mod export;

pub use capture::{parse_capture, read_capture, write_capture};
pub use export::{export_predictions_csv, write_predictions_csv};
