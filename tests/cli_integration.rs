//! End-to-end runs of the `der-cert` binary.

use std::path::Path;
use std::process::{Command, Output};

fn der_cert(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_der-cert"))
        .args(args)
        .output()
        .expect("der-cert process should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout should be valid UTF-8")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is UTF-8")
}

#[test]
fn plan_prints_summary_for_preset() {
    let output = der_cert(&["plan", "--preset", "vrt_rule21"]);
    assert_success(&output, "plan");

    let text = stdout(&output);
    assert!(text.contains("--- Voltage Ride-Through Plan ---"), "{text}");
    assert!(text.contains("Test points:           8"), "{text}");
    assert!(text.contains("Failed predictions:    0"), "{text}");
}

#[test]
fn plan_json_reports_unbounded_times_as_null() {
    let output = der_cert(&["plan", "--json"]);
    assert_success(&output, "plan --json");

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(report["axis"], "frequency");
    assert_eq!(report["failed"], 0);
    let points = report["points"].as_array().expect("points array");
    assert_eq!(points.len(), 8);
    assert!(
        points.iter().any(|p| p["prediction"]["must_trip"].is_null()),
        "points inside both curves have no trip requirement"
    );
}

#[test]
fn plan_writes_predictions_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv_path = dir.path().join("predictions.csv");
    let output = der_cert(&[
        "plan",
        "--config",
        "plans/ieee1547_cat2.toml",
        "--predictions-out",
        path_arg(&csv_path),
    ]);
    assert_success(&output, "plan --predictions-out");

    let contents = std::fs::read_to_string(&csv_path).expect("csv written");
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("stimulus_pct,side,must_remain_s,must_trip_s,error"));
    assert_eq!(lines.count(), 8);
}

#[test]
fn prompt_trip_passes_analysis() {
    let dir = tempfile::tempdir().expect("temp dir");
    let capture = dir.path().join("prompt.tsv");
    assert_success(
        &der_cert(&["synth", path_arg(&capture), "--trip-after", "0.1"]),
        "synth",
    );

    let output = der_cert(&["analyze", path_arg(&capture), "--stimulus", "104.333"]);
    assert_success(&output, "analyze");
    let text = stdout(&output);
    assert!(text.contains("Verdict:               PASS"), "{text}");
    assert!(text.contains("Result:                PASS"), "{text}");
}

#[test]
fn missed_trip_fails_analysis() {
    let dir = tempfile::tempdir().expect("temp dir");
    let capture = dir.path().join("stuck.tsv");
    assert_success(&der_cert(&["synth", path_arg(&capture), "--no-trip"]), "synth");

    let output = der_cert(&["analyze", path_arg(&capture), "--stimulus", "104.333"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("Result:                FAIL"), "{text}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ride-through test failed"), "{stderr}");
}

#[test]
fn analyze_without_stimulus_only_measures() {
    let dir = tempfile::tempdir().expect("temp dir");
    let capture = dir.path().join("measure.tsv");
    assert_success(&der_cert(&["synth", path_arg(&capture)]), "synth");

    let output = der_cert(&["analyze", path_arg(&capture)]);
    assert_success(&output, "analyze");
    let text = stdout(&output);
    assert!(text.contains("Outcome:               tripped after"), "{text}");
    assert!(text.contains("No verdicts (no stimulus given)"), "{text}");
}

#[test]
fn bad_point_does_not_hide_other_verdicts() {
    let dir = tempfile::tempdir().expect("temp dir");
    let first = dir.path().join("first.tsv");
    let second = dir.path().join("second.tsv");
    for path in [&first, &second] {
        assert_success(&der_cert(&["synth", path_arg(path), "--trip-after", "0.1"]), "synth");
    }

    let output = der_cert(&[
        "analyze",
        path_arg(&first),
        path_arg(&second),
        "--stimulus",
        "104.333",
        "--stimulus",
        "NaN",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("Verdict:               PASS"), "{text}");
    assert!(text.contains("Verdict:               INCONCLUSIVE"), "{text}");
    assert!(text.contains("Error:                 "), "{text}");
    assert!(text.contains("Verdicts:              1 pass, 0 fail, 1 inconclusive"), "{text}");
    assert!(text.contains("Result:                FAIL"), "{text}");
}

#[test]
fn unreadable_capture_is_reported_with_the_rest() {
    let dir = tempfile::tempdir().expect("temp dir");
    let good = dir.path().join("good.tsv");
    let missing = dir.path().join("missing.tsv");
    assert_success(&der_cert(&["synth", path_arg(&good)]), "synth");

    let output = der_cert(&["analyze", path_arg(&good), path_arg(&missing)]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("Outcome:               tripped after"), "{text}");
    assert!(text.contains("Error:                 failed to read"), "{text}");
    assert!(text.contains("Errors:                1"), "{text}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not be analysed"), "{stderr}");
}

#[test]
fn freq_watt_band_from_plan() {
    let output = der_cert(&[
        "freq-watt", "--preset", "frt_rule21", "--freq", "60.6", "--power", "80",
    ]);
    assert_success(&output, "freq-watt");
    let text = stdout(&output);
    assert!(text.contains("power % target 74.0000 [69.0000, 79.0000]"), "{text}");
    assert!(text.contains("80: out of range"), "{text}");
}

#[test]
fn volt_var_band_from_plan_ratings() {
    let output = der_cert(&[
        "volt-var", "--config", "plans/vrt_rule21.toml", "--volt", "216", "--var", "4000",
    ]);
    assert_success(&output, "volt-var");
    let text = stdout(&output);
    assert!(text.contains("var target 4400.0000 [3740.0000, 5060.0000]"), "{text}");
    assert!(text.contains("4000: in range"), "{text}");
}

#[test]
fn volt_var_without_ratings_fails() {
    let output = der_cert(&["volt-var", "--preset", "frt_rule21", "--volt", "240"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[ratings]"), "{stderr}");
}

#[test]
fn band_checks_values() {
    let output = der_cert(&["band", "--target", "5", "--allowance", "0.5", "--value", "6"]);
    assert_success(&output, "band");
    let text = stdout(&output);
    assert!(text.contains("target 5.0000 [4.5000, 5.5000]"), "{text}");
    assert!(text.contains("6: out of range"), "{text}");

    let output = der_cert(&[
        "band", "--pf", "--target", "0.98", "--allowance", "0.05", "--value", "-0.99",
    ]);
    assert_success(&output, "band --pf");
    let text = stdout(&output);
    assert!(text.contains("(wraps unity)"), "{text}");
    assert!(text.contains("-0.99: in range"), "{text}");
}

#[test]
fn unknown_preset_exits_with_error() {
    let output = der_cert(&["plan", "--preset", "nope"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("preset"), "{stderr}");
}
