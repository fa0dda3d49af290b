//! Command-line arguments and subcommand handlers.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;

use der_cert::band::{ToleranceBand, pf_band, pf_out_of_range};
use der_cert::config::TestPlanConfig;
use der_cert::functions::freq_watt::{freq_pct, power_band};
use der_cert::functions::volt_var::{VarReference, VvTest, var_band};
use der_cert::io::{export_predictions_csv, read_capture, write_capture};
use der_cert::report::{AnalysisReport, CaptureReport, PlanReport};
use der_cert::ride_through::{RideThroughCurves, RideThroughPlan, predict_response};
use der_cert::synth::SyntheticCapture;
use der_cert::waveform::analyze_ride_through;

#[derive(Debug, Parser)]
#[command(
    name = "der-cert",
    version,
    about = "Ride-through prediction and waveform analysis for DER certification tests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Predict the response at every test point of a ride-through plan
    Plan {
        #[command(flatten)]
        source: PlanSource,

        /// Write predictions to a CSV file
        #[arg(long)]
        predictions_out: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Measure trip times in capture files and judge them
    Analyze {
        /// Tab-delimited capture files
        #[arg(required = true)]
        captures: Vec<PathBuf>,

        #[command(flatten)]
        source: PlanSource,

        /// Applied stimulus (% of nominal), once per capture in order
        #[arg(long)]
        stimulus: Vec<f64>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a synthetic capture
    Synth {
        /// Output file
        out: PathBuf,

        /// Delay from the event to the trip (s)
        #[arg(long, conflicts_with = "no_trip")]
        trip_after: Option<f64>,

        /// Keep the current flowing for the whole capture
        #[arg(long, default_value_t = false)]
        no_trip: bool,

        /// Voltage during the event (% of nominal)
        #[arg(long, default_value_t = 100.0)]
        event_voltage: f64,

        /// Frequency during the event (% of nominal)
        #[arg(long, default_value_t = 100.0)]
        event_freq: f64,

        /// Noise standard deviation on both channels
        #[arg(long, default_value_t = 0.0)]
        noise: f64,

        /// RNG seed for deterministic noise
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the frequency-watt power band at a measured frequency
    FreqWatt {
        #[command(flatten)]
        source: PlanSource,

        /// Measured frequency (Hz)
        #[arg(long)]
        freq: f64,

        /// Pass/fail screen (% rated power on either side)
        #[arg(long, default_value_t = 5.0)]
        power_range: f64,

        /// Check a measured power (% rated) against the band
        #[arg(long, allow_negative_numbers = true)]
        power: Option<f64>,
    },
    /// Print the volt-var reactive power band at a measured voltage
    VoltVar {
        #[command(flatten)]
        source: PlanSource,

        /// Measured voltage (V)
        #[arg(long)]
        volt: f64,

        /// Characteristic curve: 1 most aggressive, 2 average, 3 least aggressive
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
        characteristic: u8,

        /// What the curve's var axis is a percentage of
        #[arg(long, value_enum, default_value_t = VarPriority::Varmax)]
        priority: VarPriority,

        /// Pass/fail screen (% of rated vars on either side)
        #[arg(long, default_value_t = 15.0)]
        var_range: f64,

        /// Check a measured reactive power (var) against the band
        #[arg(long, allow_negative_numbers = true)]
        var: Option<f64>,
    },
    /// Print a pass/fail band
    Band {
        /// Target value
        #[arg(long, allow_negative_numbers = true)]
        target: f64,

        /// Allowed deviation on either side
        #[arg(long)]
        allowance: f64,

        /// Use the signed power-factor scale
        #[arg(long, default_value_t = false)]
        pf: bool,

        /// Check a measured value against the band
        #[arg(long, allow_negative_numbers = true)]
        value: Option<f64>,
    },
}

/// Volt-var priority mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VarPriority {
    /// Percent of vars available at rated power
    Wmax,
    /// Percent of rated vars
    Varmax,
}

impl From<VarPriority> for VarReference {
    fn from(p: VarPriority) -> Self {
        match p {
            VarPriority::Wmax => Self::WMax,
            VarPriority::Varmax => Self::VarMax,
        }
    }
}

/// Where the test plan comes from; the `frt_rule21` preset when neither is given.
#[derive(Debug, Args)]
pub struct PlanSource {
    /// Load the plan from a TOML file
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Use a built-in preset (frt_rule21, vrt_rule21, ieee1547_cat2)
    #[arg(long)]
    preset: Option<String>,
}

impl PlanSource {
    fn load(&self) -> Result<TestPlanConfig> {
        let cfg = match (&self.config, &self.preset) {
            (Some(path), _) => TestPlanConfig::from_toml_file(path)?,
            (None, Some(name)) => TestPlanConfig::from_preset(name)?,
            (None, None) => TestPlanConfig::frt_rule21(),
        };
        let errors = cfg.validate();
        if !errors.is_empty() {
            for e in &errors {
                eprintln!("{e}");
            }
            bail!("test plan has {} configuration error(s)", errors.len());
        }
        Ok(cfg)
    }
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns any configuration, I/O or analysis error, and an error when an
/// analysed test fails.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Plan {
            source,
            predictions_out,
            json,
        } => plan(&source, predictions_out.as_deref(), json),
        Command::Analyze {
            captures,
            source,
            stimulus,
            json,
        } => analyze(&captures, &source, &stimulus, json),
        Command::Synth {
            out,
            trip_after,
            no_trip,
            event_voltage,
            event_freq,
            noise,
            seed,
        } => {
            let defaults = SyntheticCapture::default();
            let synth = SyntheticCapture {
                trip_after_s: if no_trip {
                    None
                } else {
                    trip_after.or(defaults.trip_after_s)
                },
                event_voltage_pct: event_voltage,
                event_freq_pct: event_freq,
                noise_std: noise,
                seed,
                ..defaults
            };
            synth_capture(&synth, &out)
        }
        Command::FreqWatt {
            source,
            freq,
            power_range,
            power,
        } => freq_watt(&source, freq, power_range, power),
        Command::VoltVar {
            source,
            volt,
            characteristic,
            priority,
            var_range,
            var,
        } => volt_var(&source, volt, characteristic, priority, var_range, var),
        Command::Band {
            target,
            allowance,
            pf,
            value,
        } => band(target, allowance, pf, value),
    }
}

fn print_report<R: Serialize + std::fmt::Display>(report: &R, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn plan(source: &PlanSource, predictions_out: Option<&Path>, json: bool) -> Result<()> {
    let cfg = source.load()?;
    let curves = cfg.curves()?;
    let plan = RideThroughPlan::build(&curves, cfg.plan.offset, cfg.plan.verification_delay);

    if let Some(path) = predictions_out {
        export_predictions_csv(&plan.points, path)
            .with_context(|| format!("failed to write predictions to {}", path.display()))?;
        eprintln!("Predictions written to {}", path.display());
    }

    print_report(&PlanReport::new(&plan, &curves, &cfg.plan), json)
}

fn analyze(captures: &[PathBuf], source: &PlanSource, stimulus: &[f64], json: bool) -> Result<()> {
    if !stimulus.is_empty() && stimulus.len() != captures.len() {
        bail!(
            "--stimulus given {} time(s) for {} capture(s); give one per capture or none",
            stimulus.len(),
            captures.len()
        );
    }
    let cfg = source.load()?;
    let curves = if stimulus.is_empty() {
        None
    } else {
        Some(cfg.curves()?)
    };

    let reports: Vec<CaptureReport> = captures
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let judge_at = curves.as_ref().zip(stimulus.get(i).copied());
            capture_report(path, &cfg, judge_at)
        })
        .collect();

    let report = AnalysisReport::new(reports, cfg.plan.failure_count);
    print_report(&report, json)?;
    if report.passed == Some(false) {
        bail!(
            "ride-through test failed: {} failing point(s), {} inconclusive",
            report.tally.failures,
            report.tally.inconclusive
        );
    }
    if report.errors > 0 {
        bail!("{} capture(s) could not be analysed", report.errors);
    }
    Ok(())
}

/// Analyses one capture, keeping any failure in the report so the other
/// captures are still judged.
fn capture_report(
    path: &Path,
    cfg: &TestPlanConfig,
    judge_at: Option<(&RideThroughCurves, f64)>,
) -> CaptureReport {
    let source = path.display().to_string();
    let analysed = read_capture(path)
        .with_context(|| format!("failed to read {source}"))
        .and_then(|capture| {
            let result = analyze_ride_through(&capture, &cfg.analysis)
                .with_context(|| format!("failed to analyse {source}"))?;
            Ok(CaptureReport::new(source.clone(), &capture, result))
        });
    let report = analysed.unwrap_or_else(|e| {
        warn!("{e:#}");
        CaptureReport::failed(source.clone(), format!("{e:#}"))
    });

    let Some((curves, s)) = judge_at else {
        return report;
    };
    match predict_response(curves, s) {
        Ok(prediction) => report.judged(prediction, cfg.plan.time_msa),
        Err(e) => {
            warn!("{source}: {e}");
            report.inconclusive(e)
        }
    }
}

fn synth_capture(synth: &SyntheticCapture, out: &Path) -> Result<()> {
    let capture = synth.generate()?;
    let file =
        File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    write_capture(&capture, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!("trip at {:?} s", synth.trip_at());
    eprintln!("Synthetic capture written to {}", out.display());
    Ok(())
}

fn print_check(band: &ToleranceBand, value: Option<f64>) {
    if let Some(v) = value {
        let verdict = if band.contains(v) { "in range" } else { "out of range" };
        println!("{v}: {verdict}");
    }
}

fn freq_watt(source: &PlanSource, freq: f64, power_range: f64, power: Option<f64>) -> Result<()> {
    let cfg = source.load()?;
    let curve = cfg.freq_watt.to_curve()?;
    let pct = freq_pct(freq, cfg.freq_watt.freq_ref);
    let band = power_band(&curve, pct, power_range)?;
    println!("Frequency-watt at {freq} Hz ({pct:.3}%): power % {band}");
    print_check(&band, power);
    Ok(())
}

fn volt_var(
    source: &PlanSource,
    volt: f64,
    characteristic: u8,
    priority: VarPriority,
    var_range: f64,
    var: Option<f64>,
) -> Result<()> {
    let cfg = source.load()?;
    let Some(ratings) = cfg.ratings else {
        bail!("volt-var bands need a [ratings] section in the test plan");
    };
    let test = VvTest::ALL[usize::from(characteristic - 1)];
    let inputs = &cfg.volt_var;
    let curve = inputs
        .characteristic(test)?
        .percent_curve(inputs.v_nom, inputs.q_max_cap)?;
    let pct = volt / inputs.v_nom * 100.0;
    let band = var_band(priority.into(), Some(&curve), pct, &ratings, var_range)?;
    println!("Volt-var {test:?} at {volt} V ({pct:.3}%): var {band}");
    print_check(&band, var);
    Ok(())
}

fn band(target: f64, allowance: f64, pf: bool, value: Option<f64>) -> Result<()> {
    if pf {
        let band = pf_band(target, allowance)?;
        println!("{band}");
        if let Some(v) = value {
            let verdict = if pf_out_of_range(v, &band) { "out of range" } else { "in range" };
            println!("{v}: {verdict}");
        }
    } else {
        let band = ToleranceBand::symmetric(target, allowance)?;
        println!("{band}");
        print_check(&band, value);
    }
    Ok(())
}
