use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fes_calibration::calibration::{CalibrationEvent, CalibrationOutcome};
use fes_calibration::config::AppConfig;
use fes_calibration::context::AppContext;
use fes_calibration::estimator::{accel_to_angles, Sample};
use fes_calibration::sensor::{SensorKind, SensorSource, SimulatedMotion, SimulatedSensor};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(
    name = "fes-calibrate",
    about = "Foot angle calibration harness driven by a simulated accelerometer"
)]
struct Cli {
    /// JSON configuration file (defaults are used when missing or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full calibration and print the captured steps
    Calibrate {
        /// Roll angle the simulated foot is held at (degrees)
        #[arg(long, default_value_t = 15.0, allow_negative_numbers = true)]
        roll: f64,
        /// Uniform noise on each reading (degrees)
        #[arg(long, default_value_t = 2.0)]
        noise: f64,
        /// Swing around `roll` like a walking gait instead of holding still
        #[arg(long)]
        sway: Option<f64>,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Override the number of steps
        #[arg(long)]
        steps: Option<usize>,
        /// Override the capture window per step (ms)
        #[arg(long)]
        duration_ms: Option<u64>,
        /// Emit every event as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Stream live smoothed readings
    Readout {
        #[arg(long, default_value_t = 3)]
        seconds: u64,
        #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
        roll: f64,
        /// Attach a simulated gyroscope
        #[arg(long)]
        gyro: bool,
    },
    /// Convert one acceleration vector to pitch/roll/yaw
    Angles {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },
}

#[derive(Serialize)]
struct CalibrationReport<'a> {
    outcome: &'a CalibrationOutcome,
    average_angle: f64,
    average_valid_angle: f64,
    has_valid_calibration: bool,
}

fn main() -> ExitCode {
    fes_calibration::init_logging();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Calibrate {
            roll,
            noise,
            sway,
            seed,
            steps,
            duration_ms,
            json,
        } => {
            let mut config = config;
            if let Some(steps) = steps {
                config.calibration.total_steps = steps;
                config.calibration.min_valid_steps = config.calibration.min_valid_steps.min(steps);
            }
            if let Some(duration_ms) = duration_ms {
                config.calibration.capture_duration_ms = duration_ms;
            }
            let motion = match sway {
                Some(amplitude_deg) => SimulatedMotion::Sway {
                    center_deg: roll,
                    amplitude_deg,
                    period_ms: 1000,
                },
                None => SimulatedMotion::Tilt {
                    roll_deg: roll,
                    noise_deg: noise,
                },
            };
            let sensor = SimulatedSensor::new(SensorKind::Accelerometer, motion).with_seed(seed);
            runtime()?.block_on(run_calibrate(config, Arc::new(sensor), json))
        }
        Commands::Readout { seconds, roll, gyro } => {
            runtime()?.block_on(run_readout(config, seconds, roll, gyro))
        }
        Commands::Angles { x, y, z } => run_angles(x, y, z),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")
}

async fn run_calibrate(
    config: AppConfig,
    sensor: Arc<dyn SensorSource>,
    json: bool,
) -> Result<ExitCode> {
    let ctx = AppContext::new(config);
    let calibration = ctx.calibration();

    let mut events = ctx.calibration_stream().boxed();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if json {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
                continue;
            }
            match event {
                CalibrationEvent::Progress(progress) if progress.current_angle.is_none() => {
                    println!("[{:>3}%] {}", progress.percentage(), progress.validation_message);
                }
                CalibrationEvent::Stopped { steps_captured } => {
                    println!("Stopped after {steps_captured} steps");
                }
                CalibrationEvent::Failed { code, message } => {
                    println!("Failed ({code}): {message}");
                }
                _ => {}
            }
        }
    });

    let mut run = {
        let calibration = Arc::clone(&calibration);
        tokio::spawn(async move { calibration.start(sensor).await })
    };

    let joined = tokio::select! {
        joined = &mut run => joined,
        _ = tokio::signal::ctrl_c() => {
            ctx.stop_calibration();
            run.await
        }
    };
    let outcome = joined
        .context("calibration task panicked")?
        .context("calibration failed")?;

    let report = CalibrationReport {
        outcome: &outcome,
        average_angle: calibration.get_average_angle()?,
        average_valid_angle: calibration.get_average_valid_angle()?,
        has_valid_calibration: calibration.has_valid_calibration()?,
    };

    // closing every sender ends the event stream
    drop(ctx);
    drop(calibration);
    let _ = printer.await;

    print_report(&report, json)
}

fn print_report(report: &CalibrationReport<'_>, json: bool) -> Result<ExitCode> {
    let steps = report.outcome.steps();

    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        for step in steps {
            println!(
                "Step {}: {:>7.2}° ±{:.2}° [{:.2}°, {:.2}°] {} readings{}",
                step.step_index,
                step.average_angle,
                step.std_dev,
                step.min_angle,
                step.max_angle,
                step.sample_count,
                if step.is_valid { "" } else { " (unsteady)" }
            );
        }
        println!(
            "Average angle: {:.2}° (valid steps only: {:.2}°, {}/{} valid)",
            report.average_angle,
            report.average_valid_angle,
            steps.iter().filter(|s| s.is_valid).count(),
            steps.len()
        );
    }

    if report.outcome.is_completed() && report.has_valid_calibration {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

async fn run_readout(config: AppConfig, seconds: u64, roll: f64, gyro: bool) -> Result<ExitCode> {
    let ctx = AppContext::new(config);
    let accel = Arc::new(SimulatedSensor::new(
        SensorKind::Accelerometer,
        SimulatedMotion::Sway {
            center_deg: roll,
            amplitude_deg: 8.0,
            period_ms: 2000,
        },
    ));
    let gyro: Option<Arc<dyn SensorSource>> = gyro.then(|| {
        Arc::new(SimulatedSensor::new(
            SensorKind::Gyroscope,
            SimulatedMotion::Static(Sample::new(0.01, 0.2, 0.0)),
        )) as Arc<dyn SensorSource>
    });

    let mut readings = ctx
        .subscribe_readings()
        .context("readings channel not initialized")?;
    ctx.start_readout(accel, gyro)
        .context("starting live readout")?;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    let mut count: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = readings.recv() => match received {
                Ok(reading) => {
                    count += 1;
                    // ~4 lines per second at the default rate
                    if count % 5 == 1 {
                        println!("{}", serde_json::to_string(&reading)?);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Readout] Printer lagged, skipped {} readings", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.stop_readout().context("stopping live readout")?;
    eprintln!("{count} readings");
    Ok(ExitCode::from(0))
}

fn run_angles(x: f64, y: f64, z: f64) -> Result<ExitCode> {
    let sample = Sample::new(x, y, z);
    let angles = accel_to_angles(&sample);
    println!("{}", serde_json::to_string(&angles)?);
    Ok(ExitCode::from(0))
}
