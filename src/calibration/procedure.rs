// Calibration procedure - timed capture loop
//
// For each step the procedure opens a capture window, polls the angle
// source on a fixed interval, averages every reading, records the step and
// pauses before the next one:
//
//   Idle -> Running(1) -> ... -> Running(N) -> Completed
//                  \-> Cancelled (stop requested, checked once per poll)
//                  \-> Failed    (sensor fault)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

use super::progress::{CalibrationEvent, CalibrationOutcome, CalibrationProgress};
use super::session::CalibrationSession;
use super::step::{now_ms, CalibrationStep, StepAccumulator};
use super::validation::StepValidator;
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError, ErrorCode};
use crate::sensor::AngleSource;

/// Run a complete calibration against `source` with a private session
///
/// This is the standalone form of the procedure: it validates `config`,
/// starts a new session, and returns the outcome. Progress is published on
/// `events`; setting `cancel` stops the run at the next poll.
///
/// # Returns
/// * `Ok(CalibrationOutcome::Completed)` - every step captured
/// * `Ok(CalibrationOutcome::Stopped)` - `cancel` was set mid-run
/// * `Err(CalibrationError)` - invalid config or sensor fault
pub async fn run_calibration<A>(
    source: &A,
    config: &CalibrationConfig,
    events: &broadcast::Sender<CalibrationEvent>,
    cancel: &AtomicBool,
) -> Result<CalibrationOutcome, CalibrationError>
where
    A: AngleSource + Sync + ?Sized,
{
    config.validate()?;
    let session = Mutex::new(CalibrationSession::new(config));
    lock_session(&session)?.begin()?;

    match run_session(source, config, &session, events, cancel).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            mark_failed(&session, &err, events, "run_calibration");
            Err(err)
        }
    }
}

/// Drive an already-begun `session` to completion or cancellation
///
/// The caller owns the session and has called [`CalibrationSession::begin`].
/// On error the session is left running; use [`mark_failed`].
pub async fn run_session<A>(
    source: &A,
    config: &CalibrationConfig,
    session: &Mutex<CalibrationSession>,
    events: &broadcast::Sender<CalibrationEvent>,
    cancel: &AtomicBool,
) -> Result<CalibrationOutcome, CalibrationError>
where
    A: AngleSource + Sync + ?Sized,
{
    let total_steps = config.total_steps;
    let validator = StepValidator::from_config(config);

    tracing::info!(
        "[Calibration] Starting {} steps ({} ms windows, {} ms polls)",
        total_steps,
        config.capture_duration_ms,
        config.poll_interval_ms
    );

    for step_index in 1..=total_steps {
        if cancel.load(Ordering::SeqCst) {
            return stop(session, events);
        }

        lock_session(session)?.advance_to(step_index);
        publish(
            events,
            CalibrationEvent::Progress(CalibrationProgress::capture_started(
                step_index,
                total_steps,
                config.capture_duration_ms,
            )),
        );

        let Some(step) =
            capture_step(source, config, &validator, step_index, events, cancel).await?
        else {
            return stop(session, events);
        };

        tracing::info!(
            "[Calibration] Step {}/{} captured: {:.2}° from {} readings (±{:.2}°, valid={})",
            step_index,
            total_steps,
            step.average_angle,
            step.sample_count,
            step.std_dev,
            step.is_valid
        );

        lock_session(session)?.record_step(step.clone())?;
        publish(
            events,
            CalibrationEvent::Progress(CalibrationProgress::step_captured(&step, total_steps)),
        );

        sleep(config.inter_step_delay()).await;
    }

    let steps = {
        let mut guard = lock_session(session)?;
        guard.complete();
        guard.steps().to_vec()
    };

    tracing::info!(
        "[Calibration] Complete: {} steps, average {:.2}°",
        steps.len(),
        mean(&steps)
    );
    publish(events, CalibrationEvent::Completed(steps.clone()));

    Ok(CalibrationOutcome::Completed(steps))
}

/// One capture window
///
/// Always takes at least one reading. Returns `None` if a stop was requested.
async fn capture_step<A>(
    source: &A,
    config: &CalibrationConfig,
    validator: &StepValidator,
    step_index: usize,
    events: &broadcast::Sender<CalibrationEvent>,
    cancel: &AtomicBool,
) -> Result<Option<CalibrationStep>, CalibrationError>
where
    A: AngleSource + Sync + ?Sized,
{
    let window = config.capture_duration();
    let poll = config.poll_interval();
    let started = Instant::now();
    let mut accumulator = StepAccumulator::new();

    loop {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(
                "[Calibration] Stop requested during step {} after {} readings",
                step_index,
                accumulator.count()
            );
            return Ok(None);
        }

        let angle = source.read_angle()?;
        accumulator.push(angle);
        publish(
            events,
            CalibrationEvent::Progress(CalibrationProgress::reading(
                step_index,
                config.total_steps,
                angle,
            )),
        );

        sleep(poll).await;
        if started.elapsed() >= window {
            break;
        }
    }

    Ok(Some(accumulator.finish(step_index, now_ms(), validator)))
}

fn stop(
    session: &Mutex<CalibrationSession>,
    events: &broadcast::Sender<CalibrationEvent>,
) -> Result<CalibrationOutcome, CalibrationError> {
    let steps = {
        let mut guard = lock_session(session)?;
        guard.cancel();
        guard.steps().to_vec()
    };

    tracing::info!("[Calibration] Stopped early with {} steps", steps.len());
    publish(
        events,
        CalibrationEvent::Stopped {
            steps_captured: steps.len(),
        },
    );

    Ok(CalibrationOutcome::Stopped(steps))
}

/// Move a session to `Failed` and report `err`
pub fn mark_failed(
    session: &Mutex<CalibrationSession>,
    err: &CalibrationError,
    events: &broadcast::Sender<CalibrationEvent>,
    context: &str,
) {
    // A poisoned lock still holds a usable session
    match session.lock() {
        Ok(mut guard) => guard.fail(),
        Err(poisoned) => poisoned.into_inner().fail(),
    }
    log_calibration_error(err, context);
    publish(
        events,
        CalibrationEvent::Failed {
            code: err.code(),
            message: err.message(),
        },
    );
}

pub(crate) fn lock_session(
    session: &Mutex<CalibrationSession>,
) -> Result<MutexGuard<'_, CalibrationSession>, CalibrationError> {
    session.lock().map_err(|_| CalibrationError::StatePoisoned)
}

fn publish(events: &broadcast::Sender<CalibrationEvent>, event: CalibrationEvent) {
    // No subscribers is fine; the UI may attach late or not at all
    let _ = events.send(event);
}

fn mean(steps: &[CalibrationStep]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    steps.iter().map(|s| s.average_angle).sum::<f64>() / steps.len() as f64
}
