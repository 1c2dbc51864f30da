//! Capture → locate → estimate → actuate loop under a mode state machine.
//!
//! Modes change only on discrete [`ModeEvent`]s, drained before each cycle:
//!
//! | event      | next mode    |
//! |------------|--------------|
//! | `Stop`     | `Coach`      |
//! | `Continue` | `Auto`       |
//! | `Jump`     | `SingleJump` |
//! | `Quit`     | loop exits   |
//!
//! `Coach` only observes, `Auto` presses every cycle after a random delay,
//! `SingleJump` presses once and falls back to `Coach`. Every press is
//! followed by a settle delay so the jump animation finishes before the
//! next capture.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use jumpcal_trajectory::{CalibrationNotPerformed, TrajectoryResult};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::device::{ActuatorSink, DeviceError, FrameSource};
use crate::session::{EstimateError, JumpSession};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    #[default]
    Coach,
    Auto,
    SingleJump,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeEvent {
    Stop,
    Continue,
    Jump,
    Quit,
}

impl ModeEvent {
    /// Operator key bindings: `c` continue, `s` stop, `j` jump, `q` quit.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "c" => Some(ModeEvent::Continue),
            "s" => Some(ModeEvent::Stop),
            "j" => Some(ModeEvent::Jump),
            "q" => Some(ModeEvent::Quit),
            _ => None,
        }
    }
}

/// Non-blocking source of mode events.
pub trait ModeEvents {
    fn poll(&mut self) -> Option<ModeEvent>;
}

/// Events delivered over an mpsc channel, e.g. from an input thread.
pub struct ChannelEvents {
    rx: Receiver<ModeEvent>,
}

impl ChannelEvents {
    pub fn new(rx: Receiver<ModeEvent>) -> Self {
        Self { rx }
    }
}

impl ModeEvents for ChannelEvents {
    fn poll(&mut self) -> Option<ModeEvent> {
        self.rx.try_recv().ok()
    }
}

impl ModeEvents for VecDeque<ModeEvent> {
    fn poll(&mut self) -> Option<ModeEvent> {
        self.pop_front()
    }
}

/// What a loop pause waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    /// Randomized delay before a press.
    Jitter,
    /// Wait for the jump animation after a press.
    Settle,
    /// Short wait after a cycle that did not press.
    Idle,
}

/// Blocking waits of the control loop.
pub trait Pause {
    fn pause(&mut self, kind: PauseKind, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, _kind: PauseKind, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuationFailurePolicy {
    /// Stop the loop and surface the error.
    #[default]
    Halt,
    /// Log, switch to `Coach` and keep observing.
    DowngradeToCoach,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopParams {
    /// Press location in device screen coordinates.
    pub press_point: [u32; 2],
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Pause after every press before the next capture.
    pub settle_ms: u64,
    /// Pause after cycles that did not press.
    pub idle_ms: u64,
    /// When set, `Auto` only presses once the duration has stayed within
    /// this many milliseconds of the previous cycle's.
    pub stable_duration_tolerance_ms: Option<f64>,
    pub on_actuation_failure: ActuationFailurePolicy,
    /// Fixed jitter seed for reproducible runs; unset draws a fresh one.
    pub seed: Option<u64>,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            press_point: [540, 1500],
            jitter_min_ms: 0,
            jitter_max_ms: 250,
            settle_ms: 1200,
            idle_ms: 50,
            stable_duration_tolerance_ms: None,
            on_actuation_failure: ActuationFailurePolicy::Halt,
            seed: None,
        }
    }
}

/// Why a cycle did not press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoFrame,
    NotLocated,
    LowConfidence,
    Unstable,
    ActuationFailed,
}

/// Outcome of one cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Mode the cycle ran in.
    pub mode: OperatingMode,
    pub trajectory: Option<TrajectoryResult>,
    pub duration_ms: Option<u64>,
    pub actuated: bool,
    pub skipped: Option<SkipReason>,
}

impl CycleReport {
    fn skipped(mode: OperatingMode, reason: SkipReason) -> Self {
        Self {
            mode,
            trajectory: None,
            duration_ms: None,
            actuated: false,
            skipped: Some(reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Cycle(CycleReport),
    /// A `Quit` event arrived; no frame was captured.
    Quit,
    /// The frame source has no more frames.
    Exhausted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: usize,
    pub actuations: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum LoopError {
    #[error("actuation failed: {0}")]
    Actuation(#[source] DeviceError),

    #[error(transparent)]
    NotCalibrated(#[from] CalibrationNotPerformed),
}

/// Single-threaded control loop. One cycle runs at a time.
pub struct ControlLoop<S, A, E> {
    session: JumpSession,
    source: S,
    actuator: A,
    events: E,
    params: LoopParams,
    mode: OperatingMode,
    rng: StdRng,
    pauser: Box<dyn Pause + Send>,
    last_duration: Option<f64>,
}

impl<S: FrameSource, A: ActuatorSink, E: ModeEvents> ControlLoop<S, A, E> {
    pub fn new(session: JumpSession, source: S, actuator: A, events: E, params: LoopParams) -> Self {
        let seed = params.seed.unwrap_or_else(|| rand::rng().random());
        debug!("jitter seed {seed}");
        Self {
            session,
            source,
            actuator,
            events,
            params,
            mode: OperatingMode::Coach,
            rng: StdRng::seed_from_u64(seed),
            pauser: Box::new(ThreadPause),
            last_duration: None,
        }
    }

    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the thread sleeps between cycles.
    pub fn with_pause(mut self, pauser: impl Pause + Send + 'static) -> Self {
        self.pauser = Box::new(pauser);
        self
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn session(&self) -> &JumpSession {
        &self.session
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn into_parts(self) -> (JumpSession, S, A, E) {
        (self.session, self.source, self.actuator, self.events)
    }

    /// Apply pending events. Returns `false` on `Quit`.
    fn drain_events(&mut self) -> bool {
        while let Some(event) = self.events.poll() {
            let next = match event {
                ModeEvent::Quit => {
                    info!("quit requested");
                    return false;
                }
                ModeEvent::Stop => OperatingMode::Coach,
                ModeEvent::Continue => OperatingMode::Auto,
                ModeEvent::Jump => OperatingMode::SingleJump,
            };
            if next != self.mode {
                info!("mode {:?} -> {:?}", self.mode, next);
                self.mode = next;
                self.last_duration = None;
            }
        }
        true
    }

    fn pause(&mut self, kind: PauseKind, ms: u64) {
        self.pauser.pause(kind, Duration::from_millis(ms));
    }

    /// Pre-press delay drawn uniformly from the configured bounds.
    fn jitter_ms(&mut self) -> u64 {
        let (min, max) = (self.params.jitter_min_ms, self.params.jitter_max_ms);
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(lo..=hi)
    }

    fn stable(&mut self, duration_ms: f64) -> bool {
        let Some(tolerance) = self.params.stable_duration_tolerance_ms else {
            return true;
        };
        let previous = self.last_duration.replace(duration_ms);
        match previous {
            Some(prev) => (duration_ms - prev).abs() <= tolerance,
            None => false,
        }
    }

    /// Run one cycle.
    pub fn step(&mut self) -> Result<StepOutcome, LoopError> {
        if !self.drain_events() {
            return Ok(StepOutcome::Quit);
        }
        let mode = self.mode;

        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(DeviceError::Exhausted) => return Ok(StepOutcome::Exhausted),
            Err(err) => {
                warn!("capture failed, skipping cycle: {err}");
                self.pause(PauseKind::Idle, self.params.idle_ms);
                return Ok(StepOutcome::Cycle(CycleReport::skipped(mode, SkipReason::NoFrame)));
            }
        };

        let trajectory = match self.session.estimate(&frame.view()) {
            Ok(t) => t,
            Err(EstimateError::NotCalibrated(err)) => return Err(err.into()),
            Err(err) => {
                let reason = match err {
                    EstimateError::LowConfidenceMatch { .. } => SkipReason::LowConfidence,
                    _ => SkipReason::NotLocated,
                };
                warn!("skipping cycle: {err}");
                self.pause(PauseKind::Idle, self.params.idle_ms);
                return Ok(StepOutcome::Cycle(CycleReport::skipped(mode, reason)));
            }
        };
        let duration = self.session.duration_ms(&trajectory)?;
        let duration_ms = duration.round().max(0.0) as u64;

        let mut report = CycleReport {
            mode,
            trajectory: Some(trajectory),
            duration_ms: Some(duration_ms),
            actuated: false,
            skipped: None,
        };

        let press = match mode {
            OperatingMode::Coach => false,
            OperatingMode::SingleJump => {
                self.mode = OperatingMode::Coach;
                true
            }
            OperatingMode::Auto => {
                let stable = self.stable(duration);
                if !stable {
                    debug!("duration {duration:.0} ms not stable yet");
                    report.skipped = Some(SkipReason::Unstable);
                }
                stable
            }
        };

        if !press {
            self.pause(PauseKind::Idle, self.params.idle_ms);
            return Ok(StepOutcome::Cycle(report));
        }

        let jitter = self.jitter_ms();
        self.pause(PauseKind::Jitter, jitter);
        match self.actuator.press(self.params.press_point, duration_ms) {
            Ok(()) => {
                report.actuated = true;
                self.last_duration = None;
                self.pause(PauseKind::Settle, self.params.settle_ms);
                Ok(StepOutcome::Cycle(report))
            }
            Err(err) => match self.params.on_actuation_failure {
                ActuationFailurePolicy::Halt => Err(LoopError::Actuation(err)),
                ActuationFailurePolicy::DowngradeToCoach => {
                    warn!("actuation failed, switching to coach: {err}");
                    self.mode = OperatingMode::Coach;
                    report.skipped = Some(SkipReason::ActuationFailed);
                    Ok(StepOutcome::Cycle(report))
                }
            },
        }
    }

    /// Run cycles until `Quit` or the frame source is exhausted.
    pub fn run(&mut self) -> Result<RunSummary, LoopError> {
        let mut summary = RunSummary::default();
        loop {
            match self.step()? {
                StepOutcome::Cycle(report) => {
                    summary.cycles += 1;
                    if report.actuated {
                        summary.actuations += 1;
                    }
                }
                StepOutcome::Quit | StepOutcome::Exhausted => break,
            }
        }
        info!(
            "loop finished after {} cycles, {} presses",
            summary.cycles, summary.actuations
        );
        Ok(summary)
    }
}
