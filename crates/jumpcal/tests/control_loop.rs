mod common;

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use common::*;
use jumpcal::{
    ActuationFailurePolicy, ActuatorSink, ChannelEvents, ControlLoop, DeviceError, Direction,
    FrameSource, JumpConfig, JumpSession, LogActuator, LoopError, ModeEvent, OperatingMode,
    Pause, PauseKind, RgbImage, SkipReason, StepOutcome,
};

/// Replays the same frame `count` times.
struct RepeatFrames {
    frame: RgbImage,
    count: usize,
    fail_first: bool,
}

impl RepeatFrames {
    fn new(count: usize) -> Self {
        Self {
            frame: reference_frame(&[]),
            count,
            fail_first: false,
        }
    }
}

impl FrameSource for RepeatFrames {
    fn capture(&mut self) -> Result<RgbImage, DeviceError> {
        if self.fail_first {
            self.fail_first = false;
            return Err(DeviceError::CommandFailed {
                command: "screencap".into(),
                detail: "device offline".into(),
            });
        }
        if self.count == 0 {
            return Err(DeviceError::Exhausted);
        }
        self.count -= 1;
        Ok(self.frame.clone())
    }
}

#[derive(Default)]
struct FailingActuator {
    attempts: usize,
}

impl ActuatorSink for FailingActuator {
    fn press(&mut self, _point: [u32; 2], _duration_ms: u64) -> Result<(), DeviceError> {
        self.attempts += 1;
        Err(DeviceError::CommandFailed {
            command: "input swipe".into(),
            detail: "device disconnected".into(),
        })
    }
}

/// Records pauses instead of sleeping.
#[derive(Clone, Default)]
struct RecordedPauses(Arc<Mutex<Vec<(PauseKind, u64)>>>);

impl RecordedPauses {
    fn of(&self, kind: PauseKind) -> Vec<u64> {
        let log = self.0.lock().expect("pause log");
        log.iter().filter(|(k, _)| *k == kind).map(|&(_, ms)| ms).collect()
    }

    fn kinds(&self) -> Vec<PauseKind> {
        self.0.lock().expect("pause log").iter().map(|&(k, _)| k).collect()
    }
}

impl Pause for RecordedPauses {
    fn pause(&mut self, kind: PauseKind, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.0.lock().expect("pause log").push((kind, ms));
    }
}

fn cycle(outcome: StepOutcome) -> jumpcal::CycleReport {
    match outcome {
        StepOutcome::Cycle(report) => report,
        other => panic!("expected a cycle, got {other:?}"),
    }
}

fn dry_loop(
    config: &JumpConfig,
    frames: usize,
) -> (
    ControlLoop<RepeatFrames, LogActuator, ChannelEvents>,
    mpsc::Sender<ModeEvent>,
) {
    let (tx, rx) = mpsc::channel();
    let control = ControlLoop::new(
        reference_session(config),
        RepeatFrames::new(frames),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    );
    (control, tx)
}

#[test]
fn coach_observes_without_pressing() {
    let config = test_config(false);
    let (mut control, _tx) = dry_loop(&config, 3);
    let summary = control.run().expect("run");
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.actuations, 0);
    assert!(control.actuator().presses().is_empty());
    assert_eq!(control.mode(), OperatingMode::Coach);
}

#[test]
fn single_jump_presses_once_then_returns_to_coach() {
    let config = test_config(false);
    let (mut control, tx) = dry_loop(&config, 3);

    tx.send(ModeEvent::Jump).expect("send");
    let first = cycle(control.step().expect("step"));
    assert_eq!(first.mode, OperatingMode::SingleJump);
    assert!(first.actuated);
    assert_eq!(control.mode(), OperatingMode::Coach);

    let second = cycle(control.step().expect("step"));
    assert_eq!(second.mode, OperatingMode::Coach);
    assert!(!second.actuated);

    let presses = control.actuator().presses();
    assert_eq!(presses.len(), 1);
    assert_eq!(presses[0].point, config.control.press_point);
    assert_eq!(Some(presses[0].duration_ms), first.duration_ms);
}

#[test]
fn auto_presses_every_cycle_until_stopped() {
    let config = test_config(false);
    let (tx, rx) = mpsc::channel();
    let mut session = reference_session(&config);
    session.set_direction(Direction::Left);
    let mut control = ControlLoop::new(
        session,
        RepeatFrames::new(4),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    );

    tx.send(ModeEvent::Continue).expect("send");
    let first = cycle(control.step().expect("step"));
    let second = cycle(control.step().expect("step"));
    assert_eq!(first.mode, OperatingMode::Auto);
    assert!(first.actuated && second.actuated);
    assert!(first.trajectory.expect("trajectory").turned);
    assert!(!second.trajectory.expect("trajectory").turned);
    assert_eq!(control.actuator().presses().len(), 2);

    tx.send(ModeEvent::Stop).expect("send");
    let third = cycle(control.step().expect("step"));
    assert_eq!(third.mode, OperatingMode::Coach);
    assert!(!third.actuated);
    assert_eq!(control.actuator().presses().len(), 2);
    assert_eq!(control.session().direction(), Direction::Right);
}

#[test]
fn stability_gate_waits_for_a_repeated_duration() {
    let mut config = test_config(false);
    config.control.stable_duration_tolerance_ms = Some(1.0);
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(3),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_mode(OperatingMode::Auto);

    let first = cycle(control.step().expect("step"));
    assert_eq!(first.skipped, Some(SkipReason::Unstable));
    let second = cycle(control.step().expect("step"));
    assert!(second.actuated);
    assert_eq!(second.duration_ms, first.duration_ms);
    let third = cycle(control.step().expect("step"));
    assert_eq!(third.skipped, Some(SkipReason::Unstable));
    assert_eq!(control.actuator().presses().len(), 1);
}

#[test]
fn actuation_failure_halts_without_retry() {
    let config = test_config(false);
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(3),
        FailingActuator::default(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_mode(OperatingMode::Auto);

    assert!(matches!(control.step(), Err(LoopError::Actuation(_))));
    assert_eq!(control.actuator().attempts, 1);
}

#[test]
fn actuation_failure_can_downgrade_to_coach() {
    let mut config = test_config(false);
    config.control.on_actuation_failure = ActuationFailurePolicy::DowngradeToCoach;
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(3),
        FailingActuator::default(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_mode(OperatingMode::Auto);

    let summary = control.run().expect("run");
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.actuations, 0);
    assert_eq!(control.actuator().attempts, 1);
    assert_eq!(control.mode(), OperatingMode::Coach);
}

#[test]
fn failed_single_jump_still_reverts_to_coach() {
    let config = test_config(false);
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(2),
        FailingActuator::default(),
        VecDeque::from([ModeEvent::Jump]),
        config.control.clone(),
    );
    assert!(control.step().is_err());
    assert_eq!(control.mode(), OperatingMode::Coach);
    assert_eq!(control.actuator().attempts, 1);
}

#[test]
fn quit_stops_before_capturing() {
    let config = test_config(false);
    let (mut control, tx) = dry_loop(&config, 5);
    tx.send(ModeEvent::Continue).expect("send");
    tx.send(ModeEvent::Quit).expect("send");
    assert_eq!(control.step().expect("step"), StepOutcome::Quit);
    let (_, source, actuator, _) = control.into_parts();
    assert_eq!(source.count, 5);
    assert!(actuator.presses().is_empty());
}

#[test]
fn missing_frame_skips_cycle_and_keeps_mode() {
    let config = test_config(false);
    let (_tx, rx) = mpsc::channel();
    let mut frames = RepeatFrames::new(1);
    frames.fail_first = true;
    let mut control = ControlLoop::new(
        reference_session(&config),
        frames,
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_mode(OperatingMode::Auto);

    let report = cycle(control.step().expect("step"));
    assert_eq!(report.skipped, Some(SkipReason::NoFrame));
    assert_eq!(control.mode(), OperatingMode::Auto);
    assert!(cycle(control.step().expect("step")).actuated);
    assert_eq!(control.step().expect("step"), StepOutcome::Exhausted);
}

#[test]
fn uncalibrated_session_stops_the_loop() {
    let config = test_config(false);
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        JumpSession::new(marker(), &config).expect("session"),
        RepeatFrames::new(1),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    );
    assert!(matches!(control.run(), Err(LoopError::NotCalibrated(_))));
}

#[test]
fn every_press_is_followed_by_one_settle_pause() {
    let mut config = test_config(false);
    config.control.settle_ms = 1200;
    config.control.idle_ms = 40;
    let pauses = RecordedPauses::default();
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(4),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_pause(pauses.clone());

    let coach = cycle(control.step().expect("coach"));
    assert!(!coach.actuated);
    assert_eq!(pauses.kinds(), vec![PauseKind::Idle]);

    let mut control = control.with_mode(OperatingMode::Auto);
    let summary = control.run().expect("run");
    assert_eq!(summary.actuations, 3);
    assert_eq!(control.actuator().presses().len(), 3);
    assert_eq!(pauses.of(PauseKind::Settle), vec![1200, 1200, 1200]);
    assert_eq!(pauses.of(PauseKind::Idle), vec![40]);
    assert_eq!(
        pauses.kinds(),
        vec![
            PauseKind::Idle,
            PauseKind::Jitter,
            PauseKind::Settle,
            PauseKind::Jitter,
            PauseKind::Settle,
            PauseKind::Jitter,
            PauseKind::Settle,
        ]
    );
}

#[test]
fn jitter_stays_within_configured_bounds() {
    let mut config = test_config(false);
    config.control.jitter_min_ms = 20;
    config.control.jitter_max_ms = 60;
    let pauses = RecordedPauses::default();
    let (_tx, rx) = mpsc::channel();
    let mut control = ControlLoop::new(
        reference_session(&config),
        RepeatFrames::new(64),
        LogActuator::new(),
        ChannelEvents::new(rx),
        config.control.clone(),
    )
    .with_mode(OperatingMode::Auto)
    .with_pause(pauses.clone());

    control.run().expect("run");
    let jitter = pauses.of(PauseKind::Jitter);
    assert_eq!(jitter.len(), 64);
    assert!(jitter.iter().all(|ms| (20..=60).contains(ms)), "{jitter:?}");
    assert!(jitter.iter().any(|&ms| ms != jitter[0]), "jitter never varied");
}

#[test]
fn configured_seed_reproduces_the_jitter_sequence() {
    let mut config = test_config(false);
    config.control.jitter_max_ms = 250;
    config.control.seed = Some(7);

    let run = || {
        let pauses = RecordedPauses::default();
        let (_tx, rx) = mpsc::channel();
        let mut control = ControlLoop::new(
            reference_session(&config),
            RepeatFrames::new(8),
            LogActuator::new(),
            ChannelEvents::new(rx),
            config.control.clone(),
        )
        .with_mode(OperatingMode::Auto)
        .with_pause(pauses.clone());
        control.run().expect("run");
        pauses.of(PauseKind::Jitter)
    };
    assert_eq!(run(), run());
}
