use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use jumpcal::{
    load_frame, load_template, ActuatorSink, AdbDevice, CalibrationState, ChannelEvents,
    ControlLoop, Direction, FrameSource, ImageDirSource, JumpConfig, JumpSession, LogActuator,
    ModeEvent, OperatingMode, TrajectoryResult,
};
use log::{warn, LevelFilter};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "jumpcal")]
#[command(author, version, about = "Vision-guided landing estimator and press-duration calibrator")]
struct Cli {
    /// Log level for the stderr logger
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Emit JSON logs through tracing-subscriber
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calibrate template scale, pivot and unit scale from one frame
    Calibrate {
        #[arg(long)]
        frame: PathBuf,
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "calibration.json")]
        out: PathBuf,
    },
    /// Estimate the landing point and press duration for one frame
    Estimate {
        #[arg(long)]
        frame: PathBuf,
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        calibration: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Direction of the previous jump
        #[arg(long, default_value = "right")]
        prior: Direction,
    },
    /// Run the control loop; stdin keys c/s/j/q switch modes
    Run {
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        calibration: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Replay frames from a directory instead of capturing over adb
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Log presses instead of sending them to the device (implied by --frames)
        #[arg(long)]
        dry_run: bool,
        #[arg(long, value_enum, default_value_t = CliMode::Coach)]
        mode: CliMode,
        /// adb device serial
        #[arg(long)]
        serial: Option<String>,
    },
    /// Write the default configuration as JSON
    WriteConfig {
        #[arg(long, default_value = "jumpcal.json")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Coach,
    Auto,
}

impl From<CliMode> for OperatingMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Coach => OperatingMode::Coach,
            CliMode::Auto => OperatingMode::Auto,
        }
    }
}

#[derive(Serialize)]
struct EstimateReport {
    trajectory: TrajectoryResult,
    duration_ms: f64,
    calibration: CalibrationState,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Commands::Calibrate {
            frame,
            template,
            config,
            out,
        } => {
            let config = load_config(config.as_deref())?;
            let frame = load_frame(&frame, config.frame_scale)?;
            let mut session = JumpSession::new(load_template(&template)?, &config)?;
            let state = session.calibrate(&frame.view())?;
            state.write_json(&out)?;
            println!("wrote calibration to {}", out.display());
        }
        Commands::Estimate {
            frame,
            template,
            calibration,
            config,
            prior,
        } => {
            let config = load_config(config.as_deref())?;
            let state = CalibrationState::load_json(&calibration)?;
            let frame = load_frame(&frame, config.frame_scale)?;
            let mut session = JumpSession::with_calibration(load_template(&template)?, &config, state)?;
            session.set_direction(prior);
            let trajectory = session.estimate(&frame.view())?;
            let report = EstimateReport {
                trajectory,
                duration_ms: session.duration_ms(&trajectory)?,
                calibration: state,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run {
            template,
            calibration,
            config,
            frames,
            dry_run,
            mode,
            serial,
        } => {
            let config = load_config(config.as_deref())?;
            let state = CalibrationState::load_json(&calibration)?;
            let session = JumpSession::with_calibration(load_template(&template)?, &config, state)?;

            let mut adb = AdbDevice::new(config.frame_scale);
            if let Some(serial) = serial {
                adb = adb.with_serial(serial);
            }
            let source: Box<dyn FrameSource> = match &frames {
                Some(dir) => Box::new(ImageDirSource::new(dir, config.frame_scale)?),
                None => Box::new(adb.clone()),
            };
            if frames.is_some() && !dry_run {
                warn!("replaying recorded frames; presses are logged, not sent to the device");
            }
            let actuator: Box<dyn ActuatorSink> = if dry_run || frames.is_some() {
                Box::new(LogActuator::new())
            } else {
                Box::new(adb)
            };

            let mut control = ControlLoop::new(
                session,
                source,
                actuator,
                spawn_key_reader(),
                config.control.clone(),
            )
            .with_mode(mode.into());
            let summary = control.run()?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::WriteConfig { out } => {
            JumpConfig::default().write_json(&out)?;
            println!("wrote default config to {}", out.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<JumpConfig, jumpcal::ConfigIoError> {
    match path {
        Some(path) => JumpConfig::load_json(path),
        None => Ok(JumpConfig::default()),
    }
}

/// Forward operator keys from stdin as mode events.
fn spawn_key_reader() -> ChannelEvents {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(event) = ModeEvent::from_key(&line) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });
    ChannelEvents::new(rx)
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    jumpcal::core::init_with_level(cli.log_level.into())
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    jumpcal::core::init_tracing(cli.json_logs, cli.log_level.into());
    tracing_log::LogTracer::init()?;
    log::set_max_level(cli.log_level.into());
    Ok(())
}
