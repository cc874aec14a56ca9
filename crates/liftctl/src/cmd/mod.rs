use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use liftctl_engine::EngineConfig;
use liftctl_frame::{AfMode, DeviceAction};
use tokio_util::sync::CancellationToken;

use crate::exit::{io_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod check;
pub mod monitor;
pub mod ports;
pub mod query;
pub mod run;
pub mod send;
pub mod session;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Send one device-control command.
    Send(SendArgs),
    /// Query and print the device status.
    Query(QueryArgs),
    /// Keep the link open and print the operator log.
    Monitor(MonitorArgs),
    /// Run a macro file against the device.
    Run(RunArgs),
    /// Validate a macro file without a device.
    Check(CheckArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Query(args) => query::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Link and engine settings shared by every command that talks to a device.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Serial port, or `sim` for the built-in simulated device
    /// (`sim:silent` never answers, `sim:corrupt` garbles checksums).
    #[arg(env = "LIFTCTL_PORT")]
    pub port: String,
    /// Line speed in baud.
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,
    /// Time to wait for each response (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub response_timeout: String,
    /// Transmissions per command before it is abandoned.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,
    /// Heartbeat interval (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub heartbeat: String,
    /// Do not send heartbeats.
    #[arg(long)]
    pub no_heartbeat: bool,
}

impl LinkArgs {
    pub fn engine_config(&self) -> CliResult<EngineConfig> {
        Ok(EngineConfig {
            response_timeout: parse_duration(&self.response_timeout)?,
            max_attempts: self.attempts,
            heartbeat_interval: parse_duration(&self.heartbeat)?,
            heartbeat_enabled: !self.no_heartbeat,
            ..EngineConfig::default()
        })
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(subcommand)]
    pub action: SendAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SendAction {
    /// Switch the device on.
    On,
    /// Switch the device off.
    Off,
    /// Move the lift.
    Position {
        #[arg(value_enum)]
        action: ActionArg,
    },
    /// Select an access channel (A-D in mode A, F0-F9 in mode F).
    Access { channel: String },
    /// Select a channel; refused above the device's max channel.
    Channel { channel: u16 },
    /// Set the max channel.
    MaxChannel { max: u16 },
    /// Select the A/F access mode.
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ActionArg {
    Up,
    Stop,
    Down,
}

impl From<ActionArg> for DeviceAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Up => DeviceAction::Up,
            ActionArg::Stop => DeviceAction::Stop,
            ActionArg::Down => DeviceAction::Down,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModeArg {
    A,
    F,
}

impl From<ModeArg> for AfMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::A => AfMode::A,
            ModeArg::F => AfMode::F,
        }
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Stop after this long (e.g. 30s). Default: until Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Macro file to run.
    #[arg(value_name = "MACRO")]
    pub macro_file: PathBuf,
    /// Allow access channels outside the device's current A/F mode.
    #[arg(long)]
    pub no_enforce_mode: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Macro file to validate.
    pub macro_file: PathBuf,
    /// Require every access channel to belong to this A/F mode.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Channel used for rows with an empty channel cell.
    #[arg(long, default_value_t = 0)]
    pub default_channel: u16,
    /// Write the file back in canonical form.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Drive an async command to completion on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(future)
}

pub fn install_ctrlc_handler(cancel: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
