mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "liftctl", version, about = "Lift controller operator console")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Minimum level of the operator log mirrored to stderr.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    console_log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.console_log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{ActionArg, SendAction};

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from(["liftctl", "send", "/dev/ttyUSB0", "position", "up"])
            .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.link.port, "/dev/ttyUSB0");
        assert!(matches!(
            args.action,
            SendAction::Position {
                action: ActionArg::Up
            }
        ));
    }

    #[test]
    fn rejects_unknown_position() {
        let err = Cli::try_parse_from(["liftctl", "send", "sim", "position", "sideways"])
            .expect_err("unknown action should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_run_with_link_options() {
        let cli = Cli::try_parse_from([
            "liftctl",
            "run",
            "sim",
            "demo.txt",
            "--response-timeout",
            "500ms",
            "--no-heartbeat",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.link.response_timeout, "500ms");
        assert!(args.link.no_heartbeat);
        assert!(!args.no_enforce_mode);
    }

    #[test]
    fn run_requires_macro_file() {
        let err = Cli::try_parse_from(["liftctl", "run", "sim"])
            .expect_err("missing macro file should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
