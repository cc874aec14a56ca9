use liftctl_engine::{BatchRunner, BatchSummary, EngineError};
use liftctl_macro::MacroFile;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cmd::session::Session;
use crate::cmd::{block_on, install_ctrlc_handler, RunArgs};
use crate::exit::{
    engine_error, macro_error, CliError, CliResult, CANCELLED, DATA_INVALID, SUCCESS, TIMEOUT,
};
use crate::output::{print_summary, print_violations, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let file = MacroFile::load(&args.macro_file).map_err(|err| {
        macro_error(&format!("failed reading {}", args.macro_file.display()), err)
    })?;
    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    block_on(async move {
        let session = Session::open(&args.link)?;
        let runner = BatchRunner::with_cancel(session.handle(), cancel);
        let result = execute(&session, &runner, &file, !args.no_enforce_mode).await;
        session.close().await?;

        let summary = match result {
            Ok(summary) => summary,
            Err(EngineError::Validation(errors)) => {
                print_violations(&errors, format);
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("macro rejected: {errors}"),
                ));
            }
            Err(err) => return Err(engine_error("macro run failed", err)),
        };
        print_summary(&summary, format);
        Ok(exit_code(&summary))
    })
}

async fn execute(
    session: &Session,
    runner: &BatchRunner,
    file: &MacroFile,
    enforce_mode: bool,
) -> Result<BatchSummary, EngineError> {
    // The A/F mode and current channel feed validation.
    if let Err(err) = session.handle().query_status().await {
        warn!(error = %err, "status query failed, validating without device state");
    }
    runner.run_file(file, enforce_mode).await
}

fn exit_code(summary: &BatchSummary) -> i32 {
    if summary.cancelled {
        CANCELLED
    } else if summary.rows_abandoned > 0 {
        TIMEOUT
    } else {
        SUCCESS
    }
}
