use std::time::Duration;

use liftctl_frame::{AllStatus, DpCommand, Frame, SwitchState};
use liftctl_macro::{validate, BatchJob, BatchRow, MacroFile, ValidationOptions};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::events::Severity;
use crate::handle::EngineHandle;

/// Label of the frame sent when a run is cancelled.
pub const RESET_LABEL: &str = "reset to safe state";

/// How a macro run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Rows the device acknowledged.
    pub rows_acked: u64,
    /// Rows abandoned after every attempt timed out.
    pub rows_abandoned: u64,
    /// Full passes over the rows.
    pub passes_completed: u32,
    pub cancelled: bool,
}

/// Replays a [`BatchJob`] through an engine, one ALL_STATUS frame per row.
///
/// Cancellation is cooperative. The token is checked before each row and
/// again once that row's command has resolved, and it interrupts the
/// per-row delay. A cancelled run sends one reset frame.
///
/// A locked operator panel refuses the run, and stops it before the next
/// row if the panel locks mid-run.
pub struct BatchRunner {
    handle: EngineHandle,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(handle: EngineHandle) -> Self {
        Self::with_cancel(handle, CancellationToken::new())
    }

    pub fn with_cancel(handle: EngineHandle, cancel: CancellationToken) -> Self {
        Self { handle, cancel }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Validate `file` against the current device state, then run it.
    ///
    /// When `enforce_access_mode` is set and the device has reported its A/F
    /// mode, every access channel must belong to that mode. Nothing is sent
    /// if any row is invalid.
    pub async fn run_file(&self, file: &MacroFile, enforce_access_mode: bool) -> Result<BatchSummary> {
        self.ensure_unlocked()?;
        let status = self.handle.status();
        let options = ValidationOptions {
            enforce_access_mode: status.af_mode.filter(|_| enforce_access_mode),
            default_channel: status.channel.unwrap_or_default(),
        };
        let job = match validate(file, &options) {
            Ok(job) => job,
            Err(errors) => {
                for error in errors.iter() {
                    self.handle.log(Severity::Error, format!("macro {error}"));
                }
                return Err(EngineError::Validation(errors));
            }
        };
        self.run(&job).await
    }

    /// Run an already validated job.
    pub async fn run(&self, job: &BatchJob) -> Result<BatchSummary> {
        self.ensure_unlocked()?;
        let mut summary = BatchSummary::default();
        let rows = job.rows.len();
        self.handle.log(
            Severity::Info,
            format!("macro start: {rows} row(s), loop count {}", job.repeat_count),
        );

        for pass in 1..=job.repeat_count {
            for (idx, row) in job.rows.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    return self.abort(summary).await;
                }
                self.ensure_unlocked()?;

                let label = format!(
                    "macro pass {pass}/{} row {}/{rows}: {} ch {} {}",
                    job.repeat_count,
                    idx + 1,
                    row.access_channel,
                    row.channel_number,
                    row.action
                );
                match self.handle.submit(self.row_frame(row)?, label).await {
                    Ok(_) => summary.rows_acked += 1,
                    Err(EngineError::Timeout { .. }) => summary.rows_abandoned += 1,
                    Err(err) => return Err(err),
                }

                if self.cancel.is_cancelled() {
                    return self.abort(summary).await;
                }

                if row.delay_seconds > 0 {
                    let delay = Duration::from_secs(u64::from(row.delay_seconds));
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {}
                    }
                    if self.cancel.is_cancelled() {
                        return self.abort(summary).await;
                    }
                }
            }
            summary.passes_completed = pass;
        }

        self.handle.log(
            Severity::Success,
            format!(
                "macro complete: {} acknowledged, {} abandoned",
                summary.rows_acked, summary.rows_abandoned
            ),
        );
        Ok(summary)
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.handle.panel_locked() {
            self.handle
                .log(Severity::Error, "macro refused: operator panel is locked");
            return Err(EngineError::PanelLocked);
        }
        Ok(())
    }

    /// Build the ALL_STATUS record for one row.
    ///
    /// `af_mode` follows the row's access channel, not the device's current
    /// mode, so a row outside the active mode (only possible without mode
    /// enforcement) switches the device's A/F mode.
    fn row_frame(&self, row: &BatchRow) -> Result<Frame> {
        let status = self.handle.status();
        let record = AllStatus {
            switch: status.switch.unwrap_or(SwitchState::Off).value(),
            access_channel: row.access_channel.value(),
            max_channel: status.max_channel.unwrap_or_default(),
            channel: row.channel_number,
            action: row.action.value(),
            af_mode: row.access_channel.mode().value(),
        };
        Ok(DpCommand::all_status(&record).into_frame()?)
    }

    async fn abort(&self, mut summary: BatchSummary) -> Result<BatchSummary> {
        summary.cancelled = true;
        self.handle.log(
            Severity::Warning,
            "macro cancelled, returning device to a safe state",
        );

        let reset = DpCommand::all_status(&self.handle.status().reset_record()).into_frame()?;
        match self.handle.submit(reset, RESET_LABEL).await {
            Ok(_) | Err(EngineError::Timeout { .. }) => Ok(summary),
            Err(err) => Err(err),
        }
    }
}
