use liftctl_engine::{CommandAck, EngineHandle};
use liftctl_frame::{AccessChannel, SwitchState};

use crate::cmd::session::Session;
use crate::cmd::{block_on, SendAction, SendArgs};
use crate::exit::{engine_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    block_on(async move {
        let session = Session::open(&args.link)?;
        let result = send(&session.handle(), &args.action).await;
        session.close().await?;

        print_ack(&result?, format);
        Ok(SUCCESS)
    })
}

/// Refresh the status first so channel limits and the A/F mode are known.
async fn send(handle: &EngineHandle, action: &SendAction) -> CliResult<CommandAck> {
    handle
        .query_status()
        .await
        .map_err(|err| engine_error("status query failed", err))?;

    let result = match action {
        SendAction::On => handle.set_switch(SwitchState::On).await,
        SendAction::Off => handle.set_switch(SwitchState::Off).await,
        SendAction::Position { action } => handle.position((*action).into()).await,
        SendAction::Access { channel } => {
            let parsed = AccessChannel::parse(channel).ok_or_else(|| {
                CliError::new(
                    USAGE,
                    format!("invalid access channel '{channel}' (expected A-D or F0-F9)"),
                )
            })?;
            handle.select_access(parsed).await
        }
        SendAction::Channel { channel } => handle.set_channel(*channel).await,
        SendAction::MaxChannel { max } => handle.set_max_channel(*max).await,
        SendAction::Mode { mode } => handle.select_af_mode((*mode).into()).await,
    };
    result.map_err(|err| engine_error("send failed", err))
}
