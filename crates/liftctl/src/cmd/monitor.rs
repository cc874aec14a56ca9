use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cmd::session::Session;
use crate::cmd::{block_on, install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    block_on(async move {
        let session = Session::open(&args.link)?;
        let handle = session.handle();
        let mut events = handle.subscribe();

        let query = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = query.query_status().await {
                warn!(error = %err, "initial status query failed");
            }
        });

        let deadline = duration.map(|d| Instant::now() + d);
        let mut printed = 0usize;
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = until(deadline) => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) => {
                    print_event(&event, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "monitor fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }

        session.close().await?;
        Ok(SUCCESS)
    })
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
