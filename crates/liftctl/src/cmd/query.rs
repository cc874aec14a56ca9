use crate::cmd::session::Session;
use crate::cmd::{block_on, QueryArgs};
use crate::exit::{engine_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    block_on(async move {
        let session = Session::open(&args.link)?;
        let handle = session.handle();
        let result = handle.query_status().await;
        let panel_locked = handle.panel_locked();
        let port = session.port().to_string();
        session.close().await?;

        let status = result.map_err(|err| engine_error("status query failed", err))?;
        print_status(&port, &status, panel_locked, format);
        Ok(SUCCESS)
    })
}
