use liftctl_engine::{Engine, EngineHandle, SimDevice};
use liftctl_transport::{memory_pair, LinkConfig, LinkStream, SerialLink};
use tracing::info;

use crate::cmd::LinkArgs;
use crate::exit::{engine_error, transport_error, CliError, CliResult, USAGE};

/// An open link with a running engine on it.
pub struct Session {
    engine: Engine,
    port: String,
    device: Option<SimDevice>,
}

impl Session {
    /// Open the link named by `args` and start the engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(args: &LinkArgs) -> CliResult<Self> {
        let config = args.engine_config()?;
        let (link, device) = open_link(args)?;
        let engine =
            Engine::spawn(link, config).map_err(|err| engine_error("engine start failed", err))?;
        Ok(Self {
            engine,
            port: args.port.clone(),
            device,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Stop the engine and wait for it to finish.
    pub async fn close(self) -> CliResult<()> {
        if let Some(device) = &self.device {
            info!(frames = device.received().len(), "simulated device done");
        }
        self.engine
            .shutdown()
            .await
            .map_err(|err| engine_error("engine shutdown failed", err))
    }
}

fn open_link(args: &LinkArgs) -> CliResult<(LinkStream, Option<SimDevice>)> {
    let Some(mode) = sim_mode(&args.port) else {
        let config = LinkConfig {
            baud_rate: args.baud,
            ..LinkConfig::default()
        };
        let link = SerialLink::open_with_config(&args.port, &config)
            .map_err(|err| transport_error("open failed", err))?;
        return Ok((link, None));
    };

    let device = SimDevice::default();
    match mode {
        "" => {}
        "silent" => device.set_silent(true),
        "corrupt" => device.set_corrupt_checksums(true),
        other => {
            return Err(CliError::new(
                USAGE,
                format!("unknown simulator mode '{other}' (expected silent or corrupt)"),
            ))
        }
    }
    let (console, device_end) = memory_pair("sim");
    device.spawn(device_end);
    Ok((console, Some(device)))
}

fn sim_mode(port: &str) -> Option<&str> {
    if port == "sim" {
        return Some("");
    }
    port.strip_prefix("sim:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_ports_are_recognized() {
        assert_eq!(sim_mode("sim"), Some(""));
        assert_eq!(sim_mode("sim:silent"), Some("silent"));
        assert_eq!(sim_mode("/dev/ttyUSB0"), None);
        assert_eq!(sim_mode("simulator"), None);
    }
}
