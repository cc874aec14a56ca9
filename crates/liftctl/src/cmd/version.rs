use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("liftctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: liftctl");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("LIFTCTL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: engine={}, cli=true",
        cfg!(feature = "engine")
    );
    let link = liftctl_transport::LinkConfig::default();
    println!(
        "default_link: {} baud, {} data bits",
        link.baud_rate, link.data_bits
    );
    println!(
        "protocol: frame version 0x{:02X}, {} ms x {} attempts",
        liftctl_frame::VERSION,
        liftctl_engine::EngineConfig::default().response_timeout.as_millis(),
        liftctl_engine::EngineConfig::default().max_attempts
    );

    Ok(SUCCESS)
}
