use rpclink_client::{CodecType, MAGIC_NUMBER};

use crate::cmd::{dialer, VersionArgs};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rpclink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let codecs: Vec<String> = dialer()
        .registry()
        .types()
        .iter()
        .map(CodecType::to_string)
        .collect();

    println!("name: rpclink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("RPCLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("RPCLINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("magic_number: {MAGIC_NUMBER:#x}");
    println!("codecs: {}", codecs.join(", "));

    Ok(SUCCESS)
}
