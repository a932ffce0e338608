use serialprims_frame::{DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use serialprims_schema::MessageKind;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("serialprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: serialprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("SERIALPRIMS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("frame_header: {HEADER_SIZE} bytes, max payload {DEFAULT_MAX_PAYLOAD} bytes");
    let kinds: Vec<String> = MessageKind::ALL
        .iter()
        .map(|kind| format!("{}={kind}", kind.as_u8()))
        .collect();
    println!("message_kinds: {}", kinds.join(", "));

    Ok(SUCCESS)
}
