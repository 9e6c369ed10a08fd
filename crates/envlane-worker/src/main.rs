//! Worker binary entry point.
//!
//! Spawned by the server, one per accepted connection. stdin/stdout carry
//! the framed worker channel, so all logging goes to stderr.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    match envlane_worker::serve(&mut stdin.lock(), &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
