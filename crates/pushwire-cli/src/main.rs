//! CLI entrypoint for sending push requests to a pushwire daemon.
//!
//! The binary delegates to [`pushwire_cli::run`], which parses the flags,
//! submits one request and prints the daemon's status reply.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    pushwire_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
