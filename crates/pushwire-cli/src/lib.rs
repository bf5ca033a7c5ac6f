//! Client runtime for the pushwire daemon.
//!
//! `pushwire send` turns its flags into a single JSON line, delivers it over
//! TCP and prints the status token the daemon answers with. The process
//! exits successfully only when the daemon replies `ok`.

mod cli;
mod command;
mod errors;
mod transport;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use crate::cli::{Cli, CliCommand, SendArgs};
use crate::errors::AppError;

/// Reply token that signals the daemon accepted the request.
pub const ACCEPTED_REPLY: &str = "ok";

/// Runs the client with the given arguments and output streams.
///
/// Output that cannot be written is dropped; the exit code still reflects
/// the outcome.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(error, stdout, stderr),
    };

    match execute(&cli, stdout) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            writeln!(stderr, "pushwire: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W, E>(error: clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    W: Write,
    E: Write,
{
    let kind = error.kind();
    let usage = AppError::CliUsage(error);
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            write!(stdout, "{usage}").ok();
            ExitCode::SUCCESS
        }
        _ => {
            write!(stderr, "{usage}").ok();
            ExitCode::from(2)
        }
    }
}

/// Returns whether the daemon accepted the request.
fn execute<W: Write>(cli: &Cli, stdout: &mut W) -> Result<bool, AppError> {
    match &cli.command {
        CliCommand::Send(args) => send(args, stdout),
    }
}

fn send<W: Write>(args: &SendArgs, stdout: &mut W) -> Result<bool, AppError> {
    let line = command::request_line(args)?;
    let mut stream = transport::connect(&args.host, args.port)?;
    let reply = transport::exchange(&mut stream, &line)?;
    writeln!(stdout, "{reply}").map_err(AppError::ForwardResponse)?;
    Ok(reply == ACCEPTED_REPLY)
}
