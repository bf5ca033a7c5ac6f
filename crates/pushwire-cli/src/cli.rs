//! Command-line argument definitions for the pushwire client.

use clap::{Args, Parser, Subcommand};

use pushwire_config::DEFAULT_LISTEN_PORT;

/// Command-line interface for the pushwire client.
#[derive(Parser, Debug)]
#[command(name = "pushwire", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Client subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Sends one push request and prints the daemon's reply.
    Send(SendArgs),
}

/// Connection target and request fields for `pushwire send`.
///
/// Only the fields given on the command line are sent.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct SendArgs {
    /// Daemon host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) host: String,
    /// Daemon TCP port.
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    pub(crate) port: u16,
    /// Notification body.
    #[arg(long)]
    pub(crate) text: Option<String>,
    /// Sound identifier to play on delivery.
    #[arg(long)]
    pub(crate) sound: Option<String>,
    /// Badge count shown on the application icon.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) badge: Option<i32>,
    /// Opaque application payload.
    #[arg(long)]
    pub(crate) custom: Option<String>,
    /// Target device token.
    #[arg(long)]
    pub(crate) key: Option<String>,
}
