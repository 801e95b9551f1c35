use std::fmt;
use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::builder::PossibleValue;
use tracing::level_filters::LevelFilter;

use crate::client::{RollctlClient, Transport};
use crate::commands::Command;

const DEFAULT_SOCKFILE: &str = "/run/dnssec-tools/rollmgr.socket";

#[derive(Clone, Debug, Parser)]
#[command(version = env!("ROLLERD_BUILD_VERSION"), disable_help_subcommand = true)]
pub struct Args {
    /// Path to rollerd's control-channel Unix socket.
    #[arg(
        short = 'S',
        long = "socket",
        value_name = "PATH",
        default_value = DEFAULT_SOCKFILE,
        global = true,
        conflicts_with = "server"
    )]
    pub socket: Utf8PathBuf,

    /// Connect to rollerd's loopback TCP control channel instead of the
    /// Unix socket.
    #[arg(long = "server", value_name = "IP:PORT", global = true)]
    pub server: Option<SocketAddr>,

    /// Apply the command to every active zone in a group at once
    /// (prepends `g-` to the command verb).
    #[arg(short = 'g', long = "group", global = true)]
    pub group: bool,

    /// The minimum severity of rollctl's own log messages.
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warning", global = true)]
    pub log_level: CliLogLevel,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub async fn execute(self) -> Result<(), String> {
        let transport = match self.server {
            Some(addr) => Transport::Tcp(addr),
            None => Transport::Socket(self.socket),
        };
        let client = RollctlClient::new(transport);
        self.command.execute(client, self.group).await
    }
}

//----------- CliLogLevel -------------------------------------------------------

/// Severity level for rollctl's own log messages, distinct from the
/// `loglevel` subcommand, which sets rollerd's remote logging level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CliLogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl CliLogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CliLogLevel::Trace => "trace",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Info => "info",
            CliLogLevel::Warning => "warning",
            CliLogLevel::Error => "error",
        }
    }
}

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl clap::ValueEnum for CliLogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            CliLogLevel::Trace,
            CliLogLevel::Debug,
            CliLogLevel::Info,
            CliLogLevel::Warning,
            CliLogLevel::Error,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.as_str()))
    }
}

impl From<CliLogLevel> for LevelFilter {
    fn from(value: CliLogLevel) -> Self {
        match value {
            CliLogLevel::Trace => LevelFilter::TRACE,
            CliLogLevel::Debug => LevelFilter::DEBUG,
            CliLogLevel::Info => LevelFilter::INFO,
            CliLogLevel::Warning => LevelFilter::WARN,
            CliLogLevel::Error => LevelFilter::ERROR,
        }
    }
}
