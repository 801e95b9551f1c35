//! Error types for the daemon's own concerns (spec 7).
//!
//! Plain enums with hand-written `Display`/`Error` impls, matching the
//! teacher's `center::{ZoneAddError, ZoneRemoveError}` style: no
//! `thiserror`/`anyhow` in this codebase.

use std::fmt;

/// A configuration error (spec 7: "bad CLI option, missing log dir, bad
/// log level"). Fatal at startup; maps to exit code 1.
#[derive(Debug)]
pub enum ConfigError {
    BadOption(String),
    Io { path: String, source: std::io::Error },
    BadLogLevel(String),
    BadLogTz(String),
    BadRolloverMethod(String),
    BadProvider(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadOption(msg) => write!(f, "bad option: {msg}"),
            ConfigError::Io { path, source } => write!(f, "{path}: {source}"),
            ConfigError::BadLogLevel(s) => write!(f, "unrecognized log level: {s}"),
            ConfigError::BadLogTz(s) => write!(f, "unrecognized log timezone: {s} (want gmt or local)"),
            ConfigError::BadRolloverMethod(s) => write!(f, "unrecognized rollover method: {s}"),
            ConfigError::BadProvider(s) => write!(f, "unrecognized DS publication provider: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A fatal startup error (spec 7: "can't open socket, can't drop PID,
/// invalid event handler"). Maps to exit code 3.
#[derive(Debug)]
pub enum FatalError {
    AlreadyRunning { pidfile: String },
    Socket { path: String, source: std::io::Error },
    PrivilegeDrop(String),
    Daemonize(String),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::AlreadyRunning { pidfile } => {
                write!(f, "another rollerd instance already holds {pidfile}")
            }
            FatalError::Socket { path, source } => {
                write!(f, "could not bind control socket {path}: {source}")
            }
            FatalError::PrivilegeDrop(msg) => write!(f, "could not drop privileges: {msg}"),
            FatalError::Daemonize(msg) => write!(f, "could not daemonize: {msg}"),
        }
    }
}

impl std::error::Error for FatalError {}

/// The outcome of running the external signer (spec 4.I). Zone-level, not
/// fatal: the caller bumps the zone's error counter and retries next scan.
#[derive(Debug)]
pub enum SignerError {
    Spawn(std::io::Error),
    NonZeroExit { status: Option<i32>, output: String },
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerError::Spawn(e) => write!(f, "could not run signer: {e}"),
            SignerError::NonZeroExit { status, output } => {
                write!(f, "signer exited with status {status:?}: {output}")
            }
        }
    }
}

impl std::error::Error for SignerError {}

/// The outcome of running the reload command (spec 4.I).
#[derive(Debug)]
pub enum ReloadError {
    Spawn(std::io::Error),
    NonZeroExit { status: Option<i32> },
}

impl fmt::Display for ReloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadError::Spawn(e) => write!(f, "could not run reload command: {e}"),
            ReloadError::NonZeroExit { status } => {
                write!(f, "reload command exited with status {status:?}")
            }
        }
    }
}

impl std::error::Error for ReloadError {}
