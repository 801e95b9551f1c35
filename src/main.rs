//! `rollerd` entry point (spec 4.E, 6, 7): parse arguments, resolve the
//! configuration, daemonize, and run the scan loop and control server
//! side by side until a signal or a `rollcmd_shutdown` stops them.
//!
//! Mirrors the teacher's `main.rs` shape: a synchronous `fn main() ->
//! ExitCode` that does config/logging/daemonizing setup before ever
//! touching async code, then builds its own multi-threaded Tokio runtime
//! and enters it once with `block_on`.

mod center;
mod config;
mod daemon;
mod dspub;
mod error;
mod log;
mod phase;
mod signer;

mod control;
mod scan;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rollerd_records::SystemClock;

use crate::config::{Config, DaemonArgs};
use crate::log::Logger;

fn main() -> ExitCode {
    let args = DaemonArgs::parse();

    let config = match Config::resolve(&args) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("rollerd couldn't be configured: {error}");
            return ExitCode::from(1);
        }
    };

    if args.parameters {
        println!("{config:#?}");
        return ExitCode::SUCCESS;
    }

    let logger = match Logger::launch(config.loglevel, config.logtz, &config.logfile) {
        Ok(logger) => logger,
        Err(error) => {
            eprintln!("rollerd couldn't open its log file: {error}");
            return ExitCode::from(1);
        }
    };

    let pidfile_lock = match daemon::acquire_pidfile_lock(&config.pidfile) {
        Ok(lock) => lock,
        Err(error) => {
            eprintln!("rollerd couldn't start: {error}");
            return ExitCode::from(3);
        }
    };

    if let Err(error) = daemon::daemonize(config.foreground, config.username.as_deref(), config.realm.as_deref()) {
        eprintln!("rollerd couldn't daemonize: {error}");
        return ExitCode::from(3);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("rollerd couldn't start Tokio: {error}");
            return ExitCode::from(3);
        }
    };

    let center = center::Center::new(config, logger, Arc::new(SystemClock));

    // `pidfile_lock`'s advisory lock is tied to the open file description,
    // not this process, so it survives `daemonize`'s fork; kept alive for
    // the run's whole duration as rollerd's single-instance guard.
    let exit = runtime.block_on(run(Arc::clone(&center)));
    drop(pidfile_lock);
    exit
}

/// Runs the scan loop and control server side by side, watching for
/// `SIGHUP` (wake the scan loop early) and `SIGINT`/`SIGTERM` (shut both
/// down) until `rollcmd_shutdown` or a signal asks for an orderly exit.
async fn run(center: Arc<center::Center>) -> ExitCode {
    let mut sighup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
        Ok(s) => s,
        Err(error) => {
            center.log(
                crate::config::LogLevel::Fatal,
                "rollerd",
                format_args!("could not install SIGHUP handler: {error}"),
            );
            return ExitCode::from(3);
        }
    };
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(error) => {
            center.log(
                crate::config::LogLevel::Fatal,
                "rollerd",
                format_args!("could not install SIGTERM handler: {error}"),
            );
            return ExitCode::from(3);
        }
    };

    let scan_task = tokio::spawn(scan::run(Arc::clone(&center)));
    let control_task = tokio::spawn(control::run(Arc::clone(&center)));

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                center.log(crate::config::LogLevel::Info, "rollerd", format_args!("SIGHUP received; waking scan loop"));
                center.wake.notify_waiters();
            }
            _ = sigterm.recv() => {
                center.log(crate::config::LogLevel::Info, "rollerd", format_args!("SIGTERM received; shutting down"));
                center.request_shutdown();
                break;
            }
            res = tokio::signal::ctrl_c() => {
                if res.is_err() {
                    center.log(crate::config::LogLevel::Err, "rollerd", format_args!("listening for SIGINT failed"));
                }
                center.log(crate::config::LogLevel::Info, "rollerd", format_args!("SIGINT received; shutting down"));
                center.request_shutdown();
                break;
            }
            () = center.shutdown.notified() => break,
        }
    }

    let _ = scan_task.await;
    control_task.abort();
    let _ = control_task.await;

    ExitCode::SUCCESS
}
