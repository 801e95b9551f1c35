//! The daemon's central, explicitly-passed context (spec 9: "global
//! process state ... is centralized in a single daemon context passed
//! explicitly to every routine; no true globals"), playing the role the
//! teacher's `center::Center` plays for its zone pipelines.
//!
//! `Center` itself is nearly all read-only after startup (the resolved
//! [`Config`]); the handful of fields spec.md says can change at runtime
//! through the control channel (spec 4.E) — the rollrec path, sleep
//! time, per-zone log levels, the global `zsargs` string, and the
//! display/phase-message toggles — live in [`RuntimeState`], guarded by
//! a plain `std::sync::Mutex`, never held across an `.await` (the actual
//! cross-step serialization for a read-mutate-write rollrec sequence is
//! the on-disk `rollrec.lock` advisory lock, per spec.md §5).

use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use rollerd_records::Clock;
use tokio::sync::Notify;

use crate::config::{Config, LogLevel, LogTz};
use crate::log::Logger;

/// The handful of daemon settings the control channel (spec 4.E) can
/// change while the daemon is running.
#[derive(Debug)]
pub struct RuntimeState {
    pub rrfile: Utf8PathBuf,
    pub sleeptime: u64,
    pub zsargs: String,
    pub loglevel: LogLevel,
    pub logtz: LogTz,
    pub logfile: Utf8PathBuf,
    /// Per-zone log level overrides set via `rollcmd_zonelog`.
    pub zone_loglevels: foldhash::HashMap<String, LogLevel>,
    /// Whether the (long-retired) curses display is "on"; tracked only
    /// so `rollcmd_display` has somewhere to record its toggle.
    pub display_on: bool,
    /// Whether `rollcmd_phasemsg` is set to long or short form.
    pub phasemsg_short: bool,
    /// Zones explicitly paused via `rollcmd_skipzone`/`rollcmd_skipall`
    /// independent of the rollrec's own `roll`/`skip` section kind, so a
    /// later `rollcmd_rollzone`/`rollcmd_rollall` can tell the two apart.
    pub operator_paused: foldhash::HashSet<String>,
}

/// The daemon's shared context: one instance, wrapped in an `Arc`, handed
/// to the scan loop, the control server, and every phase-engine routine.
pub struct Center {
    pub config: Config,
    pub runtime: Mutex<RuntimeState>,
    pub logger: &'static Logger,
    pub clock: Arc<dyn Clock>,
    pub boot_time: i64,

    /// Woken by `SIGHUP` (spec 4.E, 9): "poll for a command now". The
    /// scan loop and the control server both watch it so an operator
    /// command doesn't wait out a full sleep interval.
    pub wake: Notify,
    /// Set once `SIGINT` arrives or `rollcmd_shutdown` is processed;
    /// every cooperating task observes it at its next safe point.
    pub shutdown: Notify,
    pub shutting_down: std::sync::atomic::AtomicBool,
}

impl Center {
    pub fn new(config: Config, logger: &'static Logger, clock: Arc<dyn Clock>) -> Arc<Self> {
        let boot_time = clock.now_unix();
        let runtime = RuntimeState {
            rrfile: config.rrfile.clone(),
            sleeptime: config.sleeptime,
            zsargs: config.zsargs.clone(),
            loglevel: config.loglevel,
            logtz: config.logtz,
            logfile: config.logfile.clone(),
            zone_loglevels: foldhash::HashMap::default(),
            display_on: false,
            phasemsg_short: false,
            operator_paused: foldhash::HashSet::default(),
        };
        Arc::new(Center {
            config,
            runtime: Mutex::new(runtime),
            logger,
            clock,
            boot_time,
            wake: Notify::new(),
            shutdown: Notify::new(),
            shutting_down: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, std::sync::atomic::Ordering::Relaxed);
        self.shutdown.notify_waiters();
    }

    /// Logs at `field`'s per-zone override level if one is set via
    /// `rollcmd_zonelog`, else the global level.
    pub fn log(&self, level: LogLevel, field: &str, args: std::fmt::Arguments<'_>) {
        let threshold = {
            let runtime = self.runtime.lock().unwrap();
            effective_threshold(&runtime, field)
        };
        if level.as_i32() >= threshold.as_i32() {
            self.logger.log(level, field, args);
        }
    }

    pub fn rrfile(&self) -> Utf8PathBuf {
        self.runtime.lock().unwrap().rrfile.clone()
    }

    pub fn sleeptime(&self) -> u64 {
        self.runtime.lock().unwrap().sleeptime
    }

    pub fn zsargs(&self) -> String {
        self.runtime.lock().unwrap().zsargs.clone()
    }

    /// Sets `zone`'s log-level override, replacing any earlier one
    /// (`rollcmd_zonelog`).
    pub fn set_zone_loglevel(&self, zone: String, level: LogLevel) {
        self.runtime.lock().unwrap().zone_loglevels.insert(zone, level);
    }

    /// Seeds `zone`'s log-level override from its rollrec `loglevel`
    /// field, without clobbering an operator override already in place
    /// (spec 4.H: "restore log level to the per-record level if set").
    pub fn ensure_zone_loglevel(&self, zone: &str, level: LogLevel) {
        let mut runtime = self.runtime.lock().unwrap();
        runtime.zone_loglevels.entry(zone.to_string()).or_insert(level);
    }

    /// Acquires the rollrec lock, runs `f` against the loaded file, then
    /// writes it back before releasing the lock — the read-mutate-write
    /// sequence every state-mutating control verb needs (spec 4.E).
    pub fn with_rollrec<F, T>(&self, f: F) -> std::io::Result<T>
    where
        F: FnOnce(&mut rollerd_records::RollRec) -> T,
    {
        let (_lock, mut rollrec) = self.acquire_rollrec()?;
        let result = f(&mut rollrec);
        rollrec.save()?;
        Ok(result)
    }

    /// Acquires the rollrec lock and loads the file, handing both back to
    /// the caller. Used where the mutation itself needs to `.await`
    /// (running the signer) between load and save, so the lock must
    /// outlive a single synchronous closure.
    pub fn acquire_rollrec(
        &self,
    ) -> std::io::Result<(rollerd_records::FileLock, rollerd_records::RollRec)> {
        let rrfile = self.rrfile();
        let lock = rollerd_records::FileLock::acquire(self.config.lockfile.as_std_path())?;
        let rollrec = rollerd_records::RollRec::load(&rrfile)?;
        Ok((lock, rollrec))
    }
}

/// Resolves the threshold a message tagged `field` is judged against:
/// `field`'s `rollcmd_zonelog` override if one is set, else the global
/// level. Factored out of [`Center::log`] so it's testable without
/// standing up a real `Logger` (which installs a process-global
/// `tracing` subscriber).
fn effective_threshold(runtime: &RuntimeState, field: &str) -> LogLevel {
    runtime.zone_loglevels.get(field).copied().unwrap_or(runtime.loglevel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_state() -> RuntimeState {
        RuntimeState {
            rrfile: "/tmp/test.rrf".into(),
            sleeptime: 60,
            zsargs: String::new(),
            loglevel: LogLevel::Phase,
            logtz: LogTz::Gmt,
            logfile: "-".into(),
            zone_loglevels: foldhash::HashMap::from_iter([("example.com".to_string(), LogLevel::Tmi)]),
            display_on: false,
            phasemsg_short: false,
            operator_paused: Default::default(),
        }
    }

    #[test]
    fn per_zone_override_takes_precedence() {
        let runtime = runtime_state();
        assert_eq!(effective_threshold(&runtime, "example.com"), LogLevel::Tmi);
        assert_eq!(effective_threshold(&runtime, "other.example"), LogLevel::Phase);
    }

    #[test]
    fn sleeptime_and_zsargs_are_runtime_mutable() {
        let mut runtime = runtime_state();
        runtime.sleeptime = 120;
        runtime.zsargs = "-verbose".to_string();
        assert_eq!(runtime.sleeptime, 120);
        assert_eq!(runtime.zsargs, "-verbose");
    }
}
