//! The scan loop (spec 4.H): rollerd's heartbeat. Every `sleeptime`
//! seconds (or immediately on `SIGHUP`/a control command waking it), the
//! loop walks every active rollrec entry and hands it to [`phase::advance_zone`].

use std::sync::Arc;

use rollerd_records::{FullScanScheduler, KeyRec, Scheduler};

use crate::center::Center;
use crate::config::LogLevel;
use crate::phase;

/// Runs the scan loop until told to shut down, or once if
/// `config.singlerun` is set (spec 6: `-singlerun`).
pub async fn run(center: Arc<Center>) {
    loop {
        scan_once(&center).await;

        if center.config.singlerun || center.is_shutting_down() {
            center.request_shutdown();
            return;
        }

        let sleep = tokio::time::sleep(std::time::Duration::from_secs(center.sleeptime()));
        tokio::select! {
            () = sleep => {}
            () = center.wake.notified() => {}
            () = center.shutdown.notified() => return,
        }
    }
}

/// One full pass over the rollrec file (spec 4.H): acquire the lock,
/// load the file, advance every active entry, save, release the lock.
/// A zone whose keyrec fails to load is logged and marked as a zone
/// error rather than aborting the whole pass.
async fn scan_once(center: &Center) {
    let (_lock, mut rollrec) = match center.acquire_rollrec() {
        Ok(v) => v,
        Err(e) => {
            center.log(LogLevel::Err, "rollerd", format_args!("could not read rollrec: {e}"));
            return;
        }
    };

    let mut scheduler = FullScanScheduler;
    for zonename in scheduler.select(&rollrec) {
        let Some(mut entry) = rollrec.entry_mut(&zonename) else {
            continue;
        };

        if let Some(level) = entry.loglevel().and_then(crate::config::LogLevel::parse) {
            center.ensure_zone_loglevel(&zonename, level);
        }

        let directory = entry.directory(&center.config.directory);
        let keyrec_path = entry.keyrec_path(&center.config.directory);

        let mut keyrec = match &keyrec_path {
            Some(path) if path.exists() => match KeyRec::load(path) {
                Ok(k) => Some(k),
                Err(e) => {
                    center.log(
                        LogLevel::Err,
                        &zonename,
                        format_args!("{zonename}: could not load keyrec {path}: {e}"),
                    );
                    entry.zone_err();
                    None
                }
            },
            Some(path) if center.config.autosign => {
                phase::initial_sign(
                    center,
                    &center.config,
                    &zonename,
                    &mut entry,
                    directory.as_path(),
                    path,
                    center.clock.now_unix(),
                )
                .await;
                KeyRec::load(path).ok()
            }
            Some(path) => {
                center.log(
                    LogLevel::Err,
                    &zonename,
                    format_args!("{zonename}: keyrec {path} does not exist"),
                );
                entry.zone_err();
                None
            }
            None => {
                center.log(LogLevel::Err, &zonename, format_args!("{zonename}: no keyrec configured"));
                entry.zone_err();
                None
            }
        };

        phase::advance_zone(
            center,
            &center.config,
            &zonename,
            &mut entry,
            keyrec.as_mut(),
            directory.as_path(),
        )
        .await;

        if let Some(keyrec) = &keyrec {
            if let Err(e) = keyrec.save() {
                center.log(
                    LogLevel::Err,
                    &zonename,
                    format_args!("{zonename}: could not save keyrec: {e}"),
                );
            }
        }
    }

    if let Err(e) = rollrec.save() {
        center.log(LogLevel::Err, "rollerd", format_args!("could not save rollrec: {e}"));
    }
}
