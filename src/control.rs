//! Control-channel server (spec 4.E, 6): a Unix-socket listener that
//! accepts one CRLF-framed request per connection, dispatches it to the
//! matching `rollcmd_*` verb, and replies with a fixed return code plus
//! a message.
//!
//! The "soon queue" scheduler variant spec.md calls out as experimental
//! and non-normative is not implemented; `rollcmd_runqueue`/
//! `rollcmd_queuelist`/`rollcmd_queuestatus` reply `Okay` with a message
//! saying so, rather than a group of `unimplemented!()`s.

use std::sync::Arc;
use std::time::Duration;

use rollerd_api::{Command, ReturnCode, Verb};
use rollerd_records::{KeyRec, PhaseType, RollRec};
use tokio::net::{UnixListener, UnixStream};

use crate::center::Center;
use crate::config::{LogLevel, LogTz};
use crate::phase;

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the control server until `center` is told to shut down. Errors
/// binding the socket are fatal (spec 7: "can't open socket").
pub async fn run(center: Arc<Center>) {
    let sockpath = center.config.sockfile.clone();
    if let Some(dir) = sockpath.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let _ = std::fs::remove_file(sockpath.as_std_path());

    let listener = match UnixListener::bind(sockpath.as_std_path()) {
        Ok(l) => l,
        Err(e) => {
            let error = crate::error::FatalError::Socket { path: sockpath.to_string(), source: e };
            center.log(LogLevel::Fatal, "rollerd", format_args!("{error}"));
            center.request_shutdown();
            return;
        }
    };

    loop {
        if center.is_shutting_down() {
            return;
        }
        match tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept()).await {
            Ok(Ok((stream, _addr))) => {
                let center = Arc::clone(&center);
                tokio::spawn(async move {
                    handle_connection(&center, stream).await;
                });
            }
            Ok(Err(e)) => {
                center.log(LogLevel::Err, "rollerd", format_args!("control accept failed: {e}"));
            }
            Err(_timeout) => {
                // Gives the scan loop a chance to run between commands
                // (spec 4.E: "short accept timeout ... so the scan loop
                // can make progress").
            }
        }
    }
}

async fn handle_connection(center: &Center, mut stream: UnixStream) {
    let (cmd_line, data) = match rollerd_api::read_request(&mut stream).await {
        Ok(v) => v,
        Err(_) => return,
    };

    let Some(command) = Command::parse(&cmd_line) else {
        let _ = rollerd_api::write_frame(&mut stream, &ReturnCode::BadEvent.to_string(), "unrecognized command").await;
        return;
    };

    let (code, msg) = dispatch(center, &command, &data).await;
    let _ = rollerd_api::write_frame(&mut stream, &code.to_string(), &msg).await;
}

async fn dispatch(center: &Center, command: &Command, data: &str) -> (ReturnCode, String) {
    if command.grouped {
        return dispatch_grouped(center, command.verb).await;
    }
    dispatch_single(center, command.verb, data).await
}

async fn dispatch_grouped(center: &Center, verb: Verb) -> (ReturnCode, String) {
    let names = match center.with_rollrec(|rollrec| rollrec.active_names()) {
        Ok(names) => names,
        Err(e) => return (ReturnCode::RrfOpen, format!("could not read rollrec: {e}")),
    };
    if names.is_empty() {
        return (ReturnCode::NoZones, "no active zones".to_string());
    }

    let mut ok = 0;
    let mut failed = Vec::new();
    for zone in names {
        let (code, _msg) = dispatch_single(center, verb, &zone).await;
        if code == ReturnCode::Okay {
            ok += 1;
        } else {
            failed.push(zone);
        }
    }
    if failed.is_empty() {
        (ReturnCode::Okay, format!("{verb} ran for {ok} zone(s)"))
    } else {
        (ReturnCode::Okay, format!("{verb} ran for {ok} zone(s); failed: {}", failed.join(", ")))
    }
}

#[allow(clippy::too_many_lines)]
async fn dispatch_single(center: &Center, verb: Verb, data: &str) -> (ReturnCode, String) {
    let now = center.clock.now_unix();

    match verb {
        Verb::Display => {
            let on = data.trim() != "0";
            center.runtime.lock().unwrap().display_on = on;
            (ReturnCode::Okay, format!("display {}", if on { "started" } else { "stopped" }))
        }

        Verb::Dspub => {
            let zone = data.trim().to_string();
            center.with_rollrec(|rollrec| {
                let Some(mut entry) = rollrec.entry_mut(&zone) else {
                    return (ReturnCode::BadZone, format!("no such zone {zone}"));
                };
                if entry.kskphase() != 5 {
                    return (ReturnCode::BadZoneData, format!("{zone} is not waiting for DS publication"));
                }
                phase::start_rollover(center, &mut entry, &zone, PhaseType::Ksk, now);
                entry.set_phase(PhaseType::Ksk, 6);
                (ReturnCode::Okay, format!("parent DS publication acknowledged for {zone}"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Dspuball => center
            .with_rollrec(|rollrec| {
                let mut count = 0;
                for name in rollrec.active_names() {
                    if let Some(mut entry) = rollrec.entry_mut(&name) {
                        if entry.kskphase() == 5 {
                            entry.set_phase(PhaseType::Ksk, 6);
                            entry.settime(now);
                            count += 1;
                        }
                    }
                }
                (ReturnCode::Okay, format!("DS publication acknowledged for {count} zone(s)"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}"))),

        Verb::Logfile => {
            let path = camino::Utf8PathBuf::from(data.trim());
            match center.logger.set_target(&path) {
                Ok(()) => {
                    center.runtime.lock().unwrap().logfile = path.clone();
                    (ReturnCode::Okay, format!("log file set to {path}"))
                }
                Err(e) => (ReturnCode::BadFile, format!("could not open {path}: {e}")),
            }
        }

        Verb::Loglevel => match LogLevel::parse(data) {
            Some(level) => {
                center.logger.set_level(level);
                center.runtime.lock().unwrap().loglevel = level;
                (ReturnCode::Okay, format!("log level set to {}", level.as_str()))
            }
            None => (ReturnCode::BadLevel, format!("unrecognized log level {data}")),
        },

        Verb::Logmsg => {
            center.log(LogLevel::Always, "rollerd", format_args!("{data}"));
            (ReturnCode::Okay, "message logged".to_string())
        }

        Verb::Logtz => match LogTz::parse(data) {
            Some(tz) => {
                center.logger.set_tz(tz);
                center.runtime.lock().unwrap().logtz = tz;
                (ReturnCode::Okay, format!("log timezone set to {}", tz.as_str()))
            }
            None => (ReturnCode::BadTz, format!("unrecognized log timezone {data}")),
        },

        Verb::Mergerrfs => {
            let paths: Vec<&str> = data.split(':').filter(|s| !s.is_empty()).collect();
            if paths.is_empty() {
                return (ReturnCode::NoArgs, "no rollrec files given".to_string());
            }
            center
                .with_rollrec(|rollrec| {
                    for path in &paths {
                        match RollRec::load(camino::Utf8Path::new(path)) {
                            Ok(other) => {
                                for section in other.store.sections {
                                    if !rollrec.store.sections.iter().any(|s| s.name == section.name) {
                                        rollrec.store.sections.push(section);
                                    }
                                }
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(())
                })
                .and_then(|inner| inner)
                .map(|()| (ReturnCode::Okay, "rollrec files merged".to_string()))
                .unwrap_or_else(|e| (ReturnCode::BadRollrec, format!("could not merge rollrec files: {e}")))
        }

        Verb::Phasemsg => {
            let short = data.trim().eq_ignore_ascii_case("short");
            center.runtime.lock().unwrap().phasemsg_short = short;
            (ReturnCode::Okay, format!("phase messages set to {}", if short { "short" } else { "long" }))
        }

        Verb::Rollall => center
            .with_rollrec(|rollrec| {
                let mut count = 0;
                for name in rollrec.names() {
                    if let Some(mut entry) = rollrec.entry_mut(&name) {
                        if !entry.is_active() {
                            entry.set_active(true);
                            count += 1;
                        }
                    }
                }
                (ReturnCode::Okay, format!("{count} zone(s) resumed"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}"))),

        Verb::Rollallksks => center
            .with_rollrec(|rollrec| {
                let mut count = 0;
                for name in rollrec.active_names() {
                    if let Some(mut entry) = rollrec.entry_mut(&name) {
                        if entry.phase_type().is_none() {
                            phase::start_rollover(center, &mut entry, &name, PhaseType::Ksk, now);
                            count += 1;
                        }
                    }
                }
                (ReturnCode::Okay, format!("{count} zone(s) now rolling KSKs"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}"))),

        Verb::Rollallzsks => center
            .with_rollrec(|rollrec| {
                let mut count = 0;
                for name in rollrec.active_names() {
                    if let Some(mut entry) = rollrec.entry_mut(&name) {
                        if entry.phase_type().is_none() {
                            phase::start_rollover(center, &mut entry, &name, PhaseType::Zsk, now);
                            count += 1;
                        }
                    }
                }
                (ReturnCode::Okay, format!("{count} zone(s) now rolling ZSKs"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}"))),

        // Rollksk/Rollzsk's refusal codes are named after the *requested*
        // verb, not after whichever phase happens to be blocking it:
        // spec.md §8 scenario 6 pins down `rollcmd_rollzsk` against a
        // `kskphase=3` zone as returning `ZskRoll` (12), not `KskRoll`
        // (11) — even though it's the KSK phase that's actually blocking.
        // `original_source/dnssec/rollerd/cmd.py` returns the
        // blocker-named code instead (`ROLLCMD_RC_KSKROLL` in that same
        // case); spec.md's explicit, testable scenario wins over the
        // original here.
        Verb::Rollksk => {
            let zone = data.trim().to_string();
            center
                .with_rollrec(|rollrec| {
                    let Some(mut entry) = rollrec.entry_mut(&zone) else {
                        return (ReturnCode::BadZone, format!("no such zone {zone}"));
                    };
                    if entry.zskphase() != 0 {
                        return (ReturnCode::KskRoll, format!("{zone} cannot start a KSK rollover while a ZSK rollover is in progress"));
                    }
                    if entry.kskphase() != 0 {
                        return (ReturnCode::Okay, format!("{zone} is already rolling KSKs"));
                    }
                    phase::start_rollover(center, &mut entry, &zone, PhaseType::Ksk, now);
                    (ReturnCode::Okay, format!("KSK rollover started for {zone}"))
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Rollzsk => {
            let zone = data.trim().to_string();
            center
                .with_rollrec(|rollrec| {
                    let Some(mut entry) = rollrec.entry_mut(&zone) else {
                        return (ReturnCode::BadZone, format!("no such zone {zone}"));
                    };
                    if entry.kskphase() != 0 {
                        return (ReturnCode::ZskRoll, format!("{zone} cannot start a ZSK rollover while a KSK rollover is in progress"));
                    }
                    if entry.zskphase() != 0 {
                        return (ReturnCode::Okay, format!("{zone} is already rolling ZSKs"));
                    }
                    phase::start_rollover(center, &mut entry, &zone, PhaseType::Zsk, now);
                    (ReturnCode::Okay, format!("ZSK rollover started for {zone}"))
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Rollrec => {
            let path = data.trim();
            if RollRec::load(camino::Utf8Path::new(path)).is_err() {
                return (ReturnCode::BadRollrec, format!("could not read rollrec file {path}"));
            }
            center.runtime.lock().unwrap().rrfile = camino::Utf8PathBuf::from(path);
            (ReturnCode::Okay, format!("now using rollrec file {path}"))
        }

        Verb::Rollzone => {
            let zone = data.trim().to_string();
            center
                .with_rollrec(|rollrec| {
                    let Some(mut entry) = rollrec.entry_mut(&zone) else {
                        return (ReturnCode::BadZone, format!("no such zone {zone}"));
                    };
                    entry.set_active(true);
                    (ReturnCode::Okay, format!("rollover restarted for {zone}"))
                })
                .map(|result| {
                    center.runtime.lock().unwrap().operator_paused.remove(&zone);
                    result
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Skipall => center
            .with_rollrec(|rollrec| {
                let mut count = 0;
                for name in rollrec.active_names() {
                    if let Some(mut entry) = rollrec.entry_mut(&name) {
                        entry.set_active(false);
                        count += 1;
                    }
                    center.runtime.lock().unwrap().operator_paused.insert(name);
                }
                (ReturnCode::Okay, format!("{count} zone(s) stopped"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}"))),

        Verb::Skipzone => {
            let zone = data.trim().to_string();
            center
                .with_rollrec(|rollrec| {
                    let Some(mut entry) = rollrec.entry_mut(&zone) else {
                        return (ReturnCode::BadZone, format!("no such zone {zone}"));
                    };
                    entry.set_active(false);
                    (ReturnCode::Okay, format!("rollover stopped for {zone}"))
                })
                .map(|result| {
                    center.runtime.lock().unwrap().operator_paused.insert(zone);
                    result
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Sleeptime => match data.trim().parse::<u64>() {
            Ok(seconds) => {
                let seconds = seconds.max(10);
                center.runtime.lock().unwrap().sleeptime = seconds;
                (ReturnCode::Okay, format!("sleep time set to {seconds}"))
            }
            Err(_) => (ReturnCode::BadSleep, format!("bad sleep time {data}")),
        },

        Verb::Splitrrf => {
            let parts: Vec<&str> = data.split(':').filter(|s| !s.is_empty()).collect();
            let Some((&dest, entries)) = parts.split_first() else {
                return (ReturnCode::NoArgs, "no destination rollrec file given".to_string());
            };
            if entries.is_empty() {
                return (ReturnCode::NoArgs, "no rollrec entries to split off".to_string());
            }
            center
                .with_rollrec(|rollrec| {
                    let mut split = RollRec::new_empty(camino::Utf8Path::new(dest));
                    for name in entries {
                        if let Some(pos) = rollrec.store.sections.iter().position(|s| s.name == *name) {
                            let section = rollrec.store.sections.remove(pos);
                            split.store.sections.push(section);
                        }
                    }
                    split.save()
                })
                .and_then(|inner| inner)
                .map(|()| (ReturnCode::Okay, format!("split {} entries into {dest}", entries.len())))
                .unwrap_or_else(|e| (ReturnCode::BadRollrec, format!("could not split rollrec file: {e}")))
        }

        Verb::Status => {
            let rrfile = center.rrfile();
            center
                .with_rollrec(|rollrec| {
                    let mut ksk = 0;
                    let mut zsk = 0;
                    let mut idle = 0;
                    for name in rollrec.active_names() {
                        if let Some(entry) = rollrec.entry(&name) {
                            match entry.phase_type() {
                                Some(PhaseType::Ksk) => ksk += 1,
                                Some(PhaseType::Zsk) => zsk += 1,
                                None => idle += 1,
                            }
                        }
                    }
                    (
                        ReturnCode::Okay,
                        format!(
                            "boot-time: {}\nrollrec file: {rrfile}\nevent method: full-list scan\n{} zone(s): {ksk} rolling KSKs, {zsk} rolling ZSKs, {idle} idle",
                            center.boot_time,
                            ksk + zsk + idle
                        ),
                    )
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not read rollrec: {e}")))
        }

        Verb::Zonestatus => center
            .with_rollrec(|rollrec| {
                let mut lines = Vec::new();
                for name in rollrec.names() {
                    if let Some(entry) = rollrec.entry(&name) {
                        let state = match entry.phase_type() {
                            Some(PhaseType::Ksk) => format!("KSK phase {}", entry.kskphase()),
                            Some(PhaseType::Zsk) => format!("ZSK phase {}", entry.zskphase()),
                            None => "not rolling".to_string(),
                        };
                        lines.push(format!("{name}: {} ({state})", if entry.is_active() { "active" } else { "skip" }));
                    }
                }
                (ReturnCode::Okay, lines.join("\n"))
            })
            .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not read rollrec: {e}"))),

        Verb::Zonegroup => {
            let group = data.trim();
            if group.is_empty() {
                (ReturnCode::Okay, "no zone groups defined".to_string())
            } else {
                (ReturnCode::BadZoneGroup, format!("no such zone group {group}"))
            }
        }

        Verb::Zonelog => {
            let Some((zone, level)) = data.split_once(':') else {
                return (ReturnCode::BadZoneData, format!("malformed zone:loglevel pair {data}"));
            };
            let Some(level) = LogLevel::parse(level) else {
                return (ReturnCode::BadLevel, format!("unrecognized log level {level}"));
            };
            center.set_zone_loglevel(zone.to_string(), level);
            (ReturnCode::Okay, format!("log level for {zone} set to {}", level.as_str()))
        }

        Verb::Zsargs => {
            let mut tokens: Vec<&str> = data.split(',').filter(|s| !s.is_empty()).collect();
            let Some(zone) = tokens.pop() else {
                return (ReturnCode::NoArgs, "no zsargs/zone given".to_string());
            };
            let zsargs = tokens.join(" ");
            let zone = zone.to_string();
            center
                .with_rollrec(|rollrec| {
                    let Some(mut entry) = rollrec.entry_mut(&zone) else {
                        return (ReturnCode::BadZone, format!("no such zone {zone}"));
                    };
                    entry.set_zsargs(&zsargs);
                    (ReturnCode::Okay, format!("zsargs for {zone} set to '{zsargs}'"))
                })
                .unwrap_or_else(|e| (ReturnCode::RrfOpen, format!("could not update rollrec: {e}")))
        }

        Verb::Signzone => {
            let zone = data.trim().to_string();
            sign_one(center, &zone).await
        }

        Verb::Signzones => {
            let only_active = data.trim() != "all";
            let names = center.with_rollrec(|rollrec| {
                if only_active {
                    rollrec.active_names()
                } else {
                    rollrec.names()
                }
            });
            match names {
                Ok(names) => {
                    let mut count = 0;
                    for zone in &names {
                        if sign_one(center, zone).await.0 == ReturnCode::Okay {
                            count += 1;
                        }
                    }
                    (ReturnCode::Okay, format!("signed {count}/{} zone(s)", names.len()))
                }
                Err(e) => (ReturnCode::RrfOpen, format!("could not read rollrec: {e}")),
            }
        }

        Verb::Shutdown => {
            center.request_shutdown();
            (ReturnCode::Okay, "rollerd shutting down".to_string())
        }

        Verb::Runqueue | Verb::Queuelist | Verb::Queuestatus => {
            (ReturnCode::Okay, "the soon-queue scheduler is not implemented; the full-scan scheduler runs on its own timer".to_string())
        }
    }
}

/// Signs one zone outside the phase engine (`rollcmd_signzone[s]`),
/// acquiring the rollrec lock for the whole load/sign/save sequence.
async fn sign_one(center: &Center, zone: &str) -> (ReturnCode, String) {
    let (_lock, mut rollrec) = match center.acquire_rollrec() {
        Ok(v) => v,
        Err(e) => return (ReturnCode::RrfOpen, format!("could not read rollrec: {e}")),
    };
    let Some(mut entry) = rollrec.entry_mut(zone) else {
        return (ReturnCode::BadZone, format!("no such zone {zone}"));
    };
    let directory = entry.directory(&center.config.directory);
    let Some(keyrec_path) = entry.keyrec_path(&center.config.directory) else {
        return (ReturnCode::BadZoneData, format!("{zone} has no keyrec path"));
    };
    let mut keyrec = match KeyRec::load(&keyrec_path) {
        Ok(k) => k,
        Err(e) => return (ReturnCode::BadZoneData, format!("could not load keyrec for {zone}: {e}")),
    };

    let ok = phase::sign_zone(center, &center.config, zone, &entry, &mut keyrec, &directory).await;
    if let Err(e) = keyrec.save() {
        center.log(LogLevel::Err, zone, format_args!("{zone}: could not save keyrec: {e}"));
    }
    if let Err(e) = rollrec.save() {
        center.log(LogLevel::Err, zone, format_args!("{zone}: could not save rollrec: {e}"));
    }

    if ok {
        (ReturnCode::Okay, format!("zone {zone} signed"))
    } else {
        (ReturnCode::BadZoneData, format!("unable to sign zone {zone}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DaemonArgs};
    use crate::log::Logger;
    use clap::Parser;
    use rollerd_records::SystemClock;
    use std::sync::OnceLock;

    fn test_center(rrfile: &camino::Utf8Path, lockfile: &camino::Utf8Path) -> Arc<Center> {
        static LOGGER: OnceLock<&'static Logger> = OnceLock::new();
        let logger = *LOGGER.get_or_init(|| {
            Logger::launch(LogLevel::Never, crate::config::LogTz::Gmt, camino::Utf8Path::new("-")).unwrap()
        });

        let mut args = DaemonArgs::parse_from(["rollerd", "--rrfile", rrfile.as_str()]);
        args.lockfile = Some(lockfile.to_path_buf());
        let config = Config::resolve(&args).unwrap();
        Center::new(config, logger, Arc::new(SystemClock))
    }

    /// Spec §8 scenario 6 ("rollover refusal"): with `kskphase=3`, sending
    /// `rollcmd_rollzsk` for the same zone must answer with the
    /// ZSK-roll-in-progress code (12), not the KSK-roll-in-progress one
    /// (11) — even though a KSK rollover, not a ZSK one, is what's
    /// actually blocking it.
    #[tokio::test]
    async fn rollzsk_against_a_zone_mid_ksk_rollover_returns_zskroll() {
        let dir = tempfile::tempdir().unwrap();
        let rrfile = camino::Utf8PathBuf::from_path_buf(dir.path().join("test.rrf")).unwrap();
        let lockfile = camino::Utf8PathBuf::from_path_buf(dir.path().join("test.lock")).unwrap();
        std::fs::write(
            &rrfile,
            "roll\t\"example.com\"\n\tzonename\t\"example.com\"\n\tkskphase\t\"3\"\n\tzskphase\t\"0\"\n",
        )
        .unwrap();

        let center = test_center(&rrfile, &lockfile);
        let (code, _msg) = dispatch_single(&center, Verb::Rollzsk, "example.com").await;

        assert_eq!(code, ReturnCode::ZskRoll);
        assert_eq!(code.code(), 12);

        let (_lock, rollrec) = center.acquire_rollrec().unwrap();
        assert_eq!(rollrec.entry("example.com").unwrap().zskphase(), 0);
    }
}
