//! Per-zone driver (spec 4.F/4.G): ties the expiration evaluator and the
//! two phase state machines together for one rollrec entry, performs the
//! `nextphase` bookkeeping the spec assigns to the phase engine itself
//! (log line, persist the new phase, refresh `phasestart`), and runs the
//! `-autosign`/`-alwayssign` fallbacks that sit outside the state
//! machines proper.

pub mod expire;
pub mod ksk;
pub mod zsk;

use camino::Utf8Path;
use rollerd_records::{KeyRec, PhaseType, RollEntry, SetRef};

use crate::center::Center;
use crate::config::Config;
use crate::config::LogLevel;
use crate::signer::{self, SignerRequest};

/// Advances `entry` by one scan tick: resolves `maxttl`, dispatches
/// through 4.F (if neither class is mid-rollover) or 4.G (if one is),
/// and runs the `-alwayssign` fallback if nothing signed the zone this
/// tick. `keyrec` is `None` when the keyrec file failed to load; signing
/// work is then impossible and folds into a zone error.
pub async fn advance_zone(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &mut RollEntry<'_>,
    mut keyrec: Option<&mut KeyRec>,
    directory: &Utf8Path,
) {
    let now = center.clock.now_unix();

    let maxttl = match entry.cached_maxttl() {
        Some(t) => t,
        None => match entry.recompute_maxttl(directory) {
            Ok(t) => t,
            Err(e) => {
                center.log(
                    LogLevel::Err,
                    zonename,
                    format_args!("{zonename}: cannot determine maxttl: {e}"),
                );
                entry.zone_err();
                return;
            }
        },
    };

    let mut signed_this_tick = false;

    if entry.kskphase() != 0 {
        let Some(keyrec) = keyrec.as_deref_mut() else {
            center.log(
                LogLevel::Err,
                zonename,
                format_args!("{zonename}: mid KSK rollover but no keyrec is loaded"),
            );
            entry.zone_err();
            return;
        };
        let outcome = ksk::step(center, config, zonename, entry, keyrec, directory, maxttl, now).await;
        apply_outcome(center, entry, zonename, PhaseType::Ksk, outcome.next_phase, now);
        signed_this_tick = outcome.signed;
    } else if entry.zskphase() != 0 {
        let Some(keyrec) = keyrec.as_deref_mut() else {
            center.log(
                LogLevel::Err,
                zonename,
                format_args!("{zonename}: mid ZSK rollover but no keyrec is loaded"),
            );
            entry.zone_err();
            return;
        };
        let outcome = zsk::step(center, config, zonename, entry, keyrec, directory, maxttl, now).await;
        apply_outcome(center, entry, zonename, PhaseType::Zsk, outcome.next_phase, now);
        signed_this_tick = outcome.signed;
    } else {
        let ksk_expiry = expire::evaluate(
            center,
            zonename,
            entry,
            keyrec.as_deref(),
            PhaseType::Ksk,
            entry.zskphase(),
            config.rollover_method,
            now,
        );
        if ksk_expiry == expire::Expiry::Expired {
            start_rollover(center, entry, zonename, PhaseType::Ksk, now);
        } else {
            let zsk_expiry = expire::evaluate(
                center,
                zonename,
                entry,
                keyrec.as_deref(),
                PhaseType::Zsk,
                entry.kskphase(),
                config.rollover_method,
                now,
            );
            if zsk_expiry == expire::Expiry::Expired {
                start_rollover(center, entry, zonename, PhaseType::Zsk, now);
            } else if config.autosign {
                signed_this_tick = autosign_if_stale(center, config, zonename, entry, keyrec.as_deref_mut(), directory).await;
            }
        }
    }

    if config.alwayssign && !signed_this_tick {
        alwayssign(center, config, zonename, entry, keyrec, directory).await;
    }
}

/// Phase 0 → 1: stamp `phasestart` and persist the new phase (spec 4.G's
/// "On expiry, stamp phasestart, go to 1" row). `pub(crate)` so the
/// control channel (`rollcmd_rollksk`/`rollzsk`/`rollallksks`/
/// `rollallzsks`) can force the same transition outside a scan tick.
pub(crate) fn start_rollover(center: &Center, entry: &mut RollEntry<'_>, zonename: &str, which: PhaseType, now: i64) {
    center.log(
        LogLevel::Phase,
        zonename,
        format_args!("{zonename}: {} phase 1", which.label()),
    );
    entry.set_phase(which, 1);
    entry.settime(now);
}

/// `nextphase(name, rrr, newPhase, class)` (spec 4.G): persists a phase
/// transition only when the phase actually changed, logging at `PHASE`
/// level and refreshing `phasestart`.
fn apply_outcome(
    center: &Center,
    entry: &mut RollEntry<'_>,
    zonename: &str,
    which: PhaseType,
    next_phase: u8,
    now: i64,
) {
    let current = entry.phase(which);
    if next_phase != current {
        center.log(
            LogLevel::Phase,
            zonename,
            format_args!("{zonename}: {} phase {next_phase}", which.label()),
        );
        entry.set_phase(which, next_phase);
        entry.settime(now);
    }
}

/// Spec 4.F step 8: outside any rollover, if the unsigned zone file is
/// newer than the signed one, re-sign without starting a rollover.
/// Returns whether a sign actually ran.
async fn autosign_if_stale(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &RollEntry<'_>,
    keyrec: Option<&mut KeyRec>,
    directory: &Utf8Path,
) -> bool {
    let Some(keyrec) = keyrec else {
        return false;
    };
    let Some(zone) = keyrec.zone(zonename) else {
        return false;
    };
    let (Some(zonefile), Some(zonesigned)) = (zone.zonefile(), zone.signedzone()) else {
        return false;
    };
    let stale = match (std::fs::metadata(&zonefile), std::fs::metadata(&zonesigned)) {
        (Ok(unsigned_meta), Ok(signed_meta)) => {
            match (unsigned_meta.modified(), signed_meta.modified()) {
                (Ok(u), Ok(s)) => u > s,
                _ => false,
            }
        }
        (Ok(_), Err(_)) => true,
        _ => false,
    };
    if !stale {
        return false;
    }

    let req = request(entry, keyrec, zonename, directory, config);
    match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "", &req).await {
        Ok(()) => {
            center.log(LogLevel::Info, zonename, format_args!("{zonename}: unsigned zone file changed; re-signed"));
            reload(center, config, entry, zonename).await;
            true
        }
        Err(e) => {
            center.log(LogLevel::Err, zonename, format_args!("{zonename}: autosign failed: {e}"));
            false
        }
    }
}

/// Spec 4.G's last paragraph: if nothing signed the zone this tick and
/// `-alwayssign` is set, sign once more with an extra-arg string derived
/// from the zone's current phase.
async fn alwayssign(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &RollEntry<'_>,
    keyrec: Option<&mut KeyRec>,
    directory: &Utf8Path,
) {
    let Some(keyrec) = keyrec else {
        return;
    };
    let tag = match entry.phase_type() {
        Some(PhaseType::Ksk) => format!("KSK phase {}", entry.kskphase()),
        Some(PhaseType::Zsk) => format!("ZSK phase {}", entry.zskphase()),
        None => String::new(),
    };

    let req = request(entry, keyrec, zonename, directory, config);
    match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), &tag, &req).await {
        Ok(()) => reload(center, config, entry, zonename).await,
        Err(e) => {
            center.log(LogLevel::Err, zonename, format_args!("{zonename}: alwayssign signer failed: {e}"));
        }
    }
}

/// Scenario 1 ("Initial signing", spec §8): runs when a zone's keyrec
/// file does not yet exist. Invokes the signer tagged `"initial"`
/// (`-genkeys`), reloads the zone, and — when auto-DS is configured —
/// publishes the freshly generated keyset to the parent once, logging
/// `"transfer new keyset to the parent"`. Both `kskphase`/`zskphase`
/// stay at 0; both `_rollsecs` fields are stamped so the next scan's
/// expiration evaluator has an RM_ENDROLL starting point.
pub(crate) async fn initial_sign(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &mut RollEntry<'_>,
    directory: &Utf8Path,
    keyrec_path: &Utf8Path,
    now: i64,
) {
    let req = SignerRequest {
        zonename,
        zonefile: entry.zonefile(directory),
        zonesigned: None,
        keyrec_path,
        directory,
        global_zsargs: &config.zsargs,
        per_zone_zsargs: entry.zsargs(),
        signonly: false,
    };

    match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "initial", &req).await {
        Ok(()) => {
            reload(center, config, entry, zonename).await;
            entry.rollstamp(PhaseType::Ksk, now);
            entry.rollstamp(PhaseType::Zsk, now);

            if config.roll_auto {
                let local_keytags = match KeyRec::load(keyrec_path) {
                    Ok(keyrec) => keyrec
                        .zone(zonename)
                        .map(|zone| {
                            [
                                SetRef::ZskCur,
                                SetRef::ZskPub,
                                SetRef::KskCur,
                                SetRef::KskPub,
                            ]
                            .into_iter()
                            .filter_map(|r| zone.set_ref(r))
                            .flat_map(|set| set.keys())
                            .filter_map(|k| k.keytag())
                            .collect::<Vec<_>>()
                        })
                        .unwrap_or_default(),
                    Err(_) => Vec::new(),
                };
                match crate::dspub::publish(
                    &config.roll_provider,
                    config.roll_provider_key.as_deref(),
                    zonename,
                    &local_keytags,
                    &crate::dspub::RealPause,
                ) {
                    Ok(true) => center.log(
                        LogLevel::Info,
                        zonename,
                        format_args!("{zonename}: transfer new keyset to the parent"),
                    ),
                    Ok(false) | Err(_) => center.log(
                        LogLevel::Err,
                        zonename,
                        format_args!("{zonename}: initial DS publication failed"),
                    ),
                }
            }
        }
        Err(e) => {
            center.log(LogLevel::Err, zonename, format_args!("{zonename}: initial signing failed: {e}"));
            entry.zone_err();
        }
    }
}

/// `rollcmd_signzone`/`rollcmd_signzones` (spec §6): signs `zonename`
/// without touching its rollover phase. Returns whether the signer
/// succeeded.
pub(crate) async fn sign_zone(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &RollEntry<'_>,
    keyrec: &mut KeyRec,
    directory: &Utf8Path,
) -> bool {
    let req = request(entry, keyrec, zonename, directory, config);
    match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "", &req).await {
        Ok(()) => {
            reload(center, config, entry, zonename).await;
            true
        }
        Err(e) => {
            center.log(LogLevel::Err, zonename, format_args!("{zonename}: signzone failed: {e}"));
            false
        }
    }
}

fn request<'a>(
    entry: &'a RollEntry<'_>,
    keyrec: &'a KeyRec,
    zonename: &'a str,
    directory: &'a Utf8Path,
    config: &'a Config,
) -> SignerRequest<'a> {
    let zone = keyrec.zone(zonename);
    SignerRequest {
        zonename,
        zonefile: zone.as_ref().and_then(|z| z.zonefile()),
        zonesigned: zone.as_ref().and_then(|z| z.signedzone()),
        keyrec_path: keyrec.path(),
        directory,
        global_zsargs: &config.zsargs,
        per_zone_zsargs: entry.zsargs(),
        signonly: false,
    }
}

async fn reload(center: &Center, config: &Config, entry: &RollEntry<'_>, zonename: &str) {
    if config.noreload {
        return;
    }
    let opts = entry.rndc_opts().unwrap_or(&config.rndc_opts);
    if let Err(e) = signer::reload(&config.rndc, opts, zonename).await {
        center.log(LogLevel::Err, zonename, format_args!("{zonename}: reload failed: {e}"));
    }
}
