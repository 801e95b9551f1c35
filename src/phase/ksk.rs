//! KSK state machine (spec 4.G, phases 0..7).
//!
//! Each function implements one phase's default action and returns the
//! phase to transition to next; `0` means "stay put" only for phase 0
//! itself (every other phase always advances — the wait phases simply
//! don't advance until their duration check passes, expressed here as
//! returning the *same* phase until [`RollEntry::ttl_left`]/
//! `holddown_left` both reach zero).

use camino::Utf8Path;
use rollerd_records::{KeyRec, PhaseType, RollEntry, SetRef};

use crate::center::Center;
use crate::config::{Config, LogLevel};
use crate::dspub;
use crate::signer::{self, SignerRequest};

/// The outcome of running one phase's action: the phase to persist next,
/// plus whether a signer run occurred this tick (for `-alwayssign`
/// bookkeeping, spec 4.G).
pub struct StepOutcome {
    pub next_phase: u8,
    pub signed: bool,
}

impl StepOutcome {
    fn stay(phase: u8) -> Self {
        Self { next_phase: phase, signed: false }
    }

    fn advance(phase: u8) -> Self {
        Self { next_phase: phase, signed: false }
    }

    fn advance_signed(phase: u8) -> Self {
        Self { next_phase: phase, signed: true }
    }
}

/// Runs the action for the zone's current KSK phase. `maxttl` is the
/// cached, already-doubled TTL (spec 4.C). Returns the new phase to
/// persist; the caller (phase/mod.rs) is responsible for calling
/// `nextphase` bookkeeping (log line, `settime`, `rollstamp`) when
/// `next_phase != current`.
#[allow(clippy::too_many_arguments)]
pub async fn step(
    center: &Center,
    config: &Config,
    zonename: &str,
    entry: &mut RollEntry<'_>,
    keyrec: &mut KeyRec,
    directory: &Utf8Path,
    maxttl: u32,
    now: i64,
) -> StepOutcome {
    let phase = entry.kskphase();
    match phase {
        1 => {
            let ttl_left = entry.ttl_left(now, PhaseType::Ksk, 1, maxttl).unwrap_or(0);
            if ttl_left > 0 {
                return StepOutcome::stay(1);
            }
            if entry.is_trust_anchor() {
                let holddown_left = entry.holddown_left(now).unwrap_or(0);
                if holddown_left > 0 {
                    return StepOutcome::stay(1);
                }
            }
            StepOutcome::advance(2)
        }
        2 => {
            let req = signer_request(entry, keyrec, zonename, directory, config);
            match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "KSK phase 2", &req).await
            {
                Ok(()) => {
                    reload(center, config, entry, zonename).await;
                    StepOutcome::advance_signed(3)
                }
                Err(e) => {
                    center.log(LogLevel::Err, zonename, format_args!("{zonename}: KSK phase 2 signer failed: {e}"));
                    entry.zone_err();
                    StepOutcome::stay(2)
                }
            }
        }
        3 => {
            let ttl_left = entry.ttl_left(now, PhaseType::Ksk, 3, maxttl).unwrap_or(0);
            if ttl_left > 0 {
                return StepOutcome::stay(3);
            }
            StepOutcome::advance(4)
        }
        4 => {
            let local_keytags = local_keytags(keyrec, zonename);
            if config.roll_auto {
                match dspub::publish(
                    &config.roll_provider,
                    config.roll_provider_key.as_deref(),
                    zonename,
                    &local_keytags,
                    &dspub::RealPause,
                ) {
                    Ok(true) => {
                        center.log(LogLevel::Info, zonename, format_args!("{zonename}: transfer new keyset to the parent"));
                    }
                    Ok(false) | Err(_) => {
                        center.log(LogLevel::Err, zonename, format_args!("{zonename}: DS publication failed"));
                        return StepOutcome::stay(4);
                    }
                }
            } else if config.admin_email.is_some() {
                center.log(
                    LogLevel::Info,
                    zonename,
                    format_args!("{zonename}: notify {} to transfer the new keyset to the parent", config.admin_email.as_deref().unwrap_or("")),
                );
            } else {
                center.log(LogLevel::Info, zonename, format_args!("{zonename}: transfer new keyset to the parent"));
            }
            StepOutcome::advance(5)
        }
        5 => {
            if config.roll_auto {
                StepOutcome::advance(6)
            } else {
                // Waits on the operator's `rollcmd_dspub` control command,
                // which advances the phase directly; the scan loop leaves
                // phase 5 alone otherwise.
                StepOutcome::stay(5)
            }
        }
        6 => {
            let ttl_left = entry.ttl_left(now, PhaseType::Ksk, 6, maxttl).unwrap_or(0);
            if ttl_left > 0 {
                return StepOutcome::stay(6);
            }
            StepOutcome::advance(7)
        }
        7 => {
            let req = signer_request(entry, keyrec, zonename, directory, config);
            match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "KSK phase 7", &req).await
            {
                Ok(()) => {
                    reload(center, config, entry, zonename).await;
                    let _ = signer::archive(&config.keyarch, config.dtconfig.as_deref(), zonename, keyrec.path()).await;
                    entry.rollstamp(PhaseType::Ksk, now);
                    entry.clear_zone_err();
                    StepOutcome::advance_signed(0)
                }
                Err(e) => {
                    center.log(LogLevel::Err, zonename, format_args!("{zonename}: KSK phase 7 signer failed: {e}"));
                    entry.zone_err();
                    StepOutcome::stay(7)
                }
            }
        }
        _ => StepOutcome::stay(phase),
    }
}

fn signer_request<'a>(
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

fn local_keytags(keyrec: &KeyRec, zonename: &str) -> Vec<u32> {
    let Some(zone) = keyrec.zone(zonename) else {
        return Vec::new();
    };
    [SetRef::ZskCur, SetRef::ZskPub, SetRef::KskCur, SetRef::KskPub]
        .into_iter()
        .filter_map(|r| zone.set_ref(r))
        .flat_map(|set| set.keys())
        .filter_map(|k| k.keytag())
        .collect()
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
