//! ZSK state machine (spec 4.G, phases 0..4).

use camino::Utf8Path;
use rollerd_records::{KeyRec, PhaseType, RollEntry};

use crate::center::Center;
use crate::config::{Config, LogLevel};
use crate::phase::ksk::StepOutcome;
use crate::signer::{self, SignerRequest};

/// Runs the action for the zone's current ZSK phase, mirroring
/// `ksk::step`'s shape. Phase 4 ("swap ZSKs and sign with new Current")
/// is two signer calls per spec.md §4.G: `-rollzsk` (tag `"ZSK phase
/// 4a"`) then a plain sign (tag `"ZSK phase 4b"`, no flag).
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
    let phase = entry.zskphase();
    match phase {
        1 => {
            let ttl_left = entry.ttl_left(now, PhaseType::Zsk, 1, maxttl).unwrap_or(0);
            if ttl_left > 0 {
                return StepOutcome::stay(1);
            }
            StepOutcome::advance(2)
        }
        2 => {
            let req = signer_request(entry, keyrec, zonename, directory, config);
            match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "ZSK phase 2", &req).await
            {
                Ok(()) => {
                    reload(center, config, entry, zonename).await;
                    StepOutcome::advance_signed(3)
                }
                Err(e) => {
                    center.log(LogLevel::Err, zonename, format_args!("{zonename}: ZSK phase 2 signer failed: {e}"));
                    entry.zone_err();
                    StepOutcome::stay(2)
                }
            }
        }
        3 => {
            let ttl_left = entry.ttl_left(now, PhaseType::Zsk, 3, maxttl).unwrap_or(0);
            if ttl_left > 0 {
                return StepOutcome::stay(3);
            }
            StepOutcome::advance(4)
        }
        4 => {
            let req_a = signer_request(entry, keyrec, zonename, directory, config);
            if let Err(e) = signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "ZSK phase 4a", &req_a).await
            {
                center.log(LogLevel::Err, zonename, format_args!("{zonename}: ZSK phase 4a signer failed: {e}"));
                entry.zone_err();
                return StepOutcome::stay(4);
            }

            let req_b = signer_request(entry, keyrec, zonename, directory, config);
            match signer::run_signer(&config.zonesigner, config.dtconfig.as_deref(), "ZSK phase 4b", &req_b).await
            {
                Ok(()) => {
                    reload(center, config, entry, zonename).await;
                    entry.rollstamp(PhaseType::Zsk, now);
                    entry.clear_zone_err();
                    StepOutcome::advance_signed(0)
                }
                Err(e) => {
                    center.log(LogLevel::Err, zonename, format_args!("{zonename}: ZSK phase 4b signer failed: {e}"));
                    entry.zone_err();
                    StepOutcome::stay(4)
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

async fn reload(center: &Center, config: &Config, entry: &RollEntry<'_>, zonename: &str) {
    if config.noreload {
        return;
    }
    let opts = entry.rndc_opts().unwrap_or(&config.rndc_opts);
    if let Err(e) = signer::reload(&config.rndc, opts, zonename).await {
        center.log(LogLevel::Err, zonename, format_args!("{zonename}: reload failed: {e}"));
    }
}
