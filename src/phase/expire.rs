//! Expiration evaluator (spec 4.F): for one key class, decides whether
//! the current signing set has expired and should start a rollover.

use rollerd_records::{KeyRec, PhaseType, RollEntry, SetRef};

use crate::center::Center;
use crate::config::{LogLevel, RolloverMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    NotExpired,
    Expired,
}

impl Expiry {
    fn from_bool(b: bool) -> Self {
        if b { Expiry::Expired } else { Expiry::NotExpired }
    }
}

/// Implements spec.md §4.F's nine steps for `which`, given the other
/// class's current phase (step 1: "never interleave").
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    center: &Center,
    zonename: &str,
    entry: &mut RollEntry<'_>,
    keyrec: Option<&KeyRec>,
    which: PhaseType,
    other_phase: u8,
    method: RolloverMethod,
    now: i64,
) -> Expiry {
    // 1. the other class is mid-rollover: never interleave.
    if other_phase != 0 {
        return Expiry::NotExpired;
    }
    // 2. this class is already mid-rollover: stay in the machine.
    if entry.phase(which) != 0 {
        return Expiry::Expired;
    }

    let cur_ref = match which {
        PhaseType::Ksk => SetRef::KskCur,
        PhaseType::Zsk => SetRef::ZskCur,
    };

    // 3. resolve Xcur; missing/empty is a zone error, not expired.
    let Some(keyrec) = keyrec else {
        center.log(
            LogLevel::Err,
            zonename,
            format_args!("{zonename}: no keyrec loaded; cannot evaluate {} expiration", which.label()),
        );
        entry.zone_err();
        return Expiry::NotExpired;
    };
    let Some(zone) = keyrec.zone(zonename) else {
        center.log(
            LogLevel::Err,
            zonename,
            format_args!("{zonename}: keyrec has no zone section"),
        );
        entry.zone_err();
        return Expiry::NotExpired;
    };
    let Some(set) = zone.set_ref(cur_ref) else {
        center.log(
            LogLevel::Err,
            zonename,
            format_args!("{zonename}: no {} set in keyrec", cur_ref.field()),
        );
        entry.zone_err();
        return Expiry::NotExpired;
    };
    if set.is_empty() {
        center.log(
            LogLevel::Err,
            zonename,
            format_args!("{zonename}: {} set is empty", cur_ref.field()),
        );
        entry.zone_err();
        return Expiry::NotExpired;
    }

    // 4. minimum-life key.
    let Some(key) = set.min_life_key() else {
        entry.zone_err();
        return Expiry::NotExpired;
    };

    // 5. starter timestamp, per the configured rollover method.
    let starter = match method {
        RolloverMethod::EndRoll => {
            let rollsecs = entry.rollsecs(which);
            if rollsecs == 0 {
                entry.rollstamp(which, now);
                return Expiry::NotExpired;
            }
            rollsecs
        }
        RolloverMethod::KeyGen => key.gensecs(),
        RolloverMethod::StartRoll => {
            center.log(
                LogLevel::Err,
                zonename,
                format_args!("{zonename}: RM_STARTROLL is not implemented"),
            );
            return Expiry::NotExpired;
        }
    };

    // 6. freshly created record.
    if starter == 0 {
        entry.rollstamp(which, now);
        return Expiry::NotExpired;
    }

    // 7. compare to minlife.
    let rolltime = starter + key.life();
    let expired = now > rolltime;
    if expired {
        center.log(
            LogLevel::Info,
            zonename,
            format_args!("{zonename}: {} expired {}s ago", which.label(), now - rolltime),
        );
    } else {
        center.log(
            LogLevel::Expire,
            zonename,
            format_args!("{zonename}: {} expires in {}s", which.label(), rolltime - now),
        );
    }

    // 9.
    Expiry::from_bool(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonArgs;
    use crate::config::Config;
    use crate::log::Logger;
    use camino::Utf8Path;
    use clap::Parser;
    use rollerd_records::{tabbed::Section, KeyRec, RollRec, SystemClock};
    use std::sync::{Arc, OnceLock};

    fn test_center() -> Arc<Center> {
        static LOGGER: OnceLock<&'static Logger> = OnceLock::new();
        let logger = *LOGGER.get_or_init(|| {
            Logger::launch(LogLevel::Never, crate::config::LogTz::Gmt, Utf8Path::new("-")).unwrap()
        });

        let args = DaemonArgs::parse_from(["rollerd", "--rrfile", "/tmp/x.rrf"]);
        let config = Config::resolve(&args).unwrap();
        Center::new(config, logger, Arc::new(SystemClock))
    }

    fn keyrec_with_one_key(set_field: &str, keytag: &str, life: &str) -> KeyRec {
        let mut keyrec = KeyRec::new_empty(Utf8Path::new("/tmp/test.krf"));

        let mut zone = Section::new("zone", "example.com");
        zone.set(set_field, "set1");
        keyrec.store.sections.push(zone);

        let mut set = Section::new("set", "set1");
        set.set("zonename", "example.com");
        set.set("set_type", set_field);
        set.set("keys", keytag);
        keyrec.store.sections.push(set);

        let mut key = Section::new("key", keytag);
        let keytype = if set_field.starts_with("ksk") { "ksk" } else { "zsk" };
        key.set("keyrec_type", format!("{keytype}cur"));
        key.set(format!("{keytype}life"), life);
        keyrec.store.sections.push(key);

        keyrec
    }

    #[test]
    fn fresh_record_stamps_rollsecs_without_expiring() {
        let center = test_center();
        let mut rollrec = RollRec::new_empty(Utf8Path::new("/tmp/test.rrf"));
        rollrec.store.sections.push(Section::new("roll", "example.com"));
        let mut entry = rollrec.entry_mut("example.com").unwrap();

        let keyrec = keyrec_with_one_key("zskcur", "keyA", "100");
        let result = evaluate(
            &center,
            "example.com",
            &mut entry,
            Some(&keyrec),
            PhaseType::Zsk,
            0,
            RolloverMethod::EndRoll,
            1_000,
        );
        assert_eq!(result, Expiry::NotExpired);
        assert_eq!(entry.rollsecs(PhaseType::Zsk), 1_000);
    }

    #[test]
    fn other_class_mid_rollover_blocks_evaluation() {
        let center = test_center();
        let mut rollrec = RollRec::new_empty(Utf8Path::new("/tmp/test.rrf"));
        rollrec.store.sections.push(Section::new("roll", "example.com"));
        let mut entry = rollrec.entry_mut("example.com").unwrap();
        let keyrec = keyrec_with_one_key("zskcur", "keyA", "100");

        let result = evaluate(
            &center,
            "example.com",
            &mut entry,
            Some(&keyrec),
            PhaseType::Zsk,
            3,
            RolloverMethod::EndRoll,
            1_000,
        );
        assert_eq!(result, Expiry::NotExpired);
    }
}
