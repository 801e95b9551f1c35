//! Rollrec model (spec 4.C): a typed view over the tabbed-record store
//! (§4.A) for `roll`/`skip` sections, their phase state, and the derived
//! timers the phase engine and expiration evaluator need.

use std::io;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};

use crate::civil;
use crate::tabbed::{Section, TabbedStore};
use crate::zonefile;

pub(crate) fn is_rollrec_kind(kind: &str) -> bool {
    matches!(kind, "roll" | "skip")
}

/// Which state machine a record is currently mid-rollover in, per the
/// invariant that at most one of `kskphase`/`zskphase` is non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseType {
    Ksk,
    Zsk,
}

impl PhaseType {
    pub fn field(self) -> &'static str {
        match self {
            PhaseType::Ksk => "kskphase",
            PhaseType::Zsk => "zskphase",
        }
    }

    pub fn rollsecs_field(self) -> &'static str {
        match self {
            PhaseType::Ksk => "ksk_rollsecs",
            PhaseType::Zsk => "zsk_rollsecs",
        }
    }

    pub fn rolldate_field(self) -> &'static str {
        match self {
            PhaseType::Ksk => "ksk_rolldate",
            PhaseType::Zsk => "zsk_rolldate",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PhaseType::Ksk => "KSK",
            PhaseType::Zsk => "ZSK",
        }
    }
}

/// A loaded rollrec file, owning the tabbed-record store behind it.
pub struct RollRec {
    pub store: TabbedStore,
    path: Utf8PathBuf,
}

impl RollRec {
    pub fn load(path: &Utf8Path) -> io::Result<Self> {
        let store = TabbedStore::read_file(path, is_rollrec_kind)?;
        Ok(Self {
            store,
            path: path.to_owned(),
        })
    }

    pub fn new_empty(path: &Utf8Path) -> Self {
        Self {
            store: TabbedStore::default(),
            path: path.to_owned(),
        }
    }

    pub fn save(&self) -> io::Result<()> {
        self.store.write_file(&self.path)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn names(&self) -> Vec<String> {
        self.store.sections.iter().map(|s| s.name.clone()).collect()
    }

    /// Names of every `roll` (as opposed to `skip`) record, in file order.
    pub fn active_names(&self) -> Vec<String> {
        self.store
            .sections
            .iter()
            .filter(|s| s.kind == "roll")
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<RollEntryRef<'_>> {
        self.store
            .sections
            .iter()
            .find(|s| s.name == name)
            .map(|section| RollEntryRef { section })
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<RollEntry<'_>> {
        self.store
            .sections
            .iter_mut()
            .find(|s| s.name == name)
            .map(|section| RollEntry { section })
    }
}

fn field_u8(section: &Section, key: &str) -> u8 {
    section.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn field_u32(section: &Section, key: &str) -> u32 {
    section.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Parses a `holddowntime` field, formatted `NNND` meaning N days.
/// Returns `None` if the field is absent or malformed.
fn parse_holddown(s: &str) -> Option<i64> {
    let s = s.trim();
    let digits = s.strip_suffix(['D', 'd'])?;
    let days: i64 = digits.parse().ok()?;
    Some(days * 86_400)
}

/// Default hold-down for a trust anchor when `holddowntime` is absent: 60
/// days (spec.md §4.C).
const DEFAULT_HOLDDOWN_SECS: i64 = 60 * 86_400;

/// Read-only accessors shared between [`RollEntryRef`] and [`RollEntry`].
macro_rules! common_accessors {
    () => {
        pub fn name(&self) -> &str {
            &self.section.name
        }

        pub fn is_active(&self) -> bool {
            self.section.kind == "roll"
        }

        pub fn zonename(&self) -> &str {
            self.section.get("zonename").unwrap_or(&self.section.name)
        }

        pub fn directory(&self, default_dir: &Utf8Path) -> Utf8PathBuf {
            match self.section.get("directory") {
                Some(d) => Utf8PathBuf::from(d),
                None => default_dir.to_owned(),
            }
        }

        fn resolve(&self, raw: &str, default_dir: &Utf8Path) -> Utf8PathBuf {
            let p = Utf8Path::new(raw);
            if p.is_absolute() {
                p.to_owned()
            } else {
                self.directory(default_dir).join(p)
            }
        }

        pub fn zonefile(&self, default_dir: &Utf8Path) -> Option<Utf8PathBuf> {
            self.section
                .get("zonefile")
                .map(|p| self.resolve(p, default_dir))
        }

        pub fn keyrec_path(&self, default_dir: &Utf8Path) -> Option<Utf8PathBuf> {
            self.section
                .get("keyrec")
                .map(|p| self.resolve(p, default_dir))
        }

        pub fn kskphase(&self) -> u8 {
            field_u8(self.section, "kskphase")
        }

        pub fn zskphase(&self) -> u8 {
            field_u8(self.section, "zskphase")
        }

        /// `phasetype`: `Ksk` if `kskphase != 0`, else `Zsk` if
        /// `zskphase != 0`, else `None`.
        pub fn phase_type(&self) -> Option<PhaseType> {
            if self.kskphase() != 0 {
                Some(PhaseType::Ksk)
            } else if self.zskphase() != 0 {
                Some(PhaseType::Zsk)
            } else {
                None
            }
        }

        pub fn phase(&self, which: PhaseType) -> u8 {
            match which {
                PhaseType::Ksk => self.kskphase(),
                PhaseType::Zsk => self.zskphase(),
            }
        }

        pub fn phasestart_unix(&self) -> io::Result<Option<i64>> {
            let raw = self.section.get("phasestart").unwrap_or(civil::UNSET);
            civil::parse(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        }

        /// The cached `maxttl` field, without re-reading the zone file.
        pub fn cached_maxttl(&self) -> Option<u32> {
            self.section.get("maxttl").and_then(|v| v.parse().ok())
        }

        pub fn is_trust_anchor(&self) -> bool {
            matches!(self.section.get("istrustanchor"), Some("yes") | Some("1"))
        }

        /// `holddowntime` parsed as `NNND` ⇒ N×86400s; default 60 days.
        pub fn holddown_secs(&self) -> i64 {
            self.section
                .get("holddowntime")
                .and_then(parse_holddown)
                .unwrap_or(DEFAULT_HOLDDOWN_SECS)
        }

        /// `phase-specific duration` from the §4.G table, given a cached
        /// `maxttl`. KSK phase 3 adds the hold-down when the zone is a
        /// trust anchor (this implements the *intended* semantics of the
        /// hold-down arithmetic; see DESIGN.md for the source-bug note).
        pub fn phase_duration(&self, which: PhaseType, phase: u8, maxttl: u32) -> i64 {
            match (which, phase) {
                (PhaseType::Zsk, 1) => maxttl as i64,
                (PhaseType::Zsk, 2) => 0,
                (PhaseType::Zsk, 3) => maxttl as i64,
                (PhaseType::Zsk, 4) => 0,
                (PhaseType::Ksk, 1) => maxttl as i64,
                (PhaseType::Ksk, 2) => 0,
                (PhaseType::Ksk, 3) => {
                    maxttl as i64
                        + if self.is_trust_anchor() {
                            self.holddown_secs()
                        } else {
                            0
                        }
                }
                (PhaseType::Ksk, 4..=7) => 0,
                _ => 0,
            }
        }

        pub fn phaseend_unix(
            &self,
            which: PhaseType,
            phase: u8,
            maxttl: u32,
        ) -> io::Result<Option<i64>> {
            Ok(self
                .phasestart_unix()?
                .map(|start| start + self.phase_duration(which, phase, maxttl)))
        }

        /// `ttlleft`: remaining seconds to `phaseendDate`, clamped at ≥0.
        pub fn ttl_left(&self, now: i64, which: PhaseType, phase: u8, maxttl: u32) -> io::Result<i64> {
            Ok(self
                .phaseend_unix(which, phase, maxttl)?
                .map(|end| (end - now).max(0))
                .unwrap_or(0))
        }

        /// `holddownleft`: time from `phasestart` until
        /// `phasestart + holddowntime`, clamped at ≥0.
        pub fn holddown_left(&self, now: i64) -> io::Result<i64> {
            Ok(self
                .phasestart_unix()?
                .map(|start| (start + self.holddown_secs() - now).max(0))
                .unwrap_or(0))
        }

        pub fn cur_errors(&self) -> u32 {
            field_u32(self.section, "curerrors")
        }

        pub fn max_errors(&self) -> u32 {
            field_u32(self.section, "maxerrors")
        }

        /// The `{which}_rollsecs` field, the expiration evaluator's
        /// RM_ENDROLL "starter" timestamp; 0 if never set.
        pub fn rollsecs(&self, which: PhaseType) -> i64 {
            self.section
                .get(which.rollsecs_field())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        }

        /// `zsargs`: per-zone extra signer arguments (spec 4.I).
        pub fn zsargs(&self) -> &str {
            self.section.get("zsargs").unwrap_or("")
        }

        /// `rndc_opts`: per-zone override of the global `rndcopts`.
        pub fn rndc_opts(&self) -> Option<&str> {
            self.section.get("rndc_opts")
        }

        /// `loglevel`: per-record log-level override (spec 4.C).
        pub fn loglevel(&self) -> Option<&str> {
            self.section.get("loglevel")
        }
    };
}

/// An immutable view over one rollrec section.
pub struct RollEntryRef<'a> {
    section: &'a Section,
}

impl<'a> RollEntryRef<'a> {
    common_accessors!();
}

/// A mutable view over one rollrec section, used by the scan loop and
/// phase engine to advance a zone's state.
pub struct RollEntry<'a> {
    section: &'a mut Section,
}

impl<'a> RollEntry<'a> {
    common_accessors!();

    pub fn set_active(&mut self, active: bool) {
        self.section.kind = if active { "roll" } else { "skip" }.to_string();
    }

    pub fn set_phase(&mut self, which: PhaseType, phase: u8) {
        self.section.set(which.field(), phase.to_string());
    }

    /// `rollcmd_zsargs`: overrides this record's per-zone `zsargs`.
    pub fn set_zsargs(&mut self, value: &str) {
        self.section.set("zsargs", value);
    }

    /// `maxttl()`: parse the zone's unsigned zone file, take the max TTL
    /// across all rdatasets, double it, cache, and return it.
    pub fn recompute_maxttl(&mut self, default_dir: &Utf8Path) -> io::Result<u32> {
        let path = self.zonefile(default_dir).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "rollrec entry has no zonefile")
        })?;
        let doubled = zonefile::max_ttl(&path)?.saturating_mul(2);
        self.section.set("maxttl", doubled.to_string());
        Ok(doubled)
    }

    /// `settime()`: set `phasestart` to `now` in the canonical format.
    pub fn settime(&mut self, now: i64) {
        self.section.set("phasestart", civil::format(now));
    }

    /// `rollstamp(which)`: set `{which}_rolldate`/`{which}_rollsecs` to
    /// `now`.
    pub fn rollstamp(&mut self, which: PhaseType, now: i64) {
        self.section.set(which.rollsecs_field(), now.to_string());
        self.section.set(which.rolldate_field(), civil::format(now));
    }

    /// `zoneerr()`: increment `curerrors`; past `maxerrors` (when set),
    /// mark the record inactive.
    pub fn zone_err(&mut self) {
        let next = self.cur_errors() + 1;
        self.section.set("curerrors", next.to_string());
        let max = self.max_errors();
        if max > 0 && next > max {
            self.set_active(false);
        }
    }

    /// `clearzoneerr()`: reset `curerrors` to 0.
    pub fn clear_zone_err(&mut self) {
        self.section.set("curerrors", "0");
    }

    /// `loadzone(rndc, opts)`: run `<rndc> <opts> reload <zonename>`.
    pub fn loadzone(&self, rndc: &str, opts: &str) -> io::Result<bool> {
        let mut cmd = Command::new(rndc);
        if !opts.is_empty() {
            cmd.args(opts.split_whitespace());
        }
        cmd.arg("reload").arg(self.zonename());
        Ok(cmd.status()?.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabbed::Section;

    fn entry(fields: &[(&str, &str)]) -> Section {
        let mut section = Section::new("roll", "example.com");
        for (k, v) in fields {
            section.set(k, *v);
        }
        section
    }

    #[test]
    fn phase_type_prefers_ksk() {
        let section = entry(&[("kskphase", "3"), ("zskphase", "0")]);
        let view = RollEntryRef { section: &section };
        assert_eq!(view.phase_type(), Some(PhaseType::Ksk));
    }

    #[test]
    fn phase_type_none_when_both_zero() {
        let section = entry(&[("kskphase", "0"), ("zskphase", "0")]);
        let view = RollEntryRef { section: &section };
        assert_eq!(view.phase_type(), None);
    }

    #[test]
    fn holddown_defaults_to_sixty_days() {
        let section = entry(&[]);
        let view = RollEntryRef { section: &section };
        assert_eq!(view.holddown_secs(), 60 * 86_400);
    }

    #[test]
    fn holddown_parses_nnnd() {
        let section = entry(&[("holddowntime", "10D")]);
        let view = RollEntryRef { section: &section };
        assert_eq!(view.holddown_secs(), 10 * 86_400);
    }

    #[test]
    fn ksk_phase3_duration_adds_holddown_for_trust_anchors() {
        let mut section = entry(&[("istrustanchor", "yes"), ("holddowntime", "1D")]);
        let view = RollEntryRef { section: &section };
        assert_eq!(view.phase_duration(PhaseType::Ksk, 3, 100), 100 + 86_400);
        section.set("istrustanchor", "no");
        let view = RollEntryRef { section: &section };
        assert_eq!(view.phase_duration(PhaseType::Ksk, 3, 100), 100);
    }

    #[test]
    fn zone_err_marks_inactive_past_maxerrors() {
        let mut section = entry(&[("maxerrors", "2"), ("curerrors", "2")]);
        let mut view = RollEntry { section: &mut section };
        view.zone_err();
        assert!(!view.is_active());
        assert_eq!(view.cur_errors(), 3);
    }
}
