//! The scan loop's zone-selection boundary (spec 4.H).
//!
//! Only the default "full list" scheduler ships: every active rollrec
//! entry, in file order, every tick. The "soon queue" variant referenced
//! in the original source is non-normative (spec.md §9); this trait
//! exists so a second scheduler could be added later without touching
//! the scan loop or the phase engine, but no second implementation is
//! provided.

use crate::rollrec::RollRec;

pub trait Scheduler {
    /// Returns the zone names that should be considered on this tick, in
    /// the order they should be processed.
    fn select<'a>(&mut self, rollrec: &'a RollRec) -> Vec<String>;
}

/// The only shipped scheduler: every active (`roll`) record, in file
/// order, every tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullScanScheduler;

impl Scheduler for FullScanScheduler {
    fn select<'a>(&mut self, rollrec: &'a RollRec) -> Vec<String> {
        rollrec.active_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn full_scan_selects_only_active_records() {
        let mut rollrec = RollRec::new_empty(Utf8Path::new("/tmp/test.rrf"));
        rollrec.store.sections.push(crate::tabbed::Section::new("roll", "a.example"));
        rollrec.store.sections.push(crate::tabbed::Section::new("skip", "b.example"));

        let mut scheduler = FullScanScheduler;
        assert_eq!(scheduler.select(&rollrec), vec!["a.example".to_string()]);
    }
}
