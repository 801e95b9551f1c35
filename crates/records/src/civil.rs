//! Parsing and formatting of the rollrec/keyrec date fields.
//!
//! The tabbed-record format fixes its timestamps to `%a %b %d %H:%M:%S %Y`
//! (e.g. `Mon Jan 02 15:04:05 2006`), always in UTC, with the literal string
//! `"new"` standing in for "not yet set". This is a narrow wrapper around
//! `jiff`'s `strftime`/`strptime`, the same time library the daemon's log
//! subsystem (`rollerd::log`) already uses for its own gmt/local timestamp
//! formatting, rather than a hand-rolled calendar conversion.

use std::fmt;

/// The fixed `asctime`-style format every rollrec/keyrec date field uses.
const FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// The sentinel written for a date field that has never been set.
pub const UNSET: &str = "new";

/// Formats Unix seconds in the canonical rollrec date format, always UTC.
pub fn format(secs: i64) -> String {
    let zoned = jiff::Timestamp::from_second(secs)
        .unwrap_or(jiff::Timestamp::UNIX_EPOCH)
        .to_zoned(jiff::tz::TimeZone::UTC);
    zoned.strftime(FORMAT).to_string()
}

/// Parses a rollrec date field. Returns `None` for the `"new"` sentinel.
pub fn parse(s: &str) -> Result<Option<i64>, ParseError> {
    let s = s.trim();
    if s.is_empty() || s == UNSET {
        return Ok(None);
    }

    let datetime = jiff::civil::DateTime::strptime(FORMAT, s).map_err(|_| ParseError)?;
    let zoned = datetime
        .to_zoned(jiff::tz::TimeZone::UTC)
        .map_err(|_| ParseError)?;
    Ok(Some(zoned.timestamp().as_second()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed rollrec date field")
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_epoch() {
        let s = format(0);
        assert_eq!(s, "Thu Jan 01 00:00:00 1970");
        assert_eq!(parse(&s).unwrap(), Some(0));
    }

    #[test]
    fn roundtrip_arbitrary() {
        for secs in [1i64, 86_399, 86_400, 1_700_000_000, 1_000_000_000] {
            let s = format(secs);
            assert_eq!(parse(&s).unwrap(), Some(secs), "mismatch for {s}");
        }
    }

    #[test]
    fn unset_sentinel() {
        assert_eq!(parse("new").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not a date").is_err());
    }
}
