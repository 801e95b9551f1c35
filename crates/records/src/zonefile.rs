//! Narrow zonefile inspection needed by the rollrec/keyrec models: the
//! maximum TTL in an unsigned zone file (spec 4.C `maxttl`), and whether a
//! signed zone's DNSKEY RRset contains a given public key (spec 4.B
//! `isSigned`). Uses the `domain` crate's zonefile scanner the same way
//! the teacher's zone loader does (`Entry::Record` + `flatten_into`).

use std::io;

use camino::Utf8Path;
use domain::base::Rtype;
use domain::rdata::ZoneRecordData;
use domain::zonefile::inplace::{Entry, Zonefile};

fn scan(path: &Utf8Path) -> io::Result<Zonefile> {
    let text = std::fs::read_to_string(path)?;
    let mut writer = Zonefile::with_capacity(text.len()).writer();
    io::Write::write_all(&mut writer, text.as_bytes())?;
    Ok(writer.into_inner())
}

fn to_io_err(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

/// Returns the maximum TTL, in seconds, across every record in the
/// zone file at `path`.
pub fn max_ttl(path: &Utf8Path) -> io::Result<u32> {
    let mut reader = scan(path)?;
    let mut max = 0u32;
    while let Some(entry) = reader.next_entry().map_err(to_io_err)? {
        let Entry::Record(record) = entry else {
            continue;
        };
        let record = record.flatten_into();
        max = max.max(record.ttl().as_secs());
    }
    Ok(max)
}

/// Returns whether the signed zone file at `path` carries a DNSKEY RR
/// whose public key matches `public_key`.
pub fn contains_dnskey(path: &Utf8Path, public_key: &[u8]) -> io::Result<bool> {
    let mut reader = scan(path)?;
    while let Some(entry) = reader.next_entry().map_err(to_io_err)? {
        let Entry::Record(record) = entry else {
            continue;
        };
        let record = record.flatten_into();
        if record.rtype() != Rtype::DNSKEY {
            continue;
        }
        if let ZoneRecordData::Dnskey(dnskey) = record.data() {
            if dnskey.public_key() == public_key {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
