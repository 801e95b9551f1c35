//! Keyrec model (spec 4.B): a typed view over the tabbed-record store
//! (§4.A) for `zone`/`set`/`key` sections, with cross-reference
//! resolution and the derived per-key/per-set computations spec.md lists.
//!
//! Public-key material (`publicKeyBytes`) is read via
//! `domain::dnssec::common::parse_from_bind`, the same BIND-key-file
//! parser the teacher's signer unit uses to load a key's public half
//! (`units::zone_signer::load_public_key`); that parser already performs
//! the base64 decode spec.md describes, so no separate base64 dependency
//! is needed here.

use std::io;

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};

use crate::tabbed::{Section, TabbedStore};
use crate::zonefile;

pub(crate) fn is_keyrec_kind(kind: &str) -> bool {
    matches!(kind, "zone" | "set" | "key")
}

/// The five named key-set references a `zone` section carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetRef {
    ZskCur,
    ZskPub,
    ZskNew,
    KskCur,
    KskPub,
}

impl SetRef {
    pub const ALL: [SetRef; 5] = [
        Self::ZskCur,
        Self::ZskPub,
        Self::ZskNew,
        Self::KskCur,
        Self::KskPub,
    ];

    pub fn field(self) -> &'static str {
        match self {
            SetRef::ZskCur => "zskcur",
            SetRef::ZskPub => "zskpub",
            SetRef::ZskNew => "zsknew",
            SetRef::KskCur => "kskcur",
            SetRef::KskPub => "kskpub",
        }
    }

    pub fn from_set_type(s: &str) -> Option<Self> {
        Some(match s {
            "zskcur" => Self::ZskCur,
            "zskpub" => Self::ZskPub,
            "zsknew" => Self::ZskNew,
            "kskcur" => Self::KskCur,
            "kskpub" => Self::KskPub,
            _ => return None,
        })
    }
}

/// A loaded keyrec file, owning the tabbed-record store behind it.
pub struct KeyRec {
    pub store: TabbedStore,
    path: Utf8PathBuf,
}

impl KeyRec {
    pub fn load(path: &Utf8Path) -> io::Result<Self> {
        let store = TabbedStore::read_file(path, is_keyrec_kind)?;
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

    fn dir(&self) -> &Utf8Path {
        self.path.parent().unwrap_or(Utf8Path::new("."))
    }

    /// Resolves a path field against the keyrec's directory, unless it is
    /// already absolute.
    pub fn resolve(&self, raw: &str) -> Utf8PathBuf {
        let p = Utf8Path::new(raw);
        if p.is_absolute() {
            p.to_owned()
        } else {
            self.dir().join(p)
        }
    }

    pub fn zone<'a>(&'a self, name: &str) -> Option<Zone<'a>> {
        self.store
            .find("zone", name)
            .map(|section| Zone { keyrec: self, section })
    }

    pub fn set<'a>(&'a self, name: &str) -> Option<Set<'a>> {
        self.store
            .find("set", name)
            .map(|section| Set { keyrec: self, section })
    }

    pub fn key<'a>(&'a self, name: &str) -> Option<Key<'a>> {
        self.store
            .find("key", name)
            .map(|section| Key { keyrec: self, section })
    }

    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.store
            .sections
            .iter()
            .filter(|s| s.kind == "zone")
            .map(|s| s.name.as_str())
    }
}

/// A `zone` section: the keyrec's top-level view of one managed zone.
pub struct Zone<'a> {
    keyrec: &'a KeyRec,
    section: &'a Section,
}

impl<'a> Zone<'a> {
    pub fn name(&self) -> &str {
        &self.section.name
    }

    pub fn zonefile(&self) -> Option<Utf8PathBuf> {
        self.section.get("zonefile").map(|p| self.keyrec.resolve(p))
    }

    pub fn signedzone(&self) -> Option<Utf8PathBuf> {
        self.section
            .get("signedzone")
            .map(|p| self.keyrec.resolve(p))
    }

    pub fn set_ref(&self, which: SetRef) -> Option<Set<'a>> {
        let name = self.section.get(which.field())?;
        self.keyrec.set(name)
    }

    pub fn sign_secs(&self) -> i64 {
        self.section
            .get("keyrec_signsecs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// A `set` section: a named group of same-class, same-state keys.
pub struct Set<'a> {
    keyrec: &'a KeyRec,
    section: &'a Section,
}

impl<'a> Set<'a> {
    pub fn name(&self) -> &str {
        &self.section.name
    }

    pub fn zonename(&self) -> Option<&str> {
        self.section.get("zonename")
    }

    pub fn set_type(&self) -> Option<SetRef> {
        self.section.get("set_type").and_then(SetRef::from_set_type)
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.section
            .get("keys")
            .map(|keys| keys.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<Key<'a>> {
        self.key_names()
            .into_iter()
            .filter_map(|name| self.keyrec.key(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.key_names().is_empty()
    }

    /// `minlifeKey()`: the key with the smallest `life`, ties resolved by
    /// insertion order (i.e. first occurrence in `keys`).
    pub fn min_life_key(&self) -> Option<Key<'a>> {
        self.keys().into_iter().min_by_key(|k| k.life())
    }
}

/// A `key` section: one DNSSEC key.
pub struct Key<'a> {
    keyrec: &'a KeyRec,
    section: &'a Section,
}

impl<'a> Key<'a> {
    pub fn name(&self) -> &str {
        &self.section.name
    }

    fn keyrec_type(&self) -> &str {
        self.section.get("keyrec_type").unwrap_or("")
    }

    /// First 3 characters of `keyrec_type`: `zsk` or `ksk`.
    pub fn keytype(&self) -> &str {
        let t = self.keyrec_type();
        &t[..t.len().min(3)]
    }

    /// Next 3 characters of `keyrec_type`: `cur`, `pub`, `new`, `rev`, or
    /// `obs`.
    pub fn pubtype(&self) -> &str {
        let t = self.keyrec_type();
        if t.len() >= 6 { &t[3..6] } else { "" }
    }

    pub fn zonename(&self) -> Option<&str> {
        self.section.get("zonename")
    }

    pub fn keypath(&self) -> Option<Utf8PathBuf> {
        self.section.get("keypath").map(|p| self.keyrec.resolve(p))
    }

    /// `life` = integer of `<keytype>life` (`zsklife` or `ksklife`),
    /// in seconds.
    pub fn life(&self) -> i64 {
        let field = format!("{}life", self.keytype());
        self.section
            .get(&field)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn gensecs(&self) -> i64 {
        self.section
            .get("keyrec_gensecs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// The trailing `+NNN+TTTTT` group in the key's name.
    pub fn keytag(&self) -> Option<u32> {
        keytag_from_name(&self.section.name)
    }

    /// Base64-decoded public key bytes, read from the key file's DNSKEY
    /// line.
    pub fn public_key_bytes(&self) -> io::Result<Vec<u8>> {
        let path = self
            .keypath()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "key section has no keypath"))?;
        read_public_key_bytes(&path)
    }

    /// `isValid` ↔ now < gendate + life.
    pub fn is_valid(&self, now: i64) -> bool {
        now < self.gensecs() + self.life()
    }

    /// `isSigned(zone)` ↔ the signed zone file's DNSKEY RRset contains a
    /// record whose key matches `publicKeyBytes`.
    pub fn is_signed(&self, signed_zone: &Utf8Path) -> io::Result<bool> {
        let bytes = self.public_key_bytes()?;
        zonefile::contains_dnskey(signed_zone, &bytes)
    }
}

fn keytag_from_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".key").unwrap_or(name);
    let mut parts = stem.rsplitn(3, '+');
    let keytag = parts.next()?;
    let _algorithm = parts.next()?;
    keytag.parse().ok()
}

fn read_public_key_bytes(path: &Utf8Path) -> io::Result<Vec<u8>> {
    use domain::base::Record;
    use domain::rdata::Dnskey;
    use domain::zonetree::StoredName;

    let content = std::fs::read_to_string(path)?;
    let record: Record<StoredName, Dnskey<Bytes>> = domain::dnssec::common::parse_from_bind(&content)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(record.data().public_key().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keytag_parses_trailing_group() {
        assert_eq!(
            keytag_from_name("Kexample.com.+008+12345.key"),
            Some(12345)
        );
        assert_eq!(keytag_from_name("Kexample.com.+008+12345"), Some(12345));
        assert_eq!(keytag_from_name("not-a-key-name"), None);
    }

    #[test]
    fn keytype_and_pubtype_split() {
        let mut store = TabbedStore::default();
        let mut section = Section::new("key", "Kexample.com.+008+12345");
        section.set("keyrec_type", "zskcur");
        store.sections.push(section);
        let keyrec = KeyRec {
            store,
            path: Utf8PathBuf::from("/tmp/test.krf"),
        };
        let key = keyrec.key("Kexample.com.+008+12345").unwrap();
        assert_eq!(key.keytype(), "zsk");
        assert_eq!(key.pubtype(), "cur");
    }

    #[test]
    fn min_life_key_breaks_ties_by_insertion_order() {
        let mut store = TabbedStore::default();

        let mut zone = Section::new("zone", "example.com");
        zone.set("zskcur", "set1");
        store.sections.push(zone);

        let mut set = Section::new("set", "set1");
        set.set("zonename", "example.com");
        set.set("set_type", "zskcur");
        set.set("keys", "keyA keyB");
        store.sections.push(set);

        let mut key_a = Section::new("key", "keyA");
        key_a.set("keyrec_type", "zskcur");
        key_a.set("zsklife", "100");
        store.sections.push(key_a);

        let mut key_b = Section::new("key", "keyB");
        key_b.set("keyrec_type", "zskcur");
        key_b.set("zsklife", "100");
        store.sections.push(key_b);

        let keyrec = KeyRec {
            store,
            path: Utf8PathBuf::from("/tmp/test.krf"),
        };
        let set = keyrec.set("set1").unwrap();
        let min = set.min_life_key().unwrap();
        assert_eq!(min.name(), "keyA");
    }
}
