//! Ordered, case-insensitive HTTP header container.
//!
//! Lookup is case-insensitive, but the original casing and the insertion
//! order of every entry are kept, because HTTP/1.x peers and middleboxes
//! do observe both on the wire. Built mutably via [`HeadersBuilder`],
//! frozen into an immutable [`Headers`]; all derived copies (`and`,
//! `merge`, `without`) produce new values.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, Write};

use smallvec::SmallVec;

mod builder;

pub use builder::HeadersBuilder;

/// Charset used when serializing header *values*. Names are always ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// ISO-8859-1, the traditional charset of HTTP/1.x header values.
    #[default]
    Latin1,
    Utf8,
    UsAscii,
}

impl Charset {
    fn write_value<W: Write>(self, value: &str, out: &mut W) -> io::Result<()> {
        match self {
            Self::Utf8 => out.write_all(value.as_bytes()),
            Self::Latin1 => {
                let bytes: Vec<u8> = value
                    .chars()
                    .map(|c| if (c as u32) <= 0xff { c as u8 } else { b'?' })
                    .collect();
                out.write_all(&bytes)
            }
            Self::UsAscii => {
                let bytes: Vec<u8> = value
                    .chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                    .collect();
                out.write_all(&bytes)
            }
        }
    }
}

/// Decode raw wire bytes as ISO-8859-1 (every byte maps to a char).
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) value: String,
}

type Index = HashMap<String, SmallVec<[usize; 2]>>;

/// An immutable, ordered, case-insensitive multi-map of header fields.
#[derive(Clone, Default)]
pub struct Headers {
    entries: Vec<Entry>,
    // uppercased name -> positions into `entries`, in insertion order
    index: Index,
}

pub(crate) fn build_index(entries: &[Entry]) -> Index {
    let mut index: Index = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        index
            .entry(entry.name.to_ascii_uppercase())
            .or_default()
            .push(i);
    }
    index
}

impl Headers {
    /// An empty header container.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<Entry>) -> Self {
        let index = build_index(&entries);
        Self { entries, index }
    }

    /// Number of header entries (not distinct names).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Header names with their original casing, in insertion order.
    /// A name added twice appears twice.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// All `(name, value)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value.as_str()))
    }

    /// All values for `name` (case-insensitive), in insertion order.
    /// Empty if the header is absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Vec<&str> {
        match self.index.get(&name.to_ascii_uppercase()) {
            Some(positions) => positions
                .iter()
                .map(|&i| self.entries[i].value.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Like [`Self::get`], but each value is further split on `separator`
    /// and trimmed, for comma-separated headers such as
    /// `Transfer-Encoding`.
    #[must_use]
    pub fn get_split(&self, name: &str, separator: char) -> Vec<String> {
        self.get(name)
            .into_iter()
            .flat_map(|value| value.split(separator))
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// First value for `name`, if any.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.to_ascii_uppercase())
            .and_then(|positions| positions.first())
            .map(|&i| self.entries[i].value.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_uppercase())
    }

    /// New container where `other`'s entries take precedence: for every
    /// name present in `other`, this container's entries for that name are
    /// fully replaced (not merged).
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| !other.contains(&e.name))
            .cloned()
            .collect();
        entries.extend(other.entries.iter().cloned());
        Self::from_entries(entries)
    }

    /// New container with all of `other`'s entries appended.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().cloned());
        Self::from_entries(entries)
    }

    /// New container without any entry named `name` (case-insensitive).
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        self.without_all(&[name])
    }

    /// New container without any entry whose name is in `names`.
    #[must_use]
    pub fn without_all(&self, names: &[&str]) -> Self {
        let upper: Vec<String> = names.iter().map(|n| n.to_ascii_uppercase()).collect();
        let entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| !upper.contains(&e.name.to_ascii_uppercase()))
            .cloned()
            .collect();
        Self::from_entries(entries)
    }

    /// Reopen this container as a builder. Validation is skipped for the
    /// carried-over entries since they were validated on the way in.
    #[must_use]
    pub fn to_builder(&self) -> HeadersBuilder {
        HeadersBuilder::from_entries(self.entries.clone())
    }

    /// Writes `Name: value\r\n` per entry in insertion order, followed by
    /// the blank line terminating the header section. Names are ASCII,
    /// values use `charset`.
    pub fn write_to<W: Write>(&self, out: &mut W, charset: Charset) -> io::Result<()> {
        for entry in &self.entries {
            out.write_all(entry.name.as_bytes())?;
            out.write_all(b": ")?;
            charset.write_value(&entry.value, out)?;
            out.write_all(b"\r\n")?;
        }
        out.write_all(b"\r\n")
    }

    fn canonical(&self) -> BTreeMap<String, Vec<&str>> {
        let mut map: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for entry in &self.entries {
            map.entry(entry.name.to_ascii_uppercase())
                .or_default()
                .push(entry.value.as_str());
        }
        map
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

// Equality is over the uppercased-name -> values mapping only; original
// casing and relative order of distinct names do not participate.
impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Headers {}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.value)))
            .finish()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{}: {}\r\n", entry.name, entry.value)?;
        }
        Ok(())
    }
}
