use crate::chars::{FIELD_VALUE_CHARS, TOKEN_CHARS, index_of_first_invalid};
use crate::error::{Error, Header};

use super::{Entry, Headers};

/// Mutable accumulator for [`Headers`].
///
/// Not safe for concurrent writers; `build()` freezes it into an immutable
/// container that is. Character validation can be skipped for headers the
/// caller itself generates (see [`HeadersBuilder::skip_validation`]) to
/// avoid re-checking bytes the parser already vetted.
#[derive(Debug, Default)]
pub struct HeadersBuilder {
    entries: Vec<Entry>,
    validate: bool,
}

impl HeadersBuilder {
    /// A builder that validates every added name and value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            validate: true,
        }
    }

    /// A builder that trusts its input. For headers produced by the
    /// system itself, never for bytes off the wire.
    #[must_use]
    pub fn skip_validation() -> Self {
        Self {
            entries: Vec::new(),
            validate: false,
        }
    }

    pub(crate) fn from_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            validate: false,
        }
    }

    fn check(&self, name: &str, value: &str) -> crate::Result<()> {
        if !self.validate {
            return Ok(());
        }
        // the entry's would-be 1-based position doubles as the line number
        let line = self.entries.len() + 1;
        if name.is_empty() {
            return Err(Error::new_header(Header::NameChar(0), line));
        }
        if let Some(i) = index_of_first_invalid(name.as_bytes(), &TOKEN_CHARS) {
            return Err(Error::new_header(Header::NameChar(i), line));
        }
        if let Some(i) = index_of_first_invalid(value.as_bytes(), &FIELD_VALUE_CHARS) {
            return Err(Error::new_header(Header::ValueChar(i), line));
        }
        Ok(())
    }

    /// Appends a `name: value` entry, keeping the given casing.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> crate::Result<()> {
        let name = name.into();
        let value = value.into();
        self.check(&name, &value)?;
        self.entries.push(Entry { name, value });
        Ok(())
    }

    /// Replaces all existing values for `name` with a single value. The
    /// new entry takes the position of the first existing occurrence, or
    /// is appended if the name is new.
    pub fn overwrite(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> crate::Result<()> {
        let name = name.into();
        let value = value.into();
        self.check(&name, &value)?;
        let upper = name.to_ascii_uppercase();
        let mut first = None;
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].name.to_ascii_uppercase() == upper {
                if first.is_none() {
                    first = Some(i);
                    i += 1;
                } else {
                    self.entries.remove(i);
                }
            } else {
                i += 1;
            }
        }
        let entry = Entry { name, value };
        match first {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    /// Removes every entry named `name` (case-insensitive).
    pub fn remove(&mut self, name: &str) {
        let upper = name.to_ascii_uppercase();
        self.entries
            .retain(|e| e.name.to_ascii_uppercase() != upper);
    }

    /// Removes every entry whose name is in `names`.
    pub fn remove_all(&mut self, names: &[&str]) {
        for name in names {
            self.remove(name);
        }
    }

    /// Appends all of `other`'s entries.
    pub fn merge(&mut self, other: &Headers) {
        self.entries.extend(other.entries().iter().cloned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the accumulated entries into an immutable container.
    #[must_use]
    pub fn build(self) -> Headers {
        Headers::from_entries(self.entries)
    }
}
