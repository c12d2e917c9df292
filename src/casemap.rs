//! IRC case-mapping functions.
//!
//! Nickname and channel-name equality on IRC is defined by the server's
//! advertised `CASEMAPPING` (ISUPPORT token). The three mappings differ in
//! which punctuation characters case-fold: `rfc1459` folds `[]\~` to
//! `{}|^`, `strict-rfc1459` folds only `[]\`, and `ascii` folds nothing
//! beyond `A-Z`.

use serde::{Deserialize, Serialize};

/// The case mapping in effect for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseMapping {
    /// Only `A-Z` fold.
    Ascii,
    /// `A-Z` plus `[]\~` → `{}|^`.
    #[default]
    Rfc1459,
    /// `A-Z` plus `[]\` → `{}|` (no `~` fold).
    StrictRfc1459,
}

impl CaseMapping {
    /// Parse an ISUPPORT `CASEMAPPING` value. Unknown values return `None`.
    pub fn from_token(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ascii" => Some(Self::Ascii),
            "rfc1459" => Some(Self::Rfc1459),
            "strict-rfc1459" => Some(Self::StrictRfc1459),
            _ => None,
        }
    }

    /// Fold a single character under this mapping.
    #[inline]
    pub const fn lower_char(self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => (c as u8 + 32) as char,
            (Self::Rfc1459 | Self::StrictRfc1459, '[') => '{',
            (Self::Rfc1459 | Self::StrictRfc1459, ']') => '}',
            (Self::Rfc1459 | Self::StrictRfc1459, '\\') => '|',
            (Self::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Fold a string under this mapping.
    pub fn to_lower(self, s: &str) -> String {
        s.chars().map(|c| self.lower_char(c)).collect()
    }

    /// Case-insensitive equality under this mapping.
    pub fn eq(self, a: &str, b: &str) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.chars()
            .zip(b.chars())
            .all(|(ca, cb)| self.lower_char(ca) == self.lower_char(cb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc1459_folds_all_specials() {
        let m = CaseMapping::Rfc1459;
        assert_eq!(m.to_lower("Nick[A]\\~"), "nick{a}|^");
        assert!(m.eq("#Channel[1]", "#channel{1}"));
        assert!(m.eq("Test~Name", "test^name"));
    }

    #[test]
    fn strict_rfc1459_keeps_tilde() {
        let m = CaseMapping::StrictRfc1459;
        assert_eq!(m.to_lower("Nick[A]\\~"), "nick{a}|~");
        assert!(m.eq("a[b]", "A{B}"));
        assert!(!m.eq("a~", "a^"));
    }

    #[test]
    fn ascii_folds_letters_only() {
        let m = CaseMapping::Ascii;
        assert_eq!(m.to_lower("Nick[A]"), "nick[a]");
        assert!(m.eq("HELLO", "hello"));
        assert!(!m.eq("a[", "a{"));
    }

    #[test]
    fn from_token() {
        assert_eq!(CaseMapping::from_token("ascii"), Some(CaseMapping::Ascii));
        assert_eq!(
            CaseMapping::from_token("RFC1459"),
            Some(CaseMapping::Rfc1459)
        );
        assert_eq!(
            CaseMapping::from_token("strict-rfc1459"),
            Some(CaseMapping::StrictRfc1459)
        );
        assert_eq!(CaseMapping::from_token("utf8"), None);
    }
}
