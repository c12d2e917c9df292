//! Source-mask ignore list.
//!
//! Patterns are matched case-insensitively against the full
//! `nick!user@host` of a message source. Two syntaxes are accepted:
//! full regular expressions, and simple glob masks where `*` matches any
//! run of characters and `?` matches one. In both syntaxes `.` matches
//! any single character, so legacy patterns like `Data.*` keep working
//! as their authors expect.

use regex::{Regex, RegexBuilder};

use crate::error::EngineError;

/// An ordered set of ignore patterns.
#[derive(Debug, Default)]
pub struct IgnoreList {
    patterns: Vec<IgnorePattern>,
}

#[derive(Debug)]
struct IgnorePattern {
    source: String,
    regex: Regex,
}

impl IgnoreList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from pattern strings.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for p in patterns {
            list.add(p.as_ref())?;
        }
        Ok(list)
    }

    /// Add a pattern, treating it as a regular expression.
    pub fn add(&mut self, pattern: &str) -> Result<(), EngineError> {
        let regex = compile(pattern).map_err(|source| EngineError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.patterns.push(IgnorePattern {
            source: pattern.to_string(),
            regex,
        });
        Ok(())
    }

    /// Add a simple glob mask (`*` and `?` wildcards).
    pub fn add_simple(&mut self, mask: &str) -> Result<(), EngineError> {
        let pattern = simple_to_regex(mask);
        let regex = compile(&pattern).map_err(|source| EngineError::InvalidIgnorePattern {
            pattern: mask.to_string(),
            source,
        })?;
        self.patterns.push(IgnorePattern {
            source: mask.to_string(),
            regex,
        });
        Ok(())
    }

    /// Remove a pattern by its original text. Returns whether one was
    /// removed.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|p| p.source != pattern);
        self.patterns.len() != before
    }

    /// Whether a `nick!user@host` source matches any pattern.
    pub fn matches(&self, source: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(source))
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Original pattern texts, in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.source.as_str())
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
}

/// Convert a glob mask to regex text. `.` is deliberately left
/// unescaped so it keeps its any-character meaning.
fn simple_to_regex(mask: &str) -> String {
    let mut out = String::with_capacity(mask.len() + 8);
    for c in mask.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '|' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchored_and_case_insensitive() {
        let list = IgnoreList::from_patterns(["Data.*"]).unwrap();
        assert!(list.matches("Dataforce"));
        assert!(list.matches("dataFORCE"));
        assert!(!list.matches("NotDataforce"));
    }

    #[test]
    fn simple_mask_wildcards() {
        let mut list = IgnoreList::new();
        list.add_simple("*!*@*.example.com").unwrap();
        assert!(list.matches("any!user@gw.example.com"));
        assert!(!list.matches("any!user@example.org"));
    }

    #[test]
    fn dot_stays_wild_in_simple_masks() {
        let mut list = IgnoreList::new();
        list.add_simple("Data.*").unwrap();
        assert!(list.matches("Dataforce"));
    }

    #[test]
    fn invalid_pattern_is_error() {
        let mut list = IgnoreList::new();
        assert!(list.add("(unclosed").is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn remove_by_text() {
        let mut list = IgnoreList::from_patterns(["a.*", "b.*"]).unwrap();
        assert!(list.remove("a.*"));
        assert!(!list.remove("a.*"));
        assert_eq!(list.len(), 1);
        assert!(!list.matches("abc"));
        assert!(list.matches("bcd"));
    }
}
