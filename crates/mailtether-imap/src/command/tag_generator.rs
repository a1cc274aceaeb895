//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::types::Tag;

/// Default tag prefix.
pub const DEFAULT_TAG_PREFIX: &str = "A";

/// Tag generator for IMAP commands.
///
/// Generates unique, strictly increasing tags of the form `<prefix>0001`,
/// `<prefix>0002`, and so on. The counter is zero-padded to four digits
/// and keeps growing past `9999`.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: String,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix: prefix.into(),
        }
    }

    /// Generates the next tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once `u32::MAX` tags have been issued;
    /// tags are never reused within a connection.
    pub fn next(&self) -> Result<Tag> {
        let n = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| Error::InvalidState("tag counter exhausted".to_string()))?
            + 1;
        Ok(Tag::new(format!("{}{n:04}", self.prefix)))
    }

    /// Returns the number of tags issued so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Returns the tag prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_PREFIX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next().unwrap().as_str(), "A0001");
        assert_eq!(generator.next().unwrap().as_str(), "A0002");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn test_custom_prefix() {
        let generator = TagGenerator::new("T");
        assert_eq!(generator.next().unwrap().as_str(), "T0001");
        assert_eq!(generator.prefix(), "T");
    }

    #[test]
    fn test_padding_grows() {
        let generator = TagGenerator::new("X");
        generator.counter.store(9999, Ordering::Relaxed);
        assert_eq!(generator.next().unwrap().as_str(), "X10000");
    }

    #[test]
    fn test_uniqueness() {
        let generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10000 {
            let tag = generator.next().unwrap();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let generator = TagGenerator::default();
        generator.counter.store(u32::MAX, Ordering::Relaxed);
        assert!(matches!(generator.next(), Err(Error::InvalidState(_))));
    }
}
