//! Core IMAP identifiers and numeric argument validation.
//!
//! Types for tags, sequence numbers, UIDs, and UIDVALIDITY.

use std::num::NonZeroU32;

use crate::error::{Error, Result};

/// IMAP command tag.
///
/// Tags are alphanumeric prefixes that identify commands and their responses.
/// Each command sent by the client has a unique tag, and the server's response
/// includes the same tag to correlate request and response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates a protocol number (count, size, mod-sequence argument).
///
/// # Errors
///
/// Returns [`Error::DataFormat`] unless `n` is in `0..=4294967295`.
pub fn validate_number(n: i64) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::DataFormat(format!("number out of range: {n}")))
}

/// Validates a UID or message sequence number.
///
/// # Errors
///
/// Returns [`Error::DataFormat`] unless `n` is in `1..=4294967295`.
pub fn validate_uid(n: i64) -> Result<NonZeroU32> {
    u32::try_from(n)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| Error::DataFormat(format!("invalid UID or sequence number: {n}")))
}

/// Message sequence number.
///
/// Sequence numbers are assigned to messages in a mailbox starting from 1.
/// They are ephemeral and change when messages are expunged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNum(pub NonZeroU32);

impl SeqNum {
    /// Creates a new sequence number.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message.
///
/// UIDs are persistent identifiers that don't change when messages are expunged.
/// Combined with `UIDVALIDITY`, they uniquely identify a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU32);

impl Uid {
    /// Creates a new UID.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UIDVALIDITY value for a mailbox.
///
/// If this value changes, all cached UIDs are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UidValidity(pub NonZeroU32);

impl UidValidity {
    /// Creates a new UIDVALIDITY.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;

    mod validation_tests {
        use super::*;

        #[test]
        fn number_bounds() {
            assert_eq!(validate_number(0).unwrap(), 0);
            assert_eq!(validate_number(4294967295).unwrap(), u32::MAX);
            assert!(matches!(validate_number(-1), Err(Error::DataFormat(_))));
            assert!(matches!(
                validate_number(4294967296),
                Err(Error::DataFormat(_))
            ));
        }

        #[test]
        fn uid_bounds() {
            assert_eq!(validate_uid(1).unwrap().get(), 1);
            assert_eq!(validate_uid(4294967295).unwrap().get(), u32::MAX);
            assert!(matches!(validate_uid(0), Err(Error::DataFormat(_))));
            assert!(matches!(validate_uid(-1), Err(Error::DataFormat(_))));
            assert!(matches!(
                validate_uid(4294967296),
                Err(Error::DataFormat(_))
            ));
        }
    }

    mod identifier_tests {
        use super::*;

        #[test]
        fn tag_display() {
            let tag = Tag::new("A0001");
            assert_eq!(format!("{tag}"), "A0001");
            assert_eq!(tag.as_str(), "A0001");
        }

        #[test]
        fn zero_is_rejected() {
            assert!(SeqNum::new(0).is_none());
            assert!(Uid::new(0).is_none());
            assert!(UidValidity::new(0).is_none());
        }

        #[test]
        fn ordering() {
            assert!(Uid::new(100).unwrap() < Uid::new(200).unwrap());
            assert_eq!(SeqNum::new(u32::MAX).unwrap().get(), u32::MAX);
        }
    }
}
