//! Command-related type definitions.

use super::Argument;

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
    /// Highest mod-sequence.
    HighestModSeq,
}

impl StatusAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
            Self::HighestModSeq => "HIGHESTMODSEQ",
        }
    }
}

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// Macro `ALL` (FLAGS INTERNALDATE RFC822.SIZE ENVELOPE).
    All,
    /// Macro `FULL` (ALL plus BODY).
    Full,
    /// Macro `FAST` (FLAGS INTERNALDATE RFC822.SIZE).
    Fast,
    /// Explicit attribute list.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    pub(crate) fn to_argument(&self) -> Argument {
        match self {
            Self::All => Argument::atom("ALL"),
            Self::Full => Argument::atom("FULL"),
            Self::Fast => Argument::atom("FAST"),
            Self::Items(attrs) if attrs.len() == 1 => Argument::Raw(attrs[0].to_wire()),
            Self::Items(attrs) => {
                Argument::List(attrs.iter().map(|a| Argument::Raw(a.to_wire())).collect())
            }
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Non-extensible body structure.
    Body,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    BodySection {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch as `(start, length)`.
        partial: Option<(u32, u32)>,
    },
    /// RFC822 (full message).
    Rfc822,
    /// RFC822.HEADER.
    Rfc822Header,
    /// RFC822.TEXT.
    Rfc822Text,
    /// MODSEQ.
    ModSeq,
}

impl FetchAttribute {
    fn to_wire(&self) -> String {
        match self {
            Self::Flags => "FLAGS".to_string(),
            Self::InternalDate => "INTERNALDATE".to_string(),
            Self::Rfc822Size => "RFC822.SIZE".to_string(),
            Self::Envelope => "ENVELOPE".to_string(),
            Self::Body => "BODY".to_string(),
            Self::BodyStructure => "BODYSTRUCTURE".to_string(),
            Self::Uid => "UID".to_string(),
            Self::Rfc822 => "RFC822".to_string(),
            Self::Rfc822Header => "RFC822.HEADER".to_string(),
            Self::Rfc822Text => "RFC822.TEXT".to_string(),
            Self::ModSeq => "MODSEQ".to_string(),
            Self::BodySection {
                section,
                peek,
                partial,
            } => {
                let mut s = String::from(if *peek { "BODY.PEEK[" } else { "BODY[" });
                if let Some(section) = section {
                    s.push_str(section);
                }
                s.push(']');
                if let Some((start, len)) = partial {
                    s.push_str(&format!("<{start}.{len}>"));
                }
                s
            }
        }
    }
}

/// How STORE changes the flag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags (`FLAGS`).
    Replace,
    /// Add flags (`+FLAGS`).
    Add,
    /// Remove flags (`-FLAGS`).
    Remove,
}

impl StoreAction {
    pub(crate) fn item_name(self, silent: bool) -> String {
        let base = match self {
            Self::Replace => "FLAGS",
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
        };
        if silent {
            format!("{base}.SILENT")
        } else {
            base.to_string()
        }
    }
}
