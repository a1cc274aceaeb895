//! Mailbox data: LIST, STATUS, NAMESPACE and ACL responses.

use std::collections::BTreeMap;

/// Mailbox name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// LIST, LSUB or XLIST response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

/// Mailbox attributes from LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox cannot have children.
    NoInferiors,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
    /// The inbox (XLIST).
    Inbox,
    /// All messages (virtual mailbox).
    All,
    /// Mailbox is the drafts folder.
    Drafts,
    /// Mailbox is the junk/spam folder.
    Junk,
    /// Mailbox is the sent folder.
    Sent,
    /// Mailbox is the trash folder.
    Trash,
    /// Unknown attribute.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\INBOX" => Self::Inbox,
            "\\ALL" | "\\ALLMAIL" => Self::All,
            "\\DRAFTS" => Self::Drafts,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

/// STATUS attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages(u32),
    /// Number of recent messages.
    Recent(u32),
    /// Next UID.
    UidNext(u32),
    /// UIDVALIDITY.
    UidValidity(u32),
    /// Number of unseen messages.
    Unseen(u32),
    /// Highest mod-sequence (CONDSTORE).
    HighestModSeq(u64),
    /// Attribute this engine does not model.
    Other(String, u64),
}

/// STATUS response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Mailbox the status is for.
    pub mailbox: Mailbox,
    /// Attributes in server order.
    pub items: Vec<StatusItem>,
}

impl MailboxStatus {
    /// Returns the MESSAGES count, if reported.
    #[must_use]
    pub fn messages(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            StatusItem::Messages(n) => Some(*n),
            _ => None,
        })
    }

    /// Returns the UNSEEN count, if reported.
    #[must_use]
    pub fn unseen(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            StatusItem::Unseen(n) => Some(*n),
            _ => None,
        })
    }
}

/// One namespace description (RFC 2342).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Name prefix.
    pub prefix: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Extension data keyed by extension name.
    pub extensions: BTreeMap<String, Vec<String>>,
}

/// NAMESPACE response data: personal, other users' and shared namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces.
    pub personal: Vec<Namespace>,
    /// Other users' namespaces.
    pub other: Vec<Namespace>,
    /// Shared namespaces.
    pub shared: Vec<Namespace>,
}

/// One entry of an ACL response (RFC 4314).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// Mailbox the rights apply to.
    pub mailbox: Mailbox,
    /// Identifier the rights are granted to.
    pub user: String,
    /// Rights string.
    pub rights: String,
}
