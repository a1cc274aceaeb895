//! Response data types.

use std::collections::BTreeMap;

use crate::types::{
    AclEntry, Capability, Flag, ListResponse, MailboxStatus, Namespaces, ResponseCode, SeqNum,
    Status, Tag, Uid,
};

/// Status text with its optional bracketed response code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseText {
    /// Response code, if present.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
}

/// Tagged response concluding a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// The command tag.
    pub tag: Tag,
    /// Response status.
    pub status: Status,
    /// Response text and code.
    pub text: ResponseText,
}

impl TaggedResponse {
    /// Returns the response code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        self.text.code.as_ref()
    }
}

/// Continuation request (`+`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationRequest {
    /// Response text; for SASL this is the base64 challenge.
    pub text: ResponseText,
}

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged(TaggedResponse),
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation(ContinuationRequest),
}

/// ID response parameters. Values may be NIL.
pub type IdParams = BTreeMap<String, Option<String>>;

/// Untagged response data, one variant per response name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK status.
    Ok(ResponseText),
    /// NO status.
    No(ResponseText),
    /// BAD status.
    Bad(ResponseText),
    /// PREAUTH greeting.
    PreAuth(ResponseText),
    /// BYE status.
    Bye(ResponseText),
    /// CAPABILITY data.
    Capability(Vec<Capability>),
    /// ENABLED data (RFC 5161).
    Enabled(Vec<Capability>),
    /// FLAGS data.
    Flags(Vec<Flag>),
    /// LIST data.
    List(ListResponse),
    /// LSUB data.
    Lsub(ListResponse),
    /// XLIST data.
    Xlist(ListResponse),
    /// SEARCH data.
    Search {
        /// Matching numbers in server order.
        ids: Vec<u32>,
        /// Trailing `(MODSEQ n)` extension data.
        modseq: Option<u64>,
    },
    /// STATUS data.
    Status(MailboxStatus),
    /// NAMESPACE data.
    Namespace(Namespaces),
    /// ACL data.
    Acl(Vec<AclEntry>),
    /// ID data; `None` for `* ID NIL`.
    Id(Option<IdParams>),
    /// EXISTS (message count).
    Exists(u32),
    /// RECENT count.
    Recent(u32),
    /// EXPUNGE (message removed).
    Expunge(SeqNum),
    /// FETCH data.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Fetch data items in server order.
        items: Vec<FetchItem>,
    },
    /// A response this engine does not interpret, kept as raw text.
    Ignored {
        /// Upper-cased response name.
        name: String,
        /// Text after the name.
        text: String,
    },
}

impl UntaggedResponse {
    /// Returns the response name used as the response store key.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ok(_) => "OK",
            Self::No(_) => "NO",
            Self::Bad(_) => "BAD",
            Self::PreAuth(_) => "PREAUTH",
            Self::Bye(_) => "BYE",
            Self::Capability(_) => "CAPABILITY",
            Self::Enabled(_) => "ENABLED",
            Self::Flags(_) => "FLAGS",
            Self::List(_) => "LIST",
            Self::Lsub(_) => "LSUB",
            Self::Xlist(_) => "XLIST",
            Self::Search { .. } => "SEARCH",
            Self::Status(_) => "STATUS",
            Self::Namespace(_) => "NAMESPACE",
            Self::Acl(_) => "ACL",
            Self::Id(_) => "ID",
            Self::Exists(_) => "EXISTS",
            Self::Recent(_) => "RECENT",
            Self::Expunge(_) => "EXPUNGE",
            Self::Fetch { .. } => "FETCH",
            Self::Ignored { name, .. } => name,
        }
    }

    /// Returns the status text of an OK/NO/BAD/PREAUTH/BYE response.
    #[must_use]
    pub const fn status_text(&self) -> Option<&ResponseText> {
        match self {
            Self::Ok(text)
            | Self::No(text)
            | Self::Bad(text)
            | Self::PreAuth(text)
            | Self::Bye(text) => Some(text),
            _ => None,
        }
    }
}

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Vec<Flag>),
    /// Internal date.
    InternalDate(String),
    /// RFC822 size.
    Rfc822Size(u32),
    /// Envelope.
    Envelope(Box<Envelope>),
    /// UID.
    Uid(Uid),
    /// `BODY[section]<origin>` content.
    BodySection {
        /// Section specifier; empty for the whole message.
        section: String,
        /// Origin offset of a partial fetch.
        origin: Option<u32>,
        /// Section data.
        data: Option<Vec<u8>>,
    },
    /// Whole message (`RFC822` or `RFC822[]`).
    Rfc822(Option<Vec<u8>>),
    /// Message header (`RFC822.HEADER`).
    Rfc822Header(Option<Vec<u8>>),
    /// Message text (`RFC822.TEXT`).
    Rfc822Text(Option<Vec<u8>>),
    /// Non-extensible `BODY` structure.
    Body(BodyStructure),
    /// `BODYSTRUCTURE`.
    BodyStructure(BodyStructure),
    /// MODSEQ (CONDSTORE).
    ModSeq(u64),
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Email address from envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns the full email address.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// Fields shared by every leaf body part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyFields {
    /// Parameters, keys upper-cased.
    pub params: Vec<(String, String)>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, upper-cased.
    pub encoding: String,
    /// Size in bytes.
    pub size: u32,
}

impl BodyFields {
    /// Looks up a parameter by case-insensitive name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }
}

/// Content-Disposition from body extension data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type, upper-cased.
    pub kind: String,
    /// Parameters, keys upper-cased.
    pub params: Vec<(String, String)>,
}

/// Optional extension data of a body part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExtension {
    /// Content-MD5 (leaf parts only).
    pub md5: Option<String>,
    /// Content-Disposition.
    pub disposition: Option<ContentDisposition>,
    /// Content-Language tags.
    pub language: Vec<String>,
    /// Content-Location.
    pub location: Option<String>,
}

/// Recursive MIME structure of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Any leaf part that is not text or message/rfc822.
    Basic {
        /// MIME type, upper-cased.
        media_type: String,
        /// MIME subtype, upper-cased.
        subtype: String,
        /// Common fields.
        fields: BodyFields,
        /// Extension data.
        extension: BodyExtension,
    },
    /// `text/*` part.
    Text {
        /// Text subtype, upper-cased.
        subtype: String,
        /// Common fields.
        fields: BodyFields,
        /// Size in lines.
        lines: u32,
        /// Extension data.
        extension: BodyExtension,
    },
    /// `message/rfc822` part.
    Message {
        /// Common fields.
        fields: BodyFields,
        /// Envelope of the nested message, when sent.
        envelope: Option<Box<Envelope>>,
        /// Structure of the nested message, when sent.
        body: Option<Box<Self>>,
        /// Size in lines, when sent.
        lines: Option<u32>,
        /// Extension data.
        extension: BodyExtension,
    },
    /// `multipart/*` node.
    Multipart {
        /// Child parts in order.
        parts: Vec<Self>,
        /// Multipart subtype, upper-cased.
        subtype: String,
        /// Parameters, keys upper-cased.
        params: Vec<(String, String)>,
        /// Extension data.
        extension: BodyExtension,
    },
}

impl BodyStructure {
    /// MIME type, upper-cased.
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Basic { media_type, .. } => media_type,
            Self::Text { .. } => "TEXT",
            Self::Message { .. } => "MESSAGE",
            Self::Multipart { .. } => "MULTIPART",
        }
    }

    /// MIME subtype, upper-cased.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Basic { subtype, .. }
            | Self::Text { subtype, .. }
            | Self::Multipart { subtype, .. } => subtype,
            Self::Message { .. } => "RFC822",
        }
    }

    /// Child parts; empty for leaf parts.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        match self {
            Self::Multipart { parts, .. } => parts,
            _ => &[],
        }
    }

    /// Looks up a content-type parameter by case-insensitive name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                fields.param(name)
            }
            Self::Multipart { params, .. } => find_param(params, name),
        }
    }

    /// Extension data.
    #[must_use]
    pub const fn extension(&self) -> &BodyExtension {
        match self {
            Self::Basic { extension, .. }
            | Self::Text { extension, .. }
            | Self::Message { extension, .. }
            | Self::Multipart { extension, .. } => extension,
        }
    }
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn address_email() {
        let addr = Address {
            name: Some("John Doe".to_string()),
            adl: None,
            mailbox: Some("john".to_string()),
            host: Some("example.com".to_string()),
        };
        assert_eq!(addr.email(), Some("john@example.com".to_string()));

        let group = Address {
            host: None,
            ..addr
        };
        assert_eq!(group.email(), None);
    }

    #[test]
    fn untagged_names() {
        assert_eq!(UntaggedResponse::Exists(3).name(), "EXISTS");
        assert_eq!(
            UntaggedResponse::Ignored {
                name: "NOOP".to_string(),
                text: String::new()
            }
            .name(),
            "NOOP"
        );
        assert!(UntaggedResponse::Ok(ResponseText::default())
            .status_text()
            .is_some());
        assert!(UntaggedResponse::Recent(1).status_text().is_none());
    }

    #[test]
    fn multipart_accessors() {
        let body = BodyStructure::Multipart {
            parts: vec![BodyStructure::Text {
                subtype: "PLAIN".to_string(),
                fields: BodyFields {
                    params: vec![("CHARSET".to_string(), "utf-8".to_string())],
                    encoding: "7BIT".to_string(),
                    size: 10,
                    ..BodyFields::default()
                },
                lines: 1,
                extension: BodyExtension::default(),
            }],
            subtype: "MIXED".to_string(),
            params: vec![("BOUNDARY".to_string(), "xyz".to_string())],
            extension: BodyExtension::default(),
        };
        assert_eq!(body.media_type(), "MULTIPART");
        assert_eq!(body.param("boundary"), Some("xyz"));
        assert_eq!(body.parts()[0].media_type(), "TEXT");
        assert_eq!(body.parts()[0].param("Charset"), Some("utf-8"));
    }
}
