//! Server capabilities and response status.

/// Status word of a tagged or untagged status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
    /// A status word outside the protocol, kept upper-cased.
    Other(String),
}

impl Status {
    /// Parses a status word, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "OK" => Self::Ok,
            "NO" => Self::No,
            "BAD" => Self::Bad,
            "PREAUTH" => Self::PreAuth,
            "BYE" => Self::Bye,
            _ => Self::Other(upper),
        }
    }

    /// Returns the status word.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
            Self::Other(s) => s,
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server capability.
///
/// Capability names are case-insensitive on the wire and are upper-cased
/// when parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// IDLE command support (RFC 2177)
    Idle,
    /// NAMESPACE command support (RFC 2342)
    Namespace,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// MOVE extension (RFC 6851)
    Move,
    /// LITERAL+ extension (RFC 7888)
    LiteralPlus,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// SASL-IR (RFC 4959)
    SaslIr,
    /// AUTH mechanism
    Auth(String),
    /// ENABLE command (RFC 5161)
    Enable,
    /// CONDSTORE (RFC 7162)
    CondStore,
    /// ID extension (RFC 2971)
    Id,
    /// ACL extension (RFC 4314)
    Acl,
    /// Any other capability token, upper-cased.
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IDLE" => Self::Idle,
            "NAMESPACE" => Self::Namespace,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "LITERAL+" => Self::LiteralPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            "ENABLE" => Self::Enable,
            "CONDSTORE" => Self::CondStore,
            "ID" => Self::Id,
            "ACL" => Self::Acl,
            _ => match upper.strip_prefix("AUTH=") {
                Some(mech) => Self::Auth(mech.to_string()),
                None => Self::Unknown(upper),
            },
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4REV1"),
            Self::Idle => write!(f, "IDLE"),
            Self::Namespace => write!(f, "NAMESPACE"),
            Self::UidPlus => write!(f, "UIDPLUS"),
            Self::Move => write!(f, "MOVE"),
            Self::LiteralPlus => write!(f, "LITERAL+"),
            Self::StartTls => write!(f, "STARTTLS"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::SaslIr => write!(f, "SASL-IR"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::Enable => write!(f, "ENABLE"),
            Self::CondStore => write!(f, "CONDSTORE"),
            Self::Id => write!(f, "ID"),
            Self::Acl => write!(f, "ACL"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}
