//! Message flags.

/// Message flag as it appears in FLAGS, PERMANENTFLAGS and FETCH data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// `\*`: new keywords may be created (PERMANENTFLAGS only).
    MayCreate,
    /// Custom keyword or unrecognized system flag.
    Keyword(String),
}

impl Flag {
    /// Parses a flag string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::MayCreate,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the flag as an IMAP string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::MayCreate => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_system_flags_case_insensitively() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\FLAGGED"), Flag::Flagged);
        assert_eq!(Flag::parse("\\*"), Flag::MayCreate);
    }

    #[test]
    fn keywords_keep_their_spelling() {
        assert_eq!(Flag::parse("$Junk"), Flag::Keyword("$Junk".to_string()));
        assert_eq!(Flag::parse("$Junk").as_str(), "$Junk");
    }

    #[test]
    fn display_uses_wire_form() {
        assert_eq!(Flag::Deleted.to_string(), "\\Deleted");
        assert_eq!(Flag::MayCreate.to_string(), "\\*");
    }
}
