//! Command argument rendering.
//!
//! Arguments are validated and rendered into [`Segment`]s before anything is
//! written, so a bad number or set never leaves a half-sent command behind.

use crate::error::{Error, Result};
use crate::types::{Flag, Mailbox, SequenceSet, validate_number};

use super::transmit::{LineBuilder, Segment};

/// One command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Bare atom, written as-is after validation.
    Atom(String),
    /// Protocol number, `0..=4294967295`.
    Number(i64),
    /// String written as an atom, quoted string or literal, whichever fits.
    String(String),
    /// String that is always quoted (unless it can only travel as a literal).
    Quoted(String),
    /// Binary-safe literal.
    Literal(Vec<u8>),
    /// Sequence or UID set.
    Set(SequenceSet),
    /// Parenthesized list.
    List(Vec<Argument>),
    /// `NIL`.
    Nil,
    /// Pre-rendered text such as `BODY.PEEK[HEADER]` or `+FLAGS.SILENT`.
    Raw(String),
}

impl Argument {
    /// Creates an atom argument.
    #[must_use]
    pub fn atom(s: impl Into<String>) -> Self {
        Self::Atom(s.into())
    }

    /// Creates a string argument.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a flag list argument.
    #[must_use]
    pub fn flags(flags: &[Flag]) -> Self {
        Self::List(
            flags
                .iter()
                .map(|f| Self::Raw(f.as_str().to_string()))
                .collect(),
        )
    }

    /// Renders this argument onto `line`.
    pub(crate) fn encode(&self, line: &mut LineBuilder) -> Result<()> {
        match self {
            Self::Atom(s) => {
                if s.is_empty() || s.bytes().any(|b| b <= b' ' || b >= 0x7F) {
                    return Err(Error::DataFormat(format!("invalid atom: {s:?}")));
                }
                line.push(s.as_bytes());
            }
            Self::Number(n) => {
                let n = validate_number(*n)?;
                line.push(n.to_string().as_bytes());
            }
            Self::String(s) => encode_string(line, s.as_bytes(), false),
            Self::Quoted(s) => encode_string(line, s.as_bytes(), true),
            Self::Literal(data) => line.push_literal(data),
            Self::Set(set) => line.push(set.to_string().as_bytes()),
            Self::List(items) => {
                line.push(b"(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        line.push(b" ");
                    }
                    item.encode(line)?;
                }
                line.push(b")");
            }
            Self::Nil => line.push(b"NIL"),
            Self::Raw(s) => {
                if s.bytes().any(|b| b == b'\r' || b == b'\n') {
                    return Err(Error::DataFormat(format!("line break in argument: {s:?}")));
                }
                line.push(s.as_bytes());
            }
        }
        Ok(())
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<u32> for Argument {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(data: Vec<u8>) -> Self {
        Self::Literal(data)
    }
}

impl From<SequenceSet> for Argument {
    fn from(set: SequenceSet) -> Self {
        Self::Set(set)
    }
}

impl From<&Mailbox> for Argument {
    fn from(mailbox: &Mailbox) -> Self {
        Self::String(mailbox.as_str().to_string())
    }
}

/// Renders a full command line into segments.
///
/// # Errors
///
/// Returns [`Error::DataFormat`] if any argument is invalid.
pub fn render(tag: &str, name: &str, args: &[Argument]) -> Result<Vec<Segment>> {
    let mut line = LineBuilder::new();
    line.push(tag.as_bytes());
    line.push(b" ");
    line.push(name.as_bytes());
    for arg in args {
        line.push(b" ");
        arg.encode(&mut line)?;
    }
    Ok(line.finish())
}

fn encode_string(line: &mut LineBuilder, s: &[u8], force_quote: bool) {
    if s.iter().any(|&b| needs_literal(b)) {
        line.push_literal(s);
    } else if force_quote || s.is_empty() || s.iter().any(|&b| needs_quoting(b)) {
        let mut quoted = Vec::with_capacity(s.len() + 2);
        quoted.push(b'"');
        for &b in s {
            if b == b'"' || b == b'\\' {
                quoted.push(b'\\');
            }
            quoted.push(b);
        }
        quoted.push(b'"');
        line.push(&quoted);
    } else {
        line.push(s);
    }
}

/// Returns true if the byte cannot appear in a quoted string.
const fn needs_literal(b: u8) -> bool {
    b == b'\r' || b == b'\n' || b == 0 || b >= 0x80
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b == 0x7F
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn text(segments: &[Segment]) -> Vec<u8> {
        segments
            .iter()
            .flat_map(|s| match s {
                Segment::Text(t) | Segment::Literal(t) => t.clone(),
            })
            .collect()
    }

    #[test]
    fn atom_quoted_and_literal_strings() {
        let segments = render(
            "A1",
            "LOGIN",
            &["user@example.com".into(), "pass word".into()],
        )
        .unwrap();
        assert_eq!(text(&segments), b"A1 LOGIN user@example.com \"pass word\"\r\n");

        let segments = render("A2", "SELECT", &["".into()]).unwrap();
        assert_eq!(text(&segments), b"A2 SELECT \"\"\r\n");

        let segments = render("A3", "SELECT", &["Entw\u{fc}rfe".into()]).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[1], Segment::Literal(d) if d == "Entw\u{fc}rfe".as_bytes()));
    }

    #[test]
    fn quoting_escapes() {
        let segments = render("A1", "X", &[Argument::Quoted("a\"b\\c".to_string())]).unwrap();
        assert_eq!(text(&segments), b"A1 X \"a\\\"b\\\\c\"\r\n");
    }

    #[test]
    fn nested_list_and_nil() {
        let args = [Argument::List(vec![
            Argument::string("name"),
            Argument::Nil,
            Argument::Number(7),
        ])];
        let segments = render("A1", "ID", &args).unwrap();
        assert_eq!(text(&segments), b"A1 ID (name NIL 7)\r\n");
    }

    #[test]
    fn invalid_numbers_fail_before_rendering() {
        for n in [-1, 4_294_967_296] {
            assert!(matches!(
                render("A1", "X", &[Argument::Number(n)]),
                Err(Error::DataFormat(_))
            ));
        }
        assert!(render("A1", "X", &[Argument::Number(4_294_967_295)]).is_ok());
        assert!(render("A1", "X", &[Argument::Number(0)]).is_ok());
    }

    #[test]
    fn bad_atom_and_raw_rejected() {
        assert!(render("A1", "X", &[Argument::atom("a b")]).is_err());
        assert!(render("A1", "X", &[Argument::Raw("x\r\ny".to_string())]).is_err());
    }

    #[test]
    fn flag_list() {
        let segments = render("A1", "X", &[Argument::flags(&[Flag::Seen, Flag::Deleted])]).unwrap();
        assert_eq!(text(&segments), b"A1 X (\\Seen \\Deleted)\r\n");
    }
}
