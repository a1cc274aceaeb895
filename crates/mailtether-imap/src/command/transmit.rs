//! Outgoing command data and the literal continuation sub-protocol.
//!
//! A command renders to alternating text and literal segments. Each text
//! segment that precedes a literal ends with its `{n}\r\n` marker; the last
//! text segment ends with the command's CRLF. [`Transmission`] turns the
//! segments into the ordered steps the dispatcher performs:
//!
//! ```text
//! Write(text) → AwaitContinuation → Write(literal) → Write(text) → ...
//! ```
//!
//! It does no I/O itself, so the order can be tested without a socket.

#![allow(clippy::missing_const_for_fn)]

/// A piece of a rendered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Line text, written as-is.
    Text(Vec<u8>),
    /// Raw literal bytes, written only after a continuation request.
    Literal(Vec<u8>),
}

impl Segment {
    /// Returns the bytes of this segment.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Text(b) | Self::Literal(b) => b,
        }
    }
}

/// Accumulates a command line, cutting a new segment at each literal.
#[derive(Debug, Default)]
pub struct LineBuilder {
    segments: Vec<Segment>,
    current: Vec<u8>,
}

impl LineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends line text.
    pub fn push(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    /// Appends a `{n}` marker and the literal that follows it.
    pub fn push_literal(&mut self, data: &[u8]) {
        self.current
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.segments
            .push(Segment::Text(std::mem::take(&mut self.current)));
        self.segments.push(Segment::Literal(data.to_vec()));
    }

    /// Terminates the line with CRLF and returns the segments.
    #[must_use]
    pub fn finish(mut self) -> Vec<Segment> {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(Segment::Text(self.current));
        self.segments
    }
}

/// One step of sending a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    /// Write these bytes.
    Write(&'a [u8]),
    /// Wait for a `+` continuation before going on.
    AwaitContinuation,
}

/// Drives the segments of one command through the continuation protocol.
#[derive(Debug)]
pub struct Transmission {
    segments: Vec<Segment>,
    next: usize,
    continued: bool,
}

impl Transmission {
    /// Creates a transmission over rendered segments.
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            next: 0,
            continued: false,
        }
    }

    /// Returns the next step, or `None` when the command is fully written.
    pub fn next_step(&mut self) -> Option<Step<'_>> {
        match self.segments.get(self.next)? {
            Segment::Text(bytes) => {
                self.next += 1;
                Some(Step::Write(bytes))
            }
            Segment::Literal(_) if !self.continued => {
                self.continued = true;
                Some(Step::AwaitContinuation)
            }
            Segment::Literal(bytes) => {
                self.continued = false;
                self.next += 1;
                Some(Step::Write(bytes))
            }
        }
    }

    /// Returns true if the command carries at least one literal.
    #[must_use]
    pub fn has_literal(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Literal(_)))
    }

    /// Returns the command text with literal payloads and LOGIN
    /// credentials elided, for tracing.
    #[must_use]
    pub fn redacted(&self) -> String {
        if let Some(Segment::Text(first)) = self.segments.first() {
            let mut words = first.splitn(3, |&b| b == b' ');
            if let (Some(tag), Some(name), Some(_)) = (words.next(), words.next(), words.next())
                && name.eq_ignore_ascii_case(b"LOGIN")
            {
                return format!("{} LOGIN <credentials>", String::from_utf8_lossy(tag));
            }
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
                Segment::Literal(bytes) => out.push_str(&format!("<{} bytes>", bytes.len())),
            }
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::command::argument::{Argument, render};

    fn steps(transmission: &mut Transmission) -> Vec<Option<Vec<u8>>> {
        let mut out = Vec::new();
        while let Some(step) = transmission.next_step() {
            out.push(match step {
                Step::Write(bytes) => Some(bytes.to_vec()),
                Step::AwaitContinuation => None,
            });
        }
        out
    }

    #[test]
    fn plain_command_is_one_write() {
        let segments = render("A0001", "NOOP", &[]).unwrap();
        let mut transmission = Transmission::new(segments);
        assert!(!transmission.has_literal());
        assert_eq!(steps(&mut transmission), vec![Some(b"A0001 NOOP\r\n".to_vec())]);
    }

    #[test]
    fn literal_inside_list() {
        let args = [Argument::List(vec![Argument::Literal(vec![
            0xDE, 0xAD, 0xBE, 0xEF,
        ])])];
        let segments = render("A0001", "TEST", &args).unwrap();
        let mut transmission = Transmission::new(segments);
        assert_eq!(
            steps(&mut transmission),
            vec![
                Some(b"A0001 TEST ({4}\r\n".to_vec()),
                None,
                Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
                Some(b")\r\n".to_vec()),
            ]
        );
    }

    #[test]
    fn two_literals_wait_twice() {
        let args = [Argument::Literal(b"a".to_vec()), Argument::Literal(b"bc".to_vec())];
        let segments = render("T1", "X", &args).unwrap();
        let mut transmission = Transmission::new(segments);
        let written = steps(&mut transmission);
        assert_eq!(written.iter().filter(|s| s.is_none()).count(), 2);
        assert_eq!(written[0].as_deref(), Some(&b"T1 X {1}\r\n"[..]));
        assert_eq!(written[3].as_deref(), Some(&b" {2}\r\n"[..]));
        assert_eq!(written.last().unwrap().as_deref(), Some(&b"\r\n"[..]));
    }

    #[test]
    fn redacted_hides_payload() {
        let segments = render("T1", "APPEND", &["INBOX".into(), Argument::Literal(b"secret".to_vec())]).unwrap();
        let transmission = Transmission::new(segments);
        assert_eq!(transmission.redacted(), "T1 APPEND INBOX {6}\r\n<6 bytes>");
    }

    #[test]
    fn redacted_hides_login_credentials() {
        let mut line = LineBuilder::new();
        line.push(b"A0001 LOGIN alice hunter2");
        let transmission = Transmission::new(line.finish());
        assert_eq!(transmission.redacted(), "A0001 LOGIN <credentials>");

        let mut line = LineBuilder::new();
        line.push(b"A0002 login alice ");
        line.push_literal(b"pass\r\nword");
        let transmission = Transmission::new(line.finish());
        let redacted = transmission.redacted();
        assert_eq!(redacted, "A0002 LOGIN <credentials>");
        assert!(!redacted.contains("alice"));
    }

    proptest! {
        #[test]
        fn literal_bytes_are_exact(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let segments = render("T1", "X", &[Argument::Literal(data.clone())]).unwrap();
            let mut transmission = Transmission::new(segments);
            let mut wire = Vec::new();
            while let Some(step) = transmission.next_step() {
                if let Step::Write(bytes) = step {
                    wire.extend_from_slice(bytes);
                }
            }
            let mut expected = format!("T1 X {{{}}}\r\n", data.len()).into_bytes();
            expected.extend_from_slice(&data);
            expected.extend_from_slice(b"\r\n");
            prop_assert_eq!(wire, expected);
        }
    }
}
