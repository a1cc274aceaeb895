//! Sequence sets: the compact `1,5:7,20:*` notation for message ranges.
//!
//! The same codec serves message sequence numbers and UIDs. Encoding keeps
//! the caller's element order and folds consecutive ascending runs into
//! `low:high`. Decoding accepts ranges written in either direction and
//! always stores them ascending.

use std::num::NonZeroU32;
use std::str::FromStr;

use super::identifiers::validate_uid;
use crate::error::{Error, Result};

/// Inclusive range of message numbers with `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeqRange {
    low: NonZeroU32,
    high: NonZeroU32,
}

impl SeqRange {
    /// Creates a range from two endpoints given in either order.
    #[must_use]
    pub fn new(a: NonZeroU32, b: NonZeroU32) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// Lower bound.
    #[must_use]
    pub const fn low(&self) -> u32 {
        self.low.get()
    }

    /// Upper bound.
    #[must_use]
    pub const fn high(&self) -> u32 {
        self.high.get()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> u64 {
        u64::from(self.high.get() - self.low.get()) + 1
    }

    /// Always false; a range holds at least one number.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for SeqRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}:{}", self.low, self.high)
        }
    }
}

/// One comma-separated element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetElement {
    /// A single number or a bounded range.
    Range(SeqRange),
    /// `n:*`, from `n` to the largest number in use.
    From(NonZeroU32),
    /// `*`, the largest number in use.
    Last,
}

impl std::fmt::Display for SetElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range(range) => write!(f, "{range}"),
            Self::From(start) => write!(f, "{start}:*"),
            Self::Last => write!(f, "*"),
        }
    }
}

/// Sequence set for specifying message ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceSet {
    elements: Vec<SetElement>,
}

impl SequenceSet {
    /// Creates a set holding one number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataFormat`] if `n` is not in `1..=4294967295`.
    pub fn single(n: i64) -> Result<Self> {
        let n = validate_uid(n)?;
        Ok(Self::from_element(SetElement::Range(SeqRange::new(n, n))))
    }

    /// Creates a bounded range. The endpoints may be given in either order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataFormat`] if either endpoint is out of range.
    pub fn range(a: i64, b: i64) -> Result<Self> {
        let range = SeqRange::new(validate_uid(a)?, validate_uid(b)?);
        Ok(Self::from_element(SetElement::Range(range)))
    }

    /// Creates the open range `n:*`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataFormat`] if `n` is out of range.
    pub fn range_from(n: i64) -> Result<Self> {
        Ok(Self::from_element(SetElement::From(validate_uid(n)?)))
    }

    /// The set `1:*`.
    #[must_use]
    pub fn all() -> Self {
        Self::from_element(SetElement::From(NonZeroU32::MIN))
    }

    /// The set `*`.
    #[must_use]
    pub fn last() -> Self {
        Self::from_element(SetElement::Last)
    }

    /// Encodes a list of numbers, folding ascending runs into ranges.
    ///
    /// Order is preserved: `[3, 1, 2]` encodes as `3,1:2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataFormat`] if the list is empty or any number is
    /// out of range.
    pub fn from_numbers<I>(numbers: I) -> Result<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut elements = Vec::new();
        let mut run: Option<(NonZeroU32, NonZeroU32)> = None;

        for n in numbers {
            let n = validate_uid(n)?;
            run = match run {
                Some((start, end)) if end.checked_add(1) == Some(n) => Some((start, n)),
                Some((start, end)) => {
                    elements.push(SetElement::Range(SeqRange::new(start, end)));
                    Some((n, n))
                }
                None => Some((n, n)),
            };
        }

        let Some((start, end)) = run else {
            return Err(Error::DataFormat("empty sequence set".to_string()));
        };
        elements.push(SetElement::Range(SeqRange::new(start, end)));
        Ok(Self { elements })
    }

    /// Decodes set notation such as `20:19,500:495`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRange`] on syntax errors and
    /// [`Error::DataFormat`] when a number is out of range.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::MalformedRange("empty sequence set".to_string()));
        }
        let elements = s
            .split(',')
            .map(parse_element)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { elements })
    }

    fn from_element(element: SetElement) -> Self {
        Self {
            elements: vec![element],
        }
    }

    /// Appends the elements of `other`, keeping order.
    pub fn extend(&mut self, other: &Self) {
        self.elements.extend_from_slice(&other.elements);
    }

    /// Returns the elements in declared order.
    #[must_use]
    pub fn elements(&self) -> &[SetElement] {
        &self.elements
    }

    /// Returns true if the set contains `*` in any position.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, SetElement::From(_) | SetElement::Last))
    }

    /// Counts the members, or `None` if the set is unbounded.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.elements.iter().try_fold(0u64, |acc, e| match e {
            SetElement::Range(range) => Some(acc + range.len()),
            SetElement::From(_) | SetElement::Last => None,
        })
    }

    /// Returns true if `n` is a member. A bare `*` matches nothing.
    #[must_use]
    pub fn contains(&self, n: u32) -> bool {
        self.elements.iter().any(|e| match e {
            SetElement::Range(range) => range.low() <= n && n <= range.high(),
            SetElement::From(start) => n >= start.get(),
            SetElement::Last => false,
        })
    }

    /// Flattens the set to individual numbers in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRange`] if the set contains `*`.
    pub fn numbers(&self) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for element in &self.elements {
            match element {
                SetElement::Range(range) => out.extend(range.low()..=range.high()),
                SetElement::From(_) | SetElement::Last => {
                    return Err(Error::MalformedRange(format!(
                        "cannot enumerate unbounded set {self}"
                    )));
                }
            }
        }
        Ok(out)
    }
}

fn parse_element(s: &str) -> Result<SetElement> {
    match s.split_once(':') {
        None if s == "*" => Ok(SetElement::Last),
        None => {
            let n = parse_member(s)?;
            Ok(SetElement::Range(SeqRange::new(n, n)))
        }
        Some(("*", "*")) => Ok(SetElement::Last),
        Some((n, "*") | ("*", n)) => Ok(SetElement::From(parse_member(n)?)),
        Some((a, b)) => Ok(SetElement::Range(SeqRange::new(
            parse_member(a)?,
            parse_member(b)?,
        ))),
    }
}

fn parse_member(s: &str) -> Result<NonZeroU32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedRange(format!("invalid set member {s:?}")));
    }
    let n: i64 = s
        .parse()
        .map_err(|_| Error::DataFormat(format!("number out of range: {s}")))?;
    validate_uid(n)
}

impl FromStr for SequenceSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}
