//! Response codes and UIDPLUS data.

use super::{Capability, Flag, SeqNum, SequenceSet, Uid, UidValidity};
use crate::error::{Error, Result};

/// Bracketed response code carried by a status response or continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// BADCHARSET: unsupported charset, with the supported ones if listed.
    BadCharset(Vec<String>),
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(UidValidity),
    /// UNSEEN: First unseen message sequence number.
    Unseen(SeqNum),
    /// APPENDUID: UIDs assigned to appended messages.
    AppendUid(UidPlusData),
    /// COPYUID: source and destination UIDs of copied messages.
    CopyUid(UidPlusData),
    /// UIDNOTSTICKY: the mailbox does not keep UIDs across sessions.
    UidNotSticky,
    /// HIGHESTMODSEQ: Highest mod-sequence value (CONDSTORE).
    HighestModSeq(u64),
    /// NOMODSEQ: Server doesn't support mod-sequences for this mailbox.
    NoModSeq,
    /// CLOSED: the previously selected mailbox is now closed.
    Closed,
    /// Any other code, as an upper-cased name and its raw argument text.
    Other {
        /// Code name.
        name: String,
        /// Argument text, if any.
        text: Option<String>,
    },
}

impl ResponseCode {
    /// Returns the upper-cased code name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::BadCharset(_) => "BADCHARSET",
            Self::Capability(_) => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::AppendUid(_) => "APPENDUID",
            Self::CopyUid(_) => "COPYUID",
            Self::UidNotSticky => "UIDNOTSTICKY",
            Self::HighestModSeq(_) => "HIGHESTMODSEQ",
            Self::NoModSeq => "NOMODSEQ",
            Self::Closed => "CLOSED",
            Self::Other { name, .. } => name,
        }
    }

    /// Returns the UIDPLUS payload of an APPENDUID or COPYUID code.
    #[must_use]
    pub const fn uid_plus(&self) -> Option<&UidPlusData> {
        match self {
            Self::AppendUid(data) | Self::CopyUid(data) => Some(data),
            _ => None,
        }
    }
}

/// UIDPLUS correlation data (RFC 4315).
///
/// APPENDUID carries no source set; COPYUID carries both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidPlusData {
    /// UIDVALIDITY of the destination mailbox.
    pub uid_validity: UidValidity,
    /// UIDs in the source mailbox (COPYUID only).
    pub source_uids: Option<SequenceSet>,
    /// UIDs assigned in the destination mailbox.
    pub dest_uids: SequenceSet,
}

impl UidPlusData {
    /// Pairs source UIDs with destination UIDs.
    ///
    /// Returns `None` for APPENDUID data, which has no source set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRange`] if the sets have different sizes or
    /// contain `*`.
    pub fn uid_mapping(&self) -> Result<Option<UidMapping>> {
        self.source_uids
            .as_ref()
            .map(|source| UidMapping::pair(source, &self.dest_uids))
            .transpose()
    }
}

/// Ordered mapping from source UID to destination UID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidMapping {
    pairs: Vec<(Uid, Uid)>,
}

impl UidMapping {
    /// Flattens both sets in declared order and zips them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRange`] if the flattened sizes differ or a
    /// set is unbounded.
    pub fn pair(source: &SequenceSet, dest: &SequenceSet) -> Result<Self> {
        if source.count() != dest.count() {
            return Err(Error::MalformedRange(format!(
                "source set {source} and destination set {dest} differ in size"
            )));
        }
        let pairs = source
            .numbers()?
            .into_iter()
            .zip(dest.numbers()?)
            .filter_map(|(s, d)| Some((Uid::new(s)?, Uid::new(d)?)))
            .collect();
        Ok(Self { pairs })
    }

    /// Looks up the destination UID for a source UID.
    #[must_use]
    pub fn get(&self, source: u32) -> Option<Uid> {
        self.pairs
            .iter()
            .find(|(s, _)| s.get() == source)
            .map(|(_, d)| *d)
    }

    /// Iterates pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, Uid)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;

    fn copy_data(source: &str, dest: &str) -> UidPlusData {
        UidPlusData {
            uid_validity: UidValidity::new(38505).unwrap(),
            source_uids: Some(SequenceSet::parse(source).unwrap()),
            dest_uids: SequenceSet::parse(dest).unwrap(),
        }
    }

    #[test]
    fn mapping_zips_in_declared_order() {
        let data = copy_data("20:19,500:495", "92:97,101:100");
        let mapping = data.uid_mapping().unwrap().unwrap();
        let pairs: Vec<(u32, u32)> = mapping.iter().map(|(s, d)| (s.get(), d.get())).collect();
        assert_eq!(
            pairs,
            vec![
                (19, 92),
                (20, 93),
                (495, 94),
                (496, 95),
                (497, 96),
                (498, 97),
                (499, 100),
                (500, 101),
            ]
        );
        assert_eq!(mapping.get(499).unwrap().get(), 100);
        assert!(mapping.get(1).is_none());
    }

    #[test]
    fn mismatched_sizes_are_malformed() {
        let data = copy_data("1:3", "10:11");
        assert!(matches!(data.uid_mapping(), Err(Error::MalformedRange(_))));
    }

    #[test]
    fn unbounded_sets_are_malformed() {
        let data = copy_data("1:*", "10:*");
        assert!(matches!(data.uid_mapping(), Err(Error::MalformedRange(_))));
    }

    #[test]
    fn append_data_has_no_mapping() {
        let data = UidPlusData {
            uid_validity: UidValidity::new(38505).unwrap(),
            source_uids: None,
            dest_uids: SequenceSet::single(3955).unwrap(),
        };
        assert!(data.uid_mapping().unwrap().is_none());
        let code = ResponseCode::AppendUid(data);
        assert_eq!(code.name(), "APPENDUID");
        assert!(code.uid_plus().is_some());
    }

    #[test]
    fn other_code_name() {
        let code = ResponseCode::Other {
            name: "X-GM-THRID".to_string(),
            text: Some("123".to_string()),
        };
        assert_eq!(code.name(), "X-GM-THRID");
        assert!(code.uid_plus().is_none());
    }
}
