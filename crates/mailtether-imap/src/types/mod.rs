//! Core IMAP types.
//!
//! This module defines the fundamental types used throughout the engine,
//! following RFC 3501 (`IMAP4rev1`) and the extensions the parser understands.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, Status};
pub use flags::Flag;
pub use identifiers::{SeqNum, Tag, Uid, UidValidity, validate_number, validate_uid};
pub use mailbox::{
    AclEntry, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, Namespace, Namespaces,
    StatusItem,
};
pub use response_code::{ResponseCode, UidMapping, UidPlusData};
pub use sequence::{SeqRange, SequenceSet, SetElement};
