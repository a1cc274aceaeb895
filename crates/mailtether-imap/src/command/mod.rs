//! IMAP command builder.
//!
//! A [`Command`] lowers to a name and an ordered [`Argument`] list; the
//! arguments are validated and rendered into [`Segment`]s, and the
//! connection walks those segments with a [`Transmission`].

mod argument;
mod authenticate;
mod tag_generator;
mod transmit;
mod types;

use crate::error::Result;
use crate::types::{Flag, Mailbox, SequenceSet};

pub use argument::{Argument, render};
pub use authenticate::{Authenticator, PlainAuthenticator, XOAuth2Authenticator};
pub use tag_generator::{DEFAULT_TAG_PREFIX, TagGenerator};
pub use transmit::{Segment, Step, Transmission};
pub use types::{FetchAttribute, FetchItems, StatusAttribute, StoreAction};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
    },

    // Authenticated State Commands
    /// ID command (RFC 2971).
    Id {
        /// Field-value pairs; `None` sends `ID NIL`.
        parameters: Option<Vec<(String, String)>>,
    },
    /// ENABLE command.
    Enable {
        /// Capabilities to enable.
        capabilities: Vec<String>,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
        /// Enable CONDSTORE.
        condstore: bool,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: Mailbox,
        /// New mailbox name.
        to: Mailbox,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: Mailbox,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// XLIST command (Gmail).
    Xlist {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// NAMESPACE command.
    Namespace,
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command. The message always travels as a literal.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set; omitted when empty.
        flags: Vec<Flag>,
        /// Internal date, e.g. `17-Jul-1996 02:44:25 -0700`.
        date: Option<String>,
        /// Message data.
        message: Vec<u8>,
    },
    /// GETACL command (RFC 4314).
    GetAcl {
        /// Mailbox name.
        mailbox: Mailbox,
    },
    /// SETACL command (RFC 4314).
    SetAcl {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Identifier the rights apply to.
        user: String,
        /// Rights string, e.g. `lrswi`.
        rights: String,
    },

    // Selected State Commands
    /// CHECK command.
    Check,
    /// CLOSE command.
    Close,
    /// UNSELECT command.
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315).
    UidExpunge {
        /// UIDs to expunge.
        uids: SequenceSet,
    },
    /// SEARCH command.
    Search {
        /// Search keys, rendered in order.
        criteria: Vec<Argument>,
        /// Optional `CHARSET` specification.
        charset: Option<String>,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: SequenceSet,
        /// Items to fetch.
        items: FetchItems,
        /// Use UIDs.
        uid: bool,
    },
    /// STORE command.
    Store {
        /// Sequence set.
        sequence: SequenceSet,
        /// How the flags are applied.
        action: StoreAction,
        /// Flags to apply.
        flags: Vec<Flag>,
        /// Silent mode (no FETCH response).
        silent: bool,
        /// Use UIDs.
        uid: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: Mailbox,
        /// Use UIDs.
        uid: bool,
    },
    /// MOVE command (RFC 6851).
    Move {
        /// Sequence set.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: Mailbox,
        /// Use UIDs.
        uid: bool,
    },
    /// IDLE command.
    Idle,
}

impl Command {
    /// Returns the command name as written on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Id { .. } => "ID",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Xlist { .. } => "XLIST",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::GetAcl { .. } => "GETACL",
            Self::SetAcl { .. } => "SETACL",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch { uid: false, .. } => "FETCH",
            Self::Fetch { uid: true, .. } => "UID FETCH",
            Self::Store { uid: false, .. } => "STORE",
            Self::Store { uid: true, .. } => "UID STORE",
            Self::Copy { uid: false, .. } => "COPY",
            Self::Copy { uid: true, .. } => "UID COPY",
            Self::Move { uid: false, .. } => "MOVE",
            Self::Move { uid: true, .. } => "UID MOVE",
            Self::Idle => "IDLE",
        }
    }

    /// Returns the argument list of this command.
    #[must_use]
    pub fn arguments(&self) -> Vec<Argument> {
        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Check
            | Self::Close
            | Self::Unselect
            | Self::Expunge
            | Self::Idle => Vec::new(),

            Self::Login { username, password } => {
                vec![username.as_str().into(), password.as_str().into()]
            }
            Self::Authenticate { mechanism } => vec![Argument::atom(mechanism.as_str())],

            Self::Id { parameters } => vec![match parameters {
                Some(params) => Argument::List(
                    params
                        .iter()
                        .flat_map(|(k, v)| {
                            [Argument::Quoted(k.clone()), Argument::Quoted(v.clone())]
                        })
                        .collect(),
                ),
                None => Argument::Nil,
            }],
            Self::Enable { capabilities } => capabilities
                .iter()
                .map(|c| Argument::atom(c.as_str()))
                .collect(),

            Self::Select { mailbox, condstore } => {
                let mut args = vec![mailbox.into()];
                if *condstore {
                    args.push(Argument::List(vec![Argument::atom("CONDSTORE")]));
                }
                args
            }
            Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox }
            | Self::GetAcl { mailbox } => vec![mailbox.into()],
            Self::Rename { from, to } => vec![from.into(), to.into()],
            Self::List { reference, pattern }
            | Self::Lsub { reference, pattern }
            | Self::Xlist { reference, pattern } => {
                vec![reference.as_str().into(), pattern.as_str().into()]
            }
            Self::Status { mailbox, items } => vec![
                mailbox.into(),
                Argument::List(items.iter().map(|i| Argument::atom(i.as_str())).collect()),
            ],
            Self::Append {
                mailbox,
                flags,
                date,
                message,
            } => {
                let mut args = vec![mailbox.into()];
                if !flags.is_empty() {
                    args.push(Argument::flags(flags));
                }
                if let Some(date) = date {
                    args.push(Argument::Quoted(date.clone()));
                }
                args.push(Argument::Literal(message.clone()));
                args
            }
            Self::SetAcl {
                mailbox,
                user,
                rights,
            } => vec![mailbox.into(), user.as_str().into(), rights.as_str().into()],

            Self::UidExpunge { uids } => vec![Argument::Set(uids.clone())],
            Self::Search {
                criteria, charset, ..
            } => {
                let mut args = Vec::with_capacity(criteria.len() + 2);
                if let Some(charset) = charset {
                    args.push(Argument::atom("CHARSET"));
                    args.push(charset.as_str().into());
                }
                args.extend(criteria.iter().cloned());
                args
            }
            Self::Fetch {
                sequence, items, ..
            } => vec![Argument::Set(sequence.clone()), items.to_argument()],
            Self::Store {
                sequence,
                action,
                flags,
                silent,
                ..
            } => vec![
                Argument::Set(sequence.clone()),
                Argument::Raw(action.item_name(*silent)),
                Argument::flags(flags),
            ],
            Self::Copy {
                sequence, mailbox, ..
            }
            | Self::Move {
                sequence, mailbox, ..
            } => vec![Argument::Set(sequence.clone()), mailbox.into()],
        }
    }

    /// Renders the command with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DataFormat`] if an argument is out of range
    /// or malformed; nothing has been written at that point.
    pub fn render(&self, tag: &str) -> Result<Vec<Segment>> {
        render(tag, self.name(), &self.arguments())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    fn wire(cmd: &Command) -> Vec<u8> {
        cmd.render("A001")
            .unwrap()
            .iter()
            .flat_map(|s| s.bytes().to_vec())
            .collect()
    }

    #[test]
    fn test_capability_command() {
        assert_eq!(wire(&Command::Capability), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_quoted() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        assert_eq!(
            wire(&cmd),
            b"A001 LOGIN user@example.com \"pass word\"\r\n"
        );
    }

    #[test]
    fn test_select_condstore() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("INBOX"),
            condstore: true,
        };
        assert_eq!(wire(&cmd), b"A001 SELECT INBOX (CONDSTORE)\r\n");
    }

    #[test]
    fn test_list_command() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(wire(&cmd), b"A001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_uid_fetch_command() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::range(1, 10).unwrap(),
            items: FetchItems::Items(vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::BodySection {
                    section: Some("HEADER".to_string()),
                    peek: true,
                    partial: None,
                },
            ]),
            uid: true,
        };
        assert_eq!(
            wire(&cmd),
            b"A001 UID FETCH 1:10 (UID FLAGS BODY.PEEK[HEADER])\r\n"
        );
    }

    #[test]
    fn test_fetch_partial_single_item() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::single(3).unwrap(),
            items: FetchItems::Items(vec![FetchAttribute::BodySection {
                section: None,
                peek: false,
                partial: Some((0, 1024)),
            }]),
            uid: false,
        };
        assert_eq!(wire(&cmd), b"A001 FETCH 3 BODY[]<0.1024>\r\n");
    }

    #[test]
    fn test_store_command() {
        let cmd = Command::Store {
            sequence: SequenceSet::single(1).unwrap(),
            action: StoreAction::Add,
            flags: vec![Flag::Seen],
            silent: true,
            uid: false,
        };
        assert_eq!(wire(&cmd), b"A001 STORE 1 +FLAGS.SILENT (\\Seen)\r\n");
    }

    #[test]
    fn test_search_with_charset() {
        let cmd = Command::Search {
            criteria: vec![Argument::atom("SUBJECT"), "hello world".into()],
            charset: Some("UTF-8".to_string()),
            uid: true,
        };
        assert_eq!(
            wire(&cmd),
            b"A001 UID SEARCH CHARSET UTF-8 SUBJECT \"hello world\"\r\n"
        );
    }

    #[test]
    fn test_append_sends_literal() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Sent"),
            flags: vec![Flag::Seen],
            date: Some("17-Jul-1996 02:44:25 -0700".to_string()),
            message: b"Subject: hi\r\n\r\nbody".to_vec(),
        };
        let segments = cmd.render("A001").unwrap();
        assert_eq!(
            segments[0].bytes(),
            b"A001 APPEND Sent (\\Seen) \"17-Jul-1996 02:44:25 -0700\" {19}\r\n"
        );
        assert!(matches!(&segments[1], Segment::Literal(d) if d.len() == 19));
        assert_eq!(segments[2].bytes(), b"\r\n");
    }

    #[test]
    fn test_id_command() {
        assert_eq!(wire(&Command::Id { parameters: None }), b"A001 ID NIL\r\n");
        let cmd = Command::Id {
            parameters: Some(vec![("name".to_string(), "mailtether".to_string())]),
        };
        assert_eq!(wire(&cmd), b"A001 ID (\"name\" \"mailtether\")\r\n");
    }

    #[test]
    fn test_uid_expunge_and_copy() {
        let uids = SequenceSet::parse("3000:3002").unwrap();
        assert_eq!(
            wire(&Command::UidExpunge { uids: uids.clone() }),
            b"A001 UID EXPUNGE 3000:3002\r\n"
        );
        let cmd = Command::Copy {
            sequence: uids,
            mailbox: Mailbox::new("Archive"),
            uid: true,
        };
        assert_eq!(wire(&cmd), b"A001 UID COPY 3000:3002 Archive\r\n");
    }

    #[test]
    fn test_status_and_setacl() {
        let cmd = Command::Status {
            mailbox: Mailbox::new("INBOX"),
            items: vec![StatusAttribute::Messages, StatusAttribute::UidNext],
        };
        assert_eq!(wire(&cmd), b"A001 STATUS INBOX (MESSAGES UIDNEXT)\r\n");
        let cmd = Command::SetAcl {
            mailbox: Mailbox::new("INBOX"),
            user: "fred".to_string(),
            rights: "lrswi".to_string(),
        };
        assert_eq!(wire(&cmd), b"A001 SETACL INBOX fred lrswi\r\n");
    }

    #[test]
    fn test_idle_command() {
        assert_eq!(wire(&Command::Idle), b"A001 IDLE\r\n");
    }
}
