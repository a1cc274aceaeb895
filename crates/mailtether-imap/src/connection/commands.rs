//! Typed command helpers on [`Connection`].
//!
//! Each helper sends one command and returns the data the server reported
//! for it. Untagged data of the collected kind is taken out of the
//! response store; everything else stays there.

#![allow(clippy::missing_errors_doc)]

use super::client::{Collect, Connection, Exchange, check_status};
use super::state::CommandKind;
use crate::command::{Argument, Command, FetchItems, StatusAttribute, StoreAction};
use crate::parser::{FetchItem, IdParams, TaggedResponse, UntaggedResponse};
use crate::types::{
    AclEntry, Capability, Flag, ListResponse, Mailbox, MailboxStatus, Namespaces, SeqNum,
    SequenceSet, UidPlusData,
};
use crate::Result;

/// FETCH data for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Message sequence number.
    pub seq: SeqNum,
    /// Data items in server order.
    pub items: Vec<FetchItem>,
}

impl Fetched {
    /// Returns the UID, if it was fetched.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Uid(uid) => Some(uid.get()),
            _ => None,
        })
    }

    /// Returns the flags, if they were fetched.
    #[must_use]
    pub fn flags(&self) -> Option<&[Flag]> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Flags(flags) => Some(flags.as_slice()),
            _ => None,
        })
    }
}

impl Connection {
    async fn run(&self, command: &Command, collect: Collect<'_>) -> Result<Exchange> {
        let kind = match command {
            Command::Login { .. } => CommandKind::Login,
            Command::Select { .. } | Command::Examine { .. } => CommandKind::Select,
            _ => CommandKind::Normal,
        };
        let exchange = self
            .exchange(command.name(), &command.arguments(), kind, collect)
            .await?;
        Ok(Exchange {
            tagged: check_status(exchange.tagged)?,
            data: exchange.data,
        })
    }

    async fn simple(&self, command: Command) -> Result<TaggedResponse> {
        Ok(self.run(&command, Collect::Nothing).await?.tagged)
    }

    /// Sends CAPABILITY and returns the announced capabilities.
    pub async fn capability(&self) -> Result<Vec<Capability>> {
        let exchange = self.run(&Command::Capability, Collect::All("CAPABILITY")).await?;
        Ok(exchange
            .data
            .into_iter()
            .rev()
            .find_map(|response| match response {
                UntaggedResponse::Capability(caps) => Some(caps),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Sends NOOP.
    pub async fn noop(&self) -> Result<TaggedResponse> {
        self.simple(Command::Noop).await
    }

    /// Logs in with a plaintext password.
    pub async fn login(&self, username: &str, password: &str) -> Result<TaggedResponse> {
        self.simple(Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Sends ENABLE and returns what the server enabled.
    pub async fn enable(&self, capabilities: &[&str]) -> Result<Vec<Capability>> {
        let command = Command::Enable {
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
        };
        let exchange = self.run(&command, Collect::All("ENABLED")).await?;
        Ok(exchange
            .data
            .into_iter()
            .flat_map(|response| match response {
                UntaggedResponse::Enabled(caps) => caps,
                _ => Vec::new(),
            })
            .collect())
    }

    /// Sends ID. Returns the server's identification, or `None` when the
    /// server sent `ID NIL` or omitted the untagged ID response.
    pub async fn id(&self, parameters: Option<&[(&str, &str)]>) -> Result<Option<IdParams>> {
        let command = Command::Id {
            parameters: parameters.map(|params| {
                params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect()
            }),
        };
        let exchange = self.run(&command, Collect::All("ID")).await?;
        Ok(exchange
            .data
            .into_iter()
            .rev()
            .find_map(|response| match response {
                UntaggedResponse::Id(params) => Some(params),
                _ => None,
            })
            .flatten())
    }

    /// Selects a mailbox. The response store is cleared first, so the
    /// FLAGS, EXISTS and OK data it holds afterwards describe this mailbox.
    pub async fn select(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Select {
            mailbox: Mailbox::new(mailbox),
            condstore: false,
        })
        .await
    }

    /// Opens a mailbox read-only.
    pub async fn examine(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Examine {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// Creates a mailbox.
    pub async fn create(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Create {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// Deletes a mailbox.
    pub async fn delete(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Delete {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// Renames a mailbox.
    pub async fn rename(&self, from: &str, to: &str) -> Result<TaggedResponse> {
        self.simple(Command::Rename {
            from: Mailbox::new(from),
            to: Mailbox::new(to),
        })
        .await
    }

    /// Subscribes to a mailbox.
    pub async fn subscribe(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Subscribe {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// Unsubscribes from a mailbox.
    pub async fn unsubscribe(&self, mailbox: &str) -> Result<TaggedResponse> {
        self.simple(Command::Unsubscribe {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// Lists mailboxes matching `pattern`.
    pub async fn list(&self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let exchange = self.run(&command, Collect::All("LIST")).await?;
        Ok(list_data(exchange.data))
    }

    /// Lists subscribed mailboxes matching `pattern`.
    pub async fn lsub(&self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::Lsub {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let exchange = self.run(&command, Collect::All("LSUB")).await?;
        Ok(list_data(exchange.data))
    }

    /// Lists mailboxes with Gmail's XLIST.
    pub async fn xlist(&self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::Xlist {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let exchange = self.run(&command, Collect::All("XLIST")).await?;
        Ok(list_data(exchange.data))
    }

    /// Sends NAMESPACE.
    pub async fn namespace(&self) -> Result<Option<Namespaces>> {
        let exchange = self.run(&Command::Namespace, Collect::All("NAMESPACE")).await?;
        Ok(exchange
            .data
            .into_iter()
            .rev()
            .find_map(|response| match response {
                UntaggedResponse::Namespace(ns) => Some(ns),
                _ => None,
            }))
    }

    /// Requests the status of a mailbox.
    pub async fn status(
        &self,
        mailbox: &str,
        items: &[StatusAttribute],
    ) -> Result<Option<MailboxStatus>> {
        let command = Command::Status {
            mailbox: Mailbox::new(mailbox),
            items: items.to_vec(),
        };
        let exchange = self.run(&command, Collect::All("STATUS")).await?;
        Ok(exchange
            .data
            .into_iter()
            .rev()
            .find_map(|response| match response {
                UntaggedResponse::Status(status) => Some(status),
                _ => None,
            }))
    }

    /// Appends a message. Returns the APPENDUID data if the server
    /// supports UIDPLUS.
    pub async fn append(
        &self,
        mailbox: &str,
        message: &[u8],
        flags: &[Flag],
        date: Option<&str>,
    ) -> Result<Option<UidPlusData>> {
        let command = Command::Append {
            mailbox: Mailbox::new(mailbox),
            flags: flags.to_vec(),
            date: date.map(ToString::to_string),
            message: message.to_vec(),
        };
        let tagged = self.simple(command).await?;
        Ok(uid_plus(&tagged))
    }

    /// Reads the ACL of a mailbox.
    pub async fn get_acl(&self, mailbox: &str) -> Result<Vec<AclEntry>> {
        let command = Command::GetAcl {
            mailbox: Mailbox::new(mailbox),
        };
        let exchange = self.run(&command, Collect::All("ACL")).await?;
        Ok(exchange
            .data
            .into_iter()
            .flat_map(|response| match response {
                UntaggedResponse::Acl(entries) => entries,
                _ => Vec::new(),
            })
            .collect())
    }

    /// Sets the rights of `user` on a mailbox.
    pub async fn set_acl(&self, mailbox: &str, user: &str, rights: &str) -> Result<TaggedResponse> {
        self.simple(Command::SetAcl {
            mailbox: Mailbox::new(mailbox),
            user: user.to_string(),
            rights: rights.to_string(),
        })
        .await
    }

    /// Sends CHECK.
    pub async fn check(&self) -> Result<TaggedResponse> {
        self.simple(Command::Check).await
    }

    /// Closes the selected mailbox, expunging deleted messages.
    pub async fn close(&self) -> Result<TaggedResponse> {
        self.simple(Command::Close).await
    }

    /// Closes the selected mailbox without expunging.
    pub async fn unselect(&self) -> Result<TaggedResponse> {
        self.simple(Command::Unselect).await
    }

    /// Expunges deleted messages and returns the expunged sequence numbers.
    pub async fn expunge(&self) -> Result<Vec<SeqNum>> {
        let exchange = self.run(&Command::Expunge, Collect::All("EXPUNGE")).await?;
        Ok(expunged(exchange.data))
    }

    /// Expunges the given UIDs (UIDPLUS) and returns the expunged sequence
    /// numbers in the order the server reported them.
    pub async fn uid_expunge(&self, uids: &SequenceSet) -> Result<Vec<SeqNum>> {
        let command = Command::UidExpunge { uids: uids.clone() };
        let exchange = self.run(&command, Collect::All("EXPUNGE")).await?;
        Ok(expunged(exchange.data))
    }

    /// Searches by sequence number.
    pub async fn search(&self, criteria: &[Argument]) -> Result<Vec<u32>> {
        self.search_with(criteria, None, false).await
    }

    /// Searches by UID.
    pub async fn uid_search(&self, criteria: &[Argument]) -> Result<Vec<u32>> {
        self.search_with(criteria, None, true).await
    }

    /// Searches with an explicit CHARSET.
    pub async fn search_with(
        &self,
        criteria: &[Argument],
        charset: Option<&str>,
        uid: bool,
    ) -> Result<Vec<u32>> {
        let command = Command::Search {
            criteria: criteria.to_vec(),
            charset: charset.map(ToString::to_string),
            uid,
        };
        let exchange = self.run(&command, Collect::All("SEARCH")).await?;
        Ok(exchange
            .data
            .into_iter()
            .rev()
            .find_map(|response| match response {
                UntaggedResponse::Search { ids, .. } => Some(ids),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Fetches message data by sequence number.
    pub async fn fetch(&self, sequence: &SequenceSet, items: FetchItems) -> Result<Vec<Fetched>> {
        self.fetch_with(sequence, items, false).await
    }

    /// Fetches message data by UID.
    pub async fn uid_fetch(&self, uids: &SequenceSet, items: FetchItems) -> Result<Vec<Fetched>> {
        self.fetch_with(uids, items, true).await
    }

    async fn fetch_with(
        &self,
        sequence: &SequenceSet,
        items: FetchItems,
        uid: bool,
    ) -> Result<Vec<Fetched>> {
        let command = Command::Fetch {
            sequence: sequence.clone(),
            items,
            uid,
        };
        let exchange = self.run(&command, Collect::All("FETCH")).await?;
        Ok(fetched(exchange.data))
    }

    /// Changes flags by sequence number and returns the resulting FETCH data.
    pub async fn store(
        &self,
        sequence: &SequenceSet,
        action: StoreAction,
        flags: &[Flag],
    ) -> Result<Vec<Fetched>> {
        self.store_with(sequence, action, flags, false).await
    }

    /// Changes flags by UID and returns the resulting FETCH data.
    pub async fn uid_store(
        &self,
        uids: &SequenceSet,
        action: StoreAction,
        flags: &[Flag],
    ) -> Result<Vec<Fetched>> {
        self.store_with(uids, action, flags, true).await
    }

    async fn store_with(
        &self,
        sequence: &SequenceSet,
        action: StoreAction,
        flags: &[Flag],
        uid: bool,
    ) -> Result<Vec<Fetched>> {
        let command = Command::Store {
            sequence: sequence.clone(),
            action,
            flags: flags.to_vec(),
            silent: false,
            uid,
        };
        let exchange = self.run(&command, Collect::All("FETCH")).await?;
        Ok(fetched(exchange.data))
    }

    /// Copies messages by sequence number. Returns COPYUID data if present.
    pub async fn copy(&self, sequence: &SequenceSet, mailbox: &str) -> Result<Option<UidPlusData>> {
        self.transfer(sequence, mailbox, false, false).await
    }

    /// Copies messages by UID. Returns COPYUID data if present.
    pub async fn uid_copy(&self, uids: &SequenceSet, mailbox: &str) -> Result<Option<UidPlusData>> {
        self.transfer(uids, mailbox, true, false).await
    }

    /// Moves messages by sequence number (RFC 6851).
    pub async fn move_messages(
        &self,
        sequence: &SequenceSet,
        mailbox: &str,
    ) -> Result<Option<UidPlusData>> {
        self.transfer(sequence, mailbox, false, true).await
    }

    /// Moves messages by UID (RFC 6851).
    pub async fn uid_move(&self, uids: &SequenceSet, mailbox: &str) -> Result<Option<UidPlusData>> {
        self.transfer(uids, mailbox, true, true).await
    }

    async fn transfer(
        &self,
        sequence: &SequenceSet,
        mailbox: &str,
        uid: bool,
        remove: bool,
    ) -> Result<Option<UidPlusData>> {
        let sequence = sequence.clone();
        let mailbox = Mailbox::new(mailbox);
        let command = if remove {
            Command::Move {
                sequence,
                mailbox,
                uid,
            }
        } else {
            Command::Copy {
                sequence,
                mailbox,
                uid,
            }
        };
        // MOVE reports COPYUID in an untagged OK before the tagged one.
        let collect = if remove { Collect::UidPlus } else { Collect::Nothing };
        let exchange = self.run(&command, collect).await?;
        if let Some(data) = uid_plus(&exchange.tagged) {
            return Ok(Some(data));
        }
        Ok(exchange.data.iter().rev().find_map(|response| {
            response
                .status_text()
                .and_then(|text| text.code.as_ref())
                .and_then(|code| code.uid_plus().cloned())
        }))
    }
}

fn uid_plus(tagged: &TaggedResponse) -> Option<UidPlusData> {
    tagged.code().and_then(|code| code.uid_plus().cloned())
}

fn list_data(data: Vec<UntaggedResponse>) -> Vec<ListResponse> {
    data.into_iter()
        .filter_map(|response| match response {
            UntaggedResponse::List(list)
            | UntaggedResponse::Lsub(list)
            | UntaggedResponse::Xlist(list) => Some(list),
            _ => None,
        })
        .collect()
}

fn expunged(data: Vec<UntaggedResponse>) -> Vec<SeqNum> {
    data.into_iter()
        .filter_map(|response| match response {
            UntaggedResponse::Expunge(seq) => Some(seq),
            _ => None,
        })
        .collect()
}

fn fetched(data: Vec<UntaggedResponse>) -> Vec<Fetched> {
    data.into_iter()
        .filter_map(|response| match response {
            UntaggedResponse::Fetch { seq, items } => Some(Fetched { seq, items }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Uid;

    #[test]
    fn fetched_accessors() {
        let fetched = Fetched {
            seq: SeqNum::new(1).unwrap(),
            items: vec![
                FetchItem::Uid(Uid::new(42).unwrap()),
                FetchItem::Flags(vec![Flag::Seen]),
            ],
        };
        assert_eq!(fetched.uid(), Some(42));
        assert_eq!(fetched.flags(), Some(&[Flag::Seen][..]));
    }

    #[test]
    fn expunged_keeps_server_order() {
        let one = SeqNum::new(1).unwrap();
        let data = vec![
            UntaggedResponse::Expunge(one),
            UntaggedResponse::Exists(5),
            UntaggedResponse::Expunge(one),
        ];
        assert_eq!(expunged(data), vec![one, one]);
    }
}
