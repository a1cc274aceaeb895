//! # mailtether-imap
//!
//! An async IMAP4rev1 (RFC 3501) client engine.
//!
//! ## Features
//!
//! - **Background receive loop**: one task owns the read side of the
//!   transport, routes tagged responses to the waiting command, and keeps
//!   untagged data in a queryable response store
//! - **Shared connection handle**: [`Connection`] is `Clone + Send + Sync`,
//!   so IDLE can be ended from another task
//! - **Literals done right**: synchronizing literals wait for the server's
//!   continuation request before the payload is written
//! - **IDLE support**: RFC 2177 with timeout, cancellation and a done handle
//! - **TLS via rustls**: implicit TLS or STARTTLS, without OpenSSL
//! - **Sans-I/O parser**: Protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtether_imap::{Config, Connection, FetchItems, Security, SequenceSet};
//!
//! #[tokio::main]
//! async fn main() -> mailtether_imap::Result<()> {
//!     let config = Config::new("imap.example.com", Security::Implicit);
//!     let connection = Connection::connect(&config).await?;
//!
//!     connection.login("user@example.com", "password").await?;
//!
//!     for folder in connection.list("", "*").await? {
//!         println!("Folder: {}", folder.mailbox.as_str());
//!     }
//!
//!     connection.select("INBOX").await?;
//!     if let Some(exists) = connection.last_response("EXISTS") {
//!         println!("{exists:?}");
//!     }
//!
//!     let messages = connection
//!         .fetch(&SequenceSet::range(1, 10)?, FetchItems::Fast)
//!         .await?;
//!     println!("{} messages fetched", messages.len());
//!
//!     connection.logout().await?;
//!     connection.disconnect().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connecting ── greeting OK ──→ Established ── LOGIN/AUTHENTICATE ──→ Authenticated
//!      │                                                                 │  ▲
//!      └──────── greeting PREAUTH ───────────────────────────────────────┘  │
//!                                                               IDLE + │    │ tagged response
//!                                                                      ▼    │
//!                                                                    Idling ┘
//!
//! any state ── LOGOUT ──→ LoggingOut ── BYE / EOF / disconnect ──→ Disconnected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders, arguments and tags
//! - [`connection`]: Transport, receive loop and command dispatch
//! - [`parser`]: Sans-I/O response parser
//! - [`types`]: Core IMAP types (flags, mailboxes, sequences, etc.)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{
    Argument, Authenticator, Command, FetchAttribute, FetchItems, PlainAuthenticator,
    StatusAttribute, StoreAction, TagGenerator, XOAuth2Authenticator,
};
pub use connection::{
    Config, ConfigBuilder, Connection, ConnectionState, Fetched, IdleDone, RustlsUpgrade,
    Security, TlsUpgrade, Transport,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, TaggedResponse, UntaggedResponse};
pub use types::{
    Capability, Flag, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, SequenceSet, Status, Tag, Uid, UidPlusData, UidValidity,
};

/// IMAP protocol version spoken by this engine.
pub const IMAP_VERSION: &str = "IMAP4rev1";
