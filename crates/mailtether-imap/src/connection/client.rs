//! IMAP connection: command dispatcher and connection manager.

#![allow(clippy::missing_errors_doc)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::WriteHalf;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::config::{Config, Security};
use super::framed::{FramedReader, FramedWriter};
use super::receiver::{self, Reader};
use super::state::{CommandKind, ConnectionState, Reply, SharedState};
use super::stream::{BoxedStream, RustlsUpgrade, TlsUpgrade, Transport, connect_plain, connect_tls};
use crate::command::{
    Argument, Authenticator, Command, DEFAULT_TAG_PREFIX, Step, TagGenerator, Transmission,
    render,
};
use crate::parser::{Response, ResponseParser, TaggedResponse, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status, Tag};
use crate::{Error, Result};

type Writer = FramedWriter<WriteHalf<BoxedStream>>;

pub(super) struct Inner {
    pub(super) shared: Arc<SharedState>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    receiver: Mutex<Option<JoinHandle<Option<Reader>>>>,
    /// Held for the whole life of a command: one in flight at a time.
    pub(super) command_lock: Arc<tokio::sync::Mutex<()>>,
    pub(super) tags: TagGenerator,
    pub(super) idle_timeout: Option<Duration>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = self
            .receiver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// A connection to an IMAP server.
///
/// Cloning is cheap and every clone drives the same connection, so one task
/// can idle while another calls [`idle_done`](Self::idle_done). Commands
/// from different clones queue behind each other; the engine never pipelines.
#[derive(Clone)]
pub struct Connection {
    pub(super) inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("tag_prefix", &self.inner.tags.prefix())
            .finish_non_exhaustive()
    }
}

/// Untagged data a command takes from the response store before the
/// command lock is released.
#[derive(Debug, Clone, Copy)]
pub(super) enum Collect<'a> {
    Nothing,
    /// Every stored response with this name.
    All(&'a str),
    /// Untagged OK responses carrying APPENDUID or COPYUID; other OKs stay.
    UidPlus,
}

/// Result of one command: its tagged response and the untagged data
/// collected for it.
pub(super) struct Exchange {
    pub(super) tagged: TaggedResponse,
    pub(super) data: Vec<UntaggedResponse>,
}

impl Connection {
    /// Connects to the server described by `config`.
    ///
    /// With [`Security::StartTls`] the connection is upgraded right after
    /// the greeting.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!(host = %config.host, port = config.port, security = ?config.security, "connecting");
        let stream = match config.security {
            Security::Implicit => {
                connect_tls(&config.host, config.port, config.connect_timeout).await?
            }
            Security::None | Security::StartTls => {
                connect_plain(&config.host, config.port, config.connect_timeout).await?
            }
        };

        let connection = tokio::time::timeout(
            config.connect_timeout,
            Self::establish(stream, &config.tag_prefix, config.idle_timeout),
        )
        .await
        .map_err(|_| {
            Error::Connection(format!(
                "no greeting within {:?}",
                config.connect_timeout
            ))
        })??;

        if config.security == Security::StartTls {
            let upgrade = RustlsUpgrade::new(&config.host)?;
            connection.starttls(&upgrade).await.map_err(|e| match e {
                Error::Io(_) | Error::Tls(_) => Error::Connection(format!("STARTTLS failed: {e}")),
                other => other,
            })?;
        }
        Ok(connection)
    }

    /// Creates a connection over an already-open transport with default settings.
    pub async fn from_stream<S: Transport>(stream: S) -> Result<Self> {
        Self::establish(Box::new(stream), DEFAULT_TAG_PREFIX, None).await
    }

    /// Creates a connection over an already-open transport using the tag
    /// prefix and idle timeout of `config`.
    pub async fn from_stream_with_config<S: Transport>(stream: S, config: &Config) -> Result<Self> {
        Self::establish(Box::new(stream), &config.tag_prefix, config.idle_timeout).await
    }

    /// Reads the greeting and starts the receive loop.
    async fn establish(
        stream: BoxedStream,
        tag_prefix: &str,
        idle_timeout: Option<Duration>,
    ) -> Result<Self> {
        let shared = Arc::new(SharedState::new());
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedReader::new(read_half);

        let bytes = match reader.read_response().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                shared.close();
                return Err(Error::Connection(
                    "connection closed before greeting".to_string(),
                ));
            }
            Err(e) => {
                shared.close();
                return Err(Error::Connection(format!("reading greeting: {e}")));
            }
        };
        let greeting = match ResponseParser::parse(&bytes) {
            Ok(Response::Untagged(greeting)) => greeting,
            Ok(other) => {
                return Err(Error::Connection(format!("unexpected greeting: {other:?}")));
            }
            Err(e) => return Err(Error::Connection(format!("invalid greeting: {e}"))),
        };
        let state = match &greeting {
            UntaggedResponse::Ok(_) => ConnectionState::Established,
            UntaggedResponse::PreAuth(_) => ConnectionState::Authenticated,
            UntaggedResponse::Bye(text) => {
                return Err(Error::Connection(format!(
                    "server refused connection: {}",
                    text.text
                )));
            }
            other => {
                return Err(Error::Connection(format!(
                    "unexpected greeting: {}",
                    other.name()
                )));
            }
        };
        shared.greet(greeting, state);

        let handle = tokio::spawn(receiver::run(reader, Arc::clone(&shared)));
        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                writer: tokio::sync::Mutex::new(Some(FramedWriter::new(write_half))),
                receiver: Mutex::new(Some(handle)),
                command_lock: Arc::new(tokio::sync::Mutex::new(())),
                tags: TagGenerator::new(tag_prefix),
                idle_timeout,
            }),
        })
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state()
    }

    /// Returns true once the transport is released or lost.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.state() == ConnectionState::Disconnected
    }

    /// Returns the most recently announced capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.inner.shared.capabilities()
    }

    /// Returns true if the server announced `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.inner
            .shared
            .capabilities()
            .iter()
            .any(|c| c == capability)
    }

    /// Returns a snapshot of the stored untagged responses named `name`.
    #[must_use]
    pub fn responses(&self, name: &str) -> Vec<UntaggedResponse> {
        self.inner.shared.responses(name)
    }

    /// Removes and returns the stored untagged responses named `name`.
    pub fn take_responses(&self, name: &str) -> Vec<UntaggedResponse> {
        self.inner.shared.take_responses(name)
    }

    /// Returns the latest stored untagged response named `name`.
    #[must_use]
    pub fn last_response(&self, name: &str) -> Option<UntaggedResponse> {
        self.inner.shared.last_response(name)
    }

    /// Empties the response store.
    pub fn clear_responses(&self) {
        self.inner.shared.clear_responses();
    }

    /// Sends a command and waits for its tagged response.
    ///
    /// Arguments are validated before anything is written; literals are
    /// sent after the server's continuation request.
    ///
    /// # Errors
    ///
    /// [`Error::DataFormat`] for an invalid argument, [`Error::No`] and
    /// [`Error::Bad`] for a failed command, [`Error::Bye`] or
    /// [`Error::ConnectionClosed`] when the connection ends first.
    pub async fn send(&self, name: &str, args: &[Argument]) -> Result<TaggedResponse> {
        let exchange = self.exchange(name, args, CommandKind::Normal, Collect::Nothing).await?;
        check_status(exchange.tagged)
    }

    /// Sends a typed command and waits for its tagged response.
    ///
    /// STARTTLS, AUTHENTICATE and IDLE need their dedicated methods.
    pub async fn execute(&self, command: &Command) -> Result<TaggedResponse> {
        let kind = match command {
            Command::StartTls | Command::Authenticate { .. } | Command::Idle => {
                return Err(Error::InvalidState(format!(
                    "{} cannot be sent with execute",
                    command.name()
                )));
            }
            Command::Logout => CommandKind::Logout,
            Command::Login { .. } => CommandKind::Login,
            Command::Select { .. } | Command::Examine { .. } => CommandKind::Select,
            _ => CommandKind::Normal,
        };
        let exchange = self
            .exchange(command.name(), &command.arguments(), kind, Collect::Nothing)
            .await?;
        check_status(exchange.tagged)
    }

    /// Runs one command under the command lock.
    ///
    /// The responses selected by `collect` are taken from the store before
    /// the lock is released.
    pub(super) async fn exchange(
        &self,
        name: &str,
        args: &[Argument],
        kind: CommandKind,
        collect: Collect<'_>,
    ) -> Result<Exchange> {
        let _guard = self.inner.command_lock.lock().await;
        let tag = self.inner.tags.next()?;
        let transmission = Transmission::new(render(tag.as_str(), name, args)?);
        let reply = self.inner.shared.begin(tag.clone(), kind)?;
        let tagged = self.transmit(&tag, transmission, reply).await?;
        let data = match collect {
            Collect::Nothing => Vec::new(),
            Collect::All(name) => self.inner.shared.take_responses(name),
            Collect::UidPlus => self.inner.shared.take_responses_if("OK", |response| {
                response
                    .status_text()
                    .and_then(|text| text.code.as_ref())
                    .and_then(ResponseCode::uid_plus)
                    .is_some()
            }),
        };
        Ok(Exchange { tagged, data })
    }

    /// Writes a rendered command, honouring continuation requests before
    /// each literal, and waits for the tagged response.
    async fn transmit(
        &self,
        tag: &Tag,
        mut transmission: Transmission,
        mut reply: Reply,
    ) -> Result<TaggedResponse> {
        trace!(command = %transmission.redacted(), "C:");
        while let Some(step) = transmission.next_step() {
            match step {
                Step::Write(bytes) => {
                    if let Err(e) = self.write(bytes).await {
                        self.inner.shared.abandon(tag);
                        return Err(e);
                    }
                }
                Step::AwaitContinuation => {
                    let continuation = self.inner.shared.wait_continuation()?;
                    tokio::select! {
                        received = continuation => {
                            if received.is_err() {
                                return self.resolve(reply).await;
                            }
                        }
                        result = &mut reply => {
                            debug!(%tag, "command completed before its literal was sent");
                            return self.flatten(result);
                        }
                    }
                }
            }
        }
        self.resolve(reply).await
    }

    /// Waits for the tagged response of the in-flight command.
    pub(super) async fn resolve(&self, reply: Reply) -> Result<TaggedResponse> {
        let result = reply.await;
        self.flatten(result)
    }

    pub(super) fn flatten(
        &self,
        result: std::result::Result<Result<TaggedResponse>, tokio::sync::oneshot::error::RecvError>,
    ) -> Result<TaggedResponse> {
        result.unwrap_or_else(|_| Err(self.inner.shared.closed_error()))
    }

    /// Writes raw bytes to the transport.
    pub(super) async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.inner.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(self.inner.shared.closed_error());
        };
        writer.write_all(bytes).await.map_err(|e| {
            if self.inner.shared.is_terminated() {
                self.inner.shared.closed_error()
            } else {
                e
            }
        })
    }

    /// Authenticates with a SASL mechanism.
    ///
    /// Each continuation carries a base64 challenge; it is decoded, handed to
    /// `authenticator`, and the response is sent back base64-encoded on a
    /// single line. A challenge that is not valid base64 cancels the
    /// exchange with `*`.
    pub async fn authenticate<A: Authenticator>(
        &self,
        mechanism: &str,
        authenticator: &mut A,
    ) -> Result<TaggedResponse> {
        let _guard = self.inner.command_lock.lock().await;
        let tag = self.inner.tags.next()?;
        let line = render(tag.as_str(), "AUTHENTICATE", &[Argument::atom(mechanism)])?;
        let mut reply = self.inner.shared.begin(tag.clone(), CommandKind::Login)?;
        trace!(%tag, mechanism, "C: AUTHENTICATE");
        for segment in &line {
            if let Err(e) = self.write(segment.bytes()).await {
                self.inner.shared.abandon(&tag);
                return Err(e);
            }
        }

        loop {
            let continuation = self.inner.shared.wait_continuation()?;
            tokio::select! {
                received = continuation => {
                    let Ok(challenge) = received else {
                        return check_status(self.resolve(reply).await?);
                    };
                    let answer = match BASE64.decode(challenge.text.text.trim()) {
                        Ok(decoded) => {
                            let mut answer = BASE64.encode(authenticator.process(&decoded)).into_bytes();
                            answer.extend_from_slice(b"\r\n");
                            answer
                        }
                        Err(error) => {
                            warn!(%error, "challenge is not base64, cancelling authentication");
                            b"*\r\n".to_vec()
                        }
                    };
                    self.write(&answer).await?;
                }
                result = &mut reply => return check_status(self.flatten(result)?),
            }
        }
    }

    /// Upgrades the connection with STARTTLS.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResponse`] if the server refuses, answers with an
    /// unknown status, or sends plaintext after accepting; the connection is
    /// disconnected in those cases instead of continuing unencrypted.
    pub async fn starttls<U: TlsUpgrade>(&self, upgrade: &U) -> Result<()> {
        let exchange = self
            .exchange("STARTTLS", &[], CommandKind::StartTls, Collect::Nothing)
            .await?;
        let tagged = exchange.tagged;
        if tagged.status != Status::Ok {
            warn!(status = %tagged.status.as_str(), "STARTTLS not accepted");
            let _ = self.disconnect().await;
            return Err(Error::UnknownResponse(format!(
                "STARTTLS answered with {} {}",
                tagged.status.as_str(),
                tagged.text.text
            )));
        }

        let handle = self
            .inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let reader = match handle {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        };
        let Some(reader) = reader else {
            return Err(self.inner.shared.closed_error());
        };
        if !reader.buffered().is_empty() {
            warn!(
                bytes = reader.buffered().len(),
                "plaintext received after STARTTLS OK"
            );
            drop(reader);
            self.inner.shared.close();
            let _ = self.disconnect().await;
            return Err(Error::UnknownResponse(
                "plaintext data after STARTTLS was accepted".to_string(),
            ));
        }

        let mut writer = self.inner.writer.lock().await;
        let Some(write_half) = writer.take() else {
            return Err(self.inner.shared.closed_error());
        };
        let stream = reader.into_inner().unsplit(write_half.into_inner());
        let stream = match upgrade.upgrade(stream).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "TLS negotiation failed");
                self.inner.shared.close();
                return Err(e);
            }
        };
        let (read_half, write_half) = tokio::io::split(stream);
        *writer = Some(FramedWriter::new(write_half));
        let handle = tokio::spawn(receiver::run(
            FramedReader::new(read_half),
            Arc::clone(&self.inner.shared),
        ));
        *self
            .inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("TLS established");
        Ok(())
    }

    /// Sends LOGOUT. The server's BYE is expected and does not fail the
    /// command; call [`disconnect`](Self::disconnect) afterwards.
    pub async fn logout(&self) -> Result<TaggedResponse> {
        let exchange = self.exchange("LOGOUT", &[], CommandKind::Logout, Collect::Nothing).await?;
        check_status(exchange.tagged)
    }

    /// Releases the transport.
    ///
    /// Idempotent: on an already released connection this returns `Ok(())`.
    /// The state is `Disconnected` afterwards even when closing the
    /// transport fails; that failure is returned.
    pub async fn disconnect(&self) -> Result<()> {
        let handle = self
            .inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let writer = self.inner.writer.lock().await.take();
        self.inner.shared.close();

        let mut result = Ok(());
        if let Some(mut writer) = writer {
            debug!("shutting down transport");
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "transport shutdown failed");
                result = Err(e);
            }
        }
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        result
    }
}

/// Converts a NO/BAD/unknown tagged status into an error.
pub(super) fn check_status(tagged: TaggedResponse) -> Result<TaggedResponse> {
    match tagged.status {
        Status::Ok => Ok(tagged),
        Status::No => Err(Error::No {
            text: tagged.text.text,
            code: tagged.text.code,
        }),
        Status::Bad => Err(Error::Bad {
            text: tagged.text.text,
            code: tagged.text.code,
        }),
        other => Err(Error::UnknownResponse(format!(
            "tagged {} response to {}",
            other.as_str(),
            tagged.tag
        ))),
    }
}
