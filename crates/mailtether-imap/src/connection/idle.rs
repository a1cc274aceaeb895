//! IMAP IDLE command support (RFC 2177).
//!
//! IDLE lets the server push mailbox changes without polling. The handler
//! sees every response the server sends while the command is active,
//! starting with the `+` continuation, one at a time: the receive loop does
//! not read the next response until the handler has returned.
//!
//! IDLE ends when [`Connection::idle_done`] (or an [`IdleDone`] handle) is
//! called from the handler or any other task, when the timeout elapses, when
//! the cancel future completes, or when the idle future is dropped. In each
//! case `DONE` is sent and the tagged response awaited, unless the transport
//! is already gone.
//!
//! ```ignore
//! let done = connection.idle_done_handle();
//! let response = connection
//!     .idle(|response| {
//!         if let Response::Untagged(UntaggedResponse::Exists(n)) = response {
//!             println!("{n} messages");
//!             let _ = done.signal();
//!         }
//!     })
//!     .await?;
//! ```

#![allow(clippy::missing_errors_doc)]

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, OwnedMutexGuard, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::client::{Connection, check_status};
use super::state::{CommandKind, ConnectionState, Reply, SharedState};
use crate::command::render;
use crate::parser::{Response, TaggedResponse};
use crate::types::Tag;
use crate::{Error, Result};

/// Time allowed for the tagged response after `DONE`.
const IDLE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-safe handle that ends the active IDLE of a connection.
#[derive(Clone)]
pub struct IdleDone {
    shared: Arc<SharedState>,
}

impl IdleDone {
    /// Signals the active IDLE to terminate.
    ///
    /// # Errors
    ///
    /// [`Error::NotIdling`] if the connection is not idling.
    pub fn signal(&self) -> Result<()> {
        self.shared.idle_done()
    }
}

impl std::fmt::Debug for IdleDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleDone").finish_non_exhaustive()
    }
}

enum Exit {
    Done,
    Timeout,
    Cancelled,
}

/// What is left to do for an IDLE whose caller went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    AwaitContinuation,
    SendDone,
    AwaitReply,
}

/// Ends the IDLE if the future driving it is dropped, holding the command
/// lock until the server has answered.
struct IdleCleanup {
    connection: Connection,
    tag: Tag,
    lock: Option<OwnedMutexGuard<()>>,
    done_sent: bool,
    armed: bool,
}

impl Drop for IdleCleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let shared = &self.connection.inner.shared;
        let Some((reply, accepted)) = shared.abandon_idle(&self.tag) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(tag = %self.tag, "IDLE dropped outside the runtime, closing connection");
            shared.close();
            return;
        };
        let step = if self.done_sent {
            Finish::AwaitReply
        } else if accepted {
            Finish::SendDone
        } else {
            Finish::AwaitContinuation
        };
        debug!(tag = %self.tag, ?step, "IDLE dropped, finishing it in the background");

        let connection = self.connection.clone();
        let tag = self.tag.clone();
        let lock = self.lock.take();
        runtime.spawn(async move {
            let _lock = lock;
            match tokio::time::timeout(IDLE_RESPONSE_TIMEOUT, connection.finish_idle(reply, step))
                .await
            {
                Ok(Ok(tagged)) => {
                    debug!(%tag, status = tagged.status.as_str(), "dropped IDLE ended");
                }
                Ok(Err(error)) => {
                    warn!(%tag, %error, "dropped IDLE failed, disconnecting");
                    let _ = connection.disconnect().await;
                }
                Err(_) => {
                    warn!(%tag, "dropped IDLE not answered, disconnecting");
                    let _ = connection.disconnect().await;
                }
            }
        });
    }
}

impl Connection {
    /// Idles until [`idle_done`](Self::idle_done) is called, using the
    /// configured idle timeout if there is one.
    pub async fn idle<F>(&self, handler: F) -> Result<TaggedResponse>
    where
        F: FnMut(&Response),
    {
        self.idle_until(self.inner.idle_timeout, pending::<()>(), handler)
            .await
    }

    /// Idles for at most `timeout`.
    ///
    /// Responses arriving close to the deadline may or may not reach the
    /// handler before `DONE` is sent.
    pub async fn idle_with_timeout<F>(&self, timeout: Duration, handler: F) -> Result<TaggedResponse>
    where
        F: FnMut(&Response),
    {
        self.idle_until(Some(timeout), pending::<()>(), handler).await
    }

    /// Idles until done is signalled, `timeout` elapses, or `cancel`
    /// completes.
    ///
    /// `DONE` is only sent once the server has accepted IDLE with `+`. A
    /// timeout or cancellation that comes earlier waits for that
    /// continuation (or the tagged response) first. Dropping the returned
    /// future ends the IDLE in the background; later commands queue behind
    /// it.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] after `DONE` was sent because `cancel` completed,
    /// [`Error::ConnectionClosed`] (or [`Error::Bye`]) if the connection ends
    /// while idling, [`Error::Timeout`] if the server neither accepts IDLE
    /// nor answers `DONE` in time, in which case the connection is dropped.
    pub async fn idle_until<C, F>(
        &self,
        timeout: Option<Duration>,
        cancel: C,
        mut handler: F,
    ) -> Result<TaggedResponse>
    where
        C: Future<Output = ()>,
        F: FnMut(&Response),
    {
        let lock = Arc::clone(&self.inner.command_lock).lock_owned().await;
        let shared = &self.inner.shared;
        let tag = self.inner.tags.next()?;
        let line = render(tag.as_str(), "IDLE", &[])?;
        let mut reply = shared.begin(tag.clone(), CommandKind::Normal)?;
        let (sink, mut events) = mpsc::channel(1);
        let signal = Arc::new(Notify::new());
        shared.begin_idle(sink, Arc::clone(&signal));
        let mut cleanup = IdleCleanup {
            connection: self.clone(),
            tag: tag.clone(),
            lock: Some(lock),
            done_sent: false,
            armed: true,
        };

        trace!(%tag, "C: IDLE");
        for segment in &line {
            if let Err(e) = self.write(segment.bytes()).await {
                cleanup.armed = false;
                shared.end_idle();
                shared.abandon(&tag);
                return Err(e);
            }
        }

        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => pending::<()>().await,
            }
        };
        let grace = tokio::time::sleep(IDLE_RESPONSE_TIMEOUT);
        tokio::pin!(deadline);
        tokio::pin!(grace);
        tokio::pin!(cancel);
        // Set when asked to stop before the server sent `+`.
        let mut stopping = None;

        let exit = loop {
            tokio::select! {
                biased;
                () = signal.notified() => break Exit::Done,
                () = &mut cancel, if stopping.is_none() => {
                    if shared.state() == ConnectionState::Idling {
                        break Exit::Cancelled;
                    }
                    debug!(%tag, "cancelled before IDLE was accepted");
                    stopping = Some(Exit::Cancelled);
                    grace.as_mut().reset(Instant::now() + IDLE_RESPONSE_TIMEOUT);
                }
                () = &mut deadline, if stopping.is_none() => {
                    if shared.state() == ConnectionState::Idling {
                        break Exit::Timeout;
                    }
                    debug!(%tag, "timed out before IDLE was accepted");
                    stopping = Some(Exit::Timeout);
                    grace.as_mut().reset(Instant::now() + IDLE_RESPONSE_TIMEOUT);
                }
                () = &mut grace, if stopping.is_some() => {
                    cleanup.armed = false;
                    shared.end_idle();
                    warn!(%tag, "server never accepted IDLE, disconnecting");
                    let _ = self.disconnect().await;
                    return Err(Error::Timeout(IDLE_RESPONSE_TIMEOUT));
                }
                event = events.recv() => {
                    let Some((response, ack)) = event else {
                        // The receive loop ended; the reply carries the reason.
                        cleanup.armed = false;
                        shared.end_idle();
                        debug!(%tag, "connection closed while idling");
                        let error = match (&mut reply).await {
                            Ok(Err(error)) => error,
                            _ => shared.closed_error(),
                        };
                        return Err(error);
                    };
                    let accepted = matches!(response, Response::Continuation(_));
                    handler(&response);
                    let _ = ack.send(());
                    if accepted && let Some(exit) = stopping.take() {
                        break exit;
                    }
                }
                result = &mut reply => {
                    cleanup.armed = false;
                    shared.end_idle();
                    debug!(%tag, "server ended IDLE");
                    return check_status(self.flatten(result)?);
                }
            }
        };

        shared.end_idle();
        drop(events);
        if shared.is_terminated() {
            cleanup.armed = false;
            return Err(shared.closed_error());
        }
        debug!(%tag, reason = exit.as_str(), "sending DONE");
        cleanup.done_sent = true;
        if let Err(e) = self.write(b"DONE\r\n").await {
            cleanup.armed = false;
            shared.abandon(&tag);
            return Err(e);
        }

        let answered = tokio::time::timeout(IDLE_RESPONSE_TIMEOUT, self.resolve(reply)).await;
        cleanup.armed = false;
        let Ok(tagged) = answered else {
            warn!(%tag, "no response to DONE, disconnecting");
            let _ = self.disconnect().await;
            return Err(Error::Timeout(IDLE_RESPONSE_TIMEOUT));
        };
        let tagged = tagged?;
        match exit {
            Exit::Cancelled => Err(Error::Cancelled),
            Exit::Done | Exit::Timeout => check_status(tagged),
        }
    }

    /// Brings an abandoned IDLE to its tagged response.
    async fn finish_idle(&self, mut reply: Reply, step: Finish) -> Result<TaggedResponse> {
        if step == Finish::AwaitContinuation {
            let continuation = self.inner.shared.wait_continuation()?;
            tokio::select! {
                received = continuation => {
                    if received.is_err() {
                        return self.resolve(reply).await;
                    }
                }
                result = &mut reply => return self.flatten(result),
            }
        }
        if step != Finish::AwaitReply {
            self.write(b"DONE\r\n").await?;
        }
        self.resolve(reply).await
    }

    /// Ends the active IDLE. Callable from any clone of the connection,
    /// including from inside the IDLE handler.
    ///
    /// # Errors
    ///
    /// [`Error::NotIdling`] if the connection is not idling.
    pub fn idle_done(&self) -> Result<()> {
        self.inner.shared.idle_done()
    }

    /// Returns a handle that can end IDLE without holding the connection.
    #[must_use]
    pub fn idle_done_handle(&self) -> IdleDone {
        IdleDone {
            shared: Arc::clone(&self.inner.shared),
        }
    }
}

impl Exit {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
