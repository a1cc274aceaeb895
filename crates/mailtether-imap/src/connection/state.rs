//! Connection state shared between callers and the receive loop.
//!
//! Everything here sits behind one mutex scoped to a single connection.
//! Hand-offs to waiting callers go through oneshot channels that are
//! completed while the lock is held, so a caller never observes a tagged
//! result before the untagged data that preceded it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc, oneshot};
use tracing::{debug, warn};

use crate::parser::{ContinuationRequest, Response, TaggedResponse, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Connection state.
///
/// Transitions are driven by the connection itself; callers only observe
/// them through [`Connection::state`](super::Connection::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open, greeting not yet read.
    Connecting,
    /// Greeting received, not authenticated.
    Established,
    /// Logged in (or PREAUTH greeting).
    Authenticated,
    /// An IDLE command is active.
    Idling,
    /// LOGOUT was sent.
    LoggingOut,
    /// Transport released or lost.
    Disconnected,
}

/// How the receive loop treats the tagged result of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Normal,
    /// LOGIN or AUTHENTICATE: OK moves to `Authenticated`.
    Login,
    /// LOGOUT: BYE is expected.
    Logout,
    /// STARTTLS: OK stops the loop so the stream can be upgraded.
    StartTls,
    /// SELECT or EXAMINE: the response store starts empty.
    Select,
}

/// Outcome delivered to the caller waiting on a tag.
pub(crate) type Reply = oneshot::Receiver<Result<TaggedResponse>>;

/// A response forwarded to the IDLE handler, with its acknowledgement.
pub(crate) type IdleEvent = (Response, oneshot::Sender<()>);

struct Pending {
    tag: Tag,
    kind: CommandKind,
    reply: oneshot::Sender<Result<TaggedResponse>>,
}

/// Why the connection ended.
#[derive(Debug, Clone)]
enum Termination {
    Closed,
    Bye(String),
}

impl Termination {
    fn to_error(&self) -> Error {
        match self {
            Self::Closed => Error::ConnectionClosed,
            Self::Bye(text) => Error::Bye(text.clone()),
        }
    }
}

struct Idle {
    sink: mpsc::Sender<IdleEvent>,
    signal: Arc<Notify>,
    resume: ConnectionState,
}

struct Shared {
    state: ConnectionState,
    responses: HashMap<String, Vec<UntaggedResponse>>,
    capabilities: Vec<Capability>,
    pending: Option<Pending>,
    continuation: Option<oneshot::Sender<ContinuationRequest>>,
    unclaimed: Option<ContinuationRequest>,
    idle: Option<Idle>,
    terminated: Option<Termination>,
}

/// What the receive loop should do after routing a response.
#[derive(Debug)]
pub(crate) enum Routed {
    Continue,
    /// Forward to the IDLE handler and wait for its acknowledgement.
    Forward(mpsc::Sender<IdleEvent>, Response),
    /// STARTTLS succeeded; hand the stream back for the upgrade.
    Upgrade,
    /// The connection is finished.
    Stop,
}

/// Mutex-protected state of one connection.
pub(crate) struct SharedState {
    inner: Mutex<Shared>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Shared {
                state: ConnectionState::Connecting,
                responses: HashMap::new(),
                capabilities: Vec::new(),
                pending: None,
                continuation: None,
                unclaimed: None,
                idle: None,
                terminated: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn capabilities(&self) -> Vec<Capability> {
        self.lock().capabilities.clone()
    }

    /// Returns the error a call on a finished connection fails with.
    pub(crate) fn closed_error(&self) -> Error {
        self.lock()
            .terminated
            .as_ref()
            .map_or(Error::ConnectionClosed, Termination::to_error)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.lock().terminated.is_some()
    }

    /// Installs the in-flight command and returns its reply channel.
    pub(crate) fn begin(&self, tag: Tag, kind: CommandKind) -> Result<Reply> {
        let mut shared = self.lock();
        if let Some(termination) = &shared.terminated {
            return Err(termination.to_error());
        }
        if shared.pending.is_some() {
            return Err(Error::InvalidState("a command is already in flight".to_string()));
        }
        match kind {
            CommandKind::Logout => {
                debug!(from = ?shared.state, "state transition to LoggingOut");
                shared.state = ConnectionState::LoggingOut;
            }
            CommandKind::Select => shared.responses.clear(),
            _ => {}
        }
        let (reply, rx) = oneshot::channel();
        shared.pending = Some(Pending { tag, kind, reply });
        shared.unclaimed = None;
        Ok(rx)
    }

    /// Drops the in-flight command after a failed write.
    pub(crate) fn abandon(&self, tag: &Tag) {
        let mut shared = self.lock();
        if shared.pending.as_ref().is_some_and(|p| &p.tag == tag) {
            shared.pending = None;
        }
        shared.continuation = None;
    }

    /// Registers interest in the next continuation request.
    pub(crate) fn wait_continuation(&self) -> Result<oneshot::Receiver<ContinuationRequest>> {
        let mut shared = self.lock();
        if let Some(termination) = &shared.terminated {
            return Err(termination.to_error());
        }
        let (tx, rx) = oneshot::channel();
        match shared.unclaimed.take() {
            Some(continuation) => {
                let _ = tx.send(continuation);
            }
            None => shared.continuation = Some(tx),
        }
        Ok(rx)
    }

    /// Registers the IDLE sink and done signal for the in-flight IDLE command.
    pub(crate) fn begin_idle(&self, sink: mpsc::Sender<IdleEvent>, signal: Arc<Notify>) {
        let mut shared = self.lock();
        let resume = shared.state;
        shared.idle = Some(Idle {
            sink,
            signal,
            resume,
        });
    }

    /// Removes the IDLE sink and restores the state IDLE started from.
    pub(crate) fn end_idle(&self) {
        let mut shared = self.lock();
        if let Some(idle) = shared.idle.take()
            && shared.state == ConnectionState::Idling
        {
            debug!(to = ?idle.resume, "leaving Idling");
            shared.state = idle.resume;
        }
    }

    /// Takes over an IDLE whose caller went away.
    ///
    /// Removes the sink and swaps in a fresh reply channel for `tag`.
    /// Returns `None` if the command already finished; otherwise the new
    /// reply and whether the server had accepted the IDLE.
    pub(crate) fn abandon_idle(&self, tag: &Tag) -> Option<(Reply, bool)> {
        let mut shared = self.lock();
        let idle = shared.idle.take();
        let accepted = shared.state == ConnectionState::Idling;
        if let Some(idle) = idle
            && accepted
        {
            debug!(to = ?idle.resume, "leaving Idling");
            shared.state = idle.resume;
        }
        let pending = shared.pending.as_mut().filter(|p| &p.tag == tag)?;
        let (reply, rx) = oneshot::channel();
        pending.reply = reply;
        Some((rx, accepted))
    }

    /// Signals the active IDLE to terminate.
    pub(crate) fn idle_done(&self) -> Result<()> {
        let shared = self.lock();
        match &shared.idle {
            Some(idle) if shared.state == ConnectionState::Idling => {
                idle.signal.notify_one();
                Ok(())
            }
            _ => Err(Error::NotIdling),
        }
    }

    /// Records the server greeting.
    pub(crate) fn greet(&self, greeting: UntaggedResponse, state: ConnectionState) {
        let mut shared = self.lock();
        store(&mut shared, greeting);
        debug!(?state, "greeting received");
        shared.state = state;
    }

    /// Routes one parsed response. Called only by the receive loop.
    pub(crate) fn route(&self, response: Response) -> Routed {
        let mut shared = self.lock();
        match response {
            Response::Tagged(tagged) => complete(&mut shared, tagged),
            Response::Continuation(continuation) => {
                if let Some(waiter) = shared.continuation.take() {
                    let _ = waiter.send(continuation);
                } else if let Some(idle) = &shared.idle {
                    let sink = idle.sink.clone();
                    if shared.state != ConnectionState::Idling {
                        debug!(from = ?shared.state, "state transition to Idling");
                        shared.state = ConnectionState::Idling;
                    }
                    return Routed::Forward(sink, Response::Continuation(continuation));
                } else if shared.pending.is_some() {
                    shared.unclaimed = Some(continuation);
                } else {
                    warn!(text = %continuation.text.text, "continuation with no command in flight");
                }
                Routed::Continue
            }
            Response::Untagged(untagged) => {
                if let UntaggedResponse::Bye(text) = &untagged
                    && shared.state != ConnectionState::LoggingOut
                {
                    let text = text.text.clone();
                    warn!(%text, "server sent BYE");
                    store(&mut shared, untagged);
                    terminate(&mut shared, &Termination::Bye(text));
                    return Routed::Stop;
                }
                let sink = shared.idle.as_ref().map(|idle| idle.sink.clone());
                match sink {
                    Some(sink) => {
                        store(&mut shared, untagged.clone());
                        Routed::Forward(sink, Response::Untagged(untagged))
                    }
                    None => {
                        store(&mut shared, untagged);
                        Routed::Continue
                    }
                }
            }
        }
    }

    /// Ends the connection after EOF, a read failure or a local disconnect.
    pub(crate) fn close(&self) {
        terminate(&mut self.lock(), &Termination::Closed);
    }

    /// Ends the connection, failing the in-flight command with `error`.
    pub(crate) fn fail(&self, error: Error) {
        let mut shared = self.lock();
        if let Some(pending) = shared.pending.take() {
            let _ = pending.reply.send(Err(error));
        }
        terminate(&mut shared, &Termination::Closed);
    }

    pub(crate) fn responses(&self, name: &str) -> Vec<UntaggedResponse> {
        self.lock()
            .responses
            .get(&name.to_ascii_uppercase())
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn take_responses(&self, name: &str) -> Vec<UntaggedResponse> {
        self.lock()
            .responses
            .remove(&name.to_ascii_uppercase())
            .unwrap_or_default()
    }

    /// Removes and returns the stored responses named `name` that match
    /// `keep`, leaving the others in place.
    pub(crate) fn take_responses_if(
        &self,
        name: &str,
        keep: impl Fn(&UntaggedResponse) -> bool,
    ) -> Vec<UntaggedResponse> {
        let mut shared = self.lock();
        let Some(stored) = shared.responses.get_mut(&name.to_ascii_uppercase()) else {
            return Vec::new();
        };
        let (taken, left): (Vec<_>, Vec<_>) = std::mem::take(stored).into_iter().partition(|r| keep(r));
        *stored = left;
        taken
    }

    pub(crate) fn last_response(&self, name: &str) -> Option<UntaggedResponse> {
        self.lock()
            .responses
            .get(&name.to_ascii_uppercase())
            .and_then(|list| list.last().cloned())
    }

    pub(crate) fn clear_responses(&self) {
        self.lock().responses.clear();
    }
}

fn store(shared: &mut Shared, response: UntaggedResponse) {
    match &response {
        UntaggedResponse::Capability(caps) => shared.capabilities.clone_from(caps),
        other => {
            if let Some(ResponseCode::Capability(caps)) =
                other.status_text().and_then(|text| text.code.as_ref())
            {
                shared.capabilities.clone_from(caps);
            }
        }
    }
    shared
        .responses
        .entry(response.name().to_string())
        .or_default()
        .push(response);
}

fn complete(shared: &mut Shared, tagged: TaggedResponse) -> Routed {
    let Some(pending) = shared.pending.take_if(|p| p.tag == tagged.tag) else {
        warn!(tag = %tagged.tag, "tagged response does not match the command in flight");
        return Routed::Continue;
    };
    shared.continuation = None;
    shared.unclaimed = None;
    if let Some(ResponseCode::Capability(caps)) = tagged.code() {
        shared.capabilities.clone_from(caps);
    }

    let ok = tagged.status == Status::Ok;
    let routed = match pending.kind {
        CommandKind::Login if ok => {
            debug!(from = ?shared.state, "state transition to Authenticated");
            shared.state = ConnectionState::Authenticated;
            Routed::Continue
        }
        CommandKind::StartTls if ok => Routed::Upgrade,
        _ => Routed::Continue,
    };
    let _ = pending.reply.send(Ok(tagged));
    routed
}

fn terminate(shared: &mut Shared, termination: &Termination) {
    if shared.terminated.is_none() {
        shared.terminated = Some(termination.clone());
    }
    if let Some(pending) = shared.pending.take() {
        let _ = pending.reply.send(Err(termination.to_error()));
    }
    shared.continuation = None;
    shared.unclaimed = None;
    shared.idle = None;
    if shared.state != ConnectionState::Disconnected {
        debug!(from = ?shared.state, "state transition to Disconnected");
        shared.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::parser::ResponseParser;

    fn parse(line: &[u8]) -> Response {
        ResponseParser::parse(line).unwrap()
    }

    fn established() -> SharedState {
        let shared = SharedState::new();
        let Response::Untagged(greeting) = parse(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n")
        else {
            panic!("greeting is untagged");
        };
        shared.greet(greeting, ConnectionState::Established);
        shared
    }

    #[test]
    fn greeting_code_sets_capabilities() {
        let shared = established();
        assert_eq!(shared.state(), ConnectionState::Established);
        assert!(shared.capabilities().contains(&Capability::Idle));
        assert_eq!(shared.responses("ok").len(), 1);
    }

    #[test]
    fn tagged_response_completes_matching_command() {
        let shared = established();
        let mut reply = shared.begin(Tag::new("A1"), CommandKind::Normal).unwrap();

        assert!(matches!(
            shared.route(parse(b"A2 OK stray\r\n")),
            Routed::Continue
        ));
        assert!(reply.try_recv().is_err());

        shared.route(parse(b"* 3 EXISTS\r\n"));
        shared.route(parse(b"A1 OK done\r\n"));
        let tagged = reply.try_recv().unwrap().unwrap();
        assert_eq!(tagged.tag.as_str(), "A1");
        assert_eq!(shared.responses("EXISTS").len(), 1);
    }

    #[test]
    fn login_ok_authenticates() {
        let shared = established();
        let _reply = shared.begin(Tag::new("A1"), CommandKind::Login).unwrap();
        shared.route(parse(b"A1 OK [CAPABILITY IMAP4rev1 MOVE] logged in\r\n"));
        assert_eq!(shared.state(), ConnectionState::Authenticated);
        assert!(shared.capabilities().contains(&Capability::Move));
    }

    #[test]
    fn second_command_is_refused_while_one_is_in_flight() {
        let shared = established();
        let _reply = shared.begin(Tag::new("A1"), CommandKind::Normal).unwrap();
        assert!(matches!(
            shared.begin(Tag::new("A2"), CommandKind::Normal),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn bye_fails_command_and_disconnects() {
        let shared = established();
        let mut reply = shared.begin(Tag::new("A1"), CommandKind::Login).unwrap();
        assert!(matches!(
            shared.route(parse(b"* BYE go away\r\n")),
            Routed::Stop
        ));
        assert!(matches!(reply.try_recv().unwrap(), Err(Error::Bye(text)) if text == "go away"));
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert!(matches!(
            shared.begin(Tag::new("A2"), CommandKind::Normal),
            Err(Error::Bye(_))
        ));
    }

    #[test]
    fn bye_during_logout_is_stored() {
        let shared = established();
        let mut reply = shared.begin(Tag::new("A1"), CommandKind::Logout).unwrap();
        assert_eq!(shared.state(), ConnectionState::LoggingOut);
        assert!(matches!(
            shared.route(parse(b"* BYE logging out\r\n")),
            Routed::Continue
        ));
        shared.route(parse(b"A1 OK bye\r\n"));
        assert!(reply.try_recv().unwrap().is_ok());
        assert_eq!(shared.responses("BYE").len(), 1);
    }

    #[test]
    fn select_clears_response_store() {
        let shared = established();
        shared.route(parse(b"* 3 EXISTS\r\n"));
        let _reply = shared.begin(Tag::new("A1"), CommandKind::Select).unwrap();
        assert!(shared.responses("EXISTS").is_empty());
        assert!(shared.responses("OK").is_empty());
    }

    #[test]
    fn early_continuation_is_kept_for_the_waiter() {
        let shared = established();
        let _reply = shared.begin(Tag::new("A1"), CommandKind::Normal).unwrap();
        shared.route(parse(b"+ go ahead\r\n"));
        let mut continuation = shared.wait_continuation().unwrap();
        assert_eq!(continuation.try_recv().unwrap().text.text, "go ahead");
    }

    #[test]
    fn starttls_ok_requests_upgrade() {
        let shared = established();
        let _reply = shared.begin(Tag::new("A1"), CommandKind::StartTls).unwrap();
        assert!(matches!(
            shared.route(parse(b"A1 OK begin TLS\r\n")),
            Routed::Upgrade
        ));
    }

    #[test]
    fn idle_done_requires_idling() {
        let shared = established();
        assert!(matches!(shared.idle_done(), Err(Error::NotIdling)));

        let _reply = shared.begin(Tag::new("A1"), CommandKind::Normal).unwrap();
        let (sink, _events) = mpsc::channel(1);
        shared.begin_idle(sink, Arc::new(Notify::new()));
        assert!(matches!(shared.idle_done(), Err(Error::NotIdling)));

        assert!(matches!(shared.route(parse(b"+ idling\r\n")), Routed::Forward(..)));
        assert_eq!(shared.state(), ConnectionState::Idling);
        assert!(shared.idle_done().is_ok());

        shared.end_idle();
        assert_eq!(shared.state(), ConnectionState::Established);
        assert!(matches!(shared.idle_done(), Err(Error::NotIdling)));
    }

    #[test]
    fn abandoned_idle_keeps_command_in_flight() {
        let shared = established();
        let tag = Tag::new("A1");
        let mut first = shared.begin(tag.clone(), CommandKind::Normal).unwrap();
        let (sink, _events) = mpsc::channel(1);
        shared.begin_idle(sink, Arc::new(Notify::new()));
        assert!(matches!(shared.route(parse(b"+ idling\r\n")), Routed::Forward(..)));

        let (mut reply, accepted) = shared.abandon_idle(&tag).unwrap();
        assert!(accepted);
        assert_eq!(shared.state(), ConnectionState::Established);
        assert!(matches!(shared.route(parse(b"* 3 EXISTS\r\n")), Routed::Continue));

        shared.route(parse(b"A1 OK IDLE terminated\r\n"));
        assert!(first.try_recv().is_err());
        assert_eq!(reply.try_recv().unwrap().unwrap().status, Status::Ok);
        assert!(shared.abandon_idle(&tag).is_none());
    }

    #[test]
    fn abandoned_idle_before_continuation_is_not_accepted() {
        let shared = established();
        let tag = Tag::new("A1");
        let _first = shared.begin(tag.clone(), CommandKind::Normal).unwrap();
        let (sink, _events) = mpsc::channel(1);
        shared.begin_idle(sink, Arc::new(Notify::new()));

        let (_reply, accepted) = shared.abandon_idle(&tag).unwrap();
        assert!(!accepted);
        // The late continuation waits for whoever finishes the IDLE.
        assert!(matches!(shared.route(parse(b"+ idling\r\n")), Routed::Continue));
        let mut continuation = shared.wait_continuation().unwrap();
        assert_eq!(continuation.try_recv().unwrap().text.text, "idling");
    }

    #[test]
    fn parse_failure_is_delivered_to_caller() {
        let shared = established();
        let mut reply = shared.begin(Tag::new("A1"), CommandKind::Normal).unwrap();
        shared.fail(Error::DataFormat("bad".to_string()));
        assert!(matches!(reply.try_recv().unwrap(), Err(Error::DataFormat(_))));
        assert!(matches!(shared.closed_error(), Error::ConnectionClosed));
    }
}
