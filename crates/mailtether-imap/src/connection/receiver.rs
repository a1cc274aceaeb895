//! The receive loop: sole reader of the transport.

use std::sync::Arc;

use tokio::io::ReadHalf;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::framed::FramedReader;
use super::state::{Routed, SharedState};
use super::stream::BoxedStream;
use crate::Error;
use crate::parser::ResponseParser;

/// Read side of the transport as owned by the receive loop.
pub(crate) type Reader = FramedReader<ReadHalf<BoxedStream>>;

/// Parses responses until the connection ends.
///
/// Returns the reader only when a STARTTLS command succeeded, so the
/// caller can rebuild the stream for the TLS handshake.
pub(crate) async fn run(mut reader: Reader, shared: Arc<SharedState>) -> Option<Reader> {
    loop {
        let bytes = match reader.read_response().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("server closed the connection");
                shared.close();
                return None;
            }
            Err(error) => {
                debug!(%error, "read failed");
                shared.fail(match error {
                    Error::DataFormat(_) => error,
                    _ => Error::ConnectionClosed,
                });
                return None;
            }
        };
        trace!(line = %first_line(&bytes), "S:");

        let response = match ResponseParser::parse(&bytes) {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "unparseable response, closing connection");
                shared.fail(error);
                return None;
            }
        };

        match shared.route(response) {
            Routed::Continue => {}
            Routed::Forward(sink, response) => {
                let (ack, acked) = oneshot::channel();
                if sink.send((response, ack)).await.is_ok() {
                    let _ = acked.await;
                }
            }
            Routed::Upgrade => {
                debug!("STARTTLS accepted, pausing receive loop");
                return Some(reader);
            }
            Routed::Stop => return None,
        }
    }
}

/// First line of a response, without literal payloads.
fn first_line(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = bytes
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}
