//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be established (transport failure or a
    /// refused greeting before the protocol started).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The established connection was closed or failed on read.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server response violated the grammar.
    #[error("Parse error at position {position}{}: {message}", response_context(.response.as_deref()))]
    ResponseParse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
        /// Name of the enclosing response, when known.
        response: Option<String>,
        /// The offending fragment of input.
        fragment: String,
    },

    /// A client-side argument is out of range or malformed. Nothing was sent.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Server returned NO.
    #[error("Server returned NO: {text}")]
    No {
        /// Human-readable text.
        text: String,
        /// Response code, if any.
        code: Option<ResponseCode>,
    },

    /// Server returned BAD.
    #[error("Server returned BAD: {text}")]
    Bad {
        /// Human-readable text.
        text: String,
        /// Response code, if any.
        code: Option<ResponseCode>,
    },

    /// Server sent an unsolicited BYE and the connection was torn down.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Server produced a response sequence that violates the protocol.
    #[error("Unknown response: {0}")]
    UnknownResponse(String),

    /// IDLE termination was requested while not idling.
    #[error("Not idling")]
    NotIdling,

    /// A UID set could not be decoded or paired.
    #[error("Malformed range: {0}")]
    MalformedRange(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Idle was aborted by an external cancellation signal.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

fn response_context(response: Option<&str>) -> String {
    response.map_or_else(String::new, |name| format!(" in {name} response"))
}

impl Error {
    /// Returns true if this error means the connection is no longer usable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::ConnectionClosed
                | Self::Io(_)
                | Self::Tls(_)
                | Self::ResponseParse { .. }
                | Self::Bye(_)
                | Self::UnknownResponse(_)
        )
    }

    /// Returns the response code carried by a NO or BAD error.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        match self {
            Self::No { code, .. } | Self::Bad { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_response_name() {
        let err = Error::ResponseParse {
            position: 12,
            message: "unknown attribute UNKNOWN for {123}".to_string(),
            response: Some("FETCH".to_string()),
            fragment: "UNKNOWN".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("in FETCH response"));
        assert!(text.contains(" for {123}"));
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::Bye("bye".to_string()).is_fatal());
        assert!(!Error::NotIdling.is_fatal());
        assert!(!Error::DataFormat("x".to_string()).is_fatal());
    }

    #[test]
    fn no_error_exposes_code() {
        let err = Error::No {
            text: "no such mailbox".to_string(),
            code: Some(ResponseCode::TryCreate),
        };
        assert_eq!(err.code(), Some(&ResponseCode::TryCreate));
        assert!(Error::Cancelled.code().is_none());
    }
}
