//! IMAP protocol parser.
//!
//! This module provides a sans-I/O parser for IMAP server responses. The
//! framed reader hands it one complete response unit at a time, literals
//! included, and it returns a typed [`Response`].
//!
//! # Architecture
//!
//! - **Lexer**: Tokenizes raw bytes into IMAP tokens (atoms, strings, numbers, etc.)
//! - **Response Parser**: Builds structured response objects from tokens
//!
//! # Example
//!
//! ```
//! use mailtether_imap::parser::{ResponseParser, Response, UntaggedResponse};
//!
//! let input = b"* OK IMAP4rev1 server ready\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! match response {
//!     Response::Untagged(UntaggedResponse::Ok(text)) => {
//!         assert!(text.text.contains("IMAP4rev1"));
//!     }
//!     _ => panic!("Expected untagged OK"),
//! }
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyExtension, BodyFields, BodyStructure, ContentDisposition, ContinuationRequest,
    Envelope, FetchItem, IdParams, Response, ResponseParser, ResponseText, TaggedResponse,
    UntaggedResponse,
};
