//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, tag prefix)
//! - TCP and TLS transports, plus STARTTLS upgrade
//! - Framed I/O that delimits responses and their literals
//! - A background receive loop that routes every server response
//! - Tagged command dispatch with continuation handling
//! - IDLE support for real-time notifications

mod client;
mod commands;
mod config;
mod framed;
mod idle;
mod receiver;
mod state;
mod stream;

pub use client::Connection;
pub use commands::Fetched;
pub use config::{Config, ConfigBuilder, DEFAULT_PORT, DEFAULT_TLS_PORT, Security};
pub use framed::{FramedReader, FramedWriter};
pub use idle::IdleDone;
pub use state::ConnectionState;
pub use stream::{
    BoxedStream, RustlsUpgrade, TlsUpgrade, Transport, connect_plain, connect_tls,
    default_client_config,
};
