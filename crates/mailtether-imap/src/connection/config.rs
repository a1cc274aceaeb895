//! Connection configuration types.

use std::time::Duration;

use crate::command::DEFAULT_TAG_PREFIX;

/// Default IMAP port (plaintext and STARTTLS).
pub const DEFAULT_PORT: u16 = 143;

/// Default IMAPS port (implicit TLS).
pub const DEFAULT_TLS_PORT: u16 = 993;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS right after the greeting (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => DEFAULT_PORT,
            Self::Implicit => DEFAULT_TLS_PORT,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Time allowed for TCP connect, TLS handshake and greeting.
    pub connect_timeout: Duration,
    /// Prefix for command tags.
    pub tag_prefix: String,
    /// Default timeout for [`Connection::idle`](super::Connection::idle);
    /// `None` idles until the handler or another task ends it.
    pub idle_timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration using the default port of `security`.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        ConfigBuilder::new(host).security(security).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    tag_prefix: String,
    idle_timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            idle_timeout: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the default IDLE timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the command tag prefix.
    #[must_use]
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            tag_prefix: self.tag_prefix,
            idle_timeout: self.idle_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com", Security::Implicit);
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, DEFAULT_TLS_PORT);
        assert_eq!(config.tag_prefix, "A");
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .port(1143)
            .security(Security::None)
            .connect_timeout(Duration::from_secs(10))
            .idle_timeout(Some(Duration::from_secs(600)))
            .tag_prefix("T")
            .build();

        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.tag_prefix, "T");
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();

        assert_eq!(config.port, DEFAULT_PORT);
    }
}
