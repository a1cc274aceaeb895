//! SASL authenticators for the AUTHENTICATE command.
//!
//! The connection handles the base64 framing; an [`Authenticator`] only
//! sees decoded challenges and returns raw response bytes.

/// Produces SASL responses for server challenges.
pub trait Authenticator {
    /// Returns the response to one decoded challenge.
    fn process(&mut self, challenge: &[u8]) -> Vec<u8>;
}

/// PLAIN mechanism (RFC 4616): `\0<username>\0<password>`.
#[derive(Debug, Clone)]
pub struct PlainAuthenticator {
    username: String,
    password: String,
}

impl PlainAuthenticator {
    /// Creates a PLAIN authenticator.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for PlainAuthenticator {
    fn process(&mut self, _challenge: &[u8]) -> Vec<u8> {
        format!("\0{}\0{}", self.username, self.password).into_bytes()
    }
}

/// XOAUTH2 mechanism: `user=<user>\x01auth=Bearer <token>\x01\x01`.
///
/// A failed login makes the server send a JSON error as a second
/// challenge; it is answered with an empty response so the tagged NO
/// follows.
#[derive(Debug, Clone)]
pub struct XOAuth2Authenticator {
    user: String,
    token: String,
    sent: bool,
}

impl XOAuth2Authenticator {
    /// Creates an XOAUTH2 authenticator.
    #[must_use]
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
            sent: false,
        }
    }
}

impl Authenticator for XOAuth2Authenticator {
    fn process(&mut self, _challenge: &[u8]) -> Vec<u8> {
        if std::mem::replace(&mut self.sent, true) {
            return Vec::new();
        }
        format!("user={}\x01auth=Bearer {}\x01\x01", self.user, self.token).into_bytes()
    }
}
