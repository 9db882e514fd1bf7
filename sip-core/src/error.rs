use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error produced while parsing a raw SIP message into the
/// collaborator-supplied `Message` type.
#[derive(Debug, PartialEq, Eq)]
pub struct SipParseError {
    pub message: String,
}

impl fmt::Display for SipParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SipParseError {}

impl SipParseError {
    pub fn new<T: AsRef<str>>(s: T) -> Self {
        Self {
            message: s.as_ref().to_string(),
        }
    }
}

impl From<&str> for SipParseError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SipParseError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] SipParseError),

    #[error("unsupported SIP version '{0}' in response")]
    VersionUnsupported(String),

    #[error("missing required '{0}' header")]
    MissingRequiredHeader(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("receive channel closed")]
    ChannelClosed,

    #[error("no credentials available for {user}@{realm} on {server}")]
    InvalidAccountInfo {
        server: String,
        realm: String,
        user: String,
    },

    #[error("server requested Basic authentication but ALLOW_BASIC_AUTH is disabled")]
    BasicAuthNotAllowed,

    #[error("timed out waiting for a response to {method}")]
    Timeout { method: &'static str },

    #[error("server error {status} persisted after retries")]
    ServerError { status: u16 },

    #[error("unhandled Digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),
}
