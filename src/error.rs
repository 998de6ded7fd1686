use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ws::session::{Operation, SessionState};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Error opening the connection: DNS, refusal, handshake or connect timeout
    Connection,
    /// Operation attempted on a session that is not open
    NotConnected,
    /// Transport failure while writing a message
    Send,
    /// Transport failure or unusable frame while reading a message
    Receive,
    /// A send or receive exceeded its time bound
    Timeout,
    /// Another operation of the same kind is already in flight on the session
    Busy,
    /// Invalid input, rejected before any I/O
    Validation,
    /// Internal error, e.g. a background worker that is no longer running
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    #[must_use]
    pub fn not_connected(state: SessionState) -> Self {
        NotConnected { state }.into()
    }

    #[must_use]
    pub fn busy(operation: Operation) -> Self {
        Busy { operation }.into()
    }

    #[must_use]
    pub fn timeout(operation: Operation, after: Duration) -> Self {
        Timeout { operation, after }.into()
    }

    /// Returns `true` when this error came from an exceeded time bound, including a
    /// connect attempt that timed out (reported with [`Kind::Connection`]).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == Kind::Timeout || self.downcast_ref::<Timeout>().is_some()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct NotConnected {
    pub state: SessionState,
}

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session is not open (state: {})", self.state)
    }
}

impl StdError for NotConnected {}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct Busy {
    pub operation: Operation,
}

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {} is already in flight on this session", self.operation)
    }
}

impl StdError for Busy {}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    pub operation: Operation,
    pub after: Duration,
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} timed out after {:?}", self.operation, self.after)
    }
}

impl StdError for Timeout {}

/// Cloneable snapshot of an [`Error`], kept as a session's last error and handed to
/// front ends for status display.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: Kind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<NotConnected> for Error {
    fn from(err: NotConnected) -> Self {
        Error::with_source(Kind::NotConnected, err)
    }
}

impl From<Busy> for Error {
    fn from(err: Busy) -> Self {
        Error::with_source(Kind::Busy, err)
    }
}

impl From<Timeout> for Error {
    fn from(err: Timeout) -> Self {
        Error::with_source(Kind::Timeout, err)
    }
}
