//! Error type for the SMTP transport

use std::{error::Error as StdError, fmt};

use crate::{transport::smtp::response::Code, BoxError};

/// An error that can occur while talking to an SMTP server
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// 4xx reply, worth retrying later
    Transient(Code),
    /// 5xx reply, retrying will not help
    Permanent(Code),
    /// Reply could not be parsed or made no sense at this point
    Response,
    /// Misuse detected before anything reached the wire
    Client,
    /// Connecting to the server failed
    Connection,
    /// I/O error on an established connection
    Network,
    /// TLS setup failed
    Tls,
}

impl Error {
    fn new(kind: Kind, source: Option<BoxError>) -> Self {
        Self {
            inner: Box::new(Inner { kind, source }),
        }
    }

    /// Returns true for 4xx replies
    pub fn is_transient(&self) -> bool {
        matches!(self.inner.kind, Kind::Transient(_))
    }

    /// Returns true for 5xx replies
    pub fn is_permanent(&self) -> bool {
        matches!(self.inner.kind, Kind::Permanent(_))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// The reply code, when the server rejected a command
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Transient(code) | Kind::Permanent(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ezmail::transport::smtp::Error");
        debug.field("kind", &self.inner.kind);
        if let Some(source) = &self.inner.source {
            debug.field("source", source);
        }
        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Transient(code) => write!(f, "transient error ({code})")?,
            Kind::Permanent(code) => write!(f, "permanent error ({code})")?,
            Kind::Response => f.write_str("error parsing server response")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Connection => f.write_str("error connecting to server")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Tls => f.write_str("TLS error")?,
        }

        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|source| &**source as _)
    }
}

/// Builds an error from a negative server reply
pub(crate) fn code(code: Code, message: Vec<String>) -> Error {
    let source = if message.is_empty() {
        None
    } else {
        Some(BoxError::from(message.join("; ")))
    };

    use crate::transport::smtp::response::Severity;
    let kind = match code.severity {
        Severity::TransientNegative => Kind::Transient(code),
        Severity::PermanentNegative => Kind::Permanent(code),
        _ => Kind::Response,
    };
    Error::new(kind, source)
}

pub(crate) fn response<E: Into<BoxError>>(source: E) -> Error {
    Error::new(Kind::Response, Some(source.into()))
}

pub(crate) fn client<E: Into<BoxError>>(source: E) -> Error {
    Error::new(Kind::Client, Some(source.into()))
}

pub(crate) fn connection<E: Into<BoxError>>(source: E) -> Error {
    Error::new(Kind::Connection, Some(source.into()))
}

pub(crate) fn network<E: Into<BoxError>>(source: E) -> Error {
    Error::new(Kind::Network, Some(source.into()))
}

pub(crate) fn tls<E: Into<BoxError>>(source: E) -> Error {
    Error::new(Kind::Tls, Some(source.into()))
}
