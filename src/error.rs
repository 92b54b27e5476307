use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

use crate::BoxError;

/// Error type for message validation and delivery
#[derive(Debug)]
pub enum Error {
    /// The message has no recipients (To, Cc and Bcc are all empty)
    MissingRecipients,
    /// The message has no sender and no default sender is configured
    MissingSender,
    /// A header field contains a newline that is not valid RFC 5322 folding,
    /// or another header-injection attempt was detected
    BadHeader(String),
    /// An attachment could not be encoded as a MIME part
    AttachmentEncoding(String),
    /// Failure reported by the underlying transport
    Transport(BoxError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingRecipients => f.write_str("no recipients have been added"),
            Error::MissingSender => f.write_str(
                "the message does not specify a sender and no default sender is configured",
            ),
            Error::BadHeader(detail) => write!(f, "bad header: {detail}"),
            Error::AttachmentEncoding(detail) => write!(f, "attachment encoding: {detail}"),
            Error::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

pub(crate) fn bad_header<D: Display>(detail: D) -> Error {
    Error::BadHeader(detail.to_string())
}

pub(crate) fn attachment<D: Display>(detail: D) -> Error {
    Error::AttachmentEncoding(detail.to_string())
}

pub(crate) fn transport<E>(source: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error::Transport(Box::new(source))
}
