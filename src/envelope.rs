//! SMTP envelope representation

use crate::{error::Error, sanitize::Address};

/// Envelope addressing handed to the transport
///
/// Built from sanitized addresses only; the forward path can not be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The envelope recipients' addresses
    forward_path: Vec<Address>,
    /// The envelope sender address
    reverse_path: Option<Address>,
}

impl Envelope {
    /// Creates a new envelope, which fails if `to` is empty
    pub fn new(from: Option<Address>, to: Vec<Address>) -> Result<Envelope, Error> {
        if to.is_empty() {
            return Err(Error::MissingRecipients);
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from,
        })
    }

    /// Destination addresses of the envelope
    pub fn to(&self) -> &[Address] {
        self.forward_path.as_slice()
    }

    /// Sender of the envelope
    pub fn from(&self) -> Option<&Address> {
        self.reverse_path.as_ref()
    }

    /// Whether any address requires the `SMTPUTF8` extension
    pub fn has_non_ascii_addresses(&self) -> bool {
        self.reverse_path
            .iter()
            .chain(self.forward_path.iter())
            .any(|a| !a.is_ascii())
    }
}
