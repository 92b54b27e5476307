//! Mail delivery
//!
//! The [`Transport`] trait is the seam between a mail session and the
//! mechanism that actually moves bytes. [`smtp::SmtpTransport`] is the
//! real implementation; [`stub::StubTransport`] records everything it is
//! given and exists for tests.

use crate::envelope::Envelope;

pub mod smtp;
pub mod stub;

/// A connection-oriented mail submission channel
///
/// `open` and `close` bracket a connection; `send_raw` submits one
/// already-rendered message. Implementations are free to treat `open` as
/// a no-op if they connect lazily.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establishes the underlying connection
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Submits a rendered message to every recipient in the envelope
    fn send_raw(
        &mut self,
        envelope: &Envelope,
        email: &[u8],
        mail_options: &[String],
        rcpt_options: &[String],
    ) -> Result<(), Self::Error>;

    /// Tears the connection down
    fn close(&mut self) -> Result<(), Self::Error>;
}
