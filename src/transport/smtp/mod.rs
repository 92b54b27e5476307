//! Delivery over SMTP
//!
//! [`SmtpTransport`] drives an [`SmtpConnection`](client) through the
//! full submission sequence: connect (optionally through an implicit TLS
//! wrapper), EHLO, STARTTLS when requested, authenticate, then one
//! `MAIL FROM` / `RCPT TO` / `DATA` exchange per message. The connection
//! is opened lazily and kept until [`close`](crate::Transport::close).
//!
//! ```no_run
//! use ezmail::transport::{smtp::{SmtpTransport, Tls}, Transport};
//!
//! let mut transport = SmtpTransport::builder("smtp.example.com")
//!     .port(587)
//!     .tls(Tls::Starttls)
//!     .credentials(("user", "password"))
//!     .build();
//! transport.open().unwrap();
//! ```

use std::time::Duration;

use native_tls::{Protocol, TlsConnector};

use self::{
    authentication::{Credentials, DEFAULT_MECHANISMS},
    client::SmtpConnection,
    commands::{Data, Mail, Noop, Rcpt},
    extension::{ClientId, Extension},
};
pub use self::error::Error;
use crate::{envelope::Envelope, transport::Transport};

pub mod authentication;
mod client;
pub mod commands;
mod error;
pub mod extension;
pub mod response;

/// Default SMTP port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;
/// Default submission-over-TLS port
pub const SUBMISSIONS_PORT: u16 = 465;

/// How long to wait for the server before giving up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tls {
    /// Plaintext only
    None,
    /// Plaintext connection upgraded with the STARTTLS command
    Starttls,
    /// TLS from the first byte
    Wrapper,
}

/// A [`Transport`] speaking RFC 5321 over TCP
pub struct SmtpTransport {
    server: String,
    port: u16,
    client_id: ClientId,
    credentials: Option<Credentials>,
    tls: Tls,
    timeout: Option<Duration>,
    connection: Option<SmtpConnection>,
}

impl SmtpTransport {
    /// Starts building a transport for the given server
    pub fn builder(server: impl Into<String>) -> SmtpTransportBuilder {
        SmtpTransportBuilder {
            server: server.into(),
            port: SMTP_PORT,
            client_id: ClientId::hostname(),
            credentials: None,
            tls: Tls::None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Checks that the server still answers, opening if necessary
    pub fn test_connection(&mut self) -> Result<bool, Error> {
        self.open()?;
        match &mut self.connection {
            Some(connection) => Ok(connection.command(Noop)?.is_positive()),
            None => Ok(false),
        }
    }

    fn connect(&mut self) -> Result<(), Error> {
        let connector = match self.tls {
            Tls::None => None,
            Tls::Starttls | Tls::Wrapper => Some(
                TlsConnector::builder()
                    .min_protocol_version(Some(Protocol::Tlsv12))
                    .build()
                    .map_err(error::tls)?,
            ),
        };

        let implicit_tls = match self.tls {
            Tls::Wrapper => connector.as_ref(),
            _ => None,
        };
        let mut connection =
            SmtpConnection::connect(&self.server, self.port, self.timeout, implicit_tls)?;
        connection.ehlo(&self.client_id)?;

        if let (Tls::Starttls, Some(connector)) = (self.tls, connector.as_ref()) {
            if !connection.server_info().supports_feature(Extension::StartTls) {
                return Err(error::client("server does not support STARTTLS"));
            }
            connection.starttls(connector, &self.server)?;
            // the session state resets with the TLS layer
            connection.ehlo(&self.client_id)?;
        }

        if let Some(credentials) = &self.credentials {
            if self.tls != Tls::None && !connection.is_encrypted() {
                return Err(error::client("refusing to authenticate without encryption"));
            }
            connection.auth(DEFAULT_MECHANISMS, credentials)?;
        }

        self.connection = Some(connection);
        Ok(())
    }
}

impl Transport for SmtpTransport {
    type Error = Error;

    fn open(&mut self) -> Result<(), Error> {
        if self.connection.is_some() {
            return Ok(());
        }
        self.connect()
    }

    fn send_raw(
        &mut self,
        envelope: &Envelope,
        email: &[u8],
        mail_options: &[String],
        rcpt_options: &[String],
    ) -> Result<(), Error> {
        self.open()?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| error::client("connection not open"))?;

        let mut mail_parameters = mail_options.to_vec();
        if envelope.has_non_ascii_addresses() {
            if !connection
                .server_info()
                .supports_feature(Extension::SmtpUtf8)
            {
                return Err(error::client(
                    "envelope has non-ascii addresses but the server does not support SMTPUTF8",
                ));
            }
            mail_parameters.push("SMTPUTF8".to_owned());
        }
        if !email.is_ascii()
            && connection
                .server_info()
                .supports_feature(Extension::EightBitMime)
        {
            mail_parameters.push("BODY=8BITMIME".to_owned());
        }

        connection.command(Mail::new(envelope.from().cloned(), mail_parameters))?;
        for recipient in envelope.to() {
            connection.command(Rcpt::new(recipient.clone(), rcpt_options.to_vec()))?;
        }
        connection.command(Data)?;
        connection.message(email)?;
        tracing::debug!(recipients = envelope.to().len(), "message accepted");
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(mut connection) = self.connection.take() {
            connection.quit()?;
        }
        Ok(())
    }
}

/// Builder for [`SmtpTransport`]
#[derive(Debug, Clone)]
pub struct SmtpTransportBuilder {
    server: String,
    port: u16,
    client_id: ClientId,
    credentials: Option<Credentials>,
    tls: Tls,
    timeout: Option<Duration>,
}

impl SmtpTransportBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Identity announced in EHLO, the local hostname by default
    pub fn client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn credentials(mut self, credentials: impl Into<Credentials>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn tls(mut self, tls: Tls) -> Self {
        self.tls = tls;
        self
    }

    /// Connect/read/write timeout, `None` to block indefinitely
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> SmtpTransport {
        SmtpTransport {
            server: self.server,
            port: self.port,
            client_id: self.client_id,
            credentials: self.credentials,
            tls: self.tls,
            timeout: self.timeout,
            connection: None,
        }
    }
}
