//! ezmail is a library for composing MIME email and delivering it over SMTP.
//!
//! It splits the job into three layers:
//!
//! * [`message`] builds well-formed documents: plain text, HTML
//!   alternatives, attachments with binary-safe encoding, extra headers,
//!   with header-injection attempts rejected before anything is sent.
//! * [`transport`] moves rendered bytes. [`SmtpTransport`] speaks
//!   RFC 5321 with STARTTLS, implicit TLS and PLAIN/LOGIN authentication;
//!   the [`Transport`] trait lets tests substitute a recording stub.
//! * [`Mailer`] and [`MailSession`] tie the two together: a mailer holds
//!   the host configuration, a session owns one live connection, reuses
//!   it across sends and recycles it after a configurable quota.
//!
//! # Example
//!
//! ```no_run
//! use ezmail::{Mailer, message::Message};
//!
//! let mailer = Mailer::builder("smtp.example.com")
//!     .port(587)
//!     .use_tls(true)
//!     .username("user")
//!     .password("password")
//!     .default_sender("noreply@example.com")
//!     .build();
//!
//! let mut message = Message::builder()
//!     .subject("Greetings")
//!     .recipient("to@example.com")
//!     .body("Plain text")
//!     .html("<p>Rich text</p>")
//!     .build();
//!
//! mailer.send(&mut message).unwrap();
//! ```
//!
//! # Testing without a server
//!
//! Suppressed mode never connects but still validates and renders, and an
//! [`Outbox`](observer::Outbox) records what would have been sent:
//!
//! ```
//! use ezmail::{Mailer, message::Message};
//!
//! let mailer = Mailer::builder("smtp.example.com").suppress(true).build();
//! let outbox = mailer.record_messages();
//!
//! let mut message = Message::builder()
//!     .subject("dry run")
//!     .recipient("to@example.com")
//!     .sender("from@example.com")
//!     .build();
//! mailer.send(&mut message).unwrap();
//!
//! assert_eq!(outbox.len(), 1);
//! ```

#![forbid(unsafe_code)]

pub use crate::{
    envelope::Envelope,
    error::Error,
    message::{Message, MessageBuilder},
    sanitize::Address,
    session::{MailSession, Mailer, MailerBuilder},
    transport::{smtp::SmtpTransport, Transport},
};

pub mod envelope;
mod error;
pub mod message;
pub mod observer;
pub mod sanitize;
pub mod session;
pub mod transport;

/// Boxed error propagated out of transports
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
