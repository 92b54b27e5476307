//! Mailer configuration and scoped send sessions
//!
//! A [`Mailer`] holds everything needed to reach one SMTP host. It hands
//! out [`MailSession`]s, each owning a live transport that is reused for
//! consecutive sends and closed when the session goes out of scope,
//! however the scope exits.
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
//! let mut session = mailer.session().unwrap();
//! for address in ["a@example.com", "b@example.com"] {
//!     let mut message = Message::builder()
//!         .subject("hello")
//!         .recipient(address)
//!         .body("hi")
//!         .build();
//!     session.send(&mut message).unwrap();
//! }
//! ```

use std::time::{Duration, SystemTime};

use crate::{
    envelope::Envelope,
    error,
    error::Error,
    message::{Message, MessageBuilder},
    observer::{DispatchObserver, Outbox},
    sanitize::{sanitize, sanitize_many},
    transport::{
        smtp::{SmtpTransport, Tls, DEFAULT_TIMEOUT, SMTP_PORT},
        Transport,
    },
};

/// Configuration for one SMTP host
///
/// Cheap to clone conceptually but deliberately not `Clone`: the observer
/// handle inside is shared, so pass the mailer by reference instead.
#[derive(Debug)]
pub struct Mailer {
    server: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    use_tls: bool,
    use_ssl: bool,
    debug: bool,
    max_emails: Option<usize>,
    suppress: bool,
    default_sender: Option<String>,
    timeout: Option<Duration>,
    observer: DispatchObserver,
}

impl Mailer {
    pub fn builder(server: impl Into<String>) -> MailerBuilder {
        MailerBuilder {
            server: server.into(),
            port: SMTP_PORT,
            username: None,
            password: None,
            use_tls: false,
            use_ssl: false,
            debug: false,
            max_emails: None,
            suppress: false,
            default_sender: None,
            timeout: Some(DEFAULT_TIMEOUT),
            observer: DispatchObserver::new(),
        }
    }

    /// The observer every session of this mailer notifies
    pub fn observer(&self) -> &DispatchObserver {
        &self.observer
    }

    /// Starts recording every dispatched message
    ///
    /// Works in suppressed mode too, which is what makes dry-run tests
    /// observable.
    pub fn record_messages(&self) -> Outbox {
        self.observer.record()
    }

    /// Opens a session against the configured host
    ///
    /// In suppressed mode no connection is made and sends become dry
    /// runs that still validate, render and notify.
    pub fn session(&self) -> Result<MailSession<SmtpTransport>, Error> {
        if self.suppress {
            return Ok(MailSession::dry(
                self.max_emails,
                self.default_sender.clone(),
                self.debug,
                self.observer.clone(),
            ));
        }

        // an implicit TLS wrapper makes STARTTLS redundant
        let tls = if self.use_ssl {
            Tls::Wrapper
        } else if self.use_tls {
            Tls::Starttls
        } else {
            Tls::None
        };

        let mut builder = SmtpTransport::builder(&self.server)
            .port(self.port)
            .tls(tls)
            .timeout(self.timeout);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.credentials((username.clone(), password.clone()));
        }

        MailSession::open(
            builder.build(),
            self.max_emails,
            self.default_sender.clone(),
            self.debug,
            self.observer.clone(),
        )
    }

    /// Sends a single message over a short-lived session
    pub fn send(&self, message: &mut Message) -> Result<(), Error> {
        let mut session = self.session()?;
        session.send(message)?;
        session.close()
    }

    /// Builds and sends in one step, returning the sent message
    pub fn send_message(&self, builder: MessageBuilder) -> Result<Message, Error> {
        let mut message = builder.build();
        self.send(&mut message)?;
        Ok(message)
    }
}

/// Builder for [`Mailer`]
///
/// Every knob has an explicit default: port 25, no TLS, no credentials,
/// no quota, not suppressed, 60 second timeout.
#[derive(Debug)]
pub struct MailerBuilder {
    server: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    use_tls: bool,
    use_ssl: bool,
    debug: bool,
    max_emails: Option<usize>,
    suppress: bool,
    default_sender: Option<String>,
    timeout: Option<Duration>,
    observer: DispatchObserver,
}

impl MailerBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Upgrade the connection with STARTTLS
    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Speak TLS from the first byte, as on port 465
    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Log every dispatch at debug level
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Recycle the connection after this many sends, 0 for never
    pub fn max_emails(mut self, max_emails: usize) -> Self {
        self.max_emails = (max_emails > 0).then_some(max_emails);
        self
    }

    /// Validate, render and notify, but never connect
    pub fn suppress(mut self, suppress: bool) -> Self {
        self.suppress = suppress;
        self
    }

    /// Sender used for messages that do not carry one
    pub fn default_sender(mut self, sender: impl Into<String>) -> Self {
        self.default_sender = Some(sender.into());
        self
    }

    /// Connect/read/write timeout, `None` to block indefinitely
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share an existing observer instead of the mailer's own
    pub fn observer(mut self, observer: DispatchObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> Mailer {
        Mailer {
            server: self.server,
            port: self.port,
            username: self.username,
            password: self.password,
            use_tls: self.use_tls,
            use_ssl: self.use_ssl,
            debug: self.debug,
            max_emails: self.max_emails,
            suppress: self.suppress,
            default_sender: self.default_sender,
            timeout: self.timeout,
            observer: self.observer,
        }
    }
}

/// A scoped owner of one transport connection
///
/// Created by [`Mailer::session`], or directly over any [`Transport`]
/// implementation. The transport is closed on [`close`][MailSession::close]
/// and again, safely, on drop.
pub struct MailSession<T: Transport> {
    transport: Option<T>,
    num_emails: usize,
    max_emails: Option<usize>,
    default_sender: Option<String>,
    debug: bool,
    observer: DispatchObserver,
}

impl<T: Transport> MailSession<T> {
    /// Opens the transport and wraps it in a session
    ///
    /// A quota of `Some(0)` means no quota, like `None`.
    pub fn open(
        mut transport: T,
        max_emails: Option<usize>,
        default_sender: Option<String>,
        debug: bool,
        observer: DispatchObserver,
    ) -> Result<Self, Error> {
        transport.open().map_err(error::transport)?;
        Ok(Self {
            transport: Some(transport),
            num_emails: 0,
            max_emails: max_emails.filter(|&quota| quota > 0),
            default_sender,
            debug,
            observer,
        })
    }

    /// A session without a transport: sends validate, render and notify
    /// but nothing leaves the process
    pub fn dry(
        max_emails: Option<usize>,
        default_sender: Option<String>,
        debug: bool,
        observer: DispatchObserver,
    ) -> Self {
        Self {
            transport: None,
            num_emails: 0,
            max_emails: max_emails.filter(|&quota| quota > 0),
            default_sender,
            debug,
            observer,
        }
    }

    /// Sends a message, using its own sender as the envelope sender
    pub fn send(&mut self, message: &mut Message) -> Result<(), Error> {
        self.send_from(None, message)
    }

    /// Sends a message with an explicit envelope sender
    ///
    /// Preconditions are checked before anything touches the wire: the
    /// message must have recipients, a sender (the mailer default is
    /// filled in here if the message has none) and injection-free
    /// headers. A missing timestamp is assigned now and stays on the
    /// message.
    pub fn send_from(
        &mut self,
        envelope_sender: Option<&str>,
        message: &mut Message,
    ) -> Result<(), Error> {
        let recipients = message.send_to();
        if recipients.is_empty() {
            return Err(Error::MissingRecipients);
        }

        let sender = match message.sender() {
            Some(sender) => sender.to_owned(),
            None => {
                let default = self
                    .default_sender
                    .clone()
                    .ok_or(Error::MissingSender)?;
                message.set_sender(default.clone());
                default
            }
        };

        if message.has_bad_headers() {
            return Err(error::bad_header(
                "a header field contains an unfolded line break",
            ));
        }

        if message.date().is_none() {
            message.set_date(SystemTime::now());
        }

        if let Some(transport) = &mut self.transport {
            let reverse_path = sanitize(envelope_sender.unwrap_or(&sender))?;
            let forward_paths = sanitize_many(recipients.iter().map(String::as_str))?;
            let envelope = Envelope::new(Some(reverse_path), forward_paths)?;
            let email = message.formatted()?;

            transport
                .send_raw(
                    &envelope,
                    &email,
                    message.mail_options(),
                    message.rcpt_options(),
                )
                .map_err(error::transport)?;
        } else {
            // dry runs still have to produce a valid document
            message.formatted()?;
        }

        if self.debug {
            tracing::debug!(
                message_id = message.message_id(),
                recipients = recipients.len(),
                dry = self.transport.is_none(),
                "message dispatched"
            );
        }

        self.observer.notify(message);
        self.num_emails += 1;

        if Some(self.num_emails) == self.max_emails {
            self.num_emails = 0;
            self.recycle()?;
        }
        Ok(())
    }

    /// Builds and sends in one step, returning the sent message
    pub fn send_message(&mut self, builder: MessageBuilder) -> Result<Message, Error> {
        let mut message = builder.build();
        self.send(&mut message)?;
        Ok(message)
    }

    /// Closes the transport and reopens it, resetting server-side state
    ///
    /// A failure to close is logged and ignored; the connection is being
    /// replaced anyway. A failure to reopen is reported.
    fn recycle(&mut self) -> Result<(), Error> {
        if let Some(transport) = &mut self.transport {
            if let Err(err) = transport.close() {
                tracing::debug!(error = %err, "ignoring close failure while recycling");
            }
            transport.open().map_err(error::transport)?;
            tracing::debug!("connection recycled after reaching the send quota");
        }
        Ok(())
    }

    /// Closes the transport now, reporting any failure
    ///
    /// Dropping the session closes it too, but swallows errors.
    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(mut transport) = self.transport.take() {
            transport.close().map_err(error::transport)?;
        }
        Ok(())
    }
}

impl<T: Transport> Drop for MailSession<T> {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close() {
                tracing::debug!(error = %err, "close failed while dropping session");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::MailSession;
    use crate::{
        error::Error,
        message::Message,
        observer::DispatchObserver,
        transport::stub::StubTransport,
    };

    fn session_over(
        transport: StubTransport,
        max_emails: Option<usize>,
    ) -> MailSession<StubTransport> {
        MailSession::open(
            transport,
            max_emails,
            Some("default@example.com".to_owned()),
            false,
            DispatchObserver::new(),
        )
        .unwrap()
    }

    fn message() -> Message {
        Message::builder()
            .subject("test")
            .recipient("to@example.com")
            .sender("from@example.com")
            .body("body")
            .build()
    }

    #[test]
    fn sends_through_the_transport() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), None);

        session.send(&mut message()).unwrap();

        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.from().unwrap().as_ref(), "from@example.com");
        assert_eq!(sent[0].0.to()[0].as_ref(), "to@example.com");
    }

    #[test]
    fn missing_recipients_fail_before_any_io() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), None);
        let mut message = Message::builder().sender("from@example.com").build();

        assert!(matches!(
            session.send(&mut message),
            Err(Error::MissingRecipients)
        ));
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn default_sender_is_filled_in() {
        let mut session = session_over(StubTransport::new(), None);
        let mut message = Message::builder()
            .recipient("to@example.com")
            .body("body")
            .build();

        session.send(&mut message).unwrap();
        assert_eq!(message.sender(), Some("default@example.com"));
    }

    #[test]
    fn no_sender_anywhere_fails() {
        let mut session = MailSession::open(
            StubTransport::new(),
            None,
            None,
            false,
            DispatchObserver::new(),
        )
        .unwrap();
        let mut message = Message::builder().recipient("to@example.com").build();

        assert!(matches!(
            session.send(&mut message),
            Err(Error::MissingSender)
        ));
    }

    #[test]
    fn bad_headers_abort_the_send() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), None);
        let mut message = Message::builder()
            .subject("hi\nBcc: sneak@example.com")
            .recipient("to@example.com")
            .sender("from@example.com")
            .build();

        assert!(matches!(
            session.send(&mut message),
            Err(Error::BadHeader(_))
        ));
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn date_is_assigned_once() {
        let mut session = session_over(StubTransport::new(), None);
        let mut message = message();
        assert!(message.date().is_none());

        session.send(&mut message).unwrap();
        let assigned = message.date().unwrap();

        session.send(&mut message).unwrap();
        assert_eq!(message.date(), Some(assigned));
    }

    #[test]
    fn envelope_sender_override_leaves_headers_alone() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), None);
        let mut message = message();

        session
            .send_from(Some("bounces@example.com"), &mut message)
            .unwrap();

        let sent = transport.messages();
        assert_eq!(sent[0].0.from().unwrap().as_ref(), "bounces@example.com");
        let rendered = String::from_utf8_lossy(&sent[0].1).into_owned();
        assert!(rendered.contains("From: from@example.com\r\n"));
    }

    #[test]
    fn quota_recycles_exactly_on_the_boundary() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), Some(2));

        // open() from the constructor
        assert_eq!(transport.opens(), 1);

        session.send(&mut message()).unwrap();
        assert_eq!(transport.closes(), 0);

        session.send(&mut message()).unwrap();
        assert_eq!(transport.closes(), 1);
        assert_eq!(transport.opens(), 2);

        session.send(&mut message()).unwrap();
        assert_eq!(transport.closes(), 1);

        session.send(&mut message()).unwrap();
        assert_eq!(transport.closes(), 2);
        assert_eq!(transport.opens(), 3);
    }

    #[test]
    fn zero_quota_means_unlimited() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), Some(0));

        for _ in 0..5 {
            session.send(&mut message()).unwrap();
        }
        assert_eq!(transport.closes(), 0);
    }

    #[test]
    fn drop_closes_the_transport() {
        let transport = StubTransport::new();
        {
            let _session = session_over(transport.clone(), None);
        }
        assert_eq!(transport.closes(), 1);
    }

    #[test]
    fn close_after_drop_is_idempotent() {
        let transport = StubTransport::new();
        let mut session = session_over(transport.clone(), None);
        session.close().unwrap();
        drop(session);
        assert_eq!(transport.closes(), 1);
    }

    #[test]
    fn dry_session_notifies_but_sends_nothing() {
        let observer = DispatchObserver::new();
        let outbox = observer.record();
        let mut session: MailSession<StubTransport> =
            MailSession::dry(None, Some("default@example.com".to_owned()), false, observer);

        session.send(&mut message()).unwrap();

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.messages()[0].subject(), "test");
    }

    #[test]
    fn failing_transport_error_is_wrapped() {
        let result = MailSession::open(
            StubTransport::new_error(),
            None,
            None,
            false,
            DispatchObserver::new(),
        );
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
