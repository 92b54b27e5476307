//! Email composition
//!
//! A [`Message`] is assembled through [`MessageBuilder`] and rendered to a
//! complete MIME document with [`Message::formatted`]. The structure of the
//! document follows from what the message carries:
//!
//! * text body only: a single `text/plain` part
//! * body plus attachments: `multipart/mixed`
//! * body plus alternatives: `multipart/alternative`
//! * body plus alternatives plus attachments: `multipart/mixed` wrapping
//!   a `multipart/alternative`
//!
//! ```
//! use ezmail::message::Message;
//!
//! let message = Message::builder()
//!     .subject("Hello")
//!     .recipient("to@example.com")
//!     .sender("from@example.com")
//!     .body("Hi there")
//!     .build();
//! let rendered = message.formatted().unwrap();
//! ```

use std::time::SystemTime;

use uuid::Uuid;

use self::{
    headers::{HeaderName, Headers},
    mime::{EmailFormat, MultiPart, Part, SinglePart},
};
pub use self::{
    attachment::{Attachment, Disposition},
    body::Encoding,
};
use crate::{
    error::Error,
    sanitize::{has_newline, sanitize, sanitize_many},
};

pub mod attachment;
mod body;
mod headers;
mod mime;

/// An email message
///
/// The message id and the multipart boundary seed are generated at build
/// time and never change, so once a timestamp is assigned the rendered
/// document is byte-for-byte stable across repeated calls to
/// [`formatted`].
///
/// [`formatted`]: Message::formatted
#[derive(Debug, Clone)]
pub struct Message {
    subject: String,
    recipients: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    sender: Option<String>,
    reply_to: Option<String>,
    body: Option<String>,
    alternatives: Vec<(String, String)>,
    attachments: Vec<Attachment>,
    message_id: String,
    boundary: String,
    date: Option<SystemTime>,
    charset: String,
    extra_headers: Vec<(String, String)>,
    mail_options: Vec<String>,
    rcpt_options: Vec<String>,
    ascii_attachments: bool,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn date(&self) -> Option<SystemTime> {
        self.date
    }

    /// The `text/html` alternative, if one was set
    pub fn html(&self) -> Option<&str> {
        self.alternatives
            .iter()
            .find(|(subtype, _)| subtype == "html")
            .map(|(_, content)| content.as_str())
    }

    pub fn mail_options(&self) -> &[String] {
        &self.mail_options
    }

    pub fn rcpt_options(&self) -> &[String] {
        &self.rcpt_options
    }

    pub fn add_recipient(&mut self, address: impl Into<String>) {
        self.recipients.push(address.into());
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Sets the `text/html` alternative, replacing a previous one in place
    pub fn set_html(&mut self, content: impl Into<String>) {
        set_alternative(&mut self.alternatives, "html".into(), content.into());
    }

    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    pub fn set_date(&mut self, date: SystemTime) {
        self.date = Some(date);
    }

    /// Every address the message is delivered to
    ///
    /// The union of recipients, cc and bcc, de-duplicated while keeping
    /// the position of the first occurrence.
    pub fn send_to(&self) -> Vec<String> {
        let mut all = Vec::new();
        for address in self
            .recipients
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
        {
            if !all.contains(address) {
                all.push(address.clone());
            }
        }
        all
    }

    /// Whether any header field would allow injecting additional headers
    ///
    /// Addresses must not contain line breaks at all. A subject may span
    /// several lines, but only when every break is a `CRLF` followed by
    /// whitespace and no line is blank.
    pub fn has_bad_headers(&self) -> bool {
        let addresses = self
            .sender
            .iter()
            .chain(self.reply_to.iter())
            .map(String::as_str)
            .chain(self.recipients.iter().map(String::as_str));
        for address in addresses {
            if has_newline(address) {
                return true;
            }
        }

        if !self.subject.is_empty() && has_newline(&self.subject) {
            for (index, line) in self.subject.split("\r\n").enumerate() {
                if line.is_empty() {
                    return true;
                }
                if index > 0 && !line.starts_with(['\t', ' ']) {
                    return true;
                }
                if has_newline(line) {
                    return true;
                }
                if line.trim().is_empty() {
                    return true;
                }
            }
        }

        false
    }

    /// Renders the complete MIME document
    ///
    /// This is the canonical serialization; [`as_string`][Message::as_string]
    /// is a view of the same bytes. When no timestamp has been assigned
    /// the current time is used, without storing it back.
    pub fn formatted(&self) -> Result<Vec<u8>, Error> {
        let sender = self.sender.as_deref().ok_or(Error::MissingSender)?;

        let mut headers = Headers::new();
        if !self.subject.is_empty() {
            headers.set(HeaderName::from_static("Subject"), self.subject.clone());
        }
        headers.set(
            HeaderName::from_static("From"),
            sanitize(sender)?.to_string(),
        );
        if !self.recipients.is_empty() {
            headers.set(
                HeaderName::from_static("To"),
                join_addresses(&self.recipients)?,
            );
        }

        let date = self.date.unwrap_or_else(SystemTime::now);
        headers.set(HeaderName::from_static("Date"), rfc5322_date(date));
        headers.set(
            HeaderName::from_static("Message-ID"),
            self.message_id.clone(),
        );

        if !self.cc.is_empty() {
            headers.set(HeaderName::from_static("Cc"), join_addresses(&self.cc)?);
        }
        if let Some(reply_to) = &self.reply_to {
            headers.set(
                HeaderName::from_static("Reply-To"),
                sanitize(reply_to)?.to_string(),
            );
        }
        for (name, value) in &self.extra_headers {
            headers.append(HeaderName::new(name), value.clone());
        }

        let part = self.part_tree()?;
        if matches!(part, Part::Multi(_)) {
            headers.set(HeaderName::from_static("MIME-Version"), "1.0".into());
        }

        let mut out = Vec::new();
        out.extend_from_slice(headers.to_string().as_bytes());
        part.format(&mut out);
        Ok(out)
    }

    /// The rendered document as text
    pub fn as_string(&self) -> Result<String, Error> {
        let bytes = self.formatted()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn part_tree(&self) -> Result<Part, Error> {
        let plain = SinglePart::plain(self.body.as_deref().unwrap_or(""), &self.charset);

        let content = if self.alternatives.is_empty() {
            Part::Single(plain)
        } else {
            let mut alternative = MultiPart::with_boundary(
                mime::MultiPartKind::Alternative,
                format!("{}.alt", self.boundary),
            )
            .singlepart(plain);
            for (subtype, body) in &self.alternatives {
                alternative = alternative.singlepart(match subtype.as_str() {
                    "html" => SinglePart::html(body, &self.charset),
                    subtype => SinglePart::new(
                        format!("text/{subtype}; charset={}", self.charset),
                        body::EncodedBody::text(body),
                    ),
                });
            }
            Part::Multi(alternative)
        };

        if self.attachments.is_empty() {
            return Ok(content);
        }

        let mixed = MultiPart::with_boundary(mime::MultiPartKind::Mixed, self.boundary.clone());
        let mut mixed = match content {
            Part::Single(part) => mixed.singlepart(part),
            Part::Multi(part) => mixed.multipart(part),
        };
        for attachment in &self.attachments {
            mixed = mixed.singlepart(attachment.to_part(self.ascii_attachments)?);
        }
        Ok(Part::Multi(mixed))
    }
}

// httpdate always appends ` GMT`, an obsolete zone under RFC 5322, so
// rewrite it to the numeric `-0000` form
fn rfc5322_date(date: SystemTime) -> String {
    let mut formatted = httpdate::fmt_http_date(date);
    if formatted.ends_with(" GMT") {
        formatted.truncate(formatted.len() - "GMT".len());
        formatted.push_str("-0000");
    }
    formatted
}

fn join_addresses(addresses: &[String]) -> Result<String, Error> {
    let sanitized = sanitize_many(addresses.iter().map(String::as_str))?;
    let mut unique = Vec::<&str>::with_capacity(sanitized.len());
    for address in &sanitized {
        if !unique.contains(&address.as_ref()) {
            unique.push(address.as_ref());
        }
    }
    Ok(unique.join(", "))
}

fn set_alternative(alternatives: &mut Vec<(String, String)>, subtype: String, content: String) {
    match alternatives
        .iter_mut()
        .find(|(subtype_, _)| *subtype_ == subtype)
    {
        Some((_, current)) => *current = content,
        None => alternatives.push((subtype, content)),
    }
}

/// Builder for [`Message`]
///
/// All fields have usable defaults; `build` never fails. Precondition
/// checks such as a missing sender are reported when the message is
/// rendered or sent.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    subject: String,
    recipients: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    sender: Option<String>,
    reply_to: Option<String>,
    body: Option<String>,
    alternatives: Vec<(String, String)>,
    attachments: Vec<Attachment>,
    date: Option<SystemTime>,
    charset: Option<String>,
    extra_headers: Vec<(String, String)>,
    mail_options: Vec<String>,
    rcpt_options: Vec<String>,
    ascii_attachments: bool,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Adds a `To` recipient
    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Sets the plain text body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the `text/html` alternative
    pub fn html(mut self, content: impl Into<String>) -> Self {
        set_alternative(&mut self.alternatives, "html".into(), content.into());
        self
    }

    /// Adds a `text/<subtype>` alternative, replacing one with the same
    /// subtype in place
    pub fn alternative(mut self, subtype: impl Into<String>, content: impl Into<String>) -> Self {
        set_alternative(&mut self.alternatives, subtype.into(), content.into());
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn date(mut self, date: SystemTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Charset used for text parts, `utf-8` by default
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Adds an extra header, written after the standard ones
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Adds an ESMTP parameter to the `MAIL FROM` command
    pub fn mail_option(mut self, option: impl Into<String>) -> Self {
        self.mail_options.push(option.into());
        self
    }

    /// Adds an ESMTP parameter to every `RCPT TO` command
    pub fn rcpt_option(mut self, option: impl Into<String>) -> Self {
        self.rcpt_options.push(option.into());
        self
    }

    /// Forces attachment filenames to their closest ASCII form
    pub fn ascii_attachments(mut self, ascii: bool) -> Self {
        self.ascii_attachments = ascii;
        self
    }

    pub fn build(self) -> Message {
        Message {
            subject: self.subject,
            recipients: self.recipients,
            cc: self.cc,
            bcc: self.bcc,
            sender: self.sender,
            reply_to: self.reply_to,
            body: self.body,
            alternatives: self.alternatives,
            attachments: self.attachments,
            message_id: make_message_id(),
            boundary: mime::make_boundary(),
            date: self.date,
            charset: self.charset.unwrap_or_else(|| "utf-8".to_owned()),
            extra_headers: self.extra_headers,
            mail_options: self.mail_options,
            rcpt_options: self.rcpt_options,
            ascii_attachments: self.ascii_attachments,
        }
    }
}

fn make_message_id() -> String {
    let hostname = hostname::get()
        .map_err(|_| ())
        .and_then(|hostname| hostname.into_string().map_err(|_| ()))
        .unwrap_or_else(|()| "localhost".to_owned());
    format!("<{}@{}>", Uuid::new_v4(), hostname)
}
