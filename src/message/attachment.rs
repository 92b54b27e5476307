//! File attachments

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use unicode_normalization::UnicodeNormalization;

use crate::{
    error::{attachment, Error},
    message::{
        body::EncodedBody,
        headers::HeaderName,
        mime::SinglePart,
    },
};

/// Characters escaped in RFC 2231 extended parameter values
///
/// Everything outside `attr-char` (RFC 5987 §3.2.1) gets percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// How the receiving client should present the part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Offered as a downloadable file
    Attachment,
    /// Displayed inside the message body
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

/// A file carried along with a message
///
/// The payload is always transferred as base64, so arbitrary binary
/// content is safe.
#[derive(Debug, Clone)]
pub struct Attachment {
    filename: Option<String>,
    content_type: String,
    data: Vec<u8>,
    disposition: Disposition,
    headers: Vec<(String, String)>,
}

impl Attachment {
    /// Creates an attachment with the given media type and payload
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: None,
            content_type: content_type.into(),
            data,
            disposition: Disposition::Attachment,
            headers: Vec::new(),
        }
    }

    /// Sets the filename shown to the recipient
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the content disposition, `Attachment` by default
    pub fn disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// Adds an extra header to the attachment part
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Renders the attachment into a MIME part
    ///
    /// With `ascii_filenames` non-ASCII filenames are folded to their
    /// closest ASCII form; otherwise they are carried as an RFC 2231
    /// extended parameter.
    pub(crate) fn to_part(&self, ascii_filenames: bool) -> Result<SinglePart, Error> {
        let media_type: mime::Mime = self
            .content_type
            .parse()
            .map_err(|_| attachment(format!("invalid content type {:?}", self.content_type)))?;

        let disposition = match &self.filename {
            Some(filename) => {
                let filename = if ascii_filenames {
                    ascii_fold(filename)
                } else {
                    filename.clone()
                };

                if filename.is_ascii() {
                    format!("{}; filename=\"{}\"", self.disposition.as_str(), filename)
                } else {
                    format!(
                        "{}; filename*=utf-8''{}",
                        self.disposition.as_str(),
                        utf8_percent_encode(&filename, ATTR_CHAR)
                    )
                }
            }
            None => self.disposition.as_str().to_owned(),
        };

        let mut part = SinglePart::new(media_type.to_string(), EncodedBody::binary(&self.data))
            .with_header(HeaderName::from_static("Content-Disposition"), disposition);

        for (name, value) in &self.headers {
            part = part.with_header(HeaderName::new(name), value.clone());
        }

        Ok(part)
    }
}

/// Folds a filename to ASCII by NFKD decomposition, dropping anything
/// that has no ASCII equivalent and collapsing runs of whitespace
fn ascii_fold(filename: &str) -> String {
    let folded: String = filename.nfkd().filter(char::is_ascii).collect();

    let mut out = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
