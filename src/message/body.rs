//! Body payloads and their `Content-Transfer-Encoding`

use std::fmt::{self, Display, Formatter};

/// `Content-Transfer-Encoding` of an encoded body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        })
    }
}

/// A body that has already been encoded for transfer
#[derive(Debug, Clone)]
pub(crate) struct EncodedBody {
    buf: Vec<u8>,
    encoding: Encoding,
}

impl EncodedBody {
    /// Encodes a text body, choosing the most efficient transfer encoding
    ///
    /// Line endings are normalized to CRLF before the choice is made,
    /// so the same input always produces the same output.
    pub(crate) fn text(content: &str) -> Self {
        let content = crlf_line_endings(content);

        let encoding = match email_encoding::body::Encoding::choose(content.as_str(), false) {
            email_encoding::body::Encoding::SevenBit => Encoding::SevenBit,
            email_encoding::body::Encoding::EightBit => Encoding::EightBit,
            email_encoding::body::Encoding::QuotedPrintable => Encoding::QuotedPrintable,
            email_encoding::body::Encoding::Base64 => Encoding::Base64,
        };

        let buf = match encoding {
            Encoding::SevenBit | Encoding::EightBit => content.into_bytes(),
            Encoding::QuotedPrintable => quoted_printable::encode(content),
            Encoding::Base64 => base64_encode(content.as_bytes()),
        };

        Self { buf, encoding }
    }

    /// Encodes arbitrary bytes, always as base64
    pub(crate) fn binary(data: &[u8]) -> Self {
        Self {
            buf: base64_encode(data),
            encoding: Encoding::Base64,
        }
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl AsRef<[u8]> for EncodedBody {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

fn base64_encode(data: &[u8]) -> Vec<u8> {
    let mut out = String::with_capacity(email_encoding::body::base64::encoded_len(data.len()));
    email_encoding::body::base64::encode(data, &mut out).expect("base64 encode into string");
    out.into_bytes()
}

/// Normalizes line endings to CRLF
pub(crate) fn crlf_line_endings(content: &str) -> String {
    let mut out = String::with_capacity(content.len());

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            c => out.push(c),
        }
    }

    out
}
