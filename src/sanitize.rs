//! Header and address sanitizing
//!
//! Every string that ends up in a header or in the SMTP envelope goes
//! through here before any network I/O happens. The rules follow
//! [RFC 5322](https://tools.ietf.org/html/rfc5322#section-2.2): a CR or LF
//! is only acceptable as part of a `CRLF` immediately followed by folding
//! whitespace, anything else is treated as an injection attempt.

use std::fmt::{self, Display, Formatter};

use crate::error::{bad_header, Error};

/// An address string that passed [`sanitize`]
///
/// Stored in serialized form, the way it is written into the `MAIL FROM`
/// and `RCPT TO` commands.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Whether the address contains bytes outside the ASCII range
    ///
    /// Used to decide if the `SMTPUTF8` extension is required.
    pub fn is_ascii(&self) -> bool {
        self.0.is_ascii()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Tells if `text` contains a raw `\r` or `\n`
pub fn has_newline(text: &str) -> bool {
    text.contains('\r') || text.contains('\n')
}

/// Normalizes and validates an address-like header value
///
/// Strips control characters that have no meaning in a header, then rejects
/// the value if a CR or LF survives that cannot be read as RFC 5322 folding
/// whitespace.
pub fn sanitize(address: &str) -> Result<Address, Error> {
    let cleaned: String = address
        .trim()
        .chars()
        .filter(|&c| !is_stripped_control(c))
        .collect();

    if has_newline(&cleaned) && !newlines_are_folding(&cleaned) {
        return Err(bad_header(format!(
            "line break in address {:?}",
            address.trim()
        )));
    }

    Ok(Address(cleaned))
}

/// Applies [`sanitize`] to each address, preserving order
///
/// Duplicates are kept; de-duplication is the message's responsibility.
pub fn sanitize_many<'a, I>(addresses: I) -> Result<Vec<Address>, Error>
where
    I: IntoIterator<Item = &'a str>,
{
    addresses.into_iter().map(sanitize).collect()
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && c != '\r' && c != '\n' && c != '\t'
}

/// Checks that every CR/LF in `s` is part of `CRLF` followed by WSP
pub(crate) fn newlines_are_folding(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                let folded = bytes.get(i + 1) == Some(&b'\n')
                    && matches!(bytes.get(i + 2), Some(b' ') | Some(b'\t'));
                if !folded {
                    return false;
                }
                i += 3;
            }
            b'\n' => return false,
            _ => i += 1,
        }
    }
    true
}
