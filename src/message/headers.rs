//! Ordered message headers
//!
//! Headers keep insertion order, since the rendered document is meant to be
//! deterministic. Values that contain characters not allowed in a header
//! body are written as RFC 2047 utf-8/base64 encoded words, which also
//! neutralizes any line break that slipped past validation.

use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone)]
pub(crate) struct HeaderName(Cow<'static, str>);

impl HeaderName {
    pub(crate) const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Builds a header name from user input
    ///
    /// Header names are limited to printable ASCII without `:`.
    pub(crate) fn new(name: &str) -> Self {
        let cleaned: String = name
            .chars()
            .filter(|&c| c.is_ascii_graphic() && c != ':')
            .collect();
        Self(Cow::Owned(cleaned))
    }
}

impl AsRef<str> for HeaderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Headers {
    headers: Vec<(HeaderName, String)>,
}

impl Headers {
    pub(crate) const fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Sets a header, replacing an existing one with the same name
    pub(crate) fn set(&mut self, name: HeaderName, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|(name_, _)| name_.as_ref().eq_ignore_ascii_case(name.as_ref()))
        {
            Some((_, current)) => *current = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Appends a header without looking for duplicates
    pub(crate) fn append(&mut self, name: HeaderName, value: String) {
        self.headers.push((name, value));
    }

    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name_, _)| name_.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            f.write_str(name.as_ref())?;
            f.write_str(": ")?;
            f.write_str(&encode_value(value))?;
            f.write_str("\r\n")?;
        }
        Ok(())
    }
}

fn allowed_char(c: char) -> bool {
    c >= 1 as char && c <= 9 as char
        || c == 11 as char
        || c == 12 as char
        || c >= 14 as char && c <= 127 as char
}

/// RFC 2047 "B" encoding of a header value, when needed
///
/// A legally folded value keeps its folding; each line is encoded on its
/// own, after the continuation whitespace. Anything else containing a
/// line break is encoded whole, break included.
pub(crate) fn encode_value(s: &str) -> Cow<'_, str> {
    if s.chars().all(allowed_char) {
        Cow::Borrowed(s)
    } else if is_folded(s) {
        Cow::Owned(
            s.split("\r\n")
                .map(encode_line)
                .collect::<Vec<_>>()
                .join("\r\n"),
        )
    } else {
        Cow::Owned(format!("=?utf-8?b?{}?=", STANDARD.encode(s)))
    }
}

fn encode_line(line: &str) -> Cow<'_, str> {
    if line.chars().all(allowed_char) {
        Cow::Borrowed(line)
    } else {
        let text = line.trim_start_matches([' ', '\t']);
        let fold = &line[..line.len() - text.len()];
        Cow::Owned(format!("{fold}=?utf-8?b?{}?=", STANDARD.encode(text)))
    }
}

/// True for a multi-line value whose every continuation starts with
/// whitespace and whose lines carry no stray CR or LF
fn is_folded(s: &str) -> bool {
    let mut lines = s.split("\r\n");
    match lines.next() {
        Some(first) if !first.contains(['\r', '\n']) => {}
        _ => return false,
    }
    let mut folded = false;
    for line in lines {
        if !line.starts_with([' ', '\t']) || line.contains(['\r', '\n']) {
            return false;
        }
        folded = true;
    }
    folded
}

#[cfg(test)]
mod test {
    use super::{encode_value, HeaderName, Headers};

    #[test]
    fn ascii_value_is_written_verbatim() {
        assert_eq!(encode_value("Happy new year"), "Happy new year");
    }

    #[test]
    fn utf8_value_is_encoded() {
        assert_eq!(
            encode_value("Привет, мир!"),
            "=?utf-8?b?0J/RgNC40LLQtdGCLCDQvNC40YAh?="
        );
    }

    #[test]
    fn folded_value_keeps_its_folding() {
        assert_eq!(encode_value("first\r\n second"), "first\r\n second");
        assert_eq!(encode_value("first\r\n\tsecond"), "first\r\n\tsecond");
    }

    #[test]
    fn folded_utf8_line_is_encoded_after_the_fold() {
        assert_eq!(
            encode_value("Hello\r\n мир"),
            "Hello\r\n =?utf-8?b?0LzQuNGA?="
        );
    }

    #[test]
    fn newline_is_neutralized() {
        let encoded = encode_value("a\r\nBcc: x@y");
        assert!(!encoded.contains('\n'));
        assert!(encoded.starts_with("=?utf-8?b?"));
    }

    #[test]
    fn set_replaces_case_insensitively() {
        let mut headers = Headers::new();
        headers.set(HeaderName::from_static("Subject"), "one".into());
        headers.set(HeaderName::new("subject"), "two".into());
        assert_eq!(headers.get("SUBJECT"), Some("two"));
        assert_eq!(headers.to_string(), "Subject: two\r\n");
    }

    #[test]
    fn append_keeps_duplicates_in_order() {
        let mut headers = Headers::new();
        headers.append(HeaderName::new("X-Tag"), "a".into());
        headers.append(HeaderName::new("X-Tag"), "b".into());
        assert_eq!(headers.to_string(), "X-Tag: a\r\nX-Tag: b\r\n");
    }

    #[test]
    fn header_name_is_restricted_to_token_chars() {
        let name = HeaderName::new("X-In ject:\r\n");
        assert_eq!(name.as_ref(), "X-Inject");
    }
}
