//! MIME part tree and its wire rendering

use crate::message::{
    body::EncodedBody,
    headers::{HeaderName, Headers},
};

/// Anything that can render itself into a MIME document
pub(crate) trait EmailFormat {
    fn format(&self, out: &mut Vec<u8>);
}

/// A part with a single payload
#[derive(Debug, Clone)]
pub(crate) struct SinglePart {
    headers: Headers,
    body: EncodedBody,
}

impl SinglePart {
    pub(crate) fn new(content_type: String, body: EncodedBody) -> Self {
        let mut headers = Headers::new();
        headers.set(HeaderName::from_static("Content-Type"), content_type);
        headers.set(
            HeaderName::from_static("Content-Transfer-Encoding"),
            body.encoding().to_string(),
        );
        Self { headers, body }
    }

    /// A `text/plain` part in the given charset
    pub(crate) fn plain(content: &str, charset: &str) -> Self {
        Self::new(
            format!("text/plain; charset={charset}"),
            EncodedBody::text(content),
        )
    }

    /// A `text/html` part in the given charset
    pub(crate) fn html(content: &str, charset: &str) -> Self {
        Self::new(
            format!("text/html; charset={charset}"),
            EncodedBody::text(content),
        )
    }

    /// Appends a header after `Content-Type` and `Content-Transfer-Encoding`
    pub(crate) fn with_header(mut self, name: HeaderName, value: String) -> Self {
        self.headers.append(name, value);
        self
    }
}

impl EmailFormat for SinglePart {
    fn format(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.body.as_ref());
        out.extend_from_slice(b"\r\n");
    }
}

/// The kind of a composite part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MultiPartKind {
    /// Independent parts, typically a body plus attachments
    Mixed,
    /// Renderings of the same content, least faithful first
    Alternative,
}

impl MultiPartKind {
    fn mime(self, boundary: &str) -> String {
        let subtype = match self {
            Self::Mixed => "mixed",
            Self::Alternative => "alternative",
        };
        format!("multipart/{subtype}; boundary=\"{boundary}\"")
    }
}

/// A composite part holding an ordered list of children
#[derive(Debug, Clone)]
pub(crate) struct MultiPart {
    kind: MultiPartKind,
    boundary: String,
    parts: Vec<Part>,
}

impl MultiPart {
    /// A multipart with a caller-chosen boundary, so rendering stays
    /// reproducible across calls
    pub(crate) fn with_boundary(kind: MultiPartKind, boundary: String) -> Self {
        Self {
            kind,
            boundary,
            parts: Vec::new(),
        }
    }

    pub(crate) fn singlepart(mut self, part: SinglePart) -> Self {
        self.parts.push(Part::Single(part));
        self
    }

    pub(crate) fn multipart(mut self, part: MultiPart) -> Self {
        self.parts.push(Part::Multi(part));
        self
    }

    pub(crate) fn content_type(&self) -> String {
        self.kind.mime(&self.boundary)
    }
}

impl EmailFormat for MultiPart {
    fn format(&self, out: &mut Vec<u8>) {
        let mut headers = Headers::new();
        headers.set(HeaderName::from_static("Content-Type"), self.content_type());
        out.extend_from_slice(headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            part.format(out);
        }

        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
    }
}

/// A node in the part tree
#[derive(Debug, Clone)]
pub(crate) enum Part {
    Single(SinglePart),
    Multi(MultiPart),
}

impl EmailFormat for Part {
    fn format(&self, out: &mut Vec<u8>) {
        match self {
            Self::Single(part) => part.format(out),
            Self::Multi(part) => part.format(out),
        }
    }
}

pub(crate) fn make_boundary() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(40)
        .collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{make_boundary, EmailFormat, MultiPart, MultiPartKind, SinglePart};

    fn render(part: &impl EmailFormat) -> String {
        let mut out = Vec::new();
        part.format(&mut out);
        String::from_utf8(out).unwrap()
    }

    fn multipart(kind: MultiPartKind) -> MultiPart {
        MultiPart::with_boundary(kind, make_boundary())
    }

    #[test]
    fn single_part_ascii() {
        let part = SinglePart::plain("Test email", "utf-8");

        assert_eq!(
            render(&part),
            concat!(
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "Test email\r\n"
            )
        );
    }

    #[test]
    fn single_part_utf8() {
        let part = SinglePart::plain("Questo messaggio è corto", "utf-8");

        assert_eq!(
            render(&part),
            concat!(
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: quoted-printable\r\n",
                "\r\n",
                "Questo messaggio =C3=A8 corto\r\n"
            )
        );
    }

    #[test]
    fn multi_part_boundaries() {
        let multi = multipart(MultiPartKind::Alternative)
            .singlepart(SinglePart::plain("plain", "utf-8"))
            .singlepart(SinglePart::html("<p>html</p>", "utf-8"));

        let rendered = render(&multi);
        let boundary = multi.content_type();
        let boundary = boundary
            .split("boundary=\"")
            .nth(1)
            .unwrap()
            .trim_end_matches('"');

        assert_eq!(rendered.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert_eq!(rendered.matches(&format!("--{boundary}--\r\n")).count(), 1);
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn nested_multipart_renders_children() {
        let multi = multipart(MultiPartKind::Mixed).multipart(
            multipart(MultiPartKind::Alternative).singlepart(SinglePart::plain("inner", "utf-8")),
        );

        let rendered = render(&multi);
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("inner\r\n"));
    }

    #[test]
    fn boundaries_are_unique() {
        let a = make_boundary();
        let b = make_boundary();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }
}
