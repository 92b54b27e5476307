//! SMTP reply parsing

use std::fmt::{self, Display, Formatter};

use nom::{
    bytes::streaming::{tag, take_while},
    character::streaming::one_of,
    combinator::opt,
    multi::many0,
    sequence::{preceded, terminated, tuple},
    IResult,
};

/// First digit of a reply code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 2yz
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegative = 4,
    /// 5yz
    PermanentNegative = 5,
}

/// A three digit reply code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    pub severity: Severity,
    pub category: u8,
    pub detail: u8,
}

impl Code {
    pub(crate) fn new(severity: Severity, category: u8, detail: u8) -> Self {
        Self {
            severity,
            category,
            detail,
        }
    }

    /// The code as its numeric value, e.g. `250`
    pub fn value(self) -> u16 {
        self.severity as u16 * 100 + u16::from(self.category) * 10 + u16::from(self.detail)
    }

    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A complete, possibly multiline server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    code: Code,
    message: Vec<String>,
}

impl Response {
    pub fn new(code: Code, message: Vec<String>) -> Self {
        Self { code, message }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    pub fn has_code(&self, code: u16) -> bool {
        self.code.value() == code
    }

    /// The text lines of the reply, without codes
    pub fn message(&self) -> &[String] {
        &self.message
    }

    /// First word of the first line, used for auth challenges
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split(' ').next())
            .filter(|word| !word.is_empty())
    }
}

fn severity(i: &str) -> IResult<&str, Severity> {
    let (i, digit) = one_of("2345")(i)?;
    let severity = match digit {
        '2' => Severity::PositiveCompletion,
        '3' => Severity::PositiveIntermediate,
        '4' => Severity::TransientNegative,
        _ => Severity::PermanentNegative,
    };
    Ok((i, severity))
}

fn digit(i: &str) -> IResult<&str, u8> {
    let (i, c) = one_of("0123456789")(i)?;
    Ok((i, c as u8 - b'0'))
}

fn code(i: &str) -> IResult<&str, Code> {
    let (i, (severity, category, detail)) = tuple((severity, digit, digit))(i)?;
    Ok((i, Code::new(severity, category, detail)))
}

fn text(i: &str) -> IResult<&str, &str> {
    take_while(|c| c != '\r' && c != '\n')(i)
}

/// Parses a full reply, `Incomplete` until the final line has arrived
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, intermediate) = many0(terminated(
        tuple((code, preceded(tag("-"), text))),
        tag("\r\n"),
    ))(i)?;
    let (i, (last_code, last_text)) = terminated(
        tuple((code, opt(preceded(tag(" "), text)))),
        tag("\r\n"),
    )(i)?;

    let mut message: Vec<String> = intermediate
        .into_iter()
        .map(|(_, line)| line.to_owned())
        .collect();
    if let Some(line) = last_text {
        message.push(line.to_owned());
    }

    Ok((i, Response::new(last_code, message)))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{parse_response, Code, Severity};

    #[test]
    fn single_line() {
        let (rest, response) = parse_response("220 smtp.example.com ESMTP ready\r\n").unwrap();
        assert_eq!(rest, "");
        assert_eq!(response.code().value(), 220);
        assert!(response.is_positive());
        assert_eq!(response.message(), ["smtp.example.com ESMTP ready"]);
        assert_eq!(response.first_word(), Some("smtp.example.com"));
    }

    #[test]
    fn multi_line() {
        let (rest, response) =
            parse_response("250-smtp.example.com\r\n250-8BITMIME\r\n250 AUTH PLAIN LOGIN\r\n")
                .unwrap();
        assert_eq!(rest, "");
        assert_eq!(response.code().value(), 250);
        assert_eq!(
            response.message(),
            ["smtp.example.com", "8BITMIME", "AUTH PLAIN LOGIN"]
        );
    }

    #[test]
    fn code_without_text() {
        let (_, response) = parse_response("250\r\n").unwrap();
        assert_eq!(response.code().value(), 250);
        assert!(response.message().is_empty());
        assert_eq!(response.first_word(), None);
    }

    #[test]
    fn negative_codes() {
        let (_, response) = parse_response("421 service not available\r\n").unwrap();
        assert_eq!(response.code().severity, Severity::TransientNegative);
        assert!(!response.is_positive());

        let (_, response) = parse_response("554 transaction failed\r\n").unwrap();
        assert_eq!(response.code().severity, Severity::PermanentNegative);
    }

    #[test]
    fn partial_reply_is_incomplete() {
        assert!(parse_response("250-smtp.example.com\r\n250 DON").unwrap_err().is_incomplete());
        assert!(parse_response("25").unwrap_err().is_incomplete());
    }

    #[test]
    fn code_value_round_trip() {
        let code = Code::new(Severity::PositiveIntermediate, 3, 4);
        assert_eq!(code.value(), 334);
        assert_eq!(code.to_string(), "334");
    }
}
