//! ESMTP extensions and client identification

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};

use crate::transport::smtp::{authentication::Mechanism, error, error::Error, response::Response};

/// Identity announced in the `EHLO` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(domain: String) -> Self {
        Self(domain)
    }

    /// The local hostname, falling back to `localhost`
    pub fn hostname() -> Self {
        Self(
            hostname::get()
                .map_err(|_| ())
                .and_then(|hostname| hostname.into_string().map_err(|_| ()))
                .unwrap_or_else(|()| "localhost".to_owned()),
        )
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::hostname()
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ESMTP extension the server advertised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    EightBitMime,
    SmtpUtf8,
    StartTls,
    Authentication(Mechanism),
}

/// What the server told us in its `EHLO` reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    name: String,
    features: HashSet<Extension>,
}

impl ServerInfo {
    /// Parses an `EHLO` reply
    ///
    /// Unknown extension lines are ignored.
    pub fn from_response(response: &Response) -> Result<Self, Error> {
        let name = response
            .first_word()
            .ok_or_else(|| error::response("EHLO reply is missing the server name"))?
            .to_owned();

        let mut features = HashSet::new();
        for line in response.message().iter().skip(1) {
            let mut words = line.split(' ');
            match words.next() {
                Some("8BITMIME") => {
                    features.insert(Extension::EightBitMime);
                }
                Some("SMTPUTF8") => {
                    features.insert(Extension::SmtpUtf8);
                }
                Some("STARTTLS") => {
                    features.insert(Extension::StartTls);
                }
                Some("AUTH") => {
                    for mechanism in words {
                        match mechanism {
                            "PLAIN" => {
                                features.insert(Extension::Authentication(Mechanism::Plain));
                            }
                            "LOGIN" => {
                                features.insert(Extension::Authentication(Mechanism::Login));
                            }
                            _ => (),
                        }
                    }
                }
                _ => (),
            }
        }

        Ok(Self { name, features })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_feature(&self, feature: Extension) -> bool {
        self.features.contains(&feature)
    }

    pub fn supports_auth_mechanism(&self, mechanism: Mechanism) -> bool {
        self.features.contains(&Extension::Authentication(mechanism))
    }
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {:?}", self.name, self.features)
    }
}

#[cfg(test)]
mod test {
    use super::{Extension, Mechanism, ServerInfo};
    use crate::transport::smtp::response::parse_response;

    #[test]
    fn parses_an_ehlo_reply() {
        let (_, reply) = parse_response(
            "250-smtp.example.com at your service\r\n\
             250-8BITMIME\r\n\
             250-SMTPUTF8\r\n\
             250-STARTTLS\r\n\
             250-AUTH PLAIN LOGIN CRAM-MD5\r\n\
             250 ENHANCEDSTATUSCODES\r\n",
        )
        .unwrap();

        let info = ServerInfo::from_response(&reply).unwrap();
        assert_eq!(info.name(), "smtp.example.com");
        assert!(info.supports_feature(Extension::EightBitMime));
        assert!(info.supports_feature(Extension::SmtpUtf8));
        assert!(info.supports_feature(Extension::StartTls));
        assert!(info.supports_auth_mechanism(Mechanism::Plain));
        assert!(info.supports_auth_mechanism(Mechanism::Login));
    }

    #[test]
    fn bare_server_supports_nothing() {
        let (_, reply) = parse_response("250 mail.example.com\r\n").unwrap();

        let info = ServerInfo::from_response(&reply).unwrap();
        assert_eq!(info.name(), "mail.example.com");
        assert!(!info.supports_feature(Extension::StartTls));
        assert!(!info.supports_auth_mechanism(Mechanism::Plain));
    }
}
