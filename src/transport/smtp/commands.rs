//! SMTP commands, rendered through `Display`

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    sanitize::Address,
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        error::Error,
        extension::ClientId,
    },
};

/// EHLO command
#[derive(Debug, Clone)]
pub struct Ehlo(pub ClientId);

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.0)
    }
}

/// STARTTLS command
#[derive(Debug, Clone, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// AUTH command, with the initial response inline when the mechanism
/// supports one
#[derive(Debug, Clone)]
pub struct Auth {
    mechanism: Mechanism,
    initial_response: Option<String>,
}

impl Auth {
    pub fn initial(mechanism: Mechanism, credentials: &Credentials) -> Result<Self, Error> {
        let initial_response = if mechanism.supports_initial_response() {
            Some(mechanism.response(credentials, None)?)
        } else {
            None
        };
        Ok(Self {
            mechanism,
            initial_response,
        })
    }
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.initial_response {
            Some(initial) => write!(
                f,
                "AUTH {} {}\r\n",
                self.mechanism,
                STANDARD.encode(initial)
            ),
            None => write!(f, "AUTH {}\r\n", self.mechanism),
        }
    }
}

/// Base64 encoded reply to an authentication challenge
#[derive(Debug, Clone)]
pub struct AuthResponse(pub String);

impl Display for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", STANDARD.encode(&self.0))
    }
}

/// MAIL FROM command
#[derive(Debug, Clone)]
pub struct Mail {
    sender: Option<Address>,
    parameters: Vec<String>,
}

impl Mail {
    pub fn new(sender: Option<Address>, parameters: Vec<String>) -> Self {
        Self { sender, parameters }
    }
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAIL FROM:<{}>",
            self.sender.as_ref().map_or("", |sender| sender.as_ref())
        )?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

/// RCPT TO command
#[derive(Debug, Clone)]
pub struct Rcpt {
    recipient: Address,
    parameters: Vec<String>,
}

impl Rcpt {
    pub fn new(recipient: Address, parameters: Vec<String>) -> Self {
        Self {
            recipient,
            parameters,
        }
    }
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>", self.recipient)?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

/// DATA command
#[derive(Debug, Clone, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(Debug, Clone, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// RSET command
#[derive(Debug, Clone, Copy)]
pub struct Rset;

impl Display for Rset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("RSET\r\n")
    }
}

/// NOOP command
#[derive(Debug, Clone, Copy)]
pub struct Noop;

impl Display for Noop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("NOOP\r\n")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Auth, AuthResponse, Ehlo, Mail, Rcpt};
    use crate::{
        sanitize::sanitize,
        transport::smtp::{
            authentication::{Credentials, Mechanism},
            extension::ClientId,
        },
    };

    #[test]
    fn ehlo() {
        let command = Ehlo(ClientId::new("client.example.com".to_owned()));
        assert_eq!(command.to_string(), "EHLO client.example.com\r\n");
    }

    #[test]
    fn mail_with_parameters() {
        let sender = sanitize("from@example.com").unwrap();
        let command = Mail::new(Some(sender), vec!["BODY=8BITMIME".to_owned()]);
        assert_eq!(
            command.to_string(),
            "MAIL FROM:<from@example.com> BODY=8BITMIME\r\n"
        );
    }

    #[test]
    fn mail_with_empty_reverse_path() {
        let command = Mail::new(None, vec![]);
        assert_eq!(command.to_string(), "MAIL FROM:<>\r\n");
    }

    #[test]
    fn rcpt() {
        let recipient = sanitize("to@example.com").unwrap();
        let command = Rcpt::new(recipient, vec![]);
        assert_eq!(command.to_string(), "RCPT TO:<to@example.com>\r\n");
    }

    #[test]
    fn auth_plain_inline() {
        let credentials = Credentials::from(("user", "pass"));
        let command = Auth::initial(Mechanism::Plain, &credentials).unwrap();
        assert_eq!(command.to_string(), "AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn auth_login_defers_credentials() {
        let credentials = Credentials::from(("user", "pass"));
        let command = Auth::initial(Mechanism::Login, &credentials).unwrap();
        assert_eq!(command.to_string(), "AUTH LOGIN\r\n");
    }

    #[test]
    fn auth_response_is_base64() {
        assert_eq!(AuthResponse("user".to_owned()).to_string(), "dXNlcg==\r\n");
    }
}
