//! SMTP authentication

use std::fmt::{self, Display, Formatter};

use crate::transport::smtp::error::{client, Error};

/// Mechanisms tried in order of preference
pub const DEFAULT_MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// Username and secret used to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self {
            authentication_identity: username,
            secret: password,
        }
    }
}

// Never expose the secret through Debug
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.authentication_identity)
            .finish_non_exhaustive()
    }
}

impl<S: Into<String>, T: Into<String>> From<(S, T)> for Credentials {
    fn from((username, password): (S, T)) -> Self {
        Self::new(username.into(), password.into())
    }
}

/// Supported SASL mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// RFC 4616
    Plain,
    /// Username and password sent as separate challenge replies
    Login,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        })
    }
}

impl Mechanism {
    /// Whether the whole exchange fits into the `AUTH` command itself
    pub fn supports_initial_response(self) -> bool {
        match self {
            Self::Plain => true,
            Self::Login => false,
        }
    }

    /// Computes the reply to a server challenge
    ///
    /// `challenge` must be `None` for the initial response of mechanisms
    /// that support one.
    pub fn response(
        self,
        credentials: &Credentials,
        challenge: Option<&str>,
    ) -> Result<String, Error> {
        match self {
            Self::Plain => match challenge {
                Some(_) => Err(client("unexpected PLAIN challenge")),
                None => Ok(format!(
                    "\u{0}{}\u{0}{}",
                    credentials.authentication_identity, credentials.secret
                )),
            },
            Self::Login => {
                let challenge = challenge.ok_or_else(|| client("LOGIN challenge expected"))?;

                if ["Username", "Username:", "User Name"].contains(&challenge) {
                    Ok(credentials.authentication_identity.clone())
                } else if ["Password", "Password:"].contains(&challenge) {
                    Ok(credentials.secret.clone())
                } else {
                    Err(client(format!("unknown LOGIN challenge {challenge:?}")))
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Credentials, Mechanism};

    #[test]
    fn plain_initial_response() {
        let credentials = Credentials::from(("user", "pass"));
        assert_eq!(
            Mechanism::Plain.response(&credentials, None).unwrap(),
            "\u{0}user\u{0}pass"
        );
        assert!(Mechanism::Plain
            .response(&credentials, Some("challenge"))
            .is_err());
    }

    #[test]
    fn login_challenge_replies() {
        let credentials = Credentials::from(("user", "pass"));
        assert_eq!(
            Mechanism::Login
                .response(&credentials, Some("Username:"))
                .unwrap(),
            "user"
        );
        assert_eq!(
            Mechanism::Login
                .response(&credentials, Some("Password"))
                .unwrap(),
            "pass"
        );
        assert!(Mechanism::Login.response(&credentials, None).is_err());
        assert!(Mechanism::Login
            .response(&credentials, Some("What?"))
            .is_err());
    }

    #[test]
    fn debug_hides_the_secret() {
        let debugged = format!("{:?}", Credentials::from(("user", "hunter2")));
        assert!(!debugged.contains("hunter2"));
    }
}
