//! Low level SMTP client
//!
//! [`SmtpConnection`] owns a buffered [`NetworkStream`] and exposes the
//! protocol primitives: send a command, read a (possibly multiline) reply,
//! transmit a message payload with transparency applied. Policy, like when
//! to authenticate or which ESMTP parameters to pass, lives in the
//! transport on top.

use std::{
    fmt::Display,
    io::{self, BufRead, BufReader, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use native_tls::{HandshakeError, TlsConnector, TlsStream};

use crate::transport::smtp::{
    authentication::{Credentials, Mechanism},
    commands::{Auth, AuthResponse, Ehlo, Quit, Starttls},
    error,
    error::Error,
    extension::{ClientId, ServerInfo},
    response::{parse_response, Response},
};

/// A TCP stream, possibly wrapped in TLS
#[derive(Debug)]
pub(crate) enum NetworkStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl NetworkStream {
    /// Wraps the plain stream in TLS, a no-op if already wrapped
    fn upgrade_tls(&mut self, connector: &TlsConnector, domain: &str) -> Result<(), Error> {
        if let Self::Plain(stream) = self {
            let stream = stream.try_clone().map_err(error::network)?;
            let tls = connector.connect(domain, stream).map_err(|err| match err {
                HandshakeError::Failure(err) => error::tls(err),
                HandshakeError::WouldBlock(_) => {
                    error::tls(io::Error::new(io::ErrorKind::WouldBlock, "handshake stalled"))
                }
            })?;
            *self = Self::Tls(Box::new(tls));
        }
        Ok(())
    }

    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

/// An open connection to an SMTP server
pub(crate) struct SmtpConnection {
    stream: BufReader<NetworkStream>,
    server_info: ServerInfo,
}

impl SmtpConnection {
    /// Connects and consumes the server greeting
    ///
    /// With `tls` the stream is wrapped before anything is read, for
    /// servers speaking TLS from the first byte.
    pub(crate) fn connect(
        server: &str,
        port: u16,
        timeout: Option<Duration>,
        tls: Option<&TlsConnector>,
    ) -> Result<Self, Error> {
        let tcp = connect_tcp(server, port, timeout).map_err(error::connection)?;
        tcp.set_read_timeout(timeout).map_err(error::network)?;
        tcp.set_write_timeout(timeout).map_err(error::network)?;

        let mut stream = NetworkStream::Plain(tcp);
        if let Some(connector) = tls {
            stream.upgrade_tls(connector, server)?;
        }

        let mut connection = Self {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
        };
        let greeting = connection.read_response()?;
        tracing::debug!(server, port, greeting = ?greeting.message(), "connected");
        Ok(connection)
    }

    pub(crate) fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_tls()
    }

    /// Sends EHLO and records what the server advertised
    pub(crate) fn ehlo(&mut self, client_id: &ClientId) -> Result<(), Error> {
        let response = self.command(Ehlo(client_id.clone()))?;
        self.server_info = ServerInfo::from_response(&response)?;
        tracing::debug!(server_info = %self.server_info, "ehlo done");
        Ok(())
    }

    /// Negotiates STARTTLS and upgrades the stream
    pub(crate) fn starttls(&mut self, connector: &TlsConnector, domain: &str) -> Result<(), Error> {
        self.command(Starttls)?;
        self.stream.get_mut().upgrade_tls(connector, domain)?;
        tracing::debug!(domain, "connection upgraded to TLS");
        Ok(())
    }

    /// Runs the authentication exchange with the first mechanism both
    /// sides support
    pub(crate) fn auth(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<(), Error> {
        let mechanism = mechanisms
            .iter()
            .copied()
            .find(|mechanism| self.server_info.supports_auth_mechanism(*mechanism))
            .ok_or_else(|| error::client("no supported authentication mechanism"))?;

        let mut response = self.command(Auth::initial(mechanism, credentials)?)?;

        // a misbehaving server must not keep us here forever
        let mut challenges_left = 10_u8;
        while response.has_code(334) {
            if challenges_left == 0 {
                return Err(error::response("too many authentication challenges"));
            }
            challenges_left -= 1;

            let challenge = STANDARD
                .decode(response.first_word().unwrap_or_default())
                .map_err(error::response)?;
            let challenge = String::from_utf8(challenge).map_err(error::response)?;
            let answer = mechanism.response(credentials, Some(&challenge))?;
            response = self.command(AuthResponse(answer))?;
        }
        Ok(())
    }

    /// Transmits a message payload after an accepted DATA command
    pub(crate) fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut payload = Vec::with_capacity(message.len() + 5);
        let mut codec = ClientCodec::new();
        codec.encode(message, &mut payload);
        if !payload.ends_with(b"\r\n") {
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(b".\r\n");
        self.write(&payload)?;
        self.read_response()
    }

    pub(crate) fn quit(&mut self) -> Result<Response, Error> {
        self.command(Quit)
    }

    /// Sends a single command and reads the reply
    pub(crate) fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        self.read_response()
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.stream.get_mut().write_all(buf).map_err(error::network)?;
        self.stream.get_mut().flush().map_err(error::network)?;
        tracing::trace!("wrote: {}", escape_crlf(&String::from_utf8_lossy(buf)));
        Ok(())
    }

    /// Reads one full reply, failing on negative codes
    pub(crate) fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        while self.stream.read_line(&mut buffer).map_err(error::network)? > 0 {
            match parse_response(&buffer) {
                Ok((_, response)) => {
                    tracing::trace!("read: {}", escape_crlf(&buffer));
                    if response.is_positive() {
                        return Ok(response);
                    }
                    return Err(error::code(response.code(), response.message().to_vec()));
                }
                Err(nom::Err::Incomplete(_)) => (),
                Err(nom::Err::Error(_) | nom::Err::Failure(_)) => {
                    return Err(error::response(format!("unparseable reply {buffer:?}")));
                }
            }
        }

        Err(error::response("connection closed before a full reply"))
    }
}

fn connect_tcp(server: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in (server, port).to_socket_addrs()? {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

/// Applies SMTP transparency: a `.` at the start of a line is doubled
struct ClientCodec {
    line_start: bool,
    previous: u8,
}

impl ClientCodec {
    fn new() -> Self {
        Self {
            line_start: true,
            previous: 0,
        }
    }

    fn encode(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &byte in chunk {
            if self.line_start && byte == b'.' {
                out.push(b'.');
            }
            out.push(byte);
            self.line_start = self.previous == b'\r' && byte == b'\n';
            self.previous = byte;
        }
    }
}

/// Makes protocol traffic printable on a single log line
fn escape_crlf(text: &str) -> String {
    text.replace("\r\n", "<CRLF>")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{escape_crlf, ClientCodec};

    fn encode(message: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ClientCodec::new().encode(message, &mut out);
        out
    }

    #[test]
    fn dot_stuffing() {
        assert_eq!(encode(b"test"), b"test");
        assert_eq!(encode(b"."), b"..");
        assert_eq!(encode(b".\r\n"), b"..\r\n");
        assert_eq!(encode(b"test\r\n.\r\n"), b"test\r\n..\r\n");
        assert_eq!(encode(b"test\r\n..\r\n"), b"test\r\n...\r\n");
        assert_eq!(encode(b"test.\r\n"), b"test.\r\n");
        // a dot after a bare LF starts no new line
        assert_eq!(encode(b"test\n.\r\n"), b"test\n.\r\n");
    }

    #[test]
    fn dot_stuffing_across_chunks() {
        let mut codec = ClientCodec::new();
        let mut out = Vec::new();
        codec.encode(b"test\r\n", &mut out);
        codec.encode(b".partial", &mut out);
        assert_eq!(out, b"test\r\n..partial");
    }

    #[test]
    fn escape_crlf_flattens_lines() {
        assert_eq!(escape_crlf("EHLO me\r\n"), "EHLO me<CRLF>");
        assert_eq!(
            escape_crlf("250-a\r\n250 b\r\n"),
            "250-a<CRLF>250 b<CRLF>"
        );
    }
}
