//! A transport that records messages instead of delivering them

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex},
};

use crate::{envelope::Envelope, transport::Transport};

/// Error returned by a [`StubTransport`] built with
/// [`new_error`][StubTransport::new_error]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubError;

impl Display for StubError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("stub transport error")
    }
}

impl StdError for StubError {}

#[derive(Debug, Default)]
struct StubState {
    opens: usize,
    closes: usize,
    messages: Vec<(Envelope, Vec<u8>)>,
}

/// A mock transport with shared observable state
///
/// Clones share the same recording, so a test can keep one handle and
/// hand another to the session under test.
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    state: Arc<Mutex<StubState>>,
    fail: bool,
}

impl StubTransport {
    /// A transport that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that fails every operation
    pub fn new_error() -> Self {
        Self {
            state: Arc::default(),
            fail: true,
        }
    }

    /// How many times the transport has been opened
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// How many times the transport has been closed
    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Envelopes and payloads submitted so far
    pub fn messages(&self) -> Vec<(Envelope, Vec<u8>)> {
        self.state.lock().unwrap().messages.clone()
    }
}

impl Transport for StubTransport {
    type Error = StubError;

    fn open(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(StubError);
        }
        self.state.lock().unwrap().opens += 1;
        Ok(())
    }

    fn send_raw(
        &mut self,
        envelope: &Envelope,
        email: &[u8],
        _mail_options: &[String],
        _rcpt_options: &[String],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(StubError);
        }
        self.state
            .lock()
            .unwrap()
            .messages
            .push((envelope.clone(), email.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(StubError);
        }
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
