//! Response classification.
//!
//! The registration service answers with one or more lines and then closes
//! the channel. Each read from the channel is one [`ReadEvent`]; the
//! [`ResponseClassifier`] turns events into [`ResponseOutcome`]s and decides
//! when the exchange is over and whether it succeeded.
//!
//! Each read is classified on its own. Bytes are not reassembled across
//! reads, and only the marker at the start of a read is considered.
//!
//! # Close semantics
//!
//! | event                    | no key yet | key issued |
//! |--------------------------|------------|------------|
//! | close_notify             | success    | success    |
//! | hang-up (no close_notify)| failure    | success    |
//! | live I/O error           | failure    | failure    |
//! | other channel error      | failure    | success    |

use crate::error::ProtocolError;
use crate::secret::Credential;

/// Size of the buffer used for a single read.
pub const READ_BUFFER_SIZE: usize = 4096;

const ERROR_MARKER: &[u8] = b"ERROR";
const KEY_MARKER: &[u8] = b"OSSEC K:'";

/// One result of reading from the secure channel.
#[derive(Debug)]
pub enum ReadEvent<'a> {
    /// Bytes delivered with a clean channel status.
    Data(&'a [u8]),
    /// The peer shut the channel down cleanly (TLS close_notify).
    CloseNotify,
    /// The peer dropped the connection without a clean shutdown.
    PeerHangup,
    /// A live system-level read error.
    IoFault(String),
    /// Any other channel error, e.g. a TLS alert or corrupt record.
    ChannelFault(String),
}

/// What a read event meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The service issued an agent key. Persist it immediately.
    CredentialIssued(Credential),
    /// The service reported an error line. The exchange continues.
    ServerError(String),
    /// A second key after one was already issued; not persisted.
    DuplicateCredential,
    /// Unrecognized content; the exchange continues.
    Ignored,
    /// The peer closed cleanly.
    GracefulClose,
    /// The peer dropped the connection.
    AbnormalClose { had_credential: bool },
    /// The service sent something that breaks the protocol.
    ProtocolViolation(ProtocolError),
    /// A live read error.
    ReadFault(String),
    /// An unclassified channel error.
    ChannelFault { message: String, had_credential: bool },
}

impl ResponseOutcome {
    /// Whether this outcome ends the exchange.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::CredentialIssued(_)
                | Self::ServerError(_)
                | Self::DuplicateCredential
                | Self::Ignored
        )
    }

    /// Whether a terminal outcome counts as a successful run.
    ///
    /// Always `false` for non-terminal outcomes.
    pub fn is_success(&self) -> bool {
        match self {
            Self::GracefulClose => true,
            Self::AbnormalClose { had_credential } => *had_credential,
            Self::ChannelFault { had_credential, .. } => *had_credential,
            _ => false,
        }
    }
}

/// Classifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    /// No key received yet.
    AwaitingResponse,
    /// Key issued and handed out; waiting for the channel to close.
    AwaitingClose,
    /// A terminal outcome was produced.
    Finished,
}

/// Destination for an issued credential.
///
/// The enrollment driver calls [`CredentialSink::persist`] at most once per
/// run, as soon as the key is classified.
pub trait CredentialSink {
    type Error;

    fn persist(&mut self, credential: Credential) -> Result<(), Self::Error>;
}

/// State machine over read events.
#[derive(Debug)]
pub struct ResponseClassifier {
    state: ClassifierState,
    credential_issued: bool,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseClassifier {
    pub fn new() -> Self {
        Self {
            state: ClassifierState::AwaitingResponse,
            credential_issued: false,
        }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Whether a credential has been issued in this exchange.
    pub fn has_credential(&self) -> bool {
        self.credential_issued
    }

    /// Classify one read event and advance the state.
    pub fn classify(&mut self, event: ReadEvent<'_>) -> ResponseOutcome {
        if self.state == ClassifierState::Finished {
            return ResponseOutcome::ProtocolViolation(ProtocolError::ReadAfterFinish);
        }

        let outcome = match event {
            ReadEvent::Data(bytes) => self.classify_data(bytes),
            ReadEvent::CloseNotify => ResponseOutcome::GracefulClose,
            ReadEvent::PeerHangup => ResponseOutcome::AbnormalClose {
                had_credential: self.credential_issued,
            },
            ReadEvent::IoFault(message) => ResponseOutcome::ReadFault(message),
            ReadEvent::ChannelFault(message) => ResponseOutcome::ChannelFault {
                message,
                had_credential: self.credential_issued,
            },
        };

        if outcome.is_terminal() {
            self.state = ClassifierState::Finished;
        }
        outcome
    }

    fn classify_data(&mut self, bytes: &[u8]) -> ResponseOutcome {
        if bytes.starts_with(ERROR_MARKER) {
            let line = bytes.split(|b| *b == b'\n').next().unwrap_or(bytes);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            return ResponseOutcome::ServerError(String::from_utf8_lossy(line).into_owned());
        }

        let Some(rest) = bytes.strip_prefix(KEY_MARKER) else {
            return ResponseOutcome::Ignored;
        };

        // A malformed key is fatal even when one was already issued.
        let Some(end) = rest.iter().position(|b| *b == b'\'') else {
            return ResponseOutcome::ProtocolViolation(ProtocolError::UnterminatedCredential);
        };
        let Ok(key) = std::str::from_utf8(&rest[..end]) else {
            return ResponseOutcome::ProtocolViolation(ProtocolError::CredentialNotUtf8);
        };

        if self.credential_issued {
            return ResponseOutcome::DuplicateCredential;
        }

        self.credential_issued = true;
        self.state = ClassifierState::AwaitingClose;
        ResponseOutcome::CredentialIssued(Credential::new(key))
    }
}
