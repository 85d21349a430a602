//! Enrollment error types.

use std::io;
use std::path::PathBuf;

use agent_auth_core::{CertError, ProtocolError};

/// Errors that end an enrollment run.
///
/// Every variant is fatal: the run stops and the process exits non-zero.
/// Server-reported `ERROR` lines are not errors; they are logged and the
/// exchange continues.
#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    /// TCP connection could not be opened.
    #[error("unable to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The manager host is not a valid TLS server name.
    #[error("invalid manager name: {0}")]
    InvalidServerName(String),

    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The manager presented no certificate to check.
    #[error("manager presented no certificate")]
    MissingPeerCertificate,

    /// The manager certificate does not name the manager host.
    #[error("unable to verify manager certificate: {0}")]
    CertificateMismatch(#[source] CertError),

    /// Sending the request failed.
    #[error("unable to send request: {0}")]
    Write(#[source] io::Error),

    /// The channel accepted fewer bytes than the request line.
    #[error("unable to send request: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },

    /// The session was used after it was closed.
    #[error("secure session is closed")]
    SessionClosed,

    /// The manager sent a malformed response.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The key store could not be written.
    #[error("unable to write key file {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manager dropped the connection before issuing a key.
    #[error("connection closed by manager before key creation (wrong password or request not accepted)")]
    ClosedBeforeKey,

    /// A live read error on the channel.
    #[error("read error: {0}")]
    Read(String),

    /// Any other channel failure while waiting for a reply.
    #[error("TLS read failed (unable to receive message): {0}")]
    Channel(String),
}
