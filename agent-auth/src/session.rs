//! Secure session with the registration service.
//!
//! # Invariants
//!
//! - One session per run; `SecureSession` does not implement `Clone`
//! - State only moves forward: Unestablished → Established → Closed
//! - The TLS stream owns the socket, so dropping the session releases it
//!   on every exit path

use std::io;

use agent_auth_core::{verify_peer_name, Fingerprint, ReadEvent};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::EnrollError;
use crate::tls::TlsContext;

/// Lifecycle of a [`SecureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connected, handshake not yet complete.
    Unestablished,
    /// Handshake complete; request and replies may flow.
    Established,
    /// Shut down; no further I/O.
    Closed,
}

/// TLS session over the TCP connection to the manager.
pub struct SecureSession {
    stream: TlsStream<TcpStream>,
    state: SessionState,
    peer_fingerprint: Option<Fingerprint>,
}

impl SecureSession {
    /// Perform the TLS handshake over `tcp`.
    ///
    /// `host` is the name the connection was opened to and is sent as SNI.
    /// When `expected_peer` is given, the manager's certificate must name it;
    /// otherwise the certificate subject is not checked.
    pub async fn establish(
        tcp: TcpStream,
        context: &TlsContext,
        host: &str,
        expected_peer: Option<&str>,
    ) -> Result<Self, EnrollError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| EnrollError::InvalidServerName(host.to_string()))?;

        tracing::debug!(state = ?SessionState::Unestablished, "starting TLS handshake");
        let stream = context
            .connector()
            .connect(server_name, tcp)
            .await
            .map_err(EnrollError::Handshake)?;

        let leaf = stream
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|cert| cert.as_ref().to_vec());
        let peer_fingerprint = leaf.as_deref().map(Fingerprint::from_cert_der);

        if let Some(expected) = expected_peer {
            tracing::info!("Verifying manager's certificate");
            let leaf = leaf.ok_or(EnrollError::MissingPeerCertificate)?;
            verify_peer_name(&leaf, expected).map_err(EnrollError::CertificateMismatch)?;
        }

        if let Some(fingerprint) = &peer_fingerprint {
            tracing::info!(%fingerprint, "manager certificate");
        }

        Ok(Self {
            stream,
            state: SessionState::Established,
            peer_fingerprint,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fingerprint of the certificate the manager presented.
    pub fn peer_fingerprint(&self) -> Option<&Fingerprint> {
        self.peer_fingerprint.as_ref()
    }

    /// Send `line` with a single write.
    ///
    /// # Errors
    ///
    /// `EnrollError::ShortWrite` if the channel accepts fewer bytes than
    /// `line.len()`, `EnrollError::Write` on a channel error.
    pub async fn send(&mut self, line: &[u8]) -> Result<(), EnrollError> {
        if self.state != SessionState::Established {
            return Err(EnrollError::SessionClosed);
        }

        let written = self.stream.write(line).await.map_err(EnrollError::Write)?;
        if written < line.len() {
            return Err(EnrollError::ShortWrite {
                written,
                expected: line.len(),
            });
        }
        self.stream.flush().await.map_err(EnrollError::Write)
    }

    /// Wait for the next read from the manager.
    ///
    /// This is the only point where the exchange blocks. There is no timeout.
    pub async fn read_event<'b>(&mut self, buf: &'b mut [u8]) -> ReadEvent<'b> {
        if self.state != SessionState::Established {
            return ReadEvent::ChannelFault(EnrollError::SessionClosed.to_string());
        }
        let result = self.stream.read(buf).await;
        read_event_from(result, buf)
    }

    /// Shut the session down, sending close_notify if still established.
    pub async fn close(&mut self) {
        if self.state == SessionState::Established {
            if let Err(e) = self.stream.shutdown().await {
                tracing::debug!(error = %e, "TLS shutdown failed");
            }
        }
        self.state = SessionState::Closed;
    }
}

/// Map the result of one channel read onto a [`ReadEvent`].
///
/// rustls reports a clean close_notify as a zero-length read, a TCP close
/// without close_notify as `UnexpectedEof`, and TLS-level faults as
/// `InvalidData`. Anything else is a live I/O error.
pub fn read_event_from(result: io::Result<usize>, buf: &[u8]) -> ReadEvent<'_> {
    match result {
        Ok(0) => ReadEvent::CloseNotify,
        Ok(n) => ReadEvent::Data(&buf[..n]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => ReadEvent::PeerHangup,
        Err(e) if e.kind() == io::ErrorKind::InvalidData => ReadEvent::ChannelFault(e.to_string()),
        Err(e) => ReadEvent::IoFault(e.to_string()),
    }
}
