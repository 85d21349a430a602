//! Test harness for enrollment E2E tests.
//!
//! Runs a mock registration authority on a loopback port: a tokio
//! `TcpListener` wrapped in a tokio-rustls acceptor, with certificates
//! issued by a throwaway rcgen CA.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_auth::config::FileConfig;
use agent_auth::EnrollError;
use agent_auth_core::{Credential, CredentialSink};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SanType,
};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Throwaway certificate authority.
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new() -> Self {
        let key = KeyPair::generate().expect("Failed to generate CA key");
        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "agent-auth test CA");
        let cert = params.self_signed(&key).expect("Failed to self-sign CA");
        Self { cert, key }
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    /// Write the CA certificate as PEM into `dir`.
    pub fn write_pem(&self, dir: &Path) -> PathBuf {
        let path = dir.join("rootCA.pem");
        std::fs::write(&path, self.cert.pem()).expect("Failed to write CA pem");
        path
    }

    /// Issue a leaf certificate for `names` (IP literals become IP SANs).
    pub fn issue(&self, names: &[&str]) -> Issued {
        let key = KeyPair::generate().expect("Failed to generate leaf key");
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, names.first().copied().unwrap_or("leaf"));
        for name in names {
            let san = match name.parse() {
                Ok(ip) => SanType::IpAddress(ip),
                Err(_) => SanType::DnsName((*name).to_string().try_into().expect("Invalid DNS name")),
            };
            params.subject_alt_names.push(san);
        }
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("Failed to sign leaf");
        Issued { cert, key }
    }
}

/// A certificate and key issued by a [`TestCa`].
pub struct Issued {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl Issued {
    pub fn chain(&self) -> Vec<CertificateDer<'static>> {
        vec![self.cert.der().clone()]
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.key.serialize_der()).into()
    }

    /// Write certificate and key as PEM into `dir`.
    pub fn write_pem(&self, dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
        let cert_path = dir.join(format!("{stem}.pem"));
        let key_path = dir.join(format!("{stem}.key"));
        std::fs::write(&cert_path, self.cert.pem()).expect("Failed to write cert pem");
        std::fs::write(&key_path, self.key.serialize_pem()).expect("Failed to write key pem");
        (cert_path, key_path)
    }
}

/// How the mock authority ends the exchange after reading the request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send `payload` (if any), then close_notify.
    Graceful(Option<Vec<u8>>),
    /// Send `payload` (if any), then drop the connection without close_notify.
    Hangup(Option<Vec<u8>>),
    /// Send `payload` (if any), then abort the connection with a TCP reset.
    Reset(Option<Vec<u8>>),
}

impl Reply {
    pub fn key_then_close(key: &str) -> Self {
        Self::Graceful(Some(format!("OSSEC K:'{key}'\n").into_bytes()))
    }
}

/// Mock registration authority serving a single connection.
pub struct MockAuthority {
    pub addr: SocketAddr,
    handle: JoinHandle<String>,
}

impl MockAuthority {
    /// Serve one TLS connection with `identity`, answering with `reply`.
    ///
    /// When `client_ca` is given the authority requires a client certificate
    /// issued by it.
    pub async fn start(identity: &Issued, client_ca: Option<&TestCa>, reply: Reply) -> Self {
        let provider = Arc::new(ring::default_provider());
        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .expect("Failed to select protocol versions");
        let builder = match client_ca {
            Some(ca) => {
                let mut roots = RootCertStore::empty();
                roots.add(ca.der()).expect("Failed to add client CA");
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .build()
                    .expect("Failed to build client verifier");
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };
        let config = builder
            .with_single_cert(identity.chain(), identity.private_key())
            .expect("Failed to build server config");
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("Failed to accept");
            let mut tls = match acceptor.accept(tcp).await {
                Ok(tls) => tls,
                Err(_) => return String::new(),
            };

            // The request must be read in full; closing with unread data
            // turns the hang-up into a reset.
            let request = read_line(&mut tls).await;

            // Write failures are ignored: some tests expect the client to
            // give up before the reply lands.
            match reply {
                Reply::Graceful(payload) => {
                    if let Some(payload) = payload {
                        let _ = tls.write_all(&payload).await;
                    }
                    let _ = tls.shutdown().await;
                    // Wait for the client's own close before releasing the socket.
                    let mut buf = [0u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
                Reply::Hangup(payload) => {
                    if let Some(payload) = payload {
                        let _ = tls.write_all(&payload).await;
                        let _ = tls.flush().await;
                    }
                    drop(tls);
                }
                Reply::Reset(payload) => {
                    if let Some(payload) = payload {
                        let _ = tls.write_all(&payload).await;
                        let _ = tls.flush().await;
                    }
                    // Zero linger makes close send RST instead of FIN.
                    let (tcp, _) = tls.into_inner();
                    let _ = tcp.set_linger(Some(Duration::ZERO));
                    drop(tcp);
                }
            }

            request
        });

        Self { addr, handle }
    }

    /// The request line the client sent.
    pub async fn request(self) -> String {
        self.handle.await.expect("Mock authority panicked")
    }
}

async fn read_line<S>(stream: &mut S) -> String
where
    S: AsyncRead + Unpin,
{
    let mut received = Vec::new();
    let mut buf = [0u8; 512];
    while !received.contains(&b'\n') {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// A plain TCP server that answers with non-TLS bytes.
pub async fn start_plaintext_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        if let Ok((mut tcp, _)) = listener.accept().await {
            let _ = tcp.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            let _ = tcp.shutdown().await;
        }
    });

    addr
}

/// Settings for enrolling against `addr` as `agent_name`.
pub fn settings_for(addr: SocketAddr, agent_name: &str, keys_file: &Path) -> FileConfig {
    FileConfig {
        manager: Some(addr.ip().to_string()),
        port: Some(addr.port()),
        agent_name: Some(agent_name.to_string()),
        keys_file: Some(keys_file.to_path_buf()),
        ..Default::default()
    }
}

/// Credential sink that records what it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    persisted: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn persisted(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

impl CredentialSink for RecordingSink {
    type Error = EnrollError;

    fn persist(&mut self, credential: Credential) -> Result<(), EnrollError> {
        self.persisted
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        Ok(())
    }
}
