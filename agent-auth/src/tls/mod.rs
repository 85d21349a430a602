//! TLS configuration for the enrollment connection.
//!
//! Builds the rustls client context once, before connecting:
//! - cipher suites, optionally restricted by name
//! - manager verification against a CA certificate, or none at all
//! - an optional agent certificate and key for client authentication

mod client;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite};
use tokio_rustls::TlsConnector;

pub use client::{CaChainVerifier, UnverifiedServer};

/// Inputs for building a [`TlsContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// Allowed cipher suite names (e.g. `TLS13_AES_256_GCM_SHA384`).
    /// `None` keeps every suite the provider supports.
    pub ciphers: Option<Vec<String>>,
    /// CA certificate (PEM) used to verify the manager.
    pub ca_cert: Option<PathBuf>,
    /// Agent certificate and private key (PEM) for client authentication.
    pub agent_identity: Option<(PathBuf, PathBuf)>,
}

/// Pre-built client TLS context.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    verifies_peer: bool,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("verifies_peer", &self.verifies_peer)
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Build the client context from settings.
    pub fn build(settings: &TlsSettings) -> Result<Self, TlsConfigError> {
        let provider = Arc::new(crypto_provider(settings.ciphers.as_deref())?);

        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| TlsConfigError::Config(e.to_string()))?
            .dangerous();

        let builder = match &settings.ca_cert {
            Some(path) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(path)? {
                    roots
                        .add(cert)
                        .map_err(|e| TlsConfigError::InvalidCert(e.to_string()))?;
                }
                builder.with_custom_certificate_verifier(CaChainVerifier::new(roots, provider))
            }
            None => builder.with_custom_certificate_verifier(UnverifiedServer::new(provider)),
        };

        let config = match &settings.agent_identity {
            Some((cert_path, key_path)) => builder
                .with_client_auth_cert(load_certs(cert_path)?, load_private_key(key_path)?)
                .map_err(|e| TlsConfigError::Config(e.to_string()))?,
            None => builder.with_no_client_auth(),
        };

        Ok(Self {
            config: Arc::new(config),
            verifies_peer: settings.ca_cert.is_some(),
        })
    }

    /// Whether the manager certificate is checked after the handshake.
    pub fn verifies_peer(&self) -> bool {
        self.verifies_peer
    }

    pub fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.config.clone())
    }
}

/// Split a cipher list on `:` or `,`, dropping empty entries.
pub fn parse_cipher_list(list: &str) -> Vec<String> {
    list.split([':', ','])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn suite_name(suite: &SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

/// The ring provider, restricted to `ciphers` when given.
fn crypto_provider(ciphers: Option<&[String]>) -> Result<CryptoProvider, TlsConfigError> {
    let mut provider = ring::default_provider();

    if let Some(names) = ciphers {
        let wanted: Vec<String> = names.iter().map(|n| n.to_ascii_uppercase()).collect();
        if wanted.is_empty() {
            return Err(TlsConfigError::NoCiphers);
        }
        if let Some(unknown) = wanted
            .iter()
            .find(|name| !provider.cipher_suites.iter().any(|s| suite_name(s) == **name))
        {
            return Err(TlsConfigError::UnknownCipher(unknown.clone()));
        }
        provider
            .cipher_suites
            .retain(|suite| wanted.contains(&suite_name(suite)));
    }

    Ok(provider)
}

fn open_pem(path: &Path) -> Result<BufReader<File>, TlsConfigError> {
    let file = File::open(path).map_err(|source| TlsConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Load every certificate from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsConfigError::InvalidCert(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let mut reader = open_pem(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsConfigError::MissingKey(path.to_path_buf()))
}

/// Errors that can occur during TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("no private key found in {}", .0.display())]
    MissingKey(PathBuf),
    #[error("unknown cipher suite: {0}")]
    UnknownCipher(String),
    #[error("empty cipher list")]
    NoCiphers,
    #[error("failed to build config: {0}")]
    Config(String),
}
