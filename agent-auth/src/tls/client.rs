//! Server certificate verifiers.
//!
//! # Verifiers
//!
//! - [`CaChainVerifier`]: Validates the chain against the configured CA
//! - [`UnverifiedServer`]: Accepts any certificate (no CA configured)
//!
//! Neither checks the server name during the handshake. When a CA is
//! configured the name is checked afterwards by the session, so a name
//! mismatch is reported separately from a chain failure.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

/// Verifies the manager's chain against a CA, ignoring the name.
#[derive(Debug)]
pub struct CaChainVerifier {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl CaChainVerifier {
    pub fn new(roots: RootCertStore, provider: Arc<CryptoProvider>) -> Arc<Self> {
        Arc::new(Self {
            roots: Arc::new(roots),
            provider,
        })
    }
}

impl ServerCertVerifier for CaChainVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.provider.signature_verification_algorithms.all,
        )?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Accepts whatever certificate the manager presents.
///
/// Used when no CA certificate is configured. Handshake signatures are
/// still verified, so the peer must hold the key for the certificate it sent.
#[derive(Debug)]
pub struct UnverifiedServer {
    provider: Arc<CryptoProvider>,
}

impl UnverifiedServer {
    pub fn new(provider: Arc<CryptoProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

impl ServerCertVerifier for UnverifiedServer {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
    use rustls::crypto::ring;

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(ring::default_provider())
    }

    fn ca() -> (rcgen::Certificate, KeyPair) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        (cert, key)
    }

    fn leaf_signed_by(ca_cert: &rcgen::Certificate, ca_key: &KeyPair) -> CertificateDer<'static> {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["manager.local".to_string()]).unwrap();
        params.signed_by(&key, ca_cert, ca_key).unwrap().der().clone()
    }

    fn verify(verifier: &dyn ServerCertVerifier, cert: &CertificateDer<'_>) -> bool {
        verifier
            .verify_server_cert(
                cert,
                &[],
                &ServerName::try_from("other.local").unwrap(),
                &[],
                UnixTime::now(),
            )
            .is_ok()
    }

    #[test]
    fn test_chain_verifier_accepts_cert_from_ca() {
        let (ca_cert, ca_key) = ca();
        let mut roots = RootCertStore::empty();
        roots.add(ca_cert.der().clone()).unwrap();

        let verifier = CaChainVerifier::new(roots, provider());
        let leaf = leaf_signed_by(&ca_cert, &ca_key);

        // Name is deliberately different; only the chain is checked here.
        assert!(verify(verifier.as_ref(), &leaf));
    }

    #[test]
    fn test_chain_verifier_rejects_foreign_cert() {
        let (trusted_ca, _) = ca();
        let (other_ca, other_key) = ca();
        let mut roots = RootCertStore::empty();
        roots.add(trusted_ca.der().clone()).unwrap();

        let verifier = CaChainVerifier::new(roots, provider());
        let leaf = leaf_signed_by(&other_ca, &other_key);

        assert!(!verify(verifier.as_ref(), &leaf));
    }

    #[test]
    fn test_unverified_server_accepts_anything() {
        let (other_ca, other_key) = ca();
        let leaf = leaf_signed_by(&other_ca, &other_key);

        let verifier = UnverifiedServer::new(provider());
        assert!(verify(verifier.as_ref(), &leaf));
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
