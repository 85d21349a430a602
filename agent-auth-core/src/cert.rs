//! Certificate utilities for X.509 inspection.
//!
//! # Security
//!
//! - Input is limited to 16KB to prevent DoS
//! - The x509_parser library handles ASN.1 parsing safely

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::prelude::*;

/// Maximum certificate size (16KB is generous for a single cert)
pub const MAX_CERT_SIZE: usize = 16 * 1024;

/// Errors that can occur during certificate inspection.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate too large: {0} bytes (max {MAX_CERT_SIZE})")]
    TooLarge(usize),

    #[error("failed to parse X.509 certificate: {0}")]
    ParseError(String),

    #[error("certificate is not valid for {expected} (presented: {})", .presented.join(", "))]
    NameMismatch {
        expected: String,
        presented: Vec<String>,
    },
}

/// SHA-256 fingerprint of a certificate, formatted as `SHA256:{base64url}`.
#[derive(Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    const PREFIX: &'static str = "SHA256:";

    /// Fingerprint the DER encoding of a certificate.
    #[must_use]
    pub fn from_cert_der(cert_der: &[u8]) -> Self {
        let hash: [u8; 32] = Sha256::digest(cert_der).into();
        Self(format!("{}{}", Self::PREFIX, URL_SAFE_NO_PAD.encode(hash)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

/// Check that a DER-encoded certificate names `expected`.
///
/// IP literals are matched against IP address SANs. Host names are matched
/// against DNS SANs, allowing a single `*` as the whole left-most label.
/// The subject CN is consulted only when the certificate has no SAN entry
/// of either kind.
///
/// This is the agent-auth host check, applied after the chain has been
/// verified. It is looser than webpki's name check, which never falls back
/// to the CN, so managers with CN-only certificates still enroll.
///
/// # Errors
///
/// Returns `CertError::TooLarge` if certificate exceeds 16KB.
/// Returns `CertError::ParseError` if the certificate is malformed.
/// Returns `CertError::NameMismatch` if no presented name matches.
pub fn verify_peer_name(cert_der: &[u8], expected: &str) -> Result<(), CertError> {
    if cert_der.len() > MAX_CERT_SIZE {
        return Err(CertError::TooLarge(cert_der.len()));
    }

    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CertError::ParseError(format!("{:?}", e)))?;

    let mut dns_names = Vec::new();
    let mut ip_addrs = Vec::new();
    let san = cert
        .subject_alternative_name()
        .map_err(|e| CertError::ParseError(format!("{:?}", e)))?;
    if let Some(san) = san {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        ip_addrs.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    let matched = if dns_names.is_empty() && ip_addrs.is_empty() {
        let common_names: Vec<String> = cert
            .subject()
            .iter_common_name()
            .filter_map(|cn| cn.as_str().ok().map(str::to_string))
            .collect();
        if common_names.iter().any(|cn| name_matches(cn, expected)) {
            true
        } else {
            return Err(mismatch(expected, common_names));
        }
    } else if let Ok(expected_ip) = expected.parse::<IpAddr>() {
        ip_addrs.contains(&expected_ip)
    } else {
        dns_names.iter().any(|dns| name_matches(dns, expected))
    };

    if matched {
        Ok(())
    } else {
        let presented = dns_names
            .into_iter()
            .chain(ip_addrs.iter().map(IpAddr::to_string))
            .collect();
        Err(mismatch(expected, presented))
    }
}

fn mismatch(expected: &str, presented: Vec<String>) -> CertError {
    CertError::NameMismatch {
        expected: expected.to_string(),
        presented,
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// Case-insensitive host name comparison with left-most label wildcards.
fn name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        // "*.com" would match every name under a TLD
        Some(suffix) if suffix.contains('.') => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        Some(_) => false,
        None => pattern == host,
    }
}
