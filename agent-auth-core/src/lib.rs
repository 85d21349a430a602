//! Pure enrollment protocol library for the agent enrollment client.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//!
//! Callers feed it bytes and read events; persistence is injected via
//! [`response::CredentialSink`].
//!
//! # Example
//!
//! ```
//! use agent_auth_core::{EnrollmentRequest, ReadEvent, ResponseClassifier, ResponseOutcome};
//!
//! let request = EnrollmentRequest::new("web-01", None).unwrap();
//! assert_eq!(request.to_line().as_str(), "OSSEC A:'web-01'\n");
//!
//! let mut classifier = ResponseClassifier::new();
//! let outcome = classifier.classify(ReadEvent::Data(b"OSSEC K:'001 web-01 any f00d'\n"));
//! assert!(matches!(outcome, ResponseOutcome::CredentialIssued(_)));
//! assert_eq!(classifier.classify(ReadEvent::CloseNotify), ResponseOutcome::GracefulClose);
//! ```

pub mod cert;
pub mod error;
pub mod password;
pub mod request;
pub mod response;
pub mod secret;

pub use cert::{verify_peer_name, CertError, Fingerprint};
pub use error::ProtocolError;
pub use password::parse_password_file;
pub use request::EnrollmentRequest;
pub use response::{
    ClassifierState, CredentialSink, ReadEvent, ResponseClassifier, ResponseOutcome,
    READ_BUFFER_SIZE,
};
pub use secret::{Credential, Secret};
