//! Agent enrollment client.
//!
//! Connects to the manager's registration service over TLS, sends a single
//! enrollment request and stores the agent key it receives.
//!
//! The flow is strictly sequential:
//! 1. [`connect::connect`] opens the TCP connection
//! 2. [`session::SecureSession::establish`] performs the TLS handshake and,
//!    when a CA certificate is configured, checks the manager's certificate
//! 3. [`enroll::exchange`] writes the request line and classifies replies
//! 4. [`keystore::KeyFile`] persists the key as soon as it arrives

pub mod args;
pub mod config;
pub mod connect;
pub mod enroll;
pub mod error;
pub mod keystore;
pub mod session;
pub mod tls;

pub use config::EnrollConfig;
pub use enroll::{run_enrollment, EnrollmentReport};
pub use error::EnrollError;
pub use keystore::KeyFile;
pub use session::{SecureSession, SessionState};
pub use tls::{TlsContext, TlsSettings};
