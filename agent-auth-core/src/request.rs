//! Enrollment request line.

use zeroize::Zeroizing;

use crate::error::ProtocolError;
use crate::secret::Secret;

const PASS_PREFIX: &str = "OSSEC PASS: ";
const AGENT_PREFIX: &str = "OSSEC A:'";

/// The single request sent to the registration service.
///
/// The identity is not escaped. An identity containing `'` or a line break
/// produces a malformed line; see [`EnrollmentRequest::identity_is_line_safe`].
#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    identity: String,
    secret: Option<Secret>,
}

impl EnrollmentRequest {
    /// Build a request for `identity`, optionally authenticated with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::EmptyIdentity` if `identity` is empty.
    pub fn new(identity: impl Into<String>, secret: Option<Secret>) -> Result<Self, ProtocolError> {
        let identity = identity.into();
        if identity.is_empty() {
            return Err(ProtocolError::EmptyIdentity);
        }
        Ok(Self { identity, secret })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether the identity can be embedded in the request line unchanged.
    pub fn identity_is_line_safe(&self) -> bool {
        !self
            .identity
            .chars()
            .any(|c| matches!(c, '\'' | '\n' | '\r'))
    }

    /// Serialize to the wire line, newline included.
    ///
    /// The result may carry the password, so it is zeroized on drop.
    #[must_use]
    pub fn to_line(&self) -> Zeroizing<String> {
        let line = match &self.secret {
            Some(secret) => format!(
                "{PASS_PREFIX}{} {AGENT_PREFIX}{}'\n",
                secret.expose(),
                self.identity
            ),
            None => format!("{AGENT_PREFIX}{}'\n", self.identity),
        };
        Zeroizing::new(line)
    }
}
