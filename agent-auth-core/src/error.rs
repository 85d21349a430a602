//! Protocol error types.

/// Errors raised while building a request or classifying a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The agent identity is empty.
    #[error("agent name is empty")]
    EmptyIdentity,

    /// A credential marker was received without its closing apostrophe.
    #[error("invalid key received: missing closing quote")]
    UnterminatedCredential,

    /// The credential bytes are not valid UTF-8.
    #[error("invalid key received: not valid UTF-8")]
    CredentialNotUtf8,

    /// A read event arrived after the exchange already finished.
    #[error("read event after the exchange finished")]
    ReadAfterFinish,
}
