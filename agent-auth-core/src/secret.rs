//! Secret material exchanged during enrollment.
//!
//! Both types wrap their contents in `Zeroizing` so the bytes are erased
//! when the value is dropped, and neither prints its contents in `Debug`.

use zeroize::Zeroizing;

/// Maximum effective length of the shared enrollment password, in bytes.
pub const MAX_SECRET_LEN: usize = 32;

/// Shared password presented to the registration service.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Create a secret, truncating to [`MAX_SECRET_LEN`] bytes.
    ///
    /// Truncation never splits a UTF-8 character.
    pub fn new(value: &str) -> Self {
        let mut end = value.len().min(MAX_SECRET_LEN);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self(Zeroizing::new(value[..end].to_string()))
    }

    /// Borrow the secret text.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret").field("len", &self.0.len()).finish()
    }
}

/// Agent key issued by the registration service.
///
/// Written verbatim to the key store, then dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the key text.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("len", &self.0.len())
            .finish()
    }
}
