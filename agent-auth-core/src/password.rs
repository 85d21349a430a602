//! Password file parsing.

use crate::secret::Secret;

/// Shorter first lines are treated as "no password".
pub const MIN_SECRET_LEN: usize = 3;

/// Extract the enrollment password from password file contents.
///
/// Only the first line is used, without its line terminator. Lines shorter
/// than [`MIN_SECRET_LEN`] bytes yield `None`; longer ones are truncated to
/// [`crate::secret::MAX_SECRET_LEN`] bytes.
pub fn parse_password_file(contents: &str) -> Option<Secret> {
    let first = contents.split('\n').next().unwrap_or_default();
    let line = first.strip_suffix('\r').unwrap_or(first);

    if line.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(Secret::new(line))
}
