//! Agent key persistence.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use agent_auth_core::{Credential, CredentialSink};
use zeroize::Zeroizing;

use crate::error::EnrollError;

/// Key store file, truncated and rewritten with `<key>\n`.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, source: std::io::Error) -> EnrollError {
        EnrollError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialSink for KeyFile {
    type Error = EnrollError;

    fn persist(&mut self, credential: Credential) -> Result<(), EnrollError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|e| self.persistence_error(e))?;

        let mut contents = Zeroizing::new(String::with_capacity(credential.expose().len() + 1));
        contents.push_str(credential.expose());
        contents.push('\n');

        file.write_all(contents.as_bytes())
            .map_err(|e| self.persistence_error(e))?;
        file.sync_all().map_err(|e| self.persistence_error(e))?;

        tracing::debug!(path = %self.path.display(), "agent key written");
        Ok(())
    }
}
