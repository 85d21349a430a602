//! Run configuration.
//!
//! Values come from the command line and, optionally, a TOML file given with
//! `--config`. Command-line values win. Everything is validated here, before
//! any connection is attempted.

use std::path::{Path, PathBuf};

use agent_auth_core::{parse_password_file, EnrollmentRequest, Secret};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::args::Args;
use crate::tls::{parse_cipher_list, TlsContext, TlsSettings};

pub const DEFAULT_PORT: u16 = 1515;
pub const DEFAULT_INSTALL_DIR: &str = "/var/ossec";

/// Key store location relative to the install directory.
const KEYS_FILE: &str = "etc/client.keys";

/// Contents of the optional configuration file.
///
/// ```toml
/// manager = "10.0.0.5"
/// port = 1515
/// agent_name = "web-01"
/// password_file = "/var/ossec/etc/authd.pass"
/// ca_cert = "/var/ossec/etc/rootCA.pem"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub manager: Option<String>,
    pub port: Option<u16>,
    pub agent_name: Option<String>,
    pub ciphers: Option<String>,
    pub ca_cert: Option<PathBuf>,
    pub agent_cert: Option<PathBuf>,
    pub agent_key: Option<PathBuf>,
    pub password_file: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub keys_file: Option<PathBuf>,
}

impl FileConfig {
    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Overlay command-line values on top of the file's.
    pub fn merge(self, args: &Args) -> Self {
        Self {
            manager: args.manager.clone().or(self.manager),
            port: args.port.or(self.port),
            agent_name: args.agent_name.clone().or(self.agent_name),
            ciphers: args.ciphers.clone().or(self.ciphers),
            ca_cert: args.ca_cert.clone().or(self.ca_cert),
            agent_cert: args.agent_cert.clone().or(self.agent_cert),
            agent_key: args.agent_key.clone().or(self.agent_key),
            password_file: args.password_file.clone().or(self.password_file),
            install_dir: args.install_dir.clone().or(self.install_dir),
            keys_file: args.keys_file.clone().or(self.keys_file),
        }
    }
}

/// Validated configuration for one enrollment run.
#[derive(Debug)]
pub struct EnrollConfig {
    pub manager: String,
    pub port: u16,
    pub request: EnrollmentRequest,
    pub tls: TlsContext,
    pub keys_file: PathBuf,
}

impl EnrollConfig {
    /// Build the run configuration from parsed arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file.merge(args))
    }

    /// Validate merged settings, load TLS material and the password.
    pub fn resolve(settings: FileConfig) -> Result<Self> {
        let tls_settings = TlsSettings {
            ciphers: settings.ciphers.as_deref().map(parse_cipher_list),
            ca_cert: settings.ca_cert,
            agent_identity: match (settings.agent_cert, settings.agent_key) {
                (Some(cert), Some(key)) => Some((cert, key)),
                (None, None) => None,
                _ => bail!("Agent certificate and key must be given together"),
            },
        };
        let tls = TlsContext::build(&tls_settings).context("SSL error")?;

        let manager = match settings.manager {
            Some(manager) if !manager.trim().is_empty() => manager.trim().to_string(),
            _ => bail!("Manager IP not set"),
        };

        let port = settings.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            bail!("Invalid port: 0");
        }

        let identity = match settings.agent_name {
            Some(name) => name,
            None => local_hostname()?,
        };

        let secret = match &settings.password_file {
            Some(path) => {
                let secret = read_password_file(path)?;
                tracing::info!("Using specified password");
                secret
            }
            None => None,
        };
        if secret.is_none() {
            tracing::warn!("No authentication password provided. Insecure mode started.");
        }

        let request = EnrollmentRequest::new(identity, secret).context("Invalid agent name")?;
        if !request.identity_is_line_safe() {
            tracing::warn!(
                agent_name = %request.identity(),
                "Agent name contains quote or line break characters; the manager may reject it"
            );
        }

        let keys_file = settings.keys_file.unwrap_or_else(|| {
            settings
                .install_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTALL_DIR))
                .join(KEYS_FILE)
        });

        Ok(Self {
            manager,
            port,
            request,
            tls,
            keys_file,
        })
    }
}

fn local_hostname() -> Result<String> {
    let name = hostname::get().context("Unable to extract hostname. Custom agent name not set")?;
    name.into_string()
        .map_err(|_| anyhow::anyhow!("Local host name is not valid UTF-8"))
}

fn read_password_file(path: &Path) -> Result<Option<Secret>> {
    let contents = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open {}", path.display()))?,
    );
    Ok(parse_password_file(&contents))
}
