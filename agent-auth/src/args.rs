//! CLI argument parsing.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Agent enrollment client - requests an agent key from the manager.
///
/// Every option may also be given in the file passed with `--config`;
/// command-line values win.
#[derive(Parser, Debug, Default)]
#[command(name = "agent-auth", version)]
pub struct Args {
    /// Manager host name or IP address
    #[arg(short = 'm', long, value_name = "HOST")]
    pub manager: Option<String>,

    /// Manager registration port [default: 1515]
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Agent name [default: local host name]
    #[arg(short = 'A', long = "agent-name", value_name = "NAME")]
    pub agent_name: Option<String>,

    /// Allowed cipher suites, separated by ':' or ','
    #[arg(short = 'c', long, value_name = "SUITES")]
    pub ciphers: Option<String>,

    /// CA certificate used to verify the manager
    #[arg(short = 'v', long = "ca-cert", value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// Agent certificate for client authentication
    #[arg(short = 'x', long = "agent-cert", value_name = "PATH")]
    pub agent_cert: Option<PathBuf>,

    /// Agent private key for client authentication
    #[arg(short = 'k', long = "agent-key", value_name = "PATH")]
    pub agent_key: Option<PathBuf>,

    /// File holding the registration password on its first line
    #[arg(short = 'P', long = "password-file", value_name = "PATH")]
    pub password_file: Option<PathBuf>,

    /// Installation directory [default: /var/ossec]
    #[arg(short = 'D', long = "install-dir", value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Key store path [default: <install-dir>/etc/client.keys]
    #[arg(long = "keys-file", value_name = "PATH")]
    pub keys_file: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeat for more)
    #[arg(short = 'd', action = ArgAction::Count)]
    pub debug: u8,

    /// Test the configuration and exit
    #[arg(short = 't', long = "test-config")]
    pub test_config: bool,
}
