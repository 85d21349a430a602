//! agent-auth - requests an agent key from the manager's registration service.

use agent_auth::args::Args;
use agent_auth::{run_enrollment, EnrollConfig, KeyFile};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    let exit_code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(debug: u8) {
    let default_level = match debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = EnrollConfig::from_args(&args)?;

    if args.test_config {
        tracing::info!(
            manager = %config.manager,
            port = config.port,
            keys_file = %config.keys_file.display(),
            "Configuration OK"
        );
        return Ok(());
    }

    tracing::info!(manager = %config.manager, port = config.port, "Starting enrollment");

    let mut key_file = KeyFile::new(config.keys_file.clone());
    run_enrollment(&config, &mut key_file)
        .await
        .with_context(|| format!("Enrollment with {} failed", config.manager))?;

    Ok(())
}
