use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config};
use crate::config::LoadedConfig;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_format)?;

    info!("Starting authzctl v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig {
        config,
        path,
        from_file,
    } = load_config(cli.config.as_ref())?;
    debug!(path = %path.display(), from_file, "configuration resolved");
    let cli_context = CliContext::new(config, path, cli.subject.clone())?;

    let result = dispatch(&cli, &cli_context).await;
    let stats = cli_context.cache().stats();
    debug!(
        hits = stats.hits,
        misses = stats.misses,
        issued = stats.issued_calls,
        joined = stats.joined_calls,
        "decision cache usage"
    );

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
