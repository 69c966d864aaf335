use super::config::cmd_config;
use super::decisions::{cmd_action, cmd_batch, cmd_check, cmd_refresh};
use super::env::CliArgs;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output;
    match cli.command.clone() {
        Commands::Check(args) => cmd_check(args, ctx, output).await,
        Commands::Action(args) => cmd_action(args, ctx, output).await,
        Commands::Batch(args) => cmd_batch(args, ctx, output).await,
        Commands::Refresh(args) => cmd_refresh(args, ctx, output).await,
        Commands::Config(args) => cmd_config(args, ctx, output).await,
    }
}
