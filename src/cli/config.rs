use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::config::AppConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (default)
    Show,

    /// Print the configuration file location
    Path,
}

#[derive(Serialize)]
struct EffectiveConfig<'a> {
    path: String,
    #[serde(flatten)]
    config: &'a AppConfig,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let effective = EffectiveConfig {
                path: ctx.config_path().display().to_string(),
                config: ctx.config(),
            };
            emit(output, &effective, || {
                println!("Current configuration ({}):", effective.path);
                match serde_yaml::to_string(effective.config) {
                    Ok(rendered) => print!("{rendered}"),
                    Err(err) => println!("<unprintable: {err}>"),
                }
            })
        }
        ConfigAction::Path => {
            println!("{}", ctx.config_path().display());
            Ok(())
        }
    }
}
