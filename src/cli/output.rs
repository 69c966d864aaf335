use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Print `payload` as JSON or YAML, or run `human` for the text rendering.
pub fn emit<T, F>(output: OutputFormat, payload: &T, human: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(),
{
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(payload)?),
        OutputFormat::Human => human(),
    }
    Ok(())
}
