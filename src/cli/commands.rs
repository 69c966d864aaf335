use clap::Subcommand;

use super::config::ConfigArgs;
use super::decisions::{ActionArgs, BatchArgs, CheckArgs, RefreshArgs};

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Show the cached permission state for one object
    Check(CheckArgs),

    /// Ask the engine about one action, bypassing the cache
    Action(ActionArgs),

    /// Check the configured actions for several objects in one call
    Batch(BatchArgs),

    /// Drop cached decisions for one object and fetch them again
    Refresh(RefreshArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}
