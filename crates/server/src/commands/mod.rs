use std::path::Path;

use enum_dispatch::enum_dispatch;
use init_config::InitConfig;
use poll_once::PollOnce;
use serve::Serve;

use crate::config::Config;

mod init_config;
mod poll_once;
mod serve;

/// Commands.
#[enum_dispatch]
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Initialize config file.
    InitConfig(InitConfig),
    /// Run the HTTP interface and the background pollers.
    Serve(Serve),
    /// Run a single poller pass and exit.
    PollOnce(PollOnce),
}

/// Execution context of a command.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    config_path: &'a Path,
    config: &'a Config,
}

impl<'a> Context<'a> {
    pub(crate) fn new(config_path: &'a Path, config: &'a Config) -> Self {
        Self {
            config_path,
            config,
        }
    }

    /// Path of the config file.
    pub fn config_path(&self) -> &'a Path {
        self.config_path
    }

    /// Config.
    pub fn config(&self) -> &'a Config {
        self.config
    }
}

#[enum_dispatch(Commands)]
pub(crate) trait Command {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()>;
}
