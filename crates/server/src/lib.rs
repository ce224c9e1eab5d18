#![deny(missing_docs)]

//! `questd`: HTTP daemon of the task progress and reward claim engine.

/// Configuration.
pub mod config;

/// Application wiring.
pub mod app;

/// HTTP interface.
pub mod http;

/// Poller supervision.
pub mod supervisor;

/// Commands.
pub mod commands;

use std::{ffi::OsString, ops::Deref, path::PathBuf};

use clap::Parser;
use commands::{Command, Commands, Context};
use config::{Config, Overrides};
use eyre::OptionExt;

const CONFIG_DIR: &str = "questd";

/// Command-line interface of `questd`.
#[derive(Debug)]
pub struct Cli(Inner);

impl Cli {
    /// Creates from the command line arguments.
    pub fn init() -> eyre::Result<Self> {
        Self::try_init_from(std::env::args_os())
    }

    /// Creates from the given arguments.
    pub fn try_init_from<I, T>(args: I) -> eyre::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Inner::try_parse_from(args)?;

        let config_path = cli.find_config()?;
        let config = Config::load(&config_path, &cli.overrides)?;

        Ok(Self(Inner {
            config_path: Some(config_path),
            config,
            ..cli
        }))
    }
}

impl Deref for Cli {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Command-line interface of `questd`.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Inner {
    /// Path to the config file.
    #[clap(long = "config", short)]
    config_path: Option<PathBuf>,
    /// Overrides of the config.
    #[command(flatten)]
    overrides: Overrides,
    /// Loaded config.
    #[clap(skip)]
    config: Config,
    /// Commands.
    #[command(subcommand)]
    command: Commands,
}

impl Inner {
    fn find_config(&self) -> eyre::Result<PathBuf> {
        use etcetera::{choose_base_strategy, BaseStrategy};

        match self.config_path.as_ref() {
            Some(path) => Ok(path.clone()),
            None => {
                let strategy = choose_base_strategy()?;
                Ok(strategy.config_dir().join(CONFIG_DIR).join("config.toml"))
            }
        }
    }

    /// Get the loaded config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute command.
    pub async fn execute(&self) -> eyre::Result<()> {
        let config_path = self
            .config_path
            .as_ref()
            .ok_or_eyre("config path is not set")?;
        self.command
            .execute(Context::new(config_path, &self.config))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() -> eyre::Result<()> {
        let cli = Cli::try_init_from([
            "questd",
            "--config",
            "/nonexistent/questd.toml",
            "--listen",
            "127.0.0.1:9999",
            "serve",
            "--no-pollers",
        ])?;
        assert_eq!(
            cli.config().listen,
            "127.0.0.1:9999".parse::<std::net::SocketAddr>()?
        );
        assert!(matches!(cli.command, Commands::Serve(_)));

        let cli = Cli::try_init_from([
            "questd",
            "--config",
            "/nonexistent/questd.toml",
            "poll-once",
            "--task",
            "swap",
        ])?;
        assert!(matches!(cli.command, Commands::PollOnce(_)));
        Ok(())
    }
}
