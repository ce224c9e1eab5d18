use std::{net::SocketAddr, path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use quest_engine::{
    chain::IndexerClient,
    model::{Decimal, TaskKind},
    notify::{telegram::DEFAULT_BOT_API_BASE, LogNotifier, TelegramNotifier},
    options::{DEFAULT_CODE_COOLDOWN, DEFAULT_LINK_COOLDOWN, DEFAULT_READ_TIMEOUT},
    poller::DEFAULT_POLL_INTERVAL,
    EngineOptions, Network,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use strum::IntoEnumIterator;
use url::Url;

use crate::app::AppNotifier;

const ENV_PREFIX: &str = "QUESTD_";

/// We use `__` in the name of environment variable as an alias of `.`.
///
/// See [`Env`] for more infomation.
const DOT_ALIAS: &str = "__";

const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
const DEFAULT_INDEXER_URL: &str = "http://127.0.0.1:8000/";

/// Configuration of `questd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address of the HTTP interface.
    pub listen: SocketAddr,
    /// Bearer token required by the admin endpoints. Admin endpoints are
    /// disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Path of the JSON state snapshot. State is kept in memory only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    /// Pollers.
    pub poller: PollerConfig,
    /// Chain data.
    pub chain: ChainConfig,
    /// Telegram notifications.
    pub telegram: TelegramConfig,
    /// Rewards.
    pub rewards: RewardsConfig,
    /// Rate limits.
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.parse().expect("must be a valid socket address"),
            admin_token: None,
            state_file: None,
            poller: Default::default(),
            chain: Default::default(),
            telegram: Default::default(),
            rewards: Default::default(),
            rate_limit: Default::default(),
        }
    }
}

/// Pollers.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Whether to run the pollers in `serve`.
    pub enabled: bool,
    /// Interval between two passes.
    #[serde_as(as = "DisplayFromStr")]
    pub interval: humantime::Duration,
    /// Wallets visited concurrently.
    pub concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL.into(),
            concurrency: 1,
        }
    }
}

/// Chain data.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Networks to aggregate activity over.
    pub networks: Vec<Network>,
    /// Timeout of a single read.
    #[serde_as(as = "DisplayFromStr")]
    pub read_timeout: humantime::Duration,
    /// Base URL of the indexer.
    pub indexer_url: Url,
    /// API key of the indexer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_api_key: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            networks: Network::iter().collect(),
            read_timeout: DEFAULT_READ_TIMEOUT.into(),
            indexer_url: DEFAULT_INDEXER_URL.parse().expect("must be a valid url"),
            indexer_api_key: None,
        }
    }
}

/// Telegram notifications. Messages are only logged unless both the bot
/// token and the admin chat are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API base URL.
    pub api_base: Url,
    /// Bot token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Chat receiving claim requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_BOT_API_BASE.parse().expect("must be a valid url"),
            bot_token: None,
            admin_chat_id: None,
        }
    }
}

/// Rewards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Reward of the swap task in USDT.
    pub swap: Decimal,
    /// Reward of the deposit task in USDT.
    pub deposit: Decimal,
    /// Reward per qualified referred user in USDT.
    pub referral: Decimal,
    /// XP per task.
    pub xp_per_task: u64,
    /// Number of swap rewards available.
    pub swap_quota: u64,
    /// Number of deposit rewards available.
    pub deposit_quota: u64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            swap: options.swap_reward,
            deposit: options.deposit_reward,
            referral: options.referral_reward,
            xp_per_task: options.xp_per_task,
            swap_quota: 1000,
            deposit_quota: 1000,
        }
    }
}

/// Rate limits.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Cooldown of referral linking.
    #[serde_as(as = "DisplayFromStr")]
    pub link_cooldown: humantime::Duration,
    /// Cooldown of custom code registration.
    #[serde_as(as = "DisplayFromStr")]
    pub code_cooldown: humantime::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            link_cooldown: DEFAULT_LINK_COOLDOWN.into(),
            code_cooldown: DEFAULT_CODE_COOLDOWN.into(),
        }
    }
}

/// Values given on the command line. They take precedence over every
/// other source.
#[derive(Debug, Clone, Default, clap::Args, Serialize)]
pub struct Overrides {
    /// Address of the HTTP interface.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    listen: Option<SocketAddr>,
    /// Path of the JSON state snapshot.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    state_file: Option<PathBuf>,
}

impl Config {
    /// Load the config: defaults, then the TOML file, then `QUESTD_`
    /// prefixed environment variables, then command-line overrides.
    pub fn load(path: &std::path::Path, overrides: &Overrides) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split(DOT_ALIAS))
            .merge(Serialized::defaults(overrides))
            .extract()
    }

    /// Engine options.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::builder()
            .networks(self.chain.networks.clone())
            .read_timeout(self.chain.read_timeout.into())
            .swap_reward(self.rewards.swap)
            .deposit_reward(self.rewards.deposit)
            .referral_reward(self.rewards.referral)
            .xp_per_task(self.rewards.xp_per_task)
            .link_cooldown(self.rate_limit.link_cooldown.into())
            .code_cooldown(self.rate_limit.code_cooldown.into())
            .build()
    }

    /// Create the chain activity reader.
    pub fn reader(&self) -> eyre::Result<IndexerClient> {
        Ok(IndexerClient::try_new(
            self.chain.indexer_url.clone(),
            self.chain.indexer_api_key.clone(),
            self.chain.networks.iter().copied(),
        )?)
    }

    /// Create the notifier.
    pub fn notifier(&self) -> eyre::Result<AppNotifier> {
        let telegram = &self.telegram;
        match (telegram.bot_token.as_deref(), telegram.admin_chat_id) {
            (Some(token), Some(chat)) => Ok(AppNotifier::Left(TelegramNotifier::try_new(
                telegram.api_base.clone(),
                token,
                chat,
            )?)),
            (None, None) => Ok(AppNotifier::Right(LogNotifier)),
            _ => eyre::bail!("`telegram.bot_token` and `telegram.admin_chat_id` must be set together"),
        }
    }

    /// Interval between two poller passes.
    pub fn poll_interval(&self) -> Duration {
        self.poller.interval.into()
    }

    /// Reward quota totals per task.
    pub fn quota_totals(&self) -> [(TaskKind, u64); 2] {
        [
            (TaskKind::Swap, self.rewards.swap_quota),
            (TaskKind::Deposit, self.rewards.deposit_quota),
        ]
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        assert_eq!(config.listen, Config::default().listen);
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.chain.networks.len(), 4);
        assert_eq!(config.rewards.referral, dec!(0.5));
    }

    #[test]
    fn layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                listen = "0.0.0.0:9000"
                admin_token = "secret"

                [poller]
                interval = "30s"

                [chain]
                networks = ["ethereum", "bsc"]
                read_timeout = "2s"
                "#,
            )?;
            jail.set_env("QUESTD_POLLER__CONCURRENCY", "8");
            jail.set_env("QUESTD_ADMIN_TOKEN", "from-env");

            let path = jail.directory().join("config.toml");
            let config = Config::load(&path, &Overrides::default())?;
            assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
            assert_eq!(config.admin_token.as_deref(), Some("from-env"));
            assert_eq!(config.poll_interval(), Duration::from_secs(30));
            assert_eq!(config.poller.concurrency, 8);
            assert_eq!(config.chain.networks, [Network::Ethereum, Network::Bsc]);
            assert_eq!(
                config.engine_options().read_timeout,
                Duration::from_secs(2)
            );

            let overrides = Overrides {
                listen: Some("127.0.0.1:1".parse().unwrap()),
                state_file: None,
            };
            let config = Config::load(&path, &overrides)?;
            assert_eq!(config.listen, "127.0.0.1:1".parse().unwrap());
            Ok(())
        });
    }

    #[test]
    fn telegram_requires_token_and_chat() {
        let mut config = Config::default();
        assert!(matches!(config.notifier().unwrap(), AppNotifier::Right(_)));
        config.telegram.bot_token = Some("123:abc".to_string());
        assert!(config.notifier().is_err());
        config.telegram.admin_chat_id = Some(-100);
        assert!(matches!(config.notifier().unwrap(), AppNotifier::Left(_)));
    }
}
