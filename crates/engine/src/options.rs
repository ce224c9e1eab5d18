use std::time::Duration;

use quest_model::{Decimal, TaskKind};
use rust_decimal_macros::dec;
use strum::IntoEnumIterator;
use typed_builder::TypedBuilder;

use crate::chain::Network;

/// Default cooldown between two referral link attempts.
pub const DEFAULT_LINK_COOLDOWN: Duration = Duration::from_secs(30);

/// Default cooldown between two custom code registrations.
pub const DEFAULT_CODE_COOLDOWN: Duration = Duration::from_secs(10);

/// Default timeout of a single chain read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Options of the [`Engine`](crate::Engine).
#[derive(Debug, Clone, TypedBuilder)]
pub struct EngineOptions {
    /// Networks to aggregate activity over.
    #[builder(default = Network::iter().collect())]
    pub networks: Vec<Network>,
    /// Timeout of a single chain read.
    #[builder(default = DEFAULT_READ_TIMEOUT)]
    pub read_timeout: Duration,
    /// Reward of the swap task.
    #[builder(default = dec!(1))]
    pub swap_reward: Decimal,
    /// Reward of the deposit task.
    #[builder(default = dec!(1))]
    pub deposit_reward: Decimal,
    /// Reward paid to a referrer per qualified referred user.
    #[builder(default = dec!(0.5))]
    pub referral_reward: Decimal,
    /// XP awarded when a task threshold is reached.
    #[builder(default = 100)]
    pub xp_per_task: u64,
    /// Cooldown of referral linking per (address, IP).
    #[builder(default = DEFAULT_LINK_COOLDOWN)]
    pub link_cooldown: Duration,
    /// Cooldown of custom code registration per (address, IP).
    #[builder(default = DEFAULT_CODE_COOLDOWN)]
    pub code_cooldown: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngineOptions {
    /// Get the reward amount of the given task.
    pub fn task_reward(&self, task: TaskKind) -> Decimal {
        match task {
            TaskKind::Swap => self.swap_reward,
            TaskKind::Deposit => self.deposit_reward,
        }
    }
}
