use quest_model::{
    progress_percent, reconcile::is_significant_change, reconcile, ClaimKind, ClaimStatus,
    Decimal, TaskKind, TaskStatus, UserId,
};
use serde::Serialize;
use strum::IntoEnumIterator;
use time::OffsetDateTime;

use crate::{
    chain::{self, ChainActivityReader},
    notify::Notifier,
    store::{CampaignProgress, Store, Wallet},
    Engine,
};

/// Progress of a user on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Task.
    pub task: TaskKind,
    /// Aggregated USD value.
    pub total_usd: Decimal,
    /// Status.
    pub status: TaskStatus,
    /// Target USD value.
    pub target: Decimal,
    /// Progress in percent, capped at 100.
    pub progress_percent: Decimal,
    /// Whether the value is the stored one because some network could not be read.
    pub stale: bool,
}

impl Progress {
    fn new(record: &CampaignProgress, stale: bool) -> Self {
        let target = record.task.threshold();
        Self {
            task: record.task,
            total_usd: record.total_usd,
            status: record.status,
            target,
            progress_percent: progress_percent(&record.total_usd, &target),
            stale,
        }
    }
}

/// State of one task in the task-status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskState {
    /// Task.
    pub task: TaskKind,
    /// Stored progress, if any.
    pub progress: Option<Progress>,
    /// Status of the latest reward claim, if any.
    pub claim_status: Option<ClaimStatus>,
}

/// Outcome of applying freshly aggregated activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// The progress after the update.
    pub record: CampaignProgress,
    /// Whether a write happened.
    pub written: bool,
    /// Whether the threshold was reached for the first time.
    pub threshold_reached: bool,
}

impl<S, R, N> Engine<S, R, N>
where
    S: Store,
    R: ChainActivityReader,
    N: Notifier,
{
    /// Re-aggregate the activity of a user for a task and return its progress.
    ///
    /// If some network cannot be read, the stored progress is returned and
    /// marked as stale. Without a stored progress this fails with
    /// [`Error::Unavailable`](crate::Error::Unavailable).
    pub async fn get_progress(&self, user: UserId, task: TaskKind) -> crate::Result<Progress> {
        let wallet = self
            .store
            .wallet_by_user(user)
            .await?
            .ok_or(crate::Error::WalletNotFound)?;
        let (record, stale) = self.refresh_interactive(&wallet, task).await?;
        Ok(Progress::new(&record, stale))
    }

    /// Get the stored progress and latest claim status of every task.
    ///
    /// No chain reads are performed.
    pub async fn task_status(&self, user: UserId) -> crate::Result<Vec<TaskState>> {
        self.require_user(user).await?;
        let mut states = Vec::with_capacity(2);
        for task in TaskKind::iter() {
            let progress = self
                .store
                .progress(user, task)
                .await?
                .map(|record| Progress::new(&record, false));
            let claim_status = self
                .store
                .latest_claim(user, ClaimKind::from(task))
                .await?
                .map(|claim| claim.status);
            states.push(TaskState {
                task,
                progress,
                claim_status,
            });
        }
        Ok(states)
    }

    pub(crate) async fn refresh_interactive(
        &self,
        wallet: &Wallet,
        task: TaskKind,
    ) -> crate::Result<(CampaignProgress, bool)> {
        let aggregate = chain::aggregate(
            &self.reader,
            task,
            &wallet.address,
            &self.options.networks,
            self.options.read_timeout,
        )
        .await;
        let stored = self.store.progress(wallet.user, task).await?;
        if !aggregate.is_complete() {
            tracing::info!(user = %wallet.user, %task, failed = ?aggregate.failed, "using stored progress");
            return match stored {
                Some(record) => Ok((record, true)),
                None => Err(crate::Error::Unavailable),
            };
        }
        let update = self
            .apply_progress(wallet.user, task, aggregate.total, stored)
            .await?;
        Ok((update.record, false))
    }

    /// Reconcile an aggregated value with the stored progress and write it
    /// if the status changed or the value moved by more than the dead band.
    pub(crate) async fn apply_progress(
        &self,
        user: UserId,
        task: TaskKind,
        total_usd: Decimal,
        stored: Option<CampaignProgress>,
    ) -> crate::Result<ProgressUpdate> {
        let prior = stored.as_ref().map(|record| record.status);
        let reconciled = reconcile(&total_usd, &task.threshold(), prior);
        match stored {
            Some(record)
                if !reconciled.is_changed(prior)
                    && !is_significant_change(&record.total_usd, &total_usd) =>
            {
                Ok(ProgressUpdate {
                    record,
                    written: false,
                    threshold_reached: false,
                })
            }
            _ => self.write_progress(user, task, total_usd, reconciled.status).await,
        }
    }

    /// Write progress, award XP on the first qualification and run the
    /// referral trigger.
    pub(crate) async fn write_progress(
        &self,
        user: UserId,
        task: TaskKind,
        total_usd: Decimal,
        status: TaskStatus,
    ) -> crate::Result<ProgressUpdate> {
        let mut record = CampaignProgress {
            user,
            task,
            total_usd,
            status,
            updated_at: OffsetDateTime::now_utc(),
        };
        let previous = self
            .store
            .upsert_progress(record.clone(), self.options.xp_per_task)
            .await?;
        if let Some(previous) = previous {
            record.status = record.status.max(previous);
        }
        let threshold_reached =
            !previous.unwrap_or_default().is_qualified() && record.status.is_qualified();
        tracing::debug!(%user, %task, %total_usd, status = %record.status, "progress written");

        if threshold_reached {
            tracing::info!(%user, %task, xp = self.options.xp_per_task, "task threshold reached");
        }

        if let Err(err) = self.trigger_referral_reward(user).await {
            tracing::warn!(%user, %err, "referral trigger failed");
        }

        Ok(ProgressUpdate {
            record,
            written: true,
            threshold_reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{chain::Network, store::UserDirectory, test::Fixture};

    #[tokio::test]
    async fn get_progress_aggregates_networks() -> crate::Result<()> {
        let fixture = Fixture::new();
        let (user, address) = fixture.user_with_wallet(1);
        fixture
            .reader
            .set(TaskKind::Deposit, &address, Network::Ethereum, dec!(12));
        fixture
            .reader
            .set(TaskKind::Deposit, &address, Network::Polygon, dec!(3.337));

        let progress = fixture.engine.get_progress(user, TaskKind::Deposit).await?;
        assert_eq!(progress.total_usd, dec!(15.337));
        assert_eq!(progress.status, TaskStatus::InProgress);
        assert_eq!(progress.target, dec!(20));
        assert_eq!(progress.progress_percent, dec!(76.68));
        assert!(!progress.stale);
        Ok(())
    }

    #[tokio::test]
    async fn get_progress_falls_back_to_stored_value() -> crate::Result<()> {
        let fixture = Fixture::new();
        let (user, address) = fixture.user_with_wallet(1);
        fixture
            .reader
            .set(TaskKind::Swap, &address, Network::Bsc, dec!(11));
        let progress = fixture.engine.get_progress(user, TaskKind::Swap).await?;
        assert_eq!(progress.status, TaskStatus::Eligible);

        fixture.reader.fail(Network::Ethereum);
        let progress = fixture.engine.get_progress(user, TaskKind::Swap).await?;
        assert!(progress.stale);
        assert_eq!(progress.total_usd, dec!(11));
        assert_eq!(progress.progress_percent, dec!(100));

        let err = fixture
            .engine
            .get_progress(user, TaskKind::Deposit)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Unavailable));
        Ok(())
    }

    #[tokio::test]
    async fn get_progress_requires_wallet() {
        let fixture = Fixture::new();
        fixture.user(7);
        let err = fixture
            .engine
            .get_progress(UserId(7), TaskKind::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::WalletNotFound));
    }

    #[tokio::test]
    async fn xp_is_awarded_once() -> crate::Result<()> {
        let fixture = Fixture::new();
        let (user, address) = fixture.user_with_wallet(1);
        for usd in [dec!(9), dec!(10), dec!(4), dec!(30)] {
            fixture
                .reader
                .set(TaskKind::Swap, &address, Network::Arbitrum, usd);
            fixture.engine.get_progress(user, TaskKind::Swap).await?;
        }
        let account = fixture.engine.store().user(user).await?.unwrap();
        assert_eq!(account.xp, fixture.engine.options().xp_per_task);

        let states = fixture.engine.task_status(user).await?;
        let swap = states.iter().find(|s| s.task == TaskKind::Swap).unwrap();
        let progress = swap.progress.as_ref().unwrap();
        assert_eq!(progress.status, TaskStatus::Eligible);
        assert_eq!(progress.total_usd, dec!(30));
        assert_eq!(swap.claim_status, None);
        Ok(())
    }

    #[tokio::test]
    async fn small_changes_are_not_written() -> crate::Result<()> {
        let fixture = Fixture::new();
        let (user, _) = fixture.user_with_wallet(1);
        let first = fixture
            .engine
            .apply_progress(user, TaskKind::Deposit, dec!(5), None)
            .await?;
        assert!(first.written);
        let second = fixture
            .engine
            .apply_progress(user, TaskKind::Deposit, dec!(5.01), Some(first.record.clone()))
            .await?;
        assert!(!second.written);
        let third = fixture
            .engine
            .apply_progress(user, TaskKind::Deposit, dec!(5.02), Some(first.record))
            .await?;
        assert!(third.written);
        Ok(())
    }
}
