use std::{sync::Arc, time::Duration};

use futures_util::{stream, StreamExt};
use quest_model::TaskKind;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::Instrument;

use crate::{
    chain::{self, ChainActivityReader},
    notify::Notifier,
    progress::ProgressUpdate,
    store::{Store, Wallet},
    Engine,
};

/// Default interval between two passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Summary of one pass over all wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Wallets visited.
    pub wallets: usize,
    /// Progress records written.
    pub written: usize,
    /// Wallets that reached the threshold during this pass.
    pub reached: usize,
    /// Wallets whose update failed.
    pub failed: usize,
}

/// Keeps the progress of one task up to date for every wallet.
///
/// Networks that cannot be read contribute zero to the pass. Updates are
/// idempotent upserts, so several pollers (or processes) may run the same
/// task.
#[derive(Debug)]
pub struct Poller<S, R, N> {
    engine: Arc<Engine<S, R, N>>,
    task: TaskKind,
    concurrency: usize,
}

impl<S, R, N> Clone for Poller<S, R, N> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            task: self.task,
            concurrency: self.concurrency,
        }
    }
}

impl<S, R, N> Poller<S, R, N>
where
    S: Store + 'static,
    R: ChainActivityReader + 'static,
    N: Notifier,
{
    /// Create a poller visiting one wallet at a time.
    pub fn new(engine: Arc<Engine<S, R, N>>, task: TaskKind) -> Self {
        Self {
            engine,
            task,
            concurrency: 1,
        }
    }

    /// Set the number of wallets visited concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Get the task.
    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Run one pass over all wallets.
    ///
    /// Failures of single wallets are logged and counted; only a failure to
    /// list the wallets aborts the pass.
    pub async fn tick(&self) -> crate::Result<PassReport> {
        let wallets = self.engine.store.all_wallets().await?;
        let mut report = PassReport {
            wallets: wallets.len(),
            ..Default::default()
        };
        let mut updates = stream::iter(wallets)
            .map(|wallet| async move {
                let result = self.poll_wallet(&wallet).await;
                (wallet, result)
            })
            .buffer_unordered(self.concurrency);
        while let Some((wallet, result)) = updates.next().await {
            match result {
                Ok(update) => {
                    if update.written {
                        report.written += 1;
                    }
                    if update.threshold_reached {
                        report.reached += 1;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(user = %wallet.user, address = %wallet.address, %err, "failed to update progress");
                }
            }
        }
        tracing::debug!(?report, "pass finished");
        Ok(report)
    }

    async fn poll_wallet(&self, wallet: &Wallet) -> crate::Result<ProgressUpdate> {
        let options = &self.engine.options;
        let aggregate = chain::aggregate(
            &self.engine.reader,
            self.task,
            &wallet.address,
            &options.networks,
            options.read_timeout,
        )
        .await;
        let stored = self.engine.store.progress(wallet.user, self.task).await?;
        self.engine
            .apply_progress(wallet.user, self.task, aggregate.total, stored)
            .await
    }

    /// Run a pass every `interval` in the background until the returned
    /// handle is stopped or dropped.
    pub fn spawn(self, interval: Duration) -> PollerHandle {
        let (stop, stopped) = watch::channel(());
        let span = tracing::info_span!("poller", task = %self.task);
        let task = tokio::spawn(self.run(interval, stopped).instrument(span));
        PollerHandle { stop, task }
    }

    async fn run(self, interval: Duration, mut stopped: watch::Receiver<()>) {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("started");
        loop {
            tokio::select! {
                biased;
                _ = stopped.changed() => break,
                _ = interval.tick() => {}
            }
            tokio::select! {
                biased;
                _ = stopped.changed() => break,
                res = self.tick() => {
                    if let Err(err) = res {
                        tracing::warn!(%err, "pass failed");
                    }
                }
            }
        }
        tracing::info!("stopped");
    }
}

/// Handle of a spawned [`Poller`]. Dropping it stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    stop: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poller and wait for it to exit. An in-flight pass is abandoned.
    pub async fn stop(self) {
        let Self { stop, task } = self;
        drop(stop);
        if let Err(err) = task.await {
            tracing::error!(%err, "poller panicked");
        }
    }

    /// Returns whether the poller has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use quest_model::UserId;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        chain::Network,
        options::EngineOptions,
        store::{ProgressStore, User, UserDirectory},
        test::Fixture,
    };

    #[tokio::test]
    async fn failing_wallet_does_not_abort_pass() -> eyre::Result<()> {
        let fixture = Fixture::new();
        let (_, first) = fixture.user_with_wallet(1);
        let (_, second) = fixture.user_with_wallet(2);
        fixture
            .reader
            .set(TaskKind::Deposit, &first, Network::Ethereum, dec!(25));
        fixture
            .reader
            .set(TaskKind::Deposit, &second, Network::Ethereum, dec!(5));
        fixture.reader.fail(Network::Bsc);

        let poller = Poller::new(fixture.engine.clone(), TaskKind::Deposit).with_concurrency(4);
        let report = poller.tick().await?;
        assert_eq!(
            report,
            PassReport {
                wallets: 2,
                written: 2,
                reached: 1,
                failed: 0,
            }
        );

        let report = poller.tick().await?;
        assert_eq!(report.written, 0);
        Ok(())
    }

    #[tokio::test]
    async fn wallet_without_user_is_retried_on_next_pass() -> eyre::Result<()> {
        let fixture = Fixture::new();
        let (_, first) = fixture.user_with_wallet(1);
        let orphan = Fixture::address(2);
        fixture.store.insert_wallet(Wallet {
            user: UserId(2),
            address: orphan.clone(),
        })?;
        fixture
            .reader
            .set(TaskKind::Deposit, &first, Network::Ethereum, dec!(25));
        fixture
            .reader
            .set(TaskKind::Deposit, &orphan, Network::Ethereum, dec!(25));

        let poller = Poller::new(fixture.engine.clone(), TaskKind::Deposit);
        let report = poller.tick().await?;
        assert_eq!(
            report,
            PassReport {
                wallets: 2,
                written: 1,
                reached: 1,
                failed: 1,
            }
        );
        assert!(fixture
            .store
            .progress(UserId(2), TaskKind::Deposit)
            .await?
            .is_none());

        fixture.store.insert_user(User::new(UserId(2)))?;
        let report = poller.tick().await?;
        assert_eq!(report.reached, 1);
        assert_eq!(report.failed, 0);
        let xp = fixture.store.user(UserId(2)).await?.map(|user| user.xp);
        assert_eq!(xp, Some(EngineOptions::default().xp_per_task));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poller_runs_until_stopped() -> eyre::Result<()> {
        let fixture = Fixture::new();
        let (user, address) = fixture.user_with_wallet(1);
        fixture
            .reader
            .set(TaskKind::Swap, &address, Network::Polygon, dec!(10));

        let handle =
            Poller::new(fixture.engine.clone(), TaskKind::Swap).spawn(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let progress = fixture
            .engine
            .store()
            .progress(user, TaskKind::Swap)
            .await?
            .expect("written by the first pass");
        assert_eq!(progress.total_usd, dec!(10));

        fixture
            .reader
            .set(TaskKind::Swap, &address, Network::Polygon, dec!(15));
        tokio::time::sleep(Duration::from_secs(60)).await;
        let progress = fixture
            .engine
            .store()
            .progress(user, TaskKind::Swap)
            .await?
            .expect("written by the second pass");
        assert_eq!(progress.total_usd, dec!(15));

        handle.stop().await;
        Ok(())
    }
}
