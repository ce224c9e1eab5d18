use std::sync::Arc;

use quest_model::UserId;

use crate::{
    chain::ChainActivityReader,
    notify::{Message, Notifier, Recipient},
    options::EngineOptions,
    rate_limit::{Clock, RateLimiter, SystemClock},
    store::{Store, User},
};

/// Task progress and reward claim engine.
///
/// Operations are split by concern: see the `progress`, `ledger` and
/// `referral` modules. Share it behind an [`Arc`] to run [`Poller`](crate::Poller)s.
#[derive(Debug)]
pub struct Engine<S, R, N> {
    pub(crate) store: S,
    pub(crate) reader: R,
    pub(crate) notifier: Arc<N>,
    pub(crate) options: EngineOptions,
    pub(crate) link_limiter: RateLimiter,
    pub(crate) code_limiter: RateLimiter,
}

impl<S, R, N> Engine<S, R, N>
where
    S: Store,
    R: ChainActivityReader,
    N: Notifier,
{
    /// Create a new engine.
    pub fn new(store: S, reader: R, notifier: N, options: EngineOptions) -> Self {
        Self::with_clock(store, reader, notifier, options, Arc::new(SystemClock))
    }

    /// Create a new engine whose rate limiters use the given clock.
    pub fn with_clock(
        store: S,
        reader: R,
        notifier: N,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let link_limiter = RateLimiter::with_clock(options.link_cooldown, clock.clone());
        let code_limiter = RateLimiter::with_clock(options.code_cooldown, clock);
        Self {
            store,
            reader,
            notifier: Arc::new(notifier),
            options,
            link_limiter,
            code_limiter,
        }
    }

    /// Get the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the chain activity reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Get the notifier.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Get the options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub(crate) async fn require_user(&self, id: UserId) -> crate::Result<User> {
        self.store
            .user(id)
            .await?
            .ok_or(crate::Error::UserNotFound)
    }

    /// Send a notification in the background. Failures are only logged.
    pub(crate) fn notify_detached(&self, recipient: Recipient, message: Message) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.send(&recipient, &message).await {
                tracing::warn!(%recipient, %err, "failed to send notification");
            }
        });
    }
}
