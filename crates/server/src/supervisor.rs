use std::sync::Arc;

use quest_engine::{model::TaskKind, Poller, PollerHandle};
use strum::IntoEnumIterator;

use crate::{app::AppEngine, config::PollerConfig};

/// Owns the background pollers of the daemon.
#[derive(Debug, Default)]
pub struct Supervisor {
    handles: Vec<(TaskKind, PollerHandle)>,
}

impl Supervisor {
    /// Spawn one poller per task, unless pollers are disabled.
    pub fn start(engine: &Arc<AppEngine>, config: &PollerConfig) -> Self {
        if !config.enabled {
            tracing::info!("pollers are disabled");
            return Self::default();
        }
        let handles = TaskKind::iter()
            .map(|task| {
                let handle = Poller::new(engine.clone(), task)
                    .with_concurrency(config.concurrency)
                    .spawn(config.interval.into());
                (task, handle)
            })
            .collect();
        Self { handles }
    }

    /// Number of running pollers.
    pub fn len(&self) -> usize {
        self.handles
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Returns whether no poller is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop all pollers and wait for them to exit.
    pub async fn shutdown(self) {
        for (task, handle) in self.handles {
            handle.stop().await;
            tracing::debug!(%task, "poller stopped");
        }
    }
}
