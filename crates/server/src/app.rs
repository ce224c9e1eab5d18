use std::{path::PathBuf, sync::Arc};

use either::Either;
use eyre::WrapErr;
use quest_engine::{
    chain::IndexerClient,
    notify::{LogNotifier, TelegramNotifier},
    store::{MemoryStore, QuotaStore, Snapshot},
    Engine,
};
use tokio::fs;

use crate::config::Config;

/// Notifier of the daemon: Telegram when configured, the log otherwise.
pub type AppNotifier = Either<TelegramNotifier, LogNotifier>;

/// Engine of the daemon.
pub type AppEngine = Engine<MemoryStore, IndexerClient, AppNotifier>;

/// Shared state of the daemon.
#[derive(Debug)]
pub struct App {
    engine: Arc<AppEngine>,
    store: MemoryStore,
    state_file: Option<PathBuf>,
    admin_token: Option<String>,
}

impl App {
    /// Build the app from config, restoring the state snapshot if present.
    pub async fn from_config(config: &Config) -> eyre::Result<Self> {
        let mut store = MemoryStore::new();
        if let Some(path) = config.state_file.as_ref() {
            if fs::try_exists(path).await? {
                let content = fs::read(path)
                    .await
                    .wrap_err_with(|| format!("reading state file `{}`", path.display()))?;
                let snapshot: Snapshot = serde_json::from_slice(&content)?;
                store = MemoryStore::from_snapshot(snapshot)?;
                tracing::info!(path = %path.display(), "state restored");
            }
        }
        Self::with_store(config, store).await
    }

    /// Build the app over the given store.
    pub async fn with_store(config: &Config, store: MemoryStore) -> eyre::Result<Self> {
        let existing = store.quotas().await?;
        for (task, total) in config.quota_totals() {
            if !existing.iter().any(|quota| quota.task == task) {
                store.set_quota(task, total)?;
            }
        }
        let engine = Engine::new(
            store.clone(),
            config.reader()?,
            config.notifier()?,
            config.engine_options(),
        );
        Ok(Self {
            engine: Arc::new(engine),
            store,
            state_file: config.state_file.clone(),
            admin_token: config.admin_token.clone(),
        })
    }

    /// Get the engine.
    pub fn engine(&self) -> &Arc<AppEngine> {
        &self.engine
    }

    /// Get the store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Get the admin token.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    /// Write the state snapshot, if a state file is configured.
    pub async fn save(&self) -> eyre::Result<()> {
        let Some(path) = self.state_file.as_ref() else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(&self.store.snapshot()?)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        tracing::info!(path = %path.display(), "state saved");
        Ok(())
    }
}
