use quest_engine::{model::TaskKind, Poller};
use strum::IntoEnumIterator;

use crate::app::App;

use super::{Command, Context};

/// Run one poller pass.
#[derive(Debug, clap::Args)]
pub struct PollOnce {
    /// Task to poll. Polls every task when omitted.
    #[arg(long)]
    task: Option<TaskKind>,
}

impl Command for PollOnce {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let config = ctx.config();
        let app = App::from_config(config).await?;
        let tasks = match self.task {
            Some(task) => vec![task],
            None => TaskKind::iter().collect(),
        };
        for task in tasks {
            let report = Poller::new(app.engine().clone(), task)
                .with_concurrency(config.poller.concurrency)
                .tick()
                .await?;
            println!(
                "{task}: wallets = {}, written = {}, reached = {}, failed = {}",
                report.wallets, report.written, report.reached, report.failed
            );
        }
        app.save().await?;
        Ok(())
    }
}
