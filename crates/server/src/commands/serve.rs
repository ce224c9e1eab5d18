use std::{sync::Arc, time::Duration};

use poem::{listener::TcpListener, Server};

use crate::{app::App, http, supervisor::Supervisor};

use super::{Command, Context};

/// Run the daemon.
#[derive(Debug, clap::Args)]
pub struct Serve {
    /// Do not run the background pollers.
    #[arg(long)]
    no_pollers: bool,
    /// Time given to in-flight requests on shutdown.
    #[arg(long, default_value = "5s")]
    shutdown_timeout: humantime::Duration,
}

impl Command for Serve {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let config = ctx.config();
        let app = Arc::new(App::from_config(config).await?);

        let supervisor = if self.no_pollers {
            Supervisor::default()
        } else {
            Supervisor::start(app.engine(), &config.poller)
        };
        tracing::info!(listen = %config.listen, pollers = supervisor.len(), "serving");

        let result = Server::new(TcpListener::bind(config.listen))
            .run_with_graceful_shutdown(
                http::routes(app.clone()),
                async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!(%err, "failed to listen for shutdown signal");
                    }
                    tracing::info!("shutting down");
                },
                Some(Duration::from(self.shutdown_timeout)),
            )
            .await;

        supervisor.shutdown().await;
        app.save().await?;
        result?;
        Ok(())
    }
}
