use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use push_relay::config::{Cli, Command, PollerConfig, ServerConfig};
use push_relay::dispatch::{Dispatcher, JenkinsClient};
use push_relay::poller::{CycleOutcome, HttpSnapshotSource, Poller, PollerStateFile};
use push_relay::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "push_relay=debug,tower_http=debug"
    } else {
        "push_relay=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let shutdown = CancellationToken::new();
    tokio::spawn(forward_shutdown_signal(shutdown.clone()));

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig::from_args(args).context("invalid receiver configuration")?;
            server::serve(&config, shutdown).await?;
        }
        Command::Poll(args) => {
            let config = PollerConfig::from_args(args).context("invalid poller configuration")?;
            run_poller(config, shutdown).await?;
        }
    }

    Ok(())
}

async fn run_poller(config: PollerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let http = config
        .http
        .build()
        .context("failed to build HTTP client")?;

    let source = HttpSnapshotSource::new(http.clone(), config.status_url.clone());
    let jenkins = JenkinsClient::new(http, config.jenkins_url.clone())
        .with_auth(config.auth.clone())
        .with_token(config.jenkins_token.clone());

    info!(
        status_url = %config.status_url,
        jenkins_url = %config.jenkins_url,
        jobs = config.job_map.len(),
        data_dir = %config.data_dir.display(),
        "Poller configured"
    );

    let mut poller = Poller::new(
        source,
        Dispatcher::new(jenkins, config.job_map),
        PollerStateFile::in_data_dir(&config.data_dir),
    )
    .with_job_map_reload(config.job_map_path);

    if config.once {
        // A failed cycle is logged, not an exit status.
        match poller.run_cycle_bounded(config.poll.cycle_timeout).await {
            Ok(CycleOutcome::Unchanged) => info!("No changes since last cycle"),
            Ok(CycleOutcome::Dispatched(_)) => {}
            Err(e) => warn!(error = %e, "Poll cycle abandoned"),
        }
        return Ok(());
    }

    poller.run(&config.poll, shutdown).await;
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn forward_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
