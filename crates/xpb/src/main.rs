use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use xpb_core::{
    commands::CommandRouter, config::Config, jobs::StatsNotifyJob, service::BotService,
    session::SessionManager, status::StatusReporter,
};
use xpb_panel::{HostProbe, JsonInboundStore, XrayController};
use xpb_telegram::TelegramTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    xpb_core::logging::init("xpb")?;

    let cfg = Arc::new(Config::load().context("loading configuration")?);

    let inbounds = Arc::new(JsonInboundStore::new(cfg.inbounds_file.clone()));
    let proxy = Arc::new(XrayController::new(
        cfg.xray_bin.clone(),
        cfg.xray_restart_cmd.clone(),
    ));
    let probe = Arc::new(
        HostProbe::new(cfg.ip_endpoints.clone(), cfg.http_timeout)
            .context("building host probe")?,
    );

    let status = Arc::new(StatusReporter::new(probe, proxy.clone(), inbounds.clone()));
    let router = Arc::new(CommandRouter::new(inbounds, proxy, status.clone()));

    let transport = Arc::new(TelegramTransport::new(cfg.poll_timeout));
    let session = Arc::new(SessionManager::new(transport, cfg.poll_timeout));
    let bot = BotService::new(cfg.clone(), session, router);

    if bot.start_run().await.is_err() {
        // Already logged; without a session there is nothing to serve.
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let job = match cfg.stats_interval {
        Some(every) => Some(
            StatsNotifyJob::new(status.clone(), bot.notifier(), every)
                .context("configuring stats notify job")?
                .spawn(cancel.clone()),
        ),
        None => None,
    };

    shutdown_signal().await?;
    info!("shutting down");

    cancel.cancel();
    if let Some(job) = job {
        if let Err(e) = job.await {
            warn!(error = %e, "stats notify job failed");
        }
    }
    bot.stop_run_and_close().await;
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r.context("waiting for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    Ok(())
}
