use std::sync::Arc;

use goodbyedpi_core::app::App;
use goodbyedpi_core::config::GlobalConfig;
use goodbyedpi_core::status::{LogObserver, StatusObserver, TrayIndicator};
use goodbyedpi_core::supervisor::output::{OutputEvent, OutputSource};
use goodbyedpi_core::supervisor::RunOutcome;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("GoodbyeDPI supervisor starting");

    let cfg = match GlobalConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            GlobalConfig::default()
        }
    };

    let mut app = App::new(cfg);

    // 마지막 프로필 자동 로드 — 실패해도 기본값으로 계속
    if let Err(e) = app.load_profile() {
        tracing::warn!("Failed to auto-load last profile: {}", e);
    }

    // 출력 미러링: goodbyedpi 콘솔 → 로그
    let mut output_rx = app.supervisor().subscribe_output();
    tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(OutputEvent::Line(line)) => match line.source {
                    OutputSource::System => tracing::info!("{}", line.content),
                    _ => tracing::info!(target: "goodbyedpi", "{}", line.content),
                },
                Ok(OutputEvent::Cleared) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!("Output mirror skipped {} lines", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let tray = Arc::new(TrayIndicator::new());
    let observers: Vec<Arc<dyn StatusObserver>> = vec![
        Arc::new(LogObserver::new()) as Arc<dyn StatusObserver>,
        tray.clone() as Arc<dyn StatusObserver>,
    ];
    let poller = app.start_poller(observers);

    if app.config().auto_run {
        match app.run().await {
            Ok(RunOutcome::Started { pid }) => tracing::info!("goodbyedpi started (pid {})", pid),
            Ok(outcome) => tracing::info!("Run request: {:?}", outcome),
            Err(e) => tracing::error!("Run request failed: {}", e),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Shutdown signal received, cleaning up...");

    tray.mark_shutting_down();
    if let Err(e) = app.shutdown(Some(poller)).await {
        tracing::warn!("Shutdown finished with error: {}", e);
    }

    tracing::info!("GoodbyeDPI supervisor exiting");
    Ok(())
}
