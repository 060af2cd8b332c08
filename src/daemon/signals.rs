//! Termination signals (SIGINT, SIGTERM) published on a watch channel.

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

/// Spawn the signal listener. The receiver flips to `true` once on the first termination request.
pub fn shutdown_channel() -> Result<watch::Receiver<bool>> {
    let (notifier, rx) = watch::channel(false);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (SIGINT)"),
                _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
            }
            let _ = notifier.send(true);
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
        let _ = notifier.send(true);
    });

    Ok(rx)
}
