//! OS signal handling.
//!
//! SIGTERM and SIGINT stop the process. SIGUSR2 and SIGHUP queue a routing
//! table refresh and never shut anything down.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::reload::ReloadHandle;

/// Resolve once SIGINT (or SIGTERM on unix) arrives.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Trigger `shutdown` on the first termination signal.
pub fn spawn_shutdown_on_signal(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.trigger();
    })
}

/// Turn SIGUSR2 and SIGHUP into refresh requests until shutdown.
#[cfg(unix)]
pub fn spawn_reload_signals(handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut hup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = usr2.recv() => "SIGUSR2",
                _ = hup.recv() => "SIGHUP",
                _ = shutdown.recv() => break,
            };

            match handle.request_refresh("signal").await {
                Ok(true) => tracing::info!(signal = name, "Routing table refresh requested"),
                Ok(false) => tracing::debug!(signal = name, "Refresh already pending"),
                Err(_) => {
                    tracing::warn!(signal = name, "Reload queue closed, ignoring further signals");
                    break;
                }
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_reload_signals(_handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<JoinHandle<()>> {
    tracing::info!("Reload signals are not supported on this platform");
    Ok(tokio::spawn(async move {
        let _ = shutdown.recv().await;
    }))
}
