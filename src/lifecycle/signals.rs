//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on unix, SIGTERM both resolve `interrupt`, which the
//! coordinator treats as a graceful shutdown trigger. A handler that cannot be
//! installed is logged and simply never fires.

use std::future::pending;

/// Resolves when the process is asked to stop.
pub async fn interrupt() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
