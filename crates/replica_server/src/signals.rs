//! Signal handling for graceful server shutdown.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal (SIGINT or SIGTERM on Unix, Ctrl+C on
/// Windows) and logs it.
///
/// # Returns
///
/// `Ok(())` once a shutdown signal is received, or an error if signal
/// handling setup failed.
pub async fn setup_signal_handlers() -> Result<(), Box<dyn std::error::Error>> {
    setup_signal_handlers_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Waits for a termination signal without logging.
pub async fn setup_signal_handlers_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
