//! Ctrl-C / SIGTERM handling.

use std::io;

use thiserror::Error;
use tokio::{signal, sync::watch};
use tracing::info;

#[derive(Debug, Error)]
pub enum ShutdownSignalError {
  #[error("failed to install Ctrl+C handler: {0}")]
  CtrlC(#[source] io::Error),

  #[cfg(unix)]
  #[error("failed to install SIGTERM handler: {0}")]
  SigTerm(#[source] io::Error),
}

/// Resolve once the process is asked to stop.
pub async fn wait_for_signal() -> Result<(), ShutdownSignalError> {
  let ctrl_c = async { signal::ctrl_c().await.map_err(ShutdownSignalError::CtrlC) };

  #[cfg(unix)]
  let terminate = async {
    signal::unix::signal(signal::unix::SignalKind::terminate())
      .map_err(ShutdownSignalError::SigTerm)?
      .recv()
      .await;
    Ok::<(), ShutdownSignalError>(())
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<Result<(), ShutdownSignalError>>();

  tokio::select! {
    result = ctrl_c => {
      result?;
      info!("ctrl_c signal received");
    }
    result = terminate => {
      result?;
      info!("terminate signal received");
    }
  }
  Ok(())
}

/// Wait for a signal, then flip `tx` so background tasks stop too.
///
/// A failure to install handlers is logged and treated as a stop request.
pub async fn broadcast_on_signal(tx: watch::Sender<bool>) {
  if let Err(e) = wait_for_signal().await {
    tracing::error!(error = %e, "signal handling failed; shutting down");
  }
  let _ = tx.send(true);
}
