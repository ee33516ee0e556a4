//! Shutdown signalling shared by server and client tasks

use tokio::sync::watch;

/// Resolves once `true` has been sent or the sender is dropped
///
/// Returns immediately if shutdown was already signalled, so it is safe to
/// poll repeatedly inside `select!` loops.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Non-blocking check of the shutdown flag
pub(crate) fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}
