// Server loop module
// Accepts connections until shutdown is signalled, then drains in-flight ones

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Interval between checks while waiting for connections to finish
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop until `shutdown` is notified.
///
/// The listener is dropped as soon as shutdown begins; connections already
/// accepted get up to `drain_timeout` to complete.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
    drain_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    logger::log_server_stop();
    drain_connections(&state, drain_timeout).await;
    Ok(())
}

/// Wait for active connections to reach zero or the timeout to pass
async fn drain_connections(state: &AppState, drain_timeout: Duration) {
    let waited = tokio::time::timeout(drain_timeout, async {
        while state.active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    if waited.is_err() {
        logger::log_warning(&format!(
            "Shutdown with {} connection(s) still open",
            state.active_connections.load(Ordering::SeqCst)
        ));
    }
}
