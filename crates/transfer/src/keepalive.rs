//! Background keepalive for long-running transfer sessions.
//!
//! Idle FTP control connections on embedded devices drop after a minute
//! or two; a large batch spends most of its wall time inside one upload,
//! but between files the connection can sit idle long enough to die.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::client::SharedClient;

/// Default spacing between keepalive probes.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Scoped keepalive worker bound to one transfer session.
///
/// While the guard lives, a background thread locks the shared client
/// every `interval` and sends a liveness probe. A failed probe stops the
/// loop quietly; the foreground observes the dead connection itself on
/// its next operation and drives the reconnect. Dropping the guard
/// signals the thread and joins it, so no probe can race `close()`.
pub struct KeepaliveGuard {
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl KeepaliveGuard {
    /// Starts probing `client` every `interval`.
    pub fn spawn(client: SharedClient, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let alive = client.lock().unwrap().send_keepalive();
                        if !alive {
                            debug!("keepalive probe failed, stopping");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }
}

impl Drop for KeepaliveGuard {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
