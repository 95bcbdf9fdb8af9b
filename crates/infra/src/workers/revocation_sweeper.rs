use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use moviestream_auth::CredentialStore;

/// Handle to stop and join a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.join.await;
    }
}

/// Periodically purges revocation records whose tokens have expired.
///
/// - First sweep happens one full period after spawn
/// - Store failures are logged and retried on the next tick
#[derive(Debug)]
pub struct RevocationSweeper;

impl RevocationSweeper {
    pub fn spawn(store: Arc<dyn CredentialStore>, every: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(period = ?every, "revocation sweeper started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => sweep_once(store.as_ref()).await,
                }
            }

            info!("revocation sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

pub async fn sweep_once(store: &dyn CredentialStore) {
    match store.purge_expired_revocations(Utc::now()).await {
        Ok(0) => debug!("no expired revocation records"),
        Ok(purged) => info!(purged, "purged expired revocation records"),
        Err(err) => warn!(error = %err, "revocation sweep failed"),
    }
}
