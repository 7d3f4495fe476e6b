//! Background snapshotting of the primary store to a read replica.
//!
//! The replica is a whole-file copy refreshed on an interval. Readers
//! that tolerate staleness open it instead of the primary, so browsing
//! and search never contend with the writer; the accepted staleness
//! window is one sync interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ReplicaConfig;
use crate::store::{schema, BlobStore};

/// Handle to the running copy loop. Dropping it without `stop` leaves
/// the task running until the runtime shuts down.
pub struct ReplicaSync {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReplicaSync {
    /// Spawn the copy loop; the first snapshot is taken immediately.
    pub fn spawn(store: Arc<BlobStore>, replica_path: PathBuf, config: ReplicaConfig) -> Self {
        let interval = Duration::from_secs(config.sync_interval_secs);
        let backoff = Duration::from_secs(config.error_backoff_secs);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(replica = %replica_path.display(), "Replica sync started");
            loop {
                let delay = match snapshot_once(&store, &replica_path).await {
                    Ok(()) => interval,
                    Err(e) => {
                        error!(error = %e, "Replica snapshot failed");
                        // A reader must never find a half-written or
                        // schema-less replica.
                        if let Err(e) = init_replica_schema(&replica_path).await {
                            error!(error = %e, "Replica schema re-init failed");
                        }
                        backoff
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Replica sync stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for it to exit. At most one in-flight
    /// tick completes after the signal, so shutdown is deterministic.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Replica sync task did not join cleanly");
        }
    }
}

/// One verify-then-copy cycle. Public so callers (and tests) can force a
/// snapshot outside the loop's cadence.
pub async fn snapshot_once(store: &BlobStore, replica_path: &Path) -> anyhow::Result<()> {
    ensure_replica_schema(replica_path).await?;
    // Flush the WAL so the file copy carries every committed write.
    store.checkpoint().await?;
    // Stage then rename: readers must never open a half-copied file.
    let staging = replica_path.with_extension("db.tmp");
    tokio::fs::copy(store.primary_path(), &staging).await?;
    tokio::fs::rename(&staging, replica_path).await?;
    debug!(replica = %replica_path.display(), "Replica snapshot copied");
    Ok(())
}

async fn ensure_replica_schema(path: &Path) -> anyhow::Result<()> {
    let pool = open_replica_pool(path).await?;
    let intact = schema::has_expected_tables(&pool).await?;
    if !intact {
        info!("Replica schema incomplete, re-initializing");
        schema::init_schema(&pool).await?;
    }
    pool.close().await;
    Ok(())
}

async fn init_replica_schema(path: &Path) -> anyhow::Result<()> {
    let pool = open_replica_pool(path).await?;
    schema::init_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

async fn open_replica_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    Ok(pool)
}
