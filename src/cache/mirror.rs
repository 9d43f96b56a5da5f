//! Durable Mirror Module
//!
//! Single background writer that applies cache writes to the durable tier in
//! the order they were queued. Callers queue while holding the memory-tier
//! lock, so durable order matches memory order; waiting for the write to
//! land is separate, through [`Applied`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, DurableTier};
use crate::keys::KeyPattern;

type Ack = Option<oneshot::Sender<()>>;

#[derive(Debug)]
enum MirrorOp {
    Put { key: String, entry: CacheEntry },
    Remove { key: String, ack: Ack },
    RemoveMatching { pattern: KeyPattern, ack: Ack },
    Clear { ack: Ack },
    Flush { ack: Ack },
}

// == Applied ==
/// Handle to a queued operation; [`Applied::wait`] resolves once the writer
/// has applied it.
#[derive(Debug)]
#[must_use = "dropping the handle does not cancel the operation, but nothing waits for it"]
pub struct Applied(Option<oneshot::Receiver<()>>);

impl Applied {
    pub async fn wait(self) {
        if let Some(rx) = self.0 {
            // The writer always acks; an error only means it died mid-queue.
            let _ = rx.await;
        }
    }
}

// == Durable Mirror ==
#[derive(Debug)]
pub struct DurableMirror {
    tx: mpsc::Sender<MirrorOp>,
    worker: JoinHandle<()>,
}

impl DurableMirror {
    /// Spawns the writer task. Must be called inside a tokio runtime.
    ///
    /// The task drains its queue and exits once the mirror is dropped.
    pub fn spawn(durable: Arc<dyn DurableTier>, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let worker = tokio::spawn(run_writer(durable, rx));
        Self { tx, worker }
    }

    // == Put ==
    /// Queues a write, waiting for queue room when the writer falls behind.
    pub async fn put(&self, key: String, entry: CacheEntry) {
        if self.tx.send(MirrorOp::Put { key, entry }).await.is_err() {
            warn!("durable mirror stopped, write kept in memory only");
        }
    }

    /// Queues a removal nobody waits for.
    pub fn discard(&self, key: String) {
        if let Err(err) = self.tx.try_send(MirrorOp::Remove { key, ack: None }) {
            debug!("durable discard skipped: {}", err);
        }
    }

    pub async fn remove(&self, key: String) -> Applied {
        self.request(|ack| MirrorOp::Remove { key, ack }).await
    }

    pub async fn remove_matching(&self, pattern: KeyPattern) -> Applied {
        self.request(|ack| MirrorOp::RemoveMatching { pattern, ack })
            .await
    }

    pub async fn clear(&self) -> Applied {
        self.request(|ack| MirrorOp::Clear { ack }).await
    }

    /// Resolves once every operation queued before it has been applied.
    pub async fn flush(&self) {
        self.request(|ack| MirrorOp::Flush { ack }).await.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    async fn request(&self, build: impl FnOnce(Ack) -> MirrorOp) -> Applied {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(build(Some(ack_tx))).await.is_err() {
            warn!("durable mirror stopped, operation applied to memory only");
            return Applied(None);
        }
        Applied(Some(ack_rx))
    }
}

// == Writer Loop ==
async fn run_writer(durable: Arc<dyn DurableTier>, mut rx: mpsc::Receiver<MirrorOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            MirrorOp::Put { key, entry } => {
                if let Err(err) = durable.put(&key, &entry).await {
                    warn!(key = %key, "durable put failed, dropping stale row: {}", err);
                    // The previous row must not outlive the value that replaced it.
                    if let Err(err) = durable.remove(&key).await {
                        warn!(key = %key, "durable remove after failed put failed: {}", err);
                    }
                }
            }
            MirrorOp::Remove { key, ack } => {
                if let Err(err) = durable.remove(&key).await {
                    warn!(key = %key, "durable remove failed: {}", err);
                }
                send_ack(ack);
            }
            MirrorOp::RemoveMatching { pattern, ack } => {
                match durable.remove_matching(&pattern).await {
                    Ok(removed) => debug!(?pattern, removed, "durable pattern removal"),
                    Err(err) => warn!(?pattern, "durable pattern removal failed: {}", err),
                }
                send_ack(ack);
            }
            MirrorOp::Clear { ack } => {
                if let Err(err) = durable.clear().await {
                    warn!("durable clear failed: {}", err);
                }
                send_ack(ack);
            }
            MirrorOp::Flush { ack } => send_ack(ack),
        }
    }
    debug!("durable mirror writer stopped");
}

fn send_ack(ack: Ack) {
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}
