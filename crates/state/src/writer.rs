//! Ordered background writer for option patches.
//!
//! Every patch goes through one unbounded channel drained by a single task,
//! so storage applies patches in the order they were issued. The task is
//! detached: dropping the store closes the channel, and the task exits only
//! after the queued patches have been written.
//!
//! The channel exists from construction, so patches issued before a Tokio
//! runtime is available are queued and written once the writer starts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::{StorageAdapter, StoredRecord};

enum WriteOp {
    Patch {
        key: String,
        partial: StoredRecord,
        ack: Option<oneshot::Sender<anyhow::Result<()>>>,
    },
    Flush(oneshot::Sender<()>),
}

pub(crate) struct PatchWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
    /// Taken by the writer task when it starts.
    rx: Mutex<Option<mpsc::UnboundedReceiver<WriteOp>>>,
    storage: Arc<dyn StorageAdapter>,
    queued: Arc<AtomicUsize>,
    /// Serializes "apply in memory, then enqueue" so the queue order matches memory.
    order: Mutex<()>,
}

impl PatchWriter {
    pub(crate) fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            storage,
            queued: Arc::new(AtomicUsize::new(0)),
            order: Mutex::new(()),
        }
    }

    /// Runs `apply` and queues the patch as one step.
    pub(crate) fn patch_after(&self, key: String, partial: StoredRecord, apply: impl FnOnce()) {
        {
            let _order = self.order.lock();
            apply();
            self.enqueue(key, partial, None);
        }
        if !self.ensure_started() {
            debug!("no async runtime yet, option patch queued");
        }
    }

    /// Queues a patch and waits for storage to acknowledge it.
    pub(crate) async fn patch_acknowledged(
        &self,
        key: String,
        partial: StoredRecord,
    ) -> anyhow::Result<()> {
        let (ack, done) = oneshot::channel();
        {
            let _order = self.order.lock();
            self.enqueue(key, partial, Some(ack));
        }
        self.ensure_started();
        done.await
            .map_err(|_| anyhow!("option writer stopped before acknowledging"))?
    }

    /// Waits until every patch queued before this call has been written.
    pub(crate) async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(tx)).is_err() {
            warn!("option writer stopped, nothing to flush");
            return;
        }
        self.ensure_started();
        let _ = rx.await;
    }

    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    fn enqueue(
        &self,
        key: String,
        partial: StoredRecord,
        ack: Option<oneshot::Sender<anyhow::Result<()>>>,
    ) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(op)) = self.tx.send(WriteOp::Patch { key, partial, ack }) {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            if let WriteOp::Patch { key, .. } = op {
                warn!(key = %key, "option writer stopped, patch dropped");
            }
        }
    }

    /// Spawns the writer task on the current runtime unless it already runs.
    fn ensure_started(&self) -> bool {
        let mut rx = self.rx.lock();
        if rx.is_none() {
            return true;
        }
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };
        if let Some(receiver) = rx.take() {
            runtime.spawn(run(
                receiver,
                Arc::clone(&self.storage),
                Arc::clone(&self.queued),
            ));
        }
        true
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    storage: Arc<dyn StorageAdapter>,
    queued: Arc<AtomicUsize>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Patch { key, partial, ack } => {
                let result = storage.patch(&key, partial).await;
                queued.fetch_sub(1, Ordering::SeqCst);
                match ack {
                    Some(ack) => {
                        let _ = ack.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!(key = %key, error = %e, "failed to persist option");
                        }
                    }
                }
            }
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("option writer stopped");
}
