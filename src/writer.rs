//! Write Serializer
//!
//! A mailbox in front of a single writer thread. Every mutation is a message
//! carrying its own reply channel; the writer applies messages one at a time
//! in arrival order, so appends, rotation and compaction never interleave.
//!
//! ```text
//!  caller ──┐
//!  caller ──┼──▶ [ bounded queue ] ──▶ writer thread ──▶ SegmentStore
//!  caller ──┘          ▲                     │
//!                      └──── reply (1) ◀─────┘
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{HashLogError, Result};
use crate::store::{CompactionReport, SegmentStore};

/// A mutation request
#[derive(Debug)]
pub(crate) enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Compact,
    Sync,
}

/// What a successfully applied request produced
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    Applied,
    Compacted(Option<CompactionReport>),
}

struct WriteRequest {
    op: WriteOp,
    reply: Sender<Result<WriteOutcome>>,
}

/// Owns the write mailbox and the writer thread
pub(crate) struct WriteSerializer {
    /// `None` once shut down; callers clone it to submit
    sender: Mutex<Option<Sender<WriteRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteSerializer {
    /// Start the writer thread over `store`
    pub(crate) fn spawn(store: Arc<SegmentStore>, capacity: usize) -> Result<Self> {
        let (sender, receiver) = channel::bounded(capacity);

        let worker = thread::Builder::new()
            .name("hashlog-writer".to_string())
            .spawn(move || run_writer(&store, receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueue `op` and block until the writer has applied it
    pub(crate) fn submit(&self, op: WriteOp) -> Result<WriteOutcome> {
        let sender = self.sender.lock().clone().ok_or(HashLogError::Closed)?;
        let (reply, outcome) = channel::bounded(1);

        sender.send(WriteRequest { op, reply }).map_err(|_| {
            HashLogError::WriterUnavailable("writer thread has exited".to_string())
        })?;
        drop(sender);

        outcome.recv().map_err(|_| {
            HashLogError::WriterUnavailable("writer dropped the request".to_string())
        })?
    }

    /// Stop accepting requests, let the writer drain the queue, and join it
    ///
    /// Requests already enqueued are still applied and answered.
    pub(crate) fn shutdown(&self) -> Result<()> {
        self.sender.lock().take();

        if let Some(worker) = self.worker.lock().take() {
            worker.join().map_err(|_| {
                HashLogError::WriterUnavailable("writer thread panicked".to_string())
            })?;
        }
        Ok(())
    }
}

/// Writer loop: runs until every sender is gone and the queue is empty
fn run_writer(store: &SegmentStore, requests: Receiver<WriteRequest>) {
    tracing::debug!("Writer thread started");

    for request in requests.iter() {
        let result = apply(store, request.op);
        // The caller may have given up waiting; nothing to do then
        let _ = request.reply.send(result);
    }

    tracing::debug!("Writer thread drained and stopped");
}

fn apply(store: &SegmentStore, op: WriteOp) -> Result<WriteOutcome> {
    match op {
        WriteOp::Put { key, value } => store.put(&key, &value).map(|_| WriteOutcome::Applied),
        WriteOp::Delete { key } => store.delete(&key).map(|_| WriteOutcome::Applied),
        WriteOp::Compact => store.compact().map(WriteOutcome::Compacted),
        WriteOp::Sync => store.sync().map(|_| WriteOutcome::Applied),
    }
}
