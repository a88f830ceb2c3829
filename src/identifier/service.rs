//! Single-owner identifier service.
//!
//! The generator lives on its own thread and is only reachable through
//! request messages. Each request carries a one-shot reply channel; the
//! owner thread processes requests strictly one at a time, which is what
//! guarantees that concurrently requested ranges never overlap.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, info};

use crate::Identifier;
use crate::document::CorpusPartition;
use crate::error::{DedupError, Result};
use crate::identifier::generator::{IdGenerator, IdRange, IdentifierState};

enum Request {
    Assign {
        partition: String,
        count: u64,
        overwrite: bool,
        reply: Sender<Result<IdRange>>,
    },
    Resolve {
        partition: String,
        position: u64,
        reply: Sender<Result<Identifier>>,
    },
    Snapshot {
        reply: Sender<IdentifierState>,
    },
    Shutdown {
        reply: Sender<IdentifierState>,
    },
}

/// Cloneable handle to a running [`IdentifierService`].
#[derive(Debug, Clone)]
pub struct IdentifierHandle {
    sender: Sender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Assign {
                partition, count, ..
            } => write!(f, "Assign({partition}, {count})"),
            Request::Resolve {
                partition,
                position,
                ..
            } => write!(f, "Resolve({partition}, {position})"),
            Request::Snapshot { .. } => write!(f, "Snapshot"),
            Request::Shutdown { .. } => write!(f, "Shutdown"),
        }
    }
}

impl IdentifierHandle {
    fn call<T>(&self, make: impl FnOnce(Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = bounded(1);
        self.sender
            .send(make(reply))
            .map_err(|_| DedupError::ServiceUnavailable("identifier service stopped".into()))?;
        response
            .recv()
            .map_err(|_| DedupError::ServiceUnavailable("identifier service dropped a reply".into()))
    }

    /// Reserve `count` identifiers for `partition`.
    pub fn assign(&self, partition: &str, count: u64, overwrite: bool) -> Result<IdRange> {
        self.call(|reply| Request::Assign {
            partition: partition.to_string(),
            count,
            overwrite,
            reply,
        })?
    }

    /// Identifier of the record at `position` of `partition`.
    pub fn resolve(&self, partition: &str, position: u64) -> Result<Identifier> {
        self.call(|reply| Request::Resolve {
            partition: partition.to_string(),
            position,
            reply,
        })?
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Result<IdentifierState> {
        self.call(|reply| Request::Snapshot { reply })
    }
}

/// Owner of an [`IdGenerator`] running on a dedicated thread.
#[derive(Debug)]
pub struct IdentifierService {
    handle: IdentifierHandle,
    worker: Option<JoinHandle<()>>,
}

impl IdentifierService {
    /// Start a service with a fresh generator.
    pub fn spawn() -> Result<Self> {
        Self::spawn_with(IdGenerator::new())
    }

    /// Start a service from a snapshot.
    pub fn restore(state: IdentifierState) -> Result<Self> {
        Self::spawn_with(IdGenerator::restore(state)?)
    }

    fn spawn_with(generator: IdGenerator) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name("identifier-service".to_string())
            .spawn(move || run(generator, receiver))?;

        Ok(IdentifierService {
            handle: IdentifierHandle { sender },
            worker: Some(worker),
        })
    }

    /// A handle for issuing requests.
    pub fn handle(&self) -> IdentifierHandle {
        self.handle.clone()
    }

    /// Stop the service and return its final state.
    pub fn shutdown(mut self) -> Result<IdentifierState> {
        let state = self.handle.call(|reply| Request::Shutdown { reply })?;
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| DedupError::other("identifier service thread panicked"))?;
        }
        Ok(state)
    }
}

impl Drop for IdentifierService {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let (reply, _response) = bounded(1);
            if self.handle.sender.send(Request::Shutdown { reply }).is_ok() {
                let _ = worker.join();
            }
        }
    }
}

fn run(mut generator: IdGenerator, requests: Receiver<Request>) {
    debug!("identifier service started at next_id={}", generator.next_id());

    for request in requests.iter() {
        match request {
            Request::Assign {
                partition,
                count,
                overwrite,
                reply,
            } => {
                let result = generator.assign(&partition, count, overwrite);
                if let Ok(range) = &result {
                    debug!(
                        "assigned [{}, {}) to partition '{partition}'",
                        range.start, range.end
                    );
                }
                let _ = reply.send(result);
            }
            Request::Resolve {
                partition,
                position,
                reply,
            } => {
                let _ = reply.send(generator.resolve(&partition, position));
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(generator.snapshot());
            }
            Request::Shutdown { reply } => {
                let _ = reply.send(generator.snapshot());
                break;
            }
        }
    }

    info!(
        "identifier service stopped at next_id={}",
        generator.next_id()
    );
}

/// Reserve a range sized to `partition` and stamp identifiers onto its records.
///
/// Records that already carry an identifier are rejected: a partition either
/// brings its own identifiers or has all of them assigned.
pub fn assign_partition_ids(
    handle: &IdentifierHandle,
    partition: &mut CorpusPartition,
    overwrite: bool,
) -> Result<IdRange> {
    if let Some(position) = partition.records.iter().position(|r| r.id.is_some()) {
        return Err(DedupError::partition_mismatch(
            partition.key.clone(),
            format!("record {position} already has an identifier"),
        ));
    }

    let range = handle.assign(&partition.key, partition.len() as u64, overwrite)?;
    for (record, id) in partition.records.iter_mut().zip(range.start..range.end) {
        record.id = Some(id);
    }
    Ok(range)
}
