// Queue Table Domain Model
//
// Per-server FIFO queues plus the set of servers currently reserved, kept
// behind a single reader/writer lock so the two never drift apart.

use crate::domain::error::{DomainError, Result};
use crate::domain::{CompactionRequest, ServerName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Queue table specialised for region server compactions
pub type ClusterCompactionQueues = QueueTable<ServerName, CompactionRequest>;

/// How `reserve` treats the concurrency cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// `reserve` never looks at the cap; callers check `at_capacity` first
    #[default]
    Permissive,
    /// `reserve` refuses to mark a new server busy once the cap is reached
    Strict,
}

/// Point-in-time counters, mostly for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub servers: usize,
    pub busy: usize,
    pub pending: usize,
    pub max_concurrent: usize,
}

struct TableState<S, W> {
    queues: BTreeMap<S, VecDeque<W>>,
    busy: BTreeSet<S>,
}

impl<S: Ord, W> TableState<S, W> {
    /// Non-busy server with the strictly largest non-empty queue.
    /// Scans in ascending server order, so ties go to the smallest server.
    fn largest_idle(&self) -> Option<&S> {
        let mut selected = None;
        let mut max_items = 0;
        for (server, queue) in &self.queues {
            if self.busy.contains(server) {
                continue;
            }
            if queue.len() > max_items {
                max_items = queue.len();
                selected = Some(server);
            }
        }
        selected
    }
}

/// Thread-safe multi-queue with admission control.
///
/// Every server gets its own FIFO queue, created on first `enqueue` and kept
/// for the life of the table even once drained. A server becomes busy only
/// when `reserve` actually pops an item, and stays busy until `release`.
///
/// Reads share the lock; `enqueue`, `reserve`, `reserve_next` and `release`
/// take it exclusively. No lock is held once a method returns.
///
/// In [`AdmissionMode::Permissive`] the cap is a caller contract: check
/// [`at_capacity`](Self::at_capacity) before calling
/// [`reserve`](Self::reserve). [`reserve_next`](Self::reserve_next) always
/// honours the cap.
pub struct QueueTable<S, W> {
    state: RwLock<TableState<S, W>>,
    max_concurrent: usize,
    admission: AdmissionMode,
}

impl<S, W> QueueTable<S, W>
where
    S: Ord + Clone + fmt::Display,
{
    /// Create a permissive table allowing `max_concurrent` busy servers
    pub fn new(max_concurrent: usize) -> Result<Self> {
        Self::with_admission(max_concurrent, AdmissionMode::Permissive)
    }

    pub fn with_admission(max_concurrent: usize, admission: AdmissionMode) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(DomainError::ValidationError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            state: RwLock::new(TableState {
                queues: BTreeMap::new(),
                busy: BTreeSet::new(),
            }),
            max_concurrent,
            admission,
        })
    }

    // Critical sections never leave the maps half-updated, so a panic in
    // another holder does not invalidate the state.
    fn read(&self) -> RwLockReadGuard<'_, TableState<S, W>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableState<S, W>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn admission(&self) -> AdmissionMode {
        self.admission
    }

    /// Append `item` to the tail of `server`'s queue
    pub fn enqueue(&self, server: S, item: W) {
        let mut state = self.write();
        let queue = state.queues.entry(server).or_default();
        queue.push_back(item);
    }

    /// True if any server still has queued work
    pub fn has_pending_work(&self) -> bool {
        self.read().queues.values().any(|queue| !queue.is_empty())
    }

    /// Total number of queued items across all servers
    pub fn pending_count(&self) -> usize {
        self.read().queues.values().map(VecDeque::len).sum()
    }

    /// Snapshot of `server`'s queue, `None` if it was never enqueued.
    /// The snapshot is not updated by later mutations.
    pub fn queue_for(&self, server: &S) -> Option<Vec<W>>
    where
        W: Clone,
    {
        self.read()
            .queues
            .get(server)
            .map(|queue| queue.iter().cloned().collect())
    }

    /// Pop the head of `server`'s queue and mark the server busy.
    ///
    /// Returns `Ok(None)` for a known server whose queue is empty, and
    /// [`DomainError::UnknownServer`] for a server that was never enqueued.
    /// In strict mode, reserving a server that is not already busy while the
    /// table is at capacity fails with [`DomainError::CapacityExceeded`] and
    /// leaves the queue untouched.
    pub fn reserve(&self, server: &S) -> Result<Option<W>> {
        let mut state = self.write();
        let state = &mut *state;

        let queue = state
            .queues
            .get_mut(server)
            .ok_or_else(|| DomainError::UnknownServer(server.to_string()))?;

        if queue.is_empty() {
            return Ok(None);
        }

        if self.admission == AdmissionMode::Strict
            && !state.busy.contains(server)
            && state.busy.len() >= self.max_concurrent
        {
            warn!(
                server = %server,
                busy = state.busy.len(),
                max = self.max_concurrent,
                "Reservation refused: at capacity"
            );
            return Err(DomainError::CapacityExceeded {
                busy: state.busy.len(),
                max: self.max_concurrent,
            });
        }

        let item = queue.pop_front();
        state.busy.insert(server.clone());
        debug!(server = %server, remaining = queue.len(), "Server reserved");
        Ok(item)
    }

    /// Select and reserve the best candidate in one critical section.
    ///
    /// Unlike `select_next_server` followed by `reserve`, no other thread can
    /// take the chosen server in between. Returns `None` when at capacity or
    /// when no idle server has work.
    pub fn reserve_next(&self) -> Option<(S, W)> {
        let mut state = self.write();
        if state.busy.len() >= self.max_concurrent {
            return None;
        }

        let server = state.largest_idle()?.clone();
        let item = state.queues.get_mut(&server)?.pop_front()?;
        state.busy.insert(server.clone());
        debug!(server = %server, busy = state.busy.len(), "Server reserved");
        Some((server, item))
    }

    /// Mark `server` as no longer busy. Releasing an idle or unknown server
    /// is a no-op.
    pub fn release(&self, server: &S) {
        if self.write().busy.remove(server) {
            debug!(server = %server, "Server released");
        }
    }

    /// True when the number of busy servers has reached the cap
    pub fn at_capacity(&self) -> bool {
        self.read().busy.len() >= self.max_concurrent
    }

    /// Idle server with the largest backlog, ties going to the smallest
    /// server. Servers with empty queues are never selected.
    ///
    /// The answer may be stale by the time the caller acts on it; a
    /// following `reserve` can still return `Ok(None)`.
    pub fn select_next_server(&self) -> Option<S> {
        self.read().largest_idle().cloned()
    }

    pub fn is_busy(&self, server: &S) -> bool {
        self.read().busy.contains(server)
    }

    pub fn busy_count(&self) -> usize {
        self.read().busy.len()
    }

    /// Number of servers that have ever been enqueued
    pub fn server_count(&self) -> usize {
        self.read().queues.len()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.read();
        QueueStats {
            servers: state.queues.len(),
            busy: state.busy.len(),
            pending: state.queues.values().map(VecDeque::len).sum(),
            max_concurrent: self.max_concurrent,
        }
    }
}
