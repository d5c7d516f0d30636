//! Prioritised oracle request queue.
//!
//! When many agents want the oracle at once, requests flow through a
//! priority queue so that tick-blocking decisions go first and batchable
//! background work fills idle capacity. Requests that out-sit their
//! deadline are dropped rather than answered late into a tick that has
//! already fallen back.
//!
//! Priority order (highest first):
//! 1. Decision (an agent's tick is waiting)
//! 2. Reflection (threshold already crossed)
//! 3. Scoring (poignancy, triples)
//! 4. Background (summaries, batch jobs)

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use hamlet_core::oracle::OracleRequest;

/// Priority levels for queued oracle requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestPriority {
    /// Batch jobs (lowest).
    Background = 0,
    /// Poignancy and triple scoring.
    Scoring = 1,
    /// Reflection synthesis.
    Reflection = 2,
    /// Action decisions (an agent's tick is waiting).
    Decision = 3,
}

/// A queued oracle request with priority and deadline.
#[derive(Debug)]
pub struct QueuedRequest {
    /// Unique request ID.
    pub id: u64,
    /// Priority level.
    pub priority: RequestPriority,
    /// The underlying oracle request.
    pub request: OracleRequest,
    /// When this request was enqueued.
    pub enqueued_at: Instant,
    /// Maximum time to wait in queue before cancelling.
    pub deadline: Duration,
}

impl QueuedRequest {
    /// Whether this request has out-sat its deadline.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.enqueued_at.elapsed() > self.deadline
    }

    /// Remaining time before the deadline.
    #[must_use]
    pub fn time_remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.enqueued_at.elapsed())
    }
}

// BinaryHeap is a max-heap, so higher priority = dequeued first.
impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Primary: priority (higher first).
        // Secondary: FIFO (older first).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}

/// Thread-safe oracle request queue.
pub struct RequestQueue {
    inner: Arc<Mutex<QueueInner>>,
}

struct QueueInner {
    heap: BinaryHeap<QueuedRequest>,
    next_id: u64,
    max_queue_size: usize,
    total_enqueued: u64,
    total_dropped: u64,
    total_expired: u64,
}

/// Statistics about the request queue.
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Current queue depth.
    pub depth: usize,
    /// Total requests enqueued.
    pub total_enqueued: u64,
    /// Total requests dropped (queue full).
    pub total_dropped: u64,
    /// Total requests expired (deadline exceeded).
    pub total_expired: u64,
}

impl RequestQueue {
    /// Create a queue with a maximum size.
    #[must_use]
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_id: 0,
                max_queue_size,
                total_enqueued: 0,
                total_dropped: 0,
                total_expired: 0,
            })),
        }
    }

    /// Enqueue a request.
    ///
    /// Returns the request ID, or `None` if the queue is full.
    pub fn enqueue(
        &self,
        priority: RequestPriority,
        request: OracleRequest,
        deadline: Duration,
    ) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.heap.len() >= inner.max_queue_size {
            inner.total_dropped += 1;
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.total_enqueued += 1;
        inner.heap.push(QueuedRequest {
            id,
            priority,
            request,
            enqueued_at: Instant::now(),
            deadline,
        });
        Some(id)
    }

    /// Dequeue the highest-priority non-expired request, counting and
    /// skipping expired ones.
    pub fn dequeue(&self) -> Option<QueuedRequest> {
        let mut inner = self.inner.lock();
        loop {
            let request = inner.heap.pop()?;
            if request.is_expired() {
                inner.total_expired += 1;
                continue;
            }
            return Some(request);
        }
    }

    /// Peek at the highest-priority request without removing it.
    #[must_use]
    pub fn peek_priority(&self) -> Option<RequestPriority> {
        self.inner.lock().heap.peek().map(|r| r.priority)
    }

    /// Current queue depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            depth: inner.heap.len(),
            total_enqueued: inner.total_enqueued,
            total_dropped: inner.total_dropped,
            total_expired: inner.total_expired,
        }
    }

    /// Purge all expired requests; returns how many were removed.
    pub fn purge_expired(&self) -> u64 {
        let mut inner = self.inner.lock();
        let before = inner.heap.len();
        let mut valid: Vec<QueuedRequest> = Vec::new();
        while let Some(req) = inner.heap.pop() {
            if req.is_expired() {
                inner.total_expired += 1;
            } else {
                valid.push(req);
            }
        }
        for r in valid {
            inner.heap.push(r);
        }
        (before - inner.heap.len()) as u64
    }
}

impl Clone for RequestQueue {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
