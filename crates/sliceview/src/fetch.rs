use std::collections::BTreeMap;
use std::rc::Rc;

use runtime::budget::FetchBudget;
use runtime::schedule::UpdateScheduler;
use runtime::work_queue::{WorkId, WorkQueue, WorkQueueFull};
use tracing::warn;

use crate::chunk::{ChunkHandle, ChunkState};
use crate::priority::PriorityTier;

/// Interface the visibility engine submits into.
pub trait ChunkScheduler {
    fn request_chunk(&mut self, chunk: &ChunkHandle, tier: PriorityTier, score: f64);

    /// Debounced request for another priority pass.
    fn schedule_update_chunk_priorities(&mut self);
}

/// Queue ordering key: earlier tiers first, then larger scores, then
/// submission order. Smaller keys run earlier (work-queue convention).
#[derive(Debug, Copy, Clone)]
pub struct FetchPriority {
    pub tier: PriorityTier,
    pub score: f64,
}

impl PartialEq for FetchPriority {
    fn eq(&self, other: &Self) -> bool {
        self.tier == other.tier && self.score.total_cmp(&other.score).is_eq()
    }
}

impl Eq for FetchPriority {}

impl Ord for FetchPriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| other.score.total_cmp(&self.score))
    }
}

impl PartialOrd for FetchPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Copyable handle of one pending fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchRequest(pub u64);

/// Configuration for the reference fetch scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Maximum pending requests before submissions are rejected.
    pub max_pending: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_pending: 256 }
    }
}

/// Reference chunk scheduler: a deterministic priority queue over pending
/// fetches, plus the eviction hook.
///
/// Each submission marks its chunk `Requested`; re-submitting a pending
/// chunk refreshes its priority in place instead of duplicating the
/// request. Draining pops in `(tier, score, submission)` order under a
/// per-turn unit budget, where a chunk's cost is its source's nominal
/// encoded size.
#[derive(Debug)]
pub struct FetchScheduler {
    queue: WorkQueue<FetchPriority, FetchRequest>,
    pending: BTreeMap<FetchRequest, (WorkId, ChunkHandle)>,
    next_request: u64,
    rejected: u64,
    update: Rc<UpdateScheduler>,
}

impl FetchScheduler {
    pub fn new(config: FetchConfig, update: Rc<UpdateScheduler>) -> Self {
        Self {
            queue: WorkQueue::with_max_len(config.max_pending),
            pending: BTreeMap::new(),
            next_request: 0,
            rejected: 0,
            update,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Submissions dropped because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Submits a fetch for `chunk`, refreshing the priority of an
    /// already-pending request.
    ///
    /// Returns `Ok(None)` for a chunk that is already downloaded.
    pub fn try_request(
        &mut self,
        chunk: &ChunkHandle,
        tier: PriorityTier,
        score: f64,
    ) -> Result<Option<FetchRequest>, WorkQueueFull> {
        if chunk.borrow().state() == ChunkState::Downloaded {
            return Ok(None);
        }
        if let Some(prior) = chunk.borrow().pending_fetch() {
            if let Some((work, _)) = self.pending.remove(&FetchRequest(prior)) {
                self.queue.cancel(work);
            }
        }

        let cost = chunk
            .borrow()
            .source()
            .map(|s| s.borrow().spec().chunk_bytes)
            .unwrap_or(1);
        let request = FetchRequest(self.next_request);
        let work = match self
            .queue
            .try_push_with_cost(FetchPriority { tier, score }, cost, request)
        {
            Ok(work) => work,
            Err(full) => {
                let mut chunk = chunk.borrow_mut();
                chunk.set_pending_fetch(None);
                if chunk.state() == ChunkState::Requested {
                    chunk.set_state(ChunkState::New);
                }
                return Err(full);
            }
        };
        self.next_request += 1;

        {
            let mut chunk = chunk.borrow_mut();
            chunk.set_state(ChunkState::Requested);
            chunk.set_pending_fetch(Some(request.0));
        }
        self.pending.insert(request, (work, Rc::clone(chunk)));
        Ok(Some(request))
    }

    /// Cancels a pending request.
    ///
    /// Returns `true` if it was still pending.
    pub fn cancel(&mut self, request: FetchRequest) -> bool {
        let Some((work, chunk)) = self.pending.remove(&request) else {
            return false;
        };
        self.queue.cancel(work);
        let mut chunk = chunk.borrow_mut();
        chunk.set_pending_fetch(None);
        if chunk.state() == ChunkState::Requested {
            chunk.set_state(ChunkState::New);
        }
        true
    }

    /// Pops the most urgent pending fetch the budget can afford.
    ///
    /// An unaffordable head-of-queue item stops the drain for this turn.
    pub fn pop_next_with_budget(
        &mut self,
        budget: &mut FetchBudget,
    ) -> Option<(FetchRequest, ChunkHandle)> {
        let (_, _, request) = self.queue.pop_next_with_budget(budget)?;
        let (_, chunk) = self.pending.remove(&request).expect("pending entry");
        chunk.borrow_mut().set_pending_fetch(None);
        Some((request, chunk))
    }

    /// Marks a popped chunk's payload as downloaded.
    pub fn complete(&mut self, chunk: &ChunkHandle) {
        let mut chunk = chunk.borrow_mut();
        chunk.set_state(ChunkState::Downloaded);
        chunk.set_pending_fetch(None);
    }

    /// Eviction hook: cancels any pending fetch and removes the chunk from
    /// its owning source's cache.
    ///
    /// Returns `true` if the chunk was still cached.
    pub fn evict(&mut self, chunk: &ChunkHandle) -> bool {
        let prior = chunk.borrow().pending_fetch();
        if let Some(prior) = prior {
            self.cancel(FetchRequest(prior));
        }
        let key = chunk.borrow().key().clone();
        match chunk.borrow().source() {
            Some(source) => source.borrow_mut().evict(&key),
            None => false,
        }
    }
}

impl ChunkScheduler for FetchScheduler {
    fn request_chunk(&mut self, chunk: &ChunkHandle, tier: PriorityTier, score: f64) {
        if let Err(full) = self.try_request(chunk, tier, score) {
            self.rejected += 1;
            warn!(chunk = %chunk.borrow().key(), %full, "fetch queue full, dropping request");
        }
    }

    fn schedule_update_chunk_priorities(&mut self) {
        self.update.request();
    }
}
