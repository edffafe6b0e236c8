use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::source::ChunkSource;

/// Cache key of one chunk: the comma-joined decimal coordinates of its grid
/// position, restricted to the owning source's rank.
///
/// Total and collision-free over valid grid positions, so two positions map
/// to the same chunk iff they agree on every axis below the rank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkKey(String);

impl ChunkKey {
    pub fn from_grid_position(position: &[i64; 3], rank: usize) -> Self {
        debug_assert!((1..=3).contains(&rank), "rank out of range: {rank}");
        let mut key = String::new();
        for (i, c) in position[..rank].iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            let _ = write!(key, "{c}");
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Download lifecycle of one chunk.
///
/// `Requested`/`Downloaded` transitions are driven by the fetch scheduler;
/// `Evicted` by the owning source's eviction hook.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChunkState {
    New,
    Requested,
    Downloaded,
    Evicted,
}

/// One cached unit of volumetric data at a single grid position of one
/// (source, scale) pair.
///
/// The back-reference to the owning source is non-owning; the only owning
/// edge runs source → chunk.
#[derive(Debug)]
pub struct Chunk {
    key: ChunkKey,
    grid_position: [i64; 3],
    state: ChunkState,
    pending_fetch: Option<u64>,
    source: Weak<RefCell<ChunkSource>>,
}

pub type ChunkHandle = Rc<RefCell<Chunk>>;

impl Chunk {
    pub(crate) fn new(
        key: ChunkKey,
        grid_position: [i64; 3],
        source: Weak<RefCell<ChunkSource>>,
    ) -> Self {
        Self {
            key,
            grid_position,
            state: ChunkState::New,
            pending_fetch: None,
            source,
        }
    }

    pub fn key(&self) -> &ChunkKey {
        &self.key
    }

    pub fn grid_position(&self) -> &[i64; 3] {
        &self.grid_position
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    /// Id of the in-flight fetch request, owned by the scheduler.
    pub fn pending_fetch(&self) -> Option<u64> {
        self.pending_fetch
    }

    pub fn set_pending_fetch(&mut self, request: Option<u64>) {
        self.pending_fetch = request;
    }

    /// Upgrades the owning-source back-reference, if the source is alive.
    pub fn source(&self) -> Option<Rc<RefCell<ChunkSource>>> {
        self.source.upgrade()
    }
}
