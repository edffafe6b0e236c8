use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use foundation::vec::Vec3;

use crate::chunk::{Chunk, ChunkHandle, ChunkKey, ChunkState};

/// Immutable description of one (data source, scale) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSourceSpec {
    /// Dimensionality of the source's grid, 1 to 3.
    pub rank: usize,
    /// Chunk shape in local chunk-layout units; zero beyond the rank.
    pub chunk_size: Vec3,
    /// Nominal encoded size of one chunk, used as the unit cost for
    /// budgeted fetch draining.
    pub chunk_bytes: u32,
}

impl ChunkSourceSpec {
    pub fn new(rank: usize, chunk_size: Vec3, chunk_bytes: u32) -> Self {
        debug_assert!((1..=3).contains(&rank), "rank out of range: {rank}");
        Self {
            rank,
            chunk_size,
            chunk_bytes,
        }
    }
}

/// Owns the keyed chunk cache for one (source, scale) pair.
///
/// Shared read-only across every layer that references this scale through
/// the registry. The cache only grows here; eviction is the fetch
/// scheduler's responsibility, driven through `evict`.
#[derive(Debug)]
pub struct ChunkSource {
    spec: ChunkSourceSpec,
    chunks: BTreeMap<ChunkKey, ChunkHandle>,
    self_ref: Weak<RefCell<ChunkSource>>,
}

impl ChunkSource {
    pub fn new(spec: ChunkSourceSpec) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                spec,
                chunks: BTreeMap::new(),
                self_ref: weak.clone(),
            })
        })
    }

    pub fn spec(&self) -> &ChunkSourceSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, key: &ChunkKey) -> Option<ChunkHandle> {
        self.chunks.get(key).map(Rc::clone)
    }

    /// Returns the chunk at `grid_position`, creating and registering it on
    /// first request.
    ///
    /// The position is copied defensively; callers reuse their buffer across
    /// enumeration steps.
    pub fn chunk(&mut self, grid_position: &[i64; 3]) -> ChunkHandle {
        let key = ChunkKey::from_grid_position(grid_position, self.spec.rank);
        if let Some(existing) = self.chunks.get(&key) {
            return Rc::clone(existing);
        }
        let chunk = Rc::new(RefCell::new(Chunk::new(
            key.clone(),
            *grid_position,
            self.self_ref.clone(),
        )));
        self.chunks.insert(key, Rc::clone(&chunk));
        chunk
    }

    /// Eviction hook: removes the chunk from the cache and marks it evicted.
    ///
    /// Returns `true` if the chunk was cached.
    pub fn evict(&mut self, key: &ChunkKey) -> bool {
        match self.chunks.remove(key) {
            Some(chunk) => {
                chunk.borrow_mut().set_state(ChunkState::Evicted);
                true
            }
            None => false,
        }
    }

    /// Teardown at registry refcount zero: evicts everything still cached.
    pub(crate) fn clear(&mut self) {
        for chunk in self.chunks.values() {
            chunk.borrow_mut().set_state(ChunkState::Evicted);
        }
        self.chunks.clear();
    }
}
