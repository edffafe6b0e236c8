use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::ids::ObjectId;

use crate::source::ChunkSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    UnknownObject(ObjectId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownObject(id) => write!(f, "unknown shared object: {id}"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug)]
struct Entry {
    source: Rc<RefCell<ChunkSource>>,
    ref_count: u32,
}

/// Explicit identifier → chunk-source map for one side of the layer channel.
///
/// Lifecycle contract:
/// - `register` assigns the next opaque id; the entry starts with one
///   reference held by the registering side.
/// - every `retain` is paired with exactly one `release`.
/// - the source is torn down (cache cleared, entry removed) when the count
///   reaches zero.
///
/// One registry per channel endpoint; never process-global state.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    next_id: u64,
    entries: BTreeMap<ObjectId, Entry>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(&mut self, source: Rc<RefCell<ChunkSource>>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                source,
                ref_count: 1,
            },
        );
        id
    }

    pub fn get(&self, id: ObjectId) -> Result<Rc<RefCell<ChunkSource>>, RegistryError> {
        self.entries
            .get(&id)
            .map(|e| Rc::clone(&e.source))
            .ok_or(RegistryError::UnknownObject(id))
    }

    pub fn ref_count(&self, id: ObjectId) -> Option<u32> {
        self.entries.get(&id).map(|e| e.ref_count)
    }

    pub fn retain(&mut self, id: ObjectId) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(RegistryError::UnknownObject(id))?;
        entry.ref_count += 1;
        Ok(())
    }

    /// Drops one reference.
    ///
    /// Returns `true` if this release tore the source down.
    pub fn release(&mut self, id: ObjectId) -> Result<bool, RegistryError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(RegistryError::UnknownObject(id))?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(false);
        }
        let entry = self.entries.remove(&id).expect("entry present");
        entry.source.borrow_mut().clear();
        Ok(true)
    }
}
