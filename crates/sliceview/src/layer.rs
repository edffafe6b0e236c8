use std::cell::{Cell, RefCell};
use std::rc::Rc;

use foundation::vec::Vec3;
use runtime::signal::{ListenerId, Watchable};

use crate::transformed::TransformedSource;

/// Slot of one visible source: (scale group, index within the group) into a
/// record's `all_sources`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourceSlot {
    pub scale: usize,
    pub index: usize,
}

/// Per-rendered-layer visibility state.
///
/// `all_sources` groups candidate transformed sources by scale, in the
/// order supplied over the channel (coarsest first); `visible_sources` is
/// the recomputed subset actually intersecting the view, preserving that
/// relative order.
///
/// Invariant: `visible_sources` is only read while consistent with the most
/// recent `all_sources` and projection; any change to either marks the
/// record stale first, and the engine recomputes before reading.
pub struct VisibleLayerRecord {
    pub(crate) all_sources: Vec<Vec<TransformedSource>>,
    pub(crate) visible_sources: Vec<SourceSlot>,
    /// Display-dimension generation the current selection was computed
    /// against; `None` until the first recomputation.
    pub(crate) display_generation: Option<u64>,
    pub(crate) stale: Rc<Cell<bool>>,
    /// Finest voxel size this layer wants rendered; coarser scales stay
    /// visible for progressive loading.
    pub render_scale_target: Rc<RefCell<Watchable<f64>>>,
    /// Layer-local offset combined with the view center during enumeration.
    pub local_position: Rc<RefCell<Watchable<Vec3>>>,
    pub(crate) render_scale_listener: ListenerId,
    pub(crate) local_position_listener: ListenerId,
}

impl VisibleLayerRecord {
    pub fn all_sources(&self) -> &[Vec<TransformedSource>] {
        &self.all_sources
    }

    pub fn visible_sources(&self) -> &[SourceSlot] {
        &self.visible_sources
    }

    pub fn source_at(&self, slot: SourceSlot) -> &TransformedSource {
        &self.all_sources[slot.scale][slot.index]
    }

    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    pub fn display_generation(&self) -> Option<u64> {
        self.display_generation
    }
}

impl std::fmt::Debug for VisibleLayerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibleLayerRecord")
            .field("scales", &self.all_sources.len())
            .field("visible_sources", &self.visible_sources)
            .field("display_generation", &self.display_generation)
            .field("stale", &self.stale.get())
            .finish()
    }
}
