use std::cell::{Cell, RefCell};
use std::rc::Rc;

use foundation::bounds::Box3;
use foundation::ids::ObjectId;
use foundation::vec::Vec3;
use geometry::plane::Plane;

use crate::registry::{RegistryError, SourceRegistry};
use crate::source::ChunkSource;

/// Fixed per-axis map from layer space into one source's chunk-layout
/// space: `local = (layer - offset) / scale`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChunkTransform {
    pub scale: Vec3,
    pub offset: Vec3,
}

impl ChunkTransform {
    pub fn identity() -> Self {
        Self {
            scale: Vec3::splat(1.0),
            offset: Vec3::ZERO,
        }
    }

    pub fn new(scale: Vec3, offset: Vec3) -> Self {
        debug_assert!(
            scale.x != 0.0 && scale.y != 0.0 && scale.z != 0.0,
            "degenerate transform scale"
        );
        Self { scale, offset }
    }

    pub fn layer_to_local(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            (p.x - self.offset.x) / self.scale.x,
            (p.y - self.offset.y) / self.scale.y,
            (p.z - self.offset.z) / self.scale.z,
        )
    }

    /// Transforms a layer-space plane into local space.
    ///
    /// For `layer = local * scale + offset`, substituting into
    /// `n · layer + d = 0` gives a local normal of `n * scale` and a local
    /// offset of `d + n · offset`.
    pub fn plane_to_local(&self, plane: &Plane) -> Plane {
        Plane::new(plane.n.mul(self.scale), plane.d + plane.n.dot(self.offset))
    }
}

/// Geometry binding one (source, scale) into a layer's view space, as
/// decoded from a scale descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGeometry {
    /// Chunk size in local chunk-layout units (finite-rank size vector).
    pub layout_size: Vec3,
    pub layer_rank: usize,
    /// Clip bounds in local chunk-layout space, covering displayed and
    /// non-displayed axes.
    pub clip_bounds: Box3,
    pub effective_voxel_size: Vec3,
    /// Chunk-space display dimension → global display dimension.
    pub display_dimensions: [usize; 3],
    /// Fixed layer-to-chunk transform.
    pub transform: ChunkTransform,
}

/// One (source, scale) bound into a layer's view-space geometry.
///
/// Exclusively owned by the layer record holding it until replaced or
/// disposed; the chunk source behind it is shared through the registry.
/// The two scratch buffers are overwritten during each intersection
/// enumeration and must never be aliased across passes.
#[derive(Debug)]
pub struct TransformedSource {
    source_id: ObjectId,
    source: Rc<RefCell<ChunkSource>>,
    pub geometry: SourceGeometry,
    cur_position_in_chunks: Cell<[i64; 3]>,
    fixed_position_within_chunk: RefCell<Vec3>,
    disposed: Cell<bool>,
}

impl TransformedSource {
    pub fn new(
        source_id: ObjectId,
        source: Rc<RefCell<ChunkSource>>,
        geometry: SourceGeometry,
    ) -> Self {
        Self {
            source_id,
            source,
            geometry,
            cur_position_in_chunks: Cell::new([0; 3]),
            fixed_position_within_chunk: RefCell::new(Vec3::ZERO),
            disposed: Cell::new(false),
        }
    }

    pub fn source_id(&self) -> ObjectId {
        self.source_id
    }

    pub fn source(&self) -> &Rc<RefCell<ChunkSource>> {
        &self.source
    }

    /// Rank of the underlying chunk source (may be below the layer rank).
    pub fn source_rank(&self) -> usize {
        self.source.borrow().spec().rank
    }

    /// Scratch: grid position of the chunk currently being enumerated.
    pub fn position_in_chunks(&self) -> [i64; 3] {
        self.cur_position_in_chunks.get()
    }

    pub fn set_position_in_chunks(&self, position: [i64; 3]) {
        self.cur_position_in_chunks.set(position);
    }

    /// Scratch: fixed within-chunk offset along non-displayed axes,
    /// computed once per enumeration.
    pub fn fixed_position_within_chunk(&self) -> Vec3 {
        *self.fixed_position_within_chunk.borrow()
    }

    pub fn set_fixed_position_within_chunk(&self, position: Vec3) {
        *self.fixed_position_within_chunk.borrow_mut() = position;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Releases the chunk-source reference held through the registry.
    ///
    /// Must run exactly once; the registry tears the source down when its
    /// count reaches zero.
    pub(crate) fn dispose(&self, registry: &mut SourceRegistry) -> Result<bool, RegistryError> {
        debug_assert!(!self.disposed.get(), "transformed source disposed twice");
        self.disposed.set(true);
        registry.release(self.source_id)
    }
}
