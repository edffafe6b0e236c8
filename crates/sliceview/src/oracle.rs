use foundation::vec::Vec3;
use geometry::intersect::for_each_chunk_on_plane;

use crate::layer::{SourceSlot, VisibleLayerRecord};
use crate::transformed::TransformedSource;
use crate::view::ViewState;

/// External geometry collaborator: source visibility and plane/chunk
/// intersection.
///
/// Contracts the engine relies on:
/// - `visible_sources` preserves the relative order of `all_sources`
///   restricted to the kept entries.
/// - `for_each_intersecting_chunk` invokes the visitor exactly once per
///   intersecting grid position (never a duplicate), writing the source's
///   scratch position-in-chunks buffer before each call.
pub trait GeometryOracle {
    fn visible_sources(&self, view: &ViewState, record: &VisibleLayerRecord) -> Vec<SourceSlot>;

    fn for_each_intersecting_chunk(
        &self,
        view: &ViewState,
        local_position: Vec3,
        source: &TransformedSource,
        visit: &mut dyn FnMut([i64; 3]),
    );
}

/// Default oracle: render-scale source selection plus clip-bounded
/// plane enumeration in each source's local chunk-layout space.
#[derive(Debug, Default)]
pub struct SlicePlaneOracle;

impl SlicePlaneOracle {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryOracle for SlicePlaneOracle {
    /// Keeps sources whose effective voxel size (max component) is at least
    /// the layer's render-scale target, so coarser-or-equal scales stay for
    /// progressive loading. If nothing qualifies, the coarsest non-empty
    /// group is kept alone rather than rendering nothing.
    fn visible_sources(&self, _view: &ViewState, record: &VisibleLayerRecord) -> Vec<SourceSlot> {
        let target = record.render_scale_target.borrow().get();
        let mut kept = Vec::new();
        for (scale, group) in record.all_sources().iter().enumerate() {
            for (index, source) in group.iter().enumerate() {
                if source.geometry.effective_voxel_size.max_component() >= target {
                    kept.push(SourceSlot { scale, index });
                }
            }
        }
        if kept.is_empty() {
            if let Some((scale, group)) = record
                .all_sources()
                .iter()
                .enumerate()
                .find(|(_, g)| !g.is_empty())
            {
                kept.extend((0..group.len()).map(|index| SourceSlot { scale, index }));
            }
        }
        kept
    }

    fn for_each_intersecting_chunk(
        &self,
        view: &ViewState,
        local_position: Vec3,
        source: &TransformedSource,
        visit: &mut dyn FnMut([i64; 3]),
    ) {
        let rank = source.source_rank();
        let geometry = &source.geometry;
        let local_center = geometry.transform.layer_to_local(view.center + local_position);

        // The within-chunk remainder of the center is fixed for the whole
        // enumeration; consumers read it for non-displayed axes.
        let mut fixed = Vec3::ZERO;
        for axis in 0..3 {
            let size = geometry.layout_size.axis(axis);
            if size > 0.0 {
                let c = local_center.axis(axis);
                fixed.set_axis(axis, c - (c / size).floor() * size);
            }
        }
        source.set_fixed_position_within_chunk(fixed);

        let local_plane = geometry.transform.plane_to_local(&view.plane);
        // Volumetric sources are filtered by the slice plane; planar sources
        // lie in it by construction.
        let plane = if rank == 3 { Some(&local_plane) } else { None };

        for_each_chunk_on_plane(
            &geometry.clip_bounds,
            geometry.layout_size,
            rank,
            plane,
            &mut |pos| {
                source.set_position_in_chunks(pos);
                visit(pos);
            },
        );
    }
}
