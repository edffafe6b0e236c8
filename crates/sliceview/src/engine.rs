use std::collections::BTreeMap;

use foundation::ids::LayerId;
use foundation::vec::Vec3;
use tracing::trace;

use crate::fetch::ChunkScheduler;
use crate::layer::VisibleLayerRecord;
use crate::oracle::GeometryOracle;
use crate::priority::{tier_and_base_priority, BASE_PRIORITY, SCALE_PRIORITY_MULTIPLIER};
use crate::view::ViewState;

/// Recomputes a record's `visible_sources` if it is stale.
///
/// A record is stale when its source set changed, its render-scale target
/// changed, or its selection was computed under a different
/// display-dimension generation than the view's.
///
/// Returns `true` if a recomputation happened.
pub fn update_visible_sources(
    view: &ViewState,
    record: &mut VisibleLayerRecord,
    oracle: &dyn GeometryOracle,
) -> bool {
    let stale = record.stale.get() || record.display_generation != Some(view.display_generation);
    if !stale {
        return false;
    }
    let slots = oracle.visible_sources(view, record);
    record.visible_sources = slots;
    record.display_generation = Some(view.display_generation);
    record.stale.set(false);
    true
}

/// One full visibility/priority pass over every layer.
///
/// Runs to completion synchronously so every submitted priority reflects
/// the same atomic snapshot of the view and the visible-layer set. Performs
/// no deduplication of its own; the oracle's enumeration contract is
/// responsible for not yielding a grid position twice.
pub fn update_visible_chunks(
    view: &ViewState,
    layers: &mut BTreeMap<LayerId, VisibleLayerRecord>,
    oracle: &dyn GeometryOracle,
    scheduler: &mut dyn ChunkScheduler,
) {
    // An invisible view never touches a source and never submits.
    if view.visibility.is_ignored() {
        return;
    }
    let (tier, base_priority) = tier_and_base_priority(view.visibility);

    let mut submitted = 0usize;
    for record in layers.values_mut() {
        update_visible_sources(view, record, oracle);
        let record = &*record;
        let local_position = record.local_position.borrow().get();

        for (i, slot) in record.visible_sources().iter().enumerate() {
            let source = record.source_at(*slot);
            let rank = source.source_rank();

            let mut local_center = source.geometry.transform.layer_to_local(view.center);
            let mut chunk_size = source.geometry.layout_size;
            // Axes beyond the source's rank never contribute distance.
            for axis in rank..3 {
                local_center.set_axis(axis, 0.0);
                chunk_size.set_axis(axis, 0.0);
            }

            let priority_offset =
                BASE_PRIORITY + base_priority + SCALE_PRIORITY_MULTIPLIER * i as f64;

            oracle.for_each_intersecting_chunk(view, local_position, source, &mut |_| {
                let position = source.position_in_chunks();
                let chunk_center = Vec3::new(
                    position[0] as f64 * chunk_size.x,
                    position[1] as f64 * chunk_size.y,
                    position[2] as f64 * chunk_size.z,
                );
                let score = priority_offset - local_center.distance(chunk_center);

                let chunk = source.source().borrow_mut().chunk(&position);
                scheduler.request_chunk(&chunk, tier, score);
                submitted += 1;
            });
        }
    }
    trace!(layers = layers.len(), requests = submitted, "visibility pass");
}
