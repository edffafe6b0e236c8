use foundation::bounds::Box3;
use foundation::vec::Vec3;

use crate::plane::Plane;

/// Tests whether an axis-aligned box crosses `plane`.
///
/// Uses the p-/n-vertex pair: the corner most along the plane normal and its
/// opposite. The box straddles the plane iff their signed distances bracket
/// zero. Degenerate (zero-extent) axes are handled naturally since both
/// corners coincide there.
pub fn box_straddles_plane(lower: Vec3, upper: Vec3, plane: &Plane) -> bool {
    let mut p = Vec3::ZERO;
    let mut n = Vec3::ZERO;
    for axis in 0..3 {
        if plane.n.axis(axis) >= 0.0 {
            p.set_axis(axis, upper.axis(axis));
            n.set_axis(axis, lower.axis(axis));
        } else {
            p.set_axis(axis, lower.axis(axis));
            n.set_axis(axis, upper.axis(axis));
        }
    }
    plane.distance(n) <= 0.0 && plane.distance(p) >= 0.0
}

/// Grid-position range of chunks overlapping `bounds`.
///
/// Chunk `p` covers `[p * size, (p + 1) * size)` per axis. Axes at or above
/// `rank`, and axes with zero chunk size, contribute the single index 0.
/// Returns `None` when the bounds are empty on an enumerated axis.
pub fn grid_range(bounds: &Box3, chunk_size: Vec3, rank: usize) -> Option<([i64; 3], [i64; 3])> {
    let mut lo = [0i64; 3];
    let mut hi = [0i64; 3];
    for axis in 0..rank.min(3) {
        let size = chunk_size.axis(axis);
        if size <= 0.0 {
            continue;
        }
        let lower = bounds.lower.axis(axis);
        let upper = bounds.upper.axis(axis);
        debug_assert!(
            lower.is_finite() && upper.is_finite(),
            "enumeration requires finite bounds on displayed axes"
        );
        if upper <= lower {
            return None;
        }
        lo[axis] = (lower / size).floor() as i64;
        hi[axis] = (upper / size).ceil() as i64 - 1;
    }
    Some((lo, hi))
}

/// Visits every in-range grid position whose chunk box crosses `plane`.
///
/// With no plane, every in-range position is visited (the planar case of a
/// rank-2 source). Positions are visited in lexicographic order and never
/// twice.
pub fn for_each_chunk_on_plane(
    bounds: &Box3,
    chunk_size: Vec3,
    rank: usize,
    plane: Option<&Plane>,
    visit: &mut dyn FnMut([i64; 3]),
) {
    let Some((lo, hi)) = grid_range(bounds, chunk_size, rank) else {
        return;
    };
    for x in lo[0]..=hi[0] {
        for y in lo[1]..=hi[1] {
            for z in lo[2]..=hi[2] {
                let pos = [x, y, z];
                if let Some(plane) = plane {
                    let mut lower = Vec3::ZERO;
                    let mut upper = Vec3::ZERO;
                    for axis in 0..3 {
                        let size = chunk_size.axis(axis);
                        lower.set_axis(axis, pos[axis] as f64 * size);
                        upper.set_axis(axis, (pos[axis] + 1) as f64 * size);
                    }
                    if !box_straddles_plane(lower, upper, plane) {
                        continue;
                    }
                }
                visit(pos);
            }
        }
    }
}
