//! Heuristic placement search inside an occupancy space.
//!
//! Corners are tried first, then a stepped scan (z, then y, then x) whose
//! granularity grows with the footprint of the space. A stepped hit may be
//! tightened by looking back within one step and settling downwards.
//! Every returned candidate has passed `OccupancySpace::can_place`; finding
//! a fit whenever one exists is not guaranteed.

use crate::model::{Extent, Position, Rotation};
use crate::optimizer::PackingConfig;
use crate::space::OccupancySpace;

/// Chosen spot for one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub position: Position,
    pub rotation: Rotation,
}

/// Finds a usable (position, rotation) for `item` or `None` if the
/// remaining free space cannot take it.
pub fn find_position(
    item: Extent,
    space: &OccupancySpace,
    config: &PackingConfig,
) -> Option<Candidate> {
    let rotations = config.rotations();

    if let Some(hit) = try_corners(item, space, rotations) {
        return Some(hit);
    }

    let step = scan_step(space.size(), config.scan_divisor);
    let hit = stepped_scan(item, space, rotations, step)?;
    if config.refine_positions {
        Some(refine(item, space, hit, step))
    } else {
        Some(hit)
    }
}

/// Scan granularity: `max(1, floor(min(length, width) / divisor))`.
pub fn scan_step(size: Extent, divisor: u32) -> u32 {
    (size.length.min(size.width) / divisor.max(1)).max(1)
}

/// Floor corners: origin, far edge along the width, far edge along the length.
fn corner(index: usize, extent: Extent, size: Extent) -> Option<Position> {
    let far_x = size.length.checked_sub(extent.length)?;
    let far_y = size.width.checked_sub(extent.width)?;
    size.height.checked_sub(extent.height)?;
    match index {
        0 => Some(Position::ORIGIN),
        1 => Some(Position::new(0, far_y, 0)),
        2 => Some(Position::new(far_x, 0, 0)),
        _ => None,
    }
}

fn try_corners(item: Extent, space: &OccupancySpace, rotations: &[Rotation]) -> Option<Candidate> {
    for index in 0..3 {
        for &rotation in rotations {
            let Some(position) = corner(index, rotation.apply(item), space.size()) else {
                continue;
            };
            if space.can_place(item, position, rotation) {
                return Some(Candidate { position, rotation });
            }
        }
    }
    None
}

/// Grid positions along one axis.
///
/// Covers `0, step, 2·step, …` up to the largest feasible offset and adds
/// each rotation's flush end position so items can close gaps at the wall.
fn axis_positions(space_len: u32, item_lens: impl IntoIterator<Item = u32>, step: u32) -> Vec<u32> {
    let ends: Vec<u32> = item_lens
        .into_iter()
        .filter_map(|len| space_len.checked_sub(len))
        .collect();
    let Some(&max_end) = ends.iter().max() else {
        return Vec::new();
    };

    let mut positions: Vec<u32> = (0..=max_end).step_by(step.max(1) as usize).collect();
    positions.extend(ends);
    positions.sort_unstable();
    positions.dedup();
    positions
}

fn stepped_scan(
    item: Extent,
    space: &OccupancySpace,
    rotations: &[Rotation],
    step: u32,
) -> Option<Candidate> {
    let size = space.size();
    let extents: Vec<Extent> = rotations.iter().map(|r| r.apply(item)).collect();

    let zs = axis_positions(size.height, extents.iter().map(|e| e.height), step);
    let ys = axis_positions(size.width, extents.iter().map(|e| e.width), step);
    let xs = axis_positions(size.length, extents.iter().map(|e| e.length), step);

    for &z in &zs {
        for &y in &ys {
            for &x in &xs {
                let position = Position::new(x, y, z);
                for &rotation in rotations {
                    if space.can_place(item, position, rotation) {
                        return Some(Candidate { position, rotation });
                    }
                }
            }
        }
    }
    None
}

/// Looks back within one step in x and y for a tighter spot, then lets the
/// item settle downwards. Keeps the stepped hit when nothing tighter fits.
fn refine(item: Extent, space: &OccupancySpace, hit: Candidate, step: u32) -> Candidate {
    let Candidate { position, rotation } = hit;
    let mut best = position;

    if step > 1 {
        let back = step - 1;
        'search: for y in position.y.saturating_sub(back)..=position.y {
            for x in position.x.saturating_sub(back)..=position.x {
                if x == position.x && y == position.y {
                    continue;
                }
                let tighter = Position::new(x, y, position.z);
                if space.can_place(item, tighter, rotation) {
                    best = tighter;
                    break 'search;
                }
            }
        }
    }

    while best.z > 0 && space.can_place(item, Position::new(best.x, best.y, best.z - 1), rotation)
    {
        best.z -= 1;
    }

    Candidate {
        position: best,
        rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PackingConfig {
        PackingConfig::default()
    }

    #[test]
    fn empty_space_uses_origin() {
        let space = OccupancySpace::new(Extent::new(120, 100, 150)).unwrap();
        let hit = find_position(Extent::new(50, 40, 30), &space, &config()).unwrap();
        assert_eq!(hit.position, Position::ORIGIN);
        assert_eq!(hit.rotation, Rotation::Lwh);
    }

    #[test]
    fn second_item_goes_to_far_width_corner() {
        let mut space = OccupancySpace::new(Extent::new(120, 100, 150)).unwrap();
        let item = Extent::new(50, 40, 30);
        space.place(item, Position::ORIGIN, Rotation::Lwh);

        let hit = find_position(item, &space, &config()).unwrap();
        assert_eq!(hit.position, Position::new(0, 60, 0));
        assert!(space.can_place(item, hit.position, hit.rotation));
    }

    #[test]
    fn item_larger_than_space_has_no_position() {
        let space = OccupancySpace::new(Extent::new(10, 10, 10)).unwrap();
        assert!(find_position(Extent::new(11, 5, 5), &space, &config()).is_none());
    }

    #[test]
    fn upright_turn_is_used_when_needed() {
        let space = OccupancySpace::new(Extent::new(10, 4, 10)).unwrap();
        let hit = find_position(Extent::new(4, 10, 2), &space, &config()).unwrap();
        assert_eq!(hit.rotation, Rotation::Wlh);
    }

    #[test]
    fn tipping_only_when_enabled() {
        let space = OccupancySpace::new(Extent::new(10, 10, 3)).unwrap();
        let tall = Extent::new(2, 2, 10);
        assert!(find_position(tall, &space, &config()).is_none());

        let tipping = PackingConfig::builder().allow_tipping(true).build();
        let hit = find_position(tall, &space, &tipping).unwrap();
        assert!(!hit.rotation.is_upright());
        assert!(space.can_place(tall, hit.position, hit.rotation));
    }

    fn walled_space() -> OccupancySpace {
        // Slabs at both ends of the length axis block all three corners.
        let mut space = OccupancySpace::new(Extent::new(100, 100, 1)).unwrap();
        space.place(Extent::new(13, 100, 1), Position::ORIGIN, Rotation::Lwh);
        space.place(Extent::new(10, 100, 1), Position::new(90, 0, 0), Rotation::Lwh);
        space
    }

    #[test]
    fn stepped_hit_is_tightened_backwards() {
        let space = walled_space();
        let item = Extent::new(10, 10, 1);
        let hit = find_position(item, &space, &config()).unwrap();
        assert_eq!(hit.position, Position::new(13, 0, 0));
    }

    #[test]
    fn stepped_hit_kept_without_refinement() {
        let space = walled_space();
        let item = Extent::new(10, 10, 1);
        let plain = PackingConfig::builder().refine_positions(false).build();
        let hit = find_position(item, &space, &plain).unwrap();
        assert_eq!(hit.position, Position::new(15, 0, 0));
    }

    #[test]
    fn stepped_hit_settles_onto_the_floor_slab() {
        // A 1 cm slab covers the floor, so nothing fits at z = 0.
        let mut space = OccupancySpace::new(Extent::new(100, 100, 20)).unwrap();
        space.place(Extent::new(100, 100, 1), Position::ORIGIN, Rotation::Lwh);
        let item = Extent::new(10, 10, 4);

        let settled = find_position(item, &space, &config()).unwrap();
        assert_eq!(settled.position, Position::new(0, 0, 1));

        let plain = PackingConfig::builder().refine_positions(false).build();
        let stepped = find_position(item, &space, &plain).unwrap();
        assert_eq!(stepped.position, Position::new(0, 0, 5));
    }

    #[test]
    fn axis_positions_include_flush_ends() {
        assert_eq!(axis_positions(10, [4], 3), vec![0, 3, 6]);
        assert_eq!(axis_positions(10, [3], 3), vec![0, 3, 6, 7]);
        assert_eq!(axis_positions(10, [4, 6], 5), vec![0, 4, 5, 6]);
        assert!(axis_positions(3, [4], 1).is_empty());
    }

    #[test]
    fn scan_step_scales_with_footprint() {
        assert_eq!(scan_step(Extent::new(120, 100, 150), 20), 5);
        assert_eq!(scan_step(Extent::new(10, 10, 10), 20), 1);
        assert_eq!(scan_step(Extent::new(400, 400, 10), 0), 400);
    }

    #[test]
    fn filling_a_space_never_overlaps() {
        let mut space = OccupancySpace::new(Extent::new(30, 20, 20)).unwrap();
        let item = Extent::new(7, 5, 4);
        let mut placed = 0u64;
        while let Some(hit) = find_position(item, &space, &config()) {
            assert!(space.can_place(item, hit.position, hit.rotation));
            let before = space.occupied_cells();
            space.place(item, hit.position, hit.rotation);
            assert_eq!(space.occupied_cells() - before, item.cells());
            placed += 1;
            assert!(placed < 1000);
        }
        assert!(placed > 0);
        assert_eq!(space.occupied_cells(), placed * item.cells());
    }
}
