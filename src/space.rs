//! Discretized 3D occupancy tracking for one pallet load space.
//!
//! Cells are stored as one bitset row per (y, z) pair, so a collision test
//! touches `width × height` rows and compares whole 64-cell words along x.

use crate::model::{Extent, Position, Rotation};

const WORD_BITS: u32 = 64;

/// Upper bound on the bitset of one load space (128 MiB).
pub const MAX_WORDS: usize = 1 << 24;

/// Bitset words needed for `size`, or `None` past [`MAX_WORDS`].
fn word_count(size: Extent) -> Option<usize> {
    let words_per_row = usize::try_from(size.length.div_ceil(WORD_BITS)).ok()?;
    usize::try_from(size.width)
        .ok()?
        .checked_mul(usize::try_from(size.height).ok()?)?
        .checked_mul(words_per_row)
        .filter(|&words| words <= MAX_WORDS)
}

/// Mask with bits `lo..hi` set (`lo < hi <= 64`).
#[inline]
fn word_mask(lo: u32, hi: u32) -> u64 {
    let span = hi - lo;
    if span >= WORD_BITS {
        u64::MAX
    } else {
        ((1u64 << span) - 1) << lo
    }
}

/// Boolean cell volume; the only mutable structure of a pallet load.
#[derive(Clone, Debug)]
pub struct OccupancySpace {
    size: Extent,
    words_per_row: usize,
    bits: Vec<u64>,
    occupied: u64,
}

impl OccupancySpace {
    /// Creates an empty space of `size` cells.
    ///
    /// Returns `None` when the bitset would exceed [`MAX_WORDS`].
    pub fn new(size: Extent) -> Option<Self> {
        let words = word_count(size)?;
        Some(Self {
            size,
            words_per_row: size.length.div_ceil(WORD_BITS) as usize,
            bits: vec![0; words],
            occupied: 0,
        })
    }

    /// Whether a space of `size` can be allocated at all.
    pub fn fits_budget(size: Extent) -> bool {
        word_count(size).is_some()
    }

    pub fn size(&self) -> Extent {
        self.size
    }

    pub fn occupied_cells(&self) -> u64 {
        self.occupied
    }

    pub fn total_cells(&self) -> u64 {
        self.size.cells()
    }

    /// Occupied share of the space in percent.
    pub fn utilization_percent(&self) -> f64 {
        let total = self.total_cells();
        if total == 0 {
            return 0.0;
        }
        self.occupied as f64 / total as f64 * 100.0
    }

    /// Checks that an effective extent at `position` stays inside the space.
    #[inline]
    pub fn within_bounds(&self, extent: Extent, position: Position) -> bool {
        u64::from(position.x) + u64::from(extent.length) <= u64::from(self.size.length)
            && u64::from(position.y) + u64::from(extent.width) <= u64::from(self.size.width)
            && u64::from(position.z) + u64::from(extent.height) <= u64::from(self.size.height)
    }

    /// Decides whether `item` rotated by `rotation` fits at `position`.
    ///
    /// Bounds are checked before any cell is read.
    pub fn can_place(&self, item: Extent, position: Position, rotation: Rotation) -> bool {
        let extent = rotation.apply(item);
        if !self.within_bounds(extent, position) {
            return false;
        }
        for z in position.z..position.z + extent.height {
            for y in position.y..position.y + extent.width {
                if !self.row_range_free(y, z, position.x, extent.length) {
                    return false;
                }
            }
        }
        true
    }

    /// Marks the rotated footprint as occupied.
    ///
    /// Performs no validation; callers decide with [`Self::can_place`] first.
    pub fn place(&mut self, item: Extent, position: Position, rotation: Rotation) {
        let extent = rotation.apply(item);
        let z_end = (position.z + extent.height).min(self.size.height);
        let y_end = (position.y + extent.width).min(self.size.width);
        let x_end = (position.x + extent.length).min(self.size.length);
        if position.x >= x_end {
            return;
        }
        for z in position.z..z_end {
            for y in position.y..y_end {
                self.fill_row_range(y, z, position.x, x_end - position.x);
            }
        }
    }

    /// Reads a single cell; out-of-range cells count as occupied.
    pub fn is_occupied(&self, x: u32, y: u32, z: u32) -> bool {
        if x >= self.size.length || y >= self.size.width || z >= self.size.height {
            return true;
        }
        let word = self.bits[self.row_start(y, z) + (x / WORD_BITS) as usize];
        word & (1u64 << (x % WORD_BITS)) != 0
    }

    #[inline]
    fn row_start(&self, y: u32, z: u32) -> usize {
        (z as usize * self.size.width as usize + y as usize) * self.words_per_row
    }

    fn row_range_free(&self, y: u32, z: u32, x: u32, len: u32) -> bool {
        let row = self.row_start(y, z);
        let end = x + len;
        let mut cursor = x;
        while cursor < end {
            let word_index = cursor / WORD_BITS;
            let lo = cursor % WORD_BITS;
            let hi = (end - word_index * WORD_BITS).min(WORD_BITS);
            if self.bits[row + word_index as usize] & word_mask(lo, hi) != 0 {
                return false;
            }
            cursor = (word_index + 1) * WORD_BITS;
        }
        true
    }

    fn fill_row_range(&mut self, y: u32, z: u32, x: u32, len: u32) {
        let row = self.row_start(y, z);
        let end = x + len;
        let mut cursor = x;
        while cursor < end {
            let word_index = cursor / WORD_BITS;
            let lo = cursor % WORD_BITS;
            let hi = (end - word_index * WORD_BITS).min(WORD_BITS);
            let mask = word_mask(lo, hi);
            let word = &mut self.bits[row + word_index as usize];
            self.occupied += u64::from((mask & !*word).count_ones());
            *word |= mask;
            cursor = (word_index + 1) * WORD_BITS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_space_accepts_item_in_bounds() {
        let space = OccupancySpace::new(Extent::new(10, 10, 10)).unwrap();
        assert!(space.can_place(Extent::new(10, 10, 10), Position::ORIGIN, Rotation::Lwh));
        assert!(!space.can_place(Extent::new(11, 1, 1), Position::ORIGIN, Rotation::Lwh));
        assert!(!space.can_place(Extent::new(5, 5, 5), Position::new(6, 0, 0), Rotation::Lwh));
    }

    #[test]
    fn rotation_changes_bounds_check() {
        let space = OccupancySpace::new(Extent::new(10, 4, 10)).unwrap();
        let item = Extent::new(4, 10, 2);
        assert!(!space.can_place(item, Position::ORIGIN, Rotation::Lwh));
        assert!(space.can_place(item, Position::ORIGIN, Rotation::Wlh));
    }

    #[test]
    fn placed_cells_block_later_items() {
        let mut space = OccupancySpace::new(Extent::new(20, 10, 10)).unwrap();
        let item = Extent::new(10, 10, 5);
        space.place(item, Position::ORIGIN, Rotation::Lwh);

        assert_eq!(space.occupied_cells(), 500);
        assert!(!space.can_place(item, Position::ORIGIN, Rotation::Lwh));
        assert!(!space.can_place(item, Position::new(9, 0, 0), Rotation::Lwh));
        assert!(space.can_place(item, Position::new(10, 0, 0), Rotation::Lwh));
        assert!(space.can_place(item, Position::new(0, 0, 5), Rotation::Lwh));
        assert!((space.utilization_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn rows_spanning_several_words() {
        let mut space = OccupancySpace::new(Extent::new(200, 2, 2)).unwrap();
        space.place(Extent::new(70, 1, 1), Position::new(60, 0, 0), Rotation::Lwh);

        assert!(space.is_occupied(60, 0, 0));
        assert!(space.is_occupied(129, 0, 0));
        assert!(!space.is_occupied(59, 0, 0));
        assert!(!space.is_occupied(130, 0, 0));
        assert!(!space.is_occupied(60, 1, 0));
        assert_eq!(space.occupied_cells(), 70);

        assert!(!space.can_place(Extent::new(1, 1, 1), Position::new(128, 0, 0), Rotation::Lwh));
        assert!(space.can_place(Extent::new(70, 1, 1), Position::new(130, 0, 0), Rotation::Lwh));
        assert!(space.can_place(Extent::new(60, 1, 1), Position::ORIGIN, Rotation::Lwh));
    }

    #[test]
    fn full_word_ranges() {
        let mut space = OccupancySpace::new(Extent::new(128, 1, 1)).unwrap();
        space.place(Extent::new(64, 1, 1), Position::new(64, 0, 0), Rotation::Lwh);
        assert!(space.can_place(Extent::new(64, 1, 1), Position::ORIGIN, Rotation::Lwh));
        assert!(!space.can_place(Extent::new(65, 1, 1), Position::ORIGIN, Rotation::Lwh));
        assert_eq!(space.occupied_cells(), 64);
    }

    #[test]
    fn out_of_range_cells_read_as_occupied() {
        let space = OccupancySpace::new(Extent::new(2, 2, 2)).unwrap();
        assert!(space.is_occupied(2, 0, 0));
        assert!(!space.is_occupied(1, 1, 1));
    }

    #[test]
    fn oversized_spaces_are_refused() {
        assert!(OccupancySpace::new(Extent::new(10_000, 10_000, 10_000)).is_none());
        assert!(OccupancySpace::new(Extent::new(u32::MAX, u32::MAX, u32::MAX)).is_none());
        // One word per row still adds up.
        assert!(!OccupancySpace::fits_budget(Extent::new(1, 100_000, 1_000)));
        assert!(OccupancySpace::fits_budget(Extent::new(120, 100, 225)));
        assert!(OccupancySpace::new(Extent::new(0, 0, 0)).is_some());
    }
}
