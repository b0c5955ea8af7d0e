use super::common::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AreaIdx {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Maps CTU-relative block geometry to the small integer buckets used to
/// address the history caches.
#[derive(Clone, Debug)]
pub struct SizeIndexInfo {
    pub ctu_size: usize,
    pub ctu_mask: usize,
    pub num_pos: usize,
    pub num_sizes: usize,
}

impl SizeIndexInfo {
    pub fn new(ctu_size: usize) -> SizeIndexInfo {
        assert!(
            ctu_size.is_power_of_two() && (MIN_CU_SIZE..=MAX_CU_SIZE).contains(&ctu_size),
            "invalid CTU size {}",
            ctu_size
        );
        SizeIndexInfo {
            ctu_size,
            ctu_mask: ctu_size - 1,
            num_pos: ctu_size >> MIN_CU_LOG2,
            num_sizes: ctu_size.ilog2() as usize + 1,
        }
    }

    pub fn is_cu_size(&self, size: usize) -> bool {
        size.is_power_of_two() && (1..=self.ctu_size).contains(&size)
    }

    pub fn idx_from(&self, size: usize) -> usize {
        assert!(self.is_cu_size(size), "{} is not a CU size", size);
        size.ilog2() as usize
    }

    pub fn size_from(&self, idx: usize) -> usize {
        assert!(idx < self.num_sizes);
        1 << idx
    }

    pub fn num_entries(&self) -> usize {
        self.num_pos * self.num_pos * self.num_sizes * self.num_sizes
    }

    pub fn get_area_idx(&self, area: &Area) -> AreaIdx {
        assert!(
            area.x % MIN_CU_SIZE == 0 && area.y % MIN_CU_SIZE == 0,
            "area at ({}, {}) is not aligned to the minimum block granularity",
            area.x,
            area.y
        );
        let idx = AreaIdx {
            x: (area.x & self.ctu_mask) >> MIN_CU_LOG2,
            y: (area.y & self.ctu_mask) >> MIN_CU_LOG2,
            w: self.idx_from(area.width),
            h: self.idx_from(area.height),
        };
        assert!(
            (idx.x << MIN_CU_LOG2) + area.width <= self.ctu_size
                && (idx.y << MIN_CU_LOG2) + area.height <= self.ctu_size,
            "area {:?} exceeds the CTU extent",
            area
        );
        idx
    }

    /// Flat offset into a table laid out as [x][y][w][h].
    pub fn flat_idx(&self, idx: &AreaIdx) -> usize {
        ((idx.x * self.num_pos + idx.y) * self.num_sizes + idx.w) * self.num_sizes + idx.h
    }

    /// Flat offset into a table laid out as [w][h].
    pub fn size_idx(&self, idx: &AreaIdx) -> usize {
        idx.w * self.num_sizes + idx.h
    }

    /// Position stamp used to tag size-keyed entries with the block they
    /// belong to.
    pub fn part_idx(&self, idx: &AreaIdx) -> u32 {
        ((idx.x as u32) << 8) | idx.y as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identical_geometry_gives_identical_indices() {
        let info = SizeIndexInfo::new(128);
        let a = info.get_area_idx(&Area::new(32, 64, 16, 8));
        let b = info.get_area_idx(&Area::new(32, 64, 16, 8));
        assert_eq!(a, b);
        assert_eq!(a, AreaIdx { x: 8, y: 16, w: 4, h: 3 });
    }

    #[test]
    fn positions_are_ctu_relative() {
        let info = SizeIndexInfo::new(64);
        let a = info.get_area_idx(&Area::new(8, 16, 8, 8));
        let b = info.get_area_idx(&Area::new(64 + 8, 128 + 16, 8, 8));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_geometry_gives_distinct_flat_indices() {
        let info = SizeIndexInfo::new(32);
        let mut seen = HashSet::new();
        for log2_w in MIN_CU_LOG2..=5 {
            for log2_h in MIN_CU_LOG2..=5 {
                let (w, h) = (1 << log2_w, 1 << log2_h);
                for y in (0..32).step_by(h) {
                    for x in (0..32).step_by(w) {
                        let idx = info.get_area_idx(&Area::new(x, y, w, h));
                        assert!(info.flat_idx(&idx) < info.num_entries());
                        assert!(seen.insert(info.flat_idx(&idx)));
                    }
                }
            }
        }
    }

    #[test]
    #[should_panic]
    fn misaligned_area_panics() {
        let info = SizeIndexInfo::new(64);
        info.get_area_idx(&Area::new(2, 0, 8, 8));
    }

    #[test]
    #[should_panic]
    fn oversized_area_panics() {
        let info = SizeIndexInfo::new(64);
        info.get_area_idx(&Area::new(0, 0, 128, 128));
    }

    #[test]
    #[should_panic]
    fn area_beyond_ctu_panics() {
        let info = SizeIndexInfo::new(64);
        info.get_area_idx(&Area::new(48, 0, 32, 32));
    }
}
