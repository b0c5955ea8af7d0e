use super::common::*;
use super::size_index::*;
use std::sync::Arc;

/// What previous searches learned about one block geometry in the current
/// CTU.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodedCuInfo {
    pub is_inter: bool,
    pub is_intra: bool,
    pub is_skip: bool,
    pub valid_mv: [[bool; MAX_STORED_CU_INFO_REFS]; NUM_REF_PIC_LIST_01],
    pub save_mv: [[Mv; MAX_STORED_CU_INFO_REFS]; NUM_REF_PIC_LIST_01],
    pub generation: u64,
}

#[derive(Clone, Debug)]
pub struct BlkInfoCache {
    size_idx: Arc<SizeIndexInfo>,
    entries: Vec<CodedCuInfo>,
    curr_generation: u64,
}

impl BlkInfoCache {
    pub fn new(size_idx: Arc<SizeIndexInfo>) -> BlkInfoCache {
        let num_entries = size_idx.num_entries();
        BlkInfoCache {
            size_idx,
            entries: vec![CodedCuInfo::default(); num_entries],
            curr_generation: 1,
        }
    }

    pub fn init(&mut self) {
        self.entries.fill(CodedCuInfo::default());
        self.curr_generation = 1;
    }

    pub fn generation(&self) -> u64 {
        self.curr_generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        assert!(generation > 0);
        self.curr_generation = generation;
    }

    fn entry_idx(&self, area: &Area) -> usize {
        let idx = self.size_idx.get_area_idx(area);
        self.size_idx.flat_idx(&idx)
    }

    pub fn get_blk_info(&self, area: &Area) -> &CodedCuInfo {
        &self.entries[self.entry_idx(area)]
    }

    pub fn get_blk_info_mut(&mut self, area: &Area) -> &mut CodedCuInfo {
        let idx = self.entry_idx(area);
        &mut self.entries[idx]
    }

    pub fn touch(&mut self, area: &Area) {
        let generation = self.curr_generation;
        self.get_blk_info_mut(area).generation = generation;
    }

    pub fn is_skip(&self, area: &Area) -> bool {
        self.get_blk_info(area).is_skip
    }

    pub fn set_mv(&mut self, area: &Area, ref_list: usize, ref_idx: usize, mv: Mv) {
        if ref_idx >= MAX_STORED_CU_INFO_REFS {
            return;
        }
        let generation = self.curr_generation;
        let info = self.get_blk_info_mut(area);
        info.save_mv[ref_list][ref_idx] = mv;
        info.valid_mv[ref_list][ref_idx] = true;
        info.generation = generation;
    }

    pub fn get_mv(&self, area: &Area, ref_list: usize, ref_idx: usize) -> (Mv, bool) {
        let info = self.get_blk_info(area);
        if ref_idx >= MAX_STORED_CU_INFO_REFS {
            return (info.save_mv[ref_list][0], false);
        }
        (
            info.save_mv[ref_list][ref_idx],
            info.valid_mv[ref_list][ref_idx],
        )
    }

    /// Takes over every entry inside `area` that `other` wrote more recently.
    pub fn merge_from(&mut self, other: &BlkInfoCache, area: &Area) {
        assert_eq!(self.entries.len(), other.entries.len());
        for_each_block_in(&self.size_idx, area, |idx| {
            if other.entries[idx].generation > self.entries[idx].generation {
                self.entries[idx] = other.entries[idx];
            }
        });
        self.curr_generation = self.curr_generation.max(other.curr_generation);
    }
}

/// Visits the flat index of every legal block geometry lying entirely inside
/// `area`.
pub fn for_each_block_in<F: FnMut(usize)>(size_idx: &SizeIndexInfo, area: &Area, mut f: F) {
    for log2_w in MIN_CU_LOG2..size_idx.num_sizes {
        let w = 1 << log2_w;
        if w > area.width {
            break;
        }
        for log2_h in MIN_CU_LOG2..size_idx.num_sizes {
            let h = 1 << log2_h;
            if h > area.height {
                break;
            }
            for y in (area.y..=area.y + area.height - h).step_by(MIN_CU_SIZE) {
                for x in (area.x..=area.x + area.width - w).step_by(MIN_CU_SIZE) {
                    let idx = size_idx.get_area_idx(&Area::new(x, y, w, h));
                    f(size_idx.flat_idx(&idx));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{prelude::StdRng, Rng, SeedableRng};

    fn cache() -> BlkInfoCache {
        BlkInfoCache::new(Arc::new(SizeIndexInfo::new(64)))
    }

    #[test]
    fn init_resets_entries() {
        let mut c = cache();
        let a = Area::new(16, 16, 16, 16);
        c.get_blk_info_mut(&a).is_skip = true;
        c.set_mv(&a, 0, 1, Mv::new(3, -4));
        c.init();
        assert!(!c.is_skip(&a));
        assert_eq!(c.get_mv(&a, 0, 1), (Mv::default(), false));
    }

    #[test]
    fn mv_storage_ignores_excess_reference_indices() {
        let mut c = cache();
        let a = Area::new(0, 32, 32, 8);
        c.set_mv(&a, 1, 0, Mv::new(7, 7));
        c.set_mv(&a, 1, MAX_STORED_CU_INFO_REFS, Mv::new(1, 1));
        assert_eq!(c.get_mv(&a, 1, 0), (Mv::new(7, 7), true));
        assert_eq!(
            c.get_mv(&a, 1, MAX_STORED_CU_INFO_REFS),
            (Mv::new(7, 7), false)
        );
        assert_eq!(c.get_mv(&a, 0, 0), (Mv::default(), false));
    }

    #[test]
    fn merge_takes_newer_entries_inside_area_only() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(7);
        let mut main = cache();
        let mut worker = main.clone();
        worker.set_generation(5);
        let inside = Area::new(32, 0, 16, 16);
        let outside = Area::new(0, 0, 16, 16);
        let mv = Mv::new(rng.gen_range(-64..64), rng.gen_range(-64..64));
        worker.set_mv(&inside, 0, 2, mv);
        worker.get_blk_info_mut(&outside).is_intra = true;
        worker.touch(&outside);
        // an older write in the worker must not replace a newer one in main
        main.set_generation(9);
        main.get_blk_info_mut(&Area::new(48, 16, 16, 16)).is_inter = true;
        main.touch(&Area::new(48, 16, 16, 16));
        worker.get_blk_info_mut(&Area::new(48, 16, 16, 16)).is_skip = true;
        worker.touch(&Area::new(48, 16, 16, 16));

        main.merge_from(&worker, &Area::new(32, 0, 32, 32));
        assert_eq!(main.get_mv(&inside, 0, 2), (mv, true));
        assert!(!main.get_blk_info(&outside).is_intra);
        assert!(main.get_blk_info(&Area::new(48, 16, 16, 16)).is_inter);
        assert!(!main.is_skip(&Area::new(48, 16, 16, 16)));
        assert_eq!(main.generation(), 9);
    }

    #[test]
    fn block_walk_stays_inside() {
        let info = SizeIndexInfo::new(32);
        let mut count = 0;
        for_each_block_in(&info, &Area::new(8, 8, 8, 16), |_| count += 1);
        // 4x4: 2x4, 4x8: 2x3, 4x16: 2x1, 8x4: 1x4, 8x8: 1x3, 8x16: 1x1
        assert_eq!(count, 8 + 6 + 2 + 4 + 3 + 1);
    }
}
