use super::common::*;
use super::size_index::*;
use debug_print::*;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum SaveLoadTag {
    SAVE_LOAD_INIT,
    SAVE_ENC_INFO,
    LOAD_ENC_INFO,
}

pub const SPLIT_DECISION_NON_SPLIT: u8 = 0x01;
pub const SPLIT_DECISION_HORZ: u8 = 0x02;
pub const SPLIT_DECISION_VERT: u8 = 0x04;
pub const SPLIT_DECISION_TRIH: u8 = 0x08;
pub const SPLIT_DECISION_TRIV: u8 = 0x10;

pub const PART_IDX_RELEASED: u32 = 0xff;

#[derive(Clone, Copy, Debug)]
pub struct SaveLoadStruct {
    pub part_idx: u32,
    pub tag: SaveLoadTag,
    pub split: u8,
    pub merge_flag: bool,
    pub inter_dir: usize,
    pub lic_flag: bool,
    pub imv: usize,
    pub affine_flag: bool,
    pub fruc_mode: usize,
    pub emt_cu_flag: bool,
    pub emt_tu_index: usize,
    pub nsst_idx: usize,
    pub pdpc: bool,
    pub generation: u64,
}

impl SaveLoadStruct {
    pub fn new() -> SaveLoadStruct {
        SaveLoadStruct {
            part_idx: 0,
            tag: SaveLoadTag::SAVE_LOAD_INIT,
            split: 0,
            merge_flag: false,
            inter_dir: 0,
            lic_flag: false,
            imv: 0,
            affine_flag: false,
            fruc_mode: 0,
            emt_cu_flag: false,
            emt_tu_index: 0,
            nsst_idx: 0,
            pdpc: false,
            generation: 0,
        }
    }
}

/// Per block size, the encoding decisions of the most recent block of that
/// size, stamped with the position they were made for.
#[derive(Clone, Debug)]
pub struct SaveLoadCache {
    size_idx: Arc<SizeIndexInfo>,
    entries: Vec<SaveLoadStruct>,
    curr_generation: u64,
}

impl SaveLoadCache {
    pub fn new(size_idx: Arc<SizeIndexInfo>) -> SaveLoadCache {
        let num_entries = size_idx.num_sizes * size_idx.num_sizes;
        SaveLoadCache {
            size_idx,
            entries: vec![SaveLoadStruct::new(); num_entries],
            curr_generation: 1,
        }
    }

    pub fn init(&mut self) {
        self.entries.fill(SaveLoadStruct::new());
        self.curr_generation = 1;
    }

    pub fn generation(&self) -> u64 {
        self.curr_generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        assert!(generation > 0);
        self.curr_generation = generation;
    }

    pub fn part_idx(&self, area: &Area) -> u32 {
        let idx = self.size_idx.get_area_idx(area);
        self.size_idx.part_idx(&idx)
    }

    fn slot(&self, area: &Area) -> usize {
        let idx = self.size_idx.get_area_idx(area);
        self.size_idx.size_idx(&idx)
    }

    pub fn get_save_load_struct(&self, area: &Area) -> &SaveLoadStruct {
        &self.entries[self.slot(area)]
    }

    /// Mutable access; the entry is marked as written by the current
    /// generation.
    pub fn get_save_load_struct_mut(&mut self, area: &Area) -> &mut SaveLoadStruct {
        let slot = self.slot(area);
        let generation = self.curr_generation;
        let sls = &mut self.entries[slot];
        sls.generation = generation;
        sls
    }

    /// The half-size slot at the same position, used by the first quad child.
    pub fn get_save_load_struct_quad_mut(&mut self, area: &Area) -> &mut SaveLoadStruct {
        let quad = Area::new(area.x, area.y, area.width >> 1, area.height >> 1);
        self.get_save_load_struct_mut(&quad)
    }

    pub fn get_save_load_tag(&self, area: &Area) -> SaveLoadTag {
        let sls = self.get_save_load_struct(area);
        if sls.part_idx == self.part_idx(area) {
            sls.tag
        } else {
            SaveLoadTag::SAVE_LOAD_INIT
        }
    }

    pub fn get_save_load_split(&self, area: &Area) -> u8 {
        self.get_save_load_struct(area).split
    }

    pub fn set_save_load_split(&mut self, area: &Area, split: u8) {
        debug_eprintln!(
            "split decision {:#04x} for {}x{} at ({}, {})",
            split,
            area.width,
            area.height,
            area.x,
            area.y
        );
        self.get_save_load_struct_mut(area).split = split;
    }

    fn stamped_block(&self, slot: usize, part_idx: u32) -> Area {
        let w_idx = slot / self.size_idx.num_sizes;
        let h_idx = slot % self.size_idx.num_sizes;
        Area::new(
            ((part_idx >> 8) as usize) << MIN_CU_LOG2,
            ((part_idx & 0xff) as usize) << MIN_CU_LOG2,
            1 << w_idx,
            1 << h_idx,
        )
    }

    /// Takes over every slot that `other` wrote more recently when either
    /// side's entry belongs to a block inside `area`.
    pub fn merge_from(&mut self, other: &SaveLoadCache, area: &Area) {
        assert_eq!(self.entries.len(), other.entries.len());
        let mask = self.size_idx.ctu_mask;
        let local = Area::new(area.x & mask, area.y & mask, area.width, area.height);
        for slot in 0..self.entries.len() {
            let theirs = other.entries[slot];
            if theirs.generation <= self.entries[slot].generation {
                continue;
            }
            let ours = self.entries[slot];
            if local.contains_area(&self.stamped_block(slot, theirs.part_idx))
                || (ours.generation > 0
                    && local.contains_area(&self.stamped_block(slot, ours.part_idx)))
            {
                self.entries[slot] = theirs;
            }
        }
        self.curr_generation = self.curr_generation.max(other.curr_generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SaveLoadCache {
        SaveLoadCache::new(Arc::new(SizeIndexInfo::new(128)))
    }

    #[test]
    fn tag_requires_matching_position() {
        let mut c = cache();
        let a = Area::new(32, 32, 32, 32);
        let part_idx = c.part_idx(&a);
        {
            let sls = c.get_save_load_struct_mut(&a);
            sls.part_idx = part_idx;
            sls.tag = SaveLoadTag::LOAD_ENC_INFO;
        }
        assert_eq!(c.get_save_load_tag(&a), SaveLoadTag::LOAD_ENC_INFO);
        // same size elsewhere shares the slot but not the stamp
        assert_eq!(
            c.get_save_load_tag(&Area::new(64, 32, 32, 32)),
            SaveLoadTag::SAVE_LOAD_INIT
        );
        c.init();
        assert_eq!(c.get_save_load_tag(&a), SaveLoadTag::SAVE_LOAD_INIT);
    }

    #[test]
    fn quad_slot_is_half_size() {
        let mut c = cache();
        let a = Area::new(64, 0, 64, 64);
        let part_idx = c.part_idx(&a);
        {
            let quad = c.get_save_load_struct_quad_mut(&a);
            quad.part_idx = part_idx;
            quad.tag = SaveLoadTag::SAVE_ENC_INFO;
        }
        assert_eq!(
            c.get_save_load_tag(&Area::new(64, 0, 32, 32)),
            SaveLoadTag::SAVE_ENC_INFO
        );
        assert_eq!(
            c.get_save_load_tag(&Area::new(96, 0, 32, 32)),
            SaveLoadTag::SAVE_LOAD_INIT
        );
    }

    #[test]
    fn merge_respects_generation_and_area() {
        let mut main = cache();
        let mut worker = main.clone();
        worker.set_generation(4);
        let inside = Area::new(0, 64, 16, 16);
        let outside = Area::new(64, 64, 8, 8);
        let (p_in, p_out) = (worker.part_idx(&inside), worker.part_idx(&outside));
        {
            let sls = worker.get_save_load_struct_mut(&inside);
            sls.part_idx = p_in;
            sls.tag = SaveLoadTag::LOAD_ENC_INFO;
            sls.imv = 2;
        }
        {
            let sls = worker.get_save_load_struct_mut(&outside);
            sls.part_idx = p_out;
            sls.tag = SaveLoadTag::LOAD_ENC_INFO;
        }
        main.merge_from(&worker, &Area::new(0, 64, 64, 64));
        assert_eq!(main.get_save_load_tag(&inside), SaveLoadTag::LOAD_ENC_INFO);
        assert_eq!(main.get_save_load_struct(&inside).imv, 2);
        assert_eq!(main.get_save_load_tag(&outside), SaveLoadTag::SAVE_LOAD_INIT);
        assert_eq!(main.generation(), 4);
    }
}
