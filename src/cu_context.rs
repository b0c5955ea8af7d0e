use super::coding_structure::*;
use super::common::*;
use super::save_load_cache::*;
use super::test_mode::*;
use std::collections::VecDeque;
use std::sync::Arc;

/// Per-level bookkeeping the pruning heuristics read and write.
#[derive(Clone, Copy, Debug)]
pub struct CuFeatures {
    pub best_non_split_cost: f64,
    pub best_horz_split_cost: f64,
    pub best_vert_split_cost: f64,
    pub best_trih_split_cost: f64,
    pub best_triv_split_cost: f64,
    pub do_trih_split: bool,
    pub do_triv_split: bool,
    pub did_horz_split: bool,
    pub did_vert_split: bool,
    pub did_quad_split: bool,
    pub history_do_save: bool,
    pub history_need_to_save: bool,
    pub save_load_tag: SaveLoadTag,
    pub best_imv_cost: f64,
    pub best_no_imv_cost: f64,
    pub last_nsst_idx: usize,
    pub skip_other_nsst: bool,
    pub early_skip_intra: bool,
    pub qt_before_bt: bool,
    pub is_best_nosplit_skip: bool,
    pub max_qt_sub_depth: usize,
    /// Part size of the parent's best CU when it is inter coded.
    pub parent_part_size: Option<PartSize>,
    pub pre_amp_width: usize,
    pub pre_amp_part_size: PartSize,
    pub pre_amp_skip: bool,
    pub pre_amp_merge: bool,
    pub try_amp_mrg_vert: bool,
    pub try_amp_mrg_horz: bool,
    pub disable_lic: bool,
}

impl CuFeatures {
    pub fn new() -> CuFeatures {
        CuFeatures {
            best_non_split_cost: MAX_DOUBLE,
            best_horz_split_cost: MAX_DOUBLE,
            best_vert_split_cost: MAX_DOUBLE,
            best_trih_split_cost: MAX_DOUBLE,
            best_triv_split_cost: MAX_DOUBLE,
            do_trih_split: false,
            do_triv_split: false,
            did_horz_split: false,
            did_vert_split: false,
            did_quad_split: false,
            history_do_save: false,
            history_need_to_save: false,
            save_load_tag: SaveLoadTag::SAVE_LOAD_INIT,
            best_imv_cost: MAX_DOUBLE * 0.5,
            best_no_imv_cost: MAX_DOUBLE * 0.5,
            last_nsst_idx: 0,
            skip_other_nsst: false,
            early_skip_intra: false,
            qt_before_bt: false,
            is_best_nosplit_skip: false,
            max_qt_sub_depth: 0,
            parent_part_size: None,
            pre_amp_width: 0,
            pre_amp_part_size: PartSize::SIZE_2Nx2N,
            pre_amp_skip: false,
            pre_amp_merge: false,
            try_amp_mrg_vert: false,
            try_amp_mrg_horz: false,
            disable_lic: false,
        }
    }
}

/// Search state of one open level of the coding tree.
#[derive(Clone, Debug)]
pub struct CompressCuContext {
    pub area: Area,
    /// Candidate stack; the back is tried next.
    pub test_modes: Vec<EncTestMode>,
    pub last_test_mode: EncTestMode,
    pub best_cs: Option<Arc<CodingStructure>>,
    pub features: CuFeatures,
    pub early_skip: bool,
    pub best_inter_cost: f64,
    pub min_depth: usize,
    pub max_depth: usize,
    pub part_idx: u32,
    pub is_level_split_parallel: bool,
    pub best_emt_size_2nx2n_1st_pass: f64,
    /// Already coded blocks around the area when the level was opened.
    pub neighbours: CuNeighbourhood,
}

impl CompressCuContext {
    pub fn new(area: Area, part_idx: u32, min_depth: usize, max_depth: usize) -> CompressCuContext {
        CompressCuContext {
            area,
            test_modes: vec![],
            last_test_mode: EncTestMode::invalid(),
            best_cs: None,
            features: CuFeatures::new(),
            early_skip: false,
            best_inter_cost: MAX_DOUBLE,
            min_depth,
            max_depth,
            part_idx,
            is_level_split_parallel: false,
            best_emt_size_2nx2n_1st_pass: MAX_DOUBLE,
            neighbours: CuNeighbourhood::default(),
        }
    }

    pub fn best_cu(&self) -> Option<&CodingUnit> {
        self.best_cs.as_ref().and_then(|cs| cs.first_cu())
    }

    pub fn best_tu(&self) -> Option<&TransformUnit> {
        self.best_cs.as_ref().and_then(|cs| cs.first_tu())
    }

    /// The candidate the current best came from.
    pub fn best_mode(&self) -> EncTestMode {
        self.best_cs
            .as_ref()
            .and_then(|cs| cs.features)
            .map(|f| f.enc_mode)
            .unwrap_or_else(EncTestMode::invalid)
    }
}

/// Coding decisions of an already coded neighbouring block.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CodedCu {
    pub qt_depth: usize,
    pub imv_num_cand: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CuNeighbourhood {
    pub left: Option<CodedCu>,
    pub above: Option<CodedCu>,
    pub below_left: Option<CodedCu>,
    pub above_right: Option<CodedCu>,
}

impl CuNeighbourhood {
    pub fn max_imv_cand(&self) -> usize {
        [self.left, self.above]
            .iter()
            .flatten()
            .map(|cu| cu.imv_num_cand)
            .max()
            .unwrap_or(0)
    }

    /// QT depth bounds worth exploring, widened by one level around the
    /// neighbours' QT depths; unknown neighbours open the full range.
    pub fn adaptive_depth_range(&self, std_min_depth: usize, std_max_depth: usize) -> (usize, usize) {
        let mut min_depth = std_max_depth;
        let mut max_depth = std_min_depth;
        for n in [self.left, self.below_left, self.above, self.above_right] {
            match n {
                Some(cu) => {
                    min_depth = min_depth.min(cu.qt_depth);
                    max_depth = max_depth.max(cu.qt_depth);
                }
                None => {
                    min_depth = std_min_depth;
                    max_depth = std_max_depth;
                }
            }
        }
        let min_depth = if min_depth >= 1 { min_depth - 1 } else { 0 };
        let max_depth = if max_depth < std_max_depth {
            max_depth + 1
        } else {
            std_max_depth
        };
        (min_depth, max_depth)
    }
}

/// Candidates for integer motion vector refinement, cheapest first.
#[derive(Clone, Debug)]
pub struct ImvCtx {
    pub test_modes: VecDeque<EncTestMode>,
    pub test_costs: VecDeque<f64>,
    pub max: usize,
    pub idx: usize,
    pub second_loop: bool,
    capacity: usize,
}

impl ImvCtx {
    pub fn new(capacity: usize) -> ImvCtx {
        ImvCtx {
            test_modes: VecDeque::with_capacity(capacity),
            test_costs: VecDeque::with_capacity(capacity),
            max: 0,
            idx: 0,
            second_loop: false,
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.test_modes.len() >= self.capacity
    }

    /// Inserts behind every entry that is not more expensive.
    pub fn update_cand_list(&mut self, mode: EncTestMode, cost: f64) {
        if self.is_full() {
            return;
        }
        let pos = self
            .test_costs
            .iter()
            .position(|&c| cost < c)
            .unwrap_or(self.test_costs.len());
        self.test_modes.insert(pos, mode);
        self.test_costs.insert(pos, cost);
    }

    pub fn pop_front(&mut self) -> Option<EncTestMode> {
        self.test_costs.pop_front();
        self.test_modes.pop_front()
    }
}
