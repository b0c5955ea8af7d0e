use super::blk_info_cache::*;
use super::common::*;
use super::enc_mode_ctrl::*;
use super::partitioner::*;
use super::picture::*;
use super::save_load_cache::*;
use super::test_mode::*;
use debug_print::*;
use std::f64::consts::SQRT_2;

/// Sums of absolute luma differences along four directions inside a block.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectionalGradients {
    pub hor: f64,
    pub ver: f64,
    pub dow: f64,
    pub dup: f64,
}

pub fn directional_gradients(picture: &Picture, area: &Area) -> DirectionalGradients {
    let mut g = DirectionalGradients::default();
    let at = |j: usize, k: usize| picture.luma((area.x + j) as isize, (area.y + k) as isize);
    for j in 0..area.width - 1 {
        for k in 0..area.height - 1 {
            let c = at(j, k);
            g.hor += (at(j + 1, k) - c).abs() as f64;
            g.ver += (at(j, k + 1) - c).abs() as f64;
            g.dow += (at(j + 1, k) - at(j, k + 1)).abs() as f64;
            g.dup += (at(j + 1, k + 1) - c).abs() as f64;
        }
    }
    g
}

impl EncModeCtrl {
    /// Whether `mode` is worth evaluating at the current level. May update
    /// the level's features and, for the integer MV trigger, push a new
    /// candidate.
    pub fn try_mode(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        if self.scheme.is_multi_type() {
            self.try_mode_multi_type(mode, partitioner)
        } else {
            self.try_mode_quad_only(mode, partitioner)
        }
    }

    fn early_skip_rejects(&self, mode: &EncTestMode) -> bool {
        self.curr_ctx().early_skip
            && self.cfg.use_early_skip_detection
            && !mode.is_split()
            && !(mode.is_inter() && mode.part_size == PartSize::SIZE_2Nx2N)
    }

    /// Intra is skipped in inter slices when the best candidate so far left
    /// no residual.
    fn intra_worth_testing(&self, related_is_inter: bool) -> bool {
        let ctx = self.curr_ctx();
        if self.slice.is_intra() || ctx.best_mode().mode_type == EncTestModeType::ETM_INTRA {
            return true;
        }
        if self.cfg.disable_intra_in_inter_slices || related_is_inter {
            return false;
        }
        // inter candidates precede intra in inter slices; with none scored
        // there is no residual to rank intra against and it is skipped
        ctx.best_tu().map_or(false, |tu| tu.any_cbf())
    }

    fn intra_transform_admissible(&mut self, mode: &EncTestMode) -> bool {
        let last_part_size = self.last_test_mode().part_size;
        let f = &mut self.curr_ctx_mut().features;
        if mode.part_size != last_part_size {
            f.skip_other_nsst = false;
        }
        if f.skip_other_nsst && (mode.opts.has_pdpc() || mode.opts.nsst_idx() != f.last_nsst_idx) {
            return false;
        }
        true
    }

    fn ipcm_admissible(&self, width: usize) -> bool {
        let min_size = 1 << self.cfg.pcm_log2_min_size;
        let max_size = 1 << self.cfg.pcm_log2_max_size;
        if self.fast_delta_qp && width > clip3(min_size, max_size, 32) {
            return false;
        }
        self.cfg.use_pcm && width >= min_size && width <= max_size
    }

    fn fast_delta_qp_rejects_inter(&self, mode: &EncTestMode, width: usize) -> bool {
        self.fast_delta_qp
            && (mode.mode_type == EncTestModeType::ETM_MERGE_SKIP
                || mode.part_size != PartSize::SIZE_2Nx2N
                || width > self.cfg.fast_delta_qp_cu_max_size)
    }

    fn imv_4pel_not_promising(&self, mode: &EncTestMode) -> bool {
        let f = &self.curr_ctx().features;
        mode.opts.imv_idx() == 3
            && f.best_no_imv_cost * self.cfg.thresholds.imv_4pel_cost_ratio < f.best_imv_cost
    }

    fn try_mode_multi_type(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        assert!(
            mode.part_size == PartSize::SIZE_2Nx2N,
            "multi-type trees only test 2Nx2N candidates"
        );
        if self.early_skip_rejects(mode) {
            return false;
        }

        let implicit_split = partitioner.get_implicit_split();
        if implicit_split != MttSplitMode::SPLIT_NONE {
            return if mode.mode_type == EncTestModeType::ETM_SPLIT_QT {
                partitioner.can_split(MttSplitMode::SPLIT_QT)
            } else {
                mode.part_split() == implicit_split
            };
        }

        let area = partitioner.curr_area();
        let curr_qt_depth = partitioner.curr_qt_depth();
        {
            let ctx = self.curr_ctx();
            if ctx.min_depth > curr_qt_depth && partitioner.can_split(MttSplitMode::SPLIT_QT) {
                return mode.mode_type == EncTestModeType::ETM_SPLIT_QT;
            } else if mode.mode_type == EncTestModeType::ETM_SPLIT_QT && ctx.max_depth <= curr_qt_depth {
                return false;
            }
        }

        let save_load_tag = self.curr_ctx().features.save_load_tag;
        let sls = *self.save_load.get_save_load_struct(&area);
        let related_cu = *self.blk_info.get_blk_info(&area);
        let mut save_load_split = 0;
        if self.cfg.use_save_load_enc_info
            && self.cfg.use_save_load_split_decision
            && save_load_tag == SaveLoadTag::LOAD_ENC_INFO
        {
            save_load_split = sls.split;
            if save_load_split & SPLIT_DECISION_NON_SPLIT != 0 && mode.is_no_split() {
                return false;
            }
        }
        if let Some(best_cs) = self.curr_ctx().best_cs.clone() {
            if best_cs.cus.len() == 1 {
                self.curr_ctx_mut().features.best_non_split_cost = best_cs.cost;
            }
        }

        match mode.mode_type {
            EncTestModeType::ETM_INTRA => {
                self.try_intra_multi_type(mode, &area, save_load_tag, &sls, &related_cu)
            }
            EncTestModeType::ETM_IPCM => self.ipcm_admissible(area.width),
            _ if mode.is_inter() => {
                self.try_inter_multi_type(mode, &area, save_load_tag, &sls, &related_cu)
            }
            _ if mode.is_split() => self.try_split_multi_type(mode, partitioner, save_load_split),
            EncTestModeType::ETM_POST_DONT_SPLIT => self.post_dont_split(&area),
            _ => panic!("unexpected candidate {:?}", mode.mode_type),
        }
    }

    fn try_intra_multi_type(
        &mut self,
        mode: &EncTestMode,
        area: &Area,
        save_load_tag: SaveLoadTag,
        sls: &SaveLoadStruct,
        related_cu: &CodedCuInfo,
    ) -> bool {
        if self.fast_delta_qp && area.width > self.cfg.fast_delta_qp_cu_max_size {
            return false;
        }
        if self.cfg.use_fast_lctu && area.area() > 4096 {
            return false;
        }
        if !self.intra_worth_testing(related_cu.is_inter) {
            return false;
        }
        if !self.intra_transform_admissible(mode) {
            return false;
        }
        let load = save_load_tag == SaveLoadTag::LOAD_ENC_INFO;
        let nsst_idx = mode.opts.nsst_idx();
        if load && nsst_idx != 0 && nsst_idx != sls.nsst_idx {
            return false;
        }
        if !self.cfg.planar_pdpc && load && mode.opts.has_pdpc() != sls.pdpc {
            return false;
        }
        true
    }

    fn try_inter_multi_type(
        &mut self,
        mode: &EncTestMode,
        area: &Area,
        save_load_tag: SaveLoadTag,
        sls: &SaveLoadStruct,
        related_cu: &CodedCuInfo,
    ) -> bool {
        assert!(!self.slice.is_intra(), "inter candidate in an intra slice");
        if self.fast_delta_qp_rejects_inter(mode, area.width) {
            return false;
        }

        let load = save_load_tag == SaveLoadTag::LOAD_ENC_INFO;
        let opts = mode.opts;
        match mode.mode_type {
            EncTestModeType::ETM_INTER_ME => {
                if opts == EncTestModeOpts::ETO_STANDARD {
                    // always tested with early skip detection
                    if !self.cfg.use_early_skip_detection
                        && ((load && (sls.merge_flag || sls.lic_flag))
                            || related_cu.is_skip
                            || related_cu.is_intra)
                    {
                        return false;
                    }
                } else if load && sls.merge_flag {
                    return false;
                } else if load && opts.has_lic() != sls.lic_flag {
                    return false;
                } else if (load && opts.imv_idx() != 0 && sls.imv == 0)
                    || related_cu.is_skip
                    || related_cu.is_intra
                {
                    return false;
                } else if self.imv_4pel_not_promising(mode) {
                    return false;
                }
            }
            EncTestModeType::ETM_AFFINE => {
                if (load && !sls.affine_flag) || related_cu.is_intra {
                    return false;
                }
            }
            EncTestModeType::ETM_MERGE_FRUC => {
                if (load && sls.fruc_mode == 0) || related_cu.is_intra {
                    return false;
                }
            }
            _ => {}
        }
        !(opts.has_lic() && self.cfg.lic_mode == 2 && area.area() <= 32)
    }

    fn clear_did_split(&mut self, split: MttSplitMode) {
        let f = &mut self.curr_ctx_mut().features;
        match split {
            MttSplitMode::SPLIT_BT_HOR => f.did_horz_split = false,
            MttSplitMode::SPLIT_BT_VER => f.did_vert_split = false,
            _ => {}
        }
    }

    fn try_split_multi_type(
        &mut self,
        mode: &EncTestMode,
        partitioner: &Partitioner,
        save_load_split: u8,
    ) -> bool {
        let area = partitioner.curr_area();
        if self.curr_ctx().features.history_need_to_save {
            let part_idx = self.curr_ctx().part_idx;
            let next = self.save_load.get_save_load_struct_quad_mut(&area);
            next.tag = SaveLoadTag::SAVE_ENC_INFO;
            next.part_idx = part_idx;
            self.curr_ctx_mut().features.history_need_to_save = false;
            debug_eprintln!(
                "saving tag at {},{} ({}x{}) -> {:?}",
                area.x,
                area.y,
                area.width >> 1,
                area.height >> 1,
                SaveLoadTag::SAVE_ENC_INFO
            );
        }

        // consecutive ancestors (below the CTU) whose best leaf was a skip
        let mut skip_score = 0;
        if !self.slice.is_intra() && self.curr_ctx().features.is_best_nosplit_skip {
            skip_score = self
                .cu_ctx_list
                .iter()
                .skip(1)
                .rev()
                .skip(1)
                .take_while(|ctx| ctx.features.is_best_nosplit_skip)
                .count();
        }

        let split = mode.part_split();
        if !partitioner.can_split(split) || skip_score >= self.cfg.thresholds.skip_streak_levels {
            self.clear_did_split(split);
            if split == MttSplitMode::SPLIT_QT {
                self.curr_ctx_mut().features.did_quad_split = false;
            }
            return false;
        }

        let best_cs = self.curr_ctx().best_cs.clone();
        let best_cu = best_cs.as_deref().and_then(|cs| cs.first_cu());
        let curr_bt_depth = partitioner.curr_bt_depth();

        if self.cfg.use_content_based_fast_qtbt {
            let all_intra = self.cfg.intra_period == 1;
            let (width, height) = (area.width, area.height);
            let cond = if all_intra {
                curr_bt_depth == 0
            } else {
                height > 32 && width > 32
            };
            if width == height && cond && split != MttSplitMode::SPLIT_QT {
                let th = if all_intra {
                    self.cfg.thresholds.content_th_all_intra
                } else {
                    self.cfg.thresholds.content_th
                };
                let g = directional_gradients(self.picture(), &area);
                if g.hor > th * g.ver
                    && SQRT_2 * g.hor > th * g.dow
                    && SQRT_2 * g.hor > th * g.dup
                    && split.is_hor()
                {
                    return false;
                }
                if th * g.dup < SQRT_2 * g.ver
                    && th * g.dow < SQRT_2 * g.ver
                    && th * g.hor < g.ver
                    && split.is_ver()
                {
                    return false;
                }
            }
            if all_intra
                && width <= 32
                && height <= 32
                && best_cs.as_ref().map_or(false, |cs| cs.tus.len() == 1)
                && best_cu.map_or(false, |cu| cu.depth == partitioner.curr_depth() && !cu.root_cbf)
                && curr_bt_depth > 1
            {
                return false;
            }
        }

        if let Some(cu) = best_cu {
            if cu.skip && cu.mt_depth >= self.skip_threshold && !self.last_test_mode().is_split() {
                return false;
            }
        }

        let f = self.curr_ctx().features;
        let best_bt_matches = best_cu.map_or(false, |cu| cu.bt_depth == curr_bt_depth);
        let best_skip = best_cu.map_or(false, |cu| cu.skip);
        let best_no_residual = best_cu.map_or(false, |cu| !cu.root_cbf);
        let skip_hor_no_ver_th = self.cfg.thresholds.skip_hor_no_ver_qt_depth_th;
        match split {
            MttSplitMode::SPLIT_QT => {
                if !self.curr_ctx().is_level_split_parallel && !f.qt_before_bt {
                    if let (Some(cs), Some(cu)) = (best_cs.as_deref(), best_cu) {
                        let max_btd = partitioner.max_mtt_depth();
                        let intra = self.slice.is_intra();
                        let br_bt_one = cs.last_cu().map_or(false, |br| br.bt_depth == 1);
                        if ((cu.bt_depth == 0 && max_btd >= if intra { 3 } else { 2 })
                            || (cu.bt_depth == 1 && br_bt_one && max_btd >= if intra { 4 } else { 3 }))
                            && f.did_horz_split
                            && f.did_vert_split
                        {
                            return false;
                        }
                    }
                }
                if self.cfg.use_early_cu
                    && best_cs.as_ref().map_or(false, |cs| cs.cost != MAX_DOUBLE)
                    && best_skip
                {
                    return false;
                }
                if self.fast_delta_qp && area.width <= self.cfg.fast_delta_qp_cu_max_size {
                    return false;
                }
            }
            MttSplitMode::SPLIT_BT_HOR => {
                if save_load_split & SPLIT_DECISION_HORZ != 0 {
                    self.clear_did_split(split);
                    return false;
                }
            }
            MttSplitMode::SPLIT_BT_VER => {
                if f.did_horz_split && best_skip && best_bt_matches && curr_bt_depth >= skip_hor_no_ver_th {
                    self.clear_did_split(split);
                    return false;
                }
                if save_load_split & SPLIT_DECISION_VERT != 0 {
                    self.clear_did_split(split);
                    return false;
                }
            }
            MttSplitMode::SPLIT_TT_HOR => {
                if f.did_horz_split && best_bt_matches && best_no_residual {
                    return false;
                }
                if save_load_split & SPLIT_DECISION_TRIH != 0 || !f.do_trih_split {
                    return false;
                }
            }
            MttSplitMode::SPLIT_TT_VER => {
                if f.did_horz_split && best_skip && best_bt_matches && curr_bt_depth + 1 >= skip_hor_no_ver_th {
                    return false;
                }
                if f.did_vert_split && best_bt_matches && best_no_residual {
                    return false;
                }
                if save_load_split & SPLIT_DECISION_TRIV != 0 || !f.do_triv_split {
                    return false;
                }
            }
            MttSplitMode::SPLIT_NONE => panic!("only split candidates reach the split rules"),
        }

        if split != MttSplitMode::SPLIT_QT
            && f.qt_before_bt
            && f.did_quad_split
            && f.max_qt_sub_depth > partitioner.curr_qt_depth() + 1
        {
            self.clear_did_split(split);
            return false;
        }
        if split == MttSplitMode::SPLIT_QT {
            self.curr_ctx_mut().features.did_quad_split = true;
        }
        true
    }

    /// Marks the end of the leaf candidates: records what the best leaf
    /// was in the block caches and never itself gets evaluated.
    fn post_dont_split(&mut self, area: &Area) -> bool {
        let best_cs = {
            let ctx = self.curr_ctx();
            match &ctx.best_cs {
                Some(cs) if !ctx.best_mode().is_split() => cs.clone(),
                _ => return false,
            }
        };
        let best_cu = match best_cs.first_cu() {
            Some(cu) => cu,
            None => return false,
        };

        let related_cu = self.blk_info.get_blk_info_mut(area);
        if best_cu.is_inter() {
            related_cu.is_inter = true;
            related_cu.is_skip |= best_cu.skip;
        } else if best_cu.is_intra() {
            related_cu.is_intra = true;
        }
        self.blk_info.touch(area);
        self.curr_ctx_mut().features.is_best_nosplit_skip = best_cu.skip;

        if self.curr_ctx().features.history_do_save && best_cs.cost != MAX_DOUBLE {
            let part_idx = self.curr_ctx().part_idx;
            let sls = self.save_load.get_save_load_struct_mut(area);
            if best_cu.is_intra() {
                sls.nsst_idx = best_cu.nsst_idx;
                sls.pdpc = best_cu.pdpc;
            } else {
                sls.merge_flag = best_cu.merge_flag;
                sls.inter_dir = best_cu.inter_dir;
                sls.lic_flag = best_cu.lic_flag;
                sls.imv = best_cu.imv;
                sls.fruc_mode = best_cu.fruc_mode;
                sls.affine_flag = best_cu.affine;
            }
            sls.emt_cu_flag = best_cu.emt_flag;
            sls.emt_tu_index = best_cs.first_tu().map_or(0, |tu| tu.emt_idx);
            sls.tag = SaveLoadTag::LOAD_ENC_INFO;
            assert_eq!(sls.part_idx, part_idx, "save/load position is not consistent");
            debug_eprintln!(
                "saving tag at {},{} ({}x{}) -> {:?}",
                area.x,
                area.y,
                area.width,
                area.height,
                SaveLoadTag::LOAD_ENC_INFO
            );
        }
        false
    }

    fn try_mode_quad_only(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        if self.early_skip_rejects(mode) {
            return false;
        }
        if partitioner.is_split_implicit(MttSplitMode::SPLIT_QT) {
            return mode.mode_type == EncTestModeType::ETM_SPLIT_QT;
        }

        let curr_qt_depth = partitioner.curr_qt_depth();
        if self.cfg.partition.ctu_size > 64 {
            let ctx = self.curr_ctx();
            if ctx.min_depth > curr_qt_depth && partitioner.can_split(MttSplitMode::SPLIT_QT) {
                return mode.mode_type == EncTestModeType::ETM_SPLIT_QT;
            } else if mode.mode_type == EncTestModeType::ETM_SPLIT_QT && ctx.max_depth <= curr_qt_depth {
                return false;
            }
        }

        let area = partitioner.curr_area();
        match mode.mode_type {
            EncTestModeType::ETM_INTRA => self.try_intra_quad_only(mode, partitioner),
            EncTestModeType::ETM_IPCM => self.ipcm_admissible(area.width),
            EncTestModeType::ETM_TRIGGER_IMV_LIST => self.trigger_imv_list(),
            _ if mode.is_inter() => self.try_inter_quad_only(mode, partitioner),
            _ if mode.is_split() => {
                assert_eq!(
                    mode.mode_type,
                    EncTestModeType::ETM_SPLIT_QT,
                    "quad-only trees split into quadrants only"
                );
                curr_qt_depth < self.cfg.partition.max_qt_depth(self.slice.slice_type)
            }
            EncTestModeType::ETM_POST_DONT_SPLIT => self.post_dont_split(&area),
            _ => panic!("unexpected candidate {:?}", mode.mode_type),
        }
    }

    fn max_cu_depth(&self) -> usize {
        self.cfg.partition.max_qt_depth(self.slice.slice_type)
    }

    fn try_intra_quad_only(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        let width = partitioner.curr_area().width;
        if self.fast_delta_qp && width > self.cfg.fast_delta_qp_cu_max_size {
            return false;
        }
        if self.cfg.use_fast_lctu && width > 64 {
            return false;
        }
        if !self.intra_worth_testing(false) {
            return false;
        }
        if mode.part_size != PartSize::SIZE_2Nx2N {
            if !self.cfg.use_rect_partitions
                || !(partitioner.curr_depth() == self.max_cu_depth() && width > MIN_CU_SIZE)
            {
                return false;
            }
            if self.curr_ctx().features.early_skip_intra {
                return false;
            }
        }
        self.intra_transform_admissible(mode)
    }

    /// Expands the next integer MV refinement candidate from the ranked
    /// list onto the candidate stack.
    fn trigger_imv_list(&mut self) -> bool {
        let next = {
            let imv_ctx = match self.imv_ctx_list.last_mut() {
                Some(imv_ctx) => imv_ctx,
                None => panic!("integer MV trigger without an integer MV context"),
            };
            if imv_ctx.idx >= imv_ctx.max || imv_ctx.test_modes.is_empty() {
                return false;
            }
            while let Some(front) = imv_ctx.test_modes.front() {
                if front.mode_type != EncTestModeType::ETM_INTER_ME
                    || front.part_size != PartSize::SIZE_2Nx2N
                {
                    break;
                }
                imv_ctx.pop_front();
                imv_ctx.idx += 1;
                if imv_ctx.idx == imv_ctx.max && !imv_ctx.second_loop {
                    imv_ctx.max += 1;
                    imv_ctx.second_loop = true;
                }
                if imv_ctx.idx >= imv_ctx.max || imv_ctx.test_modes.is_empty() {
                    return false;
                }
            }
            let mut next = match imv_ctx.pop_front() {
                Some(mode) => mode,
                None => return false,
            };
            imv_ctx.idx += 1;
            next.opts = next.opts.with(EncTestModeOpts::imv(1));
            next
        };
        self.curr_ctx_mut().test_modes.push(next);
        true
    }

    fn try_inter_quad_only(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        let area = partitioner.curr_area();
        let width = area.width;
        if self.fast_delta_qp_rejects_inter(mode, width) {
            return false;
        }

        let opts = mode.opts;
        if (mode.mode_type == EncTestModeType::ETM_INTER_ME
            || mode.mode_type == EncTestModeType::ETM_MERGE_FRUC)
            && mode.part_size == PartSize::SIZE_2Nx2N
            && opts.imv_idx() != 0
        {
            let max_cand = self.curr_ctx().neighbours.max_imv_cand().max(1);
            if let Some(imv_ctx) = self.imv_ctx_list.last_mut() {
                imv_ctx.max = max_cand;
                imv_ctx.idx = 0;
                imv_ctx.second_loop = false;
            }
        }
        if self.imv_4pel_not_promising(mode) {
            return false;
        }

        if self.cfg.use_fast_lctu && mode.mode_type != EncTestModeType::ETM_AFFINE {
            if mode.mode_type == EncTestModeType::ETM_INTER_ME {
                if mode.part_size != PartSize::SIZE_2Nx2N && width > 64 {
                    return false;
                }
            } else if self.picture().height < 2 * area.height {
                return false;
            }
        }

        if self.slice.is_intra() {
            return false;
        }
        if mode.part_size == PartSize::SIZE_2Nx2N {
            return true;
        }

        let best_mode = self.curr_ctx().best_mode();
        let best_cs = self.curr_ctx().best_cs.clone();
        let best_cu = best_cs.as_deref().and_then(|cs| cs.first_cu());

        if self.cfg.use_cbf_fast_mode
            && best_mode.is_inter()
            && best_mode.part_size != PartSize::SIZE_NxN
            && (best_mode.part_size != PartSize::SIZE_2Nx2N || !self.cfg.use_early_skip_detection)
            && best_cu.map_or(false, |cu| !cu.root_cbf)
        {
            return false;
        }

        // NxN only at the deepest level and never for 8x8
        if mode.part_size == PartSize::SIZE_NxN
            && (width == 8 || partitioner.curr_depth() != self.max_cu_depth())
        {
            return false;
        }

        if mode.mode_type == EncTestModeType::ETM_INTER_ME
            && (mode.part_size == PartSize::SIZE_Nx2N || mode.part_size == PartSize::SIZE_2NxnU)
            && opts == EncTestModeOpts::ETO_STANDARD
        {
            self.curr_ctx_mut().features.disable_lic = !best_cu.map_or(false, |cu| cu.lic_flag);
        }
        if opts.has_lic() && (self.curr_ctx().features.disable_lic || self.cfg.lic_mode == 2) {
            return false;
        }

        if !mode.part_size.is_amp() {
            return true;
        }
        if !self.cfg.use_amp || partitioner.curr_depth() >= self.max_cu_depth() {
            return false;
        }
        if opts.imv_idx() != 0 {
            return true;
        }

        if mode.part_size == PartSize::SIZE_2NxnU && opts.0 & !EncTestModeOpts::ETO_LIC.0 == 0 {
            if let Some(cu) = best_cu {
                let f = &mut self.curr_ctx_mut().features;
                f.pre_amp_width = cu.area.width;
                f.pre_amp_part_size = cu.part_size;
                f.pre_amp_skip = cu.skip;
                f.pre_amp_merge = cu.merge_flag;
                f.try_amp_mrg_vert = true;
                f.try_amp_mrg_horz = true;
            }
        }

        let horizontal =
            mode.part_size == PartSize::SIZE_2NxnU || mode.part_size == PartSize::SIZE_2NxnD;
        let symmetric = if horizontal {
            PartSize::SIZE_2NxN
        } else {
            PartSize::SIZE_Nx2N
        };
        let f = &mut self.curr_ctx_mut().features;
        let pre_amp_2nx2n = f.pre_amp_part_size == PartSize::SIZE_2Nx2N;
        if !opts.has_force_merge() {
            let do_test = f.pre_amp_width != 64
                && (f.pre_amp_part_size == symmetric
                    || (pre_amp_2nx2n && !f.pre_amp_skip && !f.pre_amp_merge));
            if do_test {
                if horizontal {
                    f.try_amp_mrg_horz = false;
                } else {
                    f.try_amp_mrg_vert = false;
                }
            }
            do_test
        } else {
            let try_merge = if horizontal {
                f.try_amp_mrg_horz
            } else {
                f.try_amp_mrg_vert
            };
            let parent_amp = f.parent_part_size.map_or(false, |p| p.is_amp());
            try_merge
                && ((f.parent_part_size.is_none() && f.pre_amp_part_size == symmetric)
                    || parent_amp
                    || (pre_amp_2nx2n && !f.pre_amp_skip))
        }
    }
}
