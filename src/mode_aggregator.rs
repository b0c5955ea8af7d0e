use super::coding_structure::*;
use super::common::*;
use super::encoder_config::*;
use super::enc_mode_ctrl::*;
use super::partitioner::*;
use super::save_load_cache::*;
use super::test_mode::*;
use debug_print::*;
use std::sync::Arc;

fn extract_features(mode: &EncTestMode, cs: &mut CodingStructure) {
    cs.features = Some(CsFeatures {
        enc_mode: *mode,
        dist: cs.dist,
        frac_bits: cs.frac_bits,
        cost: cs.cost,
        part_size: mode.part_size,
    });
}

fn feature_cost(cs: &CodingStructure) -> f64 {
    cs.features.map_or(cs.cost, |f| f.cost)
}

impl EncModeCtrl {
    /// Takes the scored result of `mode` at the current level. Returns true
    /// when it became the level's new best.
    pub fn use_mode_result(
        &mut self,
        mode: &EncTestMode,
        mut temp_cs: CodingStructure,
        partitioner: &Partitioner,
    ) -> bool {
        extract_features(mode, &mut temp_cs);
        if self.scheme.is_multi_type() {
            self.update_features_multi_type(mode, &temp_cs, partitioner);
        } else {
            self.update_features_quad_only(mode, &mut temp_cs);
        }
        self.install_if_better(mode, temp_cs)
    }

    fn install_if_better(&mut self, mode: &EncTestMode, temp_cs: CodingStructure) -> bool {
        let ctx = self.curr_ctx_mut();
        let better = match &ctx.best_cs {
            Some(best) => feature_cost(&temp_cs) < feature_cost(best),
            None => true,
        };
        if !better {
            return false;
        }
        if mode.is_inter() {
            ctx.best_inter_cost = temp_cs.cost;
        }
        ctx.best_cs = Some(Arc::new(temp_cs));
        true
    }

    fn update_imv_cost_floors(&mut self, mode: &EncTestMode, cost: f64) {
        let f = &mut self.curr_ctx_mut().features;
        match mode.opts.imv_idx() {
            0 => f.best_no_imv_cost = f.best_no_imv_cost.min(cost),
            1 => f.best_imv_cost = f.best_imv_cost.min(cost),
            _ => {}
        }
    }

    fn update_nsst_features(&mut self, mode: &EncTestMode, temp_cs: &CodingStructure) {
        let ctx = self.curr_ctx_mut();
        if let Some(temp_cu) = temp_cs.first_cu() {
            let refresh = match &ctx.best_cs {
                None => true,
                Some(best) => {
                    let best_single_intra = best.cus.len() == 1 && best.cus[0].is_intra();
                    (temp_cs.cost >= best.cost && best_single_intra)
                        || (temp_cs.cost < best.cost && temp_cu.is_intra())
                }
            };
            if refresh {
                ctx.features.skip_other_nsst = !temp_cu.root_cbf;
            }
        }
        ctx.features.last_nsst_idx = mode.opts.nsst_idx();
    }

    fn update_features_multi_type(
        &mut self,
        mode: &EncTestMode,
        temp_cs: &CodingStructure,
        partitioner: &Partitioner,
    ) {
        let cost = temp_cs.cost;
        {
            let ctx = self.curr_ctx_mut();
            match mode.mode_type {
                EncTestModeType::ETM_SPLIT_BT_H => ctx.features.best_horz_split_cost = cost,
                EncTestModeType::ETM_SPLIT_BT_V => ctx.features.best_vert_split_cost = cost,
                EncTestModeType::ETM_SPLIT_TT_H => ctx.features.best_trih_split_cost = cost,
                EncTestModeType::ETM_SPLIT_TT_V => ctx.features.best_triv_split_cost = cost,
                EncTestModeType::ETM_INTRA if mode.part_size == PartSize::SIZE_2Nx2N => {
                    if temp_cs.first_cu().map_or(false, |cu| !cu.emt_flag) {
                        ctx.best_emt_size_2nx2n_1st_pass = cost;
                    }
                }
                _ => {}
            }
        }

        if self.cfg.imv_4pel_fast
            && self.cfg.imv != ImvMode::IMV_OFF
            && mode.mode_type == EncTestModeType::ETM_INTER_ME
        {
            self.update_imv_cost_floors(mode, cost);
        }

        if mode.mode_type == EncTestModeType::ETM_INTRA {
            self.update_nsst_features(mode, temp_cs);
        }

        if self.cfg.use_additional_speedups && mode.mode_type == EncTestModeType::ETM_SPLIT_QT {
            let max_qt_depth = temp_cs.cus.iter().map(|cu| cu.qt_depth).max().unwrap_or(0);
            self.curr_ctx_mut().features.max_qt_sub_depth = max_qt_depth;
        }

        if self.scheme.ternary && temp_cs.cus.len() > 2 {
            let max_mt_depth = partitioner.max_mtt_depth() + partitioner.curr_level().implicit_bt_depth;
            let last_level = partitioner.curr_mt_depth() + 1 == max_mt_depth;
            let (first, last) = match (temp_cs.first_cu(), temp_cs.last_cu()) {
                (Some(first), Some(last)) => (first.area, last.area),
                _ => return,
            };
            let f = &mut self.curr_ctx_mut().features;
            match mode.mode_type {
                EncTestModeType::ETM_SPLIT_BT_H => {
                    let h_2 = temp_cs.area.height / 2;
                    f.do_trih_split = first.height < h_2 || last.height < h_2 || last_level;
                }
                EncTestModeType::ETM_SPLIT_BT_V => {
                    let w_2 = temp_cs.area.width / 2;
                    f.do_triv_split = first.width < w_2 || last.width < w_2 || last_level;
                }
                _ => {}
            }
        }
    }

    fn update_imv_candidates(&mut self, mode: &EncTestMode, temp_cs: &mut CodingStructure) {
        let cost = temp_cs.cost;
        let best_cost = self.curr_ctx().best_cs.as_deref().map(feature_cost);
        let imv_max_cand = self.cfg.imv_max_cand;
        let imv_ctx = match self.imv_ctx_list.last_mut() {
            Some(imv_ctx) => imv_ctx,
            None => panic!("integer MV candidates are not tracked at this level"),
        };

        let mut insert = mode.opts.imv_idx() == 0 && cost < MAX_DOUBLE;
        if insert {
            for (m, &c) in imv_ctx.test_modes.iter().zip(imv_ctx.test_costs.iter()) {
                if (mode.part_size == m.part_size && cost >= c) || cost == c {
                    insert = false;
                }
            }
        }
        if insert {
            imv_ctx.update_cand_list(*mode, cost);
        }

        if mode.opts.imv_idx() != 0
            && !mode.opts.has_force_merge()
            && mode.part_size != PartSize::SIZE_2Nx2N
        {
            if cost == MAX_DOUBLE {
                imv_ctx.max += 1;
            }
            if best_cost.map_or(true, |best| feature_cost(temp_cs) < best) {
                if let Some(cu) = temp_cs.cus.first_mut() {
                    cu.imv_num_cand = imv_ctx.idx;
                }
                if !imv_ctx.second_loop {
                    imv_ctx.max = (imv_ctx.max + 1).min(imv_max_cand);
                }
            }
        }

        if imv_ctx.idx == imv_ctx.max && !imv_ctx.second_loop {
            imv_ctx.second_loop = true;
            imv_ctx.max += 1;
        }
    }

    fn update_features_quad_only(&mut self, mode: &EncTestMode, temp_cs: &mut CodingStructure) {
        if self.cfg.imv != ImvMode::IMV_OFF && mode.mode_type == EncTestModeType::ETM_INTER_ME {
            self.update_imv_candidates(mode, temp_cs);
            if self.cfg.imv_4pel_fast {
                self.update_imv_cost_floors(mode, temp_cs.cost);
            }
        }

        if mode.mode_type == EncTestModeType::ETM_INTRA {
            self.update_nsst_features(mode, temp_cs);
        }

        if mode.mode_type == EncTestModeType::ETM_INTRA && mode.part_size == PartSize::SIZE_2Nx2N {
            let emt_flag = match temp_cs.first_cu() {
                Some(cu) => cu.emt_flag,
                None => return,
            };
            if !emt_flag {
                self.curr_ctx_mut().best_emt_size_2nx2n_1st_pass = temp_cs.cost;
            }
            if self.cfg.intra_emt && self.cfg.fast_inter_emt && !emt_flag {
                let ctx = self.curr_ctx();
                let best_is_inter = ctx.best_cu().map_or(false, |cu| !cu.is_intra());
                let best_inter_cost = ctx.best_inter_cost;
                let inter_cost_known = !self.cfg.use_save_load_enc_info || best_inter_cost < MAX_DOUBLE;
                if best_is_inter
                    && inter_cost_known
                    && ctx.best_emt_size_2nx2n_1st_pass
                        > self.cfg.thresholds.emt_fast_intra_skip_ratio * best_inter_cost
                {
                    self.curr_ctx_mut().features.early_skip_intra = true;
                }
            }
        }
    }

    /// Closes the current level: publishes its history and drops its
    /// context.
    pub fn finish_cu_level(&mut self, partitioner: &Partitioner) {
        if self.scheme.is_multi_type() {
            self.finish_cu_level_multi_type(partitioner);
        } else if self.cfg.imv != ImvMode::IMV_OFF && self.imv_ctx_list.pop().is_none() {
            panic!("integer MV context stack is out of sync");
        }
        if self.cu_ctx_list.pop().is_none() {
            panic!("no open coding tree level");
        }
    }

    fn finish_cu_level_multi_type(&mut self, partitioner: &Partitioner) {
        let area = partitioner.curr_area();
        if self.curr_ctx().features.history_do_save && self.curr_ctx().best_cs.is_some() {
            let part_idx = self.curr_ctx().part_idx;
            let sls = self.save_load.get_save_load_struct_mut(&area);
            sls.part_idx = part_idx;
            sls.tag = SaveLoadTag::LOAD_ENC_INFO;
            self.curr_ctx_mut().features.history_do_save = false;
        }

        let splittable = area.width > MIN_CU_SIZE && area.height > MIN_CU_SIZE;
        if self.cfg.use_save_load_enc_info && splittable {
            let sub_sls = self.save_load.get_save_load_struct_quad_mut(&area);
            sub_sls.tag = SaveLoadTag::SAVE_LOAD_INIT;
            sub_sls.part_idx = PART_IDX_RELEASED;
            debug_eprintln!(
                "saving tag at {},{} ({}x{}) -> {:?}",
                area.x,
                area.y,
                area.width >> 1,
                area.height >> 1,
                SaveLoadTag::SAVE_LOAD_INIT
            );
        }

        let f = self.curr_ctx().features;
        if self.cfg.use_save_load_split_decision
            && self.cfg.use_save_load_enc_info
            && splittable
            && f.save_load_tag == SaveLoadTag::SAVE_ENC_INFO
        {
            let threshold = self.cfg.thresholds.split_decision_cost_scale
                * f.best_non_split_cost.min(f.best_horz_split_cost.min(f.best_vert_split_cost));
            let mut split = 0;
            for (cost, bit) in [
                (f.best_non_split_cost, SPLIT_DECISION_NON_SPLIT),
                (f.best_horz_split_cost, SPLIT_DECISION_HORZ),
                (f.best_vert_split_cost, SPLIT_DECISION_VERT),
                (f.best_trih_split_cost, SPLIT_DECISION_TRIH),
                (f.best_triv_split_cost, SPLIT_DECISION_TRIV),
            ] {
                if cost > threshold {
                    split |= bit;
                }
            }
            self.save_load.set_save_load_split(&area, split);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cu_context::*;
    use crate::enc_mode_ctrl::tests::*;

    fn leaf(mode_type: EncTestModeType, part_size: PartSize, opts: EncTestModeOpts) -> EncTestMode {
        EncTestMode::new(mode_type, part_size, opts, 32, false)
    }

    fn intra() -> EncTestMode {
        leaf(
            EncTestModeType::ETM_INTRA,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
        )
    }

    fn split(mode_type: EncTestModeType) -> EncTestMode {
        EncTestMode::split(mode_type, 32, false)
    }

    fn open_level(ctrl: &mut EncModeCtrl, partitioner: &Partitioner) {
        ctrl.init_cu_level(partitioner, 32, 32, CuNeighbourhood::default());
    }

    fn split_result(area: Area, mode: EncTestMode, cost: f64, children: &[Area]) -> CodingStructure {
        let mut cs = CodingStructure::new(area, mode);
        for a in children {
            let sub = scored(*a, intra(), 1.0);
            cs.add_sub(&sub);
        }
        cs.cost = cost;
        cs
    }

    #[test]
    fn best_only_improves_strictly() {
        let (mut ctrl, partitioner) = ctrl_for(EncoderConfig::new(), SliceType::I, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let first = intra();
        let mut second = intra();
        second.opts = EncTestModeOpts::ETO_PDPC;

        assert!(ctrl.use_mode_result(&first, scored(area, first, 100.0), &partitioner));
        assert!(!ctrl.use_mode_result(&second, scored(area, second, 100.0), &partitioner));
        assert_eq!(ctrl.curr_ctx().best_mode(), first);
        assert!(!ctrl.use_mode_result(&second, scored(area, second, 120.0), &partitioner));
        assert!(ctrl.use_mode_result(&second, scored(area, second, 80.0), &partitioner));
        assert_eq!(ctrl.curr_ctx().best_mode(), second);
        let best = ctrl.best_cs().unwrap();
        assert_eq!(best.features.map(|f| f.cost), Some(80.0));
    }

    #[test]
    fn inter_results_track_best_inter_cost() {
        let (mut ctrl, partitioner) = ctrl_for(EncoderConfig::new(), SliceType::B, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let merge = leaf(
            EncTestModeType::ETM_MERGE_SKIP,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
        );
        assert!(ctrl.use_mode_result(&merge, scored(area, merge, 50.0), &partitioner));
        assert_eq!(ctrl.best_inter_cost(), 50.0);
        assert!(ctrl.use_mode_result(&intra(), scored(area, intra(), 40.0), &partitioner));
        assert_eq!(ctrl.best_inter_cost(), 50.0);
    }

    #[test]
    fn split_costs_fill_their_slots() {
        let (mut ctrl, partitioner) = ctrl_for(EncoderConfig::new(), SliceType::B, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let cases = [
            (EncTestModeType::ETM_SPLIT_BT_H, 10.0),
            (EncTestModeType::ETM_SPLIT_BT_V, 20.0),
            (EncTestModeType::ETM_SPLIT_TT_H, 30.0),
            (EncTestModeType::ETM_SPLIT_TT_V, 40.0),
        ];
        for (mode_type, cost) in cases {
            let mode = split(mode_type);
            let children = partitioner.child_areas(mode.part_split());
            ctrl.use_mode_result(&mode, split_result(area, mode, cost, &children), &partitioner);
        }
        let f = ctrl.curr_ctx().features;
        assert_eq!(f.best_horz_split_cost, 10.0);
        assert_eq!(f.best_vert_split_cost, 20.0);
        assert_eq!(f.best_trih_split_cost, 30.0);
        assert_eq!(f.best_triv_split_cost, 40.0);
        assert_eq!(ctrl.curr_ctx().best_mode().mode_type, EncTestModeType::ETM_SPLIT_BT_H);
    }

    #[test]
    fn uneven_binary_children_enable_ternary() {
        let (mut ctrl, partitioner) = ctrl_for(EncoderConfig::new(), SliceType::B, 128, 128);
        open_level(&mut ctrl, &partitioner);
        ctrl.curr_ctx_mut().features.do_trih_split = false;
        ctrl.curr_ctx_mut().features.do_triv_split = false;
        let mode = split(EncTestModeType::ETM_SPLIT_BT_H);
        // top half split again into two quarters, bottom half kept
        let children = [
            Area::new(0, 0, 128, 32),
            Area::new(0, 32, 128, 32),
            Area::new(0, 64, 128, 64),
        ];
        ctrl.use_mode_result(&mode, split_result(Area::new(0, 0, 128, 128), mode, 10.0, &children), &partitioner);
        assert!(ctrl.curr_ctx().features.do_trih_split);

        let mode = split(EncTestModeType::ETM_SPLIT_BT_V);
        let children = [
            Area::new(0, 0, 64, 128),
            Area::new(64, 0, 64, 64),
            Area::new(64, 64, 64, 64),
        ];
        ctrl.use_mode_result(&mode, split_result(Area::new(0, 0, 128, 128), mode, 20.0, &children), &partitioner);
        assert!(!ctrl.curr_ctx().features.do_triv_split);
    }

    #[test]
    fn quad_result_records_deepest_sub_depth() {
        let (mut ctrl, partitioner) = ctrl_for(EncoderConfig::new(), SliceType::I, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let mode = split(EncTestModeType::ETM_SPLIT_QT);
        let mut cs = split_result(
            partitioner.curr_area(),
            mode,
            10.0,
            &partitioner.child_areas(MttSplitMode::SPLIT_QT),
        );
        for (i, cu) in cs.cus.iter_mut().enumerate() {
            cu.qt_depth = 1 + i % 3;
        }
        ctrl.use_mode_result(&mode, cs, &partitioner);
        assert_eq!(ctrl.curr_ctx().features.max_qt_sub_depth, 3);
    }

    #[test]
    fn zero_residual_intra_skips_other_nsst() {
        let mut cfg = EncoderConfig::new();
        cfg.nsst = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::I, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let mut mode = intra();
        mode.opts = EncTestModeOpts::nsst(2);
        let mut cs = scored(area, mode, 60.0);
        cs.cus[0].root_cbf = false;
        ctrl.use_mode_result(&mode, cs, &partitioner);
        let f = ctrl.curr_ctx().features;
        assert!(f.skip_other_nsst);
        assert_eq!(f.last_nsst_idx, 2);

        // a worse result against a single intra best still refreshes the flag
        let mut mode = intra();
        mode.opts = EncTestModeOpts::nsst(1);
        ctrl.use_mode_result(&mode, scored(area, mode, 70.0), &partitioner);
        let f = ctrl.curr_ctx().features;
        assert!(!f.skip_other_nsst);
        assert_eq!(f.last_nsst_idx, 1);
    }

    #[test]
    fn fast_imv_floors_follow_precision() {
        let mut cfg = EncoderConfig::new();
        cfg.imv = ImvMode::IMV_4PEL;
        cfg.imv_4pel_fast = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::B, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let me = |imv| {
            leaf(
                EncTestModeType::ETM_INTER_ME,
                PartSize::SIZE_2Nx2N,
                EncTestModeOpts::imv(imv),
            )
        };
        ctrl.use_mode_result(&me(0), scored(area, me(0), 90.0), &partitioner);
        ctrl.use_mode_result(&me(1), scored(area, me(1), 95.0), &partitioner);
        ctrl.use_mode_result(&me(1), scored(area, me(1), 99.0), &partitioner);
        ctrl.use_mode_result(&me(2), scored(area, me(2), 10.0), &partitioner);
        let f = ctrl.curr_ctx().features;
        assert_eq!(f.best_no_imv_cost, 90.0);
        assert_eq!(f.best_imv_cost, 95.0);
    }

    #[test]
    fn split_decision_marks_expensive_shapes() {
        let mut cfg = EncoderConfig::new();
        cfg.use_save_load_enc_info = true;
        cfg.use_save_load_split_decision = true;
        let (mut ctrl, mut partitioner) = ctrl_for(cfg, SliceType::B, 128, 128);
        open_level(&mut ctrl, &partitioner);
        partitioner.push_child(MttSplitMode::SPLIT_QT, 0);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        {
            let ctx = ctrl.curr_ctx_mut();
            ctx.features.save_load_tag = SaveLoadTag::SAVE_ENC_INFO;
            ctx.features.best_non_split_cost = 100.0;
            ctx.features.best_horz_split_cost = 104.0;
            ctx.features.best_vert_split_cost = 106.0;
            ctx.features.best_trih_split_cost = 200.0;
            ctx.features.best_triv_split_cost = 105.0;
        }
        let depth = ctrl.cu_ctx_list.len();
        ctrl.finish_cu_level(&partitioner);
        assert_eq!(ctrl.cu_ctx_list.len(), depth - 1);
        assert_eq!(
            ctrl.save_load.get_save_load_split(&area),
            SPLIT_DECISION_VERT | SPLIT_DECISION_TRIH
        );
        let quad = Area::new(area.x, area.y, area.width / 2, area.height / 2);
        let sub = ctrl.save_load.get_save_load_struct(&quad);
        assert_eq!(sub.tag, SaveLoadTag::SAVE_LOAD_INIT);
        assert_eq!(sub.part_idx, PART_IDX_RELEASED);
    }

    #[test]
    fn finished_level_becomes_read_ready() {
        let mut cfg = EncoderConfig::new();
        cfg.use_save_load_enc_info = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::I, 128, 128);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        ctrl.curr_ctx_mut().features.history_do_save = true;
        ctrl.use_mode_result(&intra(), scored(area, intra(), 10.0), &partitioner);
        let part_idx = ctrl.curr_ctx().part_idx;
        ctrl.finish_cu_level(&partitioner);
        assert!(ctrl.cu_ctx_list.is_empty());
        let sls = ctrl.save_load.get_save_load_struct(&area);
        assert_eq!(sls.tag, SaveLoadTag::LOAD_ENC_INFO);
        assert_eq!(sls.part_idx, part_idx);
    }

    #[test]
    fn imv_candidates_rank_by_cost() {
        let mut cfg = quad_cfg(64);
        cfg.imv = ImvMode::IMV_DEFAULT;
        cfg.use_rect_partitions = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::P, 64, 64);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let me = |part_size, imv| leaf(EncTestModeType::ETM_INTER_ME, part_size, EncTestModeOpts::imv(imv));

        ctrl.use_mode_result(&me(PartSize::SIZE_2Nx2N, 0), scored(area, me(PartSize::SIZE_2Nx2N, 0), 50.0), &partitioner);
        ctrl.use_mode_result(&me(PartSize::SIZE_2NxN, 0), scored(area, me(PartSize::SIZE_2NxN, 0), 40.0), &partitioner);
        // same shape, not cheaper
        ctrl.use_mode_result(&me(PartSize::SIZE_2NxN, 0), scored(area, me(PartSize::SIZE_2NxN, 0), 45.0), &partitioner);
        // same cost as an existing entry
        ctrl.use_mode_result(&me(PartSize::SIZE_Nx2N, 0), scored(area, me(PartSize::SIZE_Nx2N, 0), 50.0), &partitioner);
        // refined candidates are never listed
        ctrl.use_mode_result(&me(PartSize::SIZE_Nx2N, 1), scored(area, me(PartSize::SIZE_Nx2N, 1), 5.0), &partitioner);

        let imv_ctx = &ctrl.imv_ctx_list[0];
        assert_eq!(imv_ctx.test_costs, [40.0, 50.0]);
        assert_eq!(imv_ctx.test_modes[0].part_size, PartSize::SIZE_2NxN);
        assert_eq!(ctrl.curr_ctx().best_cu().map(|cu| cu.imv_num_cand), Some(0));
    }

    #[test]
    fn winning_refinement_widens_imv_search() {
        let mut cfg = quad_cfg(64);
        cfg.imv = ImvMode::IMV_DEFAULT;
        cfg.imv_max_cand = 3;
        cfg.use_rect_partitions = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::P, 64, 64);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        {
            let imv_ctx = ctrl.imv_ctx_list.last_mut().unwrap();
            imv_ctx.idx = 1;
            imv_ctx.max = 1;
        }
        let base = leaf(EncTestModeType::ETM_MERGE_SKIP, PartSize::SIZE_2Nx2N, EncTestModeOpts::ETO_STANDARD);
        ctrl.use_mode_result(&base, scored(area, base, 50.0), &partitioner);
        let refined = leaf(EncTestModeType::ETM_INTER_ME, PartSize::SIZE_2NxN, EncTestModeOpts::imv(1));
        assert!(ctrl.use_mode_result(&refined, scored(area, refined, 30.0), &partitioner));
        assert_eq!(ctrl.curr_ctx().best_cu().map(|cu| cu.imv_num_cand), Some(1));
        let imv_ctx = &ctrl.imv_ctx_list[0];
        assert_eq!(imv_ctx.max, 2);
        assert!(!imv_ctx.second_loop);
    }

    #[test]
    fn poor_first_intra_pass_skips_remaining_intra() {
        let mut cfg = quad_cfg(64);
        cfg.intra_emt = true;
        cfg.fast_inter_emt = true;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::P, 64, 64);
        open_level(&mut ctrl, &partitioner);
        let area = partitioner.curr_area();
        let merge = leaf(EncTestModeType::ETM_MERGE_SKIP, PartSize::SIZE_2Nx2N, EncTestModeOpts::ETO_STANDARD);
        ctrl.use_mode_result(&merge, scored(area, merge, 100.0), &partitioner);
        ctrl.use_mode_result(&intra(), scored(area, intra(), 139.0), &partitioner);
        assert!(!ctrl.curr_ctx().features.early_skip_intra);
        ctrl.use_mode_result(&intra(), scored(area, intra(), 141.0), &partitioner);
        assert!(ctrl.curr_ctx().features.early_skip_intra);
        assert_eq!(ctrl.curr_ctx().best_emt_size_2nx2n_1st_pass, 141.0);
    }

    #[test]
    fn quad_only_level_closes_both_stacks() {
        let mut cfg = quad_cfg(64);
        cfg.imv = ImvMode::IMV_DEFAULT;
        let (mut ctrl, partitioner) = ctrl_for(cfg, SliceType::P, 64, 64);
        open_level(&mut ctrl, &partitioner);
        assert_eq!(ctrl.imv_ctx_list.len(), 1);
        ctrl.finish_cu_level(&partitioner);
        assert!(ctrl.cu_ctx_list.is_empty());
        assert!(ctrl.imv_ctx_list.is_empty());
    }
}
