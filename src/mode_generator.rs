use super::common::*;
use super::cu_context::*;
use super::enc_mode_ctrl::*;
use super::encoder_config::*;
use super::partitioner::*;
use super::save_load_cache::*;
use super::test_mode::*;
use debug_print::*;

fn push_split_modes(modes: &mut Vec<EncTestMode>, mode_type: EncTestModeType, min_qp: i32, max_qp: i32) {
    for qp in (min_qp..=max_qp).rev() {
        modes.push(EncTestMode::split(mode_type, qp, false));
    }
}

fn leaf_mode(
    mode_type: EncTestModeType,
    part_size: PartSize,
    opts: EncTestModeOpts,
    (qp, lossless): (i32, bool),
) -> EncTestMode {
    EncTestMode::new(mode_type, part_size, opts, qp, lossless)
}

impl EncModeCtrl {
    fn lic_active(&self) -> bool {
        self.cfg.use_lic && self.slice.use_lic
    }

    /// QP slots of the leaf candidates, highest first. With transquant bypass
    /// one extra slot below the minimum carries the lossless candidate.
    fn leaf_qps(&self, min_qp: i32, max_qp: i32) -> Vec<(i32, bool)> {
        let lowest_qp = min_qp;
        let (mut min_qp, mut max_qp) = (min_qp, max_qp);
        let use_lossless = self.cfg.transquant_bypass_enabled;
        if use_lossless {
            min_qp -= 1;
            if self.cfg.cu_transquant_bypass_force_value {
                max_qp = min_qp;
            }
        }
        (min_qp..=max_qp)
            .rev()
            .map(|qp_loop| (qp_loop.max(lowest_qp), use_lossless && qp_loop == min_qp))
            .collect()
    }

    fn push_intra_modes(&self, modes: &mut Vec<EncTestMode>, part_size: PartSize, slot: (i32, bool)) {
        if self.cfg.nsst {
            for rot_idx in (1..=3).rev() {
                modes.push(leaf_mode(
                    EncTestModeType::ETM_INTRA,
                    part_size,
                    EncTestModeOpts::nsst(rot_idx),
                    slot,
                ));
            }
        }
        if self.cfg.intra_pdpc {
            modes.push(leaf_mode(
                EncTestModeType::ETM_INTRA,
                part_size,
                EncTestModeOpts::ETO_PDPC,
                slot,
            ));
        }
        modes.push(leaf_mode(
            EncTestModeType::ETM_INTRA,
            part_size,
            EncTestModeOpts::ETO_STANDARD,
            slot,
        ));
    }

    /// Integer MV variants of the 2Nx2N motion search, each with its
    /// illumination compensated twin first.
    fn push_imv_modes(&self, modes: &mut Vec<EncTestMode>, slot: (i32, bool)) {
        let lic = self.lic_active();
        let mut push_imv = |imv: usize| {
            if lic {
                modes.push(leaf_mode(
                    EncTestModeType::ETM_INTER_ME,
                    PartSize::SIZE_2Nx2N,
                    EncTestModeOpts::imv(imv).with(EncTestModeOpts::ETO_LIC),
                    slot,
                ));
            }
            modes.push(leaf_mode(
                EncTestModeType::ETM_INTER_ME,
                PartSize::SIZE_2Nx2N,
                EncTestModeOpts::imv(imv),
                slot,
            ));
        };
        if self.cfg.imv == ImvMode::IMV_4PEL {
            push_imv(if self.cfg.imv_4pel_fast { 3 } else { 2 });
        }
        push_imv(1);
    }

    /// The 2Nx2N inter modes every inter level starts with.
    fn push_first_pass_inter_modes(&self, modes: &mut Vec<EncTestMode>, slot: (i32, bool)) {
        let inter = |mode_type, opts| leaf_mode(mode_type, PartSize::SIZE_2Nx2N, opts, slot);
        if self.lic_active() {
            modes.push(inter(EncTestModeType::ETM_INTER_ME, EncTestModeOpts::ETO_LIC));
            if self.cfg.use_fruc_merge {
                modes.push(inter(EncTestModeType::ETM_MERGE_FRUC, EncTestModeOpts::ETO_LIC));
            }
        }
        let std = EncTestModeOpts::ETO_STANDARD;
        if self.cfg.use_early_skip_detection {
            if self.cfg.use_fruc_merge {
                modes.push(inter(EncTestModeType::ETM_MERGE_FRUC, std));
            }
            modes.push(inter(EncTestModeType::ETM_MERGE_SKIP, std));
            if self.cfg.use_affine {
                modes.push(inter(EncTestModeType::ETM_AFFINE, std));
            }
            modes.push(inter(EncTestModeType::ETM_INTER_ME, std));
        } else {
            modes.push(inter(EncTestModeType::ETM_INTER_ME, std));
            if self.cfg.use_fruc_merge {
                modes.push(inter(EncTestModeType::ETM_MERGE_FRUC, std));
            }
            modes.push(inter(EncTestModeType::ETM_MERGE_SKIP, std));
            if self.cfg.use_affine {
                modes.push(inter(EncTestModeType::ETM_AFFINE, std));
            }
        }
    }

    fn push_amp_modes(&self, modes: &mut Vec<EncTestMode>, lic: EncTestModeOpts, slot: (i32, bool)) {
        let fm = EncTestModeOpts::ETO_FORCE_MERGE.with(lic);
        for (part_size, opts) in [
            (PartSize::SIZE_nRx2N, fm),
            (PartSize::SIZE_nLx2N, fm),
            (PartSize::SIZE_nRx2N, lic),
            (PartSize::SIZE_nLx2N, lic),
            (PartSize::SIZE_2NxnD, fm),
            (PartSize::SIZE_2NxnU, fm),
            (PartSize::SIZE_2NxnD, lic),
            (PartSize::SIZE_2NxnU, lic),
        ] {
            modes.push(leaf_mode(EncTestModeType::ETM_INTER_ME, part_size, opts, slot));
        }
    }

    fn push_rect_modes(&self, modes: &mut Vec<EncTestMode>, opts: EncTestModeOpts, slot: (i32, bool)) {
        for part_size in [PartSize::SIZE_2NxN, PartSize::SIZE_Nx2N, PartSize::SIZE_NxN] {
            modes.push(leaf_mode(EncTestModeType::ETM_INTER_ME, part_size, opts, slot));
        }
    }

    fn qt_before_bt(&self, partitioner: &Partitioner, neighbours: &CuNeighbourhood) -> bool {
        if !self.cfg.use_additional_speedups {
            return false;
        }
        let curr_qt_depth = partitioner.curr_qt_depth();
        let width = partitioner.curr_area().width;
        let deeper = |cu: &CodedCu| cu.qt_depth > curr_qt_depth;
        let hint = match (&neighbours.left, &neighbours.above) {
            (Some(left), Some(above)) => deeper(left) && deeper(above),
            (Some(left), None) => deeper(left),
            (None, Some(above)) => deeper(above),
            (None, None) => width >= (32 << self.slice.depth),
        };
        hint && width > (partitioner.min_qt_size() << 1)
    }

    /// Opens the search of the partitioner's current area: pushes a new
    /// level and fills its candidate stack.
    pub fn init_cu_level(
        &mut self,
        partitioner: &Partitioner,
        base_qp: i32,
        curr_qp: i32,
        neighbours: CuNeighbourhood,
    ) {
        let area = partitioner.curr_area();
        let depth = partitioner.curr_depth();
        let std_max_depth = self.cfg.partition.max_qt_depth(self.slice.slice_type);
        let (min_depth, max_depth) = if self.cfg.use_fast_lctu {
            neighbours.adaptive_depth_range(0, std_max_depth)
        } else {
            (0, std_max_depth)
        };

        let mut ctx = CompressCuContext::new(area, self.ctu_part_idx(&area), min_depth, max_depth);
        ctx.neighbours = neighbours;
        if self.run_next_in_parallel {
            assert!(
                self.cu_ctx_list.iter().all(|c| !c.is_level_split_parallel),
                "trying to parallelize a level within parallel execution"
            );
            assert!(
                self.split_job_id != 0,
                "trying to run a parallel level although the job id is 0"
            );
            self.run_next_in_parallel = false;
            ctx.is_level_split_parallel = true;
        }

        if self.scheme.is_multi_type() {
            let sls = self.save_load.get_save_load_struct(&area);
            let f = &mut ctx.features;
            f.do_trih_split = self.scheme.ternary;
            f.do_triv_split = self.scheme.ternary;
            f.history_do_save = sls.part_idx == ctx.part_idx && sls.tag == SaveLoadTag::SAVE_ENC_INFO;
            f.save_load_tag = if sls.part_idx == ctx.part_idx {
                sls.tag
            } else {
                SaveLoadTag::SAVE_LOAD_INIT
            };
            f.history_need_to_save = self.cfg.use_save_load_enc_info
                && area.width > MIN_CU_SIZE
                && area.height > MIN_CU_SIZE;
            f.qt_before_bt = self.qt_before_bt(partitioner, &neighbours);
            debug_eprintln!(
                "save/load tag at {},{} ({}x{}): {:?}, split: {}",
                area.x,
                area.y,
                area.width,
                area.height,
                f.save_load_tag,
                if f.save_load_tag == SaveLoadTag::LOAD_ENC_INFO
                    && self.cfg.use_save_load_split_decision
                {
                    sls.split
                } else {
                    0
                }
            );
        } else if let Some(prev) = self.cu_ctx_list.last() {
            ctx.features.parent_part_size = prev
                .best_cu()
                .filter(|cu| cu.is_inter())
                .map(|cu| cu.part_size);
        }

        let base_qp = self.qp.adaptive_base_qp(base_qp, &area, depth);
        let picture = self.picture().clone();
        self.qp.update_luma_qp_offset(&picture, &area, depth);

        let (min_qp, max_qp) = self.qp.get_min_max_qp(base_qp, curr_qp, depth, true);
        let mut modes = vec![];
        if self.scheme.is_multi_type() {
            let qt_before_bt = ctx.features.qt_before_bt;
            if !qt_before_bt {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_QT, min_qp, max_qp);
            }
            if partitioner.can_split(MttSplitMode::SPLIT_TT_VER) {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_TT_V, min_qp, max_qp);
            }
            if partitioner.can_split(MttSplitMode::SPLIT_TT_HOR) {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_TT_H, min_qp, max_qp);
            }
            ctx.features.did_vert_split = partitioner.can_split(MttSplitMode::SPLIT_BT_VER);
            if ctx.features.did_vert_split {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_BT_V, min_qp, max_qp);
            }
            ctx.features.did_horz_split = partitioner.can_split(MttSplitMode::SPLIT_BT_HOR);
            if ctx.features.did_horz_split {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_BT_H, min_qp, max_qp);
            }
            if qt_before_bt {
                push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_QT, min_qp, max_qp);
            }
        } else {
            push_split_modes(&mut modes, EncTestModeType::ETM_SPLIT_QT, min_qp, max_qp);
        }
        modes.push(EncTestMode::sentinel());

        let (min_qp, max_qp) = self.qp.get_min_max_qp(base_qp, curr_qp, depth, false);
        debug_eprintln!(
            "{}x{} at ({}, {}) depth {}: leaf qp {}..={}",
            area.width,
            area.height,
            area.x,
            area.y,
            depth,
            min_qp,
            max_qp
        );
        let leaf_qps = self.leaf_qps(min_qp, max_qp);
        let is_inter_slice = !self.slice.is_intra();

        for &slot in &leaf_qps {
            if self.cfg.use_pcm {
                modes.push(leaf_mode(
                    EncTestModeType::ETM_IPCM,
                    PartSize::SIZE_2Nx2N,
                    EncTestModeOpts::ETO_STANDARD,
                    slot,
                ));
            }
            if self.scheme.is_multi_type() {
                self.push_intra_modes(&mut modes, PartSize::SIZE_2Nx2N, slot);
                continue;
            }
            if self.cfg.use_rect_partitions {
                self.push_intra_modes(&mut modes, PartSize::SIZE_NxN, slot);
            }
            self.push_intra_modes(&mut modes, PartSize::SIZE_2Nx2N, slot);
            if is_inter_slice {
                if self.cfg.imv != ImvMode::IMV_OFF {
                    modes.push(leaf_mode(
                        EncTestModeType::ETM_TRIGGER_IMV_LIST,
                        PartSize::SIZE_2Nx2N,
                        EncTestModeOpts::ETO_STANDARD,
                        slot,
                    ));
                    self.push_imv_modes(&mut modes, slot);
                }
                if self.cfg.use_amp {
                    if self.lic_active() {
                        self.push_amp_modes(&mut modes, EncTestModeOpts::ETO_LIC, slot);
                    }
                    self.push_amp_modes(&mut modes, EncTestModeOpts::ETO_STANDARD, slot);
                }
                if self.cfg.use_rect_partitions {
                    if self.lic_active() {
                        self.push_rect_modes(&mut modes, EncTestModeOpts::ETO_LIC, slot);
                    }
                    self.push_rect_modes(&mut modes, EncTestModeOpts::ETO_STANDARD, slot);
                }
            }
        }

        if is_inter_slice {
            for &slot in &leaf_qps {
                if self.scheme.is_multi_type() && self.cfg.imv != ImvMode::IMV_OFF {
                    self.push_imv_modes(&mut modes, slot);
                }
                self.push_first_pass_inter_modes(&mut modes, slot);
            }
        }

        ctx.test_modes = modes;
        self.cu_ctx_list.push(ctx);
        if self.scheme.is_quad_only() && self.cfg.imv != ImvMode::IMV_OFF {
            self.imv_ctx_list
                .push(ImvCtx::new(self.cfg.thresholds.quad_imv_list_capacity));
        }

        let top = self.curr_test_mode();
        if !self.try_mode_master(&top, partitioner) {
            self.next_mode(partitioner);
        }
        self.curr_ctx_mut().last_test_mode = EncTestMode::invalid();
    }
}
