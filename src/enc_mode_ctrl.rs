use super::aqp::*;
use super::blk_info_cache::*;
use super::coding_structure::*;
use super::common::*;
use super::cu_context::*;
use super::encoder_config::*;
use super::error::*;
use super::partition::*;
use super::partitioner::*;
use super::picture::*;
use super::qp_range::*;
use super::save_load_cache::*;
use super::size_index::*;
use super::slice::*;
use super::test_mode::*;
use std::sync::Arc;

/// Decides which coding modes are tried for each level of the coding tree
/// and keeps the best result per level.
///
/// One controller drives one CTU at a time. For every open tree level it
/// holds a [`CompressCuContext`]; the driver asks for the current candidate,
/// evaluates it and reports the result back until the level's candidate
/// stack is exhausted.
#[derive(Clone)]
pub struct EncModeCtrl {
    pub cfg: Arc<EncoderConfig>,
    pub scheme: PartitionScheme,
    pub size_idx: Arc<SizeIndexInfo>,
    pub qp: QpRangeDeriver,
    pub slice: SliceContext,
    pub picture: Option<Arc<Picture>>,
    pub skip_threshold: usize,
    pub cu_ctx_list: Vec<CompressCuContext>,
    pub imv_ctx_list: Vec<ImvCtx>,
    pub blk_info: BlkInfoCache,
    pub save_load: SaveLoadCache,
    pub run_next_in_parallel: bool,
    pub split_job_id: usize,
    pub fast_delta_qp: bool,
}

impl EncModeCtrl {
    pub fn new(cfg: Arc<EncoderConfig>) -> Result<EncModeCtrl, ConfigError> {
        cfg.validate()?;
        let size_idx = Arc::new(SizeIndexInfo::new(cfg.partition.ctu_size));
        Ok(EncModeCtrl {
            scheme: cfg.scheme(),
            qp: QpRangeDeriver::new(cfg.clone()),
            slice: SliceContext::new(SliceType::I, 0),
            picture: None,
            skip_threshold: cfg.thresholds.skip_depth,
            cu_ctx_list: vec![],
            imv_ctx_list: vec![],
            blk_info: BlkInfoCache::new(size_idx.clone()),
            save_load: SaveLoadCache::new(size_idx.clone()),
            run_next_in_parallel: false,
            split_job_id: 0,
            fast_delta_qp: false,
            size_idx,
            cfg,
        })
    }

    pub fn set_rate_control(&mut self, rate_ctrl: Option<Arc<dyn RateControl + Send + Sync>>) {
        self.qp.set_rate_control(rate_ctrl);
    }

    pub fn set_activity(&mut self, activity: Option<Arc<dyn ActivityProvider + Send + Sync>>) {
        self.qp.set_activity(activity);
    }

    /// Prepares the controller for the next CTU. Fails when the QP sources
    /// the configuration asks for were never installed.
    pub fn init_ctu_encoding(
        &mut self,
        slice: &SliceContext,
        picture: Arc<Picture>,
    ) -> Result<(), ConfigError> {
        assert!(
            self.cu_ctx_list.is_empty(),
            "mode list is not empty at the beginning of a CTU"
        );
        self.qp.check_ready()?;
        self.blk_info.init();
        self.save_load.init();
        self.slice = *slice;
        self.picture = Some(picture);
        self.run_next_in_parallel = false;
        self.split_job_id = 0;
        self.fast_delta_qp = self.cfg.use_fast_delta_qp && self.cfg.max_delta_qp > 0;
        let th = &self.cfg.thresholds;
        self.skip_threshold = if self.cfg.use_fast_skip_depth
            && slice.min_picture_distance <= th.picture_distance_th
        {
            th.fast_skip_depth
        } else {
            th.skip_depth
        };
        Ok(())
    }

    /// Drops every open level, e.g. after the CTU search failed.
    pub fn reset(&mut self) {
        self.cu_ctx_list.clear();
        self.imv_ctx_list.clear();
        self.run_next_in_parallel = false;
    }

    pub fn curr_ctx(&self) -> &CompressCuContext {
        match self.cu_ctx_list.last() {
            Some(ctx) => ctx,
            None => panic!("no open coding tree level"),
        }
    }

    pub fn curr_ctx_mut(&mut self) -> &mut CompressCuContext {
        match self.cu_ctx_list.last_mut() {
            Some(ctx) => ctx,
            None => panic!("no open coding tree level"),
        }
    }

    pub fn picture(&self) -> &Arc<Picture> {
        match &self.picture {
            Some(picture) => picture,
            None => panic!("CTU encoding was not initialized"),
        }
    }

    pub fn try_mode_master(&mut self, mode: &EncTestMode, partitioner: &Partitioner) -> bool {
        if self.curr_ctx().is_level_split_parallel && !self.parallel_job_selector(mode) {
            return false;
        }
        self.try_mode(mode, partitioner)
    }

    /// Advances to the next admissible candidate; false when the level's
    /// search is exhausted.
    pub fn next_mode(&mut self, partitioner: &Partitioner) -> bool {
        {
            let ctx = self.curr_ctx_mut();
            if let Some(mode) = ctx.test_modes.pop() {
                ctx.last_test_mode = mode;
            }
        }
        while let Some(&mode) = self.curr_ctx().test_modes.last() {
            if self.try_mode_master(&mode, partitioner) {
                break;
            }
            self.curr_ctx_mut().test_modes.pop();
        }
        self.any_mode()
    }

    pub fn curr_test_mode(&self) -> EncTestMode {
        match self.curr_ctx().test_modes.last() {
            Some(mode) => *mode,
            None => panic!("no candidate left at this level"),
        }
    }

    pub fn last_test_mode(&self) -> EncTestMode {
        self.curr_ctx().last_test_mode
    }

    pub fn any_mode(&self) -> bool {
        !self.curr_ctx().test_modes.is_empty()
    }

    /// Installs a result decided outside the regular candidate loop.
    pub fn set_best(&mut self, cs: Arc<CodingStructure>) {
        if cs.is_valid() {
            let ctx = self.curr_ctx_mut();
            if let Some(f) = cs.features {
                ctx.last_test_mode = f.enc_mode;
            }
            ctx.best_cs = Some(cs);
        }
    }

    pub fn best_cs(&self) -> Option<Arc<CodingStructure>> {
        self.curr_ctx().best_cs.clone()
    }

    pub fn has_only_split_modes(&self) -> bool {
        self.curr_ctx().test_modes.iter().all(|m| m.is_split())
    }

    pub fn set_early_skip_detected(&mut self) {
        self.curr_ctx_mut().early_skip = true;
    }

    pub fn get_fast_delta_qp(&self) -> bool {
        self.fast_delta_qp
    }

    pub fn best_inter_cost(&self) -> f64 {
        self.curr_ctx().best_inter_cost
    }

    /// A private copy of the search state for split job `job_id`.
    pub fn fork(&self, job_id: usize) -> EncModeCtrl {
        assert!(job_id > 0);
        let mut job = self.clone();
        job.split_job_id = job_id;
        job.run_next_in_parallel = true;
        job.blk_info
            .set_generation(self.blk_info.generation() + job_id as u64);
        job.save_load
            .set_generation(self.save_load.generation() + job_id as u64);
        job
    }

    /// Takes over what a finished split job learned about `area`.
    pub fn merge_from(&mut self, other: &EncModeCtrl, area: &Area) {
        self.blk_info.merge_from(&other.blk_info, area);
        self.save_load.merge_from(&other.save_load, area);
    }

    /// Writes after a merge must be newer than anything merged.
    pub fn finish_merge(&mut self) {
        self.blk_info.set_generation(self.blk_info.generation() + 1);
        self.save_load.set_generation(self.save_load.generation() + 1);
    }

    pub(crate) fn ctu_part_idx(&self, area: &Area) -> u32 {
        self.save_load.part_idx(area)
    }
}
