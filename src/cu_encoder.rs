use super::coded_cu_map::*;
use super::coding_structure::*;
use super::common::*;
use super::enc_mode_ctrl::*;
use super::encoder_config::*;
use super::error::*;
use super::partitioner::*;
use super::picture::*;
use super::scorer::*;
use super::slice::*;
use super::test_mode::*;
use debug_print::*;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Runs the coding tree search of a CTU: walks the candidates the mode
/// controller hands out, scores leaves, recurses into splits and reports
/// every result back.
pub struct CuEncoder<S: ModeScorer + Sync> {
    scorer: S,
    pool: Option<ThreadPool>,
}

impl<S: ModeScorer + Sync> CuEncoder<S> {
    pub fn new(scorer: S, cfg: &EncoderConfig) -> Result<CuEncoder<S>, EncodeError> {
        let pool = if cfg.num_split_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(cfg.num_split_threads)
                .thread_name(|idx| format!("split-job-{}", idx))
                .build()
                .map_err(|e| EncodeError::Workers(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(CuEncoder { scorer, pool })
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Searches the CTU at `ctu_area` and returns the accepted tree. On any
    /// failure the controller is left without open levels and nothing of the
    /// CTU remains in `coded`.
    ///
    /// A level may end without an accepted mode only when the picture
    /// boundary forces its split; anywhere else that is reported as
    /// [`EncodeError::Exhausted`].
    pub fn compress_ctu(
        &self,
        ctrl: &mut EncModeCtrl,
        coded: &mut CodedCuMap,
        slice: &SliceContext,
        picture: &Arc<Picture>,
        ctu_area: Area,
    ) -> Result<Arc<CodingStructure>, EncodeError> {
        ctrl.init_ctu_encoding(slice, picture.clone())?;
        let mut partitioner = Partitioner::new(
            &ctrl.cfg.partition,
            slice.slice_type,
            picture.width,
            picture.height,
            ctu_area,
        );
        let best = match self.compress_cu(ctrl, coded, &mut partitioner, slice.slice_qp, slice.slice_qp) {
            Ok(best) => best,
            Err(e) => {
                ctrl.reset();
                coded.clear(&ctu_area);
                return Err(e);
            }
        };
        let cs = match best {
            Some(cs) => cs,
            None if partitioner.get_implicit_split() != MttSplitMode::SPLIT_NONE => {
                Arc::new(CodingStructure::new(picture.clip_area(&ctu_area), EncTestMode::invalid()))
            }
            None => return Err(EncodeError::Exhausted { area: ctu_area }),
        };
        coded.store(&cs);
        debug_eprintln!(
            "ctu ({}, {}): {} cus, dist {}, cost {:.1}",
            ctu_area.x,
            ctu_area.y,
            cs.cus.len(),
            cs.dist,
            cs.cost
        );
        Ok(cs)
    }

    fn compress_cu(
        &self,
        ctrl: &mut EncModeCtrl,
        coded: &mut CodedCuMap,
        partitioner: &mut Partitioner,
        base_qp: i32,
        curr_qp: i32,
    ) -> Result<Option<Arc<CodingStructure>>, EncodeError> {
        if ctrl.is_parallel_split(partitioner) {
            return self.compress_cu_parallel(ctrl, coded, partitioner, base_qp, curr_qp);
        }

        let area = partitioner.curr_area();
        ctrl.init_cu_level(partitioner, base_qp, curr_qp, coded.neighbourhood(&area));
        while ctrl.any_mode() {
            let mode = ctrl.curr_test_mode();
            match mode.mode_type {
                EncTestModeType::ETM_TRIGGER_IMV_LIST
                | EncTestModeType::ETM_POST_DONT_SPLIT
                | EncTestModeType::ETM_INVALID => {}
                _ if mode.is_split() => {
                    self.check_split(ctrl, coded, partitioner, &mode, base_qp)?
                }
                _ => self.check_leaf(ctrl, partitioner, &mode)?,
            }
            ctrl.next_mode(partitioner);
        }
        let best = ctrl.best_cs().filter(|cs| cs.is_valid());
        ctrl.finish_cu_level(partitioner);
        Ok(best)
    }

    fn score_context<'a>(
        &self,
        ctrl: &'a EncModeCtrl,
        partitioner: &Partitioner,
        mv_hint: Option<Mv>,
    ) -> ScoreContext<'a> {
        ScoreContext {
            picture: ctrl.picture(),
            slice: &ctrl.slice,
            level: *partitioner.curr_level(),
            mv_hint,
        }
    }

    fn check_leaf(
        &self,
        ctrl: &mut EncModeCtrl,
        partitioner: &Partitioner,
        mode: &EncTestMode,
    ) -> Result<(), EncodeError> {
        let area = partitioner.curr_area();
        let (mv, valid) = ctrl.blk_info.get_mv(&area, 0, 0);
        let cs = {
            let ctx = self.score_context(ctrl, partitioner, if valid { Some(mv) } else { None });
            self.scorer
                .score(mode, &ctx)
                .map_err(|source| EncodeError::Scoring {
                    area,
                    mode: mode.mode_type,
                    source,
                })?
        };

        let found_mv = if mode.mode_type == EncTestModeType::ETM_INTER_ME
            && mode.part_size == PartSize::SIZE_2Nx2N
            && mode.opts.imv_idx() == 0
        {
            cs.first_cu().map(|cu| cu.mv[0])
        } else {
            None
        };
        ctrl.use_mode_result(mode, cs, partitioner);
        if let Some(mv) = found_mv {
            ctrl.blk_info.set_mv(&area, 0, 0, mv);
        }
        if mode.mode_type == EncTestModeType::ETM_MERGE_SKIP
            && ctrl.cfg.use_early_skip_detection
            && ctrl.curr_ctx().best_cu().map_or(false, |cu| cu.skip)
        {
            ctrl.set_early_skip_detected();
        }
        Ok(())
    }

    /// Searches every child of the split `mode` names and reports the
    /// combined tree. A child left without an accepted mode drops the split
    /// when its own split is forced by the picture boundary and fails the
    /// search otherwise.
    fn check_split(
        &self,
        ctrl: &mut EncModeCtrl,
        coded: &mut CodedCuMap,
        partitioner: &mut Partitioner,
        mode: &EncTestMode,
        base_qp: i32,
    ) -> Result<(), EncodeError> {
        let split = mode.part_split();
        let area = partitioner.curr_area();
        let mut cs = CodingStructure::new(area, *mode);
        let mut cost = 0.0;
        let mut complete = true;

        for (part_idx, child) in partitioner.child_areas(split).into_iter().enumerate() {
            if !partitioner.is_inside_picture(&child) {
                continue;
            }
            partitioner.push_child(split, part_idx);
            let forced = partitioner.get_implicit_split() != MttSplitMode::SPLIT_NONE;
            let result = self.compress_cu(ctrl, coded, partitioner, base_qp, mode.qp);
            partitioner.pop();
            match result? {
                Some(sub) => {
                    coded.store(&sub);
                    cs.add_sub(&sub);
                    cost += sub.cost;
                }
                None if forced => {
                    complete = false;
                    break;
                }
                None => return Err(EncodeError::Exhausted { area: child }),
            }
        }
        coded.clear(&area);

        if !complete {
            debug_eprintln!(
                "{:?} at ({}, {}) {}x{} has an empty boundary child",
                mode.mode_type,
                area.x,
                area.y,
                area.width,
                area.height
            );
            return Ok(());
        }
        let split_bits = {
            let ctx = self.score_context(ctrl, partitioner, None);
            self.scorer.split_bits(split, &ctx)
        };
        cs.frac_bits += split_bits;
        cs.cost = cost + lambda_from_qp(mode.qp) * split_bits as f64 / FRAC_BITS_SCALE;
        ctrl.use_mode_result(mode, cs, partitioner);
        Ok(())
    }

    /// Runs the level as independent jobs, one per candidate class, each on
    /// a private copy of the search state.
    fn compress_cu_parallel(
        &self,
        ctrl: &mut EncModeCtrl,
        coded: &mut CodedCuMap,
        partitioner: &Partitioner,
        base_qp: i32,
        curr_qp: i32,
    ) -> Result<Option<Arc<CodingStructure>>, EncodeError> {
        let area = partitioner.curr_area();
        let num_jobs = ctrl.get_num_parallel_jobs(partitioner);
        debug_eprintln!(
            "{}x{} at ({}, {}): {} split jobs",
            area.width,
            area.height,
            area.x,
            area.y,
            num_jobs
        );
        let jobs = (1..=num_jobs).map(|job_id| ctrl.fork(job_id)).collect::<Vec<_>>();
        let snapshot: &CodedCuMap = coded;
        let run = || {
            jobs.into_par_iter()
                .map(|mut job| {
                    let mut coded = snapshot.clone();
                    let mut partitioner = partitioner.clone();
                    let best = self.compress_cu(&mut job, &mut coded, &mut partitioner, base_qp, curr_qp);
                    (job, best)
                })
                .collect::<Vec<_>>()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let mut best: Option<Arc<CodingStructure>> = None;
        for (job, result) in results {
            let cs = result?;
            ctrl.merge_from(&job, &area);
            if let Some(cs) = cs {
                if best.as_ref().map_or(true, |b| cs.cost < b.cost) {
                    best = Some(cs);
                }
            }
        }
        ctrl.finish_merge();
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_cost_estimator::*;
    use crate::enc_mode_ctrl::tests::*;
    use crate::partition::*;
    use crate::qp_range::*;
    use rand::{prelude::StdRng, Rng, SeedableRng};

    fn random_picture(seed: u64, width: usize, height: usize) -> Picture {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pic = Picture::new(width, height, 8);
        for y in 0..height {
            for x in 0..width {
                pic.pixels[0][y][x] = rng.gen_range(0..256);
            }
        }
        pic
    }

    fn mtt_cfg(ctu_size: usize, num_split_threads: usize) -> EncoderConfig {
        let mut cfg = EncoderConfig::new();
        cfg.partition = PartitionConstraints::new();
        cfg.partition.ctu_size = ctu_size;
        cfg.num_split_threads = num_split_threads;
        cfg
    }

    fn encode_picture(cfg: EncoderConfig, picture: Arc<Picture>, slice: &SliceContext) -> Vec<Arc<CodingStructure>> {
        let ctu_size = cfg.partition.ctu_size;
        let encoder = CuEncoder::new(BlockCostEstimator::new(), &cfg).unwrap();
        let mut ctrl = EncModeCtrl::new(Arc::new(cfg)).unwrap();
        let mut coded = CodedCuMap::new(picture.width, picture.height);
        let mut ctus = vec![];
        for y in (0..picture.height).step_by(ctu_size) {
            for x in (0..picture.width).step_by(ctu_size) {
                let ctu_area = Area::new(x, y, ctu_size, ctu_size);
                ctus.push(
                    encoder
                        .compress_ctu(&mut ctrl, &mut coded, slice, &picture, ctu_area)
                        .unwrap(),
                );
                assert!(ctrl.cu_ctx_list.is_empty());
            }
        }
        ctus
    }

    fn assert_tiles(cs: &CodingStructure, area: &Area) {
        let covered: usize = cs.cus.iter().map(|cu| cu.area.area()).sum();
        assert_eq!(covered, area.area());
        for (i, a) in cs.cus.iter().enumerate() {
            assert!(area.contains_area(&a.area));
            for b in &cs.cus[i + 1..] {
                let disjoint = a.area.x + a.area.width <= b.area.x
                    || b.area.x + b.area.width <= a.area.x
                    || a.area.y + a.area.height <= b.area.y
                    || b.area.y + b.area.height <= a.area.y;
                assert!(disjoint, "{:?} overlaps {:?}", a.area, b.area);
            }
        }
    }

    #[test]
    fn quad_tree_picks_cheaper_of_leaf_and_split() {
        let picture = Arc::new(random_picture(11, 64, 64));
        let slice = SliceContext::new(SliceType::I, 32);
        let ctu_area = Area::new(0, 0, 64, 64);
        let ctus = encode_picture(quad_cfg(64), picture.clone(), &slice);
        let cs = &ctus[0];
        assert_tiles(cs, &ctu_area);

        let partitioner = Partitioner::new(
            &PartitionConstraints::quad_only(64, 8),
            SliceType::I,
            64,
            64,
            ctu_area,
        );
        let ctx = ScoreContext {
            picture: &picture,
            slice: &slice,
            level: *partitioner.curr_level(),
            mv_hint: None,
        };
        let leaf = EncTestMode::new(
            EncTestModeType::ETM_INTRA,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
            32,
            false,
        );
        let leaf_cost = BlockCostEstimator::new().score(&leaf, &ctx).unwrap().cost;
        assert!(cs.cost <= leaf_cost);
        assert!(cs.cus.len() > 1 || cs.first_cu().map_or(false, |cu| cu.is_intra()));
    }

    #[test]
    fn flat_picture_stays_unsplit() {
        // mid-grey is what DC predicts without neighbours
        let mut flat = Picture::new(64, 64, 8);
        flat.pixels[0].fill(128);
        let slice = SliceContext::new(SliceType::I, 32);
        let ctus = encode_picture(quad_cfg(64), Arc::new(flat), &slice);
        assert_eq!(ctus[0].cus.len(), 1);
        assert_eq!(ctus[0].dist, 0);
    }

    #[test]
    fn boundary_ctus_cover_the_picture() {
        let picture = Arc::new(random_picture(13, 48, 40));
        let slice = SliceContext::new(SliceType::I, 37);
        let ctus = encode_picture(quad_cfg(32), picture, &slice);
        assert_eq!(ctus.len(), 4);
        assert_tiles(&ctus[1], &Area::new(32, 0, 16, 32));
        assert_tiles(&ctus[2], &Area::new(0, 32, 32, 8));
        assert_tiles(&ctus[3], &Area::new(32, 32, 16, 8));
    }

    #[test]
    fn multi_type_search_is_deterministic() {
        let picture = Arc::new(random_picture(17, 32, 32));
        let slice = SliceContext::new(SliceType::I, 32);
        let a = encode_picture(mtt_cfg(32, 1), picture.clone(), &slice);
        let b = encode_picture(mtt_cfg(32, 1), picture, &slice);
        assert_eq!(a[0].cost, b[0].cost);
        assert_eq!(a[0].cus.len(), b[0].cus.len());
        assert_tiles(&a[0], &Area::new(0, 0, 32, 32));
    }

    #[test]
    fn parallel_split_search_is_no_worse() {
        let picture = Arc::new(random_picture(19, 64, 32));
        let slice = SliceContext::new(SliceType::I, 32);
        let sequential = encode_picture(mtt_cfg(32, 1), picture.clone(), &slice);
        let parallel = encode_picture(mtt_cfg(32, 2), picture.clone(), &slice);
        let again = encode_picture(mtt_cfg(32, 2), picture, &slice);
        for ((s, p), q) in sequential.iter().zip(&parallel).zip(&again) {
            assert!(p.cost <= s.cost);
            assert_eq!(p.cost, q.cost);
            assert_tiles(p, &p.area);
        }
    }

    /// Multi-type search without the pruning rules that read results of
    /// sibling candidates, so split jobs try what a sequential search tries.
    fn sibling_independent_cfg(num_split_threads: usize) -> EncoderConfig {
        let mut cfg = mtt_cfg(32, num_split_threads);
        // the QT-after-BT rule needs at least three MTT levels in intra slices
        cfg.partition.max_mtt_hierarchy_depth_intra_slice = 2;
        // TT admissibility reads the BT results of the same level
        cfg.partition.ternary_enabled = false;
        cfg.use_additional_speedups = false;
        cfg.use_early_cu = false;
        cfg.use_content_based_fast_qtbt = false;
        cfg.use_save_load_enc_info = false;
        cfg.use_save_load_split_decision = false;
        cfg
    }

    #[test]
    fn parallel_split_search_matches_sequential() {
        let picture = Arc::new(random_picture(31, 64, 32));
        let slice = SliceContext::new(SliceType::I, 32);
        let sequential = encode_picture(sibling_independent_cfg(1), picture.clone(), &slice);
        // two threads split the CTU root, four split its 16x16 children
        for threads in [2, 4] {
            let parallel = encode_picture(sibling_independent_cfg(threads), picture.clone(), &slice);
            for (s, p) in sequential.iter().zip(&parallel) {
                assert_eq!(p.cost, s.cost);
                assert_eq!(p.dist, s.dist);
                assert_tiles(p, &p.area);
            }
        }
    }

    /// Leaves right of `min_x` narrower than `min_width` come back unscored.
    struct LeftLeavesOnly {
        inner: BlockCostEstimator,
        min_x: usize,
        min_width: usize,
    }

    impl ModeScorer for LeftLeavesOnly {
        fn score(&self, mode: &EncTestMode, ctx: &ScoreContext) -> Result<CodingStructure, ScoreError> {
            let area = ctx.area();
            if area.x >= self.min_x && area.width < self.min_width {
                return Ok(CodingStructure::new(area, *mode));
            }
            self.inner.score(mode, ctx)
        }

        fn split_bits(&self, split: MttSplitMode, ctx: &ScoreContext) -> u64 {
            self.inner.split_bits(split, ctx)
        }
    }

    #[test]
    fn level_without_accepted_mode_fails_the_ctu() {
        let picture = Arc::new(random_picture(37, 32, 32));
        let slice = SliceContext::new(SliceType::I, 32);
        let cfg = quad_cfg(32);
        let scorer = LeftLeavesOnly {
            inner: BlockCostEstimator::new(),
            min_x: 16,
            min_width: 32,
        };
        let encoder = CuEncoder::new(scorer, &cfg).unwrap();
        let mut ctrl = EncModeCtrl::new(Arc::new(cfg)).unwrap();
        let mut coded = CodedCuMap::new(32, 32);
        let err = encoder
            .compress_ctu(&mut ctrl, &mut coded, &slice, &picture, Area::new(0, 0, 32, 32))
            .unwrap_err();
        // the top-left quadrant completes, then the first 8x8 block of the
        // next one has neither a scored leaf nor a legal split
        assert_eq!(
            err,
            EncodeError::Exhausted {
                area: Area::new(16, 0, 8, 8)
            }
        );
        assert!(ctrl.cu_ctx_list.is_empty());
        assert!(coded.neighbourhood(&Area::new(16, 0, 16, 16)).left.is_none());
    }

    #[test]
    fn rate_control_without_controller_is_rejected() {
        let picture = Arc::new(random_picture(41, 16, 16));
        let slice = SliceContext::new(SliceType::I, 32);
        let mut cfg = quad_cfg(16);
        cfg.use_rate_control = true;
        let encoder = CuEncoder::new(BlockCostEstimator::new(), &cfg).unwrap();
        let mut ctrl = EncModeCtrl::new(Arc::new(cfg)).unwrap();
        let mut coded = CodedCuMap::new(16, 16);
        let ctu_area = Area::new(0, 0, 16, 16);
        let err = encoder
            .compress_ctu(&mut ctrl, &mut coded, &slice, &picture, ctu_area)
            .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Config(ConfigError::MissingDependency {
                option: "use_rate_control",
                ..
            })
        ));
        assert!(ctrl.cu_ctx_list.is_empty());

        ctrl.set_rate_control(Some(Arc::new(FixedRateControl { qp: 30 })));
        let cs = encoder
            .compress_ctu(&mut ctrl, &mut coded, &slice, &picture, ctu_area)
            .unwrap();
        assert_tiles(&cs, &ctu_area);
    }

    #[test]
    fn scorer_failure_aborts_the_ctu() {
        // an inter slice without a reference picture
        let picture = Arc::new(random_picture(23, 16, 16));
        let slice = SliceContext::new(SliceType::P, 32);
        let cfg = quad_cfg(16);
        let encoder = CuEncoder::new(BlockCostEstimator::new(), &cfg).unwrap();
        let mut ctrl = EncModeCtrl::new(Arc::new(cfg)).unwrap();
        let mut coded = CodedCuMap::new(16, 16);
        let err = encoder
            .compress_ctu(&mut ctrl, &mut coded, &slice, &picture, Area::new(0, 0, 16, 16))
            .unwrap_err();
        assert!(matches!(err, EncodeError::Scoring { .. }));
        assert!(ctrl.cu_ctx_list.is_empty());
        assert!(ctrl.imv_ctx_list.is_empty());
    }

    #[test]
    fn inter_slice_uses_the_reference() {
        let reference = random_picture(29, 32, 32);
        let mut picture = reference.clone();
        picture.reference = Some(Arc::new(reference));
        let slice = SliceContext::new(SliceType::P, 32);
        let mut cfg = quad_cfg(32);
        cfg.use_early_skip_detection = true;
        let ctus = encode_picture(cfg, Arc::new(picture), &slice);
        // a static picture is coded as one skipped block
        assert_eq!(ctus[0].cus.len(), 1);
        assert!(ctus[0].cus[0].skip);
        assert_eq!(ctus[0].dist, 0);
    }
}
