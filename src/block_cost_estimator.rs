use super::coding_structure::*;
use super::common::*;
use super::encoder_config::*;
use super::error::*;
use super::picture::*;
use super::scorer::*;
use super::slice::*;
use super::test_mode::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
enum IntraPredMode {
    PLANAR,
    DC,
    HORIZONTAL,
    VERTICAL,
    DIAGONAL,
}

fn intra_pred_mode(opts: EncTestModeOpts) -> IntraPredMode {
    if opts.has_pdpc() {
        return IntraPredMode::PLANAR;
    }
    match opts.nsst_idx() {
        1 => IntraPredMode::HORIZONTAL,
        2 => IntraPredMode::VERTICAL,
        3 => IntraPredMode::DIAGONAL,
        _ => IntraPredMode::DC,
    }
}

#[inline(always)]
fn value_bits(v: i32) -> f64 {
    let v = v.unsigned_abs();
    if v == 0 {
        0.0
    } else {
        (v.ilog2() + 1) as f64
    }
}

fn qstep(qp: i32) -> f64 {
    (2.0f64).powf((qp - 4) as f64 / 6.0)
}

/// Prediction-unit rectangles of `part_size` inside `area`.
pub fn pu_areas(area: &Area, part_size: PartSize) -> Vec<Area> {
    let Area {
        x,
        y,
        width: w,
        height: h,
    } = *area;
    match part_size {
        PartSize::SIZE_2Nx2N => vec![*area],
        PartSize::SIZE_2NxN => vec![Area::new(x, y, w, h / 2), Area::new(x, y + h / 2, w, h / 2)],
        PartSize::SIZE_Nx2N => vec![Area::new(x, y, w / 2, h), Area::new(x + w / 2, y, w / 2, h)],
        PartSize::SIZE_NxN => (0..4)
            .map(|i| Area::new(x + (i % 2) * w / 2, y + (i / 2) * h / 2, w / 2, h / 2))
            .collect(),
        PartSize::SIZE_2NxnU => vec![
            Area::new(x, y, w, h / 4),
            Area::new(x, y + h / 4, w, h * 3 / 4),
        ],
        PartSize::SIZE_2NxnD => vec![
            Area::new(x, y, w, h * 3 / 4),
            Area::new(x, y + h * 3 / 4, w, h / 4),
        ],
        PartSize::SIZE_nLx2N => vec![
            Area::new(x, y, w / 4, h),
            Area::new(x + w / 4, y, w * 3 / 4, h),
        ],
        PartSize::SIZE_nRx2N => vec![
            Area::new(x, y, w * 3 / 4, h),
            Area::new(x + w * 3 / 4, y, w / 4, h),
        ],
    }
}

struct CodedResidual {
    dist: u64,
    bits: f64,
    cbf: bool,
}

/// Rate-distortion estimate standing in for prediction, transform and
/// entropy coding: predicts from original samples, quantizes the residual
/// with a flat step and counts log2 magnitudes as bits.
#[derive(Clone, Debug)]
pub struct BlockCostEstimator {
    /// Coding unit header bits besides the mode itself.
    pub header_bits: f64,
    /// Integer motion search range in luma samples.
    pub search_range: i32,
}

impl BlockCostEstimator {
    pub fn new() -> BlockCostEstimator {
        BlockCostEstimator {
            header_bits: 1.753,
            search_range: 4,
        }
    }

    /// Picks up `header_bits` and `me_range` from the extra parameters.
    pub fn from_config(cfg: &EncoderConfig) -> Result<BlockCostEstimator, ConfigError> {
        let mut estimator = BlockCostEstimator::new();
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        if let Some(v) = cfg.extra_params.get("header_bits") {
            estimator.header_bits = v.parse::<f64>().map_err(|_| invalid("header_bits", v.as_str()))?;
        }
        if let Some(v) = cfg.extra_params.get("me_range") {
            estimator.search_range = v.parse::<i32>().map_err(|_| invalid("me_range", v.as_str()))?;
        }
        Ok(estimator)
    }

    fn code_residual(
        &self,
        picture: &Picture,
        area: &Area,
        pred: &[i32],
        qp: i32,
        lossless: bool,
    ) -> CodedResidual {
        let step = qstep(qp);
        let mut dist = 0.0;
        let mut bits = 0.0;
        let mut cbf = false;
        for y in 0..area.height {
            for x in 0..area.width {
                let org = picture.luma((area.x + x) as isize, (area.y + y) as isize);
                let res = org - pred[y * area.width + x];
                if lossless {
                    bits += value_bits(res);
                    cbf |= res != 0;
                } else {
                    let level = (res as f64 / step).round() as i32;
                    let d = res as f64 - level as f64 * step;
                    dist += d * d;
                    bits += value_bits(level);
                    cbf |= level != 0;
                }
            }
        }
        CodedResidual {
            dist: dist.round() as u64,
            bits,
            cbf,
        }
    }

    fn intra_pred(&self, picture: &Picture, area: &Area, mode: IntraPredMode) -> Vec<i32> {
        let (w, h) = (area.width, area.height);
        let mid = 1 << (picture.bit_depth - 1);
        let (x0, y0) = (area.x as isize, area.y as isize);
        let top_at = |x: usize| {
            if area.y == 0 {
                mid
            } else {
                picture.luma(x0 + x as isize, y0 - 1)
            }
        };
        let left_at = |y: usize| {
            if area.x == 0 {
                mid
            } else {
                picture.luma(x0 - 1, y0 + y as isize)
            }
        };
        let top = (0..=w).map(top_at).collect::<Vec<i32>>();
        let left = (0..=h).map(left_at).collect::<Vec<i32>>();

        let mut pred = vec![0; w * h];
        match mode {
            IntraPredMode::DC => {
                let sum: i32 = top[..w].iter().sum::<i32>() + left[..h].iter().sum::<i32>();
                let n = (w + h) as i32;
                pred.fill((sum + n / 2) / n);
            }
            IntraPredMode::PLANAR => {
                let (top_right, bottom_left) = (top[w], left[h]);
                let (wi, hi) = (w as i32, h as i32);
                for y in 0..h {
                    for x in 0..w {
                        let (xi, yi) = (x as i32, y as i32);
                        let hor = (wi - 1 - xi) * left[y] + (xi + 1) * top_right;
                        let ver = (hi - 1 - yi) * top[x] + (yi + 1) * bottom_left;
                        pred[y * w + x] = (hor * hi + ver * wi + wi * hi) / (2 * wi * hi);
                    }
                }
            }
            IntraPredMode::HORIZONTAL => {
                for y in 0..h {
                    pred[y * w..(y + 1) * w].fill(left[y]);
                }
            }
            IntraPredMode::VERTICAL => {
                for y in 0..h {
                    pred[y * w..(y + 1) * w].copy_from_slice(&top[..w]);
                }
            }
            IntraPredMode::DIAGONAL => {
                for y in 0..h {
                    for x in 0..w {
                        pred[y * w + x] = (left[y] + top[x] + 1) >> 1;
                    }
                }
            }
        }
        pred
    }

    fn sad(&self, picture: &Picture, reference: &Picture, pu: &Area, mv: Mv) -> u64 {
        let mut sad = 0;
        for y in 0..pu.height {
            for x in 0..pu.width {
                let (px, py) = ((pu.x + x) as isize, (pu.y + y) as isize);
                let org = picture.luma(px, py);
                let prd = reference.luma(px + mv.hor as isize, py + mv.ver as isize);
                sad += (org - prd).unsigned_abs() as u64;
            }
        }
        sad
    }

    fn mv_bits(&self, mv: Mv, center: Mv, step: i32) -> f64 {
        2.0 + value_bits((mv.hor - center.hor) / step) + value_bits((mv.ver - center.ver) / step)
    }

    /// Full search on a grid of `step` around `center`.
    fn motion_search(
        &self,
        picture: &Picture,
        reference: &Picture,
        pu: &Area,
        center: Mv,
        step: i32,
        lambda: f64,
    ) -> Mv {
        let sqrt_lambda = lambda.sqrt();
        let range = self.search_range.max(step) / step;
        let mut best = (f64::MAX, center);
        for dy in -range..=range {
            for dx in -range..=range {
                let mv = Mv::new(center.hor + dx * step, center.ver + dy * step);
                let cost = self.sad(picture, reference, pu, mv) as f64
                    + sqrt_lambda * self.mv_bits(mv, center, step);
                if cost < best.0 {
                    best = (cost, mv);
                }
            }
        }
        best.1
    }

    /// The cheaper of the zero vector and the cached one.
    fn merge_candidate(&self, picture: &Picture, reference: &Picture, area: &Area, hint: Option<Mv>) -> Mv {
        let zero = Mv::default();
        match hint {
            Some(mv) if self.sad(picture, reference, area, mv) < self.sad(picture, reference, area, zero) => mv,
            _ => zero,
        }
    }

    fn inter_pred(&self, reference: &Picture, area: &Area, pus: &[(Area, Mv)], lic: Option<&Picture>) -> Vec<i32> {
        let mut pred = vec![0; area.width * area.height];
        for (pu, mv) in pus {
            let mut offset = 0;
            if let Some(picture) = lic {
                let mut diff: i64 = 0;
                for y in pu.y..pu.y + pu.height {
                    for x in pu.x..pu.x + pu.width {
                        let (px, py) = (x as isize, y as isize);
                        diff += (picture.luma(px, py)
                            - reference.luma(px + mv.hor as isize, py + mv.ver as isize))
                            as i64;
                    }
                }
                let n = pu.area() as i64;
                offset = ((diff + n / 2).div_euclid(n)) as i32;
            }
            for y in 0..pu.height {
                for x in 0..pu.width {
                    let (px, py) = ((pu.x + x) as isize, (pu.y + y) as isize);
                    let v = reference.luma(px + mv.hor as isize, py + mv.ver as isize) + offset;
                    pred[(pu.y - area.y + y) * area.width + (pu.x - area.x + x)] = v;
                }
            }
        }
        pred
    }

    fn score_intra(&self, mode: &EncTestMode, ctx: &ScoreContext, cu: &mut CodingUnit) -> (u64, f64, bool) {
        let area = ctx.area();
        let pred_mode = intra_pred_mode(mode.opts);
        let pred = self.intra_pred(ctx.picture, &area, pred_mode);
        let res = self.code_residual(ctx.picture, &area, &pred, mode.qp, mode.lossless);
        cu.nsst_idx = mode.opts.nsst_idx();
        cu.pdpc = mode.opts.has_pdpc();
        let mode_bits = match pred_mode {
            IntraPredMode::PLANAR => 1.0,
            _ => 2.0 + if mode.opts.nsst_idx() > 0 { 2.0 } else { 0.0 },
        };
        (res.dist, res.bits + mode_bits, res.cbf)
    }

    fn score_inter(
        &self,
        mode: &EncTestMode,
        ctx: &ScoreContext,
        cu: &mut CodingUnit,
    ) -> Result<(u64, f64, bool), ScoreError> {
        let area = ctx.area();
        let picture = ctx.picture;
        let reference = match picture.reference.as_deref() {
            Some(reference) => reference,
            None => {
                return Err(ScoreError(format!(
                    "no reference picture for {:?} at {}x{} ({}, {})",
                    mode.mode_type, area.width, area.height, area.x, area.y
                )))
            }
        };
        let lambda = lambda_from_qp(mode.qp);
        let imv = mode.opts.imv_idx();
        let step = if imv >= 2 { 4 } else { 1 };
        let center = ctx.mv_hint.unwrap_or_default();

        let mut mode_bits = 1.0;
        let pus = match mode.mode_type {
            EncTestModeType::ETM_MERGE_SKIP | EncTestModeType::ETM_MERGE_FRUC => {
                cu.merge_flag = true;
                vec![(area, self.merge_candidate(picture, reference, &area, ctx.mv_hint))]
            }
            _ if mode.opts.has_force_merge() => {
                cu.merge_flag = true;
                pu_areas(&area, mode.part_size)
                    .iter()
                    .map(|pu| (*pu, self.merge_candidate(picture, reference, pu, ctx.mv_hint)))
                    .collect()
            }
            _ => pu_areas(&area, mode.part_size)
                .iter()
                .map(|pu| {
                    let mv = self.motion_search(picture, reference, pu, center, step, lambda);
                    mode_bits += self.mv_bits(mv, center, step);
                    (*pu, mv)
                })
                .collect(),
        };
        let lic = if mode.opts.has_lic() {
            mode_bits += 1.0;
            Some(picture)
        } else {
            None
        };
        match mode.mode_type {
            EncTestModeType::ETM_AFFINE => {
                mode_bits += 4.0;
                cu.affine = true;
            }
            EncTestModeType::ETM_MERGE_FRUC => cu.fruc_mode = 1,
            _ => {}
        }
        if imv > 0 {
            mode_bits += 1.0;
        }
        cu.inter_dir = 1;
        cu.ref_idx[0] = 0;
        cu.mv[0] = pus[0].1;
        cu.imv = imv;
        cu.lic_flag = mode.opts.has_lic();

        let pred = self.inter_pred(reference, &area, &pus, lic);
        if mode.mode_type == EncTestModeType::ETM_MERGE_SKIP {
            cu.skip = true;
            return Ok((self.ssd(picture, &area, &pred), mode_bits, false));
        }
        let res = self.code_residual(picture, &area, &pred, mode.qp, mode.lossless);
        Ok((res.dist, res.bits + mode_bits, res.cbf))
    }

    fn ssd(&self, picture: &Picture, area: &Area, pred: &[i32]) -> u64 {
        let mut ssd = 0;
        for y in 0..area.height {
            for x in 0..area.width {
                let d = picture.luma((area.x + x) as isize, (area.y + y) as isize) - pred[y * area.width + x];
                ssd += (d * d) as u64;
            }
        }
        ssd
    }
}

impl ModeScorer for BlockCostEstimator {
    fn score(&self, mode: &EncTestMode, ctx: &ScoreContext) -> Result<CodingStructure, ScoreError> {
        assert!(
            !mode.is_split() && mode.mode_type != EncTestModeType::ETM_POST_DONT_SPLIT,
            "only leaf candidates are scored, got {:?}",
            mode.mode_type
        );
        let area = ctx.area();
        let level = ctx.level;
        let pred_mode = if mode.is_inter() {
            ModeType::MODE_INTER
        } else {
            ModeType::MODE_INTRA
        };
        let mut cu = CodingUnit::new(area, pred_mode);
        cu.part_size = mode.part_size;
        cu.qp = mode.qp;
        cu.trans_quant_bypass = mode.lossless;
        cu.depth = level.depth;
        cu.qt_depth = level.qt_depth;
        cu.bt_depth = level.bt_depth;
        cu.mt_depth = level.mt_depth;

        let (dist, bits, cbf) = match mode.mode_type {
            EncTestModeType::ETM_IPCM => {
                let bits = (area.area() * ctx.picture.bit_depth * 3 / 2) as f64;
                (0, bits, false)
            }
            EncTestModeType::ETM_INTRA => self.score_intra(mode, ctx, &mut cu),
            _ if mode.is_inter() => self.score_inter(mode, ctx, &mut cu)?,
            _ => panic!("no cost model for {:?}", mode.mode_type),
        };
        cu.root_cbf = cbf;

        let mut tu = TransformUnit::new(area);
        tu.cbf[0] = cbf;
        let mut cs = CodingStructure::new(area, *mode);
        cs.cus.push(cu);
        cs.tus.push(tu);
        cs.dist = dist;
        cs.frac_bits = ((bits + self.header_bits) * FRAC_BITS_SCALE).round() as u64;
        cs.calc_cost(lambda_from_qp(mode.qp));
        Ok(cs)
    }

    fn split_bits(&self, split: MttSplitMode, _ctx: &ScoreContext) -> u64 {
        let bits = match split {
            MttSplitMode::SPLIT_NONE => 1.0,
            MttSplitMode::SPLIT_QT => 2.0,
            MttSplitMode::SPLIT_BT_HOR | MttSplitMode::SPLIT_BT_VER => 3.0,
            MttSplitMode::SPLIT_TT_HOR | MttSplitMode::SPLIT_TT_VER => 3.0,
        };
        (bits * FRAC_BITS_SCALE) as u64
    }
}
