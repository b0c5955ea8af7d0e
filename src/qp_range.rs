use super::aqp::*;
use super::common::*;
use super::encoder_config::*;
use super::error::*;
use super::picture::*;
use debug_print::*;
use std::sync::Arc;

/// Source of the QP imposed by rate control.
pub trait RateControl {
    fn rc_qp(&self) -> i32;
}

pub struct FixedRateControl {
    pub qp: i32,
}

impl RateControl for FixedRateControl {
    fn rc_qp(&self) -> i32 {
        self.qp
    }
}

/// Fully populated luma level to delta QP table.
#[derive(Clone, Debug)]
pub struct LumaDqpLut {
    table: Vec<i32>,
}

impl LumaDqpLut {
    pub fn new(mapping: &LumaLevelToDeltaQpMapping) -> LumaDqpLut {
        let mut table = vec![0; LUMA_LEVEL_TO_DQP_LUT_MAXSIZE];
        if mapping.is_enabled() {
            let mut last = 0;
            let mut next = 0;
            for (index, entry) in table.iter_mut().enumerate() {
                while next < mapping.mapping.len() && index as i32 >= mapping.mapping[next].0 {
                    last = mapping.mapping[next].1;
                    next += 1;
                }
                *entry = last;
            }
        }
        LumaDqpLut { table }
    }

    pub fn get(&self, luma_level: usize) -> i32 {
        self.table[luma_level.min(LUMA_LEVEL_TO_DQP_LUT_MAXSIZE - 1)]
    }

    pub fn calculate_luma_dqp(
        &self,
        mapping: &LumaLevelToDeltaQpMapping,
        picture: &Picture,
        area: &Area,
    ) -> i32 {
        let rows = area.y..area.y + area.height;
        let level = match mapping.mode {
            LumaLevelToDqpMode::LUMALVL_TO_DQP_MAX_METHOD => {
                let max_val = rows
                    .flat_map(|y| picture.pixels[0][y][area.x..area.x + area.width].iter())
                    .copied()
                    .max()
                    .unwrap_or(0);
                max_val as f64 * mapping.max_method_weight
            }
            _ => {
                let sum = rows
                    .flat_map(|y| picture.pixels[0][y][area.x..area.x + area.width].iter())
                    .map(|&v| v as u64)
                    .sum::<u64>();
                sum as f64 / area.area().max(1) as f64
            }
        };
        let idx = clip3(0, LUMA_LEVEL_TO_DQP_LUT_MAXSIZE as i64 - 1, (level + 0.5) as i64);
        self.table[idx as usize]
    }
}

/// Derives the admissible QP range of a region.
#[derive(Clone)]
pub struct QpRangeDeriver {
    cfg: Arc<EncoderConfig>,
    rate_ctrl: Option<Arc<dyn RateControl + Send + Sync>>,
    activity: Option<Arc<dyn ActivityProvider + Send + Sync>>,
    lut: Arc<LumaDqpLut>,
    /// Computed at the shallowest delta-QP depth and kept for the rest of the CTU.
    pub luma_qp_offset: i32,
}

impl QpRangeDeriver {
    pub fn new(cfg: Arc<EncoderConfig>) -> QpRangeDeriver {
        let lut = Arc::new(LumaDqpLut::new(&cfg.luma_level_to_dqp));
        QpRangeDeriver {
            cfg,
            rate_ctrl: None,
            activity: None,
            lut,
            luma_qp_offset: 0,
        }
    }

    pub fn set_rate_control(&mut self, rate_ctrl: Option<Arc<dyn RateControl + Send + Sync>>) {
        self.rate_ctrl = rate_ctrl;
    }

    pub fn set_activity(&mut self, activity: Option<Arc<dyn ActivityProvider + Send + Sync>>) {
        self.activity = activity;
    }

    /// Fails when rate control is on but nothing supplies its QP.
    pub fn check_ready(&self) -> Result<(), ConfigError> {
        if self.cfg.use_rate_control && self.rate_ctrl.is_none() {
            return Err(ConfigError::MissingDependency {
                option: "use_rate_control",
                requires: "a rate controller",
            });
        }
        Ok(())
    }

    fn clip_qp(&self, qp: i32) -> i32 {
        clip3(-self.cfg.qp_bd_offset(), MAX_QP, qp)
    }

    pub fn get_min_max_qp(
        &self,
        base_qp: i32,
        curr_qp: i32,
        depth: usize,
        split_mode: bool,
    ) -> (i32, i32) {
        if self.cfg.use_rate_control {
            let qp = match &self.rate_ctrl {
                Some(rc) => rc.rc_qp(),
                None => panic!("rate control enabled without a rate controller; see check_ready"),
            };
            return (qp, qp);
        }

        let max_cu_dqp_depth = self.cfg.max_cu_dqp_depth;
        let delta_qp = self.cfg.max_delta_qp;
        let (mut min_qp, mut max_qp) = if (!split_mode && depth <= max_cu_dqp_depth)
            || (split_mode && depth == max_cu_dqp_depth)
        {
            (
                self.clip_qp(base_qp - delta_qp),
                self.clip_qp(base_qp + delta_qp),
            )
        } else if split_mode && depth < max_cu_dqp_depth {
            (base_qp, base_qp)
        } else {
            (curr_qp, curr_qp)
        };

        if self.cfg.luma_level_to_dqp.is_enabled() {
            min_qp = self.clip_qp(base_qp - self.luma_qp_offset);
            max_qp = min_qp;
        }
        (min_qp, max_qp)
    }

    /// Applies the activity-based delta QP when adaptive QP is on.
    pub fn adaptive_base_qp(&self, base_qp: i32, area: &Area, depth: usize) -> i32 {
        if !self.cfg.use_adaptive_qp {
            return base_qp;
        }
        match &self.activity {
            Some(activity) => {
                let (avg_act, cu_act) = activity.activity(area, depth);
                self.clip_qp(base_qp + compute_dqp(avg_act, cu_act, self.cfg.qp_adaptation_range))
            }
            None => base_qp,
        }
    }

    pub fn update_luma_qp_offset(&mut self, picture: &Picture, area: &Area, depth: usize) {
        if self.cfg.luma_level_to_dqp.is_enabled() && depth <= self.cfg.max_cu_dqp_depth {
            let clipped = picture.clip_area(area);
            self.luma_qp_offset =
                self.lut
                    .calculate_luma_dqp(&self.cfg.luma_level_to_dqp, picture, &clipped);
            debug_eprintln!(
                "luma qp offset {} at ({}, {})",
                self.luma_qp_offset,
                area.x,
                area.y
            );
        }
    }
}
