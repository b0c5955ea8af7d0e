use super::common::*;
use super::error::*;
use super::partition::*;
use debug_print::*;
use lazy_static::lazy_static;
use std::collections::HashMap;

pub const LUMA_LEVEL_TO_DQP_LUT_MAXSIZE: usize = 1024;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum ImvMode {
    IMV_OFF,
    IMV_DEFAULT,
    IMV_4PEL,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum LumaLevelToDqpMode {
    LUMALVL_TO_DQP_DISABLED,
    LUMALVL_TO_DQP_AVG_METHOD,
    LUMALVL_TO_DQP_MAX_METHOD,
}

lazy_static! {
    /// HDR default mapping of luma level to delta QP (10-bit levels).
    static ref DEFAULT_LUMA_DQP_MAPPING: Vec<(i32, i32)> = vec![
        (0, 3),
        (301, 2),
        (367, 1),
        (434, 0),
        (501, -1),
        (567, -2),
        (634, -3),
        (701, -4),
        (767, -5),
        (834, -6),
    ];
}

#[derive(Clone, Debug)]
pub struct LumaLevelToDeltaQpMapping {
    pub mode: LumaLevelToDqpMode,
    pub max_method_weight: f64,
    /// Sparse (luma level, delta QP) pairs sorted by luma level.
    pub mapping: Vec<(i32, i32)>,
}

impl LumaLevelToDeltaQpMapping {
    pub fn new() -> LumaLevelToDeltaQpMapping {
        LumaLevelToDeltaQpMapping {
            mode: LumaLevelToDqpMode::LUMALVL_TO_DQP_DISABLED,
            max_method_weight: 1.0,
            mapping: DEFAULT_LUMA_DQP_MAPPING.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != LumaLevelToDqpMode::LUMALVL_TO_DQP_DISABLED
    }
}

/// Empirically tuned constants of the fast search heuristics.
#[derive(Clone, Copy, Debug)]
pub struct FastSearchThresholds {
    /// Number of consecutive ancestor levels with a skip best that stops
    /// further splitting.
    pub skip_streak_levels: usize,
    pub skip_depth: usize,
    pub fast_skip_depth: usize,
    pub picture_distance_th: usize,
    pub skip_hor_no_ver_qt_depth_th: usize,
    pub split_decision_cost_scale: f64,
    pub imv_4pel_cost_ratio: f64,
    pub content_th_all_intra: f64,
    pub content_th: f64,
    pub emt_fast_intra_skip_ratio: f64,
    pub quad_imv_list_capacity: usize,
}

impl FastSearchThresholds {
    pub fn new() -> FastSearchThresholds {
        FastSearchThresholds {
            skip_streak_levels: 2,
            skip_depth: 3,
            fast_skip_depth: 2,
            picture_distance_th: 1,
            skip_hor_no_ver_qt_depth_th: 2,
            split_decision_cost_scale: 1.05,
            imv_4pel_cost_ratio: 1.06,
            content_th_all_intra: 1.2,
            content_th: 1.0,
            emt_fast_intra_skip_ratio: 1.4,
            quad_imv_list_capacity: 8,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub use_rate_control: bool,
    pub use_adaptive_qp: bool,
    pub qp_adaptation_range: i32,
    pub max_delta_qp: i32,
    pub max_cu_dqp_depth: usize,
    pub use_early_skip_detection: bool,
    pub use_amp: bool,
    /// Non-square prediction units inside quad-tree leaves.
    pub use_rect_partitions: bool,
    pub imv: ImvMode,
    pub imv_4pel_fast: bool,
    pub imv_max_cand: usize,
    pub use_lic: bool,
    /// 1: illumination compensation on every shape, 2: selective.
    pub lic_mode: usize,
    pub use_affine: bool,
    pub use_fruc_merge: bool,
    pub nsst: bool,
    pub intra_pdpc: bool,
    pub planar_pdpc: bool,
    pub intra_emt: bool,
    pub fast_inter_emt: bool,
    pub use_save_load_enc_info: bool,
    pub use_save_load_split_decision: bool,
    pub num_split_threads: usize,
    pub use_fast_lctu: bool,
    pub use_content_based_fast_qtbt: bool,
    pub luma_level_to_dqp: LumaLevelToDeltaQpMapping,
    pub use_fast_skip_depth: bool,
    pub use_early_cu: bool,
    pub use_cbf_fast_mode: bool,
    pub disable_intra_in_inter_slices: bool,
    pub use_fast_delta_qp: bool,
    pub fast_delta_qp_cu_max_size: usize,
    pub transquant_bypass_enabled: bool,
    pub cu_transquant_bypass_force_value: bool,
    pub use_pcm: bool,
    pub pcm_log2_min_size: usize,
    pub pcm_log2_max_size: usize,
    pub intra_period: usize,
    pub use_additional_speedups: bool,
    pub bit_depth: usize,
    pub partition: PartitionConstraints,
    pub thresholds: FastSearchThresholds,
    pub extra_params: HashMap<String, String>,
}

impl EncoderConfig {
    pub fn new() -> EncoderConfig {
        EncoderConfig {
            use_rate_control: false,
            use_adaptive_qp: false,
            qp_adaptation_range: 6,
            max_delta_qp: 0,
            max_cu_dqp_depth: 0,
            use_early_skip_detection: false,
            use_amp: false,
            use_rect_partitions: false,
            imv: ImvMode::IMV_OFF,
            imv_4pel_fast: false,
            imv_max_cand: 2,
            use_lic: false,
            lic_mode: 1,
            use_affine: false,
            use_fruc_merge: false,
            nsst: false,
            intra_pdpc: false,
            planar_pdpc: false,
            intra_emt: false,
            fast_inter_emt: false,
            use_save_load_enc_info: false,
            use_save_load_split_decision: false,
            num_split_threads: 1,
            use_fast_lctu: false,
            use_content_based_fast_qtbt: false,
            luma_level_to_dqp: LumaLevelToDeltaQpMapping::new(),
            use_fast_skip_depth: false,
            use_early_cu: false,
            use_cbf_fast_mode: false,
            disable_intra_in_inter_slices: false,
            use_fast_delta_qp: false,
            fast_delta_qp_cu_max_size: 32,
            transquant_bypass_enabled: false,
            cu_transquant_bypass_force_value: false,
            use_pcm: false,
            pcm_log2_min_size: 3,
            pcm_log2_max_size: 5,
            intra_period: 32,
            use_additional_speedups: true,
            bit_depth: 8,
            partition: PartitionConstraints::new(),
            thresholds: FastSearchThresholds::new(),
            extra_params: hashmap![],
        }
    }

    pub fn qp_bd_offset(&self) -> i32 {
        6 * (self.bit_depth as i32 - 8)
    }

    pub fn scheme(&self) -> PartitionScheme {
        self.partition.scheme()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctu_size = self.partition.ctu_size;
        if !ctu_size.is_power_of_two() || !(16..=MAX_CU_SIZE).contains(&ctu_size) {
            return Err(ConfigError::OutOfRange("ctu_size"));
        }
        if self.partition.min_cb_size() < MIN_CU_SIZE || self.partition.min_cb_size() > ctu_size {
            return Err(ConfigError::OutOfRange("min_cb_size"));
        }
        if !(8..=16).contains(&self.bit_depth) {
            return Err(ConfigError::OutOfRange("bit_depth"));
        }
        if self.max_delta_qp < 0 || self.max_delta_qp > MAX_QP {
            return Err(ConfigError::OutOfRange("max_delta_qp"));
        }
        if self.qp_adaptation_range <= 0 {
            return Err(ConfigError::OutOfRange("qp_adaptation_range"));
        }
        if self.num_split_threads == 0 {
            return Err(ConfigError::OutOfRange("num_split_threads"));
        }
        if self.lic_mode != 1 && self.lic_mode != 2 {
            return Err(ConfigError::OutOfRange("lic_mode"));
        }
        if self.use_pcm
            && (self.pcm_log2_min_size < 3
                || self.pcm_log2_min_size > self.pcm_log2_max_size
                || (1 << self.pcm_log2_max_size) > ctu_size.min(32))
        {
            return Err(ConfigError::OutOfRange("pcm_log2_size"));
        }
        let scheme = self.scheme();
        if scheme.is_multi_type() {
            if self.use_amp {
                return Err(ConfigError::QuadTreeOnly("use_amp"));
            }
            if self.use_rect_partitions {
                return Err(ConfigError::QuadTreeOnly("use_rect_partitions"));
            }
        }
        if self.use_amp && !self.use_rect_partitions {
            return Err(ConfigError::MissingDependency {
                option: "use_amp",
                requires: "use_rect_partitions",
            });
        }
        if self.imv_4pel_fast && self.imv != ImvMode::IMV_4PEL {
            return Err(ConfigError::MissingDependency {
                option: "imv_4pel_fast",
                requires: "imv=4pel",
            });
        }
        if self.imv != ImvMode::IMV_OFF && self.imv_max_cand == 0 {
            return Err(ConfigError::OutOfRange("imv_max_cand"));
        }
        if self.use_save_load_split_decision && !self.use_save_load_enc_info {
            return Err(ConfigError::MissingDependency {
                option: "use_save_load_split_decision",
                requires: "use_save_load_enc_info",
            });
        }
        if self.fast_inter_emt && !self.intra_emt {
            return Err(ConfigError::MissingDependency {
                option: "fast_inter_emt",
                requires: "intra_emt",
            });
        }
        if self.planar_pdpc && !self.intra_pdpc {
            return Err(ConfigError::MissingDependency {
                option: "planar_pdpc",
                requires: "intra_pdpc",
            });
        }
        if self.cu_transquant_bypass_force_value && !self.transquant_bypass_enabled {
            return Err(ConfigError::MissingDependency {
                option: "cu_transquant_bypass_force_value",
                requires: "transquant_bypass_enabled",
            });
        }
        if self.luma_level_to_dqp.is_enabled() {
            let mapping = &self.luma_level_to_dqp.mapping;
            if mapping.is_empty() || mapping.windows(2).any(|w| w[0].0 >= w[1].0) {
                return Err(ConfigError::LumaLevelMapping);
            }
            if self.use_rate_control {
                return Err(ConfigError::MissingDependency {
                    option: "luma_level_to_dqp",
                    requires: "use_rate_control=0",
                });
            }
        }
        Ok(())
    }

    /// Applies `KEY=VALUE[,KEY=VALUE...]` overrides. Every pair is also kept
    /// in `extra_params`.
    pub fn apply_extra_params(&mut self, params: &str) -> Result<(), ConfigError> {
        for param in params.split(',').filter(|p| !p.is_empty()) {
            let kv = param.split('=').collect::<Vec<&str>>();
            if let [key, val] = kv[..] {
                self.set_param(key.trim(), val.trim())?;
                self.extra_params.insert(key.trim().to_string(), val.trim().to_string());
            } else {
                return Err(ConfigError::MalformedParam(param.to_string()));
            }
        }
        debug_eprintln!("extra params {:?}", self.extra_params);
        Ok(())
    }

    fn set_param(&mut self, key: &str, val: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: val.to_string(),
        };
        let flag = || match val {
            "1" | "true" | "on" => Ok(true),
            "0" | "false" | "off" => Ok(false),
            _ => Err(invalid()),
        };
        let uint = || val.parse::<usize>().map_err(|_| invalid());
        let int = || val.parse::<i32>().map_err(|_| invalid());
        let float = || val.parse::<f64>().map_err(|_| invalid());
        match key {
            "rc" => self.use_rate_control = flag()?,
            "aqp" => self.use_adaptive_qp = flag()?,
            "aqp_range" => self.qp_adaptation_range = int()?,
            "max_delta_qp" => self.max_delta_qp = int()?,
            "max_cu_dqp_depth" => self.max_cu_dqp_depth = uint()?,
            "esd" => self.use_early_skip_detection = flag()?,
            "amp" => self.use_amp = flag()?,
            "rect" => self.use_rect_partitions = flag()?,
            "imv" => {
                self.imv = match val {
                    "0" | "off" => ImvMode::IMV_OFF,
                    "1" | "default" => ImvMode::IMV_DEFAULT,
                    "2" | "4pel" => ImvMode::IMV_4PEL,
                    _ => return Err(invalid()),
                }
            }
            "imv_4pel_fast" => self.imv_4pel_fast = flag()?,
            "imv_max_cand" => self.imv_max_cand = uint()?,
            "lic" => self.use_lic = flag()?,
            "lic_mode" => self.lic_mode = uint()?,
            "affine" => self.use_affine = flag()?,
            "fruc" => self.use_fruc_merge = flag()?,
            "nsst" => self.nsst = flag()?,
            "pdpc" => self.intra_pdpc = flag()?,
            "planar_pdpc" => self.planar_pdpc = flag()?,
            "emt" => self.intra_emt = flag()?,
            "fast_inter_emt" => self.fast_inter_emt = flag()?,
            "save_load" => self.use_save_load_enc_info = flag()?,
            "save_load_split" => self.use_save_load_split_decision = flag()?,
            "split_threads" => self.num_split_threads = uint()?,
            "fast_lctu" => self.use_fast_lctu = flag()?,
            "content_fast_qtbt" => self.use_content_based_fast_qtbt = flag()?,
            "luma_dqp" => {
                self.luma_level_to_dqp.mode = match val {
                    "0" | "off" => LumaLevelToDqpMode::LUMALVL_TO_DQP_DISABLED,
                    "1" | "avg" => LumaLevelToDqpMode::LUMALVL_TO_DQP_AVG_METHOD,
                    "2" | "max" => LumaLevelToDqpMode::LUMALVL_TO_DQP_MAX_METHOD,
                    _ => return Err(invalid()),
                }
            }
            "luma_dqp_weight" => self.luma_level_to_dqp.max_method_weight = float()?,
            "fast_skip_depth" => self.use_fast_skip_depth = flag()?,
            "early_cu" => self.use_early_cu = flag()?,
            "cbf_fast" => self.use_cbf_fast_mode = flag()?,
            "no_intra_in_inter" => self.disable_intra_in_inter_slices = flag()?,
            "fast_delta_qp" => self.use_fast_delta_qp = flag()?,
            "tqb" => self.transquant_bypass_enabled = flag()?,
            "tqb_force" => self.cu_transquant_bypass_force_value = flag()?,
            "pcm" => self.use_pcm = flag()?,
            "pcm_log2_min" => self.pcm_log2_min_size = uint()?,
            "pcm_log2_max" => self.pcm_log2_max_size = uint()?,
            "intra_period" => self.intra_period = uint()?,
            "speedups" => self.use_additional_speedups = flag()?,
            "bit_depth" => self.bit_depth = uint()?,
            "ctu_size" => self.partition.ctu_size = uint()?,
            "mtt_depth" => {
                let depth = uint()?;
                self.partition.max_mtt_hierarchy_depth_intra_slice = depth;
                self.partition.max_mtt_hierarchy_depth_inter_slice = depth;
            }
            "tt" => self.partition.ternary_enabled = flag()?,
            "quad_only" => {
                if flag()? {
                    self.partition = PartitionConstraints::quad_only(
                        self.partition.ctu_size,
                        self.partition.min_cb_size().max(8),
                    );
                }
            }
            "split_cost_scale" => self.thresholds.split_decision_cost_scale = float()?,
            "skip_streak" => self.thresholds.skip_streak_levels = uint()?,
            // read by the built-in cost estimator
            "header_bits" => {
                float()?;
            }
            "me_range" => {
                uint()?;
            }
            _ => return Err(ConfigError::UnknownParam(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EncoderConfig::new().validate(), Ok(()));
    }

    #[test]
    fn extra_params_set_typed_fields() {
        let mut cfg = EncoderConfig::new();
        cfg.apply_extra_params("esd=1,imv=4pel,imv_4pel_fast=1,max_delta_qp=2")
            .unwrap();
        assert!(cfg.use_early_skip_detection);
        assert_eq!(cfg.imv, ImvMode::IMV_4PEL);
        assert!(cfg.imv_4pel_fast);
        assert_eq!(cfg.max_delta_qp, 2);
        assert_eq!(cfg.extra_params.get("imv").map(|s| s.as_str()), Some("4pel"));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn extra_params_reject_garbage() {
        let mut cfg = EncoderConfig::new();
        assert_eq!(
            cfg.apply_extra_params("esd"),
            Err(ConfigError::MalformedParam("esd".to_string()))
        );
        assert_eq!(
            cfg.apply_extra_params("warp=1"),
            Err(ConfigError::UnknownParam("warp".to_string()))
        );
        assert!(matches!(
            cfg.apply_extra_params("max_delta_qp=x"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn inconsistent_combinations_fail_fast() {
        let mut cfg = EncoderConfig::new();
        cfg.use_save_load_split_decision = true;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingDependency { .. })
        ));

        let mut cfg = EncoderConfig::new();
        cfg.use_rect_partitions = true;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::QuadTreeOnly("use_rect_partitions"))
        );
        cfg.partition = PartitionConstraints::quad_only(64, 8);
        assert_eq!(cfg.validate(), Ok(()));

        let mut cfg = EncoderConfig::new();
        cfg.imv_4pel_fast = true;
        cfg.imv = ImvMode::IMV_DEFAULT;
        assert!(cfg.validate().is_err());

        let mut cfg = EncoderConfig::new();
        cfg.num_split_threads = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::OutOfRange("num_split_threads")));
    }

    #[test]
    fn luma_mapping_must_be_sorted() {
        let mut cfg = EncoderConfig::new();
        cfg.luma_level_to_dqp.mode = LumaLevelToDqpMode::LUMALVL_TO_DQP_AVG_METHOD;
        assert_eq!(cfg.validate(), Ok(()));
        cfg.luma_level_to_dqp.mapping = vec![(100, 1), (50, 0)];
        assert_eq!(cfg.validate(), Err(ConfigError::LumaLevelMapping));
        cfg.luma_level_to_dqp.mapping.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::LumaLevelMapping));
    }
}
