use super::common::*;

#[derive(Clone, Copy, Debug)]
pub struct PartitionConstraints {
    pub ctu_size: usize,
    pub log2_min_cb_size: usize,
    pub log2_diff_min_qt_min_cb_intra_slice: usize,
    pub max_mtt_hierarchy_depth_intra_slice: usize,
    pub log2_diff_max_bt_min_qt_intra_slice: usize,
    pub log2_diff_max_tt_min_qt_intra_slice: usize,
    pub log2_diff_min_qt_min_cb_inter_slice: usize,
    pub max_mtt_hierarchy_depth_inter_slice: usize,
    pub log2_diff_max_bt_min_qt_inter_slice: usize,
    pub log2_diff_max_tt_min_qt_inter_slice: usize,
    pub ternary_enabled: bool,
}

impl PartitionConstraints {
    pub fn new() -> PartitionConstraints {
        PartitionConstraints {
            ctu_size: 128,
            log2_min_cb_size: 2,
            log2_diff_min_qt_min_cb_intra_slice: 1,
            max_mtt_hierarchy_depth_intra_slice: 3,
            log2_diff_max_bt_min_qt_intra_slice: 2,
            log2_diff_max_tt_min_qt_intra_slice: 2,
            log2_diff_min_qt_min_cb_inter_slice: 1,
            max_mtt_hierarchy_depth_inter_slice: 3,
            log2_diff_max_bt_min_qt_inter_slice: 4,
            log2_diff_max_tt_min_qt_inter_slice: 3,
            ternary_enabled: true,
        }
    }

    /// Quad-tree only constraints, leaves down to `min_cb_size`.
    pub fn quad_only(ctu_size: usize, min_cb_size: usize) -> PartitionConstraints {
        PartitionConstraints {
            ctu_size,
            log2_min_cb_size: min_cb_size.ilog2() as usize,
            log2_diff_min_qt_min_cb_intra_slice: 0,
            max_mtt_hierarchy_depth_intra_slice: 0,
            log2_diff_max_bt_min_qt_intra_slice: 0,
            log2_diff_max_tt_min_qt_intra_slice: 0,
            log2_diff_min_qt_min_cb_inter_slice: 0,
            max_mtt_hierarchy_depth_inter_slice: 0,
            log2_diff_max_bt_min_qt_inter_slice: 0,
            log2_diff_max_tt_min_qt_inter_slice: 0,
            ternary_enabled: false,
        }
    }

    pub fn min_cb_size(&self) -> usize {
        1 << self.log2_min_cb_size
    }

    pub fn min_qt_size(&self, slice_type: SliceType) -> usize {
        if slice_type.is_intra() {
            1 << (self.log2_min_cb_size + self.log2_diff_min_qt_min_cb_intra_slice)
        } else {
            1 << (self.log2_min_cb_size + self.log2_diff_min_qt_min_cb_inter_slice)
        }
    }

    pub fn max_mtt_depth(&self, slice_type: SliceType) -> usize {
        if slice_type.is_intra() {
            self.max_mtt_hierarchy_depth_intra_slice
        } else {
            self.max_mtt_hierarchy_depth_inter_slice
        }
    }

    pub fn max_bt_size(&self, slice_type: SliceType) -> usize {
        let diff = if slice_type.is_intra() {
            self.log2_diff_max_bt_min_qt_intra_slice
        } else {
            self.log2_diff_max_bt_min_qt_inter_slice
        };
        (self.min_qt_size(slice_type) << diff).min(self.ctu_size)
    }

    pub fn max_tt_size(&self, slice_type: SliceType) -> usize {
        let diff = if slice_type.is_intra() {
            self.log2_diff_max_tt_min_qt_intra_slice
        } else {
            self.log2_diff_max_tt_min_qt_inter_slice
        };
        (self.min_qt_size(slice_type) << diff).min(self.ctu_size)
    }

    pub fn min_bt_size(&self) -> usize {
        self.min_cb_size()
    }

    pub fn min_tt_size(&self) -> usize {
        self.min_cb_size()
    }

    /// Depth range of the quad-tree: number of quad splits from the CTU down
    /// to the minimum quad-tree leaf.
    pub fn max_qt_depth(&self, slice_type: SliceType) -> usize {
        (self.ctu_size.ilog2() - self.min_qt_size(slice_type).ilog2()) as usize
    }

    pub fn scheme(&self) -> PartitionScheme {
        let binary = self.max_mtt_hierarchy_depth_intra_slice > 0
            || self.max_mtt_hierarchy_depth_inter_slice > 0;
        PartitionScheme {
            quad: true,
            binary,
            ternary: binary && self.ternary_enabled,
        }
    }
}

/// Which split families the tree may use. Quad-only trees carry
/// prediction-unit shapes inside leaves instead of binary/ternary splits.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PartitionScheme {
    pub quad: bool,
    pub binary: bool,
    pub ternary: bool,
}

impl PartitionScheme {
    pub fn is_multi_type(&self) -> bool {
        self.binary || self.ternary
    }

    pub fn is_quad_only(&self) -> bool {
        self.quad && !self.is_multi_type()
    }
}
