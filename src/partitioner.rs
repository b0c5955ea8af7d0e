use super::common::*;
use super::partition::*;

#[derive(Clone, Copy, Debug)]
pub struct PartLevel {
    pub area: Area,
    pub split: MttSplitMode,
    pub parent_split: MttSplitMode,
    pub part_idx: usize,
    pub depth: usize,
    pub qt_depth: usize,
    pub bt_depth: usize,
    pub mt_depth: usize,
    pub implicit_bt_depth: usize,
}

/// Tracks the open levels of the coding tree currently being searched and
/// answers which splits are legal for the innermost one.
#[derive(Clone, Debug)]
pub struct Partitioner {
    pub constraints: PartitionConstraints,
    pub scheme: PartitionScheme,
    pub slice_type: SliceType,
    pub pic_width: usize,
    pub pic_height: usize,
    stack: Vec<PartLevel>,
}

impl Partitioner {
    pub fn new(
        constraints: &PartitionConstraints,
        slice_type: SliceType,
        pic_width: usize,
        pic_height: usize,
        ctu_area: Area,
    ) -> Partitioner {
        Partitioner {
            constraints: *constraints,
            scheme: constraints.scheme(),
            slice_type,
            pic_width,
            pic_height,
            stack: vec![PartLevel {
                area: ctu_area,
                split: MttSplitMode::SPLIT_NONE,
                parent_split: MttSplitMode::SPLIT_NONE,
                part_idx: 0,
                depth: 0,
                qt_depth: 0,
                bt_depth: 0,
                mt_depth: 0,
                implicit_bt_depth: 0,
            }],
        }
    }

    pub fn curr_level(&self) -> &PartLevel {
        match self.stack.last() {
            Some(level) => level,
            None => panic!("partitioner has no open level"),
        }
    }

    pub fn curr_area(&self) -> Area {
        self.curr_level().area
    }

    pub fn curr_depth(&self) -> usize {
        self.curr_level().depth
    }

    pub fn curr_qt_depth(&self) -> usize {
        self.curr_level().qt_depth
    }

    pub fn curr_bt_depth(&self) -> usize {
        self.curr_level().bt_depth
    }

    pub fn curr_mt_depth(&self) -> usize {
        self.curr_level().mt_depth
    }

    pub fn num_levels(&self) -> usize {
        self.stack.len()
    }

    pub fn min_qt_size(&self) -> usize {
        self.constraints.min_qt_size(self.slice_type)
    }

    pub fn max_mtt_depth(&self) -> usize {
        self.constraints.max_mtt_depth(self.slice_type)
    }

    pub fn is_inside_picture(&self, area: &Area) -> bool {
        area.x < self.pic_width && area.y < self.pic_height
    }

    fn crosses_right(&self, area: &Area) -> bool {
        area.x + area.width > self.pic_width
    }

    fn crosses_bottom(&self, area: &Area) -> bool {
        area.y + area.height > self.pic_height
    }

    pub fn can_split(&self, split: MttSplitMode) -> bool {
        let level = self.curr_level();
        let area = level.area;
        let (w, h) = (area.width, area.height);
        let max_mtt = self.max_mtt_depth() + level.implicit_bt_depth;
        match split {
            MttSplitMode::SPLIT_NONE => !self.crosses_right(&area) && !self.crosses_bottom(&area),
            MttSplitMode::SPLIT_QT => {
                self.scheme.quad && w == h && w > self.min_qt_size() && level.mt_depth == 0
            }
            MttSplitMode::SPLIT_BT_VER | MttSplitMode::SPLIT_BT_HOR => {
                let parallel_tt_split = if split == MttSplitMode::SPLIT_BT_VER {
                    MttSplitMode::SPLIT_TT_VER
                } else {
                    MttSplitMode::SPLIT_TT_HOR
                };
                let cb_size = if split == MttSplitMode::SPLIT_BT_VER { w } else { h };
                let max_bt_size = self.constraints.max_bt_size(self.slice_type);
                let crosses_right = self.crosses_right(&area);
                let crosses_bottom = self.crosses_bottom(&area);
                !(!self.scheme.binary
                    || cb_size <= self.constraints.min_bt_size()
                    || w > max_bt_size
                    || h > max_bt_size
                    || level.mt_depth >= max_mtt
                    || (split == MttSplitMode::SPLIT_BT_VER && crosses_bottom)
                    || (split == MttSplitMode::SPLIT_BT_VER && h > 64 && crosses_right)
                    || (split == MttSplitMode::SPLIT_BT_HOR && w > 64 && crosses_bottom)
                    || (crosses_right && crosses_bottom && w > self.min_qt_size())
                    || (split == MttSplitMode::SPLIT_BT_HOR && crosses_right && !crosses_bottom)
                    || (level.mt_depth > 0 && level.part_idx == 1 && level.split == parallel_tt_split)
                    || (split == MttSplitMode::SPLIT_BT_VER && w <= 64 && h > 64)
                    || (split == MttSplitMode::SPLIT_BT_HOR && w > 64 && h <= 64))
            }
            MttSplitMode::SPLIT_TT_VER | MttSplitMode::SPLIT_TT_HOR => {
                let cb_size = if split == MttSplitMode::SPLIT_TT_VER { w } else { h };
                let max_tt_size = self.constraints.max_tt_size(self.slice_type).min(64);
                self.scheme.ternary
                    && cb_size > 2 * self.constraints.min_tt_size()
                    && w <= max_tt_size
                    && h <= max_tt_size
                    && level.mt_depth < max_mtt
                    && !self.crosses_right(&area)
                    && !self.crosses_bottom(&area)
            }
        }
    }

    /// Split forced by the picture boundary, `SPLIT_NONE` when the current
    /// area lies entirely inside the picture.
    pub fn get_implicit_split(&self) -> MttSplitMode {
        let area = self.curr_area();
        let crosses_right = self.crosses_right(&area);
        let crosses_bottom = self.crosses_bottom(&area);
        if !crosses_right && !crosses_bottom {
            return MttSplitMode::SPLIT_NONE;
        }
        if self.scheme.is_quad_only() {
            return MttSplitMode::SPLIT_QT;
        }
        if crosses_bottom && !crosses_right && self.can_split(MttSplitMode::SPLIT_BT_HOR) {
            MttSplitMode::SPLIT_BT_HOR
        } else if crosses_right && !crosses_bottom && self.can_split(MttSplitMode::SPLIT_BT_VER) {
            MttSplitMode::SPLIT_BT_VER
        } else if self.can_split(MttSplitMode::SPLIT_QT) {
            MttSplitMode::SPLIT_QT
        } else if crosses_bottom {
            MttSplitMode::SPLIT_BT_HOR
        } else {
            MttSplitMode::SPLIT_BT_VER
        }
    }

    pub fn is_split_implicit(&self, split: MttSplitMode) -> bool {
        let implicit = self.get_implicit_split();
        implicit != MttSplitMode::SPLIT_NONE && implicit == split
    }

    pub fn child_areas(&self, split: MttSplitMode) -> Vec<Area> {
        let a = self.curr_area();
        match split {
            MttSplitMode::SPLIT_QT => {
                let (w, h) = (a.width / 2, a.height / 2);
                (0..4)
                    .map(|i| Area::new(a.x + (i % 2) * w, a.y + (i / 2) * h, w, h))
                    .collect()
            }
            MttSplitMode::SPLIT_BT_HOR => {
                let h = a.height / 2;
                (0..2).map(|i| Area::new(a.x, a.y + i * h, a.width, h)).collect()
            }
            MttSplitMode::SPLIT_BT_VER => {
                let w = a.width / 2;
                (0..2).map(|i| Area::new(a.x + i * w, a.y, w, a.height)).collect()
            }
            MttSplitMode::SPLIT_TT_HOR => {
                let q = a.height / 4;
                vec![
                    Area::new(a.x, a.y, a.width, q),
                    Area::new(a.x, a.y + q, a.width, 2 * q),
                    Area::new(a.x, a.y + 3 * q, a.width, q),
                ]
            }
            MttSplitMode::SPLIT_TT_VER => {
                let q = a.width / 4;
                vec![
                    Area::new(a.x, a.y, q, a.height),
                    Area::new(a.x + q, a.y, 2 * q, a.height),
                    Area::new(a.x + 3 * q, a.y, q, a.height),
                ]
            }
            MttSplitMode::SPLIT_NONE => panic!("SPLIT_NONE has no children"),
        }
    }

    /// Opens the `part_idx`-th child of `split` as the new current level.
    pub fn push_child(&mut self, split: MttSplitMode, part_idx: usize) {
        let parent = *self.curr_level();
        let implicit = self.is_split_implicit(split);
        let area = self.child_areas(split)[part_idx];
        let mut level = PartLevel {
            area,
            split,
            parent_split: parent.split,
            part_idx,
            depth: parent.depth + 1,
            qt_depth: parent.qt_depth,
            bt_depth: parent.bt_depth,
            mt_depth: parent.mt_depth,
            implicit_bt_depth: parent.implicit_bt_depth,
        };
        match split {
            MttSplitMode::SPLIT_QT => level.qt_depth += 1,
            MttSplitMode::SPLIT_BT_VER | MttSplitMode::SPLIT_BT_HOR => {
                level.bt_depth += 1;
                level.mt_depth += 1;
                if implicit {
                    level.implicit_bt_depth += 1;
                }
            }
            MttSplitMode::SPLIT_TT_VER | MttSplitMode::SPLIT_TT_HOR => {
                level.bt_depth += if part_idx == 1 { 1 } else { 2 };
                level.mt_depth += 1;
            }
            MttSplitMode::SPLIT_NONE => panic!("cannot push a child of SPLIT_NONE"),
        }
        self.stack.push(level);
    }

    pub fn pop(&mut self) {
        assert!(self.stack.len() > 1, "cannot pop the CTU level");
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtt(slice_type: SliceType, w: usize, h: usize) -> Partitioner {
        Partitioner::new(
            &PartitionConstraints::new(),
            slice_type,
            w,
            h,
            Area::new(0, 0, 128, 128),
        )
    }

    #[test]
    fn qt_not_allowed_after_mtt() {
        let mut p = mtt(SliceType::B, 256, 256);
        assert!(p.can_split(MttSplitMode::SPLIT_QT));
        assert!(p.can_split(MttSplitMode::SPLIT_BT_VER));
        p.push_child(MttSplitMode::SPLIT_QT, 3);
        assert_eq!(p.curr_area(), Area::new(64, 64, 64, 64));
        assert!(p.can_split(MttSplitMode::SPLIT_BT_VER));
        p.push_child(MttSplitMode::SPLIT_BT_VER, 0);
        assert_eq!(p.curr_mt_depth(), 1);
        assert!(!p.can_split(MttSplitMode::SPLIT_QT));
        p.pop();
        p.pop();
        assert_eq!(p.num_levels(), 1);
    }

    #[test]
    fn tall_blocks_cannot_split_vertically() {
        let mut p = mtt(SliceType::B, 256, 256);
        p.push_child(MttSplitMode::SPLIT_BT_VER, 1);
        assert_eq!(p.curr_area(), Area::new(64, 0, 64, 128));
        assert!(!p.can_split(MttSplitMode::SPLIT_BT_VER));
        assert!(p.can_split(MttSplitMode::SPLIT_BT_HOR));
        assert!(!p.can_split(MttSplitMode::SPLIT_TT_HOR));
    }

    #[test]
    fn ternary_children_depths() {
        let mut p = mtt(SliceType::B, 256, 256);
        p.push_child(MttSplitMode::SPLIT_QT, 0);
        assert!(p.can_split(MttSplitMode::SPLIT_TT_HOR));
        let areas = p.child_areas(MttSplitMode::SPLIT_TT_HOR);
        assert_eq!(areas[1], Area::new(0, 16, 64, 32));
        p.push_child(MttSplitMode::SPLIT_TT_HOR, 0);
        assert_eq!(p.curr_bt_depth(), 2);
        p.pop();
        p.push_child(MttSplitMode::SPLIT_TT_HOR, 1);
        assert_eq!(p.curr_bt_depth(), 1);
        // a binary split of the middle part parallel to the ternary split is redundant
        assert!(!p.can_split(MttSplitMode::SPLIT_BT_HOR));
        assert!(p.can_split(MttSplitMode::SPLIT_BT_VER));
    }

    #[test]
    fn implicit_split_at_boundary() {
        let p = mtt(SliceType::B, 128, 96);
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_QT);
        let mut p = mtt(SliceType::B, 256, 200);
        p.push_child(MttSplitMode::SPLIT_QT, 2);
        assert_eq!(p.curr_area(), Area::new(0, 64, 64, 64));
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_NONE);
        let p = Partitioner::new(
            &PartitionConstraints::new(),
            SliceType::B,
            256,
            96,
            Area::new(128, 64, 64, 64),
        );
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_BT_HOR);
        assert!(p.is_split_implicit(MttSplitMode::SPLIT_BT_HOR));
        assert!(!p.is_split_implicit(MttSplitMode::SPLIT_QT));
    }

    #[test]
    fn implicit_binary_splits_extend_ternary_depth() {
        let mut p = Partitioner::new(
            &PartitionConstraints::new(),
            SliceType::B,
            64,
            112,
            Area::new(0, 64, 64, 64),
        );
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_BT_HOR);
        p.push_child(MttSplitMode::SPLIT_BT_HOR, 1);
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_BT_HOR);
        p.push_child(MttSplitMode::SPLIT_BT_HOR, 0);
        assert_eq!(p.curr_area(), Area::new(0, 96, 64, 16));
        assert_eq!(p.curr_level().implicit_bt_depth, 2);
        p.push_child(MttSplitMode::SPLIT_BT_VER, 0);
        assert_eq!(p.curr_mt_depth(), p.max_mtt_depth());
        assert!(p.can_split(MttSplitMode::SPLIT_BT_VER));
        assert!(p.can_split(MttSplitMode::SPLIT_TT_VER));
        assert!(p.can_split(MttSplitMode::SPLIT_TT_HOR));

        // the same geometry without forced splits is out of depth
        let mut p = mtt(SliceType::B, 256, 256);
        p.push_child(MttSplitMode::SPLIT_QT, 0);
        p.push_child(MttSplitMode::SPLIT_BT_HOR, 0);
        p.push_child(MttSplitMode::SPLIT_BT_HOR, 0);
        p.push_child(MttSplitMode::SPLIT_BT_VER, 0);
        assert_eq!(p.curr_area(), Area::new(0, 0, 32, 16));
        assert!(!p.can_split(MttSplitMode::SPLIT_BT_VER));
        assert!(!p.can_split(MttSplitMode::SPLIT_TT_VER));
    }

    #[test]
    fn quad_only_boundary_uses_qt() {
        let p = Partitioner::new(
            &PartitionConstraints::quad_only(64, 8),
            SliceType::I,
            96,
            96,
            Area::new(64, 64, 64, 64),
        );
        assert_eq!(p.get_implicit_split(), MttSplitMode::SPLIT_QT);
        assert!(!p.can_split(MttSplitMode::SPLIT_BT_HOR));
        assert!(!p.can_split(MttSplitMode::SPLIT_TT_VER));
    }
}
