use super::coding_structure::*;
use super::common::*;
use super::cu_context::*;

/// Picture-wide map of the coding units decided so far, at the minimum CU
/// granularity. Holds the blocks of finished CTUs plus those of the search
/// hypothesis currently being evaluated.
#[derive(Clone, Debug)]
pub struct CodedCuMap {
    cols: usize,
    rows: usize,
    cus: Vec<Option<CodedCu>>,
}

impl CodedCuMap {
    pub fn new(width: usize, height: usize) -> CodedCuMap {
        let cols = (width + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        let rows = (height + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        CodedCuMap {
            cols,
            rows,
            cus: vec![None; cols * rows],
        }
    }

    pub fn reset(&mut self) {
        self.cus.fill(None);
    }

    fn fill(&mut self, area: &Area, v: Option<CodedCu>) {
        let x0 = area.x >> MIN_CU_LOG2;
        let y0 = area.y >> MIN_CU_LOG2;
        let x1 = ((area.x + area.width) >> MIN_CU_LOG2).min(self.cols);
        let y1 = ((area.y + area.height) >> MIN_CU_LOG2).min(self.rows);
        for y in y0..y1 {
            for x in x0..x1 {
                self.cus[y * self.cols + x] = v;
            }
        }
    }

    pub fn store(&mut self, cs: &CodingStructure) {
        for cu in &cs.cus {
            self.fill(
                &cu.area,
                Some(CodedCu {
                    qt_depth: cu.qt_depth,
                    imv_num_cand: cu.imv_num_cand,
                }),
            );
        }
    }

    pub fn clear(&mut self, area: &Area) {
        self.fill(area, None);
    }

    pub fn get(&self, x: isize, y: isize) -> Option<CodedCu> {
        if x < 0 || y < 0 {
            return None;
        }
        let (cx, cy) = (x as usize >> MIN_CU_LOG2, y as usize >> MIN_CU_LOG2);
        if cx >= self.cols || cy >= self.rows {
            return None;
        }
        self.cus[cy * self.cols + cx]
    }

    pub fn neighbourhood(&self, area: &Area) -> CuNeighbourhood {
        let (x, y) = (area.x as isize, area.y as isize);
        let (w, h) = (area.width as isize, area.height as isize);
        CuNeighbourhood {
            left: self.get(x - 1, y),
            above: self.get(x, y - 1),
            below_left: self.get(x - 1, y + h),
            above_right: self.get(x + w, y - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mode::*;

    fn leaf(area: Area, qt_depth: usize) -> CodingStructure {
        let mut cs = CodingStructure::new(area, EncTestMode::sentinel());
        let mut cu = CodingUnit::new(area, ModeType::MODE_INTRA);
        cu.qt_depth = qt_depth;
        cu.imv_num_cand = qt_depth + 1;
        cs.cus.push(cu);
        cs
    }

    #[test]
    fn neighbours_of_a_block() {
        let mut map = CodedCuMap::new(64, 64);
        map.store(&leaf(Area::new(0, 0, 32, 32), 1));
        map.store(&leaf(Area::new(32, 0, 16, 16), 2));
        map.store(&leaf(Area::new(0, 32, 16, 16), 2));
        let n = map.neighbourhood(&Area::new(32, 16, 16, 16));
        assert_eq!(n.above.map(|c| c.qt_depth), Some(2));
        assert_eq!(n.left.map(|c| c.qt_depth), Some(1));
        assert_eq!(n.below_left, None);
        assert_eq!(n.above_right, None);
        assert_eq!(n.max_imv_cand(), 3);
        let n = map.neighbourhood(&Area::new(16, 16, 16, 16));
        assert_eq!(n.below_left.map(|c| c.qt_depth), Some(2));
        let n = map.neighbourhood(&Area::new(16, 32, 16, 16));
        assert_eq!(n.left.map(|c| c.qt_depth), Some(2));
        assert_eq!(n.above.map(|c| c.qt_depth), Some(1));
        assert_eq!(n.above_right, None);
    }

    #[test]
    fn outside_picture_and_cleared_blocks_are_absent() {
        let mut map = CodedCuMap::new(20, 20);
        map.store(&leaf(Area::new(16, 16, 8, 8), 3));
        assert!(map.get(19, 19).is_some());
        assert!(map.get(20, 0).is_none());
        assert!(map.get(-1, 4).is_none());
        map.clear(&Area::new(16, 16, 8, 8));
        assert!(map.get(19, 19).is_none());
        map.store(&leaf(Area::new(0, 0, 8, 8), 0));
        map.reset();
        assert!(map.get(0, 0).is_none());
    }
}
