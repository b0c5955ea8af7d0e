use super::common::*;
use super::test_mode::*;

#[derive(Clone, Debug)]
pub struct CodingUnit {
    pub area: Area,
    pub pred_mode: ModeType,
    pub part_size: PartSize,
    pub skip: bool,
    pub merge_flag: bool,
    pub inter_dir: usize,
    pub lic_flag: bool,
    pub imv: usize,
    pub imv_num_cand: usize,
    pub affine: bool,
    pub fruc_mode: usize,
    pub emt_flag: bool,
    pub nsst_idx: usize,
    pub pdpc: bool,
    pub root_cbf: bool,
    pub trans_quant_bypass: bool,
    pub qp: i32,
    pub depth: usize,
    pub qt_depth: usize,
    pub bt_depth: usize,
    pub mt_depth: usize,
    pub ref_idx: [i32; NUM_REF_PIC_LIST_01],
    pub mv: [Mv; NUM_REF_PIC_LIST_01],
}

impl CodingUnit {
    pub fn new(area: Area, pred_mode: ModeType) -> CodingUnit {
        CodingUnit {
            area,
            pred_mode,
            part_size: PartSize::SIZE_2Nx2N,
            skip: false,
            merge_flag: false,
            inter_dir: 0,
            lic_flag: false,
            imv: 0,
            imv_num_cand: 0,
            affine: false,
            fruc_mode: 0,
            emt_flag: false,
            nsst_idx: 0,
            pdpc: false,
            root_cbf: false,
            trans_quant_bypass: false,
            qp: 0,
            depth: 0,
            qt_depth: 0,
            bt_depth: 0,
            mt_depth: 0,
            ref_idx: [-1; NUM_REF_PIC_LIST_01],
            mv: [Mv::default(); NUM_REF_PIC_LIST_01],
        }
    }

    pub fn is_intra(&self) -> bool {
        self.pred_mode == ModeType::MODE_INTRA
    }

    pub fn is_inter(&self) -> bool {
        self.pred_mode == ModeType::MODE_INTER
    }
}

#[derive(Clone, Debug)]
pub struct TransformUnit {
    pub area: Area,
    pub cbf: [bool; 3],
    pub emt_idx: usize,
}

impl TransformUnit {
    pub fn new(area: Area) -> TransformUnit {
        TransformUnit {
            area,
            cbf: [false; 3],
            emt_idx: 0,
        }
    }

    pub fn any_cbf(&self) -> bool {
        self.cbf.iter().any(|&c| c)
    }
}

/// Summary of the candidate an aggregated result came from.
#[derive(Clone, Copy, Debug)]
pub struct CsFeatures {
    pub enc_mode: EncTestMode,
    pub dist: u64,
    pub frac_bits: u64,
    pub cost: f64,
    pub part_size: PartSize,
}

/// A scored proposal for one region: the coding units and transform units it
/// consists of plus distortion, rate and the resulting rate-distortion cost.
#[derive(Clone, Debug)]
pub struct CodingStructure {
    pub area: Area,
    pub cus: Vec<CodingUnit>,
    pub tus: Vec<TransformUnit>,
    pub dist: u64,
    pub frac_bits: u64,
    pub cost: f64,
    pub test_mode: EncTestMode,
    pub features: Option<CsFeatures>,
}

impl CodingStructure {
    pub fn new(area: Area, test_mode: EncTestMode) -> CodingStructure {
        CodingStructure {
            area,
            cus: vec![],
            tus: vec![],
            dist: 0,
            frac_bits: 0,
            cost: MAX_DOUBLE,
            test_mode,
            features: None,
        }
    }

    /// Rate-distortion cost with fractional bits in 1/32768 units.
    pub fn calc_cost(&mut self, lambda: f64) {
        self.cost = self.dist as f64 + lambda * (self.frac_bits as f64 / FRAC_BITS_SCALE);
    }

    pub fn first_cu(&self) -> Option<&CodingUnit> {
        self.cus.first()
    }

    pub fn last_cu(&self) -> Option<&CodingUnit> {
        self.cus.last()
    }

    pub fn first_tu(&self) -> Option<&TransformUnit> {
        self.tus.first()
    }

    pub fn is_valid(&self) -> bool {
        self.cost != MAX_DOUBLE && !self.cus.is_empty()
    }

    /// Appends a decided sub-region.
    pub fn add_sub(&mut self, sub: &CodingStructure) {
        self.cus.extend(sub.cus.iter().cloned());
        self.tus.extend(sub.tus.iter().cloned());
        self.dist += sub.dist;
        self.frac_bits += sub.frac_bits;
    }
}

pub const FRAC_BITS_SCALE: f64 = 32768.0;
