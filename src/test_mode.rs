use super::common::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum EncTestModeType {
    ETM_MERGE_SKIP,
    ETM_INTER_ME,
    ETM_AFFINE,
    /// Decoder-side derived (template/bilateral) merge.
    ETM_MERGE_FRUC,
    ETM_INTRA,
    ETM_IPCM,
    ETM_SPLIT_QT,
    ETM_SPLIT_BT_H,
    ETM_SPLIT_BT_V,
    ETM_SPLIT_TT_H,
    ETM_SPLIT_TT_V,
    ETM_POST_DONT_SPLIT,
    ETM_TRIGGER_IMV_LIST,
    ETM_INVALID,
}

/// Secondary options of a candidate, packed as a bitset.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct EncTestModeOpts(pub u32);

impl EncTestModeOpts {
    pub const ETO_STANDARD: EncTestModeOpts = EncTestModeOpts(0);
    pub const ETO_FORCE_MERGE: EncTestModeOpts = EncTestModeOpts(1 << 0);
    pub const ETO_IMV_SHIFT: u32 = 1;
    pub const ETO_IMV: EncTestModeOpts = EncTestModeOpts(7 << Self::ETO_IMV_SHIFT);
    pub const ETO_LIC: EncTestModeOpts = EncTestModeOpts(1 << 4);
    pub const ETO_NSST_SHIFT: u32 = 5;
    pub const ETO_NSST: EncTestModeOpts = EncTestModeOpts(15 << Self::ETO_NSST_SHIFT);
    pub const ETO_PDPC: EncTestModeOpts = EncTestModeOpts(1 << 9);
    pub const ETO_INVALID: EncTestModeOpts = EncTestModeOpts(0xffff_ffff);

    pub fn imv(imv: usize) -> EncTestModeOpts {
        assert!(imv < 8);
        EncTestModeOpts((imv as u32) << Self::ETO_IMV_SHIFT)
    }

    pub fn nsst(idx: usize) -> EncTestModeOpts {
        assert!(idx < 16);
        EncTestModeOpts((idx as u32) << Self::ETO_NSST_SHIFT)
    }

    pub fn with(self, other: EncTestModeOpts) -> EncTestModeOpts {
        EncTestModeOpts(self.0 | other.0)
    }

    pub fn contains(&self, other: EncTestModeOpts) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: EncTestModeOpts) -> bool {
        self.0 & other.0 != 0
    }

    pub fn imv_idx(&self) -> usize {
        ((self.0 & Self::ETO_IMV.0) >> Self::ETO_IMV_SHIFT) as usize
    }

    pub fn nsst_idx(&self) -> usize {
        ((self.0 & Self::ETO_NSST.0) >> Self::ETO_NSST_SHIFT) as usize
    }

    pub fn has_lic(&self) -> bool {
        self.intersects(Self::ETO_LIC)
    }

    pub fn has_pdpc(&self) -> bool {
        self.intersects(Self::ETO_PDPC)
    }

    pub fn has_force_merge(&self) -> bool {
        self.intersects(Self::ETO_FORCE_MERGE)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EncTestMode {
    pub mode_type: EncTestModeType,
    pub part_size: PartSize,
    pub opts: EncTestModeOpts,
    pub qp: i32,
    pub lossless: bool,
}

impl EncTestMode {
    pub fn new(
        mode_type: EncTestModeType,
        part_size: PartSize,
        opts: EncTestModeOpts,
        qp: i32,
        lossless: bool,
    ) -> EncTestMode {
        EncTestMode {
            mode_type,
            part_size,
            opts,
            qp,
            lossless,
        }
    }

    pub fn invalid() -> EncTestMode {
        EncTestMode {
            mode_type: EncTestModeType::ETM_INVALID,
            part_size: PartSize::SIZE_2Nx2N,
            opts: EncTestModeOpts::ETO_INVALID,
            qp: -1,
            lossless: false,
        }
    }

    pub fn split(mode_type: EncTestModeType, qp: i32, lossless: bool) -> EncTestMode {
        assert!(is_mode_split_type(mode_type));
        EncTestMode::new(
            mode_type,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
            qp,
            lossless,
        )
    }

    pub fn sentinel() -> EncTestMode {
        EncTestMode::new(
            EncTestModeType::ETM_POST_DONT_SPLIT,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
            0,
            false,
        )
    }

    pub fn is_split(&self) -> bool {
        is_mode_split_type(self.mode_type)
    }

    pub fn is_no_split(&self) -> bool {
        !self.is_split() && self.mode_type != EncTestModeType::ETM_POST_DONT_SPLIT
    }

    pub fn is_inter(&self) -> bool {
        matches!(
            self.mode_type,
            EncTestModeType::ETM_INTER_ME
                | EncTestModeType::ETM_MERGE_SKIP
                | EncTestModeType::ETM_AFFINE
                | EncTestModeType::ETM_MERGE_FRUC
        )
    }

    pub fn is_intra(&self) -> bool {
        matches!(
            self.mode_type,
            EncTestModeType::ETM_INTRA | EncTestModeType::ETM_IPCM
        )
    }

    pub fn part_split(&self) -> MttSplitMode {
        match self.mode_type {
            EncTestModeType::ETM_SPLIT_QT => MttSplitMode::SPLIT_QT,
            EncTestModeType::ETM_SPLIT_BT_H => MttSplitMode::SPLIT_BT_HOR,
            EncTestModeType::ETM_SPLIT_BT_V => MttSplitMode::SPLIT_BT_VER,
            EncTestModeType::ETM_SPLIT_TT_H => MttSplitMode::SPLIT_TT_HOR,
            EncTestModeType::ETM_SPLIT_TT_V => MttSplitMode::SPLIT_TT_VER,
            _ => MttSplitMode::SPLIT_NONE,
        }
    }
}

pub fn is_mode_split_type(mode_type: EncTestModeType) -> bool {
    (mode_type as usize) >= (EncTestModeType::ETM_SPLIT_QT as usize)
        && (mode_type as usize) <= (EncTestModeType::ETM_SPLIT_TT_V as usize)
}

pub fn split_mode_type(split: MttSplitMode) -> EncTestModeType {
    match split {
        MttSplitMode::SPLIT_QT => EncTestModeType::ETM_SPLIT_QT,
        MttSplitMode::SPLIT_BT_HOR => EncTestModeType::ETM_SPLIT_BT_H,
        MttSplitMode::SPLIT_BT_VER => EncTestModeType::ETM_SPLIT_BT_V,
        MttSplitMode::SPLIT_TT_HOR => EncTestModeType::ETM_SPLIT_TT_H,
        MttSplitMode::SPLIT_TT_VER => EncTestModeType::ETM_SPLIT_TT_V,
        MttSplitMode::SPLIT_NONE => panic!("SPLIT_NONE has no test mode"),
    }
}
