#![allow(non_camel_case_types, non_snake_case)]
use std::ops::{Index, IndexMut};

#[macro_export]
macro_rules! hashmap {
    () => { std::collections::HashMap::new() };
    ($( $key: expr => $val: expr ),*) => {{
         let mut map = ::std::collections::HashMap::new();
         $( map.insert($key, $val); )*
         map
    }};
}

pub const MAX_QP: i32 = 63;
pub const MIN_CU_LOG2: usize = 2;
pub const MIN_CU_SIZE: usize = 1 << MIN_CU_LOG2;
pub const MAX_CU_SIZE: usize = 128;
pub const MAX_STORED_CU_INFO_REFS: usize = 4;
pub const NUM_REF_PIC_LIST_01: usize = 2;
pub const MAX_DOUBLE: f64 = f64::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum MttSplitMode {
    SPLIT_NONE,
    SPLIT_BT_VER,
    SPLIT_BT_HOR,
    SPLIT_TT_VER,
    SPLIT_TT_HOR,
    SPLIT_QT,
}

impl MttSplitMode {
    pub fn is_ver(&self) -> bool {
        self == &Self::SPLIT_BT_VER || self == &Self::SPLIT_TT_VER
    }

    pub fn is_hor(&self) -> bool {
        self == &Self::SPLIT_BT_HOR || self == &Self::SPLIT_TT_HOR
    }

    pub fn is_bt(&self) -> bool {
        self == &Self::SPLIT_BT_VER || self == &Self::SPLIT_BT_HOR
    }

    pub fn is_tt(&self) -> bool {
        self == &Self::SPLIT_TT_VER || self == &Self::SPLIT_TT_HOR
    }

    pub fn num_parts(&self) -> usize {
        match self {
            Self::SPLIT_NONE => 1,
            Self::SPLIT_BT_VER | Self::SPLIT_BT_HOR => 2,
            Self::SPLIT_TT_VER | Self::SPLIT_TT_HOR => 3,
            Self::SPLIT_QT => 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum ModeType {
    MODE_INTRA = 0,
    MODE_INTER = 3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum SliceType {
    B = 0,
    P = 1,
    I = 2,
}

impl SliceType {
    pub fn is_intra(&self) -> bool {
        self == &SliceType::I
    }
}

/// Prediction-unit shape inside a leaf coding unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum PartSize {
    SIZE_2Nx2N = 0,
    SIZE_2NxN = 1,
    SIZE_Nx2N = 2,
    SIZE_NxN = 3,
    SIZE_2NxnU = 4,
    SIZE_2NxnD = 5,
    SIZE_nLx2N = 6,
    SIZE_nRx2N = 7,
}

impl PartSize {
    pub fn is_amp(&self) -> bool {
        matches!(
            self,
            PartSize::SIZE_2NxnU | PartSize::SIZE_2NxnD | PartSize::SIZE_nLx2N | PartSize::SIZE_nRx2N
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub struct Area {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Area {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Area {
        Area {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn contains_area(&self, other: &Area) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Mv {
    pub hor: i32,
    pub ver: i32,
}

impl Mv {
    pub fn new(hor: i32, ver: i32) -> Mv {
        Mv { hor, ver }
    }
}

#[inline(always)]
pub fn clip3<T: PartialOrd>(min: T, max: T, v: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

#[derive(Clone, Debug)]
pub struct Vec2d<T> {
    pub data: Vec<T>,
    pub height: usize,
    pub width: usize,
    pub log2_stride: usize,
}

impl<T: Copy> Vec2d<T> {
    #[inline(always)]
    pub fn new(v: T, height: usize, width: usize) -> Vec2d<T> {
        let log2_stride = (width * 2 - 1).ilog2() as usize;
        Vec2d {
            data: vec![v; height << log2_stride],
            height,
            width,
            log2_stride,
        }
    }

    #[inline(always)]
    pub fn fill(&mut self, v: T) {
        self.data.fill(v);
    }
}

impl<T> Index<usize> for Vec2d<T> {
    type Output = [T];
    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        let offset = index << self.log2_stride;
        &self.data[offset..offset + self.width]
    }
}

impl<T> IndexMut<usize> for Vec2d<T> {
    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut [T] {
        let offset = index << self.log2_stride;
        &mut self.data[offset..offset + self.width]
    }
}

#[macro_export]
macro_rules! vec2d {
    ($elem:expr; $h:expr; $w:expr) => {
        Vec2d::new($elem, $h, $w)
    };
}
