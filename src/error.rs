use super::common::*;
use super::test_mode::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid extra parameter `{0}` (expected KEY=VALUE)")]
    MalformedParam(String),

    #[error("unknown parameter `{0}`")]
    UnknownParam(String),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },

    #[error("`{0}` is out of range")]
    OutOfRange(&'static str),

    #[error("`{option}` requires `{requires}`")]
    MissingDependency {
        option: &'static str,
        requires: &'static str,
    },

    #[error("`{0}` cannot be combined with a multi-type tree")]
    QuadTreeOnly(&'static str),

    #[error("luma level mapping must be non-empty and sorted by luma level")]
    LumaLevelMapping,

    #[error("picture size {width}x{height} is not a multiple of the minimum CU size {min_cu_size}")]
    PictureSize {
        width: usize,
        height: usize,
        min_cu_size: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("scoring failed: {0}")]
pub struct ScoreError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("{mode:?} at {area:?}: {source}")]
    Scoring {
        area: Area,
        mode: EncTestModeType,
        #[source]
        source: ScoreError,
    },

    #[error("no mode was accepted for {area:?}")]
    Exhausted { area: Area },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start split workers: {0}")]
    Workers(String),
}
