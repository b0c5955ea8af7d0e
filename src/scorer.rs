use super::coding_structure::*;
use super::common::*;
use super::error::*;
use super::partitioner::*;
use super::picture::*;
use super::slice::*;
use super::test_mode::*;

/// What a scorer gets to know about the block a candidate is tried for.
#[derive(Clone, Copy)]
pub struct ScoreContext<'a> {
    pub picture: &'a Picture,
    pub slice: &'a SliceContext,
    pub level: PartLevel,
    /// Motion found for the same block geometry earlier in this CTU.
    pub mv_hint: Option<Mv>,
}

impl<'a> ScoreContext<'a> {
    pub fn area(&self) -> Area {
        self.level.area
    }
}

/// Produces fully costed candidate results: prediction, residual coding and
/// a rate estimate for one mode at one block.
///
/// Calls must be repeatable: scoring the same mode for the same context
/// twice gives the same result.
pub trait ModeScorer {
    fn score(&self, mode: &EncTestMode, ctx: &ScoreContext) -> Result<CodingStructure, ScoreError>;

    /// Signalling cost of `split` at the context's block, in 1/32768 bits.
    fn split_bits(&self, split: MttSplitMode, ctx: &ScoreContext) -> u64;
}
