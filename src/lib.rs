#![allow(clippy::comparison_chain)]
#![allow(clippy::too_many_arguments)]
extern crate num;
#[macro_use]
extern crate num_derive;
#[macro_use]
pub mod common;
pub mod aqp;
pub mod binary_reader;
pub mod blk_info_cache;
pub mod block_cost_estimator;
pub mod coded_cu_map;
pub mod coding_structure;
pub mod cu_context;
pub mod cu_encoder;
pub mod enc_mode_ctrl;
pub mod encoder_config;
pub mod error;
pub mod mode_aggregator;
pub mod mode_filter;
pub mod mode_generator;
pub mod partition;
pub mod partitioner;
pub mod picture;
pub mod qp_range;
pub mod save_load_cache;
pub mod scorer;
pub mod size_index;
pub mod slice;
pub mod split_parallel;
pub mod test_mode;
