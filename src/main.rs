use clap::Parser;
use colored::*;
use debug_print::*;
use modectrl::aqp::*;
use modectrl::binary_reader::BinaryReader;
use modectrl::block_cost_estimator::*;
use modectrl::coded_cu_map::*;
use modectrl::coding_structure::FRAC_BITS_SCALE;
use modectrl::common::*;
use modectrl::cu_encoder::*;
use modectrl::enc_mode_ctrl::*;
use modectrl::encoder_config::*;
use modectrl::error::*;
use modectrl::partition::*;
use modectrl::picture::Picture;
use modectrl::qp_range::*;
use modectrl::slice::*;
use std::io;
use std::process;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to input raw 4:2:0 video ("-" for stdin)
    #[clap(short, long)]
    input: String,
    /// Input video resolution (WIDTHxHEIGHT)
    #[clap(long)]
    input_size: String,
    /// Number of pictures to search
    #[clap(long)]
    num_pictures: usize,
    /// Slice quantization parameter
    #[clap(long, default_value_t = 32)]
    qp: i32,
    /// Sample bit depth of the input
    #[clap(long, default_value_t = 8)]
    bit_depth: usize,
    /// Number of concurrent split jobs
    #[clap(long, default_value_t = 1)]
    split_threads: usize,
    /// Search quad splits only, with CTUs of this size
    #[clap(long)]
    quad_only: Option<usize>,
    /// Extra parameters (PARAM1=VAL1[,PARAM2=VAL2,...])
    #[clap(long)]
    extra_params: Option<String>,
}

fn fail(what: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}: {}", "error".red(), what, e);
    process::exit(1);
}

fn build_config(args: &Args, width: usize, height: usize) -> Result<EncoderConfig, ConfigError> {
    let mut cfg = EncoderConfig::new();
    cfg.bit_depth = args.bit_depth;
    cfg.num_split_threads = args.split_threads;
    if let Some(ctu_size) = args.quad_only {
        cfg.partition = PartitionConstraints::quad_only(ctu_size, 8);
    }
    if let Some(extra_params) = &args.extra_params {
        cfg.apply_extra_params(extra_params)?;
    }
    cfg.validate()?;
    let min_cu_size = cfg.partition.min_cb_size();
    if width % min_cu_size != 0 || height % min_cu_size != 0 {
        return Err(ConfigError::PictureSize {
            width,
            height,
            min_cu_size,
        });
    }
    Ok(cfg)
}

fn main() {
    let args = Args::parse();

    let input_size = args
        .input_size
        .split('x')
        .map(|x| x.parse::<usize>())
        .collect::<Vec<Result<usize, std::num::ParseIntError>>>();
    let (width, height) = if let [Ok(width), Ok(height)] = input_size[..] {
        (width, height)
    } else {
        eprintln!("{}: Invalid input-size: {}", "error".red(), args.input_size);
        process::exit(1);
    };

    let cfg = match build_config(&args, width, height) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => fail("invalid configuration", e),
    };
    let estimator = match BlockCostEstimator::from_config(&cfg) {
        Ok(estimator) => estimator,
        Err(e) => fail("invalid configuration", e),
    };
    let encoder = match CuEncoder::new(estimator, &cfg) {
        Ok(encoder) => encoder,
        Err(e) => fail("failed to set up the search", e),
    };
    let mut ctrl = match EncModeCtrl::new(cfg.clone()) {
        Ok(ctrl) => ctrl,
        Err(e) => fail("invalid configuration", e),
    };
    if cfg.use_rate_control {
        ctrl.set_rate_control(Some(Arc::new(FixedRateControl { qp: args.qp })));
    }

    let stdin = io::stdin();
    let mut reader = if args.input == *"-" {
        BinaryReader::standard(&stdin)
    } else {
        match BinaryReader::file(args.input.clone()) {
            Ok(f) => f,
            Err(e) => fail("failed to open input file", e),
        }
    };

    let ctu_size = cfg.partition.ctu_size;
    let mut coded = CodedCuMap::new(width, height);
    let mut prev: Option<Arc<Picture>> = None;
    for picture_index in 0..args.num_pictures {
        let mut picture = match Picture::read(&mut reader, width, height, args.bit_depth) {
            Ok(picture) => picture,
            Err(e) => fail("failed to read picture", e),
        };
        picture.picture_order_count = picture_index;
        let is_intra = prev.is_none() || (cfg.intra_period > 0 && picture_index % cfg.intra_period == 0);
        let slice_type = if is_intra { SliceType::I } else { SliceType::P };
        if !is_intra {
            picture.reference = prev.take();
        }
        let picture = Arc::new(picture);

        let mut slice = SliceContext::new(slice_type, args.qp);
        slice.use_lic = cfg.use_lic && !is_intra;
        if cfg.use_adaptive_qp {
            let activity = LumaActivity::new(&picture, ctu_size, cfg.max_cu_dqp_depth + 1);
            ctrl.set_activity(Some(Arc::new(activity)));
        }

        coded.reset();
        let (mut num_cus, mut dist, mut frac_bits, mut cost) = (0, 0, 0, 0.0);
        for y in (0..height).step_by(ctu_size) {
            for x in (0..width).step_by(ctu_size) {
                let ctu_area = Area::new(x, y, ctu_size, ctu_size);
                let cs = match encoder.compress_ctu(&mut ctrl, &mut coded, &slice, &picture, ctu_area) {
                    Ok(cs) => cs,
                    Err(e) => fail("mode search failed", e),
                };
                num_cus += cs.cus.len();
                dist += cs.dist;
                frac_bits += cs.frac_bits;
                cost += cs.cost;
            }
        }
        println!(
            "picture {:>4} {:?}  cus {:>6}  dist {:>12}  bits {:>12.1}  cost {:>14.1}",
            picture_index,
            slice_type,
            num_cus,
            dist,
            frac_bits as f64 / FRAC_BITS_SCALE,
            cost
        );
        debug_eprintln!("picture {} done", picture_index);

        // the next picture predicts from the original of this one
        let mut reference = (*picture).clone();
        reference.reference = None;
        prev = Some(Arc::new(reference));
    }
}
