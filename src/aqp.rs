use super::common::*;
use super::picture::*;

/// Spatial activity statistics of the picture being coded.
pub trait ActivityProvider {
    /// Average activity of the layer at `depth` and the activity of the block
    /// holding the top-left sample of `area`.
    fn activity(&self, area: &Area, depth: usize) -> (f64, f64);
}

/// Delta QP that moves a block's QP towards its relative activity.
pub fn compute_dqp(avg_act: f64, cu_act: f64, qp_adaptation_range: i32) -> i32 {
    let max_q_scale = (2.0f64).powf(qp_adaptation_range as f64 / 6.0);
    let norm_act = (max_q_scale * cu_act + avg_act) / (cu_act + max_q_scale * avg_act);
    (norm_act.log2() * 6.0 + 0.49999).floor() as i32
}

#[derive(Clone, Debug)]
struct AqLayer {
    block_size: usize,
    cols: usize,
    activity: Vec<f64>,
    avg_activity: f64,
}

/// Luma variance based activity, one layer per depth starting at the CTU size.
#[derive(Clone, Debug)]
pub struct LumaActivity {
    layers: Vec<AqLayer>,
}

impl LumaActivity {
    pub fn new(picture: &Picture, ctu_size: usize, num_layers: usize) -> LumaActivity {
        assert!(num_layers > 0);
        let layers = (0..num_layers)
            .map(|d| {
                let block_size = (ctu_size >> d).max(8);
                let cols = (picture.width + block_size - 1) / block_size;
                let rows = (picture.height + block_size - 1) / block_size;
                let mut activity = Vec::with_capacity(cols * rows);
                for by in 0..rows {
                    for bx in 0..cols {
                        let area = picture.clip_area(&Area::new(
                            bx * block_size,
                            by * block_size,
                            block_size,
                            block_size,
                        ));
                        activity.push(1.0 + block_variance(picture, &area));
                    }
                }
                let avg_activity = activity.iter().sum::<f64>() / activity.len() as f64;
                AqLayer {
                    block_size,
                    cols,
                    activity,
                    avg_activity,
                }
            })
            .collect();
        LumaActivity { layers }
    }
}

impl ActivityProvider for LumaActivity {
    fn activity(&self, area: &Area, depth: usize) -> (f64, f64) {
        let layer = &self.layers[depth.min(self.layers.len() - 1)];
        let idx = (area.y / layer.block_size) * layer.cols + area.x / layer.block_size;
        (layer.avg_activity, layer.activity[idx])
    }
}

fn block_variance(picture: &Picture, area: &Area) -> f64 {
    let n = area.area() as f64;
    let (mut sum, mut sum2) = (0.0, 0.0);
    for y in area.y..area.y + area.height {
        for &v in &picture.pixels[0][y][area.x..area.x + area.width] {
            let v = v as f64;
            sum += v;
            sum2 += v * v;
        }
    }
    let mean = sum / n;
    sum2 / n - mean * mean
}
