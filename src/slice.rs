use super::common::*;

/// Per-slice parameters the mode search depends on.
#[derive(Clone, Copy, Debug)]
pub struct SliceContext {
    pub slice_type: SliceType,
    pub slice_qp: i32,
    pub lambda: f64,
    /// Temporal layer; deeper layers start the QT-before-BT hint at smaller sizes.
    pub depth: usize,
    /// Distance to the closest reference picture.
    pub min_picture_distance: usize,
    pub use_lic: bool,
}

impl SliceContext {
    pub fn new(slice_type: SliceType, slice_qp: i32) -> SliceContext {
        SliceContext {
            slice_type,
            slice_qp,
            lambda: lambda_from_qp(slice_qp),
            depth: 0,
            min_picture_distance: if slice_type.is_intra() { 0 } else { 1 },
            use_lic: false,
        }
    }

    pub fn is_intra(&self) -> bool {
        self.slice_type.is_intra()
    }
}

pub fn lambda_from_qp(qp: i32) -> f64 {
    let d = 6.0 * 0.954;
    (2.0f64).powf(qp as f64 / d) * 7.73
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_grows_with_qp() {
        let mut prev = 0.0;
        for qp in 0..=MAX_QP {
            let lambda = lambda_from_qp(qp);
            assert!(lambda > prev);
            prev = lambda;
        }
        assert!((lambda_from_qp(0) - 7.73).abs() < 1e-12);
    }

    #[test]
    fn intra_slice_has_no_reference_distance() {
        let s = SliceContext::new(SliceType::I, 32);
        assert!(s.is_intra());
        assert_eq!(s.min_picture_distance, 0);
        assert_eq!(SliceContext::new(SliceType::P, 32).min_picture_distance, 1);
    }
}
