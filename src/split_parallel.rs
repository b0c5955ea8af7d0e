use super::common::*;
use super::enc_mode_ctrl::*;
use super::partitioner::*;
use super::test_mode::*;

/// Job classes of a parallel split node. Job 1 runs every leaf candidate
/// plus the sentinel, each further job one split shape.
pub const MAX_SPLIT_JOBS: usize = 6;

impl EncModeCtrl {
    /// Number of job classes needed for the splits legal at the current
    /// level; each later shape in the list implies the earlier job ids.
    pub fn get_num_parallel_jobs(&self, partitioner: &Partitioner) -> usize {
        let mut num_jobs = 1;
        for (split, jobs) in [
            (MttSplitMode::SPLIT_QT, 2),
            (MttSplitMode::SPLIT_BT_VER, 3),
            (MttSplitMode::SPLIT_BT_HOR, 4),
            (MttSplitMode::SPLIT_TT_VER, 5),
            (MttSplitMode::SPLIT_TT_HOR, 6),
        ] {
            if partitioner.can_split(split) {
                num_jobs = jobs;
            }
        }
        assert!(num_jobs <= MAX_SPLIT_JOBS, "more jobs specified than allowed");
        num_jobs
    }

    /// Whether the current level should be searched by concurrent split jobs.
    pub fn is_parallel_split(&self, partitioner: &Partitioner) -> bool {
        if self.cfg.num_split_threads <= 1 || self.scheme.is_quad_only() {
            return false;
        }
        if partitioner.get_implicit_split() != MttSplitMode::SPLIT_NONE || self.split_job_id != 0 {
            return false;
        }
        let num_jobs = self.get_num_parallel_jobs(partitioner);
        let num_pxl = partitioner.curr_area().area();
        let parallel_at = if self.cfg.num_split_threads <= 3 { 1024 } else { 256 };
        let at_size = num_pxl == parallel_at || !partitioner.can_split(MttSplitMode::SPLIT_QT);
        if self.slice.is_intra() {
            num_jobs > 2 && at_size
        } else {
            num_jobs > 1 && at_size
        }
    }

    /// Whether `mode` belongs to the job this controller runs.
    pub fn parallel_job_selector(&self, mode: &EncTestMode) -> bool {
        match self.split_job_id {
            1 => !mode.is_split(),
            2 => mode.mode_type == EncTestModeType::ETM_SPLIT_QT,
            3 => mode.mode_type == EncTestModeType::ETM_SPLIT_BT_V,
            4 => mode.mode_type == EncTestModeType::ETM_SPLIT_BT_H,
            5 => mode.mode_type == EncTestModeType::ETM_SPLIT_TT_V,
            6 => mode.mode_type == EncTestModeType::ETM_SPLIT_TT_H,
            job_id => panic!("unknown split job id {}", job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enc_mode_ctrl::tests::*;
    use crate::encoder_config::*;

    fn threaded(num_split_threads: usize) -> EncoderConfig {
        let mut cfg = EncoderConfig::new();
        cfg.num_split_threads = num_split_threads;
        cfg
    }

    fn descend(partitioner: &mut Partitioner, levels: usize) {
        for _ in 0..levels {
            partitioner.push_child(MttSplitMode::SPLIT_QT, 0);
        }
    }

    #[test]
    fn job_count_follows_legal_splits() {
        let (ctrl, mut partitioner) = ctrl_for(threaded(4), SliceType::B, 128, 128);
        // every shape is legal at 32x32 in an inter slice
        descend(&mut partitioner, 2);
        assert_eq!(ctrl.get_num_parallel_jobs(&partitioner), 6);

        let (ctrl, mut partitioner) = ctrl_for(threaded(4), SliceType::I, 128, 128);
        // 64x64 intra exceeds the binary and ternary size limits
        descend(&mut partitioner, 1);
        assert_eq!(ctrl.get_num_parallel_jobs(&partitioner), 2);
    }

    #[test]
    fn parallel_nodes_depend_on_thread_count() {
        let (ctrl, mut partitioner) = ctrl_for(threaded(4), SliceType::B, 128, 128);
        assert!(!ctrl.is_parallel_split(&partitioner));
        descend(&mut partitioner, 3);
        // 16x16 with four threads
        assert!(ctrl.is_parallel_split(&partitioner));

        let (ctrl, mut partitioner) = ctrl_for(threaded(2), SliceType::B, 128, 128);
        descend(&mut partitioner, 2);
        assert!(ctrl.is_parallel_split(&partitioner));
        partitioner.push_child(MttSplitMode::SPLIT_QT, 0);
        assert!(!ctrl.is_parallel_split(&partitioner));
    }

    #[test]
    fn no_parallel_split_inside_a_job_or_single_threaded() {
        let (ctrl, mut partitioner) = ctrl_for(threaded(2), SliceType::B, 128, 128);
        descend(&mut partitioner, 2);
        let job = ctrl.fork(1);
        assert!(!job.is_parallel_split(&partitioner));

        let (ctrl, mut partitioner) = ctrl_for(threaded(1), SliceType::B, 128, 128);
        descend(&mut partitioner, 2);
        assert!(!ctrl.is_parallel_split(&partitioner));
    }

    #[test]
    fn jobs_partition_the_candidates() {
        let (ctrl, _) = ctrl_for(threaded(4), SliceType::B, 128, 128);
        let leaf = EncTestMode::new(
            EncTestModeType::ETM_MERGE_SKIP,
            PartSize::SIZE_2Nx2N,
            EncTestModeOpts::ETO_STANDARD,
            32,
            false,
        );
        let mut modes = vec![leaf, EncTestMode::sentinel()];
        for mode_type in [
            EncTestModeType::ETM_SPLIT_QT,
            EncTestModeType::ETM_SPLIT_BT_V,
            EncTestModeType::ETM_SPLIT_BT_H,
            EncTestModeType::ETM_SPLIT_TT_V,
            EncTestModeType::ETM_SPLIT_TT_H,
        ] {
            modes.push(EncTestMode::split(mode_type, 32, false));
        }
        for mode in &modes {
            let owners: Vec<usize> = (1..=MAX_SPLIT_JOBS)
                .filter(|&job_id| ctrl.fork(job_id).parallel_job_selector(mode))
                .collect();
            assert_eq!(owners.len(), 1, "{:?}", mode.mode_type);
        }
        assert!(ctrl.fork(1).parallel_job_selector(&EncTestMode::sentinel()));
    }

    #[test]
    #[should_panic]
    fn unknown_job_id_panics() {
        let (ctrl, _) = ctrl_for(threaded(4), SliceType::B, 128, 128);
        ctrl.fork(7).parallel_job_selector(&EncTestMode::sentinel());
    }
}
