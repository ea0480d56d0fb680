//! Sparse chapter selection for stages that need a global impression
//!
//! Both samplers return positions into the chapter slice they are given,
//! sorted ascending and free of duplicates.

/// Size of the global sample in chunk budgets (`ChunkLimits::max_chars`).
/// Every sampled chapter gets an equal share and is cut to it. Tunable.
pub const SAMPLE_CHUNK_BUDGETS: usize = 1;

/// Characters each sampled chapter may contribute when `sampled` chapters
/// share a sample of `SAMPLE_CHUNK_BUDGETS` chunks of `max_chars`
pub fn sample_share(max_chars: usize, sampled: usize) -> usize {
    (max_chars.saturating_mul(SAMPLE_CHUNK_BUDGETS) / sampled.max(1)).max(1)
}

/// Head + stride + tail sample: position 0, every `⌊n/10⌋`-th position
/// (stride at least 1), and the last position.
pub fn global_sample_positions(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let stride = (n / 10).max(1);
    let mut positions: Vec<usize> = (0..n).step_by(stride).collect();
    positions.push(n - 1);
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Key chapters: the first three, every `⌊n/5⌋`-th (stride at least 1), and
/// the last three.
pub fn key_chapter_positions(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let stride = (n / 5).max(1);
    let mut positions: Vec<usize> = (0..n.min(3)).collect();
    positions.extend((0..n).step_by(stride));
    positions.extend(n.saturating_sub(3)..n);
    positions.sort_unstable();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(positions: &[usize], n: usize) {
        assert!(!positions.is_empty());
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "sorted+unique: {:?}", positions);
        assert_eq!(positions[0], 0);
        assert_eq!(*positions.last().unwrap(), n - 1);
        assert!(positions.iter().all(|p| *p < n));
    }

    #[test]
    fn global_sample_is_well_formed_for_all_sizes() {
        for n in 1..=250 {
            assert_well_formed(&global_sample_positions(n), n);
        }
        assert!(global_sample_positions(0).is_empty());
    }

    #[test]
    fn global_sample_strides_by_tenth() {
        assert_eq!(
            global_sample_positions(25),
            vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24]
        );
        assert_eq!(global_sample_positions(100).len(), 11);
        assert_eq!(
            global_sample_positions(101),
            (0..=100).step_by(10).collect::<Vec<usize>>()
        );
    }

    #[test]
    fn small_books_sample_every_chapter() {
        assert_eq!(global_sample_positions(3), vec![0, 1, 2]);
        assert_eq!(global_sample_positions(1), vec![0]);
    }

    #[test]
    fn key_chapters_include_head_stride_tail() {
        assert_eq!(key_chapter_positions(20), vec![0, 1, 2, 4, 8, 12, 16, 17, 18, 19]);
        for n in 1..=120 {
            assert_well_formed(&key_chapter_positions(n), n);
        }
    }

    #[test]
    fn key_chapters_for_tiny_books() {
        assert_eq!(key_chapter_positions(2), vec![0, 1]);
        assert_eq!(key_chapter_positions(0), Vec::<usize>::new());
    }

    #[test]
    fn sample_share_splits_the_budget() {
        assert_eq!(sample_share(1000, 4), 250 * SAMPLE_CHUNK_BUDGETS);
        assert_eq!(sample_share(3, 10), 1);
        assert_eq!(sample_share(100, 0), 100 * SAMPLE_CHUNK_BUDGETS);
    }
}
