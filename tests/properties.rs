//! Property-based tests for range planning

use orange_uploader::plan_ranges;
use proptest::prelude::*;

proptest! {
    #[test]
    fn props_ranges_cover_file_contiguously(size in 1u64..200_000, limit in 1u64..50_000) {
        let ranges = plan_ranges(size, limit).unwrap();

        prop_assert!(!ranges.is_empty());
        prop_assert_eq!(ranges[0].start, 0);
        prop_assert_eq!(ranges[ranges.len() - 1].end, size - 1);
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end + 1, pair[1].start);
        }
        for r in &ranges {
            prop_assert!(r.length >= 1 && r.length <= limit);
            prop_assert_eq!(r.length, r.end - r.start + 1);
            prop_assert_eq!(r.total_size, size);
        }
        prop_assert_eq!(ranges.iter().map(|r| r.length).sum::<u64>(), size);
        prop_assert_eq!(ranges.len() as u64, size.div_ceil(limit));
    }

    #[test]
    fn props_limit_at_or_above_size_gives_single_range(size in 1u64..100_000, extra in 0u64..100_000) {
        let ranges = plan_ranges(size, size + extra).unwrap();
        prop_assert_eq!(ranges.len(), 1);
        prop_assert_eq!(
            (ranges[0].start, ranges[0].end, ranges[0].length, ranges[0].total_size),
            (0, size - 1, size, size)
        );
    }

    #[test]
    fn props_planning_is_deterministic(size in 0u64..1_000_000, limit in 1u64..100_000) {
        prop_assert_eq!(plan_ranges(size, limit).unwrap(), plan_ranges(size, limit).unwrap());
    }
}
