use crate::core::error::{Result, UploadError};
use crate::core::model::ByteRange;

/// Cut points `-1, limit-1, 2*limit-1, ...` clamped to `[-1, size-1]`.
///
/// There are `ceil(size / limit) + 1` of them; each adjacent pair delimits
/// one range (`start = cut[p] + 1`, `end = cut[p + 1]`).
fn cut_points(size: i64, limit: i64) -> Vec<i64> {
    let iterations = size / limit + i64::from(size % limit != 0);
    (0..=iterations)
        .map(|p| {
            let cut = p.saturating_mul(limit).saturating_sub(1);
            cut.clamp(-1, size - 1)
        })
        .collect()
}

/// Splits `total` bytes into contiguous inclusive ranges of at most
/// `chunk_size` bytes. An empty file has no ranges.
pub fn plan_ranges(total: u64, chunk_size: u64) -> Result<Vec<ByteRange>> {
    if chunk_size == 0 {
        return Err(UploadError::InvalidArgument(
            "chunk limit must be greater than zero".to_string(),
        ));
    }
    let size = i64::try_from(total)
        .map_err(|_| UploadError::InvalidArgument(format!("file size {total} is out of range")))?;
    let limit = i64::try_from(chunk_size).unwrap_or(i64::MAX);

    let ranges = cut_points(size, limit)
        .windows(2)
        .map(|pair| {
            let start = (pair[0] + 1) as u64;
            let end = pair[1] as u64;
            ByteRange {
                start,
                end,
                length: end - start + 1,
                total_size: total,
            }
        })
        .collect();
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(ranges: &[ByteRange]) -> Vec<(u64, u64, u64)> {
        ranges.iter().map(|r| (r.start, r.end, r.length)).collect()
    }

    #[test]
    fn ten_bytes_in_fours() {
        let ranges = plan_ranges(10, 4).unwrap();
        assert_eq!(triples(&ranges), vec![(0, 3, 4), (4, 7, 4), (8, 9, 2)]);
        assert!(ranges.iter().all(|r| r.total_size == 10));
    }

    #[test]
    fn single_byte() {
        let ranges = plan_ranges(1, 1).unwrap();
        assert_eq!(
            ranges,
            vec![ByteRange { start: 0, end: 0, length: 1, total_size: 1 }]
        );
    }

    #[test]
    fn limit_at_or_above_size_gives_one_range() {
        for limit in [7, 8, 1_000] {
            let ranges = plan_ranges(7, limit).unwrap();
            assert_eq!(triples(&ranges), vec![(0, 6, 7)]);
        }
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_range() {
        let ranges = plan_ranges(12, 4).unwrap();
        assert_eq!(triples(&ranges), vec![(0, 3, 4), (4, 7, 4), (8, 11, 4)]);
    }

    #[test]
    fn empty_file_has_no_ranges() {
        assert!(plan_ranges(0, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = plan_ranges(10, 0).unwrap_err();
        assert!(matches!(err, UploadError::InvalidArgument(_)));
    }

    #[test]
    fn cut_points_start_at_minus_one() {
        assert_eq!(cut_points(10, 4), vec![-1, 3, 7, 9]);
        assert_eq!(cut_points(0, 4), vec![-1]);
    }
}
