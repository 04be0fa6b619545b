//! Part planning for multipart uploads.
//!
//! Pure logic for the single-request vs multipart decision and for splitting
//! a file into parts. No I/O operations.

use crate::types::PartDescriptor;

/// Most parts S3 accepts in one multipart upload.
pub const MAX_PARTS: u64 = 10_000;

/// Upload strategy based on file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Upload with one `put_object` request.
    SingleObject,
    /// Upload as a multipart session.
    Multipart,
}

/// Determine upload strategy based on file size.
///
/// The boundary is inclusive: a file of exactly `part_size` bytes is sent
/// in one request. Empty files always go through a single request.
pub fn upload_strategy(size: u64, part_size: u64) -> UploadStrategy {
    if size <= part_size {
        UploadStrategy::SingleObject
    } else {
        UploadStrategy::Multipart
    }
}

/// Number of parts for a file of `size` bytes.
///
/// Returns 0 for an empty file or a zero part size.
pub fn part_count(size: u64, part_size: u64) -> u64 {
    if part_size == 0 {
        return 0;
    }
    size.div_ceil(part_size)
}

/// Split a file into contiguous parts.
///
/// # Arguments
/// * `size` - Total file size in bytes
/// * `part_size` - Size of every part except possibly the last
///
/// # Returns
/// Descriptors numbered from 1, covering `0..size` exactly once. Empty when
/// `size` or `part_size` is zero, or when the file would need more than
/// `u32::MAX` parts; callers reject anything over [`MAX_PARTS`] first.
pub fn plan_parts(size: u64, part_size: u64) -> Vec<PartDescriptor> {
    let count: u64 = part_count(size, part_size);
    if u32::try_from(count).is_err() {
        return Vec::new();
    }
    (1..=count as u32)
        .map(|part_number| {
            let offset: u64 = u64::from(part_number - 1) * part_size;
            PartDescriptor {
                part_number,
                offset,
                length: part_size.min(size - offset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_upload_strategy() {
        assert_eq!(upload_strategy(0, 5 * MIB), UploadStrategy::SingleObject);
        assert_eq!(upload_strategy(1024, 5 * MIB), UploadStrategy::SingleObject);
        assert_eq!(upload_strategy(5 * MIB, 5 * MIB), UploadStrategy::SingleObject);
        assert_eq!(upload_strategy(5 * MIB + 1, 5 * MIB), UploadStrategy::Multipart);
    }

    #[test]
    fn test_plan_parts_exact_multiple() {
        let parts = plan_parts(300, 100);
        assert_eq!(
            parts,
            vec![
                PartDescriptor { part_number: 1, offset: 0, length: 100 },
                PartDescriptor { part_number: 2, offset: 100, length: 100 },
                PartDescriptor { part_number: 3, offset: 200, length: 100 },
            ]
        );
    }

    #[test]
    fn test_plan_parts_with_remainder() {
        let parts = plan_parts(11 * MIB, 5 * MIB);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].length, 5 * MIB);
        assert_eq!(parts[1].length, 5 * MIB);
        assert_eq!(parts[2], PartDescriptor { part_number: 3, offset: 10 * MIB, length: MIB });
    }

    #[test]
    fn test_plan_parts_contiguous_and_complete() {
        for (size, part_size) in [(1u64, 1u64), (999, 10), (1000, 10), (1001, 10), (7, 100)] {
            let parts = plan_parts(size, part_size);
            assert_eq!(parts.len() as u64, part_count(size, part_size));

            let mut expected_offset: u64 = 0;
            for (i, part) in parts.iter().enumerate() {
                assert_eq!(part.part_number as usize, i + 1);
                assert_eq!(part.offset, expected_offset);
                expected_offset += part.length;
            }
            assert_eq!(expected_offset, size);

            let remainder: u64 = size % part_size;
            let last = parts.last().unwrap();
            assert_eq!(last.length, if remainder == 0 { part_size } else { remainder });
        }
    }

    #[test]
    fn test_part_count_at_limit() {
        assert_eq!(part_count(MAX_PARTS * 1024, 1024), MAX_PARTS);
        assert_eq!(part_count(MAX_PARTS * 1024 + 1, 1024), MAX_PARTS + 1);
        assert_eq!(plan_parts(MAX_PARTS, 1).last().map(|p| p.part_number), Some(10_000));
    }

    #[test]
    fn test_plan_parts_beyond_u32_is_empty() {
        assert!(plan_parts(u64::MAX, 1).is_empty());
    }

    #[test]
    fn test_plan_parts_empty() {
        assert!(plan_parts(0, 5 * MIB).is_empty());
        assert!(plan_parts(100, 0).is_empty());
        assert_eq!(part_count(0, 100), 0);
    }
}
