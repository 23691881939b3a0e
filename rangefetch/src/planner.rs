//! Chunk planning for byte-range requests.
//!
//! Maps an arbitrary `[offset, offset + length)` request onto the fixed-size
//! chunk layout of an object:
//!
//! ```text
//!  object:  |----chunk 0----|----chunk 1----|----chunk 2----|--3--|
//!  request:            [=========================)
//!  plan:            (0, 10..16) (1, 0..16)   (2, 0..3)
//! ```
//!
//! The ranges of a plan are ordered by chunk index, never overlap, and their
//! concatenation is exactly the requested byte window.

use serde::Serialize;

/// The part of one chunk needed to satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    /// Chunk index within the object.
    pub index: u64,
    /// Start offset within the chunk (inclusive).
    pub start: u64,
    /// End offset within the chunk (exclusive).
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes taken from this chunk.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Object offset of the first byte of this range.
    pub fn object_offset(&self, chunk_size: u64) -> u64 {
        self.index * chunk_size + self.start
    }
}

/// Ordered chunk ranges covering a byte window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    offset: u64,
    length: u64,
    chunk_size: u64,
    ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    /// Object offset the plan starts at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Nominal chunk size the plan was computed for.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// The planned ranges in ascending chunk order.
    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    /// Number of chunks touched.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns true if the plan touches no chunks.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total bytes delivered by the plan.
    pub fn total_len(&self) -> u64 {
        self.ranges.iter().map(ChunkRange::len).sum()
    }

    /// Returns true if the plan delivers exactly the requested window.
    pub fn is_complete(&self) -> bool {
        !self.ranges.is_empty() && self.total_len() == self.length
    }
}

/// Compute the chunk ranges needed to read `[offset, offset + length)`.
///
/// For each chunk `i` from `offset / chunk_size` through
/// `(offset + length - 1) / chunk_size`, the range starts at
/// `max(0, offset - i * chunk_size)` and ends at
/// `min(chunk_size, offset + length - i * chunk_size)`. Because the request
/// never extends past the object, the final range of a short last chunk is
/// bounded by the object's true remaining length.
///
/// Returns an empty plan when `length` or `chunk_size` is zero, or when the
/// window reaches past `chunk_count` chunks.
pub fn plan(offset: u64, length: u64, chunk_size: u64, chunk_count: u64) -> ChunkPlan {
    let mut result = ChunkPlan {
        offset,
        length,
        chunk_size,
        ranges: Vec::new(),
    };

    if length == 0 || chunk_size == 0 {
        return result;
    }

    let Some(end) = offset.checked_add(length) else {
        return result;
    };
    let first_chunk = offset / chunk_size;
    let last_chunk = (end - 1) / chunk_size;
    if last_chunk >= chunk_count {
        return result;
    }

    result.ranges = (first_chunk..=last_chunk)
        .map(|index| {
            let chunk_start = index * chunk_size;
            ChunkRange {
                index,
                start: offset.saturating_sub(chunk_start),
                end: chunk_size.min(end - chunk_start),
            }
        })
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectMetadata;

    #[test]
    fn test_single_chunk_request() {
        let p = plan(3, 4, 10, 5);
        assert_eq!(
            p.ranges(),
            &[ChunkRange {
                index: 0,
                start: 3,
                end: 7
            }]
        );
        assert_eq!(p.total_len(), 4);
    }

    #[test]
    fn test_request_inside_later_chunk() {
        let p = plan(25, 3, 10, 5);
        assert_eq!(
            p.ranges(),
            &[ChunkRange {
                index: 2,
                start: 5,
                end: 8
            }]
        );
    }

    #[test]
    fn test_tail_and_head_of_adjacent_chunks() {
        let p = plan(8, 4, 10, 5);
        assert_eq!(
            p.ranges(),
            &[
                ChunkRange {
                    index: 0,
                    start: 8,
                    end: 10
                },
                ChunkRange {
                    index: 1,
                    start: 0,
                    end: 2
                },
            ]
        );
    }

    #[test]
    fn test_exact_chunk_boundaries() {
        let p = plan(10, 20, 10, 5);
        assert_eq!(p.len(), 2);
        assert_eq!(p.ranges()[0], ChunkRange { index: 1, start: 0, end: 10 });
        assert_eq!(p.ranges()[1], ChunkRange { index: 2, start: 0, end: 10 });
    }

    #[test]
    fn test_short_last_chunk() {
        // 25-byte object in 10-byte chunks; chunk 2 holds 5 bytes.
        let meta = ObjectMetadata::new("a", 25, 10);
        let p = plan(15, 10, meta.chunk_size, meta.chunk_count);

        assert_eq!(p.ranges()[1], ChunkRange { index: 2, start: 0, end: 5 });
        assert!(p.ranges()[1].end <= meta.chunk_len(2));
        assert!(p.is_complete());
    }

    #[test]
    fn test_whole_object() {
        let p = plan(0, 25, 10, 3);
        assert_eq!(p.len(), 3);
        assert_eq!(p.total_len(), 25);
        assert_eq!(p.ranges()[0].object_offset(10), 0);
        assert_eq!(p.ranges()[2].object_offset(10), 20);
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_plan() {
        assert!(plan(0, 0, 10, 3).is_empty());
        assert!(plan(0, 5, 0, 3).is_empty());
        assert!(plan(20, 20, 10, 3).is_empty());
        assert!(plan(u64::MAX, 2, 10, 3).is_empty());
        assert!(!plan(0, 0, 10, 3).is_complete());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn object_and_window() -> impl Strategy<Value = (u64, u64, u64, u64)> {
            (1u64..5_000, 1u64..700)
                .prop_flat_map(|(size, chunk_size)| {
                    (Just(size), Just(chunk_size), 0..size)
                })
                .prop_flat_map(|(size, chunk_size, offset)| {
                    (Just(size), Just(chunk_size), Just(offset), 1..=size - offset)
                })
        }

        proptest! {
            #[test]
            fn test_plan_reconstructs_window((size, chunk_size, offset, length) in object_and_window()) {
                let meta = ObjectMetadata::new("p", size, chunk_size);
                let p = plan(offset, length, chunk_size, meta.chunk_count);

                prop_assert!(p.is_complete());

                let mut cursor = offset;
                for range in p.ranges() {
                    prop_assert!(!range.is_empty());
                    prop_assert_eq!(range.object_offset(chunk_size), cursor, "gap or overlap at {:?}", range);
                    prop_assert!(range.end <= meta.chunk_len(range.index));
                    cursor += range.len();
                }
                prop_assert_eq!(cursor, offset + length);
            }

            #[test]
            fn test_plan_indices_strictly_increase((size, chunk_size, offset, length) in object_and_window()) {
                let meta = ObjectMetadata::new("p", size, chunk_size);
                let p = plan(offset, length, chunk_size, meta.chunk_count);

                for pair in p.ranges().windows(2) {
                    prop_assert_eq!(pair[0].index + 1, pair[1].index);
                    prop_assert_eq!(pair[0].end, chunk_size);
                    prop_assert_eq!(pair[1].start, 0);
                }

                let boundaries_crossed = (offset + length - 1) / chunk_size - offset / chunk_size;
                prop_assert_eq!(p.len() as u64, boundaries_crossed + 1);
            }
        }
    }
}
