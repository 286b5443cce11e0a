//! Offset assignment — collapse identical file bodies.
//!
//! Walking the ordered records, the first occurrence of each checksum
//! claims the running cursor and advances it by the file's length; every
//! later occurrence points at the first one's offset.  The resulting
//! distinct `(offset, length)` pairs tile the body region contiguously
//! from offset 0, and the final cursor is the body-region size.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::record::{Checksum, FileRecord};

/// Result of one dedup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    /// Total size of the body region (sum of lengths of unique bodies).
    pub body_size:       u64,
    /// Bytes saved: sum of lengths of records that reused an offset.
    pub duplicate_bytes: u64,
}

/// Assign `archive_offset` to every record; see the module doc.
pub fn assign_offsets(records: &mut [FileRecord]) -> DedupStats {
    let mut seen: BTreeMap<Checksum, u64> = BTreeMap::new();
    let mut offset = 0u64;
    let mut duplicate_bytes = 0u64;

    for record in records.iter_mut() {
        match seen.entry(record.checksum) {
            Entry::Vacant(slot) => {
                record.archive_offset = offset;
                slot.insert(offset);
                offset += record.size;
            }
            Entry::Occupied(slot) => {
                record.archive_offset = *slot.get();
                duplicate_bytes += record.size;
            }
        }
    }

    DedupStats {
        body_size: offset,
        duplicate_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CHECKSUM_LEN;

    fn record(name: &str, size: u64, tag: u8) -> FileRecord {
        let mut r = FileRecord::new(name.into(), size, 0);
        r.checksum = Checksum([tag; CHECKSUM_LEN]);
        r
    }

    #[test]
    fn duplicates_share_offsets() {
        let mut records = vec![
            record("a", 5, 1),
            record("b", 5, 1),
            record("c", 5, 2),
        ];
        let stats = assign_offsets(&mut records);
        assert_eq!(records[0].archive_offset, 0);
        assert_eq!(records[1].archive_offset, 0);
        assert_eq!(records[2].archive_offset, 5);
        assert_eq!(stats.body_size, 10);
        assert_eq!(stats.duplicate_bytes, 5);
    }

    #[test]
    fn offsets_tile_the_body_region() {
        let mut records = vec![
            record("a", 3, 1),
            record("b", 0, 2),
            record("c", 7, 3),
            record("d", 3, 1),
            record("e", 11, 4),
        ];
        let stats = assign_offsets(&mut records);
        // Unique bodies in order of first occurrence: 3 + 0 + 7 + 11.
        assert_eq!(
            records.iter().map(|r| r.archive_offset).collect::<Vec<_>>(),
            [0, 3, 3, 0, 10]
        );
        assert_eq!(stats.body_size, 21);
        assert_eq!(stats.duplicate_bytes, 3);
    }

    #[test]
    fn empty_input_is_empty_body() {
        let stats = assign_offsets(&mut []);
        assert_eq!(stats.body_size, 0);
        assert_eq!(stats.duplicate_bytes, 0);
    }
}
