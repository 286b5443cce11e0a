//! Similarity ordering — a greedy nearest-neighbor pass over the records.
//!
//! Files with similar TLSH digests are pulled next to each other so a
//! downstream solid compressor can exploit cross-file redundancy; the
//! underlying objective is Travelling-Salesman-shaped and a heuristic
//! suffices.  From each position `c` the remaining records are scanned for
//! the best byte-agreement score against `records[c]`, stopping early at
//! the first candidate that is similar enough; the winner is swapped into
//! position `c + 1`.
//!
//! Ties break toward the first index scanned, which keeps archive creation
//! deterministic.  Records with the all-zero digest (small files) tie with
//! each other and end up clustered.  Single-threaded, O(N² · D).

use std::time::Instant;

use crate::record::FileRecord;

/// Scores above this end the candidate scan immediately; the match is good
/// enough that inspecting the rest of the list is not worth the time.
pub const SIMILAR_ENOUGH_SCORE: u32 = 130;

/// Permute `records` so that similar files are adjacent.
pub fn order_by_similarity(records: &mut [FileRecord], verbose: bool) {
    let n = records.len();
    if n < 2 {
        return;
    }

    let started = Instant::now();

    for c in 0..n - 1 {
        if verbose && c % 1024 == 0 {
            let elapsed = started.elapsed().as_secs();
            eprint!(
                "\x1b[2K\rOrdering files {c}/{n}, {} files/s...",
                c as u64 / (elapsed + 1)
            );
        }

        // Zero-initialized argmax: with no positive score the position is
        // swapped with itself.
        let mut best = c + 1;
        let mut best_score = 0u32;
        for i in c + 1..n {
            let score = records[c].digest.agreement(&records[i].digest);
            if best_score < score {
                best_score = score;
                best = i;
                if score > SIMILAR_ENOUGH_SCORE {
                    break;
                }
            }
        }
        records.swap(c + 1, best);
    }

    if verbose {
        eprintln!(
            "\x1b[2K\rOrdered {n} files in {}s",
            started.elapsed().as_secs()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{SimilarityDigest, TLSH_DIGEST_LEN};

    /// A digest agreeing with the all-`b'R'` reference in exactly `score`
    /// positions.
    fn digest_with_agreement(score: usize) -> SimilarityDigest {
        let mut d = [b'R'; TLSH_DIGEST_LEN];
        for slot in d.iter_mut().take(TLSH_DIGEST_LEN - score) {
            *slot = b'x';
        }
        SimilarityDigest(d)
    }

    fn record(name: &str, digest: SimilarityDigest) -> FileRecord {
        let mut r = FileRecord::new(name.into(), 1000, 0);
        r.digest = digest;
        r
    }

    #[test]
    fn early_exit_keeps_first_good_enough_candidate() {
        // Candidate scores against the reference: 135, 131, 10, 5.  The
        // first one already exceeds the threshold, so it must stay at
        // position 1 even though a scan of the rest could not beat it
        // anyway — and even if it could, the scan never happens.
        let reference = SimilarityDigest([b'R'; TLSH_DIGEST_LEN]);
        let mut records = vec![
            record("ref", reference),
            record("s135", digest_with_agreement(135)),
            record("s131", digest_with_agreement(131)),
            record("s10", digest_with_agreement(10)),
            record("s5", digest_with_agreement(5)),
        ];
        order_by_similarity(&mut records, false);
        assert_eq!(records[1].path, "s135");
    }

    #[test]
    fn best_candidate_is_swapped_adjacent() {
        let reference = SimilarityDigest([b'R'; TLSH_DIGEST_LEN]);
        let mut records = vec![
            record("ref", reference),
            record("far", digest_with_agreement(3)),
            record("near", digest_with_agreement(120)),
        ];
        order_by_similarity(&mut records, false);
        assert_eq!(records[1].path, "near");
        assert_eq!(records[2].path, "far");
    }

    #[test]
    fn zero_digests_cluster_without_moving_leaders() {
        let mut records = vec![
            record("a", digest_with_agreement(90)),
            record("small1", SimilarityDigest::ZERO),
            record("b", digest_with_agreement(89)),
            record("small2", SimilarityDigest::ZERO),
        ];
        order_by_similarity(&mut records, false);
        // The two zero digests agree in every byte with each other, so once
        // one is reached the other follows it immediately.
        let pos1 = records.iter().position(|r| r.path == "small1").unwrap();
        let pos2 = records.iter().position(|r| r.path == "small2").unwrap();
        assert_eq!(pos1.abs_diff(pos2), 1);
    }

    #[test]
    fn ordering_is_deterministic() {
        let build = || {
            vec![
                record("a", digest_with_agreement(50)),
                record("b", digest_with_agreement(50)),
                record("c", digest_with_agreement(50)),
            ]
        };
        let mut first = build();
        let mut second = build();
        order_by_similarity(&mut first, false);
        order_by_similarity(&mut second, false);
        let order = |v: &[FileRecord]| v.iter().map(|r| r.path.clone()).collect::<Vec<_>>();
        assert_eq!(order(&first), order(&second));
    }
}
