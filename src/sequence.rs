//! Residue-level helpers used while matching archive records to knowledge-base entries.

use serde::{Deserialize, Serialize};

/// Mapped span of a cluster member over the cluster's reference sequence (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

/// Member of an archive cluster together with the spans it maps onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterFeature {
    pub locations: Vec<Location>,
    pub interpro_group_id: Option<String>,
}

/// Length of the longest common *contiguous* substring of `a` and `b`.
///
/// Classic dynamic programme: cell `(i, j)` holds the length of the common suffix ending at
/// `a[i-1]` and `b[j-1]`. Only the previous row is kept, which yields the same maximum as the
/// full table.
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    let mut longest = 0;
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                current[j] = previous[j - 1] + 1;
                longest = longest.max(current[j]);
            } else {
                current[j] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }
    longest
}

/// Splits a sequence into consecutive chunks of at most `size` residues.
pub fn chunk_sequence(sequence: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let residues: Vec<char> = sequence.chars().collect();
    residues
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Total mapped length of a member: sum of `end - start` over its spans.
pub fn mapped_length(locations: &[Location]) -> usize {
    locations
        .iter()
        .map(|loc| loc.end.saturating_sub(loc.start))
        .sum()
}

/// Member with the largest mapped length; the first one wins on ties.
pub fn best_member(features: &[ClusterFeature]) -> Option<&ClusterFeature> {
    let mut best: Option<(&ClusterFeature, usize)> = None;
    for feature in features {
        let length = mapped_length(&feature.locations);
        match best {
            Some((_, best_length)) if best_length >= length => {}
            _ => best = Some((feature, length)),
        }
    }
    best.map(|(feature, _)| feature)
}

/// Concatenates the residues covered by `locations`. Spans are 1-based and inclusive, so each
/// maps onto the 0-based slice `start-1..end`; spans reaching past the sequence are clamped.
pub fn extract_region(sequence: &str, locations: &[Location]) -> String {
    let residues: Vec<char> = sequence.chars().collect();
    let mut region = String::new();
    for loc in locations {
        let start = loc.start.saturating_sub(1).min(residues.len());
        let end = loc.end.min(residues.len());
        if start < end {
            region.extend(&residues[start..end]);
        }
    }
    region
}
