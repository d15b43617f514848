use std::collections::HashMap;

use anyhow::Result;

use crate::alphabet::ALPHABET_SIZE;
use crate::structs::{Braid, MemberId};

use super::matcher::{
    DistanceTooLargeError, LocalHit, Matcher, Pattern, SearchParams,
};
use super::shift_and::prefix_masks;
use super::{Candidate, Match};

#[derive(Debug)]
struct Seed {
    /// Offset of the seed within the pattern
    offset: usize,
    length: usize,
    masks: [u64; ALPHABET_SIZE],
    accept: u64,
}

/// The pigeonhole filter: split the pattern into `k + 1` non-overlapping
/// seeds, so any occurrence within edit distance `k` must contain at
/// least one seed exactly. Each seed runs its own Shift-And automaton.
///
/// Hits are unverified candidates, not matches; confirm them with
/// [`verify_candidates`].
#[derive(Debug)]
pub struct Pigeonhole {
    seeds: Vec<Seed>,
    length: usize,
    max_distance: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PigeonholeState {
    bits: Vec<u64>,
}

impl Matcher for Pigeonhole {
    type State = PigeonholeState;

    fn new(pattern: &Pattern, params: &SearchParams) -> Result<Self> {
        let length = pattern.len();
        let max_distance = params.max_edit_distance;
        let seed_count = max_distance + 1;
        if length < seed_count {
            return Err(DistanceTooLargeError {
                distance: max_distance,
                pattern_length: length,
            }
            .into());
        }

        // spread the remainder over the leading seeds
        let base = length / seed_count;
        let remainder = length % seed_count;
        let mut seeds = Vec::with_capacity(seed_count);
        let mut offset = 0usize;
        for seed_idx in 0..seed_count {
            let seed_length = base + usize::from(seed_idx < remainder);
            let bytes = &pattern.digital_bytes[offset..offset + seed_length];
            seeds.push(Seed {
                offset,
                length: seed_length,
                masks: prefix_masks(bytes)?,
                accept: 1 << (seed_length - 1),
            });
            offset += seed_length;
        }

        Ok(Pigeonhole {
            seeds,
            length,
            max_distance,
        })
    }

    fn begin(&self) -> PigeonholeState {
        PigeonholeState {
            bits: vec![0; self.seeds.len()],
        }
    }

    fn consume(&self, state: &mut PigeonholeState, window: &[u8], sink: &mut impl FnMut(LocalHit)) {
        for (idx, &byte) in window.iter().enumerate() {
            for (seed, bits) in self.seeds.iter().zip(state.bits.iter_mut()) {
                *bits = ((*bits << 1) | 1) & seed.masks[byte as usize];
                if *bits & seed.accept != 0 {
                    // end of the pattern window this seed hit implies;
                    // it may reach past the content scanned so far
                    let window_end = idx + (self.length - (seed.offset + seed.length));
                    sink(LocalHit {
                        end: window_end,
                        distance: self.max_distance,
                    });
                }
            }
        }
    }

    fn pattern_len(&self) -> usize {
        self.length
    }
}

/// Confirm pigeonhole candidates by bounded-edit-distance comparison over
/// each member's virtual sequence, widened by the distance bound on both
/// sides. Returns confirmed matches only; candidates are a superset.
pub fn verify_candidates(
    braid: &Braid,
    pattern: &[u8],
    params: &SearchParams,
    candidates: &HashMap<MemberId, Vec<Candidate>>,
) -> Result<HashMap<MemberId, Vec<Match>>> {
    let pattern = Pattern::new(pattern)?;
    let max_distance = params.max_edit_distance;

    let mut confirmed: HashMap<MemberId, Vec<Match>> = HashMap::new();
    for (&member, member_candidates) in candidates {
        let view = match braid.view(member) {
            Some(view) => view,
            None => continue,
        };

        let mut matches: Vec<Match> = vec![];
        for candidate in member_candidates {
            // candidate positions are 1-based; the view is 0-indexed
            let candidate_idx = candidate.start.saturating_sub(1);
            let window_start = candidate_idx.saturating_sub(max_distance);
            let window = view.slice(
                window_start,
                candidate_idx + pattern.len() + max_distance,
            );

            if let Some((end, distance)) =
                best_occurrence(&pattern.digital_bytes, &window, max_distance)
            {
                let start = (window_start + end).saturating_sub(pattern.len() - 1) + 1;
                matches.push(Match {
                    member,
                    start,
                    length: pattern.len(),
                    distance,
                });
            }
        }

        matches.sort_by_key(|m| (m.start, m.distance));
        matches.dedup();
        confirmed.insert(member, matches);
    }
    Ok(confirmed)
}

/// Semi-global comparison of `pattern` against `window`: the occurrence
/// may end anywhere in the window. Returns the best end position
/// (inclusive) and its distance, if within the bound.
fn best_occurrence(pattern: &[u8], window: &[u8], max_distance: usize) -> Option<(usize, usize)> {
    // distance of each pattern prefix against the best window suffix
    let mut previous: Vec<usize> = (0..=pattern.len()).collect();
    let mut current: Vec<usize> = vec![0; pattern.len() + 1];
    let mut best: Option<(usize, usize)> = None;

    for (window_idx, &window_byte) in window.iter().enumerate() {
        current[0] = 0;
        for (pattern_idx, &pattern_byte) in pattern.iter().enumerate() {
            let substitution =
                previous[pattern_idx] + usize::from(pattern_byte != window_byte);
            let deletion = previous[pattern_idx + 1] + 1;
            let insertion = current[pattern_idx] + 1;
            current[pattern_idx + 1] = substitution.min(deletion).min(insertion);
        }

        let distance = current[pattern.len()];
        if distance <= max_distance {
            let improves = match best {
                Some((_, best_distance)) => distance < best_distance,
                None => true,
            };
            if improves {
                best = Some((window_idx, distance));
            }
        }

        std::mem::swap(&mut previous, &mut current);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_partition_covers_pattern() {
        let pattern = Pattern::new(b"ACGTACGTACG").unwrap();
        let matcher =
            Pigeonhole::new(&pattern, &SearchParams::with_max_edit_distance(2)).unwrap();

        assert_eq!(matcher.seeds.len(), 3);
        let lengths: Vec<usize> = matcher.seeds.iter().map(|s| s.length).collect();
        assert_eq!(lengths, vec![4, 4, 3]);
        assert_eq!(matcher.seeds[1].offset, 4);
        assert_eq!(matcher.seeds[2].offset, 8);
    }

    #[test]
    fn test_distance_too_large_rejected() {
        let pattern = Pattern::new(b"ACG").unwrap();
        let err =
            Pigeonhole::new(&pattern, &SearchParams::with_max_edit_distance(3)).unwrap_err();
        assert!(err.downcast_ref::<DistanceTooLargeError>().is_some());
    }

    #[test]
    fn test_zero_distance_single_seed_is_exact() {
        let pattern = Pattern::new(b"ACGT").unwrap();
        let matcher = Pigeonhole::new(&pattern, &SearchParams::default()).unwrap();

        let mut state = matcher.begin();
        let mut ends = vec![];
        // ACGTACGT
        matcher.consume(&mut state, &[0, 1, 2, 3, 0, 1, 2, 3], &mut |hit| {
            ends.push(hit.end)
        });
        assert_eq!(ends, vec![3, 7]);
    }

    #[test]
    fn test_seed_hit_implies_candidate_window() {
        // pattern AACC, k = 1 -> seeds AA at 0 and CC at 2
        let pattern = Pattern::new(b"AACC").unwrap();
        let matcher =
            Pigeonhole::new(&pattern, &SearchParams::with_max_edit_distance(1)).unwrap();

        let mut state = matcher.begin();
        let mut ends = vec![];
        // GGCCGG: only the second seed fires, at end 3; the implied
        // pattern window also ends there
        matcher.consume(&mut state, &[2, 2, 1, 1, 2, 2], &mut |hit| {
            ends.push(hit.end)
        });
        assert_eq!(ends, vec![3]);
    }

    #[test]
    fn test_best_occurrence() {
        // exact
        assert_eq!(best_occurrence(&[0, 1], &[3, 0, 1, 3], 0), Some((2, 0)));
        // one substitution
        assert_eq!(best_occurrence(&[0, 0, 0], &[0, 1, 0], 1), Some((2, 1)));
        // out of reach
        assert_eq!(best_occurrence(&[0, 0, 0], &[1, 1, 1], 1), None);
    }
}
